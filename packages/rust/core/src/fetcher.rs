//! Incremental fetch: page through the catalog until the stored cursor is reached.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use arxivsummary_catalog::{CatalogSource, RecordAnomaly, SearchRequest, build_query, normalize};
use arxivsummary_shared::{Cursor, Record, RecordId, Result, SearchConfig};

/// What one fetch produced.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// New records, deduplicated, newest first.
    pub records: Vec<Record>,
    /// Id of the newest record kept; becomes the cursor once the run succeeds.
    pub candidate_cursor: Option<RecordId>,
    /// Entries skipped because they could not be normalized.
    pub anomalies: Vec<RecordAnomaly>,
    /// Duplicate ids dropped within this run.
    pub duplicates: usize,
    /// Records dropped because their primary category was not requested.
    pub cross_listed_dropped: usize,
    /// Whether streaming ended on the stored cursor.
    pub stopped_at_cursor: bool,
    /// Raw results consumed from the source.
    pub streamed: usize,
}

/// Pages through a [`CatalogSource`] and yields only records newer than the cursor.
#[derive(Debug)]
pub struct Fetcher<S> {
    source: S,
    config: SearchConfig,
}

impl<S: CatalogSource> Fetcher<S> {
    pub fn new(source: S, config: SearchConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Fetch records published since `cursor`.
    ///
    /// Stops at the first streamed result whose id equals the cursor (including the
    /// very first one), at the configured result cap, or when the source runs dry.
    /// If the cursor never shows up the full capped window is returned.
    #[instrument(skip_all, fields(query = %query, categories = categories.len()))]
    pub async fn fetch(
        &self,
        query: &str,
        categories: &[String],
        cursor: Option<&Cursor>,
    ) -> Result<FetchOutcome> {
        let request = SearchRequest {
            query: build_query(query, categories, self.config.scope),
            max_results: self.config.max_results,
        };
        let stop_id = cursor.map(|c| c.last_seen_id.as_str());
        info!(search_query = %request.query, max = request.max_results, "fetching catalog");

        let mut outcome = FetchOutcome::default();
        let mut seen: HashSet<RecordId> = HashSet::new();

        'pages: while outcome.streamed < request.max_results {
            let page_size = self
                .config
                .page_size
                .min(request.max_results - outcome.streamed);
            let page = self
                .source
                .search_page(&request, outcome.streamed, page_size)
                .await?;
            let page_len = page.len();
            debug!(start = outcome.streamed, page_len, "page received");

            for raw in page {
                outcome.streamed += 1;
                let raw_id = raw.id.as_deref().map(str::trim);

                if let (Some(stop), Some(id)) = (stop_id, raw_id) {
                    if stop == id {
                        debug!(cursor = stop, "reached stored cursor");
                        outcome.stopped_at_cursor = true;
                        break 'pages;
                    }
                }

                let record = match normalize(&raw) {
                    Ok(record) => record,
                    Err(anomaly) => {
                        warn!(error = %anomaly, "skipping malformed record");
                        outcome.anomalies.push(anomaly);
                        continue;
                    }
                };

                if !seen.insert(record.id.clone()) {
                    outcome.duplicates += 1;
                    continue;
                }

                if !self.keep_cross_listed(&record, categories) {
                    outcome.cross_listed_dropped += 1;
                    continue;
                }

                outcome.records.push(record);

                if outcome.streamed >= request.max_results {
                    break 'pages;
                }
            }

            if page_len < page_size {
                break;
            }
        }

        // Dedup keeps first-seen order; re-assert newest first without disturbing ties.
        outcome
            .records
            .sort_by(|a, b| b.published_at.cmp(&a.published_at));
        outcome.candidate_cursor = outcome.records.first().map(|r| r.id.clone());

        info!(
            records = outcome.records.len(),
            streamed = outcome.streamed,
            anomalies = outcome.anomalies.len(),
            duplicates = outcome.duplicates,
            cross_listed_dropped = outcome.cross_listed_dropped,
            stopped_at_cursor = outcome.stopped_at_cursor,
            "fetch complete"
        );
        Ok(outcome)
    }

    fn keep_cross_listed(&self, record: &Record, categories: &[String]) -> bool {
        if self.config.include_cross_listed || categories.is_empty() {
            return true;
        }
        match &record.primary_category {
            Some(primary) => categories.iter().any(|c| c.trim() == primary),
            None => true,
        }
    }
}
