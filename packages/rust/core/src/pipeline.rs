//! End-to-end run: cursor → fetch → batch → summarize → report → cursor commit.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use arxivsummary_artifacts::{ReportMeta, write_metadata, write_report};
use arxivsummary_catalog::{CatalogSource, RecordAnomaly};
use arxivsummary_generator::TextGenerator;
use arxivsummary_shared::{Cursor, OutputConfig, Result, SummaryUnit};
use arxivsummary_storage::CursorStore;

use crate::batcher;
use crate::fetcher::Fetcher;
use crate::summarizer::SummaryGenerator;

/// Result of one pipeline run.
#[derive(Debug, Default)]
pub struct RunResult {
    /// Summaries in fetch order.
    pub summary_units: Vec<SummaryUnit>,
    /// True when no unit failed.
    pub overall_succeeded: bool,
    /// Whether a new cursor was written.
    pub cursor_advanced: bool,
    /// Cursor in effect after the run.
    pub cursor: Option<Cursor>,
    pub report_path: Option<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    /// Records skipped as malformed.
    pub anomalies: Vec<RecordAnomaly>,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn failed_count(&self) -> usize {
        self.summary_units.iter().filter(|u| !u.succeeded).count()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the fetch has finished.
    fn records_fetched(&self, count: usize);
    /// Called before batch `current` (1-based) of `total` is sent.
    fn batch_started(&self, current: usize, total: usize, records: usize);
    /// Called after a batch, with the number of records that got a placeholder.
    fn batch_finished(&self, current: usize, failed: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn records_fetched(&self, _count: usize) {}
    fn batch_started(&self, _current: usize, _total: usize, _records: usize) {}
    fn batch_finished(&self, _current: usize, _failed: usize) {}
    fn done(&self, _result: &RunResult) {}
}

/// Wires the fetcher, summary generator and cursor store together.
#[derive(Debug)]
pub struct Pipeline<S, G> {
    fetcher: Fetcher<S>,
    summarizer: SummaryGenerator<G>,
    cursor_store: CursorStore,
    output: OutputConfig,
    batch_size: usize,
}

impl<S: CatalogSource, G: TextGenerator> Pipeline<S, G> {
    pub fn new(
        fetcher: Fetcher<S>,
        summarizer: SummaryGenerator<G>,
        output: OutputConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            cursor_store: CursorStore::new(&output.cursor_path),
            output,
            batch_size,
        }
    }

    pub fn cursor_store(&self) -> &CursorStore {
        &self.cursor_store
    }

    /// Run the full pipeline once.
    ///
    /// 1. Load the cursor (absent or corrupt means none)
    /// 2. Fetch records newer than the cursor; stop early if there are none
    /// 3. Split into batches and summarize them in order
    /// 4. Write the metadata archive and the report
    /// 5. Commit the new cursor, only if every record was summarized
    ///
    /// Only catalog failures and I/O errors abort the run.
    #[instrument(skip_all, fields(query = %query, categories = categories.len()))]
    pub async fn run(
        &self,
        query: &str,
        categories: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<RunResult> {
        let start = Instant::now();

        // --- Phase 1: Cursor ---
        progress.phase("Loading cursor");
        let previous = self.cursor_store.load()?;
        match &previous {
            Some(c) => info!(cursor = %c.last_seen_id, saved_at = %c.saved_at, "resuming from cursor"),
            None => info!("no cursor, fetching the full window"),
        }

        // --- Phase 2: Fetch ---
        progress.phase("Fetching catalog");
        let outcome = self.fetcher.fetch(query, categories, previous.as_ref()).await?;
        progress.records_fetched(outcome.records.len());

        if outcome.records.is_empty() {
            info!("no new records");
            let result = RunResult {
                overall_succeeded: true,
                cursor: previous,
                anomalies: outcome.anomalies,
                elapsed: start.elapsed(),
                ..Default::default()
            };
            progress.done(&result);
            return Ok(result);
        }

        // --- Phase 3: Summarize ---
        progress.phase("Summarizing");
        let batches = batcher::split(&outcome.records, self.batch_size);
        info!(records = outcome.records.len(), batches = batches.len(), "summarizing");
        let units = self.summarizer.summarize_all(&batches, progress).await;
        let failed = units.iter().filter(|u| !u.succeeded).count();
        let overall_succeeded = failed == 0;

        // --- Phase 4: Artifacts ---
        progress.phase("Writing report");
        let metadata_path = match &self.output.metadata_file {
            Some(name) => Some(write_metadata(&self.output.dir, name, &outcome.records)?),
            None => None,
        };
        let meta = ReportMeta::for_units(self.summarizer.model(), &units);
        let report_path = write_report(&self.output.dir, &meta, &units)?;

        // --- Phase 5: Cursor commit ---
        let (cursor, cursor_advanced) = if overall_succeeded {
            let newest = outcome
                .candidate_cursor
                .clone()
                .unwrap_or_else(|| outcome.records[0].id.clone());
            let cursor = Cursor::new(newest, outcome.records.len());
            self.cursor_store.save(&cursor)?;
            info!(cursor = %cursor.last_seen_id, "cursor advanced");
            (Some(cursor), true)
        } else {
            warn!(failed, "some summaries failed, cursor not advanced");
            (previous, false)
        };

        let result = RunResult {
            summary_units: units,
            overall_succeeded,
            cursor_advanced,
            cursor,
            report_path: Some(report_path),
            metadata_path,
            anomalies: outcome.anomalies,
            elapsed: start.elapsed(),
        };

        info!(
            records = result.summary_units.len(),
            failed,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "run complete"
        );
        progress.done(&result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arxivsummary_generator::GenerationError;
    use arxivsummary_shared::{ArxivSummaryError, RecordId};
    use uuid::Uuid;

    use crate::fetcher::tests::{FakeSource, raw, search_config};
    use crate::summarizer::tests::{FakeGenerator, generator_config};

    fn temp_output() -> OutputConfig {
        let dir = std::env::temp_dir().join(format!("arxivsummary-run-{}", Uuid::now_v7()));
        OutputConfig {
            cursor_path: dir.join("last_run.json"),
            metadata_file: Some("metadata.json".into()),
            dir,
        }
    }

    fn pipeline(
        source: FakeSource,
        generator: FakeGenerator,
        output: OutputConfig,
    ) -> Pipeline<FakeSource, FakeGenerator> {
        Pipeline::new(
            Fetcher::new(source, search_config()),
            SummaryGenerator::new(generator, &generator_config()),
            output,
            2,
        )
    }

    fn stream() -> Vec<arxivsummary_catalog::RawRecord> {
        vec![raw("A", 4), raw("B", 3), raw("C", 2)]
    }

    #[tokio::test]
    async fn successful_run_advances_cursor() {
        let output = temp_output();
        let p = pipeline(FakeSource::new(stream()), FakeGenerator::new(vec![]), output.clone());

        let result = p.run("", &[], &SilentProgress).await.unwrap();
        assert!(result.overall_succeeded);
        assert!(result.cursor_advanced);
        let ids: Vec<&str> = result.summary_units.iter().map(|u| u.record.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);

        let saved = p.cursor_store().load().unwrap().unwrap();
        assert_eq!(saved.last_seen_id, RecordId::from("A"));
        assert_eq!(saved.count_at_save, 3);

        let report = std::fs::read_to_string(result.report_path.unwrap()).unwrap();
        assert!(report.contains("Paper A"));
        assert!(report.find("Paper A").unwrap() < report.find("Paper C").unwrap());
        assert!(result.metadata_path.unwrap().exists());

        let _ = std::fs::remove_dir_all(&output.dir);
    }

    #[tokio::test]
    async fn failed_record_withholds_cursor() {
        let output = temp_output();
        let store = CursorStore::new(&output.cursor_path);
        let before = Cursor::new(RecordId::from("old"), 7);
        store.save(&before).unwrap();

        // First batch reply is unusable, and B keeps failing on its own.
        let generator = FakeGenerator::new(vec![Err(GenerationError::NoText)]).failing_on(&["Paper B"]);
        let p = pipeline(FakeSource::new(stream()), generator, output.clone());

        let result = p.run("", &[], &SilentProgress).await.unwrap();
        assert!(!result.overall_succeeded);
        assert!(!result.cursor_advanced);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.summary_units.len(), 3);

        let after = store.load().unwrap().unwrap();
        assert_eq!(after.last_seen_id, before.last_seen_id);
        assert_eq!(after.count_at_save, 7);

        // The degraded report is still written.
        let report = std::fs::read_to_string(result.report_path.unwrap()).unwrap();
        assert!(report.contains("Failed summaries: 1"));
        assert!(report.contains("[generation failed:"));

        let _ = std::fs::remove_dir_all(&output.dir);
    }

    #[tokio::test]
    async fn no_new_records_short_circuits() {
        let output = temp_output();
        let store = CursorStore::new(&output.cursor_path);
        store.save(&Cursor::new(RecordId::from("A"), 3)).unwrap();

        let p = pipeline(FakeSource::new(stream()), FakeGenerator::new(vec![]), output.clone());
        let result = p.run("", &[], &SilentProgress).await.unwrap();

        assert!(result.overall_succeeded);
        assert!(!result.cursor_advanced);
        assert!(result.summary_units.is_empty());
        assert!(result.report_path.is_none());
        assert_eq!(p.summarizer.generator().calls(), 0);
        assert_eq!(store.load().unwrap().unwrap().last_seen_id, RecordId::from("A"));

        let _ = std::fs::remove_dir_all(&output.dir);
    }

    #[tokio::test]
    async fn second_run_only_sees_new_records() {
        let output = temp_output();
        let first = pipeline(FakeSource::new(stream()), FakeGenerator::new(vec![]), output.clone());
        first.run("", &[], &SilentProgress).await.unwrap();

        let mut newer = vec![raw("Z", 9)];
        newer.extend(stream());
        let second = pipeline(FakeSource::new(newer), FakeGenerator::new(vec![]), output.clone());
        let result = second.run("", &[], &SilentProgress).await.unwrap();

        let ids: Vec<&str> = result.summary_units.iter().map(|u| u.record.id.as_str()).collect();
        assert_eq!(ids, vec!["Z"]);
        assert_eq!(
            second.cursor_store().load().unwrap().unwrap().last_seen_id,
            RecordId::from("Z")
        );

        let _ = std::fs::remove_dir_all(&output.dir);
    }

    #[tokio::test]
    async fn source_failure_aborts_without_cursor() {
        let output = temp_output();
        let p = pipeline(FakeSource::unreachable(), FakeGenerator::new(vec![]), output.clone());

        let err = p.run("", &[], &SilentProgress).await.unwrap_err();
        assert!(matches!(err, ArxivSummaryError::Source(_)));
        assert!(p.cursor_store().load().unwrap().is_none());
        assert!(!output.dir.exists());
    }
}
