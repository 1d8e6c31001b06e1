//! arXiv catalog access.
//!
//! [`CatalogSource`] is the seam the fetcher pages through; [`ArxivClient`] is the
//! production implementation over the arXiv Atom API. Raw entries are turned into
//! [`Record`](arxivsummary_shared::Record)s by [`normalize`].

mod feed;
mod query;
mod record;

use std::future::Future;
use std::time::Duration;

use arxivsummary_shared::{ArxivSummaryError, Result, SearchConfig};
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

pub use feed::{FeedPage, parse_feed};
pub use query::{WILDCARD_QUERY, build_query};
pub use record::{RawLink, RawRecord, RecordAnomaly, coerce_categories, normalize};

/// User-Agent string for catalog requests.
const USER_AGENT: &str = concat!("arxivsummary/", env!("CARGO_PKG_VERSION"));

/// Results always come newest first: stopping on the cursor relies on it.
const SORT_BY: &str = "submittedDate";
const SORT_ORDER: &str = "descending";

// ---------------------------------------------------------------------------
// SearchRequest
// ---------------------------------------------------------------------------

/// One logical search, paged through by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Structured query, see [`build_query`].
    pub query: String,
    /// Upper bound on results across all pages.
    pub max_results: usize,
}

// ---------------------------------------------------------------------------
// CatalogSource
// ---------------------------------------------------------------------------

/// A paged catalog of records.
pub trait CatalogSource: Send + Sync {
    /// Fetch up to `page_size` raw entries starting at zero-based offset `start`.
    ///
    /// An empty page means the result set is exhausted. Failure of the source
    /// itself (unreachable, malformed feed) is an error; malformed entries are not.
    fn search_page(
        &self,
        request: &SearchRequest,
        start: usize,
        page_size: usize,
    ) -> impl Future<Output = Result<Vec<RawRecord>>> + Send;
}

// ---------------------------------------------------------------------------
// ArxivClient
// ---------------------------------------------------------------------------

/// arXiv export API client with request pacing and bounded retries.
#[derive(Debug)]
pub struct ArxivClient {
    client: Client,
    api_url: String,
    retry_count: u32,
    page_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivClient {
    /// Build a client from the runtime search config.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Url::parse(&config.api_url).map_err(|e| {
            ArxivSummaryError::config(format!("invalid catalog url {}: {e}", config.api_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArxivSummaryError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            retry_count: config.retry_count.max(1),
            page_delay: config.page_delay,
            last_request: Mutex::new(None),
        })
    }

    fn page_url(&self, request: &SearchRequest, start: usize, page_size: usize) -> Result<Url> {
        Url::parse_with_params(
            &self.api_url,
            &[
                ("search_query", request.query.clone()),
                ("start", start.to_string()),
                ("max_results", page_size.to_string()),
                ("sortBy", SORT_BY.to_string()),
                ("sortOrder", SORT_ORDER.to_string()),
            ],
        )
        .map_err(|e| ArxivSummaryError::config(format!("invalid catalog url: {e}")))
    }

    /// Wait until at least `page_delay` has passed since the previous request.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.page_delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Single GET, classified into retryable and final failures.
    async fn fetch_once(&self, url: &Url) -> std::result::Result<String, FetchFailure> {
        self.pace().await;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchFailure::Retryable(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchFailure::Retryable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchFailure::Final(format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| FetchFailure::Retryable(format!("failed to read body: {e}")))
    }
}

enum FetchFailure {
    Retryable(String),
    Final(String),
}

impl CatalogSource for ArxivClient {
    #[instrument(skip_all, fields(start = start, page_size = page_size))]
    async fn search_page(
        &self,
        request: &SearchRequest,
        start: usize,
        page_size: usize,
    ) -> Result<Vec<RawRecord>> {
        let url = self.page_url(request, start, page_size)?;
        debug!(%url, "requesting catalog page");

        let mut attempt = 1;
        let body = loop {
            match self.fetch_once(&url).await {
                Ok(body) => break body,
                Err(FetchFailure::Final(msg)) => {
                    return Err(ArxivSummaryError::source(msg));
                }
                Err(FetchFailure::Retryable(msg)) if attempt < self.retry_count => {
                    warn!(attempt, max = self.retry_count, error = %msg, "catalog request failed, retrying");
                    attempt += 1;
                }
                Err(FetchFailure::Retryable(msg)) => {
                    return Err(ArxivSummaryError::source(format!(
                        "{msg} after {attempt} attempts"
                    )));
                }
            }
        };

        let page = parse_feed(&body)?;
        debug!(
            entries = page.entries.len(),
            total = ?page.total_results,
            "catalog page parsed"
        );
        Ok(page.entries)
    }
}
