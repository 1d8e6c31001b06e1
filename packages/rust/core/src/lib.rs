//! Core orchestration for arxivsummary.
//!
//! Ties the catalog, the text generator and the cursor store together into one
//! incremental run: fetch what is new, summarize it batch by batch, write the
//! report, and only then move the cursor.

pub mod batcher;
pub mod fetcher;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod summarizer;

pub use fetcher::{FetchOutcome, Fetcher};
pub use pipeline::{Pipeline, ProgressReporter, RunResult, SilentProgress};
pub use retry::{Attempt, RetryPolicy};
pub use summarizer::SummaryGenerator;
