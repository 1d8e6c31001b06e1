//! Batch summarization with validation and per-record degradation.
//!
//! Per batch:
//! 1. One prompt for the whole batch, retried on transient failures.
//! 2. Heading links are repaired; the reply must then hold exactly one section
//!    marker per record.
//! 3. Sections are matched to records by position, and each heading must name its
//!    record by link or title.
//! 4. If the batch call is exhausted or fails validation, every record is
//!    regenerated on its own. A record that still fails becomes a placeholder.
//!
//! [`SummaryGenerator::summarize`] never fails: errors end up in
//! [`SummaryUnit::error`].

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use arxivsummary_generator::{GenerationError, GenerationOptions, TextGenerator};
use arxivsummary_markdown::{
    SectionHeading, clean_generated, count_sections, section_heading, split_sections,
};
use arxivsummary_shared::{Batch, GeneratorConfig, Record, SummaryUnit};

use crate::pipeline::ProgressReporter;
use crate::prompt;
use crate::retry::RetryPolicy;

/// Why a reply was not accepted.
#[derive(Debug, thiserror::Error)]
enum ReplyError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("expected {expected} section(s), got {found}")]
    SectionCount { expected: usize, found: usize },

    #[error("section {position} does not belong to {id}")]
    Misaligned { position: usize, id: String },
}

/// Turns batches of records into [`SummaryUnit`]s through a [`TextGenerator`].
#[derive(Debug)]
pub struct SummaryGenerator<G> {
    generator: G,
    options: GenerationOptions,
    retry: RetryPolicy,
    batch_pause: Duration,
    interval_pause: Duration,
    language: String,
}

impl<G: TextGenerator> SummaryGenerator<G> {
    pub fn new(generator: G, config: &GeneratorConfig) -> Self {
        Self {
            generator,
            options: GenerationOptions::from(config),
            retry: RetryPolicy::new(config.retry_count, config.retry_base_delay),
            batch_pause: config.batch_pause,
            interval_pause: config.interval_pause,
            language: config.language.clone(),
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Summarize every batch strictly in sequence, pausing between batches.
    pub async fn summarize_all(
        &self,
        batches: &[Batch],
        progress: &dyn ProgressReporter,
    ) -> Vec<SummaryUnit> {
        let mut units = Vec::with_capacity(batches.iter().map(Batch::len).sum());

        for (i, batch) in batches.iter().enumerate() {
            if i > 0 {
                pause(self.batch_pause + self.interval_pause).await;
            }
            progress.batch_started(i + 1, batches.len(), batch.len());

            let batch_units = self.summarize(batch).await;
            let failed = batch_units.iter().filter(|u| !u.succeeded).count();
            progress.batch_finished(i + 1, failed);
            units.extend(batch_units);
        }

        units
    }

    /// Summarize one batch. Units come back in the batch's record order.
    #[instrument(skip_all, fields(start = batch.start_index, records = batch.len()))]
    pub async fn summarize(&self, batch: &Batch) -> Vec<SummaryUnit> {
        if batch.is_empty() {
            return Vec::new();
        }

        let prompt = prompt::batch_prompt(batch, &self.language);
        match self.generate_sections(&prompt, &batch.records).await {
            Ok(sections) => {
                info!("batch summarized");
                batch
                    .records
                    .iter()
                    .cloned()
                    .zip(sections)
                    .map(|(record, section)| SummaryUnit::generated(record, section))
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "batch generation failed, degrading to per-record generation");
                self.summarize_each(batch).await
            }
        }
    }

    /// Degraded path: one request per record.
    async fn summarize_each(&self, batch: &Batch) -> Vec<SummaryUnit> {
        let mut units = Vec::with_capacity(batch.len());

        for (number, record) in batch.numbered() {
            pause(self.batch_pause).await;
            units.push(self.summarize_record(number, record).await);
        }

        let failed = units.iter().filter(|u| !u.succeeded).count();
        info!(failed, "per-record generation finished");
        units
    }

    async fn summarize_record(&self, number: usize, record: &Record) -> SummaryUnit {
        let prompt = prompt::record_prompt(number, record, &self.language);
        match self.generate_sections(&prompt, std::slice::from_ref(record)).await {
            Ok(mut sections) => {
                debug!(id = %record.id, "record summarized");
                SummaryUnit::generated(record.clone(), sections.remove(0))
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "record generation failed, using placeholder");
                let error = e.to_string();
                SummaryUnit::failed(record.clone(), prompt::placeholder(record, &error), error)
            }
        }
    }

    /// Generate with retries, clean the reply and check it has one section per
    /// record, in record order.
    async fn generate_sections(
        &self,
        prompt: &str,
        records: &[Record],
    ) -> Result<Vec<String>, ReplyError> {
        let reply = self
            .retry
            .run(|| self.generator.generate(prompt, &self.options))
            .await?;

        let cleaned = clean_generated(&reply);
        let found = count_sections(&cleaned);
        if found != records.len() {
            return Err(ReplyError::SectionCount {
                expected: records.len(),
                found,
            });
        }

        let sections = split_sections(&cleaned);
        for (position, (section, record)) in sections.iter().zip(records).enumerate() {
            let belongs = section_heading(section).is_some_and(|h| names_record(&h, record));
            if !belongs {
                return Err(ReplyError::Misaligned {
                    position: position + 1,
                    id: record.id.to_string(),
                });
            }
        }
        Ok(sections)
    }
}

/// Whether a section heading refers to `record`, by link or by title.
fn names_record(heading: &SectionHeading<'_>, record: &Record) -> bool {
    let link = strip_scheme(heading.link);
    if link == strip_scheme(&record.document_link) || link == strip_scheme(&record.primary_link) {
        return true;
    }
    fold(heading.title) == fold(&record.title)
}

fn strip_scheme(link: &str) -> &str {
    let link = link.trim().trim_end_matches('/');
    link.strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
        .unwrap_or(link)
}

fn fold(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
