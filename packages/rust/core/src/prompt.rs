//! Prompt templates for batch and single-record summarization.

use std::fmt::Write as _;

use arxivsummary_shared::{Batch, Record};

/// Section heading for a record, as the generator is asked to emit it.
pub fn section_heading(record: &Record) -> String {
    format!("#### [{}]({})", record.title, record.document_link)
}

/// Prompt asking for one section per record of `batch`, in order.
pub fn batch_prompt(batch: &Batch, language: &str) -> String {
    let mut prompt = instructions(batch.len(), language);
    for (number, record) in batch.numbered() {
        push_record(&mut prompt, number, record);
    }
    prompt
}

/// Prompt for a single record, same template as the batch prompt.
pub fn record_prompt(number: usize, record: &Record, language: &str) -> String {
    let mut prompt = instructions(1, language);
    push_record(&mut prompt, number, record);
    prompt
}

/// Section body standing in for a record whose summary could not be generated.
pub fn placeholder(record: &Record, error: &str) -> String {
    format!(
        "{}\n- Authors: {}\n- Published: {}\n- Purpose: [generation failed: {error}]\n- Finding: [generation failed: {error}]\n\n---\n",
        section_heading(record),
        record.author_line(),
        record.published_date(),
    )
}

fn instructions(count: usize, language: &str) -> String {
    let noun = if count == 1 { "paper" } else { "papers" };
    format!(
        "Summarize each of the following {count} {noun} in Markdown, written in {language}.\n\
For every paper:\n\
1. State the research purpose in one sentence.\n\
2. State the main finding in one sentence.\n\
\n\
Keep every title and link exactly as given. Output exactly {count} section(s), one per \
paper and in the given order. Each section must follow this template and end with a \
\"---\" separator line:\n\
\n\
#### [Title](Link)\n\
- Authors: (authors)\n\
- Published: (YYYY-MM-DD)\n\
- Purpose: (research purpose)\n\
- Finding: (main finding)\n\
\n\
---\n\
\n\
Do not add any other headings, introductions or closing remarks.\n\
\n\
Papers:\n"
    )
}

fn push_record(prompt: &mut String, number: usize, record: &Record) {
    let _ = write!(
        prompt,
        "\nPaper {number}:\nTitle: {}\nAuthors: {}\nPublished: {}\nLink: {}\nAbstract: {}\n",
        record.title,
        record.author_line(),
        record.published_date(),
        record.document_link,
        record.summary_text,
    );
}
