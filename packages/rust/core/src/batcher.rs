//! Partition records into fixed-size batches.

use arxivsummary_shared::{Batch, Record};

/// Split `records` into batches of `max_per_batch`, the last one possibly shorter.
///
/// Order is preserved and every batch carries its offset into `records`. A
/// `max_per_batch` of zero is treated as one.
pub fn split(records: &[Record], max_per_batch: usize) -> Vec<Batch> {
    records
        .chunks(max_per_batch.max(1))
        .enumerate()
        .map(|(i, chunk)| Batch {
            start_index: i * max_per_batch.max(1),
            records: chunk.to_vec(),
        })
        .collect()
}
