//! Fixed-size batching.

use crate::error::{PipelineError, PipelineResult};

/// Split `documents` into contiguous batches of at most `max_batch_size`.
///
/// Every batch but the last is full; an empty input yields no batches.
pub fn chunk<T>(documents: &[T], max_batch_size: usize) -> PipelineResult<Vec<&[T]>> {
    if max_batch_size == 0 {
        return Err(PipelineError::InvalidBatchSize(max_batch_size));
    }
    Ok(documents.chunks(max_batch_size).collect())
}
