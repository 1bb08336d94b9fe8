//! Fan a batch out over the worker pool and collect its summary

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::processor::{FrameProcessor, TRANSFORM_ERROR};
use crate::protocol::WireDefaults;
use crate::types::{Batch, BatchSummary, FailureKind, FrameResult, unix_seconds};

/// Process every message of `batch` and wait for all of them.
///
/// At most `workers.available_permits()` frames run at once. Results keep
/// arrival order regardless of completion order. An empty batch produces a
/// `0/0` summary without touching the processor.
pub async fn dispatch_batch(
    batch: Batch,
    processor: &Arc<FrameProcessor>,
    workers: &Arc<Semaphore>,
    defaults: &WireDefaults,
) -> BatchSummary {
    let sequence = batch.sequence;
    let window_start = batch.window_start;
    let count = batch.count();

    if count == 0 {
        info!(batch = sequence, "Batch is empty, nothing to process");
        return BatchSummary { sequence, window_start, results: Vec::new() };
    }
    info!(
        batch = sequence,
        "Processing batch of {} frames opened at {:.3}",
        count,
        unix_seconds(window_start)
    );

    let parsed = batch.parse_all(defaults);
    let frame_ids: Vec<Option<u64>> = parsed
        .iter()
        .map(|p| match p {
            Ok(message) => Some(message.frame_id),
            Err(failure) => failure.frame_id,
        })
        .collect();

    let mut slots: Vec<Option<FrameResult>> = vec![None; count];
    let mut tasks = JoinSet::new();
    for (index, message) in parsed.into_iter().enumerate() {
        let permit = match Arc::clone(workers).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(batch = sequence, "Worker pool unavailable ({}), processing frame inline", e);
                slots[index] = Some(processor.process(message).await);
                continue;
            }
        };
        let processor = Arc::clone(processor);
        tasks.spawn(async move {
            let _permit = permit;
            (index, processor.process(message).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => error!(batch = sequence, "Frame task failed: {}", e),
        }
    }

    let results: Vec<FrameResult> = slots
        .into_iter()
        .zip(frame_ids)
        .map(|(slot, frame_id)| {
            slot.unwrap_or_else(|| {
                FrameResult::failure(frame_id, FailureKind::Transform, TRANSFORM_ERROR)
            })
        })
        .collect();

    for result in &results {
        log_result(sequence, result);
    }

    let summary = BatchSummary { sequence, window_start, results };
    info!(batch = sequence, "Batch complete: {}", summary);
    summary
}

fn log_result(batch: u64, result: &FrameResult) {
    match result {
        FrameResult::Success { frame_id, output_location, original_shape, processed_shape } => {
            info!(
                batch,
                "Frame #{}: {} -> {} saved to {}",
                frame_id,
                original_shape,
                processed_shape,
                output_location
            );
        }
        FrameResult::Failure { frame_id: Some(id), kind, reason } => {
            warn!(batch, "Frame #{} failed ({:?}): {}", id, kind, reason);
        }
        FrameResult::Failure { frame_id: None, kind, reason } => {
            warn!(batch, "Unidentified frame failed ({:?}): {}", kind, reason);
        }
    }
}
