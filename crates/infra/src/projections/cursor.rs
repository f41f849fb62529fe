use std::collections::HashMap;
use std::sync::RwLock;

use renqing_core::{AggregateId, LedgerId};

use super::ProjectionError;

/// Per-stream checkpoint of the last applied sequence number.
///
/// Guards projection updates against replays (skipped) and gaps (rejected);
/// the update runs under the cursor lock so check-apply-advance is one
/// step.
#[derive(Debug, Default)]
pub(super) struct StreamCursors {
    inner: RwLock<HashMap<(LedgerId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` if the envelope advances the stream; skip duplicates.
    ///
    /// The first event of a stream may carry any positive sequence number;
    /// after that, strict +1 increments are enforced.
    pub fn apply_guarded(
        &self,
        ledger_id: LedgerId,
        aggregate_id: AggregateId,
        sequence_number: u64,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        let Ok(mut cursors) = self.inner.write() else {
            return Ok(());
        };

        let key = (ledger_id, aggregate_id);
        let last = *cursors.get(&key).unwrap_or(&0);

        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }

        if sequence_number <= last {
            // Duplicate or replay; at-least-once delivery makes this normal.
            return Ok(());
        }

        if last != 0 && sequence_number != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }

        apply()?;

        cursors.insert(key, sequence_number);
        Ok(())
    }
}
