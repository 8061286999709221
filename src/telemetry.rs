//! Usage counters and span annotations.
//!
//! Nothing here may influence a request outcome: implementations swallow
//! their own failures.

use std::sync::atomic::{AtomicU64, Ordering};

/// Label used for ids whose first character is not a hex digit
pub const OTHER_BUCKET: &str = "other";

const HEX_BUCKETS: [&str; 16] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "a", "b", "c", "d", "e", "f",
];

/// Observability capability injected into the request pipeline
pub trait Telemetry: Send + Sync {
    /// Called once per successful create
    fn record_created(&self, id: &str);

    /// Attach the matched contract operation to the current request span
    fn annotate_operation(&self, operation_id: &str);
}

/// Counts creates per leading id character.
///
/// Relaxed ordering throughout: counts are eventually consistent.
#[derive(Debug, Default)]
pub struct UsageCounters {
    hex: [AtomicU64; 16],
    other: AtomicU64,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of creates recorded under `label` (`"0"`..`"f"` or `"other"`)
    pub fn created(&self, label: &str) -> u64 {
        if label == OTHER_BUCKET {
            return self.other.load(Ordering::Relaxed);
        }
        HEX_BUCKETS
            .iter()
            .position(|bucket| *bucket == label)
            .map(|index| self.hex[index].load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Every bucket with its count, hex buckets first
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        HEX_BUCKETS
            .iter()
            .copied()
            .chain(std::iter::once(OTHER_BUCKET))
            .map(|label| (label, self.created(label)))
            .collect()
    }

    /// Sum over all buckets
    pub fn total_created(&self) -> u64 {
        self.snapshot().iter().map(|(_, count)| count).sum()
    }

    fn counter_for(&self, id: &str) -> (&AtomicU64, &'static str) {
        match id.chars().next().and_then(|c| c.to_digit(16)) {
            Some(digit) => (&self.hex[digit as usize], HEX_BUCKETS[digit as usize]),
            None => (&self.other, OTHER_BUCKET),
        }
    }
}

impl Telemetry for UsageCounters {
    fn record_created(&self, id: &str) {
        let (counter, bucket) = self.counter_for(id);
        let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(bucket, count, "record created");
    }

    fn annotate_operation(&self, operation_id: &str) {
        // No-op when the current span has no `operation_id` field
        tracing::Span::current().record("operation_id", operation_id);
    }
}
