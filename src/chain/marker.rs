//! Per-node failure markers consulted by upstream selectors

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Liveness sink for a node: `mark` on failure, `reset` on success.
///
/// Implementations must tolerate concurrent calls from parallel traversals.
pub trait Marker: Send + Sync {
    fn mark(&self);
    fn reset(&self);
}

/// Marker counting consecutive failures.
#[derive(Debug, Default)]
pub struct FailMarker {
    count: AtomicU64,
    /// Unix seconds of the last mark, 0 = never
    marked_at: AtomicU64,
}

impl FailMarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures since the last reset
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Unix timestamp (seconds) of the last failure, if any
    pub fn marked_at(&self) -> Option<u64> {
        match self.marked_at.load(Ordering::Acquire) {
            0 => None,
            ts => Some(ts),
        }
    }
}

impl Marker for FailMarker {
    fn mark(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1);
        self.count.fetch_add(1, Ordering::AcqRel);
        self.marked_at.store(now.max(1), Ordering::Release);
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Release);
        self.marked_at.store(0, Ordering::Release);
    }
}
