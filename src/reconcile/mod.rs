//! Reconciliation of full-replacement snapshots.
//!
//! Every push carries the complete set of methods with an explicit policy.
//! Methods that were present in the previous push and are missing now must
//! revert to their default policy, otherwise they would keep a stale policy
//! forever.

mod method_set;
pub use method_set::*;


use parking_lot::Mutex;
use tracing::trace;

/// Remembers which methods currently carry an explicit policy.
///
/// One instance per policy kind per destination service.
#[derive(Debug, Default)]
pub struct MethodSetReconciler {
    previous: Mutex<MethodSet>,
}

impl MethodSetReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previously known methods absent from `next`, then stores
    /// `next` as the known set. The output is unordered.
    pub fn diff_and_replace(
        &self,
        next: MethodSet,
    ) -> Vec<String> {
        let mut previous = self.previous.lock();
        let removed = previous.diff(&next);
        trace!(removed = removed.len(), known = next.len(), "method set replaced");
        *previous = next;
        removed
    }

    pub fn known(&self) -> MethodSet {
        self.previous.lock().clone()
    }
}
