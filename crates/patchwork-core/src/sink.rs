//! Callback protocols on both sides of the coordinator.
//!
//! Presenters describe their own edits through [`DiffCallback`] in local
//! coordinates. Consumers of the composed list implement [`ListUpdateSink`]
//! and receive the same edits rewritten into global coordinates, or a single
//! coarse [`ListUpdateSink::on_invalidated`] when a pass could not be expressed
//! item by item.

use std::any::Any;
use std::sync::Arc;

/// Opaque change payload forwarded untouched from a presenter to list observers.
///
/// `Send + Sync` so that pooled recorders can travel between coordinators
/// living on different update threads.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Receives one part's edits while it diffs an old snapshot against a new one.
///
/// Events apply sequentially: every position is interpreted against the list
/// as it looks after all previously reported events.
pub trait DiffCallback {
    fn on_inserted(&mut self, position: usize, count: usize);

    fn on_removed(&mut self, position: usize, count: usize);

    fn on_moved(&mut self, from: usize, to: usize);

    fn on_changed(&mut self, position: usize, count: usize, payload: Option<Payload>);
}

/// Observer of the composed list as a whole.
pub trait ListUpdateSink {
    fn on_inserted(&mut self, position: usize, count: usize);

    fn on_removed(&mut self, position: usize, count: usize);

    fn on_moved(&mut self, from: usize, to: usize);

    fn on_changed(&mut self, position: usize, count: usize, payload: Option<Payload>);

    /// The whole list changed; re-read everything.
    fn on_invalidated(&mut self);
}
