//! Observation plumbing between sources and the coordinator.
//!
//! Source callbacks never call into the coordinator directly. They enqueue an
//! [`Invalidation`] on the coordinator's [`InvalidationQueue`] and the host
//! drains it on the update thread with
//! [`ComposedList::flush_invalidations`](crate::ComposedList::flush_invalidations).
//! This keeps a source that notifies from inside `read` (or from inside a bind)
//! from re-entering a coordinator that is in the middle of a pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Registration returned by [`Source::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl ObserverId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Change listener registered with a [`Source`].
pub trait Observer {
    fn on_changed(&self);
}

/// Live, observable data backing a source part.
///
/// Note: no `Send + Sync` bound; sources are read and observed on the
/// coordinator's update thread only.
pub trait Source {
    type Snapshot;

    /// Returns the current value. Must be idempotent.
    fn read(&self) -> Self::Snapshot;

    fn add_observer(&self, observer: Rc<dyn Observer>) -> ObserverId;

    fn remove_observer(&self, id: ObserverId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invalidation {
    /// Something outside the individual sources changed.
    Global,
    /// The source behind this part changed.
    Part(usize),
}

type Waker = Rc<dyn Fn()>;

struct QueueInner {
    pending: RefCell<SmallVec<[Invalidation; 4]>>,
    waker: RefCell<Option<Waker>>,
    /// Pushes are dropped while closed.
    open: Cell<bool>,
}

impl Default for QueueInner {
    fn default() -> Self {
        Self {
            pending: RefCell::default(),
            waker: RefCell::default(),
            open: Cell::new(true),
        }
    }
}

/// Pending invalidations for one coordinator.
#[derive(Clone, Default)]
pub struct InvalidationQueue {
    inner: Rc<QueueInner>,
}

impl fmt::Debug for InvalidationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationQueue")
            .field("pending", &*self.inner.pending.borrow())
            .field("has_waker", &self.inner.waker.borrow().is_some())
            .field("open", &self.inner.open.get())
            .finish()
    }
}

impl InvalidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `invalidation`. The waker runs when the queue goes from empty
    /// to non-empty. A closed queue ignores the call.
    pub fn push(&self, invalidation: Invalidation) {
        if !self.inner.open.get() {
            log::trace!("{invalidation:?} dropped; queue closed");
            return;
        }
        let was_empty = {
            let mut pending = self.inner.pending.borrow_mut();
            let was_empty = pending.is_empty();
            pending.push(invalidation);
            was_empty
        };
        if was_empty {
            let waker = self.inner.waker.borrow().clone();
            if let Some(waker) = waker {
                waker();
            }
        }
    }

    pub fn drain(&self) -> SmallVec<[Invalidation; 4]> {
        std::mem::take(&mut *self.inner.pending.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.inner.pending.borrow_mut().clear();
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.get()
    }

    /// Opens or closes the queue. Closing also discards pending entries.
    pub(crate) fn set_open(&self, open: bool) {
        self.inner.open.set(open);
        if !open {
            self.clear();
        }
    }

    pub fn set_waker(&self, waker: Option<Waker>) {
        *self.inner.waker.borrow_mut() = waker;
    }
}

/// Observer a source part registers with its source.
pub(crate) struct PartObserver {
    part: usize,
    queue: InvalidationQueue,
}

impl PartObserver {
    pub(crate) fn new(part: usize, queue: InvalidationQueue) -> Self {
        Self { part, queue }
    }
}

impl Observer for PartObserver {
    fn on_changed(&self) {
        self.queue.push(Invalidation::Part(self.part));
    }
}

/// Observer for whole-composition triggers.
pub(crate) struct GlobalObserver {
    queue: InvalidationQueue,
}

impl GlobalObserver {
    pub(crate) fn new(queue: InvalidationQueue) -> Self {
        Self { queue }
    }
}

impl Observer for GlobalObserver {
    fn on_changed(&self) {
        self.queue.push(Invalidation::Global);
    }
}
