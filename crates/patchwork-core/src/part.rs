//! Parts: the contiguous spans a composed list is made of.
//!
//! A [`Part`] is one of three closed variants:
//! - a *source* part, backed by a live [`Source`] and rendered through a
//!   [`PartPresenter`], which caches the last snapshot it read;
//! - a *static item* part, a fixed object whose item count is decided once at
//!   construction;
//! - a *static span*, a single fixed slot such as a header layout.
//!
//! Source and presenter types differ from part to part, so each variant keeps
//! its concrete pair behind a small object-safe slot trait. The coordinator
//! only sees `Part<K, H>`, where `K` is the presentation-kind token and `H` the
//! handle that bind and recycle operate on.

use std::fmt;
use std::rc::Rc;

use crate::observer::{Observer, ObserverId, Source};
use crate::recorder::DiffRecorder;
use crate::sink::DiffCallback;

/// Presents the items of one snapshot and describes how two snapshots differ.
///
/// This follows the shape of a list adapter: `count`, `stable_id` and `kind`
/// describe items, `bind`/`recycle` drive presentation handles and `diff`
/// reports edits.
pub trait PartPresenter<T> {
    /// Opaque presentation-kind token; items of equal kind can share handles.
    type Kind;
    /// The presentation handle bound to an item.
    type Handle;

    fn count(&self, snapshot: &T) -> usize;

    /// Stable id of the item at `index`, unique within this part.
    ///
    /// If not overridden, defaults to the index itself.
    fn stable_id(&self, snapshot: &T, index: usize) -> u64 {
        let _ = snapshot;
        index as u64
    }

    fn kind(&self, snapshot: &T, index: usize) -> Self::Kind;

    fn bind(&self, snapshot: &T, index: usize, handle: &mut Self::Handle);

    fn recycle(&self, handle: &mut Self::Handle) {
        let _ = handle;
    }

    /// Reports the edits that turn `old` into `new`.
    ///
    /// Returns `false` when the presenter cannot describe the change item by
    /// item; the coordinator then invalidates the whole list instead. Events
    /// emitted before returning `false` are discarded.
    fn diff(&self, old: &T, new: &T, callback: &mut dyn DiffCallback) -> bool {
        let _ = (old, new, callback);
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Source,
    StaticItem,
    StaticSpan,
}

/// Result of re-diffing a source part against a fresh read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rediff {
    Applied,
    Unsupported,
    Mismatch { recorded: usize, actual: usize },
}

trait SourceSlot<K, H> {
    fn count(&self) -> usize;
    fn reload(&mut self) -> usize;
    fn rediff(&mut self, recorder: &mut DiffRecorder) -> Rediff;
    fn stable_id(&self, index: usize) -> u64;
    fn kind(&self, index: usize) -> Option<K>;
    fn bind(&self, index: usize, handle: &mut H);
    fn recycle(&self, handle: &mut H);
    fn observe(&mut self, observer: Rc<dyn Observer>);
    fn unobserve(&mut self);
    fn is_observed(&self) -> bool;
}

struct SourceBinding<S: Source, P> {
    source: Rc<S>,
    presenter: P,
    snapshot: Option<S::Snapshot>,
    count: usize,
    registration: Option<ObserverId>,
}

impl<S, P, K, H> SourceSlot<K, H> for SourceBinding<S, P>
where
    S: Source,
    P: PartPresenter<S::Snapshot, Kind = K, Handle = H>,
{
    fn count(&self) -> usize {
        self.count
    }

    fn reload(&mut self) -> usize {
        let snapshot = self.source.read();
        self.count = self.presenter.count(&snapshot);
        self.snapshot = Some(snapshot);
        self.count
    }

    fn rediff(&mut self, recorder: &mut DiffRecorder) -> Rediff {
        let latest = self.source.read();
        let Some(previous) = self.snapshot.as_ref() else {
            return Rediff::Unsupported;
        };
        if !self.presenter.diff(previous, &latest, recorder) {
            return Rediff::Unsupported;
        }
        let actual = self.presenter.count(&latest);
        self.snapshot = Some(latest);
        self.count = actual;
        if recorder.item_count() != actual {
            return Rediff::Mismatch {
                recorded: recorder.item_count(),
                actual,
            };
        }
        Rediff::Applied
    }

    fn stable_id(&self, index: usize) -> u64 {
        match &self.snapshot {
            Some(snapshot) => self.presenter.stable_id(snapshot, index),
            None => index as u64,
        }
    }

    fn kind(&self, index: usize) -> Option<K> {
        self.snapshot
            .as_ref()
            .map(|snapshot| self.presenter.kind(snapshot, index))
    }

    fn bind(&self, index: usize, handle: &mut H) {
        if let Some(snapshot) = &self.snapshot {
            self.presenter.bind(snapshot, index, handle);
        }
    }

    fn recycle(&self, handle: &mut H) {
        self.presenter.recycle(handle);
    }

    fn observe(&mut self, observer: Rc<dyn Observer>) {
        if self.registration.is_none() {
            self.registration = Some(self.source.add_observer(observer));
        }
    }

    fn unobserve(&mut self) {
        if let Some(id) = self.registration.take() {
            self.source.remove_observer(id);
        }
    }

    fn is_observed(&self) -> bool {
        self.registration.is_some()
    }
}

trait StaticSlot<K, H> {
    fn stable_id(&self, index: usize) -> u64;
    fn kind(&self, index: usize) -> K;
    fn bind(&self, index: usize, handle: &mut H);
    fn recycle(&self, handle: &mut H);
}

struct StaticBinding<T, P> {
    item: T,
    presenter: P,
}

impl<T, P, K, H> StaticSlot<K, H> for StaticBinding<T, P>
where
    P: PartPresenter<T, Kind = K, Handle = H>,
{
    fn stable_id(&self, index: usize) -> u64 {
        self.presenter.stable_id(&self.item, index)
    }

    fn kind(&self, index: usize) -> K {
        self.presenter.kind(&self.item, index)
    }

    fn bind(&self, index: usize, handle: &mut H) {
        self.presenter.bind(&self.item, index, handle);
    }

    fn recycle(&self, handle: &mut H) {
        self.presenter.recycle(handle);
    }
}

type SpanBinder<H> = Box<dyn Fn(&mut H)>;

enum Body<K, H> {
    Source(Box<dyn SourceSlot<K, H>>),
    StaticItem {
        slot: Box<dyn StaticSlot<K, H>>,
        count: usize,
    },
    StaticSpan {
        kind: K,
        binder: Option<SpanBinder<H>>,
    },
}

/// One contiguous span of a composed list.
pub struct Part<K, H> {
    body: Body<K, H>,
    stable_id_base: u64,
    explicit_base: bool,
}

impl<K, H> fmt::Debug for Part<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("kind", &self.part_kind())
            .field("count", &self.count())
            .field("stable_id_base", &self.stable_id_base)
            .finish_non_exhaustive()
    }
}

impl<K: 'static, H: 'static> Part<K, H> {
    /// A part backed by a live source. Its count is unknown (zero) until the
    /// first reload.
    pub fn source<S, P>(source: Rc<S>, presenter: P) -> Self
    where
        S: Source + 'static,
        S::Snapshot: 'static,
        P: PartPresenter<S::Snapshot, Kind = K, Handle = H> + 'static,
    {
        Self::from_body(Body::Source(Box::new(SourceBinding {
            source,
            presenter,
            snapshot: None,
            count: 0,
            registration: None,
        })))
    }

    /// A fixed object whose item count is taken from `presenter` right now and
    /// never recomputed.
    pub fn static_item<T, P>(item: T, presenter: P) -> Self
    where
        T: 'static,
        P: PartPresenter<T, Kind = K, Handle = H> + 'static,
    {
        let count = presenter.count(&item);
        Self::from_body(Body::StaticItem {
            slot: Box::new(StaticBinding { item, presenter }),
            count,
        })
    }

    /// A single fixed slot of the given kind.
    pub fn static_span(kind: K) -> Self {
        Self::from_body(Body::StaticSpan { kind, binder: None })
    }

    /// A single fixed slot whose handle is prepared by `binder`.
    pub fn static_span_with(kind: K, binder: impl Fn(&mut H) + 'static) -> Self {
        Self::from_body(Body::StaticSpan {
            kind,
            binder: Some(Box::new(binder)),
        })
    }
}

impl<K, H> Part<K, H> {
    fn from_body(body: Body<K, H>) -> Self {
        Self {
            body,
            stable_id_base: 0,
            explicit_base: false,
        }
    }

    /// Overrides the value added to this part's local stable ids.
    pub fn with_stable_id_base(mut self, base: u64) -> Self {
        self.stable_id_base = base;
        self.explicit_base = true;
        self
    }

    pub fn part_kind(&self) -> PartKind {
        match &self.body {
            Body::Source(_) => PartKind::Source,
            Body::StaticItem { .. } => PartKind::StaticItem,
            Body::StaticSpan { .. } => PartKind::StaticSpan,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.body, Body::Source(_))
    }

    /// Item count as of the last reload or diff.
    pub fn count(&self) -> usize {
        match &self.body {
            Body::Source(slot) => slot.count(),
            Body::StaticItem { count, .. } => *count,
            Body::StaticSpan { .. } => 1,
        }
    }

    pub fn stable_id_base(&self) -> u64 {
        self.stable_id_base
    }

    pub(crate) fn assign_default_base(&mut self, base: u64) {
        if !self.explicit_base {
            self.stable_id_base = base;
        }
    }

    /// Re-reads the part and returns its fresh count.
    pub(crate) fn reload(&mut self) -> usize {
        match &mut self.body {
            Body::Source(slot) => slot.reload(),
            Body::StaticItem { count, .. } => *count,
            Body::StaticSpan { .. } => 1,
        }
    }

    /// Diffs a source part against a fresh read into `recorder`. Static parts
    /// never change and report nothing.
    pub(crate) fn rediff(&mut self, recorder: &mut DiffRecorder) -> Rediff {
        match &mut self.body {
            Body::Source(slot) => slot.rediff(recorder),
            Body::StaticItem { .. } | Body::StaticSpan { .. } => Rediff::Applied,
        }
    }

    pub(crate) fn stable_id(&self, local: usize) -> u64 {
        let local_id = match &self.body {
            Body::Source(slot) => slot.stable_id(local),
            Body::StaticItem { slot, .. } => slot.stable_id(local),
            Body::StaticSpan { .. } => 0,
        };
        self.stable_id_base.wrapping_add(local_id)
    }

    pub(crate) fn bind(&self, local: usize, handle: &mut H) {
        match &self.body {
            Body::Source(slot) => slot.bind(local, handle),
            Body::StaticItem { slot, .. } => slot.bind(local, handle),
            Body::StaticSpan { binder, .. } => {
                if let Some(binder) = binder {
                    binder(handle);
                }
            }
        }
    }

    pub(crate) fn recycle(&self, handle: &mut H) {
        match &self.body {
            Body::Source(slot) => slot.recycle(handle),
            Body::StaticItem { slot, .. } => slot.recycle(handle),
            Body::StaticSpan { .. } => {}
        }
    }

    pub(crate) fn observe(&mut self, observer: Rc<dyn Observer>) {
        if let Body::Source(slot) = &mut self.body {
            slot.observe(observer);
        }
    }

    pub(crate) fn unobserve(&mut self) {
        if let Body::Source(slot) = &mut self.body {
            slot.unobserve();
        }
    }

    pub fn is_observed(&self) -> bool {
        match &self.body {
            Body::Source(slot) => slot.is_observed(),
            _ => false,
        }
    }
}

impl<K: Clone, H> Part<K, H> {
    pub(crate) fn kind(&self, local: usize) -> Option<K> {
        match &self.body {
            Body::Source(slot) => slot.kind(local),
            Body::StaticItem { slot, .. } => Some(slot.kind(local)),
            Body::StaticSpan { kind, .. } => Some(kind.clone()),
        }
    }
}
