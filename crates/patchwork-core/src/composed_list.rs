//! The composed-list coordinator.
//!
//! [`ComposedList`] owns an ordered array of [`Part`]s and the cumulative
//! [`EndPositions`] table over them. Both are built once and updated in place.
//! Two update paths keep the table and the list observers in sync:
//!
//! - [`ComposedList::on_global_invalidate`] re-diffs every part left to right;
//! - [`ComposedList::on_part_invalidate`] re-diffs a single part and shifts the
//!   ends of every later part by the resulting length delta.
//!
//! Either pass is all or nothing. Events are buffered in a pooled
//! [`DiffRecorder`] and only replayed once every part involved produced a
//! valid diff. When a part cannot diff, observers get exactly one
//! [`ListUpdateSink::on_invalidated`] and the list reloads lazily on the next
//! query.

use std::ops::Range;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::bindings::{BindToken, BindingTable};
use crate::config::ComposedListConfig;
use crate::error::{ComposedListError, Result};
use crate::observer::{GlobalObserver, Invalidation, InvalidationQueue, Observer, PartObserver};
use crate::part::{Part, Rediff};
use crate::positions::EndPositions;
use crate::recorder::{DiffRecorder, RecorderPool, DEFAULT_MAX_POOLED};
use crate::sink::ListUpdateSink;

/// Registration of an external list observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListObserverId(u64);

/// Merges an ordered sequence of parts into one globally indexed list.
///
/// All methods are expected to run on one update thread. Source callbacks
/// arrive through the list's [`InvalidationQueue`] and are applied by
/// [`flush_invalidations`](Self::flush_invalidations).
pub struct ComposedList<K, H> {
    parts: Vec<Part<K, H>>,
    ends: EndPositions,
    /// Counts are stale; the next query reloads every part.
    invalid: bool,
    observing: bool,
    observers: Vec<(ListObserverId, Box<dyn ListUpdateSink>)>,
    next_observer_id: u64,
    bindings: BindingTable,
    pool: RecorderPool,
    queue: InvalidationQueue,
    config: ComposedListConfig,
}

impl<K, H> std::fmt::Debug for ComposedList<K, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedList")
            .field("parts", &self.parts)
            .field("ends", &self.ends)
            .field("invalid", &self.invalid)
            .field("observing", &self.observing)
            .field("observers", &self.observers.len())
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl<K, H> ComposedList<K, H> {
    pub fn new(parts: Vec<Part<K, H>>) -> Result<Self> {
        Self::with_config(parts, ComposedListConfig::default())
    }

    pub fn with_config(parts: Vec<Part<K, H>>, config: ComposedListConfig) -> Result<Self> {
        let pool = RecorderPool::with_limits(config.record_capacity, DEFAULT_MAX_POOLED);
        Self::with_pool(parts, config, pool)
    }

    /// Creates a list that draws its recorders from `pool`, which may be shared
    /// with other lists.
    pub fn with_pool(
        mut parts: Vec<Part<K, H>>,
        config: ComposedListConfig,
        pool: RecorderPool,
    ) -> Result<Self> {
        if parts.is_empty() {
            return Err(ComposedListError::NoParts);
        }
        for (index, part) in parts.iter_mut().enumerate() {
            part.assign_default_base(config.stable_id_base(index));
        }
        // Nothing is queued until observation starts.
        let queue = InvalidationQueue::new();
        queue.set_open(false);
        Ok(Self {
            ends: EndPositions::new(parts.len()),
            parts,
            invalid: true,
            observing: false,
            observers: Vec::new(),
            next_observer_id: 0,
            bindings: BindingTable::default(),
            pool,
            queue,
            config,
        })
    }

    pub fn config(&self) -> &ComposedListConfig {
        &self.config
    }

    pub fn pool(&self) -> &RecorderPool {
        &self.pool
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn part(&self, index: usize) -> Option<&Part<K, H>> {
        self.parts.get(index)
    }

    /// Cumulative end positions as of the last update. May be stale while
    /// [`is_invalid`](Self::is_invalid) is true.
    pub fn end_positions(&self) -> &[usize] {
        self.ends.as_slice()
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn outstanding_bindings(&self) -> usize {
        self.bindings.len()
    }

    // ---------------------------------------------------------------------
    // List observers
    // ---------------------------------------------------------------------

    pub fn add_list_observer(&mut self, sink: Box<dyn ListUpdateSink>) -> ListObserverId {
        let id = ListObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, sink));
        id
    }

    pub fn remove_list_observer(&mut self, id: ListObserverId) -> Option<Box<dyn ListUpdateSink>> {
        let index = self.observers.iter().position(|(other, _)| *other == id)?;
        Some(self.observers.remove(index).1)
    }

    pub fn list_observer_count(&self) -> usize {
        self.observers.len()
    }

    // ---------------------------------------------------------------------
    // Source observation
    // ---------------------------------------------------------------------

    /// Registers with every source and brings each source part up to date
    /// with a fresh read.
    pub fn start_observing(&mut self) -> Result<()> {
        if self.observing {
            return Err(ComposedListError::AlreadyObserving);
        }
        self.observing = true;
        self.queue.set_open(true);
        for (index, part) in self.parts.iter_mut().enumerate() {
            if part.is_source() {
                part.observe(Rc::new(PartObserver::new(index, self.queue.clone())));
            }
        }
        log::debug!("composed list observing {} parts", self.parts.len());
        for index in 0..self.parts.len() {
            if self.parts[index].is_source() {
                self.on_part_invalidate(index)?;
            }
        }
        Ok(())
    }

    pub fn stop_observing(&mut self) -> Result<()> {
        if !self.observing {
            return Err(ComposedListError::NotObserving);
        }
        for part in &mut self.parts {
            part.unobserve();
        }
        self.queue.set_open(false);
        self.observing = false;
        log::debug!("composed list stopped observing");
        Ok(())
    }

    /// Observer to register with whole-composition triggers that are not tied
    /// to a single part. Its notifications are dropped while the list is not
    /// observing.
    pub fn global_observer(&self) -> Rc<dyn Observer> {
        Rc::new(GlobalObserver::new(self.queue.clone()))
    }

    pub fn invalidation_queue(&self) -> &InvalidationQueue {
        &self.queue
    }

    /// Installs a callback run when the first invalidation of a batch arrives,
    /// so the host can schedule a [`flush_invalidations`](Self::flush_invalidations).
    pub fn set_waker(&self, waker: Option<Rc<dyn Fn()>>) {
        self.queue.set_waker(waker);
    }

    /// Applies queued invalidations.
    ///
    /// A pending global invalidation subsumes part invalidations of the same
    /// batch. Repeated part invalidations run once, in arrival order.
    pub fn flush_invalidations(&mut self) -> Result<()> {
        let pending = self.queue.drain();
        if pending.is_empty() {
            return Ok(());
        }
        if pending.contains(&Invalidation::Global) {
            return self.on_global_invalidate();
        }
        let mut seen: SmallVec<[usize; 4]> = SmallVec::new();
        for invalidation in pending {
            if let Invalidation::Part(part) = invalidation {
                if !seen.contains(&part) {
                    seen.push(part);
                    self.on_part_invalidate(part)?;
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Counts and positions
    // ---------------------------------------------------------------------

    /// Total number of items, reloading every part first if counts are stale.
    pub fn total_count(&mut self) -> usize {
        self.ensure_loaded();
        self.ends.total()
    }

    /// Maps a global position to `(part, local)`.
    pub fn resolve(&mut self, position: usize) -> Result<(usize, usize)> {
        self.ensure_loaded();
        self.ends.resolve(position)
    }

    /// Maps a part-local position back to a global one.
    pub fn global_position(&mut self, part: usize, local: usize) -> Result<usize> {
        self.check_part(part)?;
        self.ensure_loaded();
        let range = self.ends.range_of(part);
        if local >= range.len() {
            return Err(ComposedListError::PositionOutOfRange {
                position: local,
                total: range.len(),
            });
        }
        Ok(range.start + local)
    }

    /// Global span covered by `part`.
    pub fn part_range(&mut self, part: usize) -> Result<Range<usize>> {
        self.check_part(part)?;
        self.ensure_loaded();
        Ok(self.ends.range_of(part))
    }

    /// Stable id of the item at `position`, unique across parts as long as
    /// their stable-id bases keep local ids apart.
    pub fn stable_id(&mut self, position: usize) -> Result<u64> {
        let (part, local) = self.resolve(position)?;
        Ok(self.parts[part].stable_id(local))
    }

    // ---------------------------------------------------------------------
    // Binding
    // ---------------------------------------------------------------------

    /// Binds the item at `position` into `handle` and returns the token that
    /// routes the later [`recycle`](Self::recycle).
    pub fn resolve_and_bind(&mut self, position: usize, handle: &mut H) -> Result<BindToken> {
        let (part, local) = self.resolve(position)?;
        self.parts[part].bind(local, handle);
        Ok(self.bindings.insert(part))
    }

    /// Hands `handle` back to the part that bound it.
    pub fn recycle(&mut self, token: BindToken, handle: &mut H) -> Result<()> {
        let part = self
            .bindings
            .take(token)
            .ok_or(ComposedListError::UnknownBinding(token))?;
        self.parts[part].recycle(handle);
        Ok(())
    }

    /// Part that produced an outstanding binding.
    pub fn bound_part(&self, token: BindToken) -> Option<usize> {
        self.bindings.get(token)
    }

    // ---------------------------------------------------------------------
    // Update passes
    // ---------------------------------------------------------------------

    /// Re-diffs every part after a whole-composition trigger.
    pub fn on_global_invalidate(&mut self) -> Result<()> {
        if self.invalid {
            log::trace!("global invalidation ignored; reload pending");
            return Ok(());
        }
        if self.observers.is_empty() {
            self.reload();
            return Ok(());
        }

        let mut recorder = self.pool.acquire();
        for index in 0..self.parts.len() {
            let start = recorder.position_offset();
            recorder.begin_part(index, start, self.parts[index].count());
            match self.rediff_into(index, &mut recorder) {
                Ok(true) => {}
                Ok(false) => {
                    log::warn!("part {index} cannot diff; invalidating composed list");
                    self.abandon_pass(recorder);
                    return Ok(());
                }
                Err(error) => {
                    self.abandon_pass(recorder);
                    return Err(error);
                }
            }
            let end = recorder.commit();
            self.ends.set_end(index, end);
        }
        self.finish_pass(recorder);
        Ok(())
    }

    /// Re-diffs the source part at `part` after its source changed.
    pub fn on_part_invalidate(&mut self, part: usize) -> Result<()> {
        self.check_part(part)?;
        if !self.parts[part].is_source() {
            return Err(ComposedListError::NotASourcePart { part });
        }
        if self.invalid {
            log::trace!("part {part} invalidation ignored; reload pending");
            return Ok(());
        }
        let start = self.ends.start_of(part);
        if self.observers.is_empty() {
            let count = self.parts[part].reload();
            self.ends.move_end(part, start + count);
            return Ok(());
        }

        let mut recorder = self.pool.acquire();
        recorder.begin_part(part, start, self.parts[part].count());
        match self.rediff_into(part, &mut recorder) {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("part {part} cannot diff; invalidating composed list");
                self.abandon_pass(recorder);
                return Ok(());
            }
            Err(error) => {
                self.abandon_pass(recorder);
                return Err(error);
            }
        }
        let end = recorder.commit();
        self.ends.move_end(part, end);
        self.finish_pass(recorder);
        Ok(())
    }

    fn ensure_loaded(&mut self) {
        if self.invalid {
            self.reload();
        }
    }

    /// Recomputes every count and rebuilds the end table in one in-order pass.
    fn reload(&mut self) {
        let mut end = 0;
        for (index, part) in self.parts.iter_mut().enumerate() {
            end += part.reload();
            self.ends.set_end(index, end);
        }
        self.invalid = false;
        log::debug!(
            "composed list reloaded: {} parts, {} items",
            self.parts.len(),
            end
        );
    }

    /// Diffs one part into `recorder`. `Ok(false)` means the part cannot
    /// describe its change item by item.
    fn rediff_into(&mut self, index: usize, recorder: &mut DiffRecorder) -> Result<bool> {
        let outcome = self.parts[index].rediff(recorder);
        if let Some(violation) = recorder.take_violation() {
            return Err(violation);
        }
        match outcome {
            Rediff::Applied => Ok(true),
            Rediff::Unsupported => Ok(false),
            Rediff::Mismatch { recorded, actual } => Err(ComposedListError::CountMismatch {
                part: index,
                recorded,
                actual,
            }),
        }
    }

    fn abandon_pass(&mut self, recorder: DiffRecorder) {
        self.pool.release(recorder);
        self.invalid = true;
        for (_, observer) in &mut self.observers {
            observer.on_invalidated();
        }
    }

    fn finish_pass(&mut self, recorder: DiffRecorder) {
        if !recorder.is_empty() {
            log::trace!(
                "replaying {} records to {} observers",
                recorder.records().len(),
                self.observers.len()
            );
            for (_, observer) in &mut self.observers {
                recorder.replay_into(observer.as_mut());
            }
        }
        self.pool.release(recorder);
    }

    fn check_part(&self, part: usize) -> Result<()> {
        if part >= self.parts.len() {
            return Err(ComposedListError::PartOutOfRange {
                part,
                parts: self.parts.len(),
            });
        }
        Ok(())
    }
}

impl<K: Clone, H> ComposedList<K, H> {
    /// Presentation kind of the item at `position`.
    pub fn kind(&mut self, position: usize) -> Result<K> {
        let (part, local) = self.resolve(position)?;
        let total = self.ends.total();
        self.parts[part]
            .kind(local)
            .ok_or(ComposedListError::PositionOutOfRange { position, total })
    }
}

impl<K, H> Drop for ComposedList<K, H> {
    fn drop(&mut self) {
        if self.observing {
            for part in &mut self.parts {
                part.unobserve();
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/composed_list_tests.rs"]
mod tests;
