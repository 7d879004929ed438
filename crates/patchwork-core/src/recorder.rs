//! Diff recording and replay.
//!
//! A [`DiffRecorder`] sits between a part's presenter and the list observers
//! for the duration of one pass. Parts are visited strictly left to right; the
//! recorder validates each local event against the part's running length and
//! stores it already shifted into global coordinates. Nothing reaches the
//! observers until the whole pass succeeded, so a pass that has to fall back to
//! a coarse invalidation simply drops its records.
//!
//! Recorders are pooled through [`RecorderPool`] and keep their buffers across
//! passes, so a warmed-up coordinator records without allocating.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ComposedListError;
use crate::sink::{DiffCallback, ListUpdateSink, Payload};

/// Initial record capacity of recorders created by a pool.
pub const DEFAULT_RECORD_CAPACITY: usize = 16;

/// Upper bound on idle recorders kept by a pool.
pub const DEFAULT_MAX_POOLED: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffAction {
    Insert,
    Remove,
    Move,
    Change,
}

/// One recorded edit in global coordinates.
///
/// `second` is the item count for insert/remove/change and the destination
/// position for a move.
#[derive(Debug, Clone)]
pub struct DiffRecord {
    pub action: DiffAction,
    pub position: usize,
    pub second: usize,
    pub payload: Option<Payload>,
}

#[derive(Debug)]
pub struct DiffRecorder {
    /// Global start of the part currently being recorded.
    position_offset: usize,
    /// Running local length of the part currently being recorded.
    item_count: usize,
    part: usize,
    records: Vec<DiffRecord>,
    /// Live entries in `records`; slots past this are stale and get overwritten.
    record_count: usize,
    violation: Option<ComposedListError>,
}

impl Default for DiffRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_CAPACITY)
    }
}

impl DiffRecorder {
    pub fn new(record_capacity: usize) -> Self {
        Self {
            position_offset: 0,
            item_count: 0,
            part: 0,
            records: Vec::with_capacity(record_capacity),
            record_count: 0,
            violation: None,
        }
    }

    /// Starts recording `part`, whose span begins at `global_start` and
    /// currently holds `local_count` items.
    ///
    /// Parts must be started in increasing order within one pass.
    pub(crate) fn begin_part(&mut self, part: usize, global_start: usize, local_count: usize) {
        debug_assert!(
            global_start >= self.position_offset,
            "recorder moved backwards: {global_start} < {}",
            self.position_offset
        );
        self.part = part;
        self.position_offset = global_start;
        self.item_count = local_count;
    }

    /// Closes the current part and returns its new global end position.
    pub(crate) fn commit(&mut self) -> usize {
        self.position_offset += self.item_count;
        self.item_count = 0;
        self.position_offset
    }

    pub fn position_offset(&self) -> usize {
        self.position_offset
    }

    /// Local length of the current part after the events seen so far.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn records(&self) -> &[DiffRecord] {
        &self.records[..self.record_count]
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Physical buffer size, including stale slots kept for reuse.
    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    pub(crate) fn take_violation(&mut self) -> Option<ComposedListError> {
        self.violation.take()
    }

    /// Delivers every live record, in recording order, to `sink`.
    pub fn replay_into(&self, sink: &mut dyn ListUpdateSink) {
        for record in self.records() {
            match record.action {
                DiffAction::Insert => sink.on_inserted(record.position, record.second),
                DiffAction::Remove => sink.on_removed(record.position, record.second),
                DiffAction::Move => sink.on_moved(record.position, record.second),
                DiffAction::Change => {
                    sink.on_changed(record.position, record.second, record.payload.clone())
                }
            }
        }
    }

    /// Logically empties the recorder. The buffer keeps its allocation.
    pub fn reset(&mut self) {
        for record in &mut self.records[..self.record_count] {
            record.payload = None;
        }
        self.record_count = 0;
        self.position_offset = 0;
        self.item_count = 0;
        self.part = 0;
        self.violation = None;
    }

    fn push(&mut self, action: DiffAction, position: usize, second: usize, payload: Option<Payload>) {
        let record = DiffRecord {
            action,
            position,
            second,
            payload,
        };
        if self.record_count < self.records.len() {
            self.records[self.record_count] = record;
        } else {
            self.records.push(record);
        }
        self.record_count += 1;
    }

    /// Latches the first out-of-bounds event. Returns `false` if the event must
    /// be dropped.
    fn accept(&mut self, action: DiffAction, position: usize, second: usize, valid: bool) -> bool {
        if self.violation.is_some() {
            return false;
        }
        if !valid {
            self.violation = Some(ComposedListError::InvalidDiff {
                part: self.part,
                action,
                position,
                second,
                local_count: self.item_count,
            });
            return false;
        }
        true
    }

    /// An empty range may sit at the end, like an empty insert.
    fn range_in_bounds(&self, position: usize, count: usize) -> bool {
        if count == 0 {
            return position <= self.item_count;
        }
        position < self.item_count
            && position
                .checked_add(count)
                .is_some_and(|end| end <= self.item_count)
    }
}

impl DiffCallback for DiffRecorder {
    fn on_inserted(&mut self, position: usize, count: usize) {
        // The grown part must still be addressable in global coordinates.
        let valid = position <= self.item_count
            && self
                .item_count
                .checked_add(count)
                .and_then(|grown| self.position_offset.checked_add(grown))
                .is_some();
        if !self.accept(DiffAction::Insert, position, count, valid) || count == 0 {
            return;
        }
        self.item_count += count;
        self.push(DiffAction::Insert, self.position_offset + position, count, None);
    }

    fn on_removed(&mut self, position: usize, count: usize) {
        let valid = self.range_in_bounds(position, count);
        if !self.accept(DiffAction::Remove, position, count, valid) || count == 0 {
            return;
        }
        self.item_count -= count;
        self.push(DiffAction::Remove, self.position_offset + position, count, None);
    }

    fn on_moved(&mut self, from: usize, to: usize) {
        let valid = from < self.item_count && to < self.item_count;
        if !self.accept(DiffAction::Move, from, to, valid) || from == to {
            return;
        }
        self.push(
            DiffAction::Move,
            self.position_offset + from,
            self.position_offset + to,
            None,
        );
    }

    fn on_changed(&mut self, position: usize, count: usize, payload: Option<Payload>) {
        let valid = self.range_in_bounds(position, count);
        if !self.accept(DiffAction::Change, position, count, valid) || count == 0 {
            return;
        }
        self.push(DiffAction::Change, self.position_offset + position, count, payload);
    }
}

/// Shared stock of idle recorders.
///
/// Cloning the pool shares it. Coordinators on different update threads may
/// hold clones of the same pool; the lock only guards the handoff.
#[derive(Debug, Clone)]
pub struct RecorderPool {
    idle: Arc<Mutex<Vec<DiffRecorder>>>,
    record_capacity: usize,
    max_pooled: usize,
}

impl Default for RecorderPool {
    fn default() -> Self {
        Self::with_limits(DEFAULT_RECORD_CAPACITY, DEFAULT_MAX_POOLED)
    }
}

impl RecorderPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(record_capacity: usize, max_pooled: usize) -> Self {
        Self {
            idle: Arc::new(Mutex::new(Vec::new())),
            record_capacity,
            max_pooled,
        }
    }

    pub fn acquire(&self) -> DiffRecorder {
        let recycled = self.lock().pop();
        recycled.unwrap_or_else(|| DiffRecorder::new(self.record_capacity))
    }

    pub fn release(&self, mut recorder: DiffRecorder) {
        recorder.reset();
        let mut idle = self.lock();
        if idle.len() < self.max_pooled {
            idle.push(recorder);
        }
    }

    /// Number of idle recorders currently held.
    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    // A panic while holding the lock cannot leave the stack half-updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<DiffRecorder>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
