//! List observers for tests: an event log and a replaying mirror.

use std::cell::RefCell;
use std::rc::Rc;

use patchwork_core::{ComposedList, ListUpdateSink, Payload};

use crate::handle::ProbeHandle;

/// One notification delivered to a list observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEvent {
    Inserted { position: usize, count: usize },
    Removed { position: usize, count: usize },
    Moved { from: usize, to: usize },
    Changed { position: usize, count: usize },
    Invalidated,
}

#[derive(Default)]
struct LogState {
    events: Vec<ListEvent>,
    payloads: Vec<Payload>,
}

/// Shared record of everything a [`RecordingSink`] received.
///
/// Clones share the same log, so a test keeps one clone and hands
/// [`EventLog::sink`] to the list.
#[derive(Clone, Default)]
pub struct EventLog {
    state: Rc<RefCell<LogState>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> Box<dyn ListUpdateSink> {
        Box::new(RecordingSink { log: self.clone() })
    }

    pub fn events(&self) -> Vec<ListEvent> {
        self.state.borrow().events.clone()
    }

    /// Returns and clears the events recorded so far.
    pub fn take(&self) -> Vec<ListEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }

    pub fn invalidations(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|event| matches!(event, ListEvent::Invalidated))
            .count()
    }

    /// Payloads attached to change events, in delivery order.
    pub fn payloads(&self) -> Vec<Payload> {
        self.state.borrow().payloads.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.events.clear();
        state.payloads.clear();
    }

    fn push(&self, event: ListEvent) {
        self.state.borrow_mut().events.push(event);
    }
}

pub struct RecordingSink {
    log: EventLog,
}

impl ListUpdateSink for RecordingSink {
    fn on_inserted(&mut self, position: usize, count: usize) {
        self.log.push(ListEvent::Inserted { position, count });
    }

    fn on_removed(&mut self, position: usize, count: usize) {
        self.log.push(ListEvent::Removed { position, count });
    }

    fn on_moved(&mut self, from: usize, to: usize) {
        self.log.push(ListEvent::Moved { from, to });
    }

    fn on_changed(&mut self, position: usize, count: usize, payload: Option<Payload>) {
        self.log.push(ListEvent::Changed { position, count });
        if let Some(payload) = payload {
            self.log.state.borrow_mut().payloads.push(payload);
        }
    }

    fn on_invalidated(&mut self) {
        self.log.push(ListEvent::Invalidated);
    }
}

#[derive(Default)]
struct MirrorState {
    rows: Vec<Option<String>>,
    stale: bool,
}

/// Replays list events onto a local copy of the rendered rows.
///
/// Inserted and changed rows become `None` until [`Mirror::refresh`] binds
/// them again. After an invalidation the whole copy is stale and the next
/// refresh rebuilds it. A mirror that was only ever updated by events must
/// render the same rows as a fresh read of the list.
#[derive(Clone, Default)]
pub struct Mirror {
    state: Rc<RefCell<MirrorState>>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mirror from the list's current contents.
    pub fn of<K: 'static>(
        list: &mut ComposedList<K, ProbeHandle>,
    ) -> patchwork_core::Result<Self> {
        let mirror = Self::new();
        mirror.rebuild(list)?;
        Ok(mirror)
    }

    pub fn sink(&self) -> Box<dyn ListUpdateSink> {
        Box::new(MirrorSink {
            mirror: self.clone(),
        })
    }

    pub fn rows(&self) -> Vec<Option<String>> {
        self.state.borrow().rows.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stale(&self) -> bool {
        self.state.borrow().stale
    }

    /// Rows that still need binding.
    pub fn dirty(&self) -> usize {
        self.state
            .borrow()
            .rows
            .iter()
            .filter(|row| row.is_none())
            .count()
    }

    /// Binds every dirty row, or rebuilds everything if the mirror is stale.
    pub fn refresh<K: 'static>(
        &self,
        list: &mut ComposedList<K, ProbeHandle>,
    ) -> patchwork_core::Result<Vec<String>> {
        if self.is_stale() {
            return self.rebuild(list);
        }
        let dirty: Vec<usize> = self
            .state
            .borrow()
            .rows
            .iter()
            .enumerate()
            .filter_map(|(position, row)| row.is_none().then_some(position))
            .collect();
        for position in dirty {
            let content = bind_row(list, position)?;
            self.state.borrow_mut().rows[position] = Some(content);
        }
        Ok(self.rendered())
    }

    pub fn rebuild<K: 'static>(
        &self,
        list: &mut ComposedList<K, ProbeHandle>,
    ) -> patchwork_core::Result<Vec<String>> {
        let rows = render(list)?;
        let mut state = self.state.borrow_mut();
        state.rows = rows.iter().cloned().map(Some).collect();
        state.stale = false;
        Ok(rows)
    }

    fn rendered(&self) -> Vec<String> {
        self.state
            .borrow()
            .rows
            .iter()
            .map(|row| row.clone().unwrap_or_default())
            .collect()
    }
}

/// Reads every row of the list by binding it into a fresh [`ProbeHandle`].
pub fn render<K: 'static>(
    list: &mut ComposedList<K, ProbeHandle>,
) -> patchwork_core::Result<Vec<String>> {
    let total = list.total_count();
    (0..total).map(|position| bind_row(list, position)).collect()
}

fn bind_row<K: 'static>(
    list: &mut ComposedList<K, ProbeHandle>,
    position: usize,
) -> patchwork_core::Result<String> {
    let mut handle = ProbeHandle::new();
    let token = list.resolve_and_bind(position, &mut handle)?;
    let content = handle.content.clone().unwrap_or_default();
    list.recycle(token, &mut handle)?;
    Ok(content)
}

pub struct MirrorSink {
    mirror: Mirror,
}

impl MirrorSink {
    fn rows_len(&self) -> usize {
        self.mirror.state.borrow().rows.len()
    }
}

impl ListUpdateSink for MirrorSink {
    fn on_inserted(&mut self, position: usize, count: usize) {
        assert!(
            position <= self.rows_len(),
            "insert at {} past mirror length {}",
            position,
            self.rows_len()
        );
        let mut state = self.mirror.state.borrow_mut();
        state
            .rows
            .splice(position..position, std::iter::repeat(None).take(count));
    }

    fn on_removed(&mut self, position: usize, count: usize) {
        assert!(
            position + count <= self.rows_len(),
            "remove {}..{} past mirror length {}",
            position,
            position + count,
            self.rows_len()
        );
        self.mirror
            .state
            .borrow_mut()
            .rows
            .drain(position..position + count);
    }

    fn on_moved(&mut self, from: usize, to: usize) {
        let len = self.rows_len();
        assert!(
            from < len && to < len,
            "move {} -> {} outside mirror length {}",
            from,
            to,
            len
        );
        let mut state = self.mirror.state.borrow_mut();
        let row = state.rows.remove(from);
        state.rows.insert(to, row);
    }

    fn on_changed(&mut self, position: usize, count: usize, _payload: Option<Payload>) {
        assert!(
            position + count <= self.rows_len(),
            "change {}..{} past mirror length {}",
            position,
            position + count,
            self.rows_len()
        );
        for row in &mut self.mirror.state.borrow_mut().rows[position..position + count] {
            *row = None;
        }
    }

    fn on_invalidated(&mut self) {
        let mut state = self.mirror.state.borrow_mut();
        state.rows.clear();
        state.stale = true;
    }
}
