use super::*;
use crate::observer::{ObserverId, Source};
use crate::part::PartPresenter;
use crate::sink::{DiffCallback, Payload};
use std::cell::{Cell, RefCell};

/// Source whose snapshot is just an item count.
#[derive(Default)]
struct Counter {
    value: Cell<usize>,
    observers: RefCell<Vec<(ObserverId, Rc<dyn Observer>)>>,
    next_id: Cell<u64>,
}

impl Counter {
    fn new(value: usize) -> Rc<Self> {
        let counter = Rc::new(Self::default());
        counter.value.set(value);
        counter
    }

    fn set(&self, value: usize) {
        self.value.set(value);
        let observers: Vec<_> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer.on_changed();
        }
    }

    fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }
}

impl Source for Counter {
    type Snapshot = usize;

    fn read(&self) -> usize {
        self.value.get()
    }

    fn add_observer(&self, observer: Rc<dyn Observer>) -> ObserverId {
        let id = ObserverId::new(self.next_id.get());
        self.next_id.set(id.raw() + 1);
        self.observers.borrow_mut().push((id, observer));
        id
    }

    fn remove_observer(&self, id: ObserverId) {
        self.observers.borrow_mut().retain(|(other, _)| *other != id);
    }
}

/// Presents `n` identical rows. Growth is reported as an insert at
/// `grow_at` (clamped to the old length), shrinking as a tail removal.
struct Rows {
    diffable: bool,
    grow_at: usize,
    count_calls: Rc<Cell<usize>>,
}

impl Rows {
    fn new() -> Self {
        Self {
            diffable: true,
            grow_at: usize::MAX,
            count_calls: Rc::new(Cell::new(0)),
        }
    }

    fn growing_at(grow_at: usize) -> Self {
        Self {
            grow_at,
            ..Self::new()
        }
    }

    fn opaque() -> Self {
        Self {
            diffable: false,
            ..Self::new()
        }
    }
}

impl PartPresenter<usize> for Rows {
    type Kind = u8;
    type Handle = Vec<String>;

    fn count(&self, snapshot: &usize) -> usize {
        self.count_calls.set(self.count_calls.get() + 1);
        *snapshot
    }

    fn kind(&self, _snapshot: &usize, _index: usize) -> u8 {
        1
    }

    fn bind(&self, _snapshot: &usize, index: usize, handle: &mut Vec<String>) {
        handle.push(format!("row {index}"));
    }

    fn recycle(&self, handle: &mut Vec<String>) {
        handle.push("recycled row".into());
    }

    fn diff(&self, old: &usize, new: &usize, callback: &mut dyn DiffCallback) -> bool {
        if !self.diffable {
            return false;
        }
        if new > old {
            callback.on_inserted(self.grow_at.min(*old), new - old);
        } else if new < old {
            callback.on_removed(*new, old - new);
        }
        true
    }
}

/// Presenter that reports a removal past its own end.
struct Liar;

impl PartPresenter<usize> for Liar {
    type Kind = u8;
    type Handle = Vec<String>;

    fn count(&self, snapshot: &usize) -> usize {
        *snapshot
    }

    fn kind(&self, _snapshot: &usize, _index: usize) -> u8 {
        9
    }

    fn bind(&self, _snapshot: &usize, _index: usize, _handle: &mut Vec<String>) {}

    fn diff(&self, old: &usize, _new: &usize, callback: &mut dyn DiffCallback) -> bool {
        callback.on_removed(*old, 1);
        true
    }
}

/// Presenter whose events do not add up to its count.
struct Miscount;

impl PartPresenter<usize> for Miscount {
    type Kind = u8;
    type Handle = Vec<String>;

    fn count(&self, snapshot: &usize) -> usize {
        *snapshot
    }

    fn kind(&self, _snapshot: &usize, _index: usize) -> u8 {
        0
    }

    fn bind(&self, _snapshot: &usize, _index: usize, _handle: &mut Vec<String>) {}

    fn diff(&self, _old: &usize, _new: &usize, _callback: &mut dyn DiffCallback) -> bool {
        true
    }
}

#[derive(Clone, Default)]
struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl ListUpdateSink for Log {
    fn on_inserted(&mut self, position: usize, count: usize) {
        self.0.borrow_mut().push(format!("insert {position} {count}"));
    }

    fn on_removed(&mut self, position: usize, count: usize) {
        self.0.borrow_mut().push(format!("remove {position} {count}"));
    }

    fn on_moved(&mut self, from: usize, to: usize) {
        self.0.borrow_mut().push(format!("move {from} {to}"));
    }

    fn on_changed(&mut self, position: usize, count: usize, _payload: Option<Payload>) {
        self.0.borrow_mut().push(format!("change {position} {count}"));
    }

    fn on_invalidated(&mut self) {
        self.0.borrow_mut().push("invalidate".into());
    }
}

type List = ComposedList<u8, Vec<String>>;

fn observed(list: &mut List) -> Log {
    let log = Log::default();
    list.add_list_observer(Box::new(log.clone()));
    log
}

#[test]
fn empty_composition_is_rejected() {
    let result = List::new(Vec::new());
    assert!(matches!(result, Err(ComposedListError::NoParts)));
}

#[test]
fn total_count_reloads_once() {
    let rows = Rows::new();
    let calls = Rc::clone(&rows.count_calls);
    let mut list = List::new(vec![
        Part::static_span(0),
        Part::source(Counter::new(3), rows),
    ])
    .unwrap();

    assert!(list.is_invalid());
    assert_eq!(list.total_count(), 4);
    assert_eq!(calls.get(), 1);
    assert_eq!(list.total_count(), 4);
    assert_eq!(calls.get(), 1);
    assert!(!list.is_invalid());
}

#[test]
fn single_part_insert_is_shifted_into_global_coordinates() {
    let middle = Counter::new(2);
    let mut list = List::new(vec![
        Part::static_span(0),
        Part::source(Rc::clone(&middle), Rows::growing_at(1)),
        Part::static_span(2),
    ])
    .unwrap();
    assert_eq!(list.total_count(), 4);
    assert_eq!(list.resolve(0), Ok((0, 0)));
    assert_eq!(list.resolve(1), Ok((1, 0)));
    assert_eq!(list.resolve(3), Ok((2, 0)));

    let log = observed(&mut list);
    middle.set(4);
    list.on_part_invalidate(1).unwrap();

    assert_eq!(log.take(), vec!["insert 2 2"]);
    assert_eq!(list.end_positions(), &[1, 5, 6]);
    assert_eq!(list.total_count(), 6);
}

#[test]
fn shrinking_part_shifts_later_ends_down() {
    let first = Counter::new(5);
    let mut list = List::new(vec![
        Part::source(Rc::clone(&first), Rows::new()),
        Part::static_span(1),
    ])
    .unwrap();
    list.total_count();
    let log = observed(&mut list);

    first.set(2);
    list.on_part_invalidate(0).unwrap();
    assert_eq!(log.take(), vec!["remove 2 3"]);
    assert_eq!(list.end_positions(), &[2, 3]);
}

#[test]
fn unsupported_diff_invalidates_once() {
    let first = Counter::new(1);
    let second = Counter::new(1);
    let mut list = List::new(vec![
        Part::source(Rc::clone(&first), Rows::new()),
        Part::source(Rc::clone(&second), Rows::opaque()),
    ])
    .unwrap();
    list.total_count();
    let log = observed(&mut list);

    first.set(3);
    second.set(2);
    list.on_global_invalidate().unwrap();

    assert_eq!(log.take(), vec!["invalidate"]);
    assert!(list.is_invalid());
    assert_eq!(list.total_count(), 5);
    assert_eq!(list.pool().idle_count(), 1);
}

#[test]
fn updates_are_ignored_while_reload_is_pending() {
    let source = Counter::new(1);
    let mut list = List::new(vec![Part::source(Rc::clone(&source), Rows::new())]).unwrap();
    let log = observed(&mut list);

    source.set(2);
    list.on_part_invalidate(0).unwrap();
    list.on_global_invalidate().unwrap();
    assert!(log.take().is_empty());
    assert_eq!(list.total_count(), 2);
}

#[test]
fn without_observers_counts_are_recomputed_silently() {
    let source = Counter::new(1);
    let mut list = List::new(vec![
        Part::source(Rc::clone(&source), Rows::opaque()),
        Part::static_span(0),
    ])
    .unwrap();
    list.total_count();

    source.set(4);
    list.on_part_invalidate(0).unwrap();
    assert!(!list.is_invalid());
    assert_eq!(list.end_positions(), &[4, 5]);

    source.set(0);
    list.on_global_invalidate().unwrap();
    assert_eq!(list.end_positions(), &[0, 1]);
}

#[test]
fn whole_list_rediff_offsets_each_part_by_new_lengths() {
    let first = Counter::new(1);
    let second = Counter::new(2);
    let mut list = List::new(vec![
        Part::source(Rc::clone(&first), Rows::new()),
        Part::static_span(0),
        Part::source(Rc::clone(&second), Rows::new()),
    ])
    .unwrap();
    list.total_count();
    let log = observed(&mut list);

    first.set(3);
    second.set(1);
    list.on_global_invalidate().unwrap();

    assert_eq!(log.take(), vec!["insert 1 2", "remove 5 1"]);
    assert_eq!(list.end_positions(), &[3, 4, 5]);
}

#[test]
fn observation_must_be_paired() {
    let source = Counter::new(1);
    let mut list = List::new(vec![Part::source(Rc::clone(&source), Rows::new())]).unwrap();

    assert_eq!(list.stop_observing(), Err(ComposedListError::NotObserving));
    list.start_observing().unwrap();
    assert_eq!(list.start_observing(), Err(ComposedListError::AlreadyObserving));
    assert_eq!(source.observer_count(), 1);
    list.stop_observing().unwrap();
    assert_eq!(source.observer_count(), 0);
    assert!(!list.is_observing());
}

#[test]
fn source_changes_are_queued_until_flushed() {
    let source = Counter::new(1);
    let mut list = List::new(vec![
        Part::static_span(0),
        Part::source(Rc::clone(&source), Rows::new()),
    ])
    .unwrap();
    list.total_count();
    let log = observed(&mut list);
    list.start_observing().unwrap();

    source.set(2);
    source.set(3);
    assert_eq!(list.invalidation_queue().len(), 2);
    assert!(log.take().is_empty());

    list.flush_invalidations().unwrap();
    assert_eq!(log.take(), vec!["insert 2 2"]);
    assert!(list.invalidation_queue().is_empty());
}

#[test]
fn start_observing_catches_up_with_changes_made_while_stopped() {
    let source = Counter::new(2);
    let mut list = List::new(vec![Part::source(Rc::clone(&source), Rows::new())]).unwrap();
    list.total_count();
    let log = observed(&mut list);

    source.set(5);
    list.start_observing().unwrap();
    assert_eq!(log.take(), vec!["insert 2 3"]);
    assert_eq!(list.total_count(), 5);
}

#[test]
fn global_observer_runs_whole_list_pass() {
    let source = Counter::new(1);
    let mut list = List::new(vec![Part::source(Rc::clone(&source), Rows::new())]).unwrap();
    list.total_count();
    let log = observed(&mut list);
    list.start_observing().unwrap();

    source.value.set(2);
    list.global_observer().on_changed();
    list.invalidation_queue().push(Invalidation::Part(0));
    list.flush_invalidations().unwrap();
    assert_eq!(log.take(), vec!["insert 1 1"]);
}

#[test]
fn global_trigger_is_ignored_unless_observing() {
    let source = Counter::new(1);
    let mut list = List::new(vec![Part::source(Rc::clone(&source), Rows::new())]).unwrap();
    list.total_count();
    let log = observed(&mut list);
    let global = list.global_observer();

    global.on_changed();
    assert!(list.invalidation_queue().is_empty());

    list.start_observing().unwrap();
    list.stop_observing().unwrap();
    source.value.set(3);
    global.on_changed();
    assert!(list.invalidation_queue().is_empty());
    list.flush_invalidations().unwrap();
    assert!(log.take().is_empty());
    assert_eq!(list.end_positions(), &[1]);

    list.start_observing().unwrap();
    assert_eq!(log.take(), vec!["insert 1 2"]);
    global.on_changed();
    assert_eq!(list.invalidation_queue().len(), 1);
}

#[test]
fn static_parts_cannot_be_invalidated() {
    let mut list = List::new(vec![Part::static_span(0)]).unwrap();
    assert_eq!(
        list.on_part_invalidate(0),
        Err(ComposedListError::NotASourcePart { part: 0 })
    );
    assert_eq!(
        list.on_part_invalidate(1),
        Err(ComposedListError::PartOutOfRange { part: 1, parts: 1 })
    );
}

#[test]
fn out_of_bounds_diff_is_fatal_and_invalidates() {
    let source = Counter::new(2);
    let mut list = List::new(vec![Part::source(Rc::clone(&source), Liar)]).unwrap();
    list.total_count();
    let log = observed(&mut list);

    let result = list.on_part_invalidate(0);
    assert!(matches!(
        result,
        Err(ComposedListError::InvalidDiff {
            part: 0,
            position: 2,
            ..
        })
    ));
    assert_eq!(log.take(), vec!["invalidate"]);
    assert!(list.is_invalid());
}

#[test]
fn diff_that_misses_count_change_is_fatal() {
    let source = Counter::new(2);
    let mut list = List::new(vec![Part::source(Rc::clone(&source), Miscount)]).unwrap();
    list.total_count();
    let _log = observed(&mut list);

    source.set(3);
    assert_eq!(
        list.on_part_invalidate(0),
        Err(ComposedListError::CountMismatch {
            part: 0,
            recorded: 2,
            actual: 3
        })
    );
    assert_eq!(list.total_count(), 3);
}

#[test]
fn recycle_is_routed_to_binding_part() {
    let mut list = List::new(vec![
        Part::static_span_with(7, |handle: &mut Vec<String>| handle.push("header".into())),
        Part::source(Counter::new(2), Rows::new()),
    ])
    .unwrap();

    let mut handle = Vec::new();
    let token = list.resolve_and_bind(2, &mut handle).unwrap();
    assert_eq!(handle, vec!["row 1"]);
    assert_eq!(list.bound_part(token), Some(1));
    assert_eq!(list.outstanding_bindings(), 1);

    list.recycle(token, &mut handle).unwrap();
    assert_eq!(handle, vec!["row 1", "recycled row"]);
    assert_eq!(
        list.recycle(token, &mut handle),
        Err(ComposedListError::UnknownBinding(token))
    );

    let mut header = Vec::new();
    list.resolve_and_bind(0, &mut header).unwrap();
    assert_eq!(header, vec!["header"]);
    assert_eq!(list.kind(0), Ok(7));
    assert_eq!(list.kind(1), Ok(1));
}

#[test]
fn stable_ids_do_not_collide_across_parts() {
    let mut list = List::new(vec![
        Part::source(Counter::new(2), Rows::new()),
        Part::source(Counter::new(2), Rows::new()),
    ])
    .unwrap();
    let ids: Vec<u64> = (0..4).map(|p| list.stable_id(p).unwrap()).collect();
    assert_eq!(ids, vec![0, 1, 1 << 40, (1 << 40) + 1]);
}

#[test]
fn reverse_mapping_matches_resolve() {
    let mut list = List::new(vec![
        Part::source(Counter::new(2), Rows::new()),
        Part::source(Counter::new(0), Rows::new()),
        Part::source(Counter::new(3), Rows::new()),
    ])
    .unwrap();
    assert_eq!(list.part_range(1), Ok(2..2));
    assert_eq!(list.global_position(2, 1), Ok(3));
    assert!(list.global_position(1, 0).is_err());
    assert_eq!(list.resolve(2), Ok((2, 0)));
}

#[test]
fn dropping_an_observing_list_releases_sources() {
    let source = Counter::new(1);
    {
        let mut list = List::new(vec![Part::source(Rc::clone(&source), Rows::new())]).unwrap();
        list.start_observing().unwrap();
        assert_eq!(source.observer_count(), 1);
    }
    assert_eq!(source.observer_count(), 0);
}
