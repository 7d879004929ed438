//! Observable in-memory source.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use patchwork_core::{Observer, ObserverId, Source};
use smallvec::SmallVec;

type Observers = SmallVec<[(ObserverId, Rc<dyn Observer>); 2]>;

/// A value cell that notifies its observers synchronously on every write.
///
/// Reads hand out clones, so snapshot types are usually cheap to clone
/// (`Vec` for small test data, `Rc<[T]>` for benches).
pub struct MutableSource<T> {
    value: RefCell<T>,
    observers: RefCell<Observers>,
    next_id: Cell<u64>,
    reads: Cell<usize>,
}

impl<T: Clone> MutableSource<T> {
    pub fn new(value: T) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
            observers: RefCell::new(SmallVec::new()),
            next_id: Cell::new(0),
            reads: Cell::new(0),
        })
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replaces the value and notifies observers.
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutates the value in place and notifies observers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.borrow_mut());
        self.notify();
    }

    /// Replaces the value without telling anyone.
    pub fn set_silently(&self, value: T) {
        *self.value.borrow_mut() = value;
    }

    pub fn update_silently(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.borrow_mut());
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn notify(&self) {
        // Observers may register or unregister while being notified.
        let observers: SmallVec<[Rc<dyn Observer>; 2]> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        log::trace!("MutableSource notifying {} observer(s)", observers.len());
        for observer in observers {
            observer.on_changed();
        }
    }
}

impl<T: Clone> Source for MutableSource<T> {
    type Snapshot = T;

    fn read(&self) -> T {
        self.reads.set(self.reads.get() + 1);
        self.value.borrow().clone()
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
