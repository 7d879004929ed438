//! Reference presenters over `Vec<T>` snapshots.
//!
//! - [`SliceDiffPresenter`] trims the common prefix and suffix and reports the
//!   differing middle as changes plus one insert or remove run.
//! - [`KeyedDiffPresenter`] matches items by key and reports removals, moves,
//!   inserts and in-place changes, one item at a time.
//!
//! Both bind into a [`ProbeHandle`] and can be told to refuse diffing, which
//! forces the coordinator onto its coarse invalidation path.

use std::fmt::Debug;
use std::rc::Rc;

use patchwork_core::collections::map::{HashMap, HashSet};
use patchwork_core::{DiffCallback, PartPresenter};

use crate::handle::ProbeHandle;

type KindFn<T> = Rc<dyn Fn(&T) -> u32>;

#[derive(Clone)]
pub struct SliceDiffPresenter<T> {
    diffable: bool,
    kind_of: Option<KindFn<T>>,
}

impl<T> Default for SliceDiffPresenter<T> {
    fn default() -> Self {
        Self {
            diffable: true,
            kind_of: None,
        }
    }
}

impl<T> SliceDiffPresenter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A presenter whose `diff` always reports that it cannot diff.
    pub fn opaque() -> Self {
        Self {
            diffable: false,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind_of: impl Fn(&T) -> u32 + 'static) -> Self {
        self.kind_of = Some(Rc::new(kind_of));
        self
    }
}

impl<T: PartialEq + Debug> PartPresenter<Vec<T>> for SliceDiffPresenter<T> {
    type Kind = u32;
    type Handle = ProbeHandle;

    fn count(&self, snapshot: &Vec<T>) -> usize {
        snapshot.len()
    }

    fn kind(&self, snapshot: &Vec<T>, index: usize) -> u32 {
        self.kind_of
            .as_ref()
            .map_or(0, |kind_of| kind_of(&snapshot[index]))
    }

    fn bind(&self, snapshot: &Vec<T>, index: usize, handle: &mut ProbeHandle) {
        handle.bind(format!("{:?}", snapshot[index]));
    }

    fn recycle(&self, handle: &mut ProbeHandle) {
        handle.recycle();
    }

    fn diff(&self, old: &Vec<T>, new: &Vec<T>, callback: &mut dyn DiffCallback) -> bool {
        if !self.diffable {
            return false;
        }
        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        let old_middle = old.len() - prefix - suffix;
        let new_middle = new.len() - prefix - suffix;
        let common = old_middle.min(new_middle);

        if common > 0 {
            callback.on_changed(prefix, common, None);
        }
        if old_middle > new_middle {
            callback.on_removed(prefix + common, old_middle - new_middle);
        } else if new_middle > old_middle {
            callback.on_inserted(prefix + common, new_middle - old_middle);
        }
        true
    }
}

pub struct KeyedDiffPresenter<T, F> {
    key_of: F,
    kind_of: Option<KindFn<T>>,
}

impl<T, F> KeyedDiffPresenter<T, F>
where
    F: Fn(&T) -> u64,
{
    pub fn new(key_of: F) -> Self {
        Self {
            key_of,
            kind_of: None,
        }
    }

    pub fn with_kind(mut self, kind_of: impl Fn(&T) -> u32 + 'static) -> Self {
        self.kind_of = Some(Rc::new(kind_of));
        self
    }
}

impl<T, F> PartPresenter<Vec<T>> for KeyedDiffPresenter<T, F>
where
    T: PartialEq + Debug,
    F: Fn(&T) -> u64,
{
    type Kind = u32;
    type Handle = ProbeHandle;

    fn count(&self, snapshot: &Vec<T>) -> usize {
        snapshot.len()
    }

    fn stable_id(&self, snapshot: &Vec<T>, index: usize) -> u64 {
        (self.key_of)(&snapshot[index])
    }

    fn kind(&self, snapshot: &Vec<T>, index: usize) -> u32 {
        self.kind_of
            .as_ref()
            .map_or(0, |kind_of| kind_of(&snapshot[index]))
    }

    fn bind(&self, snapshot: &Vec<T>, index: usize, handle: &mut ProbeHandle) {
        handle.bind(format!("{:?}", snapshot[index]));
    }

    fn recycle(&self, handle: &mut ProbeHandle) {
        handle.recycle();
    }

    fn diff(&self, old: &Vec<T>, new: &Vec<T>, callback: &mut dyn DiffCallback) -> bool {
        let new_keys: HashSet<u64> = new.iter().map(&self.key_of).collect();
        let old_items: HashMap<u64, &T> = old
            .iter()
            .map(|item| ((self.key_of)(item), item))
            .collect();
        // Duplicate keys make item identity ambiguous.
        if new_keys.len() != new.len() || old_items.len() != old.len() {
            return false;
        }

        let mut current: Vec<u64> = old.iter().map(&self.key_of).collect();
        for index in (0..current.len()).rev() {
            if !new_keys.contains(&current[index]) {
                current.remove(index);
                callback.on_removed(index, 1);
            }
        }

        for (target, item) in new.iter().enumerate() {
            let key = (self.key_of)(item);
            // Everything left of `target` already matches `new`, so a present
            // key can only sit at or after `target`.
            match current[target..].iter().position(|&other| other == key) {
                Some(0) => {}
                Some(offset) => {
                    let found = target + offset;
                    current.remove(found);
                    current.insert(target, key);
                    callback.on_moved(found, target);
                }
                None => {
                    current.insert(target, key);
                    callback.on_inserted(target, 1);
                }
            }
            if let Some(previous) = old_items.get(&key) {
                if *previous != item {
                    callback.on_changed(target, 1, None);
                }
            }
        }
        true
    }
}
