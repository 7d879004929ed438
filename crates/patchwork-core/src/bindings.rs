//! Routing table from outstanding bindings to the part that produced them.
//!
//! Every successful bind hands out a [`BindToken`]. Recycling consumes the
//! token and finds the owning part without relying on handle identity. Slots
//! are reused through a free list; the generation counter makes stale tokens
//! from an earlier occupant of the same slot fail to resolve.

/// Opaque ticket for one outstanding binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindToken {
    slot: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    generation: u32,
    part: Option<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct BindingTable {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl BindingTable {
    pub(crate) fn insert(&mut self, part: usize) -> BindToken {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.entries[slot as usize];
            entry.part = Some(part);
            return BindToken {
                slot,
                generation: entry.generation,
            };
        }
        let slot = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            part: Some(part),
        });
        BindToken {
            slot,
            generation: 0,
        }
    }

    /// Consumes `token`, returning the part it was bound through.
    pub(crate) fn take(&mut self, token: BindToken) -> Option<usize> {
        let entry = self.entries.get_mut(token.slot as usize)?;
        if entry.generation != token.generation {
            return None;
        }
        let part = entry.part.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(token.slot);
        self.live -= 1;
        Some(part)
    }

    pub(crate) fn get(&self, token: BindToken) -> Option<usize> {
        self.entries
            .get(token.slot as usize)
            .filter(|entry| entry.generation == token.generation)
            .and_then(|entry| entry.part)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}
