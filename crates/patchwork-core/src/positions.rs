//! Cumulative end-position table.
//!
//! `ends[i]` is the exclusive global end of part `i`. The table is sorted, so
//! resolving a global position is a partition point search, the same way
//! lazy interval content finds the interval that holds an index. Zero-length
//! parts share their end with the previous part and are never selected.

use std::ops::Range;

use crate::error::{ComposedListError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndPositions {
    ends: Vec<usize>,
}

impl EndPositions {
    /// Creates a table for `parts` parts, all empty.
    pub fn new(parts: usize) -> Self {
        Self {
            ends: vec![0; parts],
        }
    }

    /// Builds a table from per-part item counts.
    pub fn from_counts(counts: impl IntoIterator<Item = usize>) -> Self {
        let mut end = 0;
        let ends = counts
            .into_iter()
            .map(|count| {
                end += count;
                end
            })
            .collect();
        Self { ends }
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.ends
    }

    /// Total item count across all parts.
    pub fn total(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    /// Global start of `part`.
    ///
    /// # Panics
    ///
    /// The per-part accessors (`start_of`, `end_of`, `len_of`, `range_of`)
    /// panic if `part >= self.len()`. Use [`get_range`](Self::get_range) for a
    /// checked lookup.
    pub fn start_of(&self, part: usize) -> usize {
        if part == 0 {
            0
        } else {
            self.ends[part - 1]
        }
    }

    pub fn end_of(&self, part: usize) -> usize {
        self.ends[part]
    }

    pub fn len_of(&self, part: usize) -> usize {
        self.end_of(part) - self.start_of(part)
    }

    pub fn range_of(&self, part: usize) -> Range<usize> {
        self.start_of(part)..self.end_of(part)
    }

    /// Global span of `part`, or `None` if there is no such part.
    pub fn get_range(&self, part: usize) -> Option<Range<usize>> {
        (part < self.ends.len()).then(|| self.range_of(part))
    }

    pub(crate) fn set_end(&mut self, part: usize, end: usize) {
        self.ends[part] = end;
    }

    /// Moves the end of `part` to `new_end` and shifts every later part by the
    /// same delta.
    pub(crate) fn move_end(&mut self, part: usize, new_end: usize) {
        let old_end = self.ends[part];
        if new_end >= old_end {
            let delta = new_end - old_end;
            for end in &mut self.ends[part..] {
                *end += delta;
            }
        } else {
            let delta = old_end - new_end;
            for end in &mut self.ends[part..] {
                *end -= delta;
            }
        }
    }

    /// Maps a global position to `(part, local)`.
    pub fn resolve(&self, position: usize) -> Result<(usize, usize)> {
        // First part whose end lies past `position`. Parts with the same end as
        // their predecessor are empty and fall on the left of the partition.
        let part = self.ends.partition_point(|&end| end <= position);
        if part == self.ends.len() {
            return Err(ComposedListError::PositionOutOfRange {
                position,
                total: self.total(),
            });
        }
        Ok((part, position - self.start_of(part)))
    }
}
