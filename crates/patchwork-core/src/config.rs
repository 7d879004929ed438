use crate::recorder::DEFAULT_RECORD_CAPACITY;

/// Default shift applied to a part index to derive its stable-id base.
///
/// Leaves 2^40 local ids per part before bases of neighbouring parts overlap.
pub const DEFAULT_STABLE_ID_SHIFT: u32 = 40;

/// Tuning knobs for a [`ComposedList`](crate::ComposedList).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposedListConfig {
    /// Part `i` gets `(i as u64) << stable_id_shift` as its stable-id base
    /// unless the part sets one explicitly.
    pub stable_id_shift: u32,
    /// Initial capacity of recorders created by the list's own pool. Ignored
    /// when a pool is injected.
    pub record_capacity: usize,
}

impl Default for ComposedListConfig {
    fn default() -> Self {
        Self {
            stable_id_shift: DEFAULT_STABLE_ID_SHIFT,
            record_capacity: DEFAULT_RECORD_CAPACITY,
        }
    }
}

impl ComposedListConfig {
    pub fn stable_id_base(&self, part: usize) -> u64 {
        (part as u64).checked_shl(self.stable_id_shift).unwrap_or(0)
    }
}
