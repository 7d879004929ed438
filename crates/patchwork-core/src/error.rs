use std::fmt;

use crate::bindings::BindToken;
use crate::recorder::DiffAction;

pub type Result<T> = std::result::Result<T, ComposedListError>;

/// Errors reported by a [`ComposedList`](crate::ComposedList).
///
/// Configuration errors (`NoParts`, `AlreadyObserving`, `NotObserving`,
/// `PartOutOfRange`, `NotASourcePart`) are raised at call time. Bounds errors
/// point at a caller or presenter bug. A presenter that merely cannot diff is
/// not an error; the coordinator falls back to a coarse invalidation instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposedListError {
    NoParts,
    AlreadyObserving,
    NotObserving,
    PartOutOfRange {
        part: usize,
        parts: usize,
    },
    NotASourcePart {
        part: usize,
    },
    PositionOutOfRange {
        position: usize,
        total: usize,
    },
    InvalidDiff {
        part: usize,
        action: DiffAction,
        position: usize,
        second: usize,
        local_count: usize,
    },
    CountMismatch {
        part: usize,
        recorded: usize,
        actual: usize,
    },
    UnknownBinding(BindToken),
}

impl fmt::Display for ComposedListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposedListError::NoParts => write!(f, "composed list needs at least one part"),
            ComposedListError::AlreadyObserving => write!(f, "composed list is already observing"),
            ComposedListError::NotObserving => {
                write!(f, "stop_observing called without matching start_observing")
            }
            ComposedListError::PartOutOfRange { part, parts } => {
                write!(f, "part {part} out of range; list has {parts} parts")
            }
            ComposedListError::NotASourcePart { part } => {
                write!(f, "part {part} is static and cannot be invalidated")
            }
            ComposedListError::PositionOutOfRange { position, total } => {
                write!(f, "position {position} out of range; list has {total} items")
            }
            ComposedListError::InvalidDiff {
                part,
                action,
                position,
                second,
                local_count,
            } => write!(
                f,
                "part {part} emitted {action:?}({position}, {second}) against {local_count} items"
            ),
            ComposedListError::CountMismatch {
                part,
                recorded,
                actual,
            } => write!(
                f,
                "part {part} diff left {recorded} items but presenter reports {actual}"
            ),
            ComposedListError::UnknownBinding(token) => {
                write!(f, "binding {token:?} is unknown or already recycled")
            }
        }
    }
}

impl std::error::Error for ComposedListError {}
