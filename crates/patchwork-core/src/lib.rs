#![doc = r"Composed-list engine: merges independently changing parts into one globally indexed list and re-indexes their change events."]

pub mod bindings;
pub mod collections;
mod composed_list;
pub mod config;
pub mod error;
pub mod observer;
pub mod part;
pub mod positions;
pub mod recorder;
pub mod sink;

pub use bindings::BindToken;
pub use composed_list::{ComposedList, ListObserverId};
pub use config::ComposedListConfig;
pub use error::{ComposedListError, Result};
pub use observer::{Invalidation, InvalidationQueue, Observer, ObserverId, Source};
pub use part::{Part, PartKind, PartPresenter};
pub use positions::EndPositions;
pub use recorder::{DiffAction, DiffRecord, DiffRecorder, RecorderPool};
pub use sink::{DiffCallback, ListUpdateSink, Payload};
