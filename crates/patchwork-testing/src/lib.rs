//! Test doubles for the composed-list engine: an observable source,
//! reference presenters, recording list observers and consistency assertions.

pub mod assertions;
pub mod handle;
pub mod presenter;
pub mod sink;
pub mod source;

pub use handle::ProbeHandle;
pub use presenter::{KeyedDiffPresenter, SliceDiffPresenter};
pub use sink::{render, EventLog, ListEvent, Mirror, MirrorSink, RecordingSink};
pub use source::MutableSource;

pub mod prelude {
    pub use crate::assertions;
    pub use crate::handle::ProbeHandle;
    pub use crate::presenter::{KeyedDiffPresenter, SliceDiffPresenter};
    pub use crate::sink::{render, EventLog, ListEvent, Mirror};
    pub use crate::source::MutableSource;
}
