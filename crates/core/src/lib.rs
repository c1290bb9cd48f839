//! Timeline layout, pagination and cross-view selection for a listening
//! history, plus the keyed fetch boundary that feeds them.

pub mod config;
pub mod fetch;
pub mod model;
pub mod parsers;
pub mod selection;
pub mod views;

pub use config::TimelineConfig;
pub use fetch::{FetchError, HistoryRequest, HistorySource, MemoryHistory};
pub use model::{EventSet, TimelineSession};
