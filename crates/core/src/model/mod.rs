pub mod event_set;
pub mod session;
pub mod time_range;

pub use event_set::EventSet;
pub use session::{FetchStatus, TimelineSession};
pub use time_range::{Clock, FixedClock, SystemClock, TimeRangeModel, PRESETS};
