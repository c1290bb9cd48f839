pub mod shared_str;
pub mod types;

pub use shared_str::SharedStr;
pub use types::{
    LocateTarget, PositionedScrobble, Scrobble, ScrobbleId, SelectionState, TimeMarker, TimeRange,
};
