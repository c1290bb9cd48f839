use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;

/// Opaque identity of a scrobble. Two scrobbles with the same id are the
/// same listen, regardless of which fetch produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScrobbleId(SharedStr);

impl ScrobbleId {
    pub fn new(id: impl Into<SharedStr>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ScrobbleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for ScrobbleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One recorded listen of a track. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scrobble {
    pub id: ScrobbleId,
    pub artist: SharedStr,
    pub track: SharedStr,
    #[serde(default)]
    pub album: Option<SharedStr>,
    pub listened_at: DateTime<Utc>,
    /// Artwork URL, when the source provided one.
    #[serde(default)]
    pub artwork: Option<SharedStr>,
}

/// An inclusive window of time. `start <= end` is expected but the type
/// itself does not enforce it; `TimeRangeModel` is the gatekeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Length of the window. Zero for degenerate or inverted ranges.
    pub fn span(&self) -> TimeDelta {
        (self.end - self.start).max(TimeDelta::zero())
    }

    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// A scrobble placed on the timeline strip.
///
/// `index` points into the event list the layout was computed from, so
/// renderers can reach the full record without a second lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedScrobble {
    pub id: ScrobbleId,
    pub index: usize,
    /// Horizontal position in logical pixels, within `[0, width]`.
    pub offset: f64,
}

/// A labeled tick on the time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeMarker {
    pub offset: f64,
    pub label: SharedStr,
    pub at: DateTime<Utc>,
}

/// Hover and selection, shared by every view of one event set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub hovered: Option<ScrobbleId>,
    pub selected: Option<ScrobbleId>,
}

impl SelectionState {
    pub fn is_hovered(&self, id: &ScrobbleId) -> bool {
        self.hovered.as_ref() == Some(id)
    }

    pub fn is_selected(&self, id: &ScrobbleId) -> bool {
        self.selected.as_ref() == Some(id)
    }
}

/// Where each view should scroll to bring the selected scrobble into sight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocateTarget {
    /// Offset of the scrobble on the timeline strip.
    pub timeline_offset: f64,
    /// Row of the scrobble in the full, sorted list.
    pub list_row: usize,
    /// 1-based page containing `list_row`.
    pub list_page: usize,
}
