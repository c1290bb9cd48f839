use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use tuneline_protocol::{SharedStr, TimeMarker, TimeRange};

use super::layout::fraction_of;

/// Spacing between axis markers, chosen from how many calendar days the
/// window covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerInterval {
    Hour,
    SixHours,
    Day,
    Week,
}

impl MarkerInterval {
    /// First matching row wins: up to 1 day hourly, up to a week every six
    /// hours, up to a month daily, weekly beyond that.
    pub fn for_days(days_in_range: u64) -> Self {
        match days_in_range {
            0..=1 => Self::Hour,
            2..=7 => Self::SixHours,
            8..=31 => Self::Day,
            _ => Self::Week,
        }
    }

    pub fn step(self) -> TimeDelta {
        match self {
            Self::Hour => TimeDelta::hours(1),
            Self::SixHours => TimeDelta::hours(6),
            Self::Day => TimeDelta::days(1),
            Self::Week => TimeDelta::weeks(1),
        }
    }

    /// Short human name, e.g. for a legend.
    pub fn label(self) -> &'static str {
        match self {
            Self::Hour => "hourly",
            Self::SixHours => "every 6 hours",
            Self::Day => "daily",
            Self::Week => "weekly",
        }
    }

    fn label_format(self) -> &'static str {
        match self {
            Self::Hour => "%-I:%M %p",
            Self::SixHours => "%b %-d %-I%p",
            Self::Day | Self::Week => "%b %-d",
        }
    }
}

/// Walk the window from `start` in `interval` steps, emitting a marker at
/// each step that does not pass `end`. Offsets use the same mapping as
/// scrobble positions, so a marker and a scrobble at the same instant line
/// up exactly.
pub fn generate_markers(
    range: &TimeRange,
    width: f64,
    interval: MarkerInterval,
    offset: FixedOffset,
) -> Vec<TimeMarker> {
    if range.end < range.start {
        return Vec::new();
    }

    let step = interval.step();
    let estimate = range.span().num_milliseconds() / step.num_milliseconds().max(1);
    let mut markers = Vec::with_capacity(usize::try_from(estimate).unwrap_or(0) + 1);

    let mut t = range.start;
    while t <= range.end {
        markers.push(TimeMarker {
            offset: fraction_of(t, range) * width,
            label: SharedStr::from(format_marker_label(t, interval, offset)),
            at: t,
        });
        match t.checked_add_signed(step) {
            Some(next) => t = next,
            None => break,
        }
    }

    markers
}

/// Render `at` in the display offset at the granularity `interval` calls for.
pub fn format_marker_label(at: DateTime<Utc>, interval: MarkerInterval, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format(interval.label_format())
        .to_string()
}
