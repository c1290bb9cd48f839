use chrono::{DateTime, FixedOffset, Utc};
use tuneline_protocol::{PositionedScrobble, Scrobble, TimeMarker, TimeRange};

use super::time_axis::{MarkerInterval, generate_markers};
use crate::config::TimelineConfig;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Everything the timeline strip needs to draw one window.
///
/// Fully derived from a range and an event list; recompute it whenever
/// either changes. There is no incremental update because every offset
/// depends on the shared span.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineLayout {
    /// Total strip width in logical pixels.
    pub width: f64,
    pub days_in_range: u64,
    /// One entry per scrobble, in the order of the input list.
    pub positions: Vec<PositionedScrobble>,
    pub markers: Vec<TimeMarker>,
    pub interval: MarkerInterval,
}

impl TimelineLayout {
    /// Offset of the scrobble at `index` in the source list.
    pub fn offset_of(&self, index: usize) -> Option<f64> {
        self.positions.get(index).map(|p| p.offset)
    }

    /// The positioned scrobble closest to `x`, if one lies within
    /// `tolerance` pixels.
    pub fn nearest(&self, x: f64, tolerance: f64) -> Option<&PositionedScrobble> {
        self.positions
            .iter()
            .map(|p| (p, (p.offset - x).abs()))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
    }

    /// Markers inside the `[scroll_x, scroll_x + viewport_width]` window.
    pub fn visible_markers(
        &self,
        scroll_x: f64,
        viewport_width: f64,
    ) -> impl Iterator<Item = &TimeMarker> {
        let end = scroll_x + viewport_width;
        self.markers
            .iter()
            .filter(move |m| m.offset >= scroll_x && m.offset <= end)
    }

    /// Horizontal scroll that centers `offset` in a viewport, clamped so the
    /// viewport never runs past either end of the strip.
    pub fn center_scroll(&self, offset: f64, viewport_width: f64) -> f64 {
        let max_scroll = (self.width - viewport_width).max(0.0);
        (offset - viewport_width / 2.0).clamp(0.0, max_scroll)
    }
}

/// Calendar days the window touches: whole days of span, plus one.
pub fn days_in_range(range: &TimeRange) -> u64 {
    let ms = range.span().num_milliseconds();
    u64::try_from(ms / MS_PER_DAY).unwrap_or(0) + 1
}

/// Strip width: enough room per scrobble, enough room per day, and never
/// below the floor.
pub fn timeline_width(event_count: usize, days_in_range: u64, config: &TimelineConfig) -> f64 {
    let per_event = event_count as f64 * config.min_px_per_event;
    let per_day = days_in_range as f64 * config.px_per_day;
    per_event.max(per_day).max(config.min_total_px)
}

/// Where `at` falls in the window, in `[0, 1]`. A zero-length (or inverted)
/// window maps everything to 0.
pub fn fraction_of(at: DateTime<Utc>, range: &TimeRange) -> f64 {
    let span = range.span().num_milliseconds() as f64;
    if span <= 0.0 {
        return 0.0;
    }
    let elapsed = (at - range.start).num_milliseconds() as f64;
    (elapsed / span).clamp(0.0, 1.0)
}

/// Lay out `events` across `range`.
pub fn layout_timeline(
    range: &TimeRange,
    events: &[Scrobble],
    config: &TimelineConfig,
) -> TimelineLayout {
    layout_timeline_in(range, events, config, config.offset())
}

/// Like [`layout_timeline`] with an explicit display offset for labels.
pub fn layout_timeline_in(
    range: &TimeRange,
    events: &[Scrobble],
    config: &TimelineConfig,
    offset: FixedOffset,
) -> TimelineLayout {
    let days = days_in_range(range);
    let width = timeline_width(events.len(), days, config);

    let positions = events
        .iter()
        .enumerate()
        .map(|(index, s)| PositionedScrobble {
            id: s.id.clone(),
            index,
            offset: fraction_of(s.listened_at, range) * width,
        })
        .collect();

    let interval = MarkerInterval::for_days(days);
    let markers = generate_markers(range, width, interval, offset);

    TimelineLayout {
        width,
        days_in_range: days,
        positions,
        markers,
        interval,
    }
}
