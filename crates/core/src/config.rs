//! Layout and paging constants, overridable from the environment.

use std::env;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Minimum horizontal room per scrobble, so dense clusters stay clickable.
pub const MIN_PX_PER_EVENT: f64 = 60.0;
/// Horizontal room per calendar day, so sparse windows still read as a timeline.
pub const PX_PER_DAY: f64 = 200.0;
/// Floor for the strip width.
pub const MIN_TOTAL_PX: f64 = 800.0;
/// Rows per list page.
pub const PAGE_SIZE: usize = 25;
/// Window selected when a session starts.
pub const DEFAULT_PRESET_DAYS: u32 = 7;

/// Immutable engine configuration. Built once at startup and passed by
/// reference; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub min_px_per_event: f64,
    pub px_per_day: f64,
    pub min_total_px: f64,
    pub page_size: usize,
    pub default_preset_days: u32,
    /// Display time zone as minutes east of UTC. Day boundaries and marker
    /// labels are computed in this offset.
    pub utc_offset_minutes: i32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_px_per_event: MIN_PX_PER_EVENT,
            px_per_day: PX_PER_DAY,
            min_total_px: MIN_TOTAL_PX,
            page_size: PAGE_SIZE,
            default_preset_days: DEFAULT_PRESET_DAYS,
            utc_offset_minutes: 0,
        }
    }
}

impl TimelineConfig {
    /// Defaults overlaid with any `TUNELINE_*` variables that parse to a
    /// usable value. Zero or garbage values keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = positive::<usize>(&lookup, "TUNELINE_PAGE_SIZE") {
            config.page_size = v;
        }
        if let Some(v) = positive_f64(&lookup, "TUNELINE_PX_PER_DAY") {
            config.px_per_day = v;
        }
        if let Some(v) = positive_f64(&lookup, "TUNELINE_MIN_PX_PER_EVENT") {
            config.min_px_per_event = v;
        }
        if let Some(v) = positive_f64(&lookup, "TUNELINE_MIN_TOTAL_PX") {
            config.min_total_px = v;
        }
        if let Some(v) = positive::<u32>(&lookup, "TUNELINE_DEFAULT_PRESET_DAYS") {
            config.default_preset_days = v;
        }
        if let Some(v) = lookup("TUNELINE_UTC_OFFSET_MINUTES")
            .and_then(|v| v.trim().parse::<i32>().ok())
            .filter(|m| m.abs() < 24 * 60)
        {
            config.utc_offset_minutes = v;
        }

        config
    }

    /// The display offset. Out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
}

fn positive_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    positive::<f64>(lookup, key).filter(|v| v.is_finite())
}
