//! Property tests for the pure layout, paging and normalization functions.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use proptest::prelude::*;
use tuneline_core::TimelineConfig;
use tuneline_core::model::event_set::normalize;
use tuneline_core::views::layout::{days_in_range, layout_timeline};
use tuneline_core::views::pagination::{paginate, total_pages};
use tuneline_core::views::{PageNav, Pagination};
use tuneline_protocol::{Scrobble, ScrobbleId, TimeRange};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

const YEAR_MINUTES: i64 = 366 * 24 * 60;

/// A window somewhere in 2026, up to a year long.
fn arb_range() -> impl Strategy<Value = TimeRange> {
    (0..YEAR_MINUTES, 0..YEAR_MINUTES).prop_map(|(start, len)| {
        let start = base() + TimeDelta::minutes(start);
        TimeRange::new(start, start + TimeDelta::minutes(len))
    })
}

/// Scrobbles with small ids so duplicates are common, at arbitrary minutes
/// around 2026.
fn arb_scrobbles(max: usize) -> impl Strategy<Value = Vec<Scrobble>> {
    proptest::collection::vec((0u16..64, -YEAR_MINUTES..2 * YEAR_MINUTES), 0..max).prop_map(
        |raw| {
            raw.into_iter()
                .map(|(id, minute)| Scrobble {
                    id: ScrobbleId::new(format!("s{id}")),
                    artist: "Smino".into(),
                    track: "Anita".into(),
                    album: None,
                    listened_at: base() + TimeDelta::minutes(minute),
                    artwork: None,
                })
                .collect()
        },
    )
}

fn arb_nav() -> impl Strategy<Value = PageNav> {
    prop_oneof![
        Just(PageNav::First),
        Just(PageNav::Previous),
        Just(PageNav::Next),
        Just(PageNav::Last),
        (0usize..20).prop_map(PageNav::Goto),
    ]
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn width_meets_every_floor(range in arb_range(), events in arb_scrobbles(200)) {
        let cfg = TimelineConfig::default();
        let layout = layout_timeline(&range, &events, &cfg);
        let days = days_in_range(&range) as f64;
        prop_assert!(layout.width >= events.len() as f64 * cfg.min_px_per_event);
        prop_assert!(layout.width >= days * cfg.px_per_day);
        prop_assert!(layout.width >= cfg.min_total_px);
    }

    #[test]
    fn offsets_stay_on_the_strip(range in arb_range(), events in arb_scrobbles(200)) {
        let layout = layout_timeline(&range, &events, &TimelineConfig::default());
        prop_assert_eq!(layout.positions.len(), events.len());
        for (i, p) in layout.positions.iter().enumerate() {
            prop_assert_eq!(p.index, i);
            prop_assert!(p.offset >= 0.0 && p.offset <= layout.width);
        }
        for m in &layout.markers {
            prop_assert!(m.offset >= 0.0 && m.offset <= layout.width);
        }
    }

    #[test]
    fn zero_length_range_pins_everything_left(minute in 0..YEAR_MINUTES, events in arb_scrobbles(50)) {
        let at = base() + TimeDelta::minutes(minute);
        let layout = layout_timeline(&TimeRange::new(at, at), &events, &TimelineConfig::default());
        prop_assert!(layout.positions.iter().all(|p| p.offset == 0.0));
    }

    #[test]
    fn page_count_rounds_up(n in 0usize..5000, size in 1usize..100) {
        let expected = if n == 0 { 1 } else { n.div_ceil(size) };
        prop_assert_eq!(total_pages(n, size), expected);
    }

    #[test]
    fn navigation_never_leaves_the_valid_pages(
        n in 0usize..500,
        navs in proptest::collection::vec(arb_nav(), 1..30),
    ) {
        let mut pagination = Pagination::new(25);
        pagination.set_total(n);
        let items: Vec<usize> = (0..n).collect();
        for nav in navs {
            let page = pagination.navigate(nav);
            prop_assert!(page >= 1 && page <= pagination.total_pages());
            let slice = pagination.slice(&items);
            prop_assert!(slice.len() <= 25);
            let (clamped, via_paginate) = paginate(&items, 25, page);
            prop_assert_eq!(clamped, page);
            prop_assert_eq!(slice, via_paginate);
        }
    }

    #[test]
    fn pages_cover_the_list_exactly(n in 0usize..300) {
        let items: Vec<usize> = (0..n).collect();
        let pages = total_pages(n, 25);
        let joined: Vec<usize> = (1..=pages)
            .flat_map(|p| paginate(&items, 25, p).1.iter().copied())
            .collect();
        prop_assert_eq!(joined, items);
    }

    #[test]
    fn normalized_history_is_unique_and_newest_first(events in arb_scrobbles(200)) {
        let normalized = normalize(events.clone());
        let mut seen = std::collections::HashSet::new();
        prop_assert!(normalized.iter().all(|s| seen.insert(s.id.clone())));
        let distinct: std::collections::HashSet<_> = events.iter().map(|s| &s.id).collect();
        prop_assert_eq!(normalized.len(), distinct.len());
        prop_assert!(normalized.windows(2).all(|w| w[0].listened_at >= w[1].listened_at));
    }
}
