use chrono::NaiveDate;
use tuneline_protocol::{LocateTarget, ScrobbleId, SelectionState, SharedStr, TimeRange};

use super::event_set::EventSet;
use super::time_range::{Clock, SystemClock, TimeRangeModel};
use crate::config::TimelineConfig;
use crate::fetch::{FetchOrchestrator, FetchResponse, HistoryRequest, Resolution};
use crate::selection::{SelectionCoordinator, SubscriptionId};
use crate::views::{PageNav, PageView, Pagination, TimelineLayout, layout_timeline};

/// Where the latest fetch stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    /// The latest fetch failed; the message is for display.
    Failed(String),
}

/// One user's timeline view: the selected window, the event set currently
/// shown, and everything derived from them.
///
/// Mutators that change the window return a [`HistoryRequest`]. The caller
/// runs it wherever it likes and hands the response back to
/// [`apply`](Self::apply); responses for windows that have since changed are
/// dropped there.
#[derive(Debug)]
pub struct TimelineSession<C: Clock = SystemClock> {
    config: TimelineConfig,
    user: SharedStr,
    range: TimeRangeModel<C>,
    events: EventSet,
    layout: TimelineLayout,
    pagination: Pagination,
    selection: SelectionCoordinator,
    fetcher: FetchOrchestrator,
    error: Option<String>,
}

impl TimelineSession<SystemClock> {
    pub fn new(config: TimelineConfig, user: impl Into<SharedStr>) -> Self {
        Self::with_clock(config, user, SystemClock)
    }
}

impl<C: Clock> TimelineSession<C> {
    /// Start on the configured default preset with nothing loaded.
    pub fn with_clock(config: TimelineConfig, user: impl Into<SharedStr>, clock: C) -> Self {
        let range = TimeRangeModel::new(clock, config.offset(), config.default_preset_days);
        let events = EventSet::empty();
        let layout = layout_timeline(&range.range(), events.events(), &config);
        let pagination = Pagination::new(config.page_size);
        Self {
            config,
            user: user.into(),
            range,
            events,
            layout,
            pagination,
            selection: SelectionCoordinator::new(),
            fetcher: FetchOrchestrator::new(),
            error: None,
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn range(&self) -> TimeRange {
        self.range.range()
    }

    pub fn range_model(&self) -> &TimeRangeModel<C> {
        &self.range
    }

    pub fn events(&self) -> &EventSet {
        &self.events
    }

    pub fn layout(&self) -> &TimelineLayout {
        &self.layout
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// The list view's current page.
    pub fn page(&self) -> PageView<'_> {
        PageView::new(&self.pagination, self.events.events())
    }

    pub fn selection(&self) -> &SelectionState {
        self.selection.state()
    }

    pub fn locate_target(&self) -> Option<LocateTarget> {
        self.selection.locate_target()
    }

    /// Message from the latest failed fetch, cleared by the next success.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> FetchStatus {
        if self.fetcher.is_loading() {
            FetchStatus::Loading
        } else if let Some(err) = &self.error {
            FetchStatus::Failed(err.clone())
        } else {
            FetchStatus::Idle
        }
    }

    /// Request the current window again.
    pub fn refresh(&mut self) -> HistoryRequest {
        self.fetcher.begin(self.user.clone(), self.range.range())
    }

    /// Replace the window. Returns `None` when the edit is rejected or
    /// changes nothing.
    pub fn set_range(&mut self, range: TimeRange) -> Option<HistoryRequest> {
        let before = self.range.range();
        if !self.range.set_range(range) {
            tracing::debug!(?range, "rejected range edit");
            return None;
        }
        self.after_range_edit(before)
    }

    pub fn apply_preset(&mut self, n_days: u32) -> Option<HistoryRequest> {
        let before = self.range.range();
        self.range.apply_preset(n_days);
        self.after_range_edit(before)
    }

    pub fn set_start(&mut self, date: NaiveDate) -> Option<HistoryRequest> {
        let before = self.range.range();
        if !self.range.set_start(date) {
            return None;
        }
        self.after_range_edit(before)
    }

    pub fn set_end(&mut self, date: NaiveDate) -> Option<HistoryRequest> {
        let before = self.range.range();
        if !self.range.set_end(date) {
            return None;
        }
        self.after_range_edit(before)
    }

    pub fn shift_start(&mut self, days: i64) -> Option<HistoryRequest> {
        let before = self.range.range();
        if !self.range.shift_start(days) {
            return None;
        }
        self.after_range_edit(before)
    }

    pub fn shift_end(&mut self, days: i64) -> Option<HistoryRequest> {
        let before = self.range.range();
        if !self.range.shift_end(days) {
            return None;
        }
        self.after_range_edit(before)
    }

    /// The held events are re-laid out against the new window right away;
    /// the fetch for it replaces them later.
    fn after_range_edit(&mut self, before: TimeRange) -> Option<HistoryRequest> {
        let range = self.range.range();
        if range == before {
            return None;
        }
        self.relayout();
        Some(self.fetcher.begin(self.user.clone(), range))
    }

    /// Offer a fetch response. Stale responses are dropped silently; a
    /// failure records its message and leaves the displayed state alone.
    /// Returns whether the displayed event set changed.
    pub fn apply(&mut self, response: FetchResponse) -> bool {
        match self.fetcher.resolve(response) {
            Resolution::Stale => false,
            Resolution::Current {
                result: Err(err), ..
            } => {
                tracing::warn!(user = %self.user, error = %err, "history fetch failed");
                self.error = Some(err.to_string());
                false
            }
            Resolution::Current {
                seq,
                result: Ok(fetched),
            } => {
                self.events = EventSet::from_fetched(seq, fetched);
                self.error = None;
                self.pagination.set_total(self.events.len());
                self.selection.reconcile(&self.events);
                self.relayout();
                tracing::info!(
                    user = %self.user,
                    scrobbles = self.events.len(),
                    pages = self.pagination.total_pages(),
                    "history applied"
                );
                true
            }
        }
    }

    fn relayout(&mut self) {
        self.layout = layout_timeline(&self.range.range(), self.events.events(), &self.config);
        self.selection
            .relocate(&self.events, &self.layout, &self.pagination);
        tracing::debug!(
            width = self.layout.width,
            markers = self.layout.markers.len(),
            "timeline layout recomputed"
        );
    }

    pub fn goto_page(&mut self, nav: PageNav) -> usize {
        self.pagination.navigate(nav)
    }

    pub fn set_hovered(&mut self, id: Option<ScrobbleId>) {
        self.selection.set_hovered(id);
    }

    /// Select a scrobble and return where each view should scroll.
    pub fn select(&mut self, id: ScrobbleId) -> Option<LocateTarget> {
        self.selection
            .select(id, &self.events, &self.layout, &self.pagination)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&SelectionState) + 'static,
    ) -> SubscriptionId {
        self.selection.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.selection.unsubscribe(id)
    }
}
