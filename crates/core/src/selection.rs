//! Hover and selection shared across every view of one event set.
//!
//! Views never talk to each other. Each one writes through the coordinator
//! and re-reads [`SelectionState`] when notified.

use tuneline_protocol::{LocateTarget, ScrobbleId, SelectionState};

use crate::model::EventSet;
use crate::views::{Pagination, TimelineLayout};

/// Handle returned by [`SelectionCoordinator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SelectionState)>;

/// Two independent slots, `hovered` and `selected`, each empty or holding
/// one scrobble id. They change only through explicit calls here; the one
/// implicit transition is [`reconcile`](Self::reconcile) after a new fetch.
#[derive(Default)]
pub struct SelectionCoordinator {
    state: SelectionState,
    locate: Option<LocateTarget>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl std::fmt::Debug for SelectionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionCoordinator")
            .field("state", &self.state)
            .field("locate", &self.locate)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn hovered(&self) -> Option<&ScrobbleId> {
        self.state.hovered.as_ref()
    }

    pub fn selected(&self) -> Option<&ScrobbleId> {
        self.state.selected.as_ref()
    }

    /// Where views should scroll for the current selection.
    pub fn locate_target(&self) -> Option<LocateTarget> {
        self.locate
    }

    /// Register a view. `listener` runs after every state change.
    pub fn subscribe(&mut self, listener: impl FnMut(&SelectionState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Overwrite the hover slot. Whichever view calls last wins.
    pub fn set_hovered(&mut self, id: Option<ScrobbleId>) {
        if self.state.hovered == id {
            return;
        }
        self.state.hovered = id;
        self.notify();
    }

    /// Select `id` and compute where each view should scroll to show it.
    ///
    /// An id missing from `events` (a stale selection that outlived its
    /// window) clears the selection and yields `None`.
    pub fn select(
        &mut self,
        id: ScrobbleId,
        events: &EventSet,
        layout: &TimelineLayout,
        pagination: &Pagination,
    ) -> Option<LocateTarget> {
        let target = locate_in(&id, events, layout, pagination);

        match target {
            Some(target) => {
                tracing::debug!(id = %id, row = target.list_row, "selected scrobble");
                self.locate = Some(target);
                if self.state.selected.as_ref() != Some(&id) {
                    self.state.selected = Some(id);
                    self.notify();
                }
            }
            None => {
                tracing::debug!(id = %id, "selection target not in current event set");
                self.clear_selection();
            }
        }
        target
    }

    pub fn clear_selection(&mut self) {
        self.locate = None;
        if self.state.selected.take().is_some() {
            self.notify();
        }
    }

    /// Adjust to a freshly fetched event set: hover is dropped, and so is a
    /// selection whose scrobble is gone. A surviving selection keeps its id;
    /// [`relocate`](Self::relocate) then refreshes its target.
    pub fn reconcile(&mut self, events: &EventSet) {
        let mut changed = self.state.hovered.take().is_some();
        if let Some(id) = &self.state.selected
            && !events.contains(id)
        {
            self.state.selected = None;
            self.locate = None;
            changed = true;
        }
        if changed {
            self.notify();
        }
    }

    /// Recompute the locate target of the current selection against a new
    /// layout. Selection state itself is untouched, so nobody is notified.
    pub fn relocate(&mut self, events: &EventSet, layout: &TimelineLayout, pagination: &Pagination) {
        self.locate = self
            .state
            .selected
            .as_ref()
            .and_then(|id| locate_in(id, events, layout, pagination));
    }

    fn notify(&mut self) {
        let state = self.state.clone();
        for (_, listener) in &mut self.listeners {
            listener(&state);
        }
    }
}

fn locate_in(
    id: &ScrobbleId,
    events: &EventSet,
    layout: &TimelineLayout,
    pagination: &Pagination,
) -> Option<LocateTarget> {
    let row = events.index_of(id)?;
    layout.offset_of(row).map(|offset| LocateTarget {
        timeline_offset: offset,
        list_row: row,
        list_page: pagination.page_for_row(row),
    })
}
