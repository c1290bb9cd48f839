//! The asynchronous edge: requesting a listening history for a window and
//! deciding whether a response is still wanted when it arrives.

use std::future::Future;

use thiserror::Error;
use tuneline_protocol::{Scrobble, SharedStr, TimeRange};

use crate::model::event_set::normalize;

/// Why a history could not be loaded. The engine only shows the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("server error: {0}")]
    Server(String),
}

/// Anything that can produce a user's scrobbles for a window.
///
/// Implementations should return a list deduplicated by id and sorted
/// newest first; the session normalizes again either way.
pub trait HistorySource {
    fn fetch(
        &self,
        user: &str,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<Scrobble>, FetchError>> + Send;
}

/// What a response must match to be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub user: SharedStr,
    pub range: TimeRange,
}

/// One outstanding fetch. `seq` increases with every request, so it orders
/// requests even when two share a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub key: FetchKey,
    pub seq: u64,
}

impl HistoryRequest {
    /// Run the fetch against `source`. Does not touch any session state, so
    /// the future can be spawned and its response applied later.
    pub async fn run<S: HistorySource>(self, source: &S) -> FetchResponse {
        let result = source.fetch(&self.key.user, self.key.range).await;
        FetchResponse {
            request: self,
            result,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub request: HistoryRequest,
    pub result: Result<Vec<Scrobble>, FetchError>,
}

/// Outcome of offering a response to the orchestrator.
#[derive(Debug)]
pub enum Resolution {
    /// The response answers the latest request.
    Current {
        seq: u64,
        result: Result<Vec<Scrobble>, FetchError>,
    },
    /// Superseded by a newer request; drop it.
    Stale,
}

/// Issues keyed requests and enforces "latest request wins".
#[derive(Debug, Default)]
pub struct FetchOrchestrator {
    next_seq: u64,
    latest: Option<HistoryRequest>,
    in_flight: bool,
}

impl FetchOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `(user, range)`. Any request issued before this
    /// one becomes stale.
    pub fn begin(&mut self, user: SharedStr, range: TimeRange) -> HistoryRequest {
        self.next_seq += 1;
        let request = HistoryRequest {
            key: FetchKey { user, range },
            seq: self.next_seq,
        };
        tracing::debug!(seq = request.seq, user = %request.key.user, "history request issued");
        self.latest = Some(request.clone());
        self.in_flight = true;
        request
    }

    /// Whether the latest request is still waiting for its response.
    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Accept `response` only if it answers the latest request: same
    /// sequence number and same key. Everything else is stale.
    pub fn resolve(&mut self, response: FetchResponse) -> Resolution {
        let FetchResponse { request, result } = response;
        let is_latest = self.latest.as_ref() == Some(&request);
        if !is_latest || !self.in_flight {
            tracing::debug!(
                seq = request.seq,
                latest = self.latest.as_ref().map(|r| r.seq),
                "discarding stale history response"
            );
            return Resolution::Stale;
        }
        self.in_flight = false;
        Resolution::Current {
            seq: request.seq,
            result,
        }
    }
}

/// A history held in memory, e.g. decoded from an export file.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    user: SharedStr,
    scrobbles: Vec<Scrobble>,
}

impl MemoryHistory {
    pub fn new(user: impl Into<SharedStr>, scrobbles: Vec<Scrobble>) -> Self {
        Self {
            user: user.into(),
            scrobbles: normalize(scrobbles),
        }
    }

    pub fn len(&self) -> usize {
        self.scrobbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrobbles.is_empty()
    }

    /// Scrobbles inside `range`, newest first.
    pub fn window(&self, range: &TimeRange) -> Vec<Scrobble> {
        self.scrobbles
            .iter()
            .filter(|s| range.contains(s.listened_at))
            .cloned()
            .collect()
    }
}

impl HistorySource for MemoryHistory {
    fn fetch(
        &self,
        user: &str,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<Scrobble>, FetchError>> + Send {
        let result = if user.eq_ignore_ascii_case(&self.user) {
            Ok(self.window(&range))
        } else {
            Err(FetchError::UnknownUser(user.to_string()))
        };
        std::future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use tuneline_protocol::ScrobbleId;

    use super::*;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn range(from: u32, to: u32) -> TimeRange {
        TimeRange::new(at(from) - TimeDelta::hours(12), at(to) + TimeDelta::hours(12))
    }

    fn history() -> MemoryHistory {
        let scrobbles = (1..=20)
            .map(|d| Scrobble {
                id: ScrobbleId::new(format!("d{d}")),
                artist: "Sampa the Great".into(),
                track: "Final Form".into(),
                album: None,
                listened_at: at(d),
                artwork: None,
            })
            .collect();
        MemoryHistory::new("rj", scrobbles)
    }

    fn response(request: HistoryRequest) -> FetchResponse {
        FetchResponse {
            request,
            result: Ok(Vec::new()),
        }
    }

    #[tokio::test]
    async fn memory_history_filters_by_window() {
        let source = history();
        let scrobbles = source.fetch("rj", range(3, 5)).await.unwrap_or_default();
        let ids: Vec<_> = scrobbles.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["d5", "d4", "d3"]);
    }

    #[tokio::test]
    async fn memory_history_rejects_other_users() {
        let source = history();
        let result = source.fetch("someone-else", range(1, 2)).await;
        assert_eq!(
            result,
            Err(FetchError::UnknownUser("someone-else".to_string()))
        );
    }

    #[tokio::test]
    async fn request_run_carries_its_key() {
        let mut orchestrator = FetchOrchestrator::new();
        let request = orchestrator.begin("rj".into(), range(1, 3));
        let response = request.clone().run(&history()).await;
        assert_eq!(response.request, request);
        assert_eq!(response.result.as_ref().map(Vec::len), Ok(3));
    }

    #[test]
    fn latest_request_wins() {
        let mut orchestrator = FetchOrchestrator::new();
        let first = orchestrator.begin("rj".into(), range(1, 3));
        let second = orchestrator.begin("rj".into(), range(4, 6));
        assert!(matches!(
            orchestrator.resolve(response(first)),
            Resolution::Stale
        ));
        assert!(orchestrator.is_loading());
        assert!(matches!(
            orchestrator.resolve(response(second.clone())),
            Resolution::Current { seq: 2, .. }
        ));
        assert!(!orchestrator.is_loading());
        // A duplicate delivery of an already-applied response is dropped.
        assert!(matches!(
            orchestrator.resolve(response(second)),
            Resolution::Stale
        ));
    }

    #[test]
    fn same_key_older_request_is_stale() {
        let mut orchestrator = FetchOrchestrator::new();
        let first = orchestrator.begin("rj".into(), range(1, 3));
        let _retry = orchestrator.begin("rj".into(), range(1, 3));
        assert!(matches!(
            orchestrator.resolve(response(first)),
            Resolution::Stale
        ));
    }

    #[test]
    fn errors_display_readably() {
        assert_eq!(
            FetchError::Server("HTTP 503".into()).to_string(),
            "server error: HTTP 503"
        );
    }
}
