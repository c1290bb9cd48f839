use std::time::Duration;

use tuneline_core::fetch::{FetchError, HistorySource};
use tuneline_protocol::{Scrobble, TimeRange};

/// Wraps a source and holds every response back by a fixed delay, so
/// overlapping requests can be watched resolving out of order.
#[derive(Debug)]
pub struct DelayedSource<S> {
    inner: S,
    delay: Duration,
}

impl<S> DelayedSource<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<S: HistorySource + Sync> HistorySource for DelayedSource<S> {
    fn fetch(
        &self,
        user: &str,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<Scrobble>, FetchError>> + Send {
        let delay = self.delay;
        let inner = self.inner.fetch(user, range);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            inner.await
        }
    }
}
