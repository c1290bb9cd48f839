use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tuneline_protocol::{Scrobble, ScrobbleId};

/// An immutable, normalized listening history for one window.
///
/// Sorted newest first, one entry per id. `generation` identifies the fetch
/// that produced it; a new generation means a new event set, even when the
/// contents happen to match.
#[derive(Debug, Clone)]
pub struct EventSet {
    generation: u64,
    events: Arc<[Scrobble]>,
    index: HashMap<ScrobbleId, usize>,
}

impl EventSet {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            events: Arc::from(Vec::new()),
            index: HashMap::new(),
        }
    }

    /// Build from a fetched list, re-normalizing it with [`normalize`]
    /// regardless of what the source promised.
    pub fn from_fetched(generation: u64, fetched: Vec<Scrobble>) -> Self {
        let events = normalize(fetched);
        let index = events
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        Self {
            generation,
            events: Arc::from(events),
            index,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn events(&self) -> &[Scrobble] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Row of `id` in the sorted list.
    pub fn index_of(&self, id: &ScrobbleId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &ScrobbleId) -> Option<&Scrobble> {
        self.index_of(id).and_then(|i| self.events.get(i))
    }

    pub fn contains(&self, id: &ScrobbleId) -> bool {
        self.index.contains_key(id)
    }
}

/// Drop repeated ids (first occurrence wins), then order by `listened_at`
/// descending. Equal timestamps fall back to id order so the result is
/// deterministic.
pub fn normalize(fetched: Vec<Scrobble>) -> Vec<Scrobble> {
    let mut seen = HashSet::with_capacity(fetched.len());
    let mut events: Vec<Scrobble> = fetched
        .into_iter()
        .filter(|s| seen.insert(s.id.clone()))
        .collect();
    events.sort_by(|a, b| {
        b.listened_at
            .cmp(&a.listened_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    events
}

impl Default for EventSet {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 12, minute, 0)
            .single()
            .unwrap_or_default()
    }

    fn scrobble(id: &str, track: &str, minute: u32) -> Scrobble {
        Scrobble {
            id: ScrobbleId::from(id),
            artist: "Noname".into(),
            track: track.into(),
            album: Some("Room 25".into()),
            listened_at: at(minute),
            artwork: None,
        }
    }

    #[test]
    fn sorts_newest_first() {
        let set = EventSet::from_fetched(
            1,
            vec![
                scrobble("a", "Self", 1),
                scrobble("b", "Blaxploitation", 30),
                scrobble("c", "Prayer Song", 15),
            ],
        );
        let ids: Vec<_> = set.events().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
        assert_eq!(set.index_of(&ScrobbleId::from("a")), Some(2));
    }

    #[test]
    fn drops_duplicate_ids_keeping_first() {
        let set = EventSet::from_fetched(
            1,
            vec![
                scrobble("a", "Self", 1),
                scrobble("a", "Self (duplicate)", 1),
                scrobble("b", "Montego Bae", 2),
            ],
        );
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.get(&ScrobbleId::from("a")).map(|s| s.track.as_str()),
            Some("Self")
        );
    }

    #[test]
    fn equal_timestamps_order_by_id() {
        let set = EventSet::from_fetched(1, vec![scrobble("z", "x", 5), scrobble("m", "y", 5)]);
        let ids: Vec<_> = set.events().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["m", "z"]);
    }

    #[test]
    fn empty_set_lookups() {
        let set = EventSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.generation(), 0);
        assert!(!set.contains(&ScrobbleId::from("a")));
    }
}
