//! In-memory session registry with idle expiry
//!
//! Sessions live only as long as the process. Any access refreshes a
//! session's `last_touched`; sessions idle longer than the TTL are dropped
//! when a new session is created and by the periodic cleanup task.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

struct Tracked<T> {
    session: T,
    last_touched: DateTime<Utc>,
}

/// Sessions keyed by id
pub struct SessionMap<T> {
    entries: HashMap<Uuid, Tracked<T>>,
    ttl: Duration,
}

impl<T> SessionMap<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Session map with a TTL given in minutes
    pub fn with_ttl_minutes(minutes: u64) -> Self {
        let minutes = i64::try_from(minutes).unwrap_or(i64::MAX).min(i64::MAX / 60_000);
        Self::new(Duration::minutes(minutes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a new session, dropping stale ones first
    pub fn insert(&mut self, id: Uuid, session: T) {
        self.insert_at(id, session, Utc::now());
    }

    fn insert_at(&mut self, id: Uuid, session: T, now: DateTime<Utc>) {
        self.cleanup_stale(now);
        self.entries.insert(
            id,
            Tracked {
                session,
                last_touched: now,
            },
        );
    }

    pub fn get(&mut self, id: &Uuid) -> Option<&T> {
        self.get_mut(id).map(|s| &*s)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut T> {
        self.entries.get_mut(id).map(|tracked| {
            tracked.last_touched = Utc::now();
            &mut tracked.session
        })
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<T> {
        self.entries.remove(id).map(|tracked| tracked.session)
    }

    /// Drop sessions idle for longer than the TTL at `now`
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_stale(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, tracked| now.signed_duration_since(tracked.last_touched) <= ttl);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_sessions_are_pruned() {
        let mut sessions = SessionMap::new(Duration::minutes(30));
        let start = Utc::now();
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        sessions.insert_at(old, "old", start);
        sessions.insert_at(fresh, "fresh", start + Duration::minutes(20));

        assert_eq!(sessions.cleanup_stale(start + Duration::minutes(31)), 1);
        assert!(sessions.get(&old).is_none());
        assert_eq!(sessions.get(&fresh), Some(&"fresh"));
    }

    #[test]
    fn test_insert_prunes_before_adding() {
        let mut sessions = SessionMap::new(Duration::minutes(5));
        let start = Utc::now();
        sessions.insert_at(Uuid::new_v4(), 1, start);
        sessions.insert_at(Uuid::new_v4(), 2, start + Duration::minutes(1));
        sessions.insert_at(Uuid::new_v4(), 3, start + Duration::minutes(10));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_access_refreshes_session() {
        let mut sessions = SessionMap::new(Duration::minutes(5));
        let id = Uuid::new_v4();
        sessions.insert_at(id, 1, Utc::now() - Duration::minutes(4));
        assert!(sessions.get_mut(&id).is_some());
        assert_eq!(sessions.cleanup_stale(Utc::now() + Duration::minutes(3)), 0);
        assert_eq!(sessions.remove(&id), Some(1));
        assert!(sessions.is_empty());
    }
}
