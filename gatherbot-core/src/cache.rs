//! Process-lifetime read-through cache.
//!
//! Shields the dispatcher and tracker from redundant external calls.
//! The cache is a dumb store: it records when a value was written and
//! leaves the staleness judgement to the caller. Entries are never
//! evicted; key cardinality is naturally bounded (one entry per user,
//! one per calendar day).

use std::collections::HashMap;
use std::sync::Arc;

use gatherbot_sdk::objects::realtime::{StreamSnapshot, UserProfile};
use time::{Date, Duration, OffsetDateTime};
use tokio::sync::RwLock;

/// Staleness horizon for cached user profiles.
pub const USER_PROFILE_STALENESS: Duration = Duration::hours(24);

/// A cached value and the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: OffsetDateTime,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: OffsetDateTime::now_utc(),
        }
    }

    /// Whether this entry was stored longer than `horizon` ago.
    pub fn is_older_than(&self, horizon: Duration) -> bool {
        OffsetDateTime::now_utc() - self.stored_at > horizon
    }
}

/// Cloneable handle to the shared store.
#[derive(Clone, Default)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    users: RwLock<HashMap<String, CacheEntry<UserProfile>>>,
    streams: RwLock<HashMap<Date, CacheEntry<StreamSnapshot>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_user(&self, user_id: &str) -> Option<CacheEntry<UserProfile>> {
        self.inner.users.read().await.get(user_id).cloned()
    }

    /// Store a profile under its own id, overwriting any previous entry.
    pub async fn put_user(&self, profile: UserProfile) {
        let mut users = self.inner.users.write().await;
        users.insert(profile.id.clone(), CacheEntry::new(profile));
    }

    pub async fn get_stream(&self, day: Date) -> Option<CacheEntry<StreamSnapshot>> {
        self.inner.streams.read().await.get(&day).cloned()
    }

    /// Store a snapshot under its stream day, overwriting any previous
    /// entry for that day.
    pub async fn put_stream(&self, snapshot: StreamSnapshot) {
        let mut streams = self.inner.streams.write().await;
        streams.insert(snapshot.stream_date, CacheEntry::new(snapshot));
    }
}
