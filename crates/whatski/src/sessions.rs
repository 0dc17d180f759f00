use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use uuid::Uuid;
use whatski_core::{ChatSession, ChatSessionBuilder};

/// A chat session shared between the requests of one browser.
pub type SharedSession = Arc<AsyncMutex<ChatSession>>;

struct Entry {
    session: SharedSession,
    last_seen: Instant,
}

/// All live chat sessions, keyed by the id stored in the browser cookie.
///
/// Sessions are created on demand from a template builder and dropped
/// after being idle for longer than the TTL.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<Uuid, Entry>>>,
    template: ChatSessionBuilder,
    ttl: Duration,
}

impl SessionStore {
    /// Creates an empty store.
    #[inline]
    pub fn new(template: ChatSessionBuilder, ttl: Duration) -> Self {
        Self {
            entries: Default::default(),
            template,
            ttl,
        }
    }

    #[inline]
    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the session with the given id, or a new session under a
    /// fresh id if the id is absent or unknown.
    pub fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SharedSession) {
        let now = Instant::now();
        let mut entries = self.entries();
        if let Some(id) = id {
            if let Some(entry) = entries.get_mut(&id) {
                entry.last_seen = now;
                return (id, Arc::clone(&entry.session));
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(AsyncMutex::new(self.template.clone().build()));
        entries.insert(
            id,
            Entry {
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        debug!("opened session {id} ({} live)", entries.len());
        (id, session)
    }

    /// Returns the number of live sessions.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if there is no live session.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drops sessions idle for longer than the TTL and returns how many
    /// were dropped. Sessions still used by a request are kept.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| {
            now.duration_since(entry.last_seen) <= self.ttl
                || Arc::strong_count(&entry.session) > 1
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            info!("evicted {evicted} idle sessions ({} live)", entries.len());
        }
        evicted
    }

    /// Spawns a task that sweeps the store periodically.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let store = self.clone();
        let period = (self.ttl / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }
}
