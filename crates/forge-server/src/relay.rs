//! Registry of live status relays.
//!
//! One entry per correlation id pairs a browser socket with the matching
//! catapult status socket. Entries leave the map when either side closes,
//! when a newer relay for the same id replaces them, or when the sweeper finds
//! them idle.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

struct RelayEntry {
    session: Uuid,
    opened_at: DateTime<Utc>,
    last_activity: Instant,
    close: Arc<Notify>,
}

/// Held by the task pumping one relay.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    pub correlation_id: Uuid,
    pub session: Uuid,
    close: Arc<Notify>,
}

impl RelayHandle {
    /// Resolves once the relay has been replaced or evicted.
    pub async fn closed(&self) {
        self.close.notified().await;
    }
}

#[derive(Clone)]
pub struct StatusRelay {
    entries: Arc<Mutex<HashMap<Uuid, RelayEntry>>>,
    idle_timeout: Duration,
}

impl StatusRelay {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Track a new relay for `correlation_id`, closing any previous one.
    pub async fn register(&self, correlation_id: Uuid) -> RelayHandle {
        let close = Arc::new(Notify::new());
        let entry = RelayEntry {
            session: Uuid::new_v4(),
            opened_at: Utc::now(),
            last_activity: Instant::now(),
            close: close.clone(),
        };
        let session = entry.session;

        let previous = self.entries.lock().await.insert(correlation_id, entry);
        if let Some(previous) = previous {
            info!(%correlation_id, opened_at = %previous.opened_at, "replacing existing status relay");
            previous.close.notify_one();
        }
        debug!(%correlation_id, %session, "status relay registered");

        RelayHandle {
            correlation_id,
            session,
            close,
        }
    }

    pub async fn touch(&self, handle: &RelayHandle) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&handle.correlation_id) {
            if entry.session == handle.session {
                entry.last_activity = Instant::now();
            }
        }
    }

    /// Drop the entry if it still belongs to `handle`.
    pub async fn remove(&self, handle: &RelayHandle) -> bool {
        let mut entries = self.entries.lock().await;
        let owned = entries
            .get(&handle.correlation_id)
            .is_some_and(|e| e.session == handle.session);
        if owned {
            entries.remove(&handle.correlation_id);
            debug!(correlation_id = %handle.correlation_id, "status relay removed");
        }
        owned
    }

    /// Close and forget every relay idle for longer than the timeout.
    pub async fn sweep(&self) -> Vec<Uuid> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expired: Vec<Uuid> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_activity) >= self.idle_timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(entry) = entries.remove(id) {
                info!(correlation_id = %id, "closing idle status relay");
                entry.close.notify_one();
            }
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn contains(&self, correlation_id: &Uuid) -> bool {
        self.entries.lock().await.contains_key(correlation_id)
    }

    /// Run [`StatusRelay::sweep`] every `interval` on the current runtime.
    pub fn spawn_sweeper(&self, interval: Duration) {
        let relay = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                relay.sweep().await;
            }
        });
    }
}
