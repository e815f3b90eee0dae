//! Per-session mode and preference memory
//!
//! Sharded concurrent map keyed by session id. Updates are shallow merges,
//! last write wins per field. Idle sessions are evicted by `sweep_idle`.

use crate::models::{ExecutionMode, Preferences};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub mode: ExecutionMode,
    pub preferences: Preferences,
    pub last_seen: DateTime<Utc>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            mode: ExecutionMode::Auto,
            preferences: Preferences::new(),
            last_seen: Utc::now(),
        }
    }

    fn idle_longer_than(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        (now - self.last_seen)
            .to_std()
            .map(|idle| idle > ttl)
            .unwrap_or(false)
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub mode: Option<ExecutionMode>,
    pub preferences: Option<Preferences>,
}

pub struct SessionStore {
    sessions: DashMap<String, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Fetch the session, creating it on first use. Refreshes `last_seen`.
    pub fn get_or_create(&self, session_id: &str) -> SessionState {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);
        entry.last_seen = Utc::now();
        entry.clone()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    /// Shallow-merge `update` into the session and return the merged state.
    pub fn update(&self, session_id: &str, update: SessionUpdate) -> SessionState {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);

        if let Some(mode) = update.mode {
            entry.mode = mode;
        }
        if let Some(preferences) = update.preferences {
            for (key, value) in preferences {
                entry.preferences.insert(key, value);
            }
        }
        entry.last_seen = Utc::now();

        entry.clone()
    }

    /// Evict sessions idle for longer than `ttl`; returns how many were removed.
    pub fn sweep_idle(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, state| !state.idle_longer_than(ttl, now));
        let evicted = before.saturating_sub(self.sessions.len());

        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
