//! Live relay session registry.
//!
//! A session is inserted as `Connecting` once its target socket is open and
//! the client upgrade is pending, moves to `Open` when both sockets are up
//! and is removed when the returned [`SessionGuard`] drops, so a refused
//! upgrade or a cancelled bridge still leaves the registry.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::observability::metrics;

/// Unique identifier for a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug)]
struct SessionEntry {
    target: String,
    state: SessionState,
    opened: Instant,
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub target: String,
    pub state: SessionState,
    pub age: Duration,
}

/// Concurrent map of live sessions, owned by the server state.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session whose target socket has just opened.
    pub fn begin(&self, target: impl Into<String>) -> SessionGuard {
        let id = SessionId::new();
        let target = target.into();
        tracing::debug!(session_id = %id, target = %target, "Relay session registered");
        self.sessions.insert(
            id,
            SessionEntry {
                target,
                state: SessionState::Connecting,
                opened: Instant::now(),
            },
        );
        metrics::session_opened();
        SessionGuard {
            id,
            sessions: Arc::clone(&self.sessions),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions.get(&id).map(|entry| entry.state)
    }

    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| SessionInfo {
                id: *entry.key(),
                target: entry.target.clone(),
                state: entry.state,
                age: entry.opened.elapsed(),
            })
            .collect()
    }
}

/// Keeps a session registered for as long as it lives.
#[derive(Debug)]
pub struct SessionGuard {
    id: SessionId,
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mark_open(&self) {
        self.set_state(SessionState::Open);
    }

    /// Mark the session as closing; it stays listed until the guard drops.
    pub fn mark_closed(&self) {
        self.set_state(SessionState::Closed);
    }

    fn set_state(&self, state: SessionState) {
        if let Some(mut entry) = self.sessions.get_mut(&self.id) {
            entry.state = state;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.id).is_some() {
            metrics::session_closed();
        }
        tracing::trace!(session_id = %self.id, "Relay session removed");
    }
}
