//! Session registry
//!
//! Thread-safe table of live terminal sessions using DashMap for concurrent
//! access. Each session runs as its own task; the registry hands out
//! cancellation and status introspection, enforces the concurrent-session
//! cap, and removes entries when their task finishes. Sessions never touch
//! each other's state.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::state::{SessionState, SessionStatus};
use super::supervisor::SessionSupervisor;
use crate::authorize::SessionRequest;
use crate::channel::ClientChannel;

/// Default maximum concurrent sessions.
const DEFAULT_MAX_SESSIONS: usize = 64;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("session limit reached ({current}/{max})")]
    LimitReached { current: usize, max: usize },
}

struct SessionEntry {
    request: SessionRequest,
    state: Arc<SessionState>,
    cancel: CancellationToken,
}

/// Registry of live sessions.
pub struct SessionRegistry {
    supervisor: Arc<SessionSupervisor>,
    sessions: DashMap<String, SessionEntry>,
    max_sessions: usize,
    // Serializes the count check against the insert.
    create_lock: parking_lot::Mutex<()>,
}

impl SessionRegistry {
    pub fn new(supervisor: Arc<SessionSupervisor>) -> Self {
        Self::with_max_sessions(supervisor, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_max_sessions(supervisor: Arc<SessionSupervisor>, max_sessions: usize) -> Self {
        Self {
            supervisor,
            sessions: DashMap::new(),
            max_sessions,
            create_lock: parking_lot::Mutex::new(()),
        }
    }

    /// Spawn a session task for an accepted duplex connection. Returns the
    /// registry key for later cancellation/introspection.
    pub fn open<C>(
        self: &Arc<Self>,
        request: SessionRequest,
        client: C,
    ) -> Result<String, RegistryError>
    where
        C: ClientChannel + 'static,
    {
        let _guard = self.create_lock.lock();
        let current = self.sessions.len();
        if current >= self.max_sessions {
            return Err(RegistryError::LimitReached {
                current,
                max: self.max_sessions,
            });
        }

        let key = Uuid::new_v4().to_string();
        let state = Arc::new(SessionState::new());
        let cancel = CancellationToken::new();

        self.sessions.insert(
            key.clone(),
            SessionEntry {
                request,
                state: state.clone(),
                cancel: cancel.clone(),
            },
        );
        info!(
            "registry: session {} admitted ({} active)",
            key,
            current + 1
        );

        let registry = Arc::clone(self);
        let task_key = key.clone();
        tokio::spawn(async move {
            let _ = registry
                .supervisor
                .run(request, client, state, cancel)
                .await;
            registry.sessions.remove(&task_key);
            debug!("registry: session {} removed", task_key);
        });

        Ok(key)
    }

    /// Cancel a session; its supervisor observes the token from whatever
    /// phase it is in and tears down. Returns false for unknown keys.
    pub fn cancel(&self, key: &str) -> bool {
        match self.sessions.get(key) {
            Some(entry) => {
                info!("registry: cancelling session {}", key);
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, key: &str) -> Option<SessionStatus> {
        self.sessions.get(key).map(|entry| entry.state.current())
    }

    pub fn request(&self, key: &str) -> Option<SessionRequest> {
        self.sessions.get(key).map(|entry| entry.request)
    }

    /// Number of sessions currently admitted (connecting through closing).
    pub fn active(&self) -> usize {
        self.sessions.len()
    }
}
