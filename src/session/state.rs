//! Session lifecycle state machine
//!
//! `Connecting → Authenticating → Ready → Closing → Closed`, strictly
//! forward. Any error short-circuits to `Closing`. The close trigger is
//! idempotent: whichever of client disconnect, transport close, or
//! cancellation fires first wins, and later triggers are no-ops.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    Connecting,
    Authenticating,
    Ready,
    Closing,
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStatus::Connecting => "connecting",
            SessionStatus::Authenticating => "authenticating",
            SessionStatus::Ready => "ready",
            SessionStatus::Closing => "closing",
            SessionStatus::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Shared, synchronized status of one session.
///
/// Transport callbacks and client callbacks race on this from different
/// tasks; the mutex is the only synchronization they need.
#[derive(Debug)]
pub struct SessionState {
    status: Mutex<SessionStatus>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(SessionStatus::Connecting),
        }
    }

    pub fn current(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Move forward to `next`. Returns false (and leaves the status alone)
    /// if the move would go backwards or stand still.
    pub fn advance(&self, next: SessionStatus) -> bool {
        let mut status = self.status.lock();
        if next > *status {
            *status = next;
            true
        } else {
            false
        }
    }

    /// First-trigger-wins close. Returns true only for the caller that
    /// actually initiated teardown; everyone else sees false.
    pub fn begin_close(&self) -> bool {
        let mut status = self.status.lock();
        if *status < SessionStatus::Closing {
            *status = SessionStatus::Closing;
            true
        } else {
            false
        }
    }

    pub fn finish_close(&self) {
        let mut status = self.status.lock();
        *status = SessionStatus::Closed;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
