//! Bridge error taxonomy
//!
//! Every failure inside a terminal session collapses into one of the kinds
//! below. Server-side logs carry full detail (including the phase that
//! failed); clients only ever see the short categorized message from
//! [`BridgeError::client_message`] - never secret material, never the
//! underlying transport error chain.

use thiserror::Error;

/// Phase of the session lifecycle a deadline applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// TCP connect plus SSH handshake.
    Dial,
    /// Authentication round-trips with the remote host.
    Auth,
    /// Waiting on the client to answer interactive prompts.
    Prompt,
    /// Channel open, PTY and shell requests.
    Shell,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Dial => write!(f, "connect"),
            Phase::Auth => write!(f, "authentication"),
            Phase::Prompt => write!(f, "prompt response"),
            Phase::Shell => write!(f, "shell open"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("invalid session request: {0}")]
    InvalidRequest(String),

    #[error("target {0} not found")]
    NotFound(u64),

    #[error("principal {principal} is not allowed to open a terminal on target {target}")]
    Forbidden { principal: u64, target: u64 },

    #[error("no credential on file for target {0}")]
    NoCredential(u64),

    #[error("connection failed: {0}")]
    DialFailed(String),

    #[error("{0} timed out")]
    Timeout(Phase),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("client disconnected")]
    ClientDisconnected,
}

impl BridgeError {
    /// Short categorized message surfaced to the duplex client.
    ///
    /// `Forbidden` and `NotFound` are deliberately indistinguishable here so
    /// an unauthorized caller cannot probe which targets exist; server logs
    /// keep the distinction.
    pub fn client_message(&self) -> String {
        match self {
            BridgeError::InvalidRequest(_) => {
                "invalid terminal request; check the connection parameters".to_string()
            }
            BridgeError::NotFound(_) | BridgeError::Forbidden { .. } => {
                "target not found or not accessible".to_string()
            }
            BridgeError::NoCredential(_) => {
                "no credential available for this target; set a password before opening a console"
                    .to_string()
            }
            BridgeError::DialFailed(_) => "could not reach the target machine".to_string(),
            BridgeError::Timeout(phase) => {
                format!("{} timed out; try again shortly", phase)
            }
            BridgeError::AuthFailed(_) => {
                "authentication was rejected; verify or reset the stored credential".to_string()
            }
            BridgeError::ProtocolError(_) => "unexpected error talking to the target".to_string(),
            BridgeError::ClientDisconnected => "client disconnected".to_string(),
        }
    }

    /// True for the one non-failure kind: the client going away is a normal
    /// teardown trigger and is never emitted back as an `error` event.
    pub fn is_client_disconnect(&self) -> bool {
        matches!(self, BridgeError::ClientDisconnected)
    }
}

impl From<russh::Error> for BridgeError {
    fn from(err: russh::Error) -> Self {
        BridgeError::ProtocolError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_and_not_found_look_identical_to_clients() {
        let not_found = BridgeError::NotFound(7);
        let forbidden = BridgeError::Forbidden {
            principal: 3,
            target: 7,
        };
        assert_eq!(not_found.client_message(), forbidden.client_message());
    }

    #[test]
    fn timeout_message_differs_from_auth_failure() {
        let timeout = BridgeError::Timeout(Phase::Auth).client_message();
        let rejected = BridgeError::AuthFailed("rejected".into()).client_message();
        assert_ne!(timeout, rejected);
        assert!(timeout.contains("timed out"));
        assert!(rejected.contains("credential"));
    }

    #[test]
    fn client_disconnect_is_not_an_error_event() {
        assert!(BridgeError::ClientDisconnected.is_client_disconnect());
        assert!(!BridgeError::DialFailed("refused".into()).is_client_disconnect());
    }
}
