//! Duplex client channel
//!
//! The client-facing side of a session: a persistent two-way connection
//! carrying structured events rather than raw bytes only. The bridge core
//! talks to it through the [`ClientChannel`] trait; the WebSocket adapter in
//! [`crate::ws`] is the production implementation, and [`memory_pair`] backs
//! the test suite with an in-process loopback.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::BridgeError;

/// Lifecycle phase reported to the client via `status` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPhase {
    Connecting,
    Connected,
    AuthInProgress,
    Disconnected,
}

/// One interactive-authentication prompt relayed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPrompt {
    /// Prompt text exactly as the remote host sent it.
    pub prompt: String,
    /// true = show input, false = mask input.
    pub echo: bool,
}

/// Events emitted by the bridge toward the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Lifecycle progress. `message` is short and human-readable.
    Status { phase: StatusPhase, message: String },
    /// Raw terminal output chunk (stdout and stderr merged, order preserved).
    Data(Bytes),
    /// Categorized failure message; never secret material or stack traces.
    Error { message: String },
    /// The shell is interactive.
    Ready,
    /// Interactive prompts the client must answer to finish authentication.
    AuthPrompt { prompts: Vec<AuthPrompt> },
}

/// Events received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Raw keystroke bytes, forwarded verbatim to the shell.
    Data(Bytes),
    /// Terminal dimensions changed; never written to the shell as input.
    Resize { rows: u16, cols: u16 },
    /// Answers to a previously relayed [`ServerEvent::AuthPrompt`], in prompt
    /// order.
    AuthResponse { answers: Vec<String> },
}

/// The duplex connection to one client.
///
/// `recv` returning `None` means the client is gone; that is the normal
/// teardown trigger, not an error. A failed `send` is treated the same way by
/// callers.
#[async_trait]
pub trait ClientChannel: Send {
    async fn send(&mut self, event: ServerEvent) -> Result<(), BridgeError>;
    async fn recv(&mut self) -> Option<ClientEvent>;
    /// Close the connection. Idempotent.
    async fn close(&mut self);
}

/// Create a connected in-memory channel pair.
///
/// The [`MemoryChannel`] half implements [`ClientChannel`] and is handed to a
/// session; the [`MemoryRemote`] half plays the browser.
pub fn memory_pair(capacity: usize) -> (MemoryChannel, MemoryRemote) {
    let (server_tx, server_rx) = mpsc::channel(capacity);
    let (client_tx, client_rx) = mpsc::channel(capacity);
    (
        MemoryChannel {
            tx: Some(server_tx),
            rx: client_rx,
        },
        MemoryRemote {
            tx: Some(client_tx),
            rx: server_rx,
        },
    )
}

/// Server-side half of an in-memory duplex pair.
pub struct MemoryChannel {
    tx: Option<mpsc::Sender<ServerEvent>>,
    rx: mpsc::Receiver<ClientEvent>,
}

#[async_trait]
impl ClientChannel for MemoryChannel {
    async fn send(&mut self, event: ServerEvent) -> Result<(), BridgeError> {
        match &self.tx {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| BridgeError::ClientDisconnected),
            None => Err(BridgeError::ClientDisconnected),
        }
    }

    async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.tx.take();
        self.rx.close();
    }
}

/// Client-side half of an in-memory duplex pair.
pub struct MemoryRemote {
    tx: Option<mpsc::Sender<ClientEvent>>,
    rx: mpsc::Receiver<ServerEvent>,
}

impl MemoryRemote {
    pub async fn send(&mut self, event: ClientEvent) -> bool {
        match &self.tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Next event emitted by the bridge; `None` once the session closed its
    /// side.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    /// Hang up, as a browser closing the tab would.
    pub fn disconnect(&mut self) {
        self.tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_delivers_both_directions() {
        let (mut server, mut remote) = memory_pair(8);

        remote
            .send(ClientEvent::Resize { rows: 40, cols: 120 })
            .await;
        assert_eq!(
            server.recv().await,
            Some(ClientEvent::Resize { rows: 40, cols: 120 })
        );

        server.send(ServerEvent::Ready).await.unwrap();
        assert_eq!(remote.recv().await, Some(ServerEvent::Ready));
    }

    #[tokio::test]
    async fn remote_disconnect_surfaces_as_none() {
        let (mut server, mut remote) = memory_pair(8);
        remote.disconnect();
        assert_eq!(server.recv().await, None);
    }

    #[tokio::test]
    async fn server_close_is_idempotent_and_ends_remote() {
        let (mut server, mut remote) = memory_pair(8);
        server.close().await;
        server.close().await;
        assert_eq!(remote.recv().await, None);
        assert!(server.send(ServerEvent::Ready).await.is_err());
    }
}
