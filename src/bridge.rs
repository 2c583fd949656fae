//! Stream bridge
//!
//! Once the shell is interactive, this is the whole job: copy bytes between
//! the duplex client channel and the shell channel, in both directions, until
//! either side goes away. Input reaches the shell verbatim (control
//! sequences, pastes and multi-byte input survive unmodified); output chunks
//! are forwarded opaquely in arrival order. Resize events change the PTY
//! window and are never written as input.

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::channel::{ClientChannel, ClientEvent, ServerEvent, StatusPhase};
use crate::error::BridgeError;
use crate::ssh::{SessionCommand, ShellHandle};

/// Which side ended the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    /// The duplex client went away; the transport is ended immediately
    /// without waiting for in-flight output.
    ClientClosed,
    /// The shell channel closed; the client has been told it is
    /// disconnected.
    ShellClosed,
}

/// One turn of the pump loop: whichever side produced something first.
enum Next {
    FromClient(Option<ClientEvent>),
    FromShell(Option<Vec<u8>>),
}

/// Pump events between the client and the shell until one side closes.
///
/// Ordering within each direction follows the underlying stream; no ordering
/// holds across directions.
pub async fn run_bridge<C: ClientChannel>(
    client: &mut C,
    shell: &mut ShellHandle,
    session_id: &str,
) -> Result<BridgeEnd, BridgeError> {
    loop {
        let next = tokio::select! {
            event = client.recv() => Next::FromClient(event),
            output = shell.output_rx.recv() => Next::FromShell(output),
        };

        match next {
            Next::FromClient(Some(ClientEvent::Data(bytes))) => {
                if shell
                    .cmd_tx
                    .send(SessionCommand::Data(bytes.to_vec()))
                    .await
                    .is_err()
                {
                    return shell_closed(client, session_id).await;
                }
            }
            Next::FromClient(Some(ClientEvent::Resize { rows, cols })) => {
                if rows == 0 || cols == 0 {
                    warn!(
                        "session {}: ignoring resize to {}x{}",
                        session_id, cols, rows
                    );
                    continue;
                }
                debug!("session {}: resize to {}x{}", session_id, cols, rows);
                if shell
                    .cmd_tx
                    .send(SessionCommand::Resize { rows, cols })
                    .await
                    .is_err()
                {
                    return shell_closed(client, session_id).await;
                }
            }
            Next::FromClient(Some(ClientEvent::AuthResponse { .. })) => {
                debug!(
                    "session {}: ignoring auth response after authentication",
                    session_id
                );
            }
            Next::FromClient(None) => {
                info!("session {}: client disconnected", session_id);
                let _ = shell.cmd_tx.send(SessionCommand::Close).await;
                return Ok(BridgeEnd::ClientClosed);
            }
            Next::FromShell(Some(data)) => {
                if client
                    .send(ServerEvent::Data(Bytes::from(data)))
                    .await
                    .is_err()
                {
                    info!("session {}: client send failed, ending bridge", session_id);
                    let _ = shell.cmd_tx.send(SessionCommand::Close).await;
                    return Ok(BridgeEnd::ClientClosed);
                }
            }
            Next::FromShell(None) => {
                return shell_closed(client, session_id).await;
            }
        }
    }
}

async fn shell_closed<C: ClientChannel>(
    client: &mut C,
    session_id: &str,
) -> Result<BridgeEnd, BridgeError> {
    info!("session {}: shell channel closed", session_id);
    let _ = client
        .send(ServerEvent::Status {
            phase: StatusPhase::Disconnected,
            message: "shell session ended".into(),
        })
        .await;
    Ok(BridgeEnd::ShellClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::channel::memory_pair;

    /// A fake shell: the far ends of a ShellHandle's channels.
    struct FakeShell {
        cmd_rx: mpsc::Receiver<SessionCommand>,
        output_tx: mpsc::Sender<Vec<u8>>,
    }

    fn fake_shell() -> (ShellHandle, FakeShell) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (output_tx, output_rx) = mpsc::channel(64);
        (
            ShellHandle::from_parts(cmd_tx, output_rx),
            FakeShell { cmd_rx, output_tx },
        )
    }

    #[tokio::test]
    async fn input_bytes_reach_the_shell_unmodified() {
        let (mut server, mut remote) = memory_pair(64);
        let (mut shell, mut fake) = fake_shell();

        // Control characters, multi-byte UTF-8, and a binary blob.
        let mut blob = vec![0x1b, b'[', b'A', 0x03, 0x00, 0x7f];
        blob.extend("héllo → 世界".as_bytes());
        blob.extend((0..8192u32).map(|i| (i * 31 % 251) as u8));

        let bridge = tokio::spawn(async move {
            let end = run_bridge(&mut server, &mut shell, "test").await;
            (server, shell, end)
        });

        remote
            .send(ClientEvent::Data(Bytes::from(blob.clone())))
            .await;

        match fake.cmd_rx.recv().await {
            Some(SessionCommand::Data(received)) => assert_eq!(received, blob),
            other => panic!("expected data command, got {:?}", other),
        }

        remote.disconnect();
        let (_, _, end) = bridge.await.unwrap();
        assert_eq!(end.unwrap(), BridgeEnd::ClientClosed);
    }

    #[tokio::test]
    async fn resize_never_appears_as_shell_input() {
        let (mut server, mut remote) = memory_pair(64);
        let (mut shell, mut fake) = fake_shell();

        let bridge = tokio::spawn(async move {
            let end = run_bridge(&mut server, &mut shell, "test").await;
            (server, shell, end)
        });

        remote
            .send(ClientEvent::Resize { rows: 40, cols: 120 })
            .await;
        remote.send(ClientEvent::Data(Bytes::from_static(b"ls\r"))).await;

        assert_eq!(
            fake.cmd_rx.recv().await,
            Some(SessionCommand::Resize { rows: 40, cols: 120 })
        );
        assert_eq!(
            fake.cmd_rx.recv().await,
            Some(SessionCommand::Data(b"ls\r".to_vec()))
        );

        remote.disconnect();
        let (_, _, end) = bridge.await.unwrap();
        assert_eq!(end.unwrap(), BridgeEnd::ClientClosed);
    }

    #[tokio::test]
    async fn zero_dimension_resize_is_dropped() {
        let (mut server, mut remote) = memory_pair(64);
        let (mut shell, mut fake) = fake_shell();

        let bridge = tokio::spawn(async move {
            let end = run_bridge(&mut server, &mut shell, "test").await;
            (server, shell, end)
        });

        remote.send(ClientEvent::Resize { rows: 0, cols: 120 }).await;
        remote.send(ClientEvent::Data(Bytes::from_static(b"x"))).await;

        // Only the data command arrives; the malformed resize was dropped.
        assert_eq!(
            fake.cmd_rx.recv().await,
            Some(SessionCommand::Data(b"x".to_vec()))
        );

        remote.disconnect();
        bridge.await.unwrap().2.unwrap();
    }

    #[tokio::test]
    async fn shell_output_is_forwarded_in_order_then_close_notifies() {
        let (mut server, mut remote) = memory_pair(64);
        let (mut shell, fake) = fake_shell();

        let bridge = tokio::spawn(async move {
            let end = run_bridge(&mut server, &mut shell, "test").await;
            (server, shell, end)
        });

        fake.output_tx.send(b"first".to_vec()).await.unwrap();
        fake.output_tx.send(b"second".to_vec()).await.unwrap();
        // Shell side closes.
        drop(fake.output_tx);

        assert_eq!(
            remote.recv().await,
            Some(ServerEvent::Data(Bytes::from_static(b"first")))
        );
        assert_eq!(
            remote.recv().await,
            Some(ServerEvent::Data(Bytes::from_static(b"second")))
        );
        match remote.recv().await {
            Some(ServerEvent::Status { phase, .. }) => {
                assert_eq!(phase, StatusPhase::Disconnected)
            }
            other => panic!("expected disconnected status, got {:?}", other),
        }

        let (_, _, end) = bridge.await.unwrap();
        assert_eq!(end.unwrap(), BridgeEnd::ShellClosed);
    }

    #[tokio::test]
    async fn client_close_sends_close_to_shell() {
        let (mut server, remote) = memory_pair(64);
        let (mut shell, mut fake) = fake_shell();

        let bridge = tokio::spawn(async move {
            let end = run_bridge(&mut server, &mut shell, "test").await;
            (server, shell, end)
        });

        drop(remote);

        assert_eq!(fake.cmd_rx.recv().await, Some(SessionCommand::Close));
        let (_, _, end) = bridge.await.unwrap();
        assert_eq!(end.unwrap(), BridgeEnd::ClientClosed);
    }
}
