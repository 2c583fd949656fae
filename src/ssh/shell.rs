//! PTY shell channel
//!
//! Opens the pseudo-terminal-backed shell on an authenticated transport and
//! wraps it in the single-owner pattern: one task owns the russh channel, and
//! everything else talks to it through a [`ShellHandle`]. Output (stdout and
//! stderr merged, in arrival order) flows out through a channel; commands
//! (input bytes, resize, close) flow in through another.

use russh::client::Handle;
use russh::ChannelMsg;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::client::TransportHandler;
use super::with_deadline;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Phase};

/// Commands accepted by the shell channel task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Raw bytes written verbatim to the shell's input.
    Data(Vec<u8>),
    /// Change the PTY window size.
    Resize { rows: u16, cols: u16 },
    /// End the shell channel.
    Close,
}

/// Handle to a live shell channel.
///
/// Dropping the handle closes the channel: the owner task sees the command
/// stream end and sends EOF. `output_rx` yielding `None` means the shell side
/// has closed.
pub struct ShellHandle {
    pub cmd_tx: mpsc::Sender<SessionCommand>,
    pub output_rx: mpsc::Receiver<Vec<u8>>,
}

impl ShellHandle {
    /// Assemble a handle from raw channel halves. The test suite uses this to
    /// stand in a fake shell without a transport.
    pub fn from_parts(
        cmd_tx: mpsc::Sender<SessionCommand>,
        output_rx: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        Self { cmd_tx, output_rx }
    }
}

/// Request a PTY-backed shell on the transport and spawn its owner task.
/// Channel open, PTY and shell requests all run under the shell-open
/// deadline.
pub async fn open_shell(
    transport: &mut Handle<TransportHandler>,
    config: &BridgeConfig,
    session_id: &str,
) -> Result<ShellHandle, BridgeError> {
    let (pixel_w, pixel_h) = config.pixel_dimensions(config.cols, config.rows);
    let term = config.term.clone();
    let (cols, rows) = (config.cols, config.rows);

    let channel = with_deadline(Phase::Shell, config.shell_timeout(), async {
        let mut channel = transport.channel_open_session().await?;

        channel
            .request_pty(
                false,
                &term,
                cols as u32,
                rows as u32,
                pixel_w,
                pixel_h,
                &[],
            )
            .await
            .map_err(|e| BridgeError::ProtocolError(format!("PTY request failed: {}", e)))?;

        channel
            .request_shell(false)
            .await
            .map_err(|e| BridgeError::ProtocolError(format!("shell request failed: {}", e)))?;

        Ok(channel)
    })
    .await?;

    info!("session {}: interactive shell started", session_id);

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<SessionCommand>(1024);
    let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(1024);

    let cell = (config.cell_width_px as u32, config.cell_height_px as u32);
    let sid = session_id.to_string();
    let mut channel = channel;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Data(data)) => {
                        if let Err(e) = channel.data(&data[..]).await {
                            error!("session {}: failed to write to shell channel: {}", sid, e);
                            break;
                        }
                    }
                    Some(SessionCommand::Resize { rows, cols }) => {
                        let (px, py) = (cols as u32 * cell.0, rows as u32 * cell.1);
                        match channel.window_change(cols as u32, rows as u32, px, py).await {
                            Ok(()) => debug!("session {}: PTY resized to {}x{}", sid, cols, rows),
                            // A failed resize is not fatal to the shell.
                            Err(e) => error!("session {}: failed to resize PTY: {}", sid, e),
                        }
                    }
                    Some(SessionCommand::Close) | None => {
                        debug!("session {}: closing shell channel", sid);
                        let _ = channel.eof().await;
                        break;
                    }
                },

                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        if output_tx.send(data.to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Some(ChannelMsg::ExtendedData { data, ext }) => {
                        // ext 1 is stderr; merged into the same ordered stream.
                        if ext == 1 && output_tx.send(data.to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => {
                        info!("session {}: shell channel closed by remote", sid);
                        break;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        debug!("session {}: shell exit status {}", sid, exit_status);
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        debug!("session {}: shell exit signal {:?}", sid, signal_name);
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
        debug!("session {}: shell channel task terminated", sid);
    });

    Ok(ShellHandle { cmd_tx, output_rx })
}
