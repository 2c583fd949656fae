//! Bridge configuration
//!
//! Injected, read-only runtime settings for the terminal bridge: per-phase
//! deadlines, terminal defaults, and the host-key policy. There is no process
//! global; embedders construct one `BridgeConfig` and hand it to the
//! supervisor, which makes every knob trivially fakeable in tests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the transport verifies the remote host key.
///
/// The fleet's machines are provisioned by the same panel that runs this
/// bridge, so the default accepts whatever key the target presents. Pinning a
/// SHA-256 fingerprint turns a mismatch into a `ProtocolError` before
/// authentication starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum HostKeyPolicy {
    /// Accept any host key presented by the target.
    AcceptAny,
    /// Require the target's SHA-256 fingerprint to match exactly.
    Pinned { fingerprint: String },
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        HostKeyPolicy::AcceptAny
    }
}

/// Runtime configuration for terminal sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Deadline for TCP connect plus SSH handshake.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Deadline for each authentication round-trip with the remote host.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
    /// Deadline for channel open, PTY and shell requests.
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,
    /// Deadline for the client to answer a relayed interactive prompt.
    #[serde(default = "default_prompt_timeout")]
    pub prompt_timeout_secs: u64,
    /// TERM value requested for the PTY.
    #[serde(default = "default_term")]
    pub term: String,
    /// Initial terminal columns.
    #[serde(default = "default_cols")]
    pub cols: u16,
    /// Initial terminal rows.
    #[serde(default = "default_rows")]
    pub rows: u16,
    /// Pixel width of one terminal cell, used to derive PTY pixel dimensions.
    #[serde(default = "default_cell_width")]
    pub cell_width_px: u16,
    /// Pixel height of one terminal cell.
    #[serde(default = "default_cell_height")]
    pub cell_height_px: u16,
    /// Host-key verification policy.
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_auth_timeout() -> u64 {
    30
}

fn default_shell_timeout() -> u64 {
    15
}

fn default_prompt_timeout() -> u64 {
    60
}

fn default_term() -> String {
    "xterm-256color".to_string()
}

fn default_cols() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

fn default_cell_width() -> u16 {
    8
}

fn default_cell_height() -> u16 {
    16
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            auth_timeout_secs: default_auth_timeout(),
            shell_timeout_secs: default_shell_timeout(),
            prompt_timeout_secs: default_prompt_timeout(),
            term: default_term(),
            cols: default_cols(),
            rows: default_rows(),
            cell_width_px: default_cell_width(),
            cell_height_px: default_cell_height(),
            host_key_policy: HostKeyPolicy::default(),
        }
    }
}

impl BridgeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    /// Pixel dimensions for a PTY of `cols` x `rows` cells.
    pub fn pixel_dimensions(&self, cols: u16, rows: u16) -> (u32, u32) {
        (
            cols as u32 * self.cell_width_px as u32,
            rows as u32 * self.cell_height_px as u32,
        )
    }
}
