//! SSH transport - dial, authentication negotiation, and the PTY shell
//! channel, built on russh.

mod client;
mod negotiate;
pub mod prompt;
mod shell;

pub use client::{dial, TransportHandler};
pub use negotiate::negotiate;
pub use shell::{open_shell, SessionCommand, ShellHandle};

use std::future::Future;
use std::time::Duration;

use crate::error::{BridgeError, Phase};

/// Run a fallible future under a phase deadline. Expiry is a `Timeout` for
/// that phase, distinct from whatever error the future itself would produce.
pub(crate) async fn with_deadline<T, F>(
    phase: Phase,
    limit: Duration,
    fut: F,
) -> Result<T, BridgeError>
where
    F: Future<Output = Result<T, BridgeError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Timeout(phase)),
    }
}
