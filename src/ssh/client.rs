//! Transport dial and host-key verification

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::{HashAlg, PublicKey};
use tracing::{debug, info, warn};

use super::with_deadline;
use crate::config::{BridgeConfig, HostKeyPolicy};
use crate::error::{BridgeError, Phase};

/// russh client handler for one transport.
///
/// Host-key verification follows the injected [`HostKeyPolicy`] rather than a
/// process-wide known-hosts store; the bridge talks to machines its own panel
/// provisioned.
pub struct TransportHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl TransportHandler {
    pub fn new(host: impl Into<String>, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
        }
    }
}

impl client::Handler for TransportHandler {
    type Error = BridgeError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let presented = server_public_key.fingerprint(HashAlg::Sha256).to_string();

        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                debug!(
                    "accepting host key for {}:{} (fingerprint: {})",
                    self.host, self.port, presented
                );
                Ok(true)
            }
            HostKeyPolicy::Pinned { fingerprint } => {
                if presented == *fingerprint {
                    debug!("host key for {}:{} matches pin", self.host, self.port);
                    Ok(true)
                } else {
                    warn!(
                        "host key mismatch for {}:{}: expected {}, got {}",
                        self.host, self.port, fingerprint, presented
                    );
                    Err(BridgeError::ProtocolError(format!(
                        "host key mismatch for {}:{}",
                        self.host, self.port
                    )))
                }
            }
        }
    }
}

/// Dial the target and complete the SSH handshake, all under the connect
/// deadline.
///
/// Network-level failures (resolution, refused, unreachable) are
/// `DialFailed`; a peer that speaks something other than SSH, or a host-key
/// pin mismatch, is a `ProtocolError`.
pub async fn dial(
    host: &str,
    port: u16,
    config: &BridgeConfig,
    session_id: &str,
) -> Result<Handle<TransportHandler>, BridgeError> {
    let addr = format!("{}:{}", host, port);
    debug!("session {}: dialing {}", session_id, addr);

    let ssh_config = Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    });
    let handler = TransportHandler::new(host, port, config.host_key_policy.clone());

    let handle = with_deadline(Phase::Dial, config.connect_timeout(), async {
        let socket_addr = tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| BridgeError::DialFailed(format!("address resolution failed: {}", e)))?
            .next()
            .ok_or_else(|| BridgeError::DialFailed(format!("no address found for {}", addr)))?;

        let stream = tokio::net::TcpStream::connect(socket_addr)
            .await
            .map_err(|e| BridgeError::DialFailed(e.to_string()))?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("session {}: failed to set TCP_NODELAY: {}", session_id, e);
        }

        client::connect_stream(ssh_config, stream, handler).await
    })
    .await?;

    info!("session {}: transport established to {}", session_id, addr);
    Ok(handle)
}
