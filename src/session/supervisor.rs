//! Session supervisor
//!
//! Owns one terminal session end-to-end: authorize, dial, negotiate
//! authentication, run the stream bridge, and tear everything down on the
//! first terminal event from either side. Resources are released in a fixed
//! order - shell channel, then transport, then the duplex client - and the
//! transport is disconnected exactly once on every exit path, including
//! cancellation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authorize::{Authorizer, SessionRequest, TargetCredential};
use crate::bridge::{run_bridge, BridgeEnd};
use crate::channel::{ClientChannel, ServerEvent, StatusPhase};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::inventory::{AuthSecret, CredentialStore, Inventory};
use super::state::{SessionState, SessionStatus};
use crate::ssh::{dial, negotiate, open_shell, SessionCommand, TransportHandler};

/// Drives terminal sessions. One supervisor serves many concurrent sessions;
/// it holds only read-only collaborators and configuration.
pub struct SessionSupervisor {
    config: Arc<BridgeConfig>,
    authorizer: Authorizer,
}

impl SessionSupervisor {
    pub fn new(
        config: Arc<BridgeConfig>,
        inventory: Arc<dyn Inventory>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            authorizer: Authorizer::new(inventory, credentials),
        }
    }

    /// Run one session to completion.
    ///
    /// Every outcome - normal close from either side, categorized failure, or
    /// cancellation - ends with the client channel closed and the session
    /// state at `Closed`. Failures (other than the client itself going away)
    /// are reported to the client as a single categorized `error` event.
    pub async fn run<C: ClientChannel>(
        &self,
        request: SessionRequest,
        mut client: C,
        state: Arc<SessionState>,
        cancel: CancellationToken,
    ) -> Result<BridgeEnd, BridgeError> {
        let session_id = Uuid::new_v4().to_string();
        info!(
            "session {}: principal {} opening terminal on target {}",
            session_id, request.principal_id, request.target_id
        );

        let _ = client
            .send(ServerEvent::Status {
                phase: StatusPhase::Connecting,
                message: "opening terminal session".into(),
            })
            .await;

        let result = self
            .drive(&mut client, &request, &state, &cancel, &session_id)
            .await;

        state.begin_close();
        match &result {
            Ok(end) => info!("session {}: ended ({:?})", session_id, end),
            Err(e) if e.is_client_disconnect() => {
                info!("session {}: client went away, tearing down", session_id)
            }
            Err(e) => {
                warn!("session {}: failed: {}", session_id, e);
                let _ = client
                    .send(ServerEvent::Error {
                        message: e.client_message(),
                    })
                    .await;
            }
        }
        client.close().await;
        state.finish_close();

        result
    }

    /// The three phases up to and including the bridge. Returns with the
    /// transport already disconnected.
    async fn drive<C: ClientChannel>(
        &self,
        client: &mut C,
        request: &SessionRequest,
        state: &SessionState,
        cancel: &CancellationToken,
        session_id: &str,
    ) -> Result<BridgeEnd, BridgeError> {
        let credential = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::ClientDisconnected),
            result = self.authorizer.authorize(request) => result,
        }?;

        // Password is the only method the fleet offers; with nothing on file
        // the handshake is doomed, so fail before touching the network.
        let secret = match &credential.secret {
            Some(secret) => secret.clone(),
            None => return Err(BridgeError::NoCredential(request.target_id)),
        };

        let mut transport = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::ClientDisconnected),
            result = dial(&credential.host, credential.port, &self.config, session_id) => result,
        }?;

        let _ = client
            .send(ServerEvent::Status {
                phase: StatusPhase::Connected,
                message: "secure channel established".into(),
            })
            .await;
        state.advance(SessionStatus::Authenticating);

        let result = self
            .interactive(
                client,
                &mut transport,
                &credential,
                secret,
                state,
                cancel,
                session_id,
            )
            .await;

        // The single transport close for this session, on every path that
        // dialed successfully.
        debug!("session {}: disconnecting transport", session_id);
        let _ = transport
            .disconnect(russh::Disconnect::ByApplication, "session closed", "en")
            .await;

        result
    }

    /// Authentication, shell open, and the bridge, on a live transport.
    #[allow(clippy::too_many_arguments)]
    async fn interactive<C: ClientChannel>(
        &self,
        client: &mut C,
        transport: &mut russh::client::Handle<TransportHandler>,
        credential: &TargetCredential,
        secret: AuthSecret,
        state: &SessionState,
        cancel: &CancellationToken,
        session_id: &str,
    ) -> Result<BridgeEnd, BridgeError> {
        tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::ClientDisconnected),
            result = negotiate(
                transport,
                &credential.username,
                Some(&secret),
                client,
                &self.config,
                session_id,
            ) => result,
        }?;

        let mut shell = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::ClientDisconnected),
            result = open_shell(transport, &self.config, session_id) => result,
        }?;

        state.advance(SessionStatus::Ready);

        let result = match client.send(ServerEvent::Ready).await {
            Err(e) => Err(e),
            Ok(()) => {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => None,
                    result = run_bridge(client, &mut shell, session_id) => Some(result),
                };
                match outcome {
                    None => Err(BridgeError::ClientDisconnected),
                    Some(result) => result,
                }
            }
        };

        // Release the shell channel ahead of the transport; a repeat close is
        // a no-op on the channel task's side.
        let _ = shell.cmd_tx.send(SessionCommand::Close).await;

        result
    }
}
