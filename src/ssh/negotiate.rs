//! Authentication negotiation
//!
//! Drives authentication on an already-dialed transport: direct password
//! first, with keyboard-interactive as the secondary method of the same
//! handshake. Interactive rounds whose prompts look like password prompts are
//! answered from the stored secret; anything else (2FA codes, arbitrary
//! challenges) is relayed to the client over the duplex channel and the round
//! waits for a human answer.
//!
//! A method is never retried within a session - if the remote rejects
//! everything we offered, the session ends with `AuthFailed` and a retry is a
//! new session.

use russh::client::{Handle, KeyboardInteractiveAuthResponse};
use tracing::{debug, info, warn};

use super::client::TransportHandler;
use super::prompt::is_password_prompt;
use super::with_deadline;
use crate::channel::{AuthPrompt, ClientChannel, ClientEvent, ServerEvent, StatusPhase};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Phase};
use crate::inventory::AuthSecret;

/// Negotiate authentication, then leave the transport ready for a shell
/// channel. Each round-trip with the remote host runs under the auth
/// deadline; waiting on the client for prompt answers runs under the longer
/// prompt deadline.
pub async fn negotiate<C: ClientChannel>(
    transport: &mut Handle<TransportHandler>,
    username: &str,
    secret: Option<&AuthSecret>,
    client: &mut C,
    config: &BridgeConfig,
    session_id: &str,
) -> Result<(), BridgeError> {
    if let Some(secret) = secret {
        debug!(
            "session {}: attempting direct password authentication for {}",
            session_id, username
        );
        let result = with_deadline(Phase::Auth, config.auth_timeout(), async {
            transport
                .authenticate_password(username, secret.expose())
                .await
                .map_err(BridgeError::from)
        })
        .await?;

        if result.success() {
            info!("session {}: password authentication accepted", session_id);
            return Ok(());
        }
        debug!(
            "session {}: direct password rejected, falling back to keyboard-interactive",
            session_id
        );
    } else {
        debug!(
            "session {}: no stored secret, starting keyboard-interactive",
            session_id
        );
    }

    let mut response = with_deadline(Phase::Auth, config.auth_timeout(), async {
        transport
            .authenticate_keyboard_interactive_start(username, None::<String>)
            .await
            .map_err(BridgeError::from)
    })
    .await?;

    // The secret is offered to at most one password-style round; a host that
    // re-issues one is rejecting the credential.
    let mut secret_offered = false;

    loop {
        match response {
            KeyboardInteractiveAuthResponse::Success => {
                info!(
                    "session {}: keyboard-interactive authentication accepted",
                    session_id
                );
                return Ok(());
            }
            KeyboardInteractiveAuthResponse::Failure { .. } => {
                warn!("session {}: remote host rejected all offered authentication methods", session_id);
                return Err(BridgeError::AuthFailed(
                    "all offered authentication methods were rejected".into(),
                ));
            }
            KeyboardInteractiveAuthResponse::InfoRequest {
                name,
                instructions,
                prompts,
            } => {
                debug!(
                    "session {}: interactive round with {} prompt(s) (name: {:?})",
                    session_id,
                    prompts.len(),
                    name
                );
                if !instructions.is_empty() {
                    debug!("session {}: round instructions: {}", session_id, instructions);
                }

                let answers = if prompts.is_empty() {
                    // Zero-prompt round: answer with an empty set and let the
                    // handshake continue.
                    Vec::new()
                } else {
                    let password_round = prompts
                        .iter()
                        .any(|p| is_password_prompt(&p.prompt, p.echo));

                    match (password_round, secret) {
                        (true, Some(secret)) if !secret_offered => {
                            secret_offered = true;
                            info!(
                                "session {}: answering password-style prompt round",
                                session_id
                            );
                            prompts
                                .iter()
                                .map(|p| {
                                    if is_password_prompt(&p.prompt, p.echo) {
                                        secret.expose().to_string()
                                    } else {
                                        String::new()
                                    }
                                })
                                .collect()
                        }
                        (true, Some(_)) => {
                            warn!(
                                "session {}: host re-issued a password round; stored credential not accepted",
                                session_id
                            );
                            return Err(BridgeError::AuthFailed(
                                "stored credential was not accepted".into(),
                            ));
                        }
                        _ => {
                            let relayed: Vec<AuthPrompt> = prompts
                                .iter()
                                .map(|p| AuthPrompt {
                                    prompt: p.prompt.clone(),
                                    echo: p.echo,
                                })
                                .collect();
                            let mut answers =
                                relay_prompts(client, relayed, config, session_id).await?;
                            // The host expects exactly one answer per prompt.
                            answers.resize(prompts.len(), String::new());
                            answers
                        }
                    }
                };

                response = with_deadline(Phase::Auth, config.auth_timeout(), async {
                    transport
                        .authenticate_keyboard_interactive_respond(answers)
                        .await
                        .map_err(BridgeError::from)
                })
                .await?;
            }
        }
    }
}

/// Surface a round of prompts to the client and wait for its answers.
async fn relay_prompts<C: ClientChannel>(
    client: &mut C,
    prompts: Vec<AuthPrompt>,
    config: &BridgeConfig,
    session_id: &str,
) -> Result<Vec<String>, BridgeError> {
    client
        .send(ServerEvent::Status {
            phase: StatusPhase::AuthInProgress,
            message: "remote host requests additional authentication".into(),
        })
        .await?;
    client.send(ServerEvent::AuthPrompt { prompts }).await?;

    with_deadline(Phase::Prompt, config.prompt_timeout(), async {
        loop {
            match client.recv().await {
                Some(ClientEvent::AuthResponse { answers }) => {
                    debug!(
                        "session {}: received {} prompt answer(s) from client",
                        session_id,
                        answers.len()
                    );
                    return Ok(answers);
                }
                Some(other) => {
                    debug!(
                        "session {}: ignoring {:?} while awaiting prompt answers",
                        session_id, other
                    );
                }
                None => return Err(BridgeError::ClientDisconnected),
            }
        }
    })
    .await
}
