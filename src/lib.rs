//! TermBridge - interactive remote-terminal bridge
//!
//! Relays keystrokes and output between a persistent duplex client connection
//! (a browser over WebSocket, typically) and an SSH shell session opened on
//! the client's behalf. Each terminal session is authorized against the
//! panel's inventory, dialed and authenticated with the target's stored
//! credential (direct password first, keyboard-interactive fallback), and
//! then bridged byte-for-byte until either side hangs up.
//!
//! The outer HTTP/WebSocket-serving layer, machine provisioning, and
//! credential storage policy are out of scope; they appear here only as the
//! [`inventory::Inventory`] / [`inventory::CredentialStore`] collaborator
//! traits and the [`channel::ClientChannel`] duplex abstraction.

pub mod authorize;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod session;
pub mod ssh;
pub mod ws;

pub use authorize::{Authorizer, SessionRequest, TargetCredential};
pub use bridge::BridgeEnd;
pub use channel::{AuthPrompt, ClientChannel, ClientEvent, ServerEvent, StatusPhase};
pub use config::{BridgeConfig, HostKeyPolicy};
pub use error::{BridgeError, Phase};
pub use inventory::{
    AuthSecret, CredentialStore, Inventory, PrincipalId, TargetId, TargetRecord,
};
pub use session::{RegistryError, SessionRegistry, SessionState, SessionStatus, SessionSupervisor};
pub use ws::WsChannel;
