//! Session lifecycle
//!
//! One independent task per terminal session: a state machine
//! (`Connecting → Authenticating → Ready → Closing → Closed`), the supervisor
//! that drives it, and a registry for concurrent sessions with cancellation.

mod registry;
mod state;
mod supervisor;

pub use registry::{RegistryError, SessionRegistry};
pub use state::{SessionState, SessionStatus};
pub use supervisor::SessionSupervisor;
