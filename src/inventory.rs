//! External collaborators
//!
//! The bridge core only ever *reads* from the rest of the system: an
//! inventory service that knows which principal owns which target, and a
//! credential store holding one live authentication secret per target. Both
//! are consumed behind traits so sessions can be driven entirely by fakes in
//! tests. Many sessions read these concurrently; implementations must not
//! require external locking.

use async_trait::async_trait;
use zeroize::Zeroize;

/// Identifier of a remote machine in the panel's inventory.
pub type TargetId = u64;

/// Identifier of the requesting principal (account).
pub type PrincipalId = u64;

/// Inventory record for a target machine.
#[derive(Debug, Clone)]
pub struct TargetRecord {
    /// Owning principal.
    pub owner: PrincipalId,
    /// Hostname or IP address, without port.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login name on the target.
    pub username: String,
}

impl TargetRecord {
    pub fn new(owner: PrincipalId, host: impl Into<String>) -> Self {
        Self {
            owner,
            host: host.into(),
            port: 22,
            username: "root".to_string(),
        }
    }

    /// `host:port` form used for dialing and diagnostics.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A live authentication secret.
///
/// The wrapped value is used directly as authentication material (it is never
/// a hashed digest). Construction trims surrounding whitespace and leaves the
/// character content untouched. The secret never appears in `Debug` output
/// and is wiped from memory on drop; diagnostics may state the character
/// count at most.
#[derive(Clone)]
pub struct AuthSecret(String);

impl AuthSecret {
    /// Normalize and wrap a raw secret. Returns `None` when nothing remains
    /// after trimming - an all-whitespace entry counts as no credential.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The secret itself, for handing to the SSH authentication call.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Character count, the only secret-derived value allowed in logs.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl std::fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthSecret(<{} chars>)", self.char_count())
    }
}

impl Drop for AuthSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Inventory lookup collaborator.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Look up a target; `None` means the target does not exist.
    async fn target(&self, target: TargetId) -> Option<TargetRecord>;

    /// Whether the principal holds elevated privilege (may open terminals on
    /// targets it does not own).
    async fn is_elevated(&self, principal: PrincipalId) -> bool;
}

/// Credential store collaborator.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The stored secret for a target; `None` means nothing is on file.
    async fn secret(&self, target: TargetId) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_trimmed_but_otherwise_untouched() {
        let secret = AuthSecret::new("  hunter2\t\n").unwrap();
        assert_eq!(secret.expose(), "hunter2");

        let inner_space = AuthSecret::new(" pa ss ").unwrap();
        assert_eq!(inner_space.expose(), "pa ss");
    }

    #[test]
    fn whitespace_only_secret_counts_as_absent() {
        assert!(AuthSecret::new("   \n\t").is_none());
        assert!(AuthSecret::new("").is_none());
    }

    #[test]
    fn debug_output_never_contains_the_secret() {
        let secret = AuthSecret::new("tops3cret").unwrap();
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("tops3cret"));
        assert!(rendered.contains("9 chars"));
    }

    #[test]
    fn address_joins_host_and_port() {
        let mut record = TargetRecord::new(1, "198.51.100.7");
        record.port = 2222;
        assert_eq!(record.address(), "198.51.100.7:2222");
    }
}
