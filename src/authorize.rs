//! Session authorization and credential resolution
//!
//! The first two phases of every session: validate the request parameters,
//! check that the principal may open a terminal on the target, and resolve the
//! connection address plus authentication secret. Read-only - no dial happens
//! here, and a rejected request never touches the network.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::inventory::{AuthSecret, CredentialStore, Inventory, PrincipalId, TargetId};

/// Parameters carried by the duplex connection when a client opens a
/// terminal. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRequest {
    pub target_id: TargetId,
    pub principal_id: PrincipalId,
}

impl SessionRequest {
    /// Validate raw ids. Both must be positive.
    pub fn new(target_id: TargetId, principal_id: PrincipalId) -> Result<Self, BridgeError> {
        if target_id == 0 {
            return Err(BridgeError::InvalidRequest("target id must be positive".into()));
        }
        if principal_id == 0 {
            return Err(BridgeError::InvalidRequest(
                "principal id must be positive".into(),
            ));
        }
        Ok(Self {
            target_id,
            principal_id,
        })
    }

    /// Parse the query-string form carried on the duplex connection.
    /// Absence or malformed values are an `InvalidRequest`.
    pub fn from_params(
        target: Option<&str>,
        principal: Option<&str>,
    ) -> Result<Self, BridgeError> {
        let target_id = parse_id(target, "target")?;
        let principal_id = parse_id(principal, "principal")?;
        Self::new(target_id, principal_id)
    }
}

fn parse_id(raw: Option<&str>, name: &str) -> Result<u64, BridgeError> {
    let raw = raw
        .ok_or_else(|| BridgeError::InvalidRequest(format!("missing {} id", name)))?
        .trim();
    raw.parse::<u64>()
        .map_err(|_| BridgeError::InvalidRequest(format!("malformed {} id: {:?}", name, raw)))
}

/// Everything needed to open the transport: where to dial and what to
/// authenticate with. Resolved once per session, read-only afterwards.
#[derive(Debug, Clone)]
pub struct TargetCredential {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// `None` when the credential store has nothing on file.
    pub secret: Option<AuthSecret>,
}

impl TargetCredential {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Gatekeeper for terminal sessions.
pub struct Authorizer {
    inventory: Arc<dyn Inventory>,
    credentials: Arc<dyn CredentialStore>,
}

impl Authorizer {
    pub fn new(inventory: Arc<dyn Inventory>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            inventory,
            credentials,
        }
    }

    /// Authorize a request and resolve the target's credential.
    ///
    /// Ownership is checked against the inventory; a target owned by another
    /// principal is `Forbidden` unless the requester holds elevated
    /// privilege. A missing secret is not an error here - the caller decides
    /// whether authentication is still possible.
    pub async fn authorize(
        &self,
        request: &SessionRequest,
    ) -> Result<TargetCredential, BridgeError> {
        let record = self
            .inventory
            .target(request.target_id)
            .await
            .ok_or(BridgeError::NotFound(request.target_id))?;

        if record.owner != request.principal_id
            && !self.inventory.is_elevated(request.principal_id).await
        {
            warn!(
                "principal {} denied terminal on target {} (owner {})",
                request.principal_id, request.target_id, record.owner
            );
            return Err(BridgeError::Forbidden {
                principal: request.principal_id,
                target: request.target_id,
            });
        }

        let secret = self
            .credentials
            .secret(request.target_id)
            .await
            .and_then(AuthSecret::new);

        match &secret {
            Some(secret) => debug!(
                "resolved credential for target {} ({} chars)",
                request.target_id,
                secret.char_count()
            ),
            None => debug!("no credential on file for target {}", request.target_id),
        }

        Ok(TargetCredential {
            host: record.host,
            port: record.port,
            username: record.username,
            secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::inventory::TargetRecord;

    struct FakeInventory {
        targets: HashMap<TargetId, TargetRecord>,
        elevated: Vec<PrincipalId>,
    }

    #[async_trait]
    impl Inventory for FakeInventory {
        async fn target(&self, target: TargetId) -> Option<TargetRecord> {
            self.targets.get(&target).cloned()
        }

        async fn is_elevated(&self, principal: PrincipalId) -> bool {
            self.elevated.contains(&principal)
        }
    }

    struct FakeCredentials {
        secrets: HashMap<TargetId, String>,
    }

    #[async_trait]
    impl CredentialStore for FakeCredentials {
        async fn secret(&self, target: TargetId) -> Option<String> {
            self.secrets.get(&target).cloned()
        }
    }

    fn authorizer(
        targets: Vec<(TargetId, TargetRecord)>,
        elevated: Vec<PrincipalId>,
        secrets: Vec<(TargetId, &str)>,
    ) -> Authorizer {
        Authorizer::new(
            Arc::new(FakeInventory {
                targets: targets.into_iter().collect(),
                elevated,
            }),
            Arc::new(FakeCredentials {
                secrets: secrets
                    .into_iter()
                    .map(|(id, s)| (id, s.to_string()))
                    .collect(),
            }),
        )
    }

    #[test]
    fn request_ids_must_be_positive_and_well_formed() {
        assert!(matches!(
            SessionRequest::new(0, 1),
            Err(BridgeError::InvalidRequest(_))
        ));
        assert!(matches!(
            SessionRequest::from_params(None, Some("1")),
            Err(BridgeError::InvalidRequest(_))
        ));
        assert!(matches!(
            SessionRequest::from_params(Some("abc"), Some("1")),
            Err(BridgeError::InvalidRequest(_))
        ));
        let ok = SessionRequest::from_params(Some(" 42 "), Some("7")).unwrap();
        assert_eq!(ok.target_id, 42);
        assert_eq!(ok.principal_id, 7);
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let auth = authorizer(vec![], vec![], vec![]);
        let request = SessionRequest::new(5, 1).unwrap();
        assert!(matches!(
            auth.authorize(&request).await,
            Err(BridgeError::NotFound(5))
        ));
    }

    #[tokio::test]
    async fn foreign_target_is_forbidden_without_elevation() {
        let auth = authorizer(
            vec![(5, TargetRecord::new(99, "192.0.2.10"))],
            vec![],
            vec![(5, "pw")],
        );
        let request = SessionRequest::new(5, 1).unwrap();
        assert!(matches!(
            auth.authorize(&request).await,
            Err(BridgeError::Forbidden {
                principal: 1,
                target: 5
            })
        ));
    }

    #[tokio::test]
    async fn elevated_principal_may_reach_foreign_target() {
        let auth = authorizer(
            vec![(5, TargetRecord::new(99, "192.0.2.10"))],
            vec![1],
            vec![(5, "pw")],
        );
        let request = SessionRequest::new(5, 1).unwrap();
        let cred = auth.authorize(&request).await.unwrap();
        assert_eq!(cred.host, "192.0.2.10");
        assert_eq!(cred.secret.unwrap().expose(), "pw");
    }

    #[tokio::test]
    async fn owner_gets_trimmed_secret() {
        let auth = authorizer(
            vec![(5, TargetRecord::new(1, "192.0.2.10"))],
            vec![],
            vec![(5, "  hunter2 ")],
        );
        let request = SessionRequest::new(5, 1).unwrap();
        let cred = auth.authorize(&request).await.unwrap();
        assert_eq!(cred.secret.unwrap().expose(), "hunter2");
    }

    #[tokio::test]
    async fn missing_or_blank_secret_resolves_to_none() {
        let auth = authorizer(
            vec![
                (5, TargetRecord::new(1, "192.0.2.10")),
                (6, TargetRecord::new(1, "192.0.2.11")),
            ],
            vec![],
            vec![(6, "   ")],
        );
        let no_entry = auth
            .authorize(&SessionRequest::new(5, 1).unwrap())
            .await
            .unwrap();
        assert!(no_entry.secret.is_none());

        let blank = auth
            .authorize(&SessionRequest::new(6, 1).unwrap())
            .await
            .unwrap();
        assert!(blank.secret.is_none());
    }
}
