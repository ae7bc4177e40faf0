//! Platform role management boundary.
//!
//! The chat-platform client itself lives outside this workspace; the core
//! only consumes the narrow [`RoleGateway`] capability defined here. The
//! in-memory stubs back dev mode and tests, in the same spirit as other
//! pluggable stub services in this codebase.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokengate_types::{CommunityId, IdentityId, RoleId};
use tracing::info;

/// Errors from role mutations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("role {0} does not exist in the community")]
    RoleNotFound(String),
    #[error("community {0} not found")]
    CommunityNotFound(String),
    #[error("platform error: {0}")]
    Upstream(String),
}

/// Grants and revokes a role for platform identities.
#[async_trait]
pub trait RoleGateway: Send + Sync {
    async fn grant(
        &self,
        community: &CommunityId,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), GatewayError>;

    async fn revoke(
        &self,
        community: &CommunityId,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), GatewayError>;

    /// Current members holding `role`, read live from the platform.
    async fn role_holders(
        &self,
        community: &CommunityId,
        role: &RoleId,
    ) -> Result<Vec<IdentityId>, GatewayError>;
}

/// Persisted wallet↔identity mapping used by re-verification.
///
/// The minimal deployment has no such store; the scheduler treats a missing
/// mapping as "cannot re-verify this member".
pub trait WalletDirectory: Send + Sync {
    fn wallet_for(&self, identity: &IdentityId) -> Option<String>;
}

/// In-memory [`RoleGateway`] for dev mode and tests.
pub struct StubRoleGateway {
    known_roles: RwLock<HashSet<(CommunityId, RoleId)>>,
    memberships: RwLock<HashMap<(CommunityId, RoleId), Vec<IdentityId>>>,
}

impl StubRoleGateway {
    pub fn new() -> Self {
        Self {
            known_roles: RwLock::new(HashSet::new()),
            memberships: RwLock::new(HashMap::new()),
        }
    }

    /// Register a role so grants against it succeed.
    pub fn define_role(&self, community: CommunityId, role: RoleId) {
        self.known_roles.write().insert((community, role));
    }

    pub fn has_role(&self, community: &CommunityId, identity: &IdentityId, role: &RoleId) -> bool {
        self.memberships
            .read()
            .get(&(community.clone(), role.clone()))
            .map(|members| members.contains(identity))
            .unwrap_or(false)
    }
}

impl Default for StubRoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleGateway for StubRoleGateway {
    async fn grant(
        &self,
        community: &CommunityId,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), GatewayError> {
        if !self
            .known_roles
            .read()
            .contains(&(community.clone(), role.clone()))
        {
            return Err(GatewayError::RoleNotFound(role.to_string()));
        }

        let mut memberships = self.memberships.write();
        let members = memberships
            .entry((community.clone(), role.clone()))
            .or_default();
        if !members.contains(identity) {
            members.push(identity.clone());
        }
        info!("granted role {role} to {identity} in {community}");
        Ok(())
    }

    async fn revoke(
        &self,
        community: &CommunityId,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), GatewayError> {
        if !self
            .known_roles
            .read()
            .contains(&(community.clone(), role.clone()))
        {
            return Err(GatewayError::RoleNotFound(role.to_string()));
        }

        let mut memberships = self.memberships.write();
        if let Some(members) = memberships.get_mut(&(community.clone(), role.clone())) {
            members.retain(|member| member != identity);
        }
        info!("revoked role {role} from {identity} in {community}");
        Ok(())
    }

    async fn role_holders(
        &self,
        community: &CommunityId,
        role: &RoleId,
    ) -> Result<Vec<IdentityId>, GatewayError> {
        Ok(self
            .memberships
            .read()
            .get(&(community.clone(), role.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory [`WalletDirectory`] for dev mode and tests.
pub struct StubWalletDirectory {
    wallets: RwLock<HashMap<IdentityId, String>>,
}

impl StubWalletDirectory {
    pub fn new() -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, identity: IdentityId, wallet: String) {
        self.wallets.write().insert(identity, wallet);
    }
}

impl Default for StubWalletDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletDirectory for StubWalletDirectory {
    fn wallet_for(&self, identity: &IdentityId) -> Option<String> {
        self.wallets.read().get(identity).cloned()
    }
}
