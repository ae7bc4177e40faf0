//! Shared types for the tokengate service.
//!
//! Identifiers, wallet address handling, the verification error taxonomy,
//! and the constants that bind the verification protocol together.

pub mod address;
pub mod error;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use address::{addresses_match, normalize_address, redact_address, AddressError, WalletAddress};
pub use error::VerificationError;

/// The fixed message every wallet signs to prove ownership.
///
/// This is a constant rather than per-request content so that a user can
/// never be tricked into signing attacker-chosen data. Replay of the same
/// signature is bounded by single-use challenge tokens, not by signature
/// uniqueness.
pub const VERIFICATION_MESSAGE: &str = "Tokengate wallet verification\n\n\
Sign this message to prove you control this wallet. \
This signature does not trigger a transaction and costs no gas.";

/// How long an issued challenge token stays consumable.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(600);

/// How often the re-verification loop re-checks current role holders.
pub const DEFAULT_REVERIFY_INTERVAL: Duration = Duration::from_secs(3600);

/// Platform identity that requested verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

/// Platform community in which the role is granted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(pub String);

/// Role handed out on successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CommunityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for CommunityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
