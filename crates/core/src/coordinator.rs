//! End-to-end verification flow.

use std::sync::Arc;

use serde::Serialize;
use tokengate_chain::OwnershipOracle;
use tokengate_crypto::verify_personal_signature;
use tokengate_gateway::{GatewayError, RoleGateway};
use tokengate_ledger::ChallengeStore;
use tokengate_types::{
    normalize_address, redact_address, CommunityId, IdentityId, RoleId, VerificationError,
    VERIFICATION_MESSAGE,
};
use tracing::{info, warn};

/// Successful verification outcome. Carries only the redacted wallet form;
/// the full address is never echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantConfirmation {
    pub identity_id: IdentityId,
    pub community_id: CommunityId,
    pub role_id: RoleId,
    pub wallet: String,
}

/// Result of the "check wallet" command surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipReport {
    pub holds: bool,
    pub matched_token_ids: Vec<u64>,
    /// Partially redacted identity of the queried contract.
    pub collection: String,
}

/// Orchestrates challenge issuance and signed submissions.
///
/// Collaborators are injected so tests can substitute fakes for the
/// gateway and oracle without a live network.
pub struct VerificationCoordinator {
    store: Arc<dyn ChallengeStore>,
    oracle: Arc<dyn OwnershipOracle>,
    gateway: Arc<dyn RoleGateway>,
    role: RoleId,
}

impl VerificationCoordinator {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        oracle: Arc<dyn OwnershipOracle>,
        gateway: Arc<dyn RoleGateway>,
        role: RoleId,
    ) -> Self {
        Self {
            store,
            oracle,
            gateway,
            role,
        }
    }

    pub fn role(&self) -> &RoleId {
        &self.role
    }

    /// Mint a challenge token for an identity. The caller turns it into a
    /// private verification link.
    pub fn begin_verification(&self, identity: IdentityId, community: CommunityId) -> String {
        let token = self.store.issue(identity.clone(), community.clone());
        info!(
            "issued verification challenge for {identity} in {community} ({} pending)",
            self.store.pending()
        );
        token
    }

    /// Consume a signed submission.
    ///
    /// The token is consumed before anything else is checked, and nothing
    /// restores a consumed token: a failed attempt always requires a fresh
    /// challenge, which bounds the retry rate per issuance.
    pub async fn submit(
        &self,
        token: &str,
        wallet_address: &str,
        signature: &str,
    ) -> Result<GrantConfirmation, VerificationError> {
        let challenge = self
            .store
            .consume(token)
            .ok_or(VerificationError::ExpiredOrInvalidToken)?;

        let wallet = normalize_address(wallet_address).map_err(|err| {
            warn!(
                "submission for {} carried an unparseable wallet address: {err}",
                challenge.identity_id
            );
            VerificationError::MalformedRequest
        })?;

        if !verify_personal_signature(VERIFICATION_MESSAGE, signature, &wallet) {
            info!(
                "signature mismatch for {} (wallet {})",
                challenge.identity_id,
                redact_address(&wallet)
            );
            return Err(VerificationError::SignatureMismatch);
        }

        if !self.oracle.holds(&wallet).await {
            info!(
                "wallet {} holds no qualifying token in {}",
                redact_address(&wallet),
                self.oracle.collection()
            );
            return Err(VerificationError::NoQualifyingAsset);
        }

        self.gateway
            .grant(&challenge.community_id, &challenge.identity_id, &self.role)
            .await
            .map_err(|err| match err {
                GatewayError::RoleNotFound(role) => {
                    warn!(
                        "role {role} is not configured in {}",
                        challenge.community_id
                    );
                    VerificationError::RoleNotConfigured
                }
                other => {
                    warn!(
                        "role grant failed for {}: {other}",
                        challenge.identity_id
                    );
                    VerificationError::UpstreamUnavailable
                }
            })?;

        info!(
            "verified {} in {} with wallet {}",
            challenge.identity_id,
            challenge.community_id,
            redact_address(&wallet)
        );

        Ok(GrantConfirmation {
            identity_id: challenge.identity_id,
            community_id: challenge.community_id,
            role_id: self.role.clone(),
            wallet: redact_address(&wallet),
        })
    }

    /// Ownership lookup for the "check wallet" command. Fail-closed like
    /// every other ownership read; the cause goes to the log only.
    pub async fn check_wallet(&self, address: &str) -> Result<OwnershipReport, VerificationError> {
        let wallet =
            normalize_address(address).map_err(|_| VerificationError::MalformedRequest)?;

        match self.oracle.check(&wallet).await {
            Ok(check) => Ok(OwnershipReport {
                holds: check.holds(),
                matched_token_ids: check.matched_token_ids,
                collection: self.oracle.collection(),
            }),
            Err(err) => {
                warn!(
                    "wallet check failed for {}: {err}",
                    redact_address(&wallet)
                );
                Ok(OwnershipReport {
                    holds: false,
                    matched_token_ids: Vec::new(),
                    collection: self.oracle.collection(),
                })
            }
        }
    }
}
