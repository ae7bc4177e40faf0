//! Verification error taxonomy.
//!
//! Every failure a verification attempt can surface to a caller. The
//! `Display` text is user-readable by contract: no upstream error bodies,
//! no internal detail. Operators get the underlying causes through logs.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Token was never issued, already consumed, or past its TTL. The three
    /// cases are deliberately indistinguishable to the caller.
    #[error("verification link is invalid or has expired; request a new one")]
    ExpiredOrInvalidToken,

    /// Signature did not recover to the claimed wallet address. The token is
    /// already consumed at this point, so a retry needs a fresh challenge.
    #[error("signature does not match the provided wallet address")]
    SignatureMismatch,

    /// The wallet holds no qualifying token in the configured collection.
    #[error("wallet does not hold a qualifying token")]
    NoQualifyingAsset,

    /// The configured role does not exist in the target community.
    #[error("verification succeeded but the role is not configured; contact an administrator")]
    RoleNotConfigured,

    /// A chain or platform call failed or timed out.
    #[error("an upstream service is unavailable; try again later")]
    UpstreamUnavailable,

    /// The submission payload was missing fields or syntactically invalid.
    #[error("malformed verification request")]
    MalformedRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_no_internal_detail() {
        for err in [
            VerificationError::ExpiredOrInvalidToken,
            VerificationError::SignatureMismatch,
            VerificationError::NoQualifyingAsset,
            VerificationError::RoleNotConfigured,
            VerificationError::UpstreamUnavailable,
            VerificationError::MalformedRequest,
        ] {
            let text = err.to_string();
            assert!(!text.is_empty());
            assert!(!text.contains("0x"));
            assert!(!text.to_lowercase().contains("panic"));
        }
    }
}
