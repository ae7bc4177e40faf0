//! Live on-chain ownership checks.
//!
//! Answers "does this address currently hold a qualifying token" against a
//! single configured ERC-721 or ERC-1155 collection. Balances are read
//! fresh on every call; nothing is cached, because on-chain state can
//! change between blocks and a stale positive must not be possible.
//!
//! The failure policy is fail-closed throughout: a transport error, RPC
//! error object, revert, or malformed response is reported to callers that
//! only need a boolean as "does not hold". The underlying cause is logged
//! for operators; it never reaches end users.

pub mod abi;
pub mod evm;

use async_trait::async_trait;
use tokengate_types::redact_address;
use tracing::warn;

pub use evm::EvmOwnershipOracle;

/// Errors from chain queries.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// The collection a wallet must hold a token from.
#[derive(Debug, Clone)]
pub struct CollectionRef {
    /// Contract address, `0x`-prefixed hex.
    pub contract: String,
    pub standard: TokenStandard,
}

#[derive(Debug, Clone)]
pub enum TokenStandard {
    /// Single-token collections: `balanceOf(owner)`.
    Erc721,
    /// Multi-token collections: `balanceOfBatch(owners, ids)` over the
    /// configured id set; holding any one of them qualifies.
    Erc1155 { token_ids: Vec<u64> },
}

impl CollectionRef {
    /// Contract identity safe to echo to users: partially redacted.
    pub fn redacted(&self) -> String {
        redact_address(&self.contract)
    }
}

/// Outcome of a live ownership query.
#[derive(Debug, Clone)]
pub struct OwnershipCheck {
    /// Total qualifying balance across the queried token ids.
    pub balance: u128,
    /// Which configured token ids had a nonzero balance (empty for ERC-721).
    pub matched_token_ids: Vec<u64>,
}

impl OwnershipCheck {
    pub fn holds(&self) -> bool {
        self.balance > 0
    }
}

/// Component answering "does this address hold a qualifying asset".
#[async_trait]
pub trait OwnershipOracle: Send + Sync {
    /// Query the current balance for `address`. Errors are propagated so
    /// callers that must distinguish "zero" from "unknown" (the
    /// re-verification loop) can do so.
    async fn check(&self, address: &str) -> Result<OwnershipCheck, ChainError>;

    /// Redacted identity of the queried collection.
    fn collection(&self) -> String;

    /// Boolean form with the fail-closed policy applied: any query failure
    /// counts as "does not hold".
    async fn holds(&self, address: &str) -> bool {
        match self.check(address).await {
            Ok(check) => check.holds(),
            Err(err) => {
                warn!("ownership query failed for {}: {err}", redact_address(address));
                false
            }
        }
    }
}
