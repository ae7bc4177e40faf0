//! JSON-RPC backed [`OwnershipOracle`] for EVM chains.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::abi;
use crate::{ChainError, CollectionRef, OwnershipCheck, OwnershipOracle, TokenStandard};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Reads balances with `eth_call` against a configured RPC endpoint.
pub struct EvmOwnershipOracle {
    client: Client,
    endpoint: Url,
    collection: CollectionRef,
}

impl EvmOwnershipOracle {
    pub fn new(endpoint: Url, collection: CollectionRef) -> Result<Self, ChainError> {
        Self::with_timeout(endpoint, collection, DEFAULT_CALL_TIMEOUT)
    }

    /// Build with an explicit upstream timeout so one stalled call cannot
    /// block submissions or the re-verification loop indefinitely.
    pub fn with_timeout(
        endpoint: Url,
        collection: CollectionRef,
        timeout: Duration,
    ) -> Result<Self, ChainError> {
        let timeout = if timeout.is_zero() {
            DEFAULT_CALL_TIMEOUT
        } else {
            timeout
        };
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            collection,
        })
    }

    async fn eth_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                {
                    "to": self.collection.contract,
                    "data": format!("0x{}", hex::encode(calldata)),
                },
                "latest"
            ],
        });

        let response: RpcResponse = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| ChainError::MalformedResponse("missing result field".into()))?;
        abi::decode_hex_blob(&result)
    }
}

#[async_trait]
impl OwnershipOracle for EvmOwnershipOracle {
    async fn check(&self, address: &str) -> Result<OwnershipCheck, ChainError> {
        match &self.collection.standard {
            TokenStandard::Erc721 => {
                let calldata = abi::encode_balance_of(address)?;
                let return_data = self.eth_call(calldata).await?;
                let balance = abi::decode_balance(&return_data)?;
                debug!(
                    "balanceOf({}) on {} = {balance}",
                    address,
                    self.collection.redacted()
                );
                Ok(OwnershipCheck {
                    balance,
                    matched_token_ids: Vec::new(),
                })
            }
            TokenStandard::Erc1155 { token_ids } => {
                let calldata = abi::encode_balance_of_batch(address, token_ids)?;
                let return_data = self.eth_call(calldata).await?;
                let balances = abi::decode_balance_batch(&return_data, token_ids.len())?;

                let mut total: u128 = 0;
                let mut matched = Vec::new();
                for (id, balance) in token_ids.iter().zip(&balances) {
                    if *balance > 0 {
                        matched.push(*id);
                        total = total.saturating_add(*balance);
                    }
                }
                debug!(
                    "balanceOfBatch({}) on {} matched ids {:?}",
                    address,
                    self.collection.redacted(),
                    matched
                );
                Ok(OwnershipCheck {
                    balance: total,
                    matched_token_ids: matched,
                })
            }
        }
    }

    fn collection(&self) -> String {
        self.collection.redacted()
    }
}
