//! Service configuration.
//!
//! Layered the usual way: built-in defaults, then an optional TOML file,
//! then `TOKENGATE_*` environment variables, then explicit CLI flags.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;

/// Recognized configuration surface.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Chat-platform credential. Consumed by whichever role-gateway
    /// implementation is wired in; the built-in stub ignores it.
    #[serde(default)]
    pub platform_token: String,
    /// Chain JSON-RPC endpoint.
    pub rpc_url: String,
    /// Token contract address, 0x-prefixed.
    pub contract_address: String,
    /// `erc721` or `erc1155`.
    #[serde(default = "default_standard")]
    pub contract_standard: String,
    /// Token ids to query for erc1155 collections.
    #[serde(default)]
    pub token_ids: Vec<u64>,
    /// Role granted on successful verification.
    pub role_id: String,
    /// Community the role lives in.
    pub community_id: String,
    #[serde(default = "default_host")]
    pub http_host: String,
    #[serde(default = "default_port")]
    pub http_port: u16,
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl_secs: u64,
    #[serde(default = "default_reverify_interval")]
    pub reverify_interval_secs: u64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_node_id")]
    pub node_id: String,
}

fn default_standard() -> String {
    "erc721".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_challenge_ttl() -> u64 {
    600
}

fn default_reverify_interval() -> u64 {
    3600
}

fn default_call_timeout() -> u64 {
    10
}

fn default_node_id() -> String {
    "tokengate-node".to_string()
}

impl NodeConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("contract_standard", default_standard())?
            .set_default("http_host", default_host())?
            .set_default("http_port", default_port())?
            .set_default("challenge_ttl_secs", default_challenge_ttl())?
            .set_default("reverify_interval_secs", default_reverify_interval())?
            .set_default("call_timeout_secs", default_call_timeout())?
            .set_default("node_id", default_node_id())?
            .set_default("platform_token", "")?
            .set_default("token_ids", Vec::<i64>::new())?;

        if let Some(path) = config_path {
            builder = builder.add_source(ConfigFile::with_name(path));
        }

        builder = builder.add_source(Environment::with_prefix("TOKENGATE"));

        let config: NodeConfig = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.contract_standard.as_str() {
            "erc721" => {}
            "erc1155" => {
                if self.token_ids.is_empty() {
                    bail!("erc1155 collections need at least one token id (token_ids)");
                }
            }
            other => bail!("unknown contract standard {other:?}; expected erc721 or erc1155"),
        }

        if self.challenge_ttl_secs == 0 {
            bail!("challenge_ttl_secs must be positive");
        }
        if self.reverify_interval_secs == 0 {
            bail!("reverify_interval_secs must be positive");
        }

        tokengate_types::normalize_address(&self.contract_address)
            .map_err(|err| anyhow::anyhow!("invalid contract_address: {err}"))?;

        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_toml() -> String {
        r#"
            rpc_url = "http://localhost:8545"
            contract_address = "0x0123456789abcdef0123456789abcdef01234567"
            role_id = "holder"
            community_id = "guild-1"
        "#
        .to_string()
    }

    fn load_from(contents: &str) -> Result<NodeConfig> {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        NodeConfig::load(Some(file.path().to_str().unwrap()))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load_from(&base_toml()).unwrap();
        assert_eq!(config.contract_standard, "erc721");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.challenge_ttl_secs, 600);
        assert_eq!(config.reverify_interval_secs, 3600);
    }

    #[test]
    fn erc1155_requires_token_ids() {
        let mut toml = base_toml();
        toml.push_str("contract_standard = \"erc1155\"\n");
        assert!(load_from(&toml).is_err());

        toml.push_str("token_ids = [1, 2]\n");
        let config = load_from(&toml).unwrap();
        assert_eq!(config.token_ids, vec![1, 2]);
    }

    #[test]
    fn bad_contract_address_is_rejected() {
        let toml = base_toml().replace(
            "0x0123456789abcdef0123456789abcdef01234567",
            "not-an-address",
        );
        assert!(load_from(&toml).is_err());
    }

    #[test]
    fn unknown_standard_is_rejected() {
        let mut toml = base_toml();
        toml.push_str("contract_standard = \"erc20000\"\n");
        assert!(load_from(&toml).is_err());
    }
}
