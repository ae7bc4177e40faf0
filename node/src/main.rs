//! Tokengate service binary.
//!
//! Wires the challenge ledger, chain oracle, role gateway, and HTTP
//! server together and runs until interrupted.

mod config;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokengate_chain::{CollectionRef, EvmOwnershipOracle, TokenStandard};
use tokengate_core::{ReverificationScheduler, VerificationCoordinator};
use tokengate_gateway::{RoleGateway, StubRoleGateway, StubWalletDirectory, WalletDirectory};
use tokengate_ledger::{ChallengeStore, ChallengeSweeper, MemoryChallengeStore};
use tokengate_rpc::{start_server, AppState};
use tokengate_types::{normalize_address, CommunityId, RoleId};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::NodeConfig;

/// How often expired challenge tokens are swept from the ledger.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "tokengate-node")]
#[command(about = "Token-gated role verification service")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the HTTP listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the HTTP listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the chain JSON-RPC endpoint.
    #[arg(long)]
    rpc_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = NodeConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        cfg.http_host = host;
    }
    if let Some(port) = cli.port {
        cfg.http_port = port;
    }
    if let Some(rpc_url) = cli.rpc_url {
        cfg.rpc_url = rpc_url;
    }

    info!("starting {} v{}", cfg.node_id, env!("CARGO_PKG_VERSION"));

    let community = CommunityId::new(cfg.community_id.clone());
    let role = RoleId::new(cfg.role_id.clone());

    // Challenge ledger plus the background sweep that keeps it from
    // accumulating tokens nobody ever redeemed.
    let store: Arc<dyn ChallengeStore> = Arc::new(MemoryChallengeStore::with_ttl(
        Duration::from_secs(cfg.challenge_ttl_secs),
    ));
    let sweeper = ChallengeSweeper::new(store.clone(), SWEEP_PERIOD);
    sweeper.start();

    let endpoint = Url::parse(&cfg.rpc_url)
        .with_context(|| format!("invalid rpc_url {:?}", cfg.rpc_url))?;
    let contract = normalize_address(&cfg.contract_address)
        .map_err(|err| anyhow::anyhow!("invalid contract_address: {err}"))?;
    let standard = match cfg.contract_standard.as_str() {
        "erc1155" => TokenStandard::Erc1155 {
            token_ids: cfg.token_ids.clone(),
        },
        _ => TokenStandard::Erc721,
    };
    let oracle = Arc::new(
        EvmOwnershipOracle::with_timeout(
            endpoint,
            CollectionRef { contract, standard },
            Duration::from_secs(cfg.call_timeout_secs),
        )
        .map_err(|err| anyhow::anyhow!("failed to build ownership oracle: {err}"))?,
    );

    // The built-in gateway keeps roles and memberships in process memory.
    // A real platform integration implements RoleGateway and
    // WalletDirectory against the platform API and replaces these two.
    if !cfg.platform_token.is_empty() {
        warn!("platform_token is set but the in-memory role gateway does not use it");
    }
    let stub_gateway = Arc::new(StubRoleGateway::new());
    stub_gateway.define_role(community.clone(), role.clone());
    let gateway: Arc<dyn RoleGateway> = stub_gateway;
    let directory: Arc<dyn WalletDirectory> = Arc::new(StubWalletDirectory::new());

    let coordinator = Arc::new(VerificationCoordinator::new(
        store.clone(),
        oracle.clone(),
        gateway.clone(),
        role.clone(),
    ));

    let scheduler = Arc::new(ReverificationScheduler::new(
        gateway,
        oracle,
        Some(directory),
        community,
        role,
        Duration::from_secs(cfg.reverify_interval_secs),
    ));
    scheduler.start();

    let state = AppState {
        coordinator,
        store,
        node_id: cfg.node_id.clone(),
        start_time: Instant::now(),
        req_count: Arc::new(AtomicUsize::new(0)),
    };

    let addr = cfg.http_addr();
    tokio::select! {
        result = start_server(state, &addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    scheduler.stop();
    sweeper.stop();
    info!("{} stopped", cfg.node_id);
    Ok(())
}
