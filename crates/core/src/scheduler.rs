//! Periodic re-verification of current role holders.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokengate_chain::OwnershipOracle;
use tokengate_gateway::{RoleGateway, WalletDirectory};
use tokengate_types::{redact_address, CommunityId, RoleId};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Re-checks role holders on a fixed interval and revokes the role from
/// wallets that no longer hold a qualifying token.
///
/// Revocation only happens on a definitive zero balance. An oracle error
/// leaves the member untouched for that tick (fail-closed means deny new
/// grants, never revoke on uncertainty), and one member's failure never
/// aborts the tick for the rest.
pub struct ReverificationScheduler {
    gateway: Arc<dyn RoleGateway>,
    oracle: Arc<dyn OwnershipOracle>,
    /// Wallet↔identity mapping. Without one, re-verification cannot
    /// re-derive wallets and every tick is a logged no-op.
    directory: Option<Arc<dyn WalletDirectory>>,
    community: CommunityId,
    role: RoleId,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReverificationScheduler {
    pub fn new(
        gateway: Arc<dyn RoleGateway>,
        oracle: Arc<dyn OwnershipOracle>,
        directory: Option<Arc<dyn WalletDirectory>>,
        community: CommunityId,
        role: RoleId,
        period: Duration,
    ) -> Self {
        Self {
            gateway,
            oracle,
            directory,
            community,
            role,
            period: period.max(Duration::from_secs(1)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the re-verification loop. Ticks run sequentially inside one
    /// task and delayed ticks are not bunched, so a slow pass can never
    /// overlap the next one.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let scheduler = Arc::clone(self);
        let period = self.period;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; skip it so the
            // loop starts one full period after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                scheduler.run_once().await;
            }
        }));

        info!(
            "re-verification scheduler started (period {:?})",
            self.period
        );
    }

    /// Cancel the loop.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("re-verification scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Run a single re-verification pass. Public so it can be driven
    /// directly by tests and admin tooling.
    pub async fn run_once(&self) {
        let Some(directory) = self.directory.as_ref() else {
            debug!(
                "re-verification tick skipped: no wallet directory is configured, \
                 cannot re-derive wallets for role holders"
            );
            return;
        };

        let holders = match self.gateway.role_holders(&self.community, &self.role).await {
            Ok(holders) => holders,
            Err(err) => {
                warn!("re-verification tick: failed to list role holders: {err}");
                return;
            }
        };

        debug!(
            "re-verifying {} holder(s) of {} in {}",
            holders.len(),
            self.role,
            self.community
        );

        for member in holders {
            let Some(wallet) = directory.wallet_for(&member) else {
                debug!("no wallet on record for {member}; skipping");
                continue;
            };

            match self.oracle.check(&wallet).await {
                Ok(check) if check.holds() => {}
                Ok(_) => {
                    info!(
                        "{member} no longer holds a qualifying token (wallet {}); revoking",
                        redact_address(&wallet)
                    );
                    if let Err(err) = self
                        .gateway
                        .revoke(&self.community, &member, &self.role)
                        .await
                    {
                        warn!("failed to revoke role from {member}: {err}");
                    }
                }
                Err(err) => {
                    // Transient oracle failure: leave the member untouched
                    // this tick rather than revoking on uncertainty.
                    warn!("ownership re-check failed for {member}: {err}");
                }
            }
        }
    }
}

impl Drop for ReverificationScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}
