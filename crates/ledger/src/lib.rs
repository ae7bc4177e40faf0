//! In-memory ledger of pending verification challenges.
//!
//! Each challenge is keyed by an opaque, cryptographically random token that
//! doubles as the single-use credential. Expiry is enforced twice: a
//! background sweeper evicts stale entries, and `consume` re-checks the
//! issue timestamp so a race between sweep and consumption can never yield
//! a false success.

pub mod sweeper;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use tokengate_types::{CommunityId, IdentityId, DEFAULT_CHALLENGE_TTL};

pub use sweeper::ChallengeSweeper;

/// Raw entropy bytes behind each challenge token.
const TOKEN_BYTES: usize = 32;

/// A pending verification attempt awaiting a signed submission.
#[derive(Debug, Clone)]
pub struct PendingChallenge {
    pub token: String,
    pub identity_id: IdentityId,
    pub community_id: CommunityId,
    pub issued_at: Instant,
}

/// Store of pending challenges.
///
/// Abstracted as a trait so the in-memory map can be swapped for an
/// external expiring key-value store without touching the coordinator.
/// Implementations must make `consume` atomic: across any number of
/// concurrent callers, a token is handed out at most once.
pub trait ChallengeStore: Send + Sync {
    /// Mint a fresh single-use token for an identity/community pair.
    fn issue(&self, identity_id: IdentityId, community_id: CommunityId) -> String;

    /// Atomically look up and remove a challenge. `None` means the token
    /// was never issued, already consumed, or expired.
    fn consume(&self, token: &str) -> Option<PendingChallenge>;

    /// Number of currently pending challenges.
    fn pending(&self) -> usize;

    /// Drop every challenge past its TTL; returns how many were removed.
    fn purge_expired(&self) -> usize;
}

/// Thread-safe in-memory [`ChallengeStore`].
pub struct MemoryChallengeStore {
    challenges: RwLock<HashMap<String, PendingChallenge>>,
    ttl: Duration,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CHALLENGE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            challenges: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mint_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn is_expired(&self, challenge: &PendingChallenge, now: Instant) -> bool {
        now.duration_since(challenge.issued_at) > self.ttl
    }
}

impl Default for MemoryChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeStore for MemoryChallengeStore {
    fn issue(&self, identity_id: IdentityId, community_id: CommunityId) -> String {
        let token = Self::mint_token();
        let challenge = PendingChallenge {
            token: token.clone(),
            identity_id,
            community_id,
            issued_at: Instant::now(),
        };

        self.challenges.write().insert(token.clone(), challenge);
        token
    }

    fn consume(&self, token: &str) -> Option<PendingChallenge> {
        // Single write-locked remove: two concurrent submissions of the
        // same token cannot both observe it present.
        let challenge = self.challenges.write().remove(token)?;

        if self.is_expired(&challenge, Instant::now()) {
            return None;
        }

        Some(challenge)
    }

    fn pending(&self) -> usize {
        self.challenges.read().len()
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut challenges = self.challenges.write();
        let before = challenges.len();
        challenges.retain(|_, challenge| now.duration_since(challenge.issued_at) <= self.ttl);
        before - challenges.len()
    }
}
