//! Verification orchestration.
//!
//! [`VerificationCoordinator`] runs the end-to-end challenge flow: mint a
//! single-use token, consume the signed submission, check the signature and
//! on-chain ownership, and ask the role gateway for the grant.
//! [`ReverificationScheduler`] independently re-checks current role holders
//! on a timer and revokes the role when ownership has lapsed.

pub mod coordinator;
pub mod scheduler;

pub use coordinator::{GrantConfirmation, OwnershipReport, VerificationCoordinator};
pub use scheduler::ReverificationScheduler;
