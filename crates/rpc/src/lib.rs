//! HTTP boundary for the tokengate service.
//!
//! Serves the wallet-connection page, accepts signed submissions, and
//! exposes health and metrics endpoints.

pub mod server;

pub use server::{start_server, AppState};
