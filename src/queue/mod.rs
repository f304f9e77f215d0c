//! Matchmaking queue for the double-feature service
//!
//! This module owns the ticket table, the pairing algorithm, the expiry
//! sweeper, and the client-facing queue manager that ties them together.

pub mod manager;
pub mod pairing;
pub mod store;
pub mod sweeper;

// Re-export commonly used types
pub use manager::{QueueManager, QueueManagerStats};
pub use pairing::{FifoPairingEngine, PairingEngine};
pub use store::{QueueStore, QueueTable};
pub use sweeper::{ExpirySweeper, SweepOutcome};
