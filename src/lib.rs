//! Double Feature - Matchmaking core for a movie trivia duel game
//!
//! This crate provides AMQP-based matchmaking with a transactional ticket
//! queue, FIFO pairing under per-queue compatibility rules, expiry sweeping,
//! and session handoff for registered and guest participants.

pub mod amqp;
pub mod config;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use directory::{InMemoryDirectory, ParticipantDirectory};
pub use queue::{ExpirySweeper, FifoPairingEngine, PairingEngine, QueueManager, QueueStore};
pub use session::{InMemorySessionStore, SessionHandoff, SessionSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
