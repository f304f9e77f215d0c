//! Session creation and storage
//!
//! When two tickets pair, a game session record is created and handed off to
//! the downstream gameplay service. This module owns the handoff construction
//! logic and the sink trait the gameplay side consumes sessions through.

pub mod handoff;
pub mod store;

pub use handoff::SessionHandoff;
pub use store::{InMemorySessionStore, SessionSink};
