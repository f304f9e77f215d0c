//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Invalid join request: {reason}")]
    InvalidJoinRequest { reason: String },

    #[error("Unknown participant: {participant}")]
    UnknownParticipant { participant: String },

    #[error("Ticket {ticket_id} cannot leave status {status}")]
    TicketStateConflict { ticket_id: String, status: String },

    #[error("Session creation failed: {reason}")]
    SessionCreationFailed { reason: String },

    #[error("Participant directory unavailable: {message}")]
    DirectoryUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
