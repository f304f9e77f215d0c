//! AMQP message definitions and serialization

use crate::error::{MatchmakingError, Result};
use crate::types::*;
use serde_json;

/// AMQP queue names
pub const COMMAND_QUEUE: &str = "matchmaking.commands";
pub const TICKET_EVENTS_EXCHANGE: &str = "matchmaking.ticket_events";
pub const SESSION_EVENTS_EXCHANGE: &str = "matchmaking.session_events";

/// Routing keys for events
pub const TICKET_QUEUED_ROUTING_KEY: &str = "ticket.queued";
pub const TICKET_LEFT_ROUTING_KEY: &str = "ticket.left";
pub const TICKET_TIMEOUT_ROUTING_KEY: &str = "ticket.timeout";
pub const TICKET_FAILED_ROUTING_KEY: &str = "ticket.failed";
pub const MATCH_FOUND_ROUTING_KEY: &str = "session.match_found";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::InvalidJoinRequest {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Serialize a matchmaking command to bytes
    pub fn serialize_command(command: &MatchmakingCommand) -> Result<Vec<u8>> {
        Self::validate_command(command)?;
        serde_json::to_vec(command).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize command: {}", e),
            }
            .into()
        })
    }

    /// Deserialize a matchmaking command from bytes
    pub fn deserialize_command(bytes: &[u8]) -> Result<MatchmakingCommand> {
        let command: MatchmakingCommand =
            serde_json::from_slice(bytes).map_err(|e| MatchmakingError::InvalidJoinRequest {
                reason: format!("Failed to deserialize command: {}", e),
            })?;

        Self::validate_command(&command)?;
        Ok(command)
    }

    /// Validate an inbound command
    pub fn validate_command(command: &MatchmakingCommand) -> Result<()> {
        match command {
            MatchmakingCommand::JoinQueue(request) => Self::validate_join_request(request),
            MatchmakingCommand::LeaveQueue(request) => Self::validate_leave_request(request),
        }
    }

    /// Validate a join request
    pub fn validate_join_request(request: &JoinQueueRequest) -> Result<()> {
        if let Some(participant) = &request.participant {
            if participant.id().trim().is_empty() {
                return Err(MatchmakingError::InvalidJoinRequest {
                    reason: "Participant id cannot be empty".to_string(),
                }
                .into());
            }
        }

        if let Some(name) = &request.display_name {
            if name.chars().count() > 64 {
                return Err(MatchmakingError::InvalidJoinRequest {
                    reason: "Display name is too long (max 64 characters)".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Validate a leave request
    pub fn validate_leave_request(request: &LeaveQueueRequest) -> Result<()> {
        if request.participant.id().trim().is_empty() {
            return Err(MatchmakingError::InvalidJoinRequest {
                reason: "Participant id cannot be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Serialize any AMQP message to bytes
    pub fn serialize_message<T: serde::Serialize>(message: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(message).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Get routing key for an event type
    pub fn get_routing_key(event: &MatchmakingEvent) -> &'static str {
        match event {
            MatchmakingEvent::TicketQueued(_) => TICKET_QUEUED_ROUTING_KEY,
            MatchmakingEvent::TicketLeft(_) => TICKET_LEFT_ROUTING_KEY,
            MatchmakingEvent::SearchTimedOut(_) => TICKET_TIMEOUT_ROUTING_KEY,
            MatchmakingEvent::SearchFailed(_) => TICKET_FAILED_ROUTING_KEY,
            MatchmakingEvent::MatchFound(_) => MATCH_FOUND_ROUTING_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;

    fn create_test_join_request() -> JoinQueueRequest {
        JoinQueueRequest {
            participant: Some(ParticipantRef::Guest("g-1".to_string())),
            queue_type: QueueType::Casual,
            display_name: Some("Test Guest".to_string()),
            skill_rating: None,
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn test_message_envelope_creation() {
        let request = create_test_join_request();
        let envelope = MessageEnvelope::new(request, "test.routing.key".to_string());

        assert_eq!(envelope.routing_key, "test.routing.key");
        assert!(!envelope.correlation_id.is_empty());
    }

    #[test]
    fn test_join_request_validation() {
        let valid_request = create_test_join_request();
        assert!(MessageUtils::validate_join_request(&valid_request).is_ok());

        // Empty participant id
        let mut invalid_request = create_test_join_request();
        invalid_request.participant = Some(ParticipantRef::Guest("".to_string()));
        assert!(MessageUtils::validate_join_request(&invalid_request).is_err());

        // Overlong display name
        let mut invalid_request = create_test_join_request();
        invalid_request.display_name = Some("x".repeat(65));
        assert!(MessageUtils::validate_join_request(&invalid_request).is_err());

        // No participant at all is fine: a guest identity gets fabricated
        let mut anonymous = create_test_join_request();
        anonymous.participant = None;
        assert!(MessageUtils::validate_join_request(&anonymous).is_ok());
    }

    #[test]
    fn test_command_serialization_roundtrip() {
        let command = MatchmakingCommand::JoinQueue(create_test_join_request());
        let bytes = MessageUtils::serialize_command(&command).unwrap();
        let deserialized = MessageUtils::deserialize_command(&bytes).unwrap();

        match deserialized {
            MatchmakingCommand::JoinQueue(request) => {
                assert_eq!(
                    request.participant,
                    Some(ParticipantRef::Guest("g-1".to_string()))
                );
                assert_eq!(request.queue_type, QueueType::Casual);
            }
            other => panic!("Unexpected command variant: {:?}", other),
        }
    }

    #[test]
    fn test_leave_request_validation() {
        let valid = LeaveQueueRequest {
            participant: ParticipantRef::Registered("acct-1".to_string()),
            timestamp: current_timestamp(),
        };
        assert!(MessageUtils::validate_leave_request(&valid).is_ok());

        let invalid = LeaveQueueRequest {
            participant: ParticipantRef::Registered("  ".to_string()),
            timestamp: current_timestamp(),
        };
        assert!(MessageUtils::validate_leave_request(&invalid).is_err());
    }

    #[test]
    fn test_routing_key_generation() {
        let queued = MatchmakingEvent::TicketQueued(TicketQueued {
            ticket_id: uuid::Uuid::new_v4(),
            participant: ParticipantRef::Guest("g-1".to_string()),
            queue_type: QueueType::Casual,
            display_name: "Test".to_string(),
            timestamp: current_timestamp(),
        });
        assert_eq!(
            MessageUtils::get_routing_key(&queued),
            TICKET_QUEUED_ROUTING_KEY
        );

        let timed_out = MatchmakingEvent::SearchTimedOut(SearchTimedOut {
            ticket_id: uuid::Uuid::new_v4(),
            participant: ParticipantRef::Guest("g-1".to_string()),
            queue_type: QueueType::Ranked,
            waited_seconds: 120,
            timestamp: current_timestamp(),
        });
        assert_eq!(
            MessageUtils::get_routing_key(&timed_out),
            TICKET_TIMEOUT_ROUTING_KEY
        );
    }
}
