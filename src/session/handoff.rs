//! Session construction from a paired pair of tickets

use crate::directory::provider::ParticipantDirectory;
use crate::error::{MatchmakingError, Result};
use crate::types::{GameMode, ParticipantRef, PlayerSlot, Session, SessionStatus, Ticket};
use crate::utils::{current_timestamp, generate_session_id};
use std::sync::Arc;
use tracing::debug;

/// Builds session records out of two resolved tickets
///
/// Slot 1 is the longer-waiting ticket, slot 2 the one whose insertion
/// triggered the match. Each slot carries exactly one participant identity and
/// the display name denormalized at enqueue time; guest identities are
/// upserted into the directory first so the session never references a guest
/// without a record.
pub struct SessionHandoff {
    directory: Arc<dyn ParticipantDirectory>,
}

impl SessionHandoff {
    pub fn new(directory: Arc<dyn ParticipantDirectory>) -> Self {
        Self { directory }
    }

    /// Create the session for two tickets that are about to pair
    ///
    /// Any failure here aborts the pairing; the caller is responsible for
    /// marking the triggering ticket accordingly.
    pub async fn create_session(&self, older: &Ticket, newer: &Ticket) -> Result<Session> {
        if older.queue_type != newer.queue_type {
            return Err(MatchmakingError::SessionCreationFailed {
                reason: format!(
                    "Tickets {} and {} are from different queues",
                    older.id, newer.id
                ),
            }
            .into());
        }

        self.ensure_guest_record(older).await?;
        self.ensure_guest_record(newer).await?;

        let session = Session {
            id: generate_session_id(),
            slots: [
                PlayerSlot {
                    participant: older.participant.clone(),
                    display_name: older.display_name.clone(),
                },
                PlayerSlot {
                    participant: newer.participant.clone(),
                    display_name: newer.display_name.clone(),
                },
            ],
            mode: GameMode::from(older.queue_type),
            status: SessionStatus::Waiting,
            created_at: current_timestamp(),
        };

        debug!(
            "Built session {} - mode: {}, slot1: {}, slot2: {}",
            session.id, session.mode, older.participant, newer.participant
        );

        Ok(session)
    }

    /// Idempotent guest upsert so the session's foreign reference holds
    async fn ensure_guest_record(&self, ticket: &Ticket) -> Result<()> {
        if let ParticipantRef::Guest(guest_id) = &ticket.participant {
            self.directory
                .ensure_guest(guest_id, &ticket.display_name)
                .await
                .map_err(|e| MatchmakingError::SessionCreationFailed {
                    reason: format!("Guest record for {} unavailable: {}", guest_id, e),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::provider::InMemoryDirectory;
    use crate::types::QueueType;
    use chrono::Duration;

    fn ticket(participant: ParticipantRef, queue_type: QueueType, name: &str) -> Ticket {
        Ticket::new(
            participant,
            queue_type,
            None,
            name.to_string(),
            current_timestamp(),
            Duration::seconds(120),
        )
    }

    #[test]
    fn test_slot_order_and_mode() {
        tokio_test::block_on(async {
            let handoff = SessionHandoff::new(Arc::new(InMemoryDirectory::new()));

            let older = ticket(
                ParticipantRef::Guest("g-1".to_string()),
                QueueType::Casual,
                "First",
            );
            let newer = ticket(
                ParticipantRef::Registered("acct-1".to_string()),
                QueueType::Casual,
                "Second",
            );

            let session = handoff.create_session(&older, &newer).await.unwrap();

            assert_eq!(session.mode, GameMode::Online);
            assert_eq!(session.status, SessionStatus::Waiting);
            assert_eq!(session.slots[0].participant, older.participant);
            assert_eq!(session.slots[0].display_name, "First");
            assert_eq!(session.slots[1].participant, newer.participant);
            assert_eq!(session.slots[1].display_name, "Second");
        });
    }

    #[test]
    fn test_ranked_tickets_get_ranked_mode() {
        tokio_test::block_on(async {
            let handoff = SessionHandoff::new(Arc::new(InMemoryDirectory::new()));

            let older = ticket(
                ParticipantRef::Registered("acct-1".to_string()),
                QueueType::Ranked,
                "A",
            );
            let newer = ticket(
                ParticipantRef::Registered("acct-2".to_string()),
                QueueType::Ranked,
                "B",
            );

            let session = handoff.create_session(&older, &newer).await.unwrap();
            assert_eq!(session.mode, GameMode::Ranked);
        });
    }

    #[test]
    fn test_guest_records_are_upserted() {
        tokio_test::block_on(async {
            let directory = Arc::new(InMemoryDirectory::new());
            let handoff = SessionHandoff::new(directory.clone());

            let older = ticket(
                ParticipantRef::Guest("g-1".to_string()),
                QueueType::Casual,
                "Guest One",
            );
            let newer = ticket(
                ParticipantRef::Guest("g-2".to_string()),
                QueueType::Casual,
                "Guest Two",
            );

            handoff.create_session(&older, &newer).await.unwrap();

            assert_eq!(directory.guest_count(), 2);
            assert_eq!(
                directory.guest_display_name("g-1").await.unwrap(),
                Some("Guest One".to_string())
            );
        });
    }

    #[test]
    fn test_mismatched_queues_rejected() {
        tokio_test::block_on(async {
            let handoff = SessionHandoff::new(Arc::new(InMemoryDirectory::new()));

            let older = ticket(
                ParticipantRef::Guest("g-1".to_string()),
                QueueType::Casual,
                "A",
            );
            let newer = ticket(
                ParticipantRef::Guest("g-2".to_string()),
                QueueType::Ranked,
                "B",
            );

            assert!(handoff.create_session(&older, &newer).await.is_err());
        });
    }
}
