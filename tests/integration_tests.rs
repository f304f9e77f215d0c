//! Integration tests for the double-feature matchmaking service
//!
//! These tests validate the whole pipeline working together:
//! - End-to-end guest pairing into a session
//! - FIFO ordering and the ranked rating window
//! - Queue invariants (single active ticket, mutual consistency of pairs)
//! - Voluntary leave, expiry sweeping, and the pairing error path

mod fixtures;

use chrono::Duration;
use double_feature::config::AppConfig;
use double_feature::types::{
    GameMode, JoinQueueRequest, ParticipantRef, QueueType, SessionStatus, Ticket, TicketStatus,
};
use double_feature::utils::current_timestamp;
use double_feature::SessionSink;
use fixtures::{build_test_system, build_test_system_with_directory, guest_join, ranked_join};
use std::sync::Arc;

#[tokio::test]
async fn test_end_to_end_guest_casual_flow() {
    let system = build_test_system(AppConfig::default());

    // First guest enqueues and waits
    let first = system
        .manager
        .enqueue(guest_join("g-1", QueueType::Casual))
        .await
        .unwrap();
    assert_eq!(
        system.manager.pool_size(QueueType::Casual).await.unwrap(),
        1
    );

    // Second guest enqueues and the pairing fires inline
    let second = system
        .manager
        .enqueue(guest_join("g-2", QueueType::Casual))
        .await
        .unwrap();

    let first_status = system
        .manager
        .status(&first.participant)
        .await
        .unwrap()
        .unwrap();
    let second_status = system
        .manager
        .status(&second.participant)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first_status.status, TicketStatus::Found);
    assert_eq!(second_status.status, TicketStatus::Found);
    assert_eq!(first_status.session_id, second_status.session_id);

    // The pool drains back to zero
    assert_eq!(
        system.manager.pool_size(QueueType::Casual).await.unwrap(),
        0
    );

    // The created session carries both guest identities, casual mode, waiting
    let session = system
        .manager
        .session(first_status.session_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.mode, GameMode::Online);
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(
        session.slots[0].participant,
        ParticipantRef::Guest("g-1".to_string())
    );
    assert_eq!(
        session.slots[1].participant,
        ParticipantRef::Guest("g-2".to_string())
    );
    assert!(session.slots[0].participant.is_guest());

    // Both clients were notified through the event channel
    assert_eq!(system.publisher.count_events_of_type("MatchFound"), 1);
    let found = &system.publisher.match_found_events()[0];
    assert_eq!(found.session.id, session.id);
}

#[tokio::test]
async fn test_fifo_oldest_compatible_candidate_wins() {
    let system = build_test_system(AppConfig::default());
    let now = current_timestamp();

    // Two ranked tickets already waiting, identical ratings, different ages
    {
        let mut table = system.store.lock().await;

        let older = Ticket::new(
            ParticipantRef::Guest("older".to_string()),
            QueueType::Ranked,
            Some(1000),
            "Older".to_string(),
            now - Duration::seconds(60),
            Duration::seconds(120),
        );
        table.insert(older);

        let newer = Ticket::new(
            ParticipantRef::Guest("newer".to_string()),
            QueueType::Ranked,
            Some(1000),
            "Newer".to_string(),
            now - Duration::seconds(30),
            Duration::seconds(120),
        );
        table.insert(newer);
    }

    // Incoming compatible ticket must pair with the older one
    let receipt = system.manager.enqueue(ranked_join("incoming", 1000)).await.unwrap();

    let incoming_status = system
        .manager
        .status(&receipt.participant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(incoming_status.status, TicketStatus::Found);
    assert_eq!(
        incoming_status.paired_with,
        Some(ParticipantRef::Guest("older".to_string()))
    );

    let newer_status = system
        .manager
        .status(&ParticipantRef::Guest("newer".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(newer_status.status, TicketStatus::Searching);
}

#[tokio::test]
async fn test_rating_window_bound_is_enforced() {
    let system = build_test_system(AppConfig::default());
    let now = current_timestamp();

    // A 1000-rated candidate that has already waited 40 seconds: the window
    // is saturated at 300 points, still short of a 400-point gap
    {
        let mut table = system.store.lock().await;
        let candidate = Ticket::new(
            ParticipantRef::Guest("low".to_string()),
            QueueType::Ranked,
            Some(1000),
            "Low".to_string(),
            now - Duration::seconds(40),
            Duration::seconds(120),
        );
        table.insert(candidate);
    }

    let receipt = system.manager.enqueue(ranked_join("high", 1400)).await.unwrap();

    let high_status = system
        .manager
        .status(&receipt.participant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(high_status.status, TicketStatus::Searching);

    let low_status = system
        .manager
        .status(&ParticipantRef::Guest("low".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(low_status.status, TicketStatus::Searching);

    assert_eq!(
        system.manager.pool_size(QueueType::Ranked).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_single_active_ticket_per_participant() {
    let system = build_test_system(AppConfig::default());
    let participant = ParticipantRef::Guest("g-1".to_string());

    // Re-enqueue several times, hopping between queues
    for queue_type in [
        QueueType::Casual,
        QueueType::Ranked,
        QueueType::Casual,
        QueueType::Casual,
    ] {
        system
            .manager
            .enqueue(guest_join("g-1", queue_type))
            .await
            .unwrap();
    }

    let table = system.store.lock().await;
    let searching_for_participant = table
        .searching()
        .filter(|t| t.participant == participant)
        .count();
    assert_eq!(searching_for_participant, 1);
    assert_eq!(table.len(), 1);
}

#[tokio::test]
async fn test_found_tickets_are_mutually_consistent() {
    let system = build_test_system(AppConfig::default());

    // Three pairs in a row, all casual
    for i in 0..6 {
        system
            .manager
            .enqueue(guest_join(&format!("g-{}", i), QueueType::Casual))
            .await
            .unwrap();
    }

    assert_eq!(system.manager.get_stats().unwrap().sessions_created, 3);

    // Every participant's latest ticket is found with a reciprocal partner
    let mut session_ids = Vec::new();
    for i in 0..6 {
        let participant = ParticipantRef::Guest(format!("g-{}", i));
        let status = system
            .manager
            .status(&participant)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, TicketStatus::Found);

        let partner = status.paired_with.clone().unwrap();
        let partner_status = system.manager.status(&partner).await.unwrap().unwrap();
        assert_eq!(partner_status.status, TicketStatus::Found);
        assert_eq!(partner_status.session_id, status.session_id);
        assert_eq!(partner_status.paired_with, Some(participant));

        session_ids.push(status.session_id.unwrap());
    }

    session_ids.sort();
    session_ids.dedup();
    assert_eq!(session_ids.len(), 3);
    assert_eq!(system.sessions.session_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_leave_then_leave_again() {
    let system = build_test_system(AppConfig::default());
    let participant = ParticipantRef::Guest("g-1".to_string());

    system
        .manager
        .enqueue(guest_join("g-1", QueueType::Casual))
        .await
        .unwrap();

    assert!(system.manager.leave(&participant).await.unwrap());
    assert!(!system.manager.leave(&participant).await.unwrap());
    assert_eq!(system.publisher.count_events_of_type("TicketLeft"), 1);

    // A participant that never queued gets the same quiet no-op
    let stranger = ParticipantRef::Guest("stranger".to_string());
    assert!(!system.manager.leave(&stranger).await.unwrap());
}

#[tokio::test]
async fn test_leave_after_pairing_reports_not_found() {
    let system = build_test_system(AppConfig::default());

    system
        .manager
        .enqueue(guest_join("g-1", QueueType::Casual))
        .await
        .unwrap();
    system
        .manager
        .enqueue(guest_join("g-2", QueueType::Casual))
        .await
        .unwrap();

    // Both tickets are already found; a defensive leave removes nothing
    let participant = ParticipantRef::Guest("g-1".to_string());
    assert!(!system.manager.leave(&participant).await.unwrap());

    let status = system.manager.status(&participant).await.unwrap().unwrap();
    assert_eq!(status.status, TicketStatus::Found);
}

#[tokio::test]
async fn test_expired_ticket_times_out_and_leaves_pool() {
    let mut config = AppConfig::default();
    config.matchmaking.search_timeout_seconds = 0;
    let system = build_test_system(config);

    let receipt = system
        .manager
        .enqueue(guest_join("g-1", QueueType::Casual))
        .await
        .unwrap();

    // pool_size sweeps first, so the instantly expired ticket never counts
    assert_eq!(
        system.manager.pool_size(QueueType::Casual).await.unwrap(),
        0
    );

    let status = system
        .manager
        .status(&receipt.participant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, TicketStatus::Timeout);
    assert_eq!(system.publisher.count_events_of_type("SearchTimedOut"), 1);

    // A timed-out participant can search again
    system
        .manager
        .enqueue(guest_join("g-1", QueueType::Casual))
        .await
        .unwrap();
    let status = system
        .manager
        .status(&receipt.participant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, TicketStatus::Searching);
}

#[tokio::test]
async fn test_pairing_failure_marks_triggering_ticket() {
    // Enqueue-time guest upserts (two calls) succeed, the handoff-time upsert
    // fails, so the failure lands inside the pairing transaction
    let directory = Arc::new(fixtures::FlakyGuestDirectory::failing_after(2));
    let system = build_test_system_with_directory(AppConfig::default(), directory);

    system
        .manager
        .enqueue(guest_join("g-1", QueueType::Casual))
        .await
        .unwrap();

    let result = system
        .manager
        .enqueue(guest_join("g-2", QueueType::Casual))
        .await;
    assert!(result.is_err(), "pairing failure must surface to the caller");

    // The triggering ticket is marked, the candidate keeps searching
    let trigger_status = system
        .manager
        .status(&ParticipantRef::Guest("g-2".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trigger_status.status, TicketStatus::Error);

    let candidate_status = system
        .manager
        .status(&ParticipantRef::Guest("g-1".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(candidate_status.status, TicketStatus::Searching);

    // No half-created session exists and the failure was published
    assert_eq!(system.sessions.session_count().await.unwrap(), 0);
    assert_eq!(system.publisher.count_events_of_type("SearchFailed"), 1);
    assert_eq!(system.manager.get_stats().unwrap().pairing_errors, 1);
}

#[tokio::test]
async fn test_registered_account_pairs_with_guest() {
    let directory = Arc::new(
        double_feature::directory::InMemoryDirectory::new().with_account(
            "acct-1",
            "Siskel",
            1430,
        ),
    );
    let system = build_test_system_with_directory(AppConfig::default(), directory);

    system
        .manager
        .enqueue(guest_join("g-1", QueueType::Casual))
        .await
        .unwrap();
    system
        .manager
        .enqueue(JoinQueueRequest {
            participant: Some(ParticipantRef::Registered("acct-1".to_string())),
            queue_type: QueueType::Casual,
            display_name: None,
            skill_rating: None,
            timestamp: current_timestamp(),
        })
        .await
        .unwrap();

    let found = system.publisher.match_found_events();
    assert_eq!(found.len(), 1);

    let session = &found[0].session;
    assert!(session.slots[0].participant.is_guest());
    assert!(!session.slots[1].participant.is_guest());
    assert_eq!(session.slots[1].display_name, "Siskel");
}
