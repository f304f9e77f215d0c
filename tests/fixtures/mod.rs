//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use double_feature::amqp::publisher::EventPublisher;
use double_feature::config::AppConfig;
use double_feature::directory::provider::{InMemoryDirectory, ParticipantDirectory, RegisteredProfile};
use double_feature::error::{MatchmakingError, Result};
use double_feature::queue::{QueueManager, QueueStore};
use double_feature::session::store::InMemorySessionStore;
use double_feature::types::{
    JoinQueueRequest, MatchFound, MatchmakingEvent, ParticipantRef, QueueType, SearchFailed,
    SearchTimedOut, TicketLeft, TicketQueued,
};
use double_feature::utils::current_timestamp;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock event publisher that captures published events for testing
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published_events: Arc<Mutex<Vec<MatchmakingEvent>>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<MatchmakingEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of specific type
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| match event {
                MatchmakingEvent::TicketQueued(_) => event_type == "TicketQueued",
                MatchmakingEvent::TicketLeft(_) => event_type == "TicketLeft",
                MatchmakingEvent::MatchFound(_) => event_type == "MatchFound",
                MatchmakingEvent::SearchTimedOut(_) => event_type == "SearchTimedOut",
                MatchmakingEvent::SearchFailed(_) => event_type == "SearchFailed",
            })
            .count()
    }

    /// All MatchFound payloads seen so far
    pub fn match_found_events(&self) -> Vec<MatchFound> {
        self.get_published_events()
            .into_iter()
            .filter_map(|event| match event {
                MatchmakingEvent::MatchFound(found) => Some(found),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: MatchmakingEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish_ticket_queued(&self, event: TicketQueued) -> Result<()> {
        self.record(MatchmakingEvent::TicketQueued(event));
        Ok(())
    }

    async fn publish_ticket_left(&self, event: TicketLeft) -> Result<()> {
        self.record(MatchmakingEvent::TicketLeft(event));
        Ok(())
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        self.record(MatchmakingEvent::MatchFound(event));
        Ok(())
    }

    async fn publish_search_timed_out(&self, event: SearchTimedOut) -> Result<()> {
        self.record(MatchmakingEvent::SearchTimedOut(event));
        Ok(())
    }

    async fn publish_search_failed(&self, event: SearchFailed) -> Result<()> {
        self.record(MatchmakingEvent::SearchFailed(event));
        Ok(())
    }
}

/// Directory that starts failing guest upserts after a number of calls
///
/// Lets tests drive the pairing-time failure path: enqueue-time upserts
/// succeed, the handoff-time upsert fails.
pub struct FlakyGuestDirectory {
    inner: InMemoryDirectory,
    ensure_calls: AtomicUsize,
    fail_after: usize,
}

impl FlakyGuestDirectory {
    pub fn failing_after(fail_after: usize) -> Self {
        Self {
            inner: InMemoryDirectory::new(),
            ensure_calls: AtomicUsize::new(0),
            fail_after,
        }
    }
}

#[async_trait]
impl ParticipantDirectory for FlakyGuestDirectory {
    async fn resolve_registered(&self, account_id: &str) -> Result<Option<RegisteredProfile>> {
        self.inner.resolve_registered(account_id).await
    }

    async fn ensure_guest(&self, guest_id: &str, display_name: &str) -> Result<()> {
        let call = self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_after {
            return Err(MatchmakingError::DirectoryUnavailable {
                message: "Simulated directory outage".to_string(),
            }
            .into());
        }
        self.inner.ensure_guest(guest_id, display_name).await
    }

    async fn guest_display_name(&self, guest_id: &str) -> Result<Option<String>> {
        self.inner.guest_display_name(guest_id).await
    }
}

/// A complete test system: manager plus handles to its collaborators
pub struct TestSystem {
    pub manager: Arc<QueueManager>,
    pub store: Arc<QueueStore>,
    pub publisher: Arc<RecordingEventPublisher>,
    pub sessions: Arc<InMemorySessionStore>,
}

/// Build a manager wired to recording collaborators
pub fn build_test_system(config: AppConfig) -> TestSystem {
    build_test_system_with_directory(config, Arc::new(InMemoryDirectory::new()))
}

/// Build a manager with a custom directory implementation
pub fn build_test_system_with_directory(
    config: AppConfig,
    directory: Arc<dyn ParticipantDirectory>,
) -> TestSystem {
    let store = Arc::new(QueueStore::new());
    let publisher = Arc::new(RecordingEventPublisher::new());
    let sessions = Arc::new(InMemorySessionStore::new());

    let manager = Arc::new(QueueManager::new(
        store.clone(),
        directory,
        sessions.clone(),
        publisher.clone(),
        config,
    ));

    TestSystem {
        manager,
        store,
        publisher,
        sessions,
    }
}

/// Join request for a named guest
pub fn guest_join(guest_id: &str, queue_type: QueueType) -> JoinQueueRequest {
    JoinQueueRequest {
        participant: Some(ParticipantRef::Guest(guest_id.to_string())),
        queue_type,
        display_name: Some(format!("Guest {}", guest_id)),
        skill_rating: None,
        timestamp: current_timestamp(),
    }
}

/// Join request for a ranked guest with an explicit rating
pub fn ranked_join(guest_id: &str, rating: i32) -> JoinQueueRequest {
    JoinQueueRequest {
        participant: Some(ParticipantRef::Guest(guest_id.to_string())),
        queue_type: QueueType::Ranked,
        display_name: Some(format!("Guest {}", guest_id)),
        skill_rating: Some(rating),
        timestamp: current_timestamp(),
    }
}
