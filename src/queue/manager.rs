//! Queue manager implementation for the client-facing matchmaking API
//!
//! This module provides the core QueueManager that orchestrates identity
//! resolution, ticket supersession, inline pairing, session handoff, and
//! event publishing.

use crate::amqp::publisher::EventPublisher;
use crate::config::app::AppConfig;
use crate::directory::provider::ParticipantDirectory;
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::queue::pairing::{FifoPairingEngine, PairingEngine};
use crate::queue::store::QueueStore;
use crate::queue::sweeper::ExpirySweeper;
use crate::session::handoff::SessionHandoff;
use crate::session::store::SessionSink;
use crate::types::{
    EnqueueReceipt, JoinQueueRequest, MatchFound, ParticipantRef, QueueType, Session, SessionId,
    Ticket, TicketLeft, TicketQueued, TicketSnapshot,
};
use crate::utils::{current_timestamp, default_guest_name, generate_guest_id};
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Statistics about queue manager operations
#[derive(Debug, Clone, Default)]
pub struct QueueManagerStats {
    /// Total tickets enqueued
    pub tickets_enqueued: u64,
    /// Tickets replaced by a newer enqueue from the same participant
    pub tickets_superseded: u64,
    /// Total sessions created from pairs
    pub sessions_created: u64,
    /// Voluntary leaves that removed a ticket
    pub leaves: u64,
    /// Pairing attempts that ended in an error ticket
    pub pairing_errors: u64,
    /// Current number of searching tickets across all queues
    pub tickets_searching: usize,
}

/// The main queue manager
///
/// `enqueue` is not a plain insert: pairing runs inline inside the same store
/// transaction, so the caller of a syntactically valid request can still
/// receive a pairing error. Clients are expected to re-enqueue on error.
pub struct QueueManager {
    /// Shared ticket table
    store: Arc<QueueStore>,
    /// Candidate selection strategy
    pairing_engine: Arc<dyn PairingEngine>,
    /// Builds session records for paired tickets
    session_handoff: SessionHandoff,
    /// Downstream consumer of created sessions
    session_sink: Arc<dyn SessionSink>,
    /// Identity resolution collaborator
    directory: Arc<dyn ParticipantDirectory>,
    /// Event publisher for pairing outcomes
    event_publisher: Arc<dyn EventPublisher>,
    /// Expiry sweeper, shared with the periodic task
    sweeper: Arc<ExpirySweeper>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
    /// Manager statistics
    stats: Arc<RwLock<QueueManagerStats>>,
    /// Matchmaking tunables
    config: AppConfig,
}

impl QueueManager {
    /// Create a new queue manager with its own metrics collector
    pub fn new(
        store: Arc<QueueStore>,
        directory: Arc<dyn ParticipantDirectory>,
        session_sink: Arc<dyn SessionSink>,
        event_publisher: Arc<dyn EventPublisher>,
        config: AppConfig,
    ) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(
            store,
            directory,
            session_sink,
            event_publisher,
            config,
            metrics_collector,
        )
    }

    /// Create a new queue manager with an explicit metrics collector
    pub fn with_metrics(
        store: Arc<QueueStore>,
        directory: Arc<dyn ParticipantDirectory>,
        session_sink: Arc<dyn SessionSink>,
        event_publisher: Arc<dyn EventPublisher>,
        config: AppConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let sweeper = Arc::new(ExpirySweeper::new(
            store.clone(),
            event_publisher.clone(),
            metrics_collector.clone(),
            config.queue_config(),
        ));

        Self {
            store,
            pairing_engine: Arc::new(FifoPairingEngine::new(config.rating_window())),
            session_handoff: SessionHandoff::new(directory.clone()),
            session_sink,
            directory,
            event_publisher,
            sweeper,
            metrics_collector,
            stats: Arc::new(RwLock::new(QueueManagerStats::default())),
            config,
        }
    }

    /// The sweeper instance, for wiring the periodic maintenance task
    pub fn sweeper(&self) -> Arc<ExpirySweeper> {
        self.sweeper.clone()
    }

    /// Handle a join request: resolve identity, supersede, insert, pair inline
    ///
    /// Returns immediately with the ticket identity; the pairing outcome is
    /// observed asynchronously via the event channel or `status`.
    pub async fn enqueue(&self, request: JoinQueueRequest) -> Result<EnqueueReceipt> {
        let start_time = Instant::now();

        let (participant, display_name, skill_rating) = self.resolve_identity(&request).await?;

        info!(
            "Processing join request - participant: {}, queue: {}, rating: {:?}",
            participant, request.queue_type, skill_rating
        );

        let now = current_timestamp();
        let ticket = Ticket::new(
            participant.clone(),
            request.queue_type,
            skill_rating,
            display_name.clone(),
            now,
            self.config.queue_config().search_timeout(),
        );
        let ticket_id = ticket.id;

        let mut match_event: Option<MatchFound> = None;
        let mut pairing_failure: Option<anyhow::Error> = None;
        let superseded;
        let searching_now;

        {
            // One transaction: supersede, insert, scan, claim, hand off.
            // Concurrent enqueues serialize here, which is what rules out
            // double-pairing and half-updated pairs.
            let mut table = self.store.lock().await;

            superseded = table.remove_searching(&participant).is_some();
            table.insert(ticket.clone());

            if let Some(candidate_id) = self.pairing_engine.select_candidate(&table, &ticket, now)
            {
                let candidate = table.get(&candidate_id).cloned().ok_or_else(|| {
                    MatchmakingError::InternalError {
                        message: format!("Selected candidate {} vanished", candidate_id),
                    }
                })?;

                let session_result = self.create_and_store_session(&candidate, &ticket).await;

                match session_result {
                    Ok(session) => {
                        table.mark_found(&candidate_id, participant.clone(), session.id, now)?;
                        table.mark_found(&ticket_id, candidate.participant.clone(), session.id, now)?;

                        self.metrics_collector
                            .observe_match_wait(request.queue_type, candidate.waited(now));

                        match_event = Some(MatchFound {
                            tickets: [candidate.id, ticket_id],
                            queue_type: request.queue_type,
                            session,
                            timestamp: now,
                        });
                    }
                    Err(e) => {
                        // The candidate was never touched and keeps searching;
                        // only the triggering ticket is marked.
                        if let Err(mark_err) = table.mark_error(&ticket_id, now) {
                            error!(
                                "Failed to mark ticket {} as errored: {}",
                                ticket_id, mark_err
                            );
                        }
                        pairing_failure = Some(e);
                    }
                }
            }

            searching_now = table.searching().count();
        }

        self.update_searching_gauges().await;

        if let Some(e) = pairing_failure {
            self.record_pairing_failure(&ticket, &e).await;
            return Err(e);
        }

        // Notifications go out after the transaction committed
        let queued_event = TicketQueued {
            ticket_id,
            participant: participant.clone(),
            queue_type: request.queue_type,
            display_name,
            timestamp: now,
        };
        self.event_publisher.publish_ticket_queued(queued_event).await?;

        let matched = match_event.is_some();
        if let Some(event) = match_event {
            self.record_match(&event);
            info!(
                "Match found - session: {}, tickets: {} + {}",
                event.session.id, event.tickets[0], event.tickets[1]
            );
            self.event_publisher.publish_match_found(event).await?;
        }

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire stats lock".to_string(),
                })?;
            stats.tickets_enqueued += 1;
            if superseded {
                stats.tickets_superseded += 1;
            }
            if matched {
                stats.sessions_created += 1;
            }
            stats.tickets_searching = searching_now;
        }

        self.metrics_collector.record_enqueue(
            request.queue_type,
            &participant,
            start_time.elapsed(),
        );
        if superseded {
            self.metrics_collector.record_supersession();
        }

        debug!(
            "Join request completed - participant: {}, ticket: {}, matched: {}, duration: {:.2}ms",
            participant,
            ticket_id,
            matched,
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        Ok(EnqueueReceipt {
            ticket_id,
            participant,
        })
    }

    /// Remove the caller's searching ticket, if any
    ///
    /// Not finding one is a no-op, not an error: the ticket may have just
    /// paired, timed out, or never existed. Callers should re-check status
    /// after a `false` return.
    pub async fn leave(&self, participant: &ParticipantRef) -> Result<bool> {
        let removed = {
            let mut table = self.store.lock().await;
            table.remove_searching(participant)
        };

        self.update_searching_gauges().await;

        match removed {
            Some(ticket) => {
                {
                    let mut stats =
                        self.stats
                            .write()
                            .map_err(|_| MatchmakingError::InternalError {
                                message: "Failed to acquire stats lock".to_string(),
                            })?;
                    stats.leaves += 1;
                    stats.tickets_searching = stats.tickets_searching.saturating_sub(1);
                }
                self.metrics_collector.record_leave(true);

                let event = TicketLeft {
                    ticket_id: ticket.id,
                    participant: participant.clone(),
                    queue_type: ticket.queue_type,
                    timestamp: current_timestamp(),
                };
                self.event_publisher.publish_ticket_left(event).await?;

                info!("Participant {} left the queue", participant);
                Ok(true)
            }
            None => {
                self.metrics_collector.record_leave(false);
                debug!("Leave for {} found no searching ticket", participant);
                Ok(false)
            }
        }
    }

    /// Read-only projection of the participant's most recent ticket
    pub async fn status(&self, participant: &ParticipantRef) -> Result<Option<TicketSnapshot>> {
        let table = self.store.lock().await;
        Ok(table.latest_for(participant).map(Ticket::snapshot))
    }

    /// Count of currently searching tickets in one queue
    ///
    /// Sweeps first so the count never includes stale entries.
    pub async fn pool_size(&self, queue_type: QueueType) -> Result<usize> {
        self.sweeper.sweep().await?;

        let count = {
            let table = self.store.lock().await;
            table.count_searching(queue_type)
        };

        self.metrics_collector.set_pool_size(queue_type, count);
        Ok(count)
    }

    /// Fetch a created session for post-match navigation
    pub async fn session(&self, id: SessionId) -> Result<Option<Session>> {
        self.session_sink.get_session(id).await
    }

    /// Get current manager statistics
    pub fn get_stats(&self) -> Result<QueueManagerStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }

    /// Resolve or fabricate the requester's identity
    ///
    /// Guests without an id get a fresh one; guests get their directory record
    /// upserted; registered accounts must resolve in the directory. The
    /// returned rating is `Some` exactly for ranked tickets.
    async fn resolve_identity(
        &self,
        request: &JoinQueueRequest,
    ) -> Result<(ParticipantRef, String, Option<i32>)> {
        let requested_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let (participant, display_name, profile_rating) = match &request.participant {
            None => {
                let guest_id = generate_guest_id();
                let display_name =
                    requested_name.unwrap_or_else(|| default_guest_name(&guest_id));
                self.directory.ensure_guest(&guest_id, &display_name).await?;
                (ParticipantRef::Guest(guest_id), display_name, None)
            }
            Some(ParticipantRef::Guest(guest_id)) => {
                if guest_id.trim().is_empty() {
                    return Err(MatchmakingError::InvalidJoinRequest {
                        reason: "Guest id cannot be empty".to_string(),
                    }
                    .into());
                }

                let stored_name = self.directory.guest_display_name(guest_id).await?;
                let display_name = requested_name
                    .or(stored_name)
                    .unwrap_or_else(|| default_guest_name(guest_id));
                self.directory.ensure_guest(guest_id, &display_name).await?;
                (
                    ParticipantRef::Guest(guest_id.clone()),
                    display_name,
                    None,
                )
            }
            Some(ParticipantRef::Registered(account_id)) => {
                if account_id.trim().is_empty() {
                    return Err(MatchmakingError::InvalidJoinRequest {
                        reason: "Account id cannot be empty".to_string(),
                    }
                    .into());
                }

                let profile = self
                    .directory
                    .resolve_registered(account_id)
                    .await?
                    .ok_or_else(|| MatchmakingError::UnknownParticipant {
                        participant: account_id.clone(),
                    })?;

                let display_name = requested_name.unwrap_or(profile.display_name);
                (
                    ParticipantRef::Registered(account_id.clone()),
                    display_name,
                    Some(profile.skill_rating),
                )
            }
        };

        let skill_rating = match request.queue_type {
            QueueType::Casual => None,
            QueueType::Ranked => Some(
                request
                    .skill_rating
                    .or(profile_rating)
                    .unwrap_or(self.config.matchmaking.default_skill_rating),
            ),
        };

        Ok((participant, display_name, skill_rating))
    }

    /// Build the session and push it to the sink before any ticket flips
    async fn create_and_store_session(
        &self,
        candidate: &Ticket,
        ticket: &Ticket,
    ) -> Result<Session> {
        let session = self.session_handoff.create_session(candidate, ticket).await?;
        self.session_sink.insert_session(session.clone()).await?;
        Ok(session)
    }

    /// Record the error outcome and notify the triggering participant
    async fn record_pairing_failure(&self, ticket: &Ticket, cause: &anyhow::Error) {
        error!(
            "Pairing failed for ticket {} ({}): {}",
            ticket.id, ticket.participant, cause
        );

        if let Ok(mut stats) = self.stats.write() {
            stats.pairing_errors += 1;
        }
        self.metrics_collector.record_pairing_error();

        let event = crate::types::SearchFailed {
            ticket_id: ticket.id,
            participant: ticket.participant.clone(),
            queue_type: ticket.queue_type,
            reason: cause.to_string(),
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.event_publisher.publish_search_failed(event).await {
            error!("Failed to publish search-failed event: {}", e);
        }
    }

    fn record_match(&self, event: &MatchFound) {
        self.metrics_collector.record_match(event.session.mode);
    }

    /// Refresh the per-queue searching gauges from the table
    async fn update_searching_gauges(&self) {
        let (casual, ranked) = {
            let table = self.store.lock().await;
            (
                table.count_searching(QueueType::Casual),
                table.count_searching(QueueType::Ranked),
            )
        };
        self.metrics_collector.set_pool_size(QueueType::Casual, casual);
        self.metrics_collector.set_pool_size(QueueType::Ranked, ranked);
    }
}
