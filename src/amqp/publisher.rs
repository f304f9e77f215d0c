//! AMQP event publisher for outbound events

use crate::amqp::messages::{
    MessageEnvelope, MessageUtils, SESSION_EVENTS_EXCHANGE, TICKET_EVENTS_EXCHANGE,
};
use crate::error::{MatchmakingError, Result};
use crate::types::*;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing matchmaking events
///
/// This is the client notification channel: subscribers learn asynchronously
/// that their ticket was queued, paired, expired, or failed.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a TicketQueued event
    async fn publish_ticket_queued(&self, event: TicketQueued) -> Result<()>;

    /// Publish a TicketLeft event
    async fn publish_ticket_left(&self, event: TicketLeft) -> Result<()>;

    /// Publish a MatchFound event
    async fn publish_match_found(&self, event: MatchFound) -> Result<()>;

    /// Publish a SearchTimedOut event
    async fn publish_search_timed_out(&self, event: SearchTimedOut) -> Result<()>;

    /// Publish a SearchFailed event
    async fn publish_search_failed(&self, event: SearchFailed) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
    pub publish_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
            publish_timeout_ms: 5000,
        }
    }
}

/// AMQP-based event publisher implementation
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
    published_messages: std::sync::Mutex<std::collections::HashSet<String>>, // For deduplication
}

impl AmqpEventPublisher {
    /// Create a new event publisher
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self {
            channel,
            config,
            published_messages: std::sync::Mutex::new(std::collections::HashSet::new()),
        };

        // Set up exchanges
        publisher.setup_exchanges().await?;

        Ok(publisher)
    }

    /// Set up AMQP exchanges for events
    async fn setup_exchanges(&self) -> Result<()> {
        // Declare ticket events exchange
        let args = ExchangeDeclareArguments::new(TICKET_EVENTS_EXCHANGE, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to declare ticket events exchange: {}", e),
            }
        })?;

        // Declare session events exchange
        let args = ExchangeDeclareArguments::new(SESSION_EVENTS_EXCHANGE, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to declare session events exchange: {}", e),
            }
        })?;

        info!("Successfully set up AMQP exchanges");
        Ok(())
    }

    /// Publish an event to the exchange it belongs on
    async fn publish_event(&self, event: MatchmakingEvent) -> Result<()> {
        let routing_key = MessageUtils::get_routing_key(&event).to_string();
        let exchange = match &event {
            MatchmakingEvent::MatchFound(_) => SESSION_EVENTS_EXCHANGE,
            _ => TICKET_EVENTS_EXCHANGE,
        };

        let envelope = MessageEnvelope::new(event, routing_key);
        self.publish_to_exchange(exchange, &envelope).await
    }

    /// Generic method to publish to an exchange with retry logic
    async fn publish_to_exchange<T>(
        &self,
        exchange: &str,
        envelope: &MessageEnvelope<T>,
    ) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
    {
        // Check for deduplication
        if self.config.enable_deduplication {
            let published_messages =
                self.published_messages
                    .lock()
                    .map_err(|_| MatchmakingError::InternalError {
                        message: "Failed to acquire published messages lock".to_string(),
                    })?;
            if published_messages.contains(&envelope.correlation_id) {
                debug!(
                    "Message {} already published, skipping",
                    envelope.correlation_id
                );
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(exchange, envelope).await {
                Ok(_) => {
                    if self.config.enable_deduplication {
                        let mut published_messages =
                            self.published_messages.lock().map_err(|_| {
                                MatchmakingError::InternalError {
                                    message: "Failed to acquire published messages lock"
                                        .to_string(),
                                }
                            })?;
                        published_messages.insert(envelope.correlation_id.clone());
                    }

                    debug!(
                        "Successfully published message {} to exchange {}",
                        envelope.correlation_id, exchange
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    /// Single publish attempt
    async fn try_publish<T>(&self, exchange: &str, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }

    /// Clear deduplication cache (useful for testing or memory management)
    pub fn clear_deduplication_cache(&self) {
        if let Ok(mut published_messages) = self.published_messages.lock() {
            published_messages.clear();
        }
    }

    /// Get number of cached message IDs (for monitoring)
    pub fn cached_message_count(&self) -> usize {
        self.published_messages
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_ticket_queued(&self, event: TicketQueued) -> Result<()> {
        self.publish_event(MatchmakingEvent::TicketQueued(event)).await
    }

    async fn publish_ticket_left(&self, event: TicketLeft) -> Result<()> {
        self.publish_event(MatchmakingEvent::TicketLeft(event)).await
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        self.publish_event(MatchmakingEvent::MatchFound(event)).await
    }

    async fn publish_search_timed_out(&self, event: SearchTimedOut) -> Result<()> {
        self.publish_event(MatchmakingEvent::SearchTimedOut(event)).await
    }

    async fn publish_search_failed(&self, event: SearchFailed) -> Result<()> {
        self.publish_event(MatchmakingEvent::SearchFailed(event)).await
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<String>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published event types (for testing)
    pub fn get_published_events(&self) -> Vec<String> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, event_type: &str) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event_type.to_string());
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_ticket_queued(&self, _event: TicketQueued) -> Result<()> {
        self.record("TicketQueued");
        Ok(())
    }

    async fn publish_ticket_left(&self, _event: TicketLeft) -> Result<()> {
        self.record("TicketLeft");
        Ok(())
    }

    async fn publish_match_found(&self, _event: MatchFound) -> Result<()> {
        self.record("MatchFound");
        Ok(())
    }

    async fn publish_search_timed_out(&self, _event: SearchTimedOut) -> Result<()> {
        self.record("SearchTimedOut");
        Ok(())
    }

    async fn publish_search_failed(&self, _event: SearchFailed) -> Result<()> {
        self.record("SearchFailed");
        Ok(())
    }
}
