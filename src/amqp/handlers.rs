//! AMQP message handlers for processing matchmaking commands
//!
//! This module provides the message handling infrastructure for the
//! matchmaking service: command consumption, dispatch to the queue manager,
//! and error handling.

use crate::amqp::messages::MessageUtils;
use crate::error::{MatchmakingError, Result};
use crate::types::{JoinQueueRequest, LeaveQueueRequest, MatchmakingCommand};
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Trait defining the interface for handling matchmaking commands
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a join request from a client
    async fn handle_join(&self, request: JoinQueueRequest) -> Result<()>;

    /// Handle a leave request from a client
    async fn handle_leave(&self, request: LeaveQueueRequest) -> Result<()>;

    /// Handle processing errors
    async fn handle_error(&self, error: MatchmakingError, message_data: &[u8]);
}

/// Consumer for matchmaking command messages
pub struct CommandConsumer {
    handler: Arc<dyn MessageHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl CommandConsumer {
    /// Create a new command consumer
    pub fn new(handler: Arc<dyn MessageHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("command-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(CommandDispatcher::new(self.handler.clone()), args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming commands from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming commands");
        Ok(())
    }
}

/// Internal consumer implementation
struct CommandDispatcher {
    handler: Arc<dyn MessageHandler>,
}

impl CommandDispatcher {
    fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler }
    }

    /// Process an incoming message
    async fn process_message(&self, content: &[u8]) -> Result<()> {
        let command = MessageUtils::deserialize_command(content)?;

        match command {
            MatchmakingCommand::JoinQueue(request) => {
                info!(
                    "Join command parsed - participant: {:?}, queue: {}",
                    request.participant, request.queue_type
                );
                self.handler.handle_join(request).await
            }
            MatchmakingCommand::LeaveQueue(request) => {
                info!("Leave command parsed - participant: {}", request.participant);
                self.handler.handle_leave(request).await
            }
        }
    }
}

#[async_trait]
impl AsyncConsumer for CommandDispatcher {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        let routing_key = deliver.routing_key();

        info!(
            "AMQP message received - delivery_tag: {}, routing_key: '{}', size: {} bytes",
            delivery_tag,
            routing_key,
            content.len()
        );

        let start_time = std::time::Instant::now();

        match self.process_message(&content).await {
            Ok(_) => {
                info!(
                    "Command processed successfully - delivery_tag: {}, processing_time: {:.2}ms",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                error!(
                    "Command processing failed - delivery_tag: {}, processing_time: {:.2}ms, error: {}",
                    delivery_tag,
                    start_time.elapsed().as_secs_f64() * 1000.0,
                    e
                );
                self.handler
                    .handle_error(
                        MatchmakingError::InternalError {
                            message: e.to_string(),
                        },
                        &content,
                    )
                    .await;
            }
        }
    }
}

/// Mock message handler for testing
pub struct MockMessageHandler {
    pub received_joins: Arc<tokio::sync::Mutex<Vec<JoinQueueRequest>>>,
    pub received_leaves: Arc<tokio::sync::Mutex<Vec<LeaveQueueRequest>>>,
}

impl Default for MockMessageHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessageHandler {
    pub fn new() -> Self {
        Self {
            received_joins: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            received_leaves: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl MessageHandler for MockMessageHandler {
    async fn handle_join(&self, request: JoinQueueRequest) -> Result<()> {
        let mut joins = self.received_joins.lock().await;
        joins.push(request);
        Ok(())
    }

    async fn handle_leave(&self, request: LeaveQueueRequest) -> Result<()> {
        let mut leaves = self.received_leaves.lock().await;
        leaves.push(request);
        Ok(())
    }

    async fn handle_error(&self, error: MatchmakingError, _message_data: &[u8]) {
        eprintln!("Mock handler received error: {}", error);
    }
}
