//! Main application state and service coordination
//!
//! This module contains the production AppState that coordinates all
//! service components, AMQP connections, and background tasks.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::{CommandConsumer, MessageHandler};
use crate::amqp::publisher::{AmqpEventPublisher, PublisherConfig};
use crate::config::AppConfig;
use crate::directory::provider::InMemoryDirectory;
use crate::error::{MatchmakingError, Result as MatchmakingResult};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::queue::manager::QueueManager;
use crate::queue::store::QueueStore;
use crate::session::store::InMemorySessionStore;
use crate::types::{JoinQueueRequest, LeaveQueueRequest};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Production message handler that integrates with the queue manager
struct ProductionMessageHandler {
    queue_manager: Arc<QueueManager>,
    metrics_collector: Arc<MetricsCollector>,
}

impl ProductionMessageHandler {
    fn new(queue_manager: Arc<QueueManager>, metrics_collector: Arc<MetricsCollector>) -> Self {
        Self {
            queue_manager,
            metrics_collector,
        }
    }
}

#[async_trait]
impl MessageHandler for ProductionMessageHandler {
    async fn handle_join(&self, request: JoinQueueRequest) -> MatchmakingResult<()> {
        let start_time = std::time::Instant::now();

        info!(
            "Processing join command - participant: {:?}, queue: {}",
            request.participant, request.queue_type
        );

        match self.queue_manager.enqueue(request).await {
            Ok(receipt) => {
                self.metrics_collector.record_amqp_message("join", true);
                info!(
                    "Join command processed - participant: {}, ticket: {}, time: {:.2}ms",
                    receipt.participant,
                    receipt.ticket_id,
                    start_time.elapsed().as_secs_f64() * 1000.0
                );
                Ok(())
            }
            Err(e) => {
                self.metrics_collector.record_amqp_message("join", false);
                error!(
                    "Join command failed - time: {:.2}ms, error: {}",
                    start_time.elapsed().as_secs_f64() * 1000.0,
                    e
                );
                Err(e)
            }
        }
    }

    async fn handle_leave(&self, request: LeaveQueueRequest) -> MatchmakingResult<()> {
        match self.queue_manager.leave(&request.participant).await {
            Ok(removed) => {
                self.metrics_collector.record_amqp_message("leave", true);
                info!(
                    "Leave command processed - participant: {}, removed: {}",
                    request.participant, removed
                );
                Ok(())
            }
            Err(e) => {
                self.metrics_collector.record_amqp_message("leave", false);
                error!(
                    "Leave command failed - participant: {}, error: {}",
                    request.participant, e
                );
                Err(e)
            }
        }
    }

    async fn handle_error(&self, error: MatchmakingError, message_data: &[u8]) {
        error!(
            "Message handler error - type: '{}', message_size: {} bytes",
            error,
            message_data.len()
        );

        // Log a short preview of the message for debugging (safely)
        if !message_data.is_empty() {
            let preview_len = std::cmp::min(100, message_data.len());
            let preview = String::from_utf8_lossy(&message_data[..preview_len]);
            error!("Message preview: {:?}", preview);
        }
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking component
    queue_manager: Arc<QueueManager>,

    /// AMQP connection for message handling
    amqp_connection: Arc<AmqpConnection>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// AMQP consumer for matchmaking commands
    command_consumer: Option<CommandConsumer>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing double-feature matchmaking service");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name, config.amqp.url
        );

        // Initialize AMQP connection
        let amqp_connection = Self::initialize_amqp(&config).await?;

        // Initialize metrics service
        let metrics_service = Self::initialize_metrics(&config).await?;

        // Initialize the matchmaking system with metrics
        let queue_manager = Self::initialize_matchmaking_system(
            &config,
            amqp_connection.clone(),
            metrics_service.collector(),
        )
        .await?;

        Ok(Self {
            config,
            queue_manager,
            amqp_connection,
            metrics_service,
            background_tasks: Vec::new(),
            command_consumer: None,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start all background services and message consumption
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting double-feature matchmaking service");

        // Mark as running
        *self.is_running.write().await = true;

        // Start metrics service first
        self.start_metrics_service().await?;

        // Start AMQP command consumption
        self.start_amqp_consumption().await?;

        // Start background tasks
        self.start_background_tasks().await?;

        info!("✅ Double-feature matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of double-feature service");

        // Mark as not running
        *self.is_running.write().await = false;

        // Stop AMQP command consumption
        if let Some(consumer) = &self.command_consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            } else {
                info!("✅ AMQP command consumption stopped");
            }
        }

        // Stop background tasks
        self.stop_background_tasks().await;

        // Stop metrics service
        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        // Get final statistics
        let final_stats =
            self.queue_manager
                .get_stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Double-feature service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get queue manager for operations
    pub fn queue_manager(&self) -> Arc<QueueManager> {
        self.queue_manager.clone()
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Get AMQP connection for health checks
    pub fn amqp_connection(&self) -> Arc<AmqpConnection> {
        self.amqp_connection.clone()
    }

    /// Initialize metrics service
    async fn initialize_metrics(config: &AppConfig) -> Result<Arc<MetricsService>, ServiceError> {
        info!(
            "Initializing metrics service on port {}",
            config.service.metrics_port
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let health_config = HealthServerConfig {
            port: config.service.metrics_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server = Arc::new(HealthServer::new(health_config, metrics_collector.clone()));
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(metrics_service)
    }

    /// Start metrics service
    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.metrics_port;

        // Spawn the metrics service as a background task
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.push(metrics_handle);

        // Give the server a moment to start up
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Initialize AMQP connection with retry logic
    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", config.amqp.url);

        let mut amqp_config = AmqpConfig::from_url(&config.amqp.url);
        amqp_config.max_retries = config.amqp.max_retry_attempts;
        amqp_config.retry_delay_ms = config.amqp.retry_delay_ms;
        amqp_config.connection_timeout_ms = config.amqp.connection_timeout_seconds * 1000;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?;

        Ok(Arc::new(connection))
    }

    /// Initialize the complete matchmaking system
    async fn initialize_matchmaking_system(
        config: &AppConfig,
        amqp_connection: Arc<AmqpConnection>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Arc<QueueManager>, ServiceError> {
        info!("Initializing matchmaking system components");

        // Get a channel from the connection
        let channel = amqp_connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to open AMQP channel: {}", e),
            })?;

        // Initialize event publisher
        let publisher_config = PublisherConfig {
            max_retries: config.amqp.max_retry_attempts,
            retry_delay_ms: config.amqp.retry_delay_ms,
            ..PublisherConfig::default()
        };
        let event_publisher = Arc::new(
            AmqpEventPublisher::new(channel, publisher_config)
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to initialize event publisher: {}", e),
                })?,
        );

        // Initialize collaborators and the queue system
        let store = Arc::new(QueueStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let session_sink = Arc::new(InMemorySessionStore::new());

        let queue_manager = QueueManager::with_metrics(
            store,
            directory,
            session_sink,
            event_publisher,
            config.clone(),
            metrics_collector,
        );

        Ok(Arc::new(queue_manager))
    }

    /// Start AMQP command consumption
    async fn start_amqp_consumption(&mut self) -> Result<(), ServiceError> {
        info!("Starting AMQP command consumption...");

        let queue_name = self.config.amqp.command_queue.clone();

        // Get a channel for consuming messages
        let channel = self
            .amqp_connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open consumer channel: {}", e),
            })?;

        // Declare the queue to ensure it exists
        info!("Declaring queue: '{}'...", queue_name);
        let queue_declare_args = amqprs::channel::QueueDeclareArguments::new(&queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();

        channel
            .queue_declare(queue_declare_args)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;

        // Create message handler and consumer
        let message_handler = Arc::new(ProductionMessageHandler::new(
            self.queue_manager.clone(),
            self.metrics_service.collector(),
        ));
        let consumer = CommandConsumer::new(message_handler, channel);

        consumer
            .start_consuming(&queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming commands: {}", e),
            })?;

        self.command_consumer = Some(consumer);

        info!(
            "AMQP command consumption started on queue: '{}'",
            queue_name
        );
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        // Expiry sweeper task; pool-size queries also sweep inline, this task
        // covers idle periods so stale tickets still expire
        let sweeper_task = self.queue_manager.sweeper().start_task();

        // Metrics update task
        info!("Starting queue metrics update task (30s interval)...");
        let metrics_task = {
            let queue_manager = self.queue_manager.clone();
            let metrics_collector = self.metrics_service.collector();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                info!("Metrics update task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match queue_manager.get_stats() {
                        Ok(stats) => {
                            debug!(
                                "Updating metrics - searching: {}, sessions: {}",
                                stats.tickets_searching, stats.sessions_created
                            );
                            metrics_collector.update_from_queue_stats(&stats);
                        }
                        Err(e) => {
                            warn!("Failed to get queue stats for metrics update: {}", e);
                        }
                    }
                }

                info!("Metrics update task stopped");
            })
        };

        // Service health metrics task
        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let metrics_collector = self.metrics_service.collector();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                let start_time = tokio::time::Instant::now();
                info!("Health metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let uptime_seconds = start_time.elapsed().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    debug!(
                        "Updated service health metrics - uptime: {}s",
                        uptime_seconds
                    );

                    metrics_collector.update_health_status(2); // 2 = healthy
                    metrics_collector.update_component_health("amqp", true);
                    metrics_collector.update_component_health("queue_manager", true);
                    metrics_collector.update_component_health("metrics", true);
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(sweeper_task);
        self.background_tasks.push(metrics_task);
        self.background_tasks.push(health_metrics_task);

        info!("3 background maintenance tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        // Give tasks time to clean up gracefully
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}
