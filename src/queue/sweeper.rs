//! Expiry sweeping for stale and ancient tickets
//!
//! The sweeper reclassifies searching tickets that outlived their deadline and
//! hard-deletes terminal tickets past the retention bound. It is stateless,
//! idempotent and safe to invoke from anywhere: the service runs it on a
//! periodic task, and pool-size queries run it inline so counts never include
//! stale entries.

use crate::amqp::publisher::EventPublisher;
use crate::config::queue::QueueConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::queue::store::QueueStore;
use crate::types::SearchTimedOut;
use crate::utils::current_timestamp;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info};

/// Result of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Searching tickets transitioned to timeout
    pub timed_out: usize,
    /// Terminal tickets hard-deleted past retention
    pub purged: usize,
}

/// Maintenance routine over the queue store
pub struct ExpirySweeper {
    store: Arc<QueueStore>,
    event_publisher: Arc<dyn EventPublisher>,
    metrics_collector: Arc<MetricsCollector>,
    config: QueueConfig,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<QueueStore>,
        event_publisher: Arc<dyn EventPublisher>,
        metrics_collector: Arc<MetricsCollector>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            event_publisher,
            metrics_collector,
            config,
        }
    }

    /// Run one sweep pass
    ///
    /// Expiry and purge happen inside a single table transaction; timeout
    /// events are published after the lock is released.
    pub async fn sweep(&self) -> Result<SweepOutcome> {
        let start = Instant::now();
        let now = current_timestamp();

        let (expired, purged) = {
            let mut table = self.store.lock().await;
            let expired = table.expire_due(now);
            let purged = table.purge_terminal_before(now - self.config.retention());
            (expired, purged)
        };

        for ticket in &expired {
            self.metrics_collector.record_timeout(ticket.queue_type);

            let event = SearchTimedOut {
                ticket_id: ticket.id,
                participant: ticket.participant.clone(),
                queue_type: ticket.queue_type,
                waited_seconds: ticket.waited(now).num_seconds(),
                timestamp: now,
            };
            if let Err(e) = self.event_publisher.publish_search_timed_out(event).await {
                error!(
                    "Failed to publish timeout event for ticket {}: {}",
                    ticket.id, e
                );
            }
        }

        let outcome = SweepOutcome {
            timed_out: expired.len(),
            purged,
        };

        self.metrics_collector.record_sweep(
            outcome.timed_out,
            outcome.purged,
            start.elapsed(),
        );

        if outcome.timed_out > 0 || outcome.purged > 0 {
            info!(
                "Sweep completed - timed_out: {}, purged: {}",
                outcome.timed_out, outcome.purged
            );
        } else {
            debug!("Sweep completed - nothing to do");
        }

        Ok(outcome)
    }

    /// Start the periodic sweep task
    pub fn start_task(self: Arc<Self>) -> JoinHandle<()> {
        let sweeper = Arc::clone(&self);
        let sweep_interval = Duration::from_secs(self.config.sweep_interval_seconds);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);

            loop {
                ticker.tick().await;

                if let Err(e) = sweeper.sweep().await {
                    error!("Error during expiry sweep: {}", e);
                }
            }
        });

        info!(
            "Started expiry sweeper task ({}s interval)",
            self.config.sweep_interval_seconds
        );
        handle
    }
}
