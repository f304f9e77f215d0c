//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the double-feature matchmaking
//! service using Prometheus metrics.

use crate::queue::manager::QueueManagerStats;
use crate::types::{GameMode, ParticipantRef, QueueType};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Pairing and session metrics
    match_metrics: MatchMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total AMQP messages processed
    pub amqp_messages_total: IntCounterVec,

    /// AMQP message processing errors
    pub amqp_errors_total: IntCounter,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total tickets enqueued, by queue and identity space
    pub tickets_enqueued_total: IntCounterVec,

    /// Tickets currently searching, by queue
    pub tickets_searching: IntGaugeVec,

    /// Tickets currently searching across all queues
    pub tickets_searching_total: IntGauge,

    /// Tickets replaced by a newer enqueue from the same participant
    pub tickets_superseded_total: IntCounter,

    /// Voluntary leave calls, by whether a ticket was removed
    pub leaves_total: IntCounterVec,

    /// Tickets expired by the sweeper, by queue
    pub tickets_timed_out_total: IntCounterVec,

    /// Terminal tickets hard-deleted past retention
    pub tickets_purged_total: IntCounter,
}

/// Pairing and session metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Sessions created, by mode tag
    pub sessions_created_total: IntCounterVec,

    /// Wait time of the longer-waiting side at match time
    pub match_wait_time_seconds: HistogramVec,

    /// Pairing attempts that ended with an error ticket
    pub pairing_errors_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Enqueue request processing time
    pub enqueue_duration_seconds: Histogram,

    /// Sweep pass duration
    pub sweep_duration_seconds: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get match metrics
    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record an enqueue being processed
    pub fn record_enqueue(
        &self,
        queue_type: QueueType,
        participant: &ParticipantRef,
        duration: Duration,
    ) {
        self.queue_metrics
            .tickets_enqueued_total
            .with_label_values(&[queue_label(queue_type), identity_label(participant)])
            .inc();

        self.performance_metrics
            .enqueue_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a searching ticket being superseded by a newer one
    pub fn record_supersession(&self) {
        self.queue_metrics.tickets_superseded_total.inc();
    }

    /// Record a voluntary leave call
    pub fn record_leave(&self, removed: bool) {
        let outcome = if removed { "removed" } else { "not_found" };
        self.queue_metrics
            .leaves_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a ticket expiring
    pub fn record_timeout(&self, queue_type: QueueType) {
        self.queue_metrics
            .tickets_timed_out_total
            .with_label_values(&[queue_label(queue_type)])
            .inc();
    }

    /// Record the outcome of one sweep pass
    pub fn record_sweep(&self, _timed_out: usize, purged: usize, duration: Duration) {
        self.queue_metrics
            .tickets_purged_total
            .inc_by(purged as u64);
        self.performance_metrics
            .sweep_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a session being created out of a pair
    pub fn record_match(&self, mode: GameMode) {
        self.match_metrics
            .sessions_created_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Observe the longer-waiting side's wait at match time
    pub fn observe_match_wait(&self, queue_type: QueueType, waited: chrono::Duration) {
        let seconds = waited.num_milliseconds().max(0) as f64 / 1000.0;
        self.match_metrics
            .match_wait_time_seconds
            .with_label_values(&[queue_label(queue_type)])
            .observe(seconds);
    }

    /// Record a pairing failure
    pub fn record_pairing_error(&self) {
        self.match_metrics.pairing_errors_total.inc();
    }

    /// Update the per-queue searching gauge
    pub fn set_pool_size(&self, queue_type: QueueType, count: usize) {
        self.queue_metrics
            .tickets_searching
            .with_label_values(&[queue_label(queue_type)])
            .set(count as i64);
    }

    /// Update gauges from queue manager stats
    pub fn update_from_queue_stats(&self, stats: &QueueManagerStats) {
        self.queue_metrics
            .tickets_searching_total
            .set(stats.tickets_searching as i64);
    }

    /// Update overall health status gauge
    pub fn update_health_status(&self, status: i64) {
        self.service_metrics.health_status.set(status);
    }

    /// Update a component health gauge
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(if healthy { 1 } else { 0 });
    }

    /// Record an AMQP message outcome
    pub fn record_amqp_message(&self, message_type: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[message_type, outcome])
            .inc();
        if !success {
            self.service_metrics.amqp_errors_total.inc();
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

fn queue_label(queue_type: QueueType) -> &'static str {
    match queue_type {
        QueueType::Casual => "casual",
        QueueType::Ranked => "ranked",
    }
}

fn identity_label(participant: &ParticipantRef) -> &'static str {
    if participant.is_guest() {
        "guest"
    } else {
        "registered"
    }
}

fn mode_label(mode: GameMode) -> &'static str {
    match mode {
        GameMode::Online => "online",
        GameMode::Ranked => "ranked",
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new(
            "matchmaking_uptime_seconds",
            "Service uptime in seconds",
        )?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "matchmaking_amqp_messages_total",
                "Total AMQP messages processed",
            ),
            &["type", "outcome"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounter::new(
            "matchmaking_amqp_errors_total",
            "Total AMQP message processing errors",
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "matchmaking_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new(
                "matchmaking_component_health",
                "Per-component health (0=unhealthy, 1=healthy)",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tickets_enqueued_total = IntCounterVec::new(
            Opts::new(
                "matchmaking_tickets_enqueued_total",
                "Total tickets enqueued",
            ),
            &["queue_type", "identity"],
        )?;
        registry.register(Box::new(tickets_enqueued_total.clone()))?;

        let tickets_searching = IntGaugeVec::new(
            Opts::new(
                "matchmaking_tickets_searching",
                "Tickets currently searching",
            ),
            &["queue_type"],
        )?;
        registry.register(Box::new(tickets_searching.clone()))?;

        let tickets_searching_total = IntGauge::new(
            "matchmaking_tickets_searching_total",
            "Tickets currently searching across all queues",
        )?;
        registry.register(Box::new(tickets_searching_total.clone()))?;

        let tickets_superseded_total = IntCounter::new(
            "matchmaking_tickets_superseded_total",
            "Tickets replaced by a newer enqueue from the same participant",
        )?;
        registry.register(Box::new(tickets_superseded_total.clone()))?;

        let leaves_total = IntCounterVec::new(
            Opts::new("matchmaking_leaves_total", "Voluntary leave calls"),
            &["outcome"],
        )?;
        registry.register(Box::new(leaves_total.clone()))?;

        let tickets_timed_out_total = IntCounterVec::new(
            Opts::new(
                "matchmaking_tickets_timed_out_total",
                "Tickets expired by the sweeper",
            ),
            &["queue_type"],
        )?;
        registry.register(Box::new(tickets_timed_out_total.clone()))?;

        let tickets_purged_total = IntCounter::new(
            "matchmaking_tickets_purged_total",
            "Terminal tickets hard-deleted past retention",
        )?;
        registry.register(Box::new(tickets_purged_total.clone()))?;

        Ok(Self {
            tickets_enqueued_total,
            tickets_searching,
            tickets_searching_total,
            tickets_superseded_total,
            leaves_total,
            tickets_timed_out_total,
            tickets_purged_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_created_total = IntCounterVec::new(
            Opts::new(
                "matchmaking_sessions_created_total",
                "Sessions created from paired tickets",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let match_wait_time_seconds = HistogramVec::new(
            HistogramOpts::new(
                "matchmaking_match_wait_time_seconds",
                "Wait time of the longer-waiting side at match time",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 90.0, 120.0]),
            &["queue_type"],
        )?;
        registry.register(Box::new(match_wait_time_seconds.clone()))?;

        let pairing_errors_total = IntCounter::new(
            "matchmaking_pairing_errors_total",
            "Pairing attempts that ended with an error ticket",
        )?;
        registry.register(Box::new(pairing_errors_total.clone()))?;

        Ok(Self {
            sessions_created_total,
            match_wait_time_seconds,
            pairing_errors_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let enqueue_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "matchmaking_enqueue_duration_seconds",
                "Enqueue request processing time",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1]),
        )?;
        registry.register(Box::new(enqueue_duration_seconds.clone()))?;

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "matchmaking_sweep_duration_seconds",
                "Sweep pass duration",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1]),
        )?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        Ok(Self {
            enqueue_duration_seconds,
            sweep_duration_seconds,
        })
    }
}
