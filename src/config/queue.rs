//! Queue and pairing configuration

use chrono::Duration;

/// Timing configuration for the queue store and sweeper
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a ticket may search before the sweeper expires it
    pub search_timeout_seconds: u64,
    /// How long terminal tickets are retained before hard deletion
    pub retention_seconds: u64,
    /// Interval of the periodic sweeper task
    pub sweep_interval_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            search_timeout_seconds: 120,
            retention_seconds: 3600,
            sweep_interval_seconds: 30,
        }
    }
}

impl QueueConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::seconds(self.search_timeout_seconds as i64)
    }

    pub fn retention(&self) -> Duration {
        Duration::seconds(self.retention_seconds as i64)
    }
}

/// Rating window for ranked pairing
///
/// The tolerated rating gap widens with how long a candidate has been waiting:
/// `min(cap, floor(seconds_waited) * points_per_second)`.
#[derive(Debug, Clone)]
pub struct RatingWindow {
    pub points_per_second: i64,
    pub cap: i64,
    /// Neutral rating assumed for ranked tickets that never resolved one
    pub default_rating: i32,
}

impl Default for RatingWindow {
    fn default() -> Self {
        Self {
            points_per_second: 10,
            cap: 300,
            default_rating: 1000,
        }
    }
}

impl RatingWindow {
    /// Tolerated rating gap for a candidate that has waited `waited`
    pub fn tolerance_for_wait(&self, waited: Duration) -> i64 {
        let seconds = waited.num_seconds().max(0);
        (seconds * self.points_per_second).min(self.cap)
    }
}
