//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique ticket ID
pub fn generate_ticket_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a fresh guest identifier
pub fn generate_guest_id() -> String {
    Uuid::new_v4().to_string()
}

/// Derive a presentable default display name from a guest identifier
pub fn default_guest_name(guest_id: &str) -> String {
    let short: String = guest_id.chars().take(8).collect();
    format!("Guest-{}", short)
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: i32, rating2: i32) -> i64 {
    (i64::from(rating1) - i64::from(rating2)).abs()
}
