//! Candidate selection for pairing tickets
//!
//! Given a freshly inserted ticket, the pairing engine scans the queue table
//! for a compatible counterpart. Selection is strictly FIFO within the
//! compatibility class so the longest-waiting compatible ticket always wins.
//! The engine itself is pure; atomicity of the claim comes from the caller
//! holding the store lock across selection and the subsequent updates.

use crate::config::queue::RatingWindow;
use crate::queue::store::QueueTable;
use crate::types::{QueueType, Ticket, TicketId};
use chrono::{DateTime, Utc};

/// Trait for pairing candidate selection
pub trait PairingEngine: Send + Sync {
    /// Pick the counterpart for `ticket` among the table's searching tickets,
    /// or `None` if nothing is compatible right now
    fn select_candidate(
        &self,
        table: &QueueTable,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> Option<TicketId>;
}

/// FIFO pairing with a wait-widening rating window for ranked queues
///
/// Casual tickets are compatible with any other casual ticket. Ranked tickets
/// additionally require the rating gap to fit inside a window that grows with
/// how long the *candidate* has been waiting, so long-waiting players see
/// progressively looser matches rather than starving.
#[derive(Debug)]
pub struct FifoPairingEngine {
    window: RatingWindow,
}

impl FifoPairingEngine {
    pub fn new(window: RatingWindow) -> Self {
        Self { window }
    }

    /// Effective rating of a ranked ticket, falling back to the neutral default
    fn effective_rating(&self, ticket: &Ticket) -> i32 {
        ticket.skill_rating.unwrap_or(self.window.default_rating)
    }

    fn is_compatible(&self, ticket: &Ticket, candidate: &Ticket, now: DateTime<Utc>) -> bool {
        if candidate.id == ticket.id
            || candidate.queue_type != ticket.queue_type
            || candidate.participant == ticket.participant
            || candidate.paired_with.is_some()
        {
            return false;
        }

        match ticket.queue_type {
            QueueType::Casual => true,
            QueueType::Ranked => {
                let gap = crate::utils::rating_difference(
                    self.effective_rating(ticket),
                    self.effective_rating(candidate),
                );
                gap <= self.window.tolerance_for_wait(candidate.waited(now))
            }
        }
    }
}

impl Default for FifoPairingEngine {
    fn default() -> Self {
        Self::new(RatingWindow::default())
    }
}

impl PairingEngine for FifoPairingEngine {
    fn select_candidate(
        &self,
        table: &QueueTable,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> Option<TicketId> {
        table
            .searching()
            .filter(|candidate| self.is_compatible(ticket, candidate, now))
            .min_by_key(|candidate| (candidate.joined_at, candidate.seq))
            .map(|candidate| candidate.id)
    }
}
