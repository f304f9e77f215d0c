//! Durable store of matchmaking tickets
//!
//! The table of outstanding tickets is the only shared mutable resource in the
//! service. All mutations happen through a guard obtained from
//! [`QueueStore::lock`]; holding the guard across a whole
//! scan-claim-create-update sequence is what makes pairing transactional, so
//! concurrent enqueues serialize instead of racing for the same candidate.

use crate::error::{MatchmakingError, Result};
use crate::types::{ParticipantRef, QueueType, SessionId, Ticket, TicketId, TicketStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

/// The shared ticket table behind its transaction lock
#[derive(Debug, Default)]
pub struct QueueStore {
    table: Mutex<QueueTable>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the table for a read-modify-write transaction
    ///
    /// Everything done through the returned guard commits together from the
    /// point of view of other callers; there is no partially visible state.
    pub async fn lock(&self) -> MutexGuard<'_, QueueTable> {
        self.table.lock().await
    }
}

/// The ticket table itself; only reachable through the store's lock
#[derive(Debug, Default)]
pub struct QueueTable {
    tickets: HashMap<TicketId, Ticket>,
    next_seq: u64,
}

impl QueueTable {
    /// Insert a ticket, assigning its insertion sequence number
    pub fn insert(&mut self, mut ticket: Ticket) -> TicketId {
        ticket.seq = self.next_seq;
        self.next_seq += 1;

        let id = ticket.id;
        self.tickets.insert(id, ticket);
        id
    }

    pub fn get(&self, id: &TicketId) -> Option<&Ticket> {
        self.tickets.get(id)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Remove the participant's searching ticket, if any
    ///
    /// Used both for supersession before a new insert and for voluntary leave.
    /// Terminal tickets are never touched, so a leave racing a just-committed
    /// pairing simply finds nothing.
    pub fn remove_searching(&mut self, participant: &ParticipantRef) -> Option<Ticket> {
        let id = self
            .tickets
            .values()
            .find(|t| t.status == TicketStatus::Searching && &t.participant == participant)
            .map(|t| t.id)?;
        self.tickets.remove(&id)
    }

    /// The most recent ticket for a participant, searching or terminal
    pub fn latest_for(&self, participant: &ParticipantRef) -> Option<&Ticket> {
        self.tickets
            .values()
            .filter(|t| &t.participant == participant)
            .max_by_key(|t| (t.joined_at, t.seq))
    }

    /// All searching tickets, in no particular order
    pub fn searching(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets
            .values()
            .filter(|t| t.status == TicketStatus::Searching)
    }

    /// Count of searching tickets in one queue
    pub fn count_searching(&self, queue_type: QueueType) -> usize {
        self.searching()
            .filter(|t| t.queue_type == queue_type)
            .count()
    }

    /// Transition a searching ticket to found, recording its counterpart and session
    pub fn mark_found(
        &mut self,
        id: &TicketId,
        paired_with: ParticipantRef,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ticket = self.require_searching_mut(id)?;
        ticket.status = TicketStatus::Found;
        ticket.paired_with = Some(paired_with);
        ticket.session_id = Some(session_id);
        ticket.updated_at = now;
        Ok(())
    }

    /// Transition a searching ticket to error after a pairing failure
    pub fn mark_error(&mut self, id: &TicketId, now: DateTime<Utc>) -> Result<()> {
        let ticket = self.require_searching_mut(id)?;
        ticket.status = TicketStatus::Error;
        ticket.updated_at = now;
        Ok(())
    }

    /// Expire searching tickets whose deadline has passed
    ///
    /// Returns clones of the affected tickets so callers can notify after
    /// releasing the lock.
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<Ticket> {
        let mut expired = Vec::new();
        for ticket in self.tickets.values_mut() {
            if ticket.status == TicketStatus::Searching && ticket.expires_at <= now {
                ticket.status = TicketStatus::Timeout;
                ticket.updated_at = now;
                expired.push(ticket.clone());
            }
        }
        expired
    }

    /// Hard-delete terminal tickets last touched before the retention cutoff
    pub fn purge_terminal_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tickets.len();
        self.tickets
            .retain(|_, t| !(t.status.is_terminal() && t.updated_at < cutoff));
        before - self.tickets.len()
    }

    fn require_searching_mut(&mut self, id: &TicketId) -> Result<&mut Ticket> {
        let ticket = self
            .tickets
            .get_mut(id)
            .ok_or_else(|| MatchmakingError::InternalError {
                message: format!("Ticket {} not found in queue table", id),
            })?;

        if ticket.status != TicketStatus::Searching {
            return Err(MatchmakingError::TicketStateConflict {
                ticket_id: id.to_string(),
                status: ticket.status.to_string(),
            }
            .into());
        }

        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;
    use chrono::Duration;

    fn searching_ticket(participant: &str, queue_type: QueueType) -> Ticket {
        Ticket::new(
            ParticipantRef::Guest(participant.to_string()),
            queue_type,
            None,
            participant.to_string(),
            current_timestamp(),
            Duration::seconds(120),
        )
    }

    #[test]
    fn test_insert_assigns_increasing_seq() {
        let mut table = QueueTable::default();

        let a = table.insert(searching_ticket("a", QueueType::Casual));
        let b = table.insert(searching_ticket("b", QueueType::Casual));

        assert!(table.get(&a).unwrap().seq < table.get(&b).unwrap().seq);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_searching_only_touches_searching_rows() {
        let mut table = QueueTable::default();
        let now = current_timestamp();
        let participant = ParticipantRef::Guest("a".to_string());

        let id = table.insert(searching_ticket("a", QueueType::Casual));
        table
            .mark_found(
                &id,
                ParticipantRef::Guest("b".to_string()),
                uuid::Uuid::new_v4(),
                now,
            )
            .unwrap();

        // The found ticket must survive a leave
        assert!(table.remove_searching(&participant).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_latest_for_prefers_newest_ticket() {
        let mut table = QueueTable::default();
        let participant = ParticipantRef::Guest("a".to_string());

        let mut old = searching_ticket("a", QueueType::Casual);
        old.joined_at = old.joined_at - Duration::seconds(300);
        old.status = TicketStatus::Timeout;
        table.insert(old);

        let new_id = table.insert(searching_ticket("a", QueueType::Ranked));

        assert_eq!(table.latest_for(&participant).unwrap().id, new_id);
    }

    #[test]
    fn test_mark_found_rejects_terminal_tickets() {
        let mut table = QueueTable::default();
        let now = current_timestamp();
        let session_id = uuid::Uuid::new_v4();

        let id = table.insert(searching_ticket("a", QueueType::Casual));
        table
            .mark_found(&id, ParticipantRef::Guest("b".to_string()), session_id, now)
            .unwrap();

        // A second transition attempt must fail, never silently re-pair
        let err = table
            .mark_found(&id, ParticipantRef::Guest("c".to_string()), session_id, now)
            .unwrap_err();
        assert!(err.to_string().contains("found"));
    }

    #[test]
    fn test_expire_due_transitions_only_overdue_tickets() {
        let mut table = QueueTable::default();
        let now = current_timestamp();

        let mut stale = searching_ticket("a", QueueType::Casual);
        stale.expires_at = now - Duration::seconds(1);
        let stale_id = table.insert(stale);

        let fresh_id = table.insert(searching_ticket("b", QueueType::Casual));

        let expired = table.expire_due(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale_id);
        assert_eq!(table.get(&stale_id).unwrap().status, TicketStatus::Timeout);
        assert_eq!(
            table.get(&fresh_id).unwrap().status,
            TicketStatus::Searching
        );
    }

    #[test]
    fn test_purge_only_removes_old_terminal_tickets() {
        let mut table = QueueTable::default();
        let now = current_timestamp();

        let mut ancient = searching_ticket("a", QueueType::Casual);
        ancient.status = TicketStatus::Timeout;
        ancient.updated_at = now - Duration::hours(2);
        table.insert(ancient);

        let mut recent_terminal = searching_ticket("b", QueueType::Casual);
        recent_terminal.status = TicketStatus::Timeout;
        recent_terminal.updated_at = now - Duration::minutes(5);
        table.insert(recent_terminal);

        let mut old_but_searching = searching_ticket("c", QueueType::Casual);
        old_but_searching.updated_at = now - Duration::hours(2);
        table.insert(old_but_searching);

        let purged = table.purge_terminal_before(now - Duration::hours(1));
        assert_eq!(purged, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_count_searching_is_per_queue() {
        let mut table = QueueTable::default();
        table.insert(searching_ticket("a", QueueType::Casual));
        table.insert(searching_ticket("b", QueueType::Casual));
        table.insert(searching_ticket("c", QueueType::Ranked));

        assert_eq!(table.count_searching(QueueType::Casual), 2);
        assert_eq!(table.count_searching(QueueType::Ranked), 1);
    }
}
