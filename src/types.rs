//! Common types used throughout the matchmaking service

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a registered account
pub type AccountId = String;

/// Identifier for an ephemeral guest identity
pub type GuestId = String;

/// Unique identifier for matchmaking tickets
pub type TicketId = Uuid;

/// Unique identifier for game sessions
pub type SessionId = Uuid;

/// A participant identity, in one of the two disjoint identifier spaces
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ParticipantRef {
    Registered(AccountId),
    Guest(GuestId),
}

impl ParticipantRef {
    /// The raw identifier, regardless of identity space
    pub fn id(&self) -> &str {
        match self {
            ParticipantRef::Registered(id) => id,
            ParticipantRef::Guest(id) => id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, ParticipantRef::Guest(_))
    }
}

impl std::fmt::Display for ParticipantRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantRef::Registered(id) => write!(f, "registered:{}", id),
            ParticipantRef::Guest(id) => write!(f, "guest:{}", id),
        }
    }
}

/// Type of queue a participant wants to search in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Casual,
    Ranked,
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueType::Casual => write!(f, "casual"),
            QueueType::Ranked => write!(f, "ranked"),
        }
    }
}

/// Mode tag stamped on sessions, derived from the queue a match came out of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Online,
    Ranked,
}

impl From<QueueType> for GameMode {
    fn from(queue_type: QueueType) -> Self {
        match queue_type {
            QueueType::Casual => GameMode::Online,
            QueueType::Ranked => GameMode::Ranked,
        }
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Online => write!(f, "online"),
            GameMode::Ranked => write!(f, "ranked"),
        }
    }
}

/// Lifecycle state of a matchmaking ticket
///
/// `Found`, `Timeout` and `Error` are terminal; only `Searching` tickets
/// participate in pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Searching,
    Found,
    Timeout,
    Error,
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TicketStatus::Searching)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Searching => write!(f, "searching"),
            TicketStatus::Found => write!(f, "found"),
            TicketStatus::Timeout => write!(f, "timeout"),
            TicketStatus::Error => write!(f, "error"),
        }
    }
}

/// One matchmaking attempt in the queue store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub participant: ParticipantRef,
    pub queue_type: QueueType,
    /// Present for ranked tickets, absent for casual ones
    pub skill_rating: Option<i32>,
    /// Captured at enqueue time so pairing never re-joins the directory
    pub display_name: String,
    pub status: TicketStatus,
    pub paired_with: Option<ParticipantRef>,
    pub session_id: Option<SessionId>,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Insertion order within the store, the FIFO tie-break
    pub seq: u64,
}

impl Ticket {
    /// Build a fresh searching ticket; the store assigns `seq` on insert
    pub fn new(
        participant: ParticipantRef,
        queue_type: QueueType,
        skill_rating: Option<i32>,
        display_name: String,
        now: DateTime<Utc>,
        search_timeout: Duration,
    ) -> Self {
        Self {
            id: crate::utils::generate_ticket_id(),
            participant,
            queue_type,
            skill_rating,
            display_name,
            status: TicketStatus::Searching,
            paired_with: None,
            session_id: None,
            joined_at: now,
            updated_at: now,
            expires_at: now + search_timeout,
            seq: 0,
        }
    }

    /// How long this ticket has been waiting as of `now`
    pub fn waited(&self, now: DateTime<Utc>) -> Duration {
        now - self.joined_at
    }

    pub fn snapshot(&self) -> TicketSnapshot {
        TicketSnapshot {
            ticket_id: self.id,
            participant: self.participant.clone(),
            queue_type: self.queue_type,
            status: self.status,
            joined_at: self.joined_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
            paired_with: self.paired_with.clone(),
            session_id: self.session_id,
        }
    }
}

/// Read-only projection of a ticket, returned by status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSnapshot {
    pub ticket_id: TicketId,
    pub participant: ParticipantRef,
    pub queue_type: QueueType,
    pub status: TicketStatus,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paired_with: Option<ParticipantRef>,
    pub session_id: Option<SessionId>,
}

/// One of the two player slots of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub participant: ParticipantRef,
    pub display_name: String,
}

/// Lifecycle state of a game session
///
/// The matchmaking core only ever writes `Waiting`; the gameplay service owns
/// the later transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    InProgress,
    Complete,
}

/// A game session created from two paired tickets
///
/// Slot 1 holds the longer-waiting side of the pair, slot 2 the ticket whose
/// insertion triggered the match. Consumers must not read any further meaning
/// into slot order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub slots: [PlayerSlot; 2],
    pub mode: GameMode,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

/// Receipt returned synchronously from an enqueue call
///
/// The pairing outcome itself is observed asynchronously through the event
/// channel or a later status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    pub ticket_id: TicketId,
    pub participant: ParticipantRef,
}

/// AMQP Message Types
/// Request to join a matchmaking queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQueueRequest {
    /// Absent for first-time guest callers; a guest identity is fabricated
    pub participant: Option<ParticipantRef>,
    pub queue_type: QueueType,
    /// Required for guests without a directory record; registered accounts
    /// resolve theirs from the directory
    pub display_name: Option<String>,
    /// Ranked only; absent values resolve from the directory or the neutral
    /// default
    pub skill_rating: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

/// Request to leave the queue voluntarily
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveQueueRequest {
    pub participant: ParticipantRef,
    pub timestamp: DateTime<Utc>,
}

/// Union type for inbound AMQP commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchmakingCommand {
    JoinQueue(JoinQueueRequest),
    LeaveQueue(LeaveQueueRequest),
}

/// Event emitted when a ticket enters the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketQueued {
    pub ticket_id: TicketId,
    pub participant: ParticipantRef,
    pub queue_type: QueueType,
    pub display_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a participant leaves the queue voluntarily
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLeft {
    pub ticket_id: TicketId,
    pub participant: ParticipantRef,
    pub queue_type: QueueType,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when two tickets pair into a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFound {
    pub session: Session,
    pub tickets: [TicketId; 2],
    pub queue_type: QueueType,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when the sweeper expires a searching ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTimedOut {
    pub ticket_id: TicketId,
    pub participant: ParticipantRef,
    pub queue_type: QueueType,
    pub waited_seconds: i64,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when pairing failed exceptionally for a ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFailed {
    pub ticket_id: TicketId,
    pub participant: ParticipantRef,
    pub queue_type: QueueType,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound AMQP events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchmakingEvent {
    TicketQueued(TicketQueued),
    TicketLeft(TicketLeft),
    MatchFound(MatchFound),
    SearchTimedOut(SearchTimedOut),
    SearchFailed(SearchFailed),
}
