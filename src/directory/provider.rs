//! Directory provider trait and in-memory implementation

use crate::error::{MatchmakingError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Profile data resolved for a registered account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredProfile {
    pub display_name: String,
    pub skill_rating: i32,
}

/// Trait for resolving participant identities
///
/// Registered accounts live outside this service and are resolved read-only.
/// Guest identities are created on demand; `ensure_guest` must be idempotent
/// so callers can invoke it defensively before referencing a guest by id.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// Resolve a registered account's profile, or `None` if the account is unknown
    async fn resolve_registered(&self, account_id: &str) -> Result<Option<RegisteredProfile>>;

    /// Create the guest record if it does not exist yet
    async fn ensure_guest(&self, guest_id: &str, display_name: &str) -> Result<()>;

    /// Look up the display name stored for a guest identity
    async fn guest_display_name(&self, guest_id: &str) -> Result<Option<String>>;
}

/// In-memory directory backed by hash maps
///
/// The production deployment points this trait at the game's account store;
/// the in-memory variant serves tests and local single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<String, RegisteredProfile>>,
    guests: RwLock<HashMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registered account, returning self for chained setup
    pub fn with_account(self, account_id: &str, display_name: &str, skill_rating: i32) -> Self {
        {
            let mut accounts = self.accounts.write().expect("accounts lock poisoned");
            accounts.insert(
                account_id.to_string(),
                RegisteredProfile {
                    display_name: display_name.to_string(),
                    skill_rating,
                },
            );
        }
        self
    }

    /// Number of guest records currently held
    pub fn guest_count(&self) -> usize {
        self.guests.read().map(|guests| guests.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ParticipantDirectory for InMemoryDirectory {
    async fn resolve_registered(&self, account_id: &str) -> Result<Option<RegisteredProfile>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| MatchmakingError::DirectoryUnavailable {
                message: "Failed to acquire accounts lock".to_string(),
            })?;

        Ok(accounts.get(account_id).cloned())
    }

    async fn ensure_guest(&self, guest_id: &str, display_name: &str) -> Result<()> {
        let mut guests = self
            .guests
            .write()
            .map_err(|_| MatchmakingError::DirectoryUnavailable {
                message: "Failed to acquire guests lock".to_string(),
            })?;

        guests
            .entry(guest_id.to_string())
            .or_insert_with(|| display_name.to_string());
        Ok(())
    }

    async fn guest_display_name(&self, guest_id: &str) -> Result<Option<String>> {
        let guests = self
            .guests
            .read()
            .map_err(|_| MatchmakingError::DirectoryUnavailable {
                message: "Failed to acquire guests lock".to_string(),
            })?;

        Ok(guests.get(guest_id).cloned())
    }
}
