//! Attempt counting backends.
//!
//! Every backend implements the same fixed-window discipline: a window opens on the
//! first attempt for a key, admits up to `limit` attempts, and is replaced wholesale once
//! `window` has elapsed since it opened. Recording an attempt is a single atomic step per
//! key, so concurrent callers can never admit more than `limit` attempts between them.
//!
//! - **Memory**: `DashMap` owned by the process, single instance only.
//! - **Postgres**: one `UPSERT` per attempt, shared by every instance.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use std::{fmt, str::FromStr, time::Duration};

use super::{
    action::ActionKind,
    rules::{ConfigError, Rule, Rules},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Memory,
    Postgres,
}

impl StoreKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::UnknownStore(other.to_string())),
        }
    }
}

/// State of a key's window right after an attempt was recorded against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub admitted: bool,
    /// Admitted attempts in the current window, never above the rule's limit.
    pub count: u32,
    /// Time left until the window resets.
    pub reset_after: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("store returned an invalid row: {0}")]
    InvalidRow(String),
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Record one attempt for `(action, client_id)` and report whether it was admitted.
    ///
    /// Denied attempts do not consume quota.
    ///
    /// # Errors
    /// Returns `StoreError` when the backend cannot be reached or answers garbage.
    async fn record(
        &self,
        action: ActionKind,
        client_id: &str,
        rule: Rule,
    ) -> Result<Window, StoreError>;

    /// Drop entries whose window elapsed more than `grace` ago. Returns how many went away.
    ///
    /// # Errors
    /// Returns `StoreError` when the backend cannot be reached.
    async fn evict(&self, rules: &Rules, grace: Duration) -> Result<u64, StoreError>;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    /// Returns `StoreError` when the backend cannot be reached.
    async fn ping(&self) -> Result<(), StoreError>;

    fn kind(&self) -> StoreKind;
}
