//! Rate limiting for authentication flows.
//!
//! Flow Overview:
//! 1) The caller classifies the request into an [`ActionKind`] and a client identifier.
//! 2) [`Limiter::check`] records the attempt in the configured [`AttemptStore`] as one
//!    atomic step and turns the resulting window into a [`Decision`].
//! 3) If the store fails or does not answer within the timeout, the configured
//!    [`FailurePolicy`] decides. The same policy covers every failure path.
//!
//! Windows are fixed: they open on the first attempt and reset entirely once they elapse.
//! Attempts are counted when they are initiated and are never rolled back.

pub mod action;
pub mod rules;
pub mod store;
pub mod sweeper;

pub use action::ActionKind;
pub use rules::{ConfigError, Rule, RuleOverride, Rules};
pub use store::{AttemptStore, MemoryStore, PostgresStore, StoreError, StoreKind, Window};

use async_trait::async_trait;
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);
const DEFAULT_FAIL_CLOSED_RETRY_AFTER: Duration = Duration::from_secs(60);

/// What to do when the attempt store cannot be consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Admit the attempt and keep the endpoint available.
    Open,
    /// Refuse the attempt and keep the brute-force protection.
    #[default]
    Closed,
}

impl FailurePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Quota metadata for the `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed(Quota),
    Limited(Quota),
    /// The store was unavailable and the attempt was admitted anyway.
    FailedOpen,
    /// The store was unavailable and the attempt was refused with a generic wait.
    FailedClosed { retry_after: Duration },
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        match self {
            Self::Allowed(_) | Self::FailedOpen => true,
            Self::Limited(_) | Self::FailedClosed { .. } => false,
        }
    }

    /// How long a refused caller must wait, `None` when the attempt was admitted.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Limited(quota) => Some(quota.reset_after),
            Self::FailedClosed { retry_after } => Some(*retry_after),
            Self::Allowed(_) | Self::FailedOpen => None,
        }
    }

    #[must_use]
    pub const fn quota(&self) -> Option<&Quota> {
        match self {
            Self::Allowed(quota) | Self::Limited(quota) => Some(quota),
            Self::FailedOpen | Self::FailedClosed { .. } => None,
        }
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Decide whether `client_id` may attempt `action` right now, recording the attempt
    /// when it is admitted.
    async fn check(&self, action: ActionKind, client_id: &str) -> Decision;
}

pub struct Limiter {
    rules: Rules,
    store: Arc<dyn AttemptStore>,
    failure_policy: FailurePolicy,
    store_timeout: Duration,
    fail_closed_retry_after: Duration,
}

impl fmt::Debug for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limiter")
            .field("rules", &self.rules)
            .field("store", &self.store.kind())
            .field("failure_policy", &self.failure_policy)
            .field("store_timeout", &self.store_timeout)
            .field("fail_closed_retry_after", &self.fail_closed_retry_after)
            .finish()
    }
}

impl Limiter {
    #[must_use]
    pub fn new(rules: Rules, store: Arc<dyn AttemptStore>) -> Self {
        Self {
            rules,
            store,
            failure_policy: FailurePolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            fail_closed_retry_after: DEFAULT_FAIL_CLOSED_RETRY_AFTER,
        }
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_fail_closed_retry_after(mut self, retry_after: Duration) -> Self {
        self.fail_closed_retry_after = retry_after;
        self
    }

    #[must_use]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn AttemptStore> {
        &self.store
    }

    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Drop stored windows that elapsed more than `grace` ago.
    ///
    /// # Errors
    /// Returns `StoreError` if the store cannot be reached.
    pub async fn evict_expired(&self, grace: Duration) -> Result<u64, StoreError> {
        self.store.evict(&self.rules, grace).await
    }

    fn degrade(&self, action: ActionKind, client_id: &str, err: &StoreError) -> Decision {
        match self.failure_policy {
            FailurePolicy::Open => {
                warn!(
                    %action,
                    client_id,
                    store = %self.store.kind(),
                    "Attempt store unavailable, admitting (fail open): {err}"
                );
                Decision::FailedOpen
            }
            FailurePolicy::Closed => {
                error!(
                    %action,
                    client_id,
                    store = %self.store.kind(),
                    "Attempt store unavailable, refusing (fail closed): {err}"
                );
                Decision::FailedClosed {
                    retry_after: self.fail_closed_retry_after,
                }
            }
        }
    }
}

#[async_trait]
impl RateLimiter for Limiter {
    async fn check(&self, action: ActionKind, client_id: &str) -> Decision {
        let rule = self.rules.get(action);

        let recorded = tokio::time::timeout(
            self.store_timeout,
            self.store.record(action, client_id, rule),
        )
        .await;

        let window = match recorded {
            Ok(Ok(window)) => window,
            Ok(Err(err)) => return self.degrade(action, client_id, &err),
            Err(_) => {
                return self.degrade(action, client_id, &StoreError::Timeout(self.store_timeout))
            }
        };

        let quota = Quota {
            limit: rule.limit(),
            remaining: rule.limit().saturating_sub(window.count),
            reset_after: window.reset_after,
        };

        if window.admitted {
            debug!(%action, client_id, remaining = quota.remaining, "Attempt admitted");
            Decision::Allowed(quota)
        } else {
            info!(
                %action,
                client_id,
                retry_after_seconds = quota.reset_after.as_secs(),
                "Attempt rate limited"
            );
            Decision::Limited(quota)
        }
    }
}
