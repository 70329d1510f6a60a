use std::{fmt, sync::Arc};

use super::client::ClientSource;
use crate::limiter::RateLimiter;

/// Everything a guarded route needs to reach a decision.
#[derive(Clone)]
pub struct GuardState {
    limiter: Arc<dyn RateLimiter>,
    client_source: ClientSource,
}

impl fmt::Debug for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardState")
            .field("client_source", &self.client_source)
            .finish_non_exhaustive()
    }
}

impl GuardState {
    /// Keys clients by socket peer address until [`Self::with_client_source`] says otherwise.
    #[must_use]
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            limiter,
            client_source: ClientSource::Peer,
        }
    }

    #[must_use]
    pub fn with_client_source(mut self, source: ClientSource) -> Self {
        self.client_source = source;
        self
    }

    #[must_use]
    pub fn limiter(&self) -> &dyn RateLimiter {
        self.limiter.as_ref()
    }

    #[must_use]
    pub const fn client_source(&self) -> ClientSource {
        self.client_source
    }
}
