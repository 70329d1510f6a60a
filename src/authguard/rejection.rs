//! HTTP rendering of limiter decisions.
//!
//! The body of a refusal depends only on timing, never on the account being attempted,
//! so it cannot be used to probe which emails are registered.

use axum::{
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::error;
use utoipa::ToSchema;

use crate::limiter::{Decision, Quota};

pub const RATE_LIMITED_CODE: &str = "rate_limited";

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct RateLimited {
    /// Machine-readable error code, always `rate_limited`.
    pub error: String,
    pub message: String,
    /// Seconds to wait before trying again.
    pub retry_after: u64,
}

impl RateLimited {
    #[must_use]
    pub fn new(retry_after: Duration) -> Self {
        let retry_after = retry_after_seconds(retry_after);
        Self {
            error: RATE_LIMITED_CODE.to_string(),
            message: wait_message(retry_after),
            retry_after,
        }
    }
}

/// Whole seconds, rounded up, never below one so clients always back off.
#[must_use]
pub fn retry_after_seconds(retry_after: Duration) -> u64 {
    let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    seconds.max(1)
}

#[must_use]
pub fn wait_message(retry_after_seconds: u64) -> String {
    let minutes = retry_after_seconds.div_ceil(60).max(1);
    if minutes == 1 {
        "Too many attempts. Please try again in 1 minute".to_string()
    } else {
        format!("Too many attempts. Please try again in {minutes} minutes")
    }
}

/// `X-RateLimit-*` headers; the reset value is a unix timestamp in seconds.
#[must_use]
pub fn quota_headers(quota: &Quota) -> HeaderMap {
    let reset_at = SystemTime::now()
        .checked_add(quota.reset_after)
        .and_then(|at| at.duration_since(UNIX_EPOCH).ok())
        .map_or(0, retry_after_seconds);

    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(quota.limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(quota.remaining));
    headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(reset_at));
    headers
}

/// Render a decision for a caller that only needs the verdict.
///
/// Admitted attempts become `204 No Content`, refusals `429 Too Many Requests`.
#[must_use]
pub fn respond(decision: &Decision) -> Response {
    if decision.is_allowed() {
        let headers = decision.quota().map(quota_headers).unwrap_or_default();
        (StatusCode::NO_CONTENT, headers).into_response()
    } else {
        reject(decision)
    }
}

/// Build the `429` response for a refused attempt.
#[must_use]
pub fn reject(decision: &Decision) -> Response {
    let Some(retry_after) = decision.retry_after() else {
        error!("Refusing an attempt that was admitted: {:?}", decision);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let body = RateLimited::new(retry_after);

    let mut headers = decision.quota().map(quota_headers).unwrap_or_default();
    headers.insert(RETRY_AFTER, HeaderValue::from(body.retry_after));

    (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
}
