//! # authguard
//!
//! `authguard` throttles the sensitive authentication endpoints of an account system
//! (login, password reset, registration) to slow down credential stuffing and
//! account-creation abuse.
//!
//! ## Windows
//!
//! Every `(action, client)` pair gets a fixed window: it opens on the first attempt, admits
//! up to the configured limit, and resets entirely once the window elapses. Defaults are
//! 5 logins per 5 minutes and 3 password resets or registrations per hour.
//!
//! ## Backends
//!
//! - **memory**: per-process `DashMap`, for a single instance.
//! - **postgres**: one atomic `UPSERT` per attempt, shared across instances.
//!
//! When the backend cannot be reached the configured failure policy applies: `open` admits,
//! `closed` refuses with a generic retry hint.
//!
//! ## Integration
//!
//! Reverse proxies call `GET /v1/forward-auth` as an auth sub-request, other services call
//! `POST /v1/check`, and in-process axum routers can use [`authguard::middleware::guard`].
//! Refusals are `429 Too Many Requests` with a `Retry-After` header and never reveal
//! whether an account exists.

pub mod authguard;
pub mod cli;
pub mod limiter;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
