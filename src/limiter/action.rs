//! Guarded action kinds and request path classification.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

use super::rules::ConfigError;

/// Prefix under which authentication endpoints live.
pub const AUTH_PATH_PREFIX: &str = "/api/auth";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Login,
    PasswordReset,
    Registration,
}

impl ActionKind {
    pub const ALL: [Self; 3] = [Self::Login, Self::PasswordReset, Self::Registration];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password-reset",
            Self::Registration => "registration",
        }
    }

    /// Map a request path to the action guarding it.
    ///
    /// Only paths under [`AUTH_PATH_PREFIX`] are guarded; anything else returns `None`
    /// and must pass through untouched.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        // drop query string and fragment
        let path = path.split(['?', '#']).next().unwrap_or_default();

        let rest = path.strip_prefix(AUTH_PATH_PREFIX)?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }

        if rest.contains("/login") {
            Some(Self::Login)
        } else if rest.contains("/reset-password") {
            Some(Self::PasswordReset)
        } else if rest.contains("/register") {
            Some(Self::Registration)
        } else {
            None
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "login" => Ok(Self::Login),
            "password-reset" | "password_reset" | "reset" => Ok(Self::PasswordReset),
            "registration" | "register" => Ok(Self::Registration),
            other => Err(ConfigError::UnknownAction(other.to_string())),
        }
    }
}
