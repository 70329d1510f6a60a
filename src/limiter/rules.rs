//! Per-action limits.

use std::{collections::HashMap, str::FromStr, time::Duration};

use super::action::ActionKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown action kind: {0:?}")]
    UnknownAction(String),
    #[error("limit for {0} must be a positive integer")]
    ZeroLimit(ActionKind),
    #[error("window for {0} must be a positive duration")]
    ZeroWindow(ActionKind),
    #[error("invalid rule {0:?}, expected <action>=<limit>/<window-seconds>")]
    MalformedRule(String),
    #[error("unknown store: {0:?}, expected memory or postgres")]
    UnknownStore(String),
    #[error("unknown failure policy: {0:?}, expected open or closed")]
    UnknownPolicy(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    limit: u32,
    window: Duration,
}

impl Rule {
    /// Build a rule, rejecting a zero limit or an empty window.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroLimit` or `ConfigError::ZeroWindow`.
    pub fn new(action: ActionKind, limit: u32, window: Duration) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroLimit(action));
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow(action));
        }
        Ok(Self { limit, window })
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    const fn default_for(action: ActionKind) -> Self {
        match action {
            ActionKind::Login => Self {
                limit: 5,
                window: Duration::from_secs(5 * 60),
            },
            ActionKind::PasswordReset | ActionKind::Registration => Self {
                limit: 3,
                window: Duration::from_secs(60 * 60),
            },
        }
    }
}

/// A rule override in the `<action>=<limit>/<window-seconds>` form used on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleOverride {
    pub action: ActionKind,
    pub rule: Rule,
}

impl FromStr for RuleOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedRule(s.to_string());

        let (action, quota) = s.split_once('=').ok_or_else(malformed)?;
        let action: ActionKind = action.parse()?;

        let (limit, window) = quota.split_once('/').ok_or_else(malformed)?;
        let limit = limit.trim().parse::<u32>().map_err(|_| malformed())?;
        let window = window.trim().parse::<u64>().map_err(|_| malformed())?;

        Ok(Self {
            action,
            rule: Rule::new(action, limit, Duration::from_secs(window))?,
        })
    }
}

/// The complete rule table. Every [`ActionKind`] always has a rule, so lookups cannot fail
/// at request time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rules {
    rules: HashMap<ActionKind, Rule>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            rules: ActionKind::ALL
                .into_iter()
                .map(|action| (action, Rule::default_for(action)))
                .collect(),
        }
    }
}

impl Rules {
    #[must_use]
    pub fn with(mut self, action: ActionKind, rule: Rule) -> Self {
        self.rules.insert(action, rule);
        self
    }

    #[must_use]
    pub fn get(&self, action: ActionKind) -> Rule {
        self.rules
            .get(&action)
            .copied()
            .unwrap_or_else(|| Rule::default_for(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_auth_policy() {
        let rules = Rules::default();
        assert_eq!(rules.get(ActionKind::Login).limit(), 5);
        assert_eq!(rules.get(ActionKind::Login).window(), Duration::from_secs(300));
        assert_eq!(rules.get(ActionKind::PasswordReset).limit(), 3);
        assert_eq!(
            rules.get(ActionKind::PasswordReset).window(),
            Duration::from_secs(3600)
        );
        assert_eq!(rules.get(ActionKind::Registration).limit(), 3);
        assert_eq!(
            rules.get(ActionKind::Registration).window(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn rule_rejects_zero_values() {
        assert_eq!(
            Rule::new(ActionKind::Login, 0, Duration::from_secs(1)),
            Err(ConfigError::ZeroLimit(ActionKind::Login))
        );
        assert_eq!(
            Rule::new(ActionKind::Login, 1, Duration::ZERO),
            Err(ConfigError::ZeroWindow(ActionKind::Login))
        );
    }

    #[test]
    fn override_parses() {
        let parsed: RuleOverride = "login=10/60".parse().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(parsed.action, ActionKind::Login);
        assert_eq!(parsed.rule.limit(), 10);
        assert_eq!(parsed.rule.window(), Duration::from_secs(60));

        let rules = Rules::default().with(parsed.action, parsed.rule);
        assert_eq!(rules.get(ActionKind::Login).limit(), 10);
        assert_eq!(rules.get(ActionKind::Registration).limit(), 3);
    }

    #[test]
    fn override_rejects_bad_input() {
        assert!(matches!(
            "signup=3/60".parse::<RuleOverride>(),
            Err(ConfigError::UnknownAction(_))
        ));
        assert!(matches!(
            "login=0/60".parse::<RuleOverride>(),
            Err(ConfigError::ZeroLimit(ActionKind::Login))
        ));
        assert!(matches!(
            "login=3/0".parse::<RuleOverride>(),
            Err(ConfigError::ZeroWindow(ActionKind::Login))
        ));
        assert!(matches!(
            "login=3".parse::<RuleOverride>(),
            Err(ConfigError::MalformedRule(_))
        ));
        assert!(matches!(
            "login=-1/60".parse::<RuleOverride>(),
            Err(ConfigError::MalformedRule(_))
        ));
    }
}
