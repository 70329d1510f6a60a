use clap::{Arg, ArgAction, Command};

use crate::limiter::{ActionKind, RuleOverride};

pub const ARG_RULE: &str = "rule";

/// Names of the `(limit, window-seconds)` arguments for an action.
#[must_use]
pub const fn arg_names(action: ActionKind) -> (&'static str, &'static str) {
    match action {
        ActionKind::Login => ("login-limit", "login-window-seconds"),
        ActionKind::PasswordReset => ("password-reset-limit", "password-reset-window-seconds"),
        ActionKind::Registration => ("registration-limit", "registration-window-seconds"),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("login-limit")
                .long("login-limit")
                .help("Login attempts allowed per window")
                .env("AUTHGUARD_LOGIN_LIMIT")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("login-window-seconds")
                .long("login-window-seconds")
                .help("Login window length in seconds")
                .env("AUTHGUARD_LOGIN_WINDOW_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("password-reset-limit")
                .long("password-reset-limit")
                .help("Password reset requests allowed per window")
                .env("AUTHGUARD_PASSWORD_RESET_LIMIT")
                .default_value("3")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("password-reset-window-seconds")
                .long("password-reset-window-seconds")
                .help("Password reset window length in seconds")
                .env("AUTHGUARD_PASSWORD_RESET_WINDOW_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("registration-limit")
                .long("registration-limit")
                .help("Registrations allowed per window")
                .env("AUTHGUARD_REGISTRATION_LIMIT")
                .default_value("3")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("registration-window-seconds")
                .long("registration-window-seconds")
                .help("Registration window length in seconds")
                .env("AUTHGUARD_REGISTRATION_WINDOW_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RULE)
                .long("rule")
                .help("Rule override, example: login=10/600 (repeatable)")
                .long_help(
                    "Rule override in the <action>=<limit>/<window-seconds> form. Takes precedence over the per-action flags. Can be repeated, or given as a comma separated list in the environment.",
                )
                .env("AUTHGUARD_RULES")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .value_parser(|rule: &str| rule.parse::<RuleOverride>()),
        )
}
