use clap::{Arg, Command};

use crate::limiter::{FailurePolicy, StoreKind};

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("store")
                .long("store")
                .help("Attempt store: memory or postgres")
                .env("AUTHGUARD_STORE")
                .default_value("memory")
                .value_parser(|store: &str| store.parse::<StoreKind>()),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string, required with --store postgres")
                .env("AUTHGUARD_DSN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("failure-policy")
                .long("failure-policy")
                .help("What to do when the store is unreachable: open (admit) or closed (refuse)")
                .env("AUTHGUARD_FAILURE_POLICY")
                .default_value("closed")
                .value_parser(|policy: &str| policy.parse::<FailurePolicy>()),
        )
        .arg(
            Arg::new("store-timeout-ms")
                .long("store-timeout-ms")
                .help("Store call timeout in milliseconds, resolved by the failure policy")
                .env("AUTHGUARD_STORE_TIMEOUT_MS")
                .default_value("250")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("fail-closed-retry-seconds")
                .long("fail-closed-retry-seconds")
                .help("Retry-After returned when failing closed")
                .env("AUTHGUARD_FAIL_CLOSED_RETRY_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("sweep-interval-seconds")
                .long("sweep-interval-seconds")
                .help("How often expired entries are evicted")
                .env("AUTHGUARD_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("sweep-grace-seconds")
                .long("sweep-grace-seconds")
                .help("Extra time an expired entry is kept before eviction")
                .env("AUTHGUARD_SWEEP_GRACE_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}
