//! Postgres-backed attempt counter, shared by every instance pointing at the same database.
//!
//! Each attempt is one `INSERT .. ON CONFLICT DO UPDATE` statement. The row lock taken by
//! the upsert serializes concurrent attempts for the same key, and the decision is read back
//! through `RETURNING`, so there is never a separate read before the write.
//!
//! Stored counts saturate at `limit + 1`: a returned count above the limit means the attempt
//! was refused. Window arithmetic uses the database clock, so instances with skewed clocks
//! still agree.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Connection, PgPool, Row};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

use super::{AttemptStore, StoreError, StoreKind, Window};
use crate::limiter::{
    action::ActionKind,
    rules::{Rule, Rules},
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const RECORD_ATTEMPT: &str = r"
    INSERT INTO auth_rate_limits AS t (action, client_id, attempt_count, window_started_at)
    VALUES ($1, $2, 1, NOW())
    ON CONFLICT (action, client_id) DO UPDATE SET
        attempt_count = CASE
            WHEN t.window_started_at <= NOW() - make_interval(secs => $3::float8) THEN 1
            ELSE LEAST(t.attempt_count + 1, $4::bigint + 1)
        END,
        window_started_at = CASE
            WHEN t.window_started_at <= NOW() - make_interval(secs => $3::float8) THEN NOW()
            ELSE t.window_started_at
        END
    RETURNING
        attempt_count,
        GREATEST(
            EXTRACT(EPOCH FROM (window_started_at + make_interval(secs => $3::float8) - NOW())),
            0
        )::float8 AS reset_after_seconds
";

const EVICT_EXPIRED: &str = r"
    DELETE FROM auth_rate_limits AS t
    USING unnest($1::text[], $2::float8[]) AS r(action, horizon)
    WHERE t.action = r.action
      AND t.window_started_at < NOW() - make_interval(secs => r.horizon)
";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against `dsn`.
    ///
    /// # Errors
    /// Returns `StoreError::Database` if no connection can be established.
    pub async fn connect(dsn: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;

        Ok(Self::new(pool))
    }

    /// Create the counter table if it does not exist yet.
    ///
    /// # Errors
    /// Returns `StoreError::Database` if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in split_sql_statements(SCHEMA_SQL) {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL"
            );
            sqlx::query(&statement)
                .execute(&self.pool)
                .instrument(span)
                .await?;
        }

        debug!("auth_rate_limits schema ready");

        Ok(())
    }
}

#[async_trait]
impl AttemptStore for PostgresStore {
    async fn record(
        &self,
        action: ActionKind,
        client_id: &str,
        rule: Rule,
    ) -> Result<Window, StoreError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPSERT"
        );

        let row = sqlx::query(RECORD_ATTEMPT)
            .bind(action.as_str())
            .bind(client_id)
            .bind(rule.window().as_secs_f64())
            .bind(i64::from(rule.limit()))
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        let attempt_count: i64 = row.try_get("attempt_count")?;
        let reset_after_seconds: f64 = row.try_get("reset_after_seconds")?;

        window_from_row(rule, attempt_count, reset_after_seconds)
    }

    async fn evict(&self, rules: &Rules, grace: Duration) -> Result<u64, StoreError> {
        let (actions, horizons): (Vec<String>, Vec<f64>) = ActionKind::ALL
            .into_iter()
            .map(|action| {
                let horizon = rules.get(action).window().saturating_add(grace);
                (action.as_str().to_string(), horizon.as_secs_f64())
            })
            .unzip();

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE"
        );

        let result = sqlx::query(EVICT_EXPIRED)
            .bind(actions)
            .bind(horizons)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;

        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Postgres
    }
}

fn window_from_row(
    rule: Rule,
    attempt_count: i64,
    reset_after_seconds: f64,
) -> Result<Window, StoreError> {
    let count = u32::try_from(attempt_count)
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| StoreError::InvalidRow(format!("attempt_count = {attempt_count}")))?;

    let reset_after = Duration::try_from_secs_f64(reset_after_seconds).map_err(|_| {
        StoreError::InvalidRow(format!("reset_after_seconds = {reset_after_seconds}"))
    })?;

    Ok(Window {
        admitted: count <= rule.limit(),
        count: count.min(rule.limit()),
        reset_after: reset_after.min(rule.window()),
    })
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> Rule {
        Rule::new(ActionKind::Login, 5, Duration::from_secs(300))
            .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn row_within_limit_is_admitted() {
        let window = window_from_row(rule(), 5, 120.5).unwrap_or_else(|e| panic!("{e}"));
        assert!(window.admitted);
        assert_eq!(window.count, 5);
        assert_eq!(window.reset_after, Duration::from_secs_f64(120.5));
    }

    #[test]
    fn saturated_row_is_denied_and_capped() {
        let window = window_from_row(rule(), 6, 10.0).unwrap_or_else(|e| panic!("{e}"));
        assert!(!window.admitted);
        assert_eq!(window.count, 5);
    }

    #[test]
    fn garbage_rows_are_rejected() {
        assert!(matches!(
            window_from_row(rule(), 0, 1.0),
            Err(StoreError::InvalidRow(_))
        ));
        assert!(matches!(
            window_from_row(rule(), -3, 1.0),
            Err(StoreError::InvalidRow(_))
        ));
        assert!(matches!(
            window_from_row(rule(), 1, f64::NAN),
            Err(StoreError::InvalidRow(_))
        ));
    }

    #[test]
    fn reset_after_never_exceeds_window() {
        let window = window_from_row(rule(), 1, 301.0).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(window.reset_after, Duration::from_secs(300));
    }

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS auth_rate_limits"));
        assert!(statements[1].starts_with("CREATE INDEX IF NOT EXISTS"));
    }
}
