//! PostgreSQL vault store.
//!
//! One row per account; the `username` primary key carries registration
//! atomicity, and redemption runs inside a transaction with
//! `SELECT … FOR UPDATE` so the cooldown check and the index write are a
//! single per-account critical section (row lock), matching the memory
//! store's guarantees.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;

use super::{Redemption, VaultError, VaultPolicy, VaultStore};

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS vault_accounts (
        username   TEXT PRIMARY KEY,
        envelopes  TEXT[] NOT NULL,
        redeemed_indices INT[] NOT NULL DEFAULT '{}',
        last_request TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
";

pub struct PgVaultStore {
    pool: PgPool,
    policy: VaultPolicy,
}

impl PgVaultStore {
    /// Connect and make sure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be established or the schema
    /// statement fails.
    pub async fn connect(dsn: &str, policy: VaultPolicy) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to ensure vault_accounts schema")?;

        Ok(Self { pool, policy })
    }

    /// Wrap an existing pool. The schema is assumed to be in place.
    #[must_use]
    pub fn with_pool(pool: PgPool, policy: VaultPolicy) -> Self {
        Self { pool, policy }
    }
}

fn backend(err: sqlx::Error) -> VaultError {
    VaultError::Backend(anyhow::Error::new(err).context("vault store query failed"))
}

#[async_trait::async_trait]
impl VaultStore for PgVaultStore {
    async fn register(&self, username: &str, envelopes: Vec<String>) -> Result<usize, VaultError> {
        self.policy.check_register(username, &envelopes)?;

        // The primary key turns two racing inserts into exactly one winner.
        let query = r"
            INSERT INTO vault_accounts (username, envelopes)
            VALUES ($1, $2)
            ON CONFLICT (username) DO NOTHING
        ";
        let total = envelopes.len();
        let result = sqlx::query(query)
            .bind(username)
            .bind(&envelopes)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(VaultError::AlreadyExists);
        }

        Ok(total)
    }

    async fn retrieve_next(&self, username: &str) -> Result<Redemption, VaultError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let query = r"
            SELECT envelopes, redeemed_indices, last_request
            FROM vault_accounts
            WHERE username = $1
            FOR UPDATE
        ";
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or(VaultError::NotFound)?;

        let envelopes: Vec<String> = row.get("envelopes");
        let redeemed: Vec<i32> = row.get("redeemed_indices");
        let last_request: Option<DateTime<Utc>> = row.get("last_request");

        let now = Utc::now();
        if let Some(last) = last_request {
            let cooldown = chrono::Duration::from_std(self.policy.cooldown)
                .unwrap_or_else(|_| chrono::Duration::MAX);
            let elapsed = now.signed_duration_since(last);
            if elapsed < cooldown {
                let retry_after = (cooldown - elapsed).to_std().unwrap_or_default();
                return Err(VaultError::RateLimited { retry_after });
            }
        }

        let total = envelopes.len();
        let index = (0..total)
            .find(|index| {
                i32::try_from(*index).is_ok_and(|index| !redeemed.contains(&index))
            })
            .ok_or(VaultError::Exhausted)?;

        let index_i32 = i32::try_from(index)
            .map_err(|err| VaultError::Backend(anyhow::Error::new(err).context("index overflow")))?;

        let update = r"
            UPDATE vault_accounts
            SET redeemed_indices = array_append(redeemed_indices, $2),
                last_request = $3
            WHERE username = $1
        ";
        sqlx::query(update)
            .bind(username)
            .bind(index_i32)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        Ok(Redemption {
            envelope: envelopes[index].clone(),
            remaining: total - redeemed.len() - 1,
            total,
        })
    }

    async fn reset(&self, username: &str) -> Result<(), VaultError> {
        let result = sqlx::query("DELETE FROM vault_accounts WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound);
        }

        Ok(())
    }

    async fn total_accounts(&self) -> Result<u64, VaultError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM vault_accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let total: i64 = row.get("total");
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn policy(&self) -> &VaultPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::{PgConnectOptions, PgSslMode};

    fn unreachable_pool() -> PgPool {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("invalid")
            .database("invalid")
            .ssl_mode(PgSslMode::Disable);
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(options)
    }

    fn store() -> PgVaultStore {
        PgVaultStore::with_pool(unreachable_pool(), VaultPolicy::default())
    }

    fn envelopes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("env{i}")).collect()
    }

    #[tokio::test]
    async fn validation_runs_before_any_query() {
        // Input errors must surface even when the database is unreachable.
        let store = store();
        assert!(matches!(
            store.register("al", envelopes(3)).await,
            Err(VaultError::UsernameTooShort)
        ));
        assert!(matches!(
            store.register("alice", envelopes(11)).await,
            Err(VaultError::CodeCountOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn register_reports_backend_failure() {
        let store = store();
        assert!(matches!(
            store.register("alice", envelopes(3)).await,
            Err(VaultError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn retrieve_reports_backend_failure() {
        let store = store();
        assert!(matches!(
            store.retrieve_next("alice").await,
            Err(VaultError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn reset_reports_backend_failure() {
        let store = store();
        assert!(matches!(
            store.reset("alice").await,
            Err(VaultError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn count_reports_backend_failure() {
        let store = store();
        assert!(matches!(
            store.total_accounts().await,
            Err(VaultError::Backend(_))
        ));
    }
}
