//! Postgres store implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::models::{Account, Endpoint, NewEndpoint};
use crate::store::{AccountStats, AccountStore, EndpointStore};

/// sqlx-backed store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn count(&self, sql: &str) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get_by_chat_id(&self, chat_id: i64) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r"
            SELECT * FROM accounts WHERE chat_id = $1
            ",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn get_or_create(&self, chat_id: i64, username: Option<&str>) -> StoreResult<Account> {
        // Upsert keeps the first-interaction path race-free.
        let account = sqlx::query_as::<_, Account>(
            r"
            INSERT INTO accounts (chat_id, username)
            VALUES ($1, $2)
            ON CONFLICT (chat_id)
            DO UPDATE SET username = COALESCE(EXCLUDED.username, accounts.username)
            RETURNING *
            ",
        )
        .bind(chat_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r"
            UPDATE accounts
            SET username = $2,
                balance = $3,
                subscription_start = $4,
                subscription_end = $5,
                is_active = $6,
                trial_used = $7,
                endpoint_id = $8,
                access_url = $9
            WHERE id = $1
            ",
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(account.balance)
        .bind(account.subscription_start)
        .bind(account.subscription_end)
        .bind(account.is_active)
        .bind(account.trial_used)
        .bind(account.endpoint_id)
        .bind(&account.access_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_endpoint(&self, endpoint_id: i64) -> StoreResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r"
            SELECT * FROM accounts WHERE endpoint_id = $1 ORDER BY id
            ",
        )
        .bind(endpoint_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn list_expired_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r"
            SELECT * FROM accounts
            WHERE is_active AND subscription_end IS NOT NULL AND subscription_end < $1
            ORDER BY subscription_end
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn list_expiring_on(&self, date: NaiveDate) -> StoreResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r"
            SELECT * FROM accounts
            WHERE is_active
              AND subscription_end IS NOT NULL
              AND (subscription_end AT TIME ZONE 'UTC')::date = $1
            ORDER BY subscription_end
            ",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn list_cleanup_candidates(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r"
            SELECT * FROM accounts
            WHERE NOT is_active
              AND subscription_end IS NOT NULL
              AND subscription_end < $1
              AND access_url IS NOT NULL
            ORDER BY subscription_end
            ",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn stats(&self, cleanup_cutoff: DateTime<Utc>) -> StoreResult<AccountStats> {
        let total = self.count("SELECT COUNT(*) FROM accounts").await?;
        let active = self
            .count("SELECT COUNT(*) FROM accounts WHERE is_active")
            .await?;
        let provisioned = self
            .count("SELECT COUNT(*) FROM accounts WHERE access_url IS NOT NULL")
            .await?;
        let trial_used = self
            .count("SELECT COUNT(*) FROM accounts WHERE trial_used")
            .await?;
        let (cleanup_candidates,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM accounts
            WHERE NOT is_active
              AND subscription_end IS NOT NULL
              AND subscription_end < $1
              AND access_url IS NOT NULL
            ",
        )
        .bind(cleanup_cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountStats {
            total,
            active,
            provisioned,
            trial_used,
            cleanup_candidates,
        })
    }
}

#[async_trait]
impl EndpointStore for PgStore {
    async fn list(&self) -> StoreResult<Vec<Endpoint>> {
        let endpoints = sqlx::query_as::<_, Endpoint>("SELECT * FROM endpoints ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(endpoints)
    }

    async fn list_active(&self) -> StoreResult<Vec<Endpoint>> {
        let endpoints =
            sqlx::query_as::<_, Endpoint>("SELECT * FROM endpoints WHERE is_active ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(endpoints)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Endpoint>> {
        let endpoint = sqlx::query_as::<_, Endpoint>("SELECT * FROM endpoints WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(endpoint)
    }

    async fn insert(&self, endpoint: NewEndpoint) -> StoreResult<Endpoint> {
        let endpoint = sqlx::query_as::<_, Endpoint>(
            r"
            INSERT INTO endpoints (name, base_url, api_token, description, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(&endpoint.name)
        .bind(&endpoint.base_url)
        .bind(&endpoint.api_token)
        .bind(&endpoint.description)
        .bind(endpoint.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(endpoint)
    }

    async fn update(&self, endpoint: &Endpoint) -> StoreResult<()> {
        sqlx::query(
            r"
            UPDATE endpoints
            SET name = $2,
                base_url = $3,
                api_token = $4,
                description = $5,
                is_active = $6,
                is_preferred = $7
            WHERE id = $1
            ",
        )
        .bind(endpoint.id)
        .bind(&endpoint.name)
        .bind(&endpoint.base_url)
        .bind(&endpoint.api_token)
        .bind(&endpoint.description)
        .bind(endpoint.is_active)
        .bind(endpoint.is_preferred)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_preferred(&self, id: i64) -> StoreResult<bool> {
        // Clear-then-set in one transaction so at most one endpoint ever
        // carries the flag.
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE endpoints SET is_preferred = FALSE WHERE is_preferred")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE endpoints SET is_preferred = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM endpoints WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn assigned_count(&self, id: i64) -> StoreResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE endpoint_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn provisioned_count(&self, id: i64) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM accounts WHERE endpoint_id = $1 AND access_url IS NOT NULL",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
