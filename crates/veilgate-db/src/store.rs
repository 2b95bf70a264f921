//! Store traits the engine programs against.
//!
//! Each method is one short-lived unit of work; no store call spans a
//! remote network call. `AccountStore::update` persists every mutable
//! field of one account in a single statement, which is the atomic commit
//! the provisioning coordinator relies on.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::models::{Account, Endpoint, NewEndpoint};

/// Aggregate account figures, reported before and after cleanup runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub total: i64,
    pub active: i64,
    pub provisioned: i64,
    pub trial_used: i64,
    pub cleanup_candidates: i64,
}

/// Subscriber storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_by_chat_id(&self, chat_id: i64) -> StoreResult<Option<Account>>;

    /// Fetch the account for a chat identity, creating a fresh row
    /// (balance 0, inactive) on first interaction.
    async fn get_or_create(&self, chat_id: i64, username: Option<&str>) -> StoreResult<Account>;

    /// Persist every mutable field of the account in one statement.
    async fn update(&self, account: &Account) -> StoreResult<()>;

    async fn list_by_endpoint(&self, endpoint_id: i64) -> StoreResult<Vec<Account>>;

    /// Active accounts whose subscription ended before `now`.
    async fn list_expired_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<Account>>;

    /// Active accounts whose subscription ends on the given UTC date.
    async fn list_expiring_on(&self, date: NaiveDate) -> StoreResult<Vec<Account>>;

    /// Inactive accounts past the grace cutoff that still hold a
    /// credential handle.
    async fn list_cleanup_candidates(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Account>>;

    /// Aggregate statistics; `cleanup_cutoff` bounds the candidate count.
    async fn stats(&self, cleanup_cutoff: DateTime<Utc>) -> StoreResult<AccountStats>;
}

/// Endpoint storage. Referential rules (delete guard, at-most-one
/// preferred) are enforced by the registry on top of these primitives.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Endpoint>>;

    /// Active endpoints ordered by id.
    async fn list_active(&self) -> StoreResult<Vec<Endpoint>>;

    async fn get(&self, id: i64) -> StoreResult<Option<Endpoint>>;

    async fn insert(&self, endpoint: NewEndpoint) -> StoreResult<Endpoint>;

    async fn update(&self, endpoint: &Endpoint) -> StoreResult<()>;

    /// Clear the preferred flag everywhere, then set it on `id`.
    /// Returns false when `id` does not exist.
    async fn set_preferred(&self, id: i64) -> StoreResult<bool>;

    /// Delete the row. Returns false when `id` does not exist.
    async fn delete(&self, id: i64) -> StoreResult<bool>;

    /// Accounts currently assigned to the endpoint.
    async fn assigned_count(&self, id: i64) -> StoreResult<i64>;

    /// Assigned accounts holding a live credential.
    async fn provisioned_count(&self, id: i64) -> StoreResult<i64>;
}
