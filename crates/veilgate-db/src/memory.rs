//! In-memory store, used by tests and local development.
//!
//! Mirrors the Postgres implementation's semantics closely enough for the
//! engine to be exercised without a database; locks are never held across
//! await points.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::{StoreError, StoreResult};
use crate::models::{Account, Endpoint, NewEndpoint};
use crate::store::{AccountStats, AccountStore, EndpointStore};

/// RwLock-backed store over plain maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<BTreeMap<i64, Account>>,
    endpoints: RwLock<BTreeMap<i64, Endpoint>>,
    next_account_id: AtomicI64,
    next_endpoint_id: AtomicI64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            endpoints: RwLock::new(BTreeMap::new()),
            next_account_id: AtomicI64::new(1),
            next_endpoint_id: AtomicI64::new(1),
        }
    }

    /// Insert a fully-formed account, assigning a fresh id.
    pub fn insert_account(&self, mut account: Account) -> Account {
        account.id = self.next_account_id.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .write()
            .expect("accounts lock poisoned")
            .insert(account.id, account.clone());
        account
    }

    /// Insert a fully-formed endpoint, assigning a fresh id.
    pub fn insert_endpoint(&self, mut endpoint: Endpoint) -> Endpoint {
        endpoint.id = self.next_endpoint_id.fetch_add(1, Ordering::SeqCst);
        self.endpoints
            .write()
            .expect("endpoints lock poisoned")
            .insert(endpoint.id, endpoint.clone());
        endpoint
    }

    fn cleanup_matches(account: &Account, cutoff: DateTime<Utc>) -> bool {
        !account.is_active
            && account
                .subscription_end
                .is_some_and(|end| end < cutoff)
            && account.access_url.is_some()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_by_chat_id(&self, chat_id: i64) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().expect("accounts lock poisoned");
        Ok(accounts.values().find(|a| a.chat_id == chat_id).cloned())
    }

    async fn get_or_create(&self, chat_id: i64, username: Option<&str>) -> StoreResult<Account> {
        if let Some(existing) = self.get_by_chat_id(chat_id).await? {
            return Ok(existing);
        }
        Ok(self.insert_account(Account {
            id: 0,
            chat_id,
            username: username.map(str::to_string),
            balance: Decimal::ZERO,
            created_at: Utc::now(),
            subscription_start: None,
            subscription_end: None,
            is_active: false,
            trial_used: false,
            endpoint_id: None,
            access_url: None,
        }))
    }

    async fn update(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().expect("accounts lock poisoned");
        match accounts.get_mut(&account.id) {
            Some(slot) => {
                *slot = account.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("account {}", account.id))),
        }
    }

    async fn list_by_endpoint(&self, endpoint_id: i64) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().expect("accounts lock poisoned");
        Ok(accounts
            .values()
            .filter(|a| a.endpoint_id == Some(endpoint_id))
            .cloned()
            .collect())
    }

    async fn list_expired_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().expect("accounts lock poisoned");
        Ok(accounts
            .values()
            .filter(|a| a.is_active && a.subscription_end.is_some_and(|end| end < now))
            .cloned()
            .collect())
    }

    async fn list_expiring_on(&self, date: NaiveDate) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().expect("accounts lock poisoned");
        Ok(accounts
            .values()
            .filter(|a| {
                a.is_active
                    && a.subscription_end
                        .is_some_and(|end| end.date_naive() == date)
            })
            .cloned()
            .collect())
    }

    async fn list_cleanup_candidates(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().expect("accounts lock poisoned");
        Ok(accounts
            .values()
            .filter(|a| Self::cleanup_matches(a, cutoff))
            .cloned()
            .collect())
    }

    async fn stats(&self, cleanup_cutoff: DateTime<Utc>) -> StoreResult<AccountStats> {
        let accounts = self.accounts.read().expect("accounts lock poisoned");
        let mut stats = AccountStats::default();
        for account in accounts.values() {
            stats.total += 1;
            if account.is_active {
                stats.active += 1;
            }
            if account.access_url.is_some() {
                stats.provisioned += 1;
            }
            if account.trial_used {
                stats.trial_used += 1;
            }
            if Self::cleanup_matches(account, cleanup_cutoff) {
                stats.cleanup_candidates += 1;
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl EndpointStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Endpoint>> {
        let endpoints = self.endpoints.read().expect("endpoints lock poisoned");
        Ok(endpoints.values().cloned().collect())
    }

    async fn list_active(&self) -> StoreResult<Vec<Endpoint>> {
        let endpoints = self.endpoints.read().expect("endpoints lock poisoned");
        Ok(endpoints
            .values()
            .filter(|e| e.is_active)
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Endpoint>> {
        let endpoints = self.endpoints.read().expect("endpoints lock poisoned");
        Ok(endpoints.get(&id).cloned())
    }

    async fn insert(&self, endpoint: NewEndpoint) -> StoreResult<Endpoint> {
        Ok(self.insert_endpoint(Endpoint {
            id: 0,
            name: endpoint.name,
            base_url: endpoint.base_url,
            api_token: endpoint.api_token,
            description: endpoint.description,
            is_active: endpoint.is_active,
            is_preferred: false,
            created_at: Utc::now(),
        }))
    }

    async fn update(&self, endpoint: &Endpoint) -> StoreResult<()> {
        let mut endpoints = self.endpoints.write().expect("endpoints lock poisoned");
        match endpoints.get_mut(&endpoint.id) {
            Some(slot) => {
                *slot = endpoint.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("endpoint {}", endpoint.id))),
        }
    }

    async fn set_preferred(&self, id: i64) -> StoreResult<bool> {
        let mut endpoints = self.endpoints.write().expect("endpoints lock poisoned");
        if !endpoints.contains_key(&id) {
            return Ok(false);
        }
        for endpoint in endpoints.values_mut() {
            endpoint.is_preferred = endpoint.id == id;
        }
        Ok(true)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let mut endpoints = self.endpoints.write().expect("endpoints lock poisoned");
        Ok(endpoints.remove(&id).is_some())
    }

    async fn assigned_count(&self, id: i64) -> StoreResult<i64> {
        Ok(self.list_by_endpoint(id).await?.len() as i64)
    }

    async fn provisioned_count(&self, id: i64) -> StoreResult<i64> {
        Ok(self
            .list_by_endpoint(id)
            .await?
            .iter()
            .filter(|a| a.access_url.is_some())
            .count() as i64)
    }
}
