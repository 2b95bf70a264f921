//! Account model: one subscriber.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One subscriber.
///
/// Invariant: `access_url` set implies `endpoint_id` set. The account row
/// is created on first interaction and soft-retired (credential cleared,
/// `is_active` false) by reconciliation; it is only hard-deleted by
/// explicit admin action so `trial_used` history survives.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Account {
    /// Surrogate primary key.
    pub id: i64,

    /// Stable external chat identity.
    pub chat_id: i64,

    /// Display handle, if the chat platform reports one.
    pub username: Option<String>,

    /// Monetary balance in currency units.
    pub balance: Decimal,

    pub created_at: DateTime<Utc>,

    /// Subscription window. Both absent before first provisioning.
    pub subscription_start: Option<DateTime<Utc>>,
    pub subscription_end: Option<DateTime<Utc>>,

    /// True while the account should have live network access.
    pub is_active: bool,

    /// One-time flag, never reset.
    pub trial_used: bool,

    /// Assigned provisioning endpoint. Absent means no credential is
    /// currently provisioned.
    pub endpoint_id: Option<i64>,

    /// Remote credential handle (connection string) cached locally.
    pub access_url: Option<String>,
}

impl Account {
    /// The handle this account's remote credential is keyed by.
    ///
    /// Derived from the stable chat identity, not the display name, so it
    /// survives username changes.
    #[must_use]
    pub fn handle(&self) -> String {
        format!("tg{}", self.chat_id)
    }

    /// Whether a remote credential is currently provisioned.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.access_url.is_some()
    }

    /// Capture the fields a renewal may change, for exact rollback.
    #[must_use]
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            balance: self.balance,
            subscription_end: self.subscription_end,
            is_active: self.is_active,
            endpoint_id: self.endpoint_id,
            access_url: self.access_url.clone(),
        }
    }

    /// Restore the fields captured by [`Account::snapshot`].
    pub fn restore(&mut self, snapshot: &AccountSnapshot) {
        self.balance = snapshot.balance;
        self.subscription_end = snapshot.subscription_end;
        self.is_active = snapshot.is_active;
        self.endpoint_id = snapshot.endpoint_id;
        self.access_url = snapshot.access_url.clone();
    }
}

/// Pre-operation values of the account fields a renewal touches.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub subscription_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub endpoint_id: Option<i64>,
    pub access_url: Option<String>,
}
