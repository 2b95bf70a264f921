//! Expiry sweep.
//!
//! Deactivates every active account whose subscription end has passed.
//! Selection is `is_active && subscription_end < now`, so an account
//! already deactivated by an earlier run simply no longer matches.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use veilgate_db::AccountStore;

use crate::error::EngineResult;
use crate::notify::{ChangeMirror, Notice, Notifier};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireReport {
    /// Accounts matching the expiry predicate at sweep start.
    pub found: u32,
    /// Accounts deactivated this run.
    pub expired: u32,
    /// Accounts whose deactivation write failed.
    pub errored: u32,
}

pub struct ExpireSweep {
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    mirror: Arc<dyn ChangeMirror>,
}

impl ExpireSweep {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        mirror: Arc<dyn ChangeMirror>,
    ) -> Self {
        Self {
            accounts,
            notifier,
            mirror,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, now: DateTime<Utc>) -> EngineResult<ExpireReport> {
        let expired = self.accounts.list_expired_active(now).await?;
        let mut report = ExpireReport {
            found: expired.len() as u32,
            ..ExpireReport::default()
        };

        for mut account in expired {
            account.is_active = false;
            if let Err(err) = self.accounts.update(&account).await {
                warn!(chat_id = account.chat_id, error = %err, "deactivation failed");
                report.errored += 1;
                continue;
            }
            report.expired += 1;
            if let Err(err) = self
                .notifier
                .notify_account(account.chat_id, Notice::SubscriptionExpired)
                .await
            {
                warn!(chat_id = account.chat_id, error = %err, "expiry notice failed");
            }
            if let Err(err) = self.mirror.account_changed(&account).await {
                tracing::debug!(chat_id = account.chat_id, error = %err, "change mirror failed");
            }
        }

        info!(found = report.found, expired = report.expired, "expiry sweep done");
        Ok(report)
    }
}
