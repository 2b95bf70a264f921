//! Pre-expiry warning sweep.
//!
//! Notifies active accounts whose subscription ends one or two UTC
//! calendar days from now. Date-bucket selection means each account is
//! warned at most once per horizon per day, however often the sweep runs.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use veilgate_db::AccountStore;

use crate::error::EngineResult;
use crate::notify::{Notice, Notifier};

const WARN_HORIZONS_DAYS: [i64; 2] = [1, 2];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarnReport {
    /// Warning notices delivered.
    pub warned: u32,
    /// Delivery failures.
    pub errored: u32,
}

pub struct WarnSweep {
    accounts: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
}

impl WarnSweep {
    pub fn new(accounts: Arc<dyn AccountStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { accounts, notifier }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, now: DateTime<Utc>) -> EngineResult<WarnReport> {
        let mut report = WarnReport::default();

        for days_left in WARN_HORIZONS_DAYS {
            let date = (now + Duration::days(days_left)).date_naive();
            for account in self.accounts.list_expiring_on(date).await? {
                match self
                    .notifier
                    .notify_account(account.chat_id, Notice::ExpiresSoon { days_left })
                    .await
                {
                    Ok(()) => report.warned += 1,
                    Err(err) => {
                        warn!(chat_id = account.chat_id, error = %err, "warning notice failed");
                        report.errored += 1;
                    }
                }
            }
        }

        info!(warned = report.warned, errored = report.errored, "warning sweep done");
        Ok(report)
    }
}
