//! Stale-credential cleanup sweep.
//!
//! Deprovisions inactive accounts that kept their remote credential past
//! the grace window. Deprovisioning clears the local handle even when the
//! remote delete fails, so a failed account leaves the candidate set after
//! one attempt and the next run finds only genuinely new work.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use veilgate_db::{AccountStats, AccountStore};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::notify::{AdminNotice, Notice, Notifier};
use crate::provision::Provisioner;

/// What one cleanup run did, delivered to the admin audience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Candidates matching the grace predicate at sweep start.
    pub found: u32,
    /// Credentials confirmed removed remotely.
    pub cleaned: u32,
    /// Accounts where no endpoint confirmed the delete. Their local
    /// handle was still cleared.
    pub errored: u32,
    pub before: AccountStats,
    pub after: AccountStats,
}

pub struct CleanupSweep {
    accounts: Arc<dyn AccountStore>,
    provisioner: Arc<Provisioner>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl CleanupSweep {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        provisioner: Arc<Provisioner>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts,
            provisioner,
            notifier,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, now: DateTime<Utc>) -> EngineResult<CleanupReport> {
        let cutoff = now - Duration::days(self.config.cleanup_grace_days);
        let before = self.accounts.stats(cutoff).await?;
        let candidates = self.accounts.list_cleanup_candidates(cutoff).await?;

        let mut report = CleanupReport {
            found: candidates.len() as u32,
            before,
            ..CleanupReport::default()
        };

        for account in candidates {
            match self.provisioner.deprovision(account.chat_id).await {
                Ok(true) => {
                    report.cleaned += 1;
                    if let Err(err) = self
                        .notifier
                        .notify_account(account.chat_id, Notice::CredentialRemoved)
                        .await
                    {
                        warn!(chat_id = account.chat_id, error = %err, "removal notice failed");
                    }
                }
                Ok(false) => {
                    warn!(chat_id = account.chat_id, "no endpoint confirmed the delete");
                    report.errored += 1;
                }
                Err(err) => {
                    warn!(chat_id = account.chat_id, error = %err, "cleanup failed");
                    report.errored += 1;
                }
            }
        }

        report.after = self.accounts.stats(cutoff).await?;
        info!(
            found = report.found,
            cleaned = report.cleaned,
            errored = report.errored,
            "cleanup sweep done"
        );

        if let Err(err) = self
            .notifier
            .notify_admins(AdminNotice::CleanupReport(report.clone()))
            .await
        {
            warn!(error = %err, "cleanup report delivery failed");
        }
        Ok(report)
    }
}
