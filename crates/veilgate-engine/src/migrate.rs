//! Endpoint retirement.
//!
//! Moving all accounts off an endpoint happens in two phases. The
//! synchronous phase reassigns every affected account to the destination
//! and commits before anything else, so no account is ever left pointing
//! at a dead endpoint. The slow per-account credential recreation runs as
//! a detached task with its own store and notifier handles; the admin
//! request that triggered the migration never waits on it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use veilgate_db::{AccountStore, Endpoint};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::notify::{AdminNotice, ChangeMirror, Notice, Notifier};
use crate::registry::EndpointRegistry;

/// Aggregate outcome of one migration, delivered to the admin audience
/// after the background sweep completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub source_endpoint: i64,
    pub dest_endpoint: i64,
    /// Accounts reassigned in the synchronous phase.
    pub moved: u32,
    /// Credentials recreated on the destination.
    pub recreated: u32,
    /// Recreation failures (the compensation was still granted).
    pub failed: u32,
}

/// Handle returned by [`Migrator::migrate`]: the synchronous phase is done,
/// the background sweep may still be running.
#[derive(Debug)]
pub struct MigrationStart {
    /// Accounts reassigned.
    pub moved: u32,
    /// The detached recreation sweep. Await it to observe the final
    /// report; dropping it leaves the sweep running.
    pub background: JoinHandle<MigrationReport>,
}

/// Moves all accounts of one endpoint to another.
pub struct Migrator {
    accounts: Arc<dyn AccountStore>,
    registry: Arc<EndpointRegistry>,
    notifier: Arc<dyn Notifier>,
    mirror: Arc<dyn ChangeMirror>,
    config: EngineConfig,
}

impl Migrator {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        registry: Arc<EndpointRegistry>,
        notifier: Arc<dyn Notifier>,
        mirror: Arc<dyn ChangeMirror>,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts,
            registry,
            notifier,
            mirror,
            config,
        }
    }

    /// Retire `source_id` by moving every account it holds to `dest_id`.
    ///
    /// Accounts that were active at migration time get their credential
    /// recreated in the background and a fixed compensation extension
    /// whether or not recreation succeeds; inactive accounts only receive
    /// the move notice.
    #[instrument(skip(self))]
    pub async fn migrate(&self, source_id: i64, dest_id: i64) -> EngineResult<MigrationStart> {
        if source_id == dest_id {
            return Err(EngineError::EndpointNotFound(dest_id));
        }
        let dest = self.registry.endpoint(dest_id).await?;
        self.registry.endpoint(source_id).await?;

        let affected = self.accounts.list_by_endpoint(source_id).await?;
        let mut moved: Vec<(i64, bool)> = Vec::with_capacity(affected.len());

        // Phase one: fast reassignment, committed account by account
        // before any remote work starts.
        for mut account in affected {
            let was_active = account.is_active;
            account.access_url = None;
            account.endpoint_id = Some(dest_id);
            self.accounts.update(&account).await?;
            if let Err(err) = self.mirror.account_changed(&account).await {
                tracing::debug!(chat_id = account.chat_id, error = %err, "change mirror failed");
            }
            if let Err(err) = self
                .notifier
                .notify_account(account.chat_id, Notice::MigrationStarted)
                .await
            {
                warn!(chat_id = account.chat_id, error = %err, "move notice failed");
            }
            moved.push((account.chat_id, was_active));
        }

        let moved_count = moved.len() as u32;
        info!(source_id, dest_id, moved = moved_count, "accounts reassigned");

        // Phase two: detached recreation sweep with its own handles.
        let accounts = Arc::clone(&self.accounts);
        let registry = Arc::clone(&self.registry);
        let notifier = Arc::clone(&self.notifier);
        let mirror = Arc::clone(&self.mirror);
        let compensation_days = self.config.compensation_days;

        let background = tokio::spawn(async move {
            let mut report = MigrationReport {
                source_endpoint: source_id,
                dest_endpoint: dest_id,
                moved: moved_count,
                recreated: 0,
                failed: 0,
            };

            for (chat_id, was_active) in moved {
                if !was_active {
                    continue;
                }
                match recreate_on(
                    &*accounts,
                    &registry,
                    &*mirror,
                    &dest,
                    chat_id,
                    compensation_days,
                )
                .await
                {
                    Ok(access_url) => {
                        report.recreated += 1;
                        if let Err(err) = notifier
                            .notify_account(chat_id, Notice::MigrationCompleted { access_url })
                            .await
                        {
                            warn!(chat_id, error = %err, "completion notice failed");
                        }
                    }
                    Err(err) => {
                        warn!(chat_id, error = %err, "credential recreation failed");
                        report.failed += 1;
                        if let Err(err) = notifier
                            .notify_account(
                                chat_id,
                                Notice::MigrationFailed { compensation_days },
                            )
                            .await
                        {
                            warn!(chat_id, error = %err, "failure notice failed");
                        }
                    }
                }
            }

            info!(
                source_id,
                dest_id,
                recreated = report.recreated,
                failed = report.failed,
                "migration sweep finished"
            );
            if let Err(err) = notifier
                .notify_admins(AdminNotice::MigrationReport(report.clone()))
                .await
            {
                warn!(error = %err, "migration report delivery failed");
            }
            report
        });

        Ok(MigrationStart {
            moved: moved_count,
            background,
        })
    }
}

/// Recreate one active account's credential on the destination endpoint.
///
/// The compensation extension is applied and persisted even when the
/// remote create fails; the subscriber is never penalized for an
/// endpoint-side failure.
async fn recreate_on(
    accounts: &dyn AccountStore,
    registry: &EndpointRegistry,
    mirror: &dyn ChangeMirror,
    dest: &Endpoint,
    chat_id: i64,
    compensation_days: i64,
) -> EngineResult<String> {
    let mut account = accounts
        .get_by_chat_id(chat_id)
        .await?
        .ok_or(EngineError::AccountNotFound(chat_id))?;

    let now = Utc::now();
    let base = account.subscription_end.filter(|end| *end > now).unwrap_or(now);
    let new_end = base + Duration::days(compensation_days);
    account.subscription_end = Some(new_end);

    let result = async {
        let client = registry.client_for(dest)?;
        Ok::<_, EngineError>(client.create_credential(&account.handle(), new_end).await?)
    }
    .await;

    match result {
        Ok(created) => {
            account.access_url = Some(created.access_url.clone());
            account.is_active = true;
            accounts.update(&account).await?;
            if let Err(err) = mirror.account_changed(&account).await {
                tracing::debug!(chat_id, error = %err, "change mirror failed");
            }
            Ok(created.access_url)
        }
        Err(err) => {
            accounts.update(&account).await?;
            if let Err(mirror_err) = mirror.account_changed(&account).await {
                tracing::debug!(chat_id, error = %mirror_err, "change mirror failed");
            }
            Err(err)
        }
    }
}
