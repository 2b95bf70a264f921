//! Outbound notification seam.
//!
//! The engine describes what happened with typed notices; delivery belongs
//! to the presentation layer. Engine call sites log and swallow notifier
//! errors — a broken chat transport never fails provisioning or a sweep.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use veilgate_db::Account;

use crate::migrate::MigrationReport;
use crate::sweeps::cleanup::CleanupReport;

/// Notice addressed to one subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    /// The subscription has expired and access was switched off.
    SubscriptionExpired,
    /// The subscription ends in `days_left` calendar days.
    ExpiresSoon { days_left: i64 },
    /// The account's endpoint is being retired; access is moving.
    MigrationStarted,
    /// Migration finished; the new connection string is ready.
    MigrationCompleted { access_url: String },
    /// Automatic recreation failed; the compensation still applies and the
    /// subscriber should re-create access manually.
    MigrationFailed { compensation_days: i64 },
    /// The expired credential was removed after the grace period.
    CredentialRemoved,
}

/// Notice addressed to the administrative audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdminNotice {
    CleanupReport(CleanupReport),
    MigrationReport(MigrationReport),
}

/// Delivery failure. Carries only a message; the engine never inspects it
/// beyond logging.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notice delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_account(&self, chat_id: i64, notice: Notice) -> Result<(), NotifyError>;

    async fn notify_admins(&self, notice: AdminNotice) -> Result<(), NotifyError>;
}

/// Fire-and-forget mirror of account changes (spreadsheet export and the
/// like). The engine pings it after any account mutation and never waits
/// on or fails because of it.
#[async_trait]
pub trait ChangeMirror: Send + Sync {
    async fn account_changed(&self, account: &Account) -> Result<(), NotifyError>;
}

/// Mirror that drops every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMirror;

#[async_trait]
impl ChangeMirror for NullMirror {
    async fn account_changed(&self, _account: &Account) -> Result<(), NotifyError> {
        Ok(())
    }
}
