//! Log-backed notice delivery.
//!
//! The daemon has no chat transport of its own; notices are emitted as
//! structured log events so an operator (or a fronting bot process reading
//! the same queue later) can see exactly what reconciliation decided.

use async_trait::async_trait;

use veilgate_engine::{AdminNotice, Notice, Notifier, NotifyError};

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_account(&self, chat_id: i64, notice: Notice) -> Result<(), NotifyError> {
        tracing::info!(chat_id, ?notice, "account notice");
        Ok(())
    }

    async fn notify_admins(&self, notice: AdminNotice) -> Result<(), NotifyError> {
        tracing::info!(?notice, "admin notice");
        Ok(())
    }
}
