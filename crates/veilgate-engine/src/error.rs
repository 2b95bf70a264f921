//! Engine error taxonomy.
//!
//! Remote failures are never retried automatically; they surface to the
//! caller with a coarse [`FailureCategory`] so the presentation layer can
//! phrase them without branching on transport detail.

use rust_decimal::Decimal;
use thiserror::Error;

use veilgate_db::StoreError;
use veilgate_panel::PanelError;

/// Error from a provisioning, registry or reconciliation operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No active endpoint exists. Fatal for provisioning, not retryable.
    #[error("no active endpoint available")]
    NoActiveEndpoint,

    /// Local precondition, checked before any remote call is attempted.
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Decimal, required: Decimal },

    /// The account already holds a credential; provision requires an
    /// unprovisioned account.
    #[error("account {chat_id} is already provisioned")]
    AlreadyProvisioned { chat_id: i64 },

    /// Endpoint deletion refused while accounts still reference it.
    /// Always surfaced unmodified, never worked around.
    #[error("endpoint {endpoint_id} still has {accounts} assigned account(s)")]
    EndpointInUse { endpoint_id: i64, accounts: i64 },

    #[error("endpoint not found: {0}")]
    EndpointNotFound(i64),

    #[error("account not found: chat {0}")]
    AccountNotFound(i64),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse failure category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// No endpoint reachable or none configured.
    EndpointUnavailable,
    /// The balance does not cover the operation.
    InsufficientFunds,
    /// The endpoint refused or returned an unusable payload.
    RemoteRejected,
    /// Delete blocked by existing references.
    ReferentialConflict,
    /// The referenced account or endpoint does not exist locally.
    NotFound,
    /// Storage-layer fault.
    Internal,
}

impl EngineError {
    /// Classify for user-facing reporting.
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            EngineError::NoActiveEndpoint => FailureCategory::EndpointUnavailable,
            EngineError::Panel(err) if err.is_transport() => FailureCategory::EndpointUnavailable,
            EngineError::Panel(_) => FailureCategory::RemoteRejected,
            EngineError::InsufficientFunds { .. } => FailureCategory::InsufficientFunds,
            EngineError::AlreadyProvisioned { .. } => FailureCategory::RemoteRejected,
            EngineError::EndpointInUse { .. } => FailureCategory::ReferentialConflict,
            EngineError::EndpointNotFound(_) | EngineError::AccountNotFound(_) => {
                FailureCategory::NotFound
            }
            EngineError::Store(_) => FailureCategory::Internal,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            EngineError::NoActiveEndpoint.category(),
            FailureCategory::EndpointUnavailable
        );
        assert_eq!(
            EngineError::Panel(PanelError::Timeout { timeout_secs: 30 }).category(),
            FailureCategory::EndpointUnavailable
        );
        assert_eq!(
            EngineError::Panel(PanelError::Rejected {
                status: 500,
                message: "boom".into()
            })
            .category(),
            FailureCategory::RemoteRejected
        );
        assert_eq!(
            EngineError::EndpointInUse {
                endpoint_id: 1,
                accounts: 3
            }
            .category(),
            FailureCategory::ReferentialConflict
        );
        assert_eq!(
            EngineError::InsufficientFunds {
                balance: Decimal::ZERO,
                required: Decimal::from(150)
            }
            .category(),
            FailureCategory::InsufficientFunds
        );
    }
}
