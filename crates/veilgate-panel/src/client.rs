//! Panel client trait and credential types.
//!
//! The trait keeps the provisioning engine independent of the HTTP stack;
//! tests substitute scripted implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::PanelConfig;
use crate::error::PanelResult;

/// Status of a remote credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialStatus {
    Active,
    Disabled,
    Limited,
    Expired,
    OnHold,
}

impl CredentialStatus {
    /// Wire representation used by the panel API.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Disabled => "disabled",
            CredentialStatus::Limited => "limited",
            CredentialStatus::Expired => "expired",
            CredentialStatus::OnHold => "on_hold",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(CredentialStatus::Active),
            "disabled" => Some(CredentialStatus::Disabled),
            "limited" => Some(CredentialStatus::Limited),
            "expired" => Some(CredentialStatus::Expired),
            "on_hold" => Some(CredentialStatus::OnHold),
            _ => None,
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful create/update call.
///
/// `access_url` is the externally-usable connection string. Its absence in
/// a 2xx response is treated as a failure by the client, so it is never
/// empty here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialResult {
    pub access_url: String,
}

/// Remote credential state as reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialInfo {
    pub status: CredentialStatus,
    /// Expiry of the remote record. `None` means the record never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Connection string, if the endpoint reports one on reads.
    pub access_url: Option<String>,
}

/// Client for one panel endpoint.
///
/// All calls are keyed by the account handle and are idempotent on the
/// remote side, so repeating a call after an ambiguous timeout does not
/// duplicate resources.
#[async_trait]
pub trait PanelClient: Send + Sync {
    /// Create a credential expiring at `expires_at`.
    async fn create_credential(
        &self,
        handle: &str,
        expires_at: DateTime<Utc>,
    ) -> PanelResult<CredentialResult>;

    /// Read the current remote record. `Ok(None)` means the endpoint has no
    /// record for this handle (drift), which is an expected state, not an
    /// error.
    async fn read_credential(&self, handle: &str) -> PanelResult<Option<CredentialInfo>>;

    /// Update status and expiry of an existing credential.
    async fn update_credential(
        &self,
        handle: &str,
        status: CredentialStatus,
        expires_at: DateTime<Utc>,
    ) -> PanelResult<CredentialResult>;

    /// Delete the credential. Succeeds if the record is gone afterwards,
    /// including when it was already absent.
    async fn delete_credential(&self, handle: &str) -> PanelResult<()>;
}

/// Builds a [`PanelClient`] for a given endpoint configuration.
///
/// The registry uses this to answer "give me a client for endpoint X"
/// without the engine depending on the HTTP implementation.
pub trait PanelClientFactory: Send + Sync {
    fn client_for(&self, config: &PanelConfig) -> PanelResult<Box<dyn PanelClient>>;
}
