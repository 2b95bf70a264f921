//! Endpoint model: one provisioning backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One VPN-panel provisioning backend.
///
/// At most one endpoint should be preferred at a time; the registry
/// tolerates zero and enforces the at-most-one rule on writes.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Endpoint {
    /// Surrogate primary key.
    pub id: i64,

    pub name: String,

    /// Base address of the panel API.
    pub base_url: String,

    /// Bearer token for the panel API.
    pub api_token: String,

    pub description: Option<String>,

    /// Inactive endpoints receive no new assignments.
    pub is_active: bool,

    /// Preferred target for new assignments.
    pub is_preferred: bool,

    pub created_at: DateTime<Utc>,
}

/// Data needed to register a new endpoint.
#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub name: String,
    pub base_url: String,
    pub api_token: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Endpoint plus derived load figures, for admin display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointOverview {
    pub endpoint: Endpoint,
    /// Accounts currently assigned to this endpoint.
    pub assigned_accounts: i64,
    /// Assigned accounts that hold a live credential.
    pub provisioned_accounts: i64,
}
