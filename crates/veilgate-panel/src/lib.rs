//! Panel endpoint client
//!
//! Talks to one remote VPN-panel HTTP API: create, read, update and delete
//! a subscriber credential keyed by an account handle.
//!
//! The [`PanelClient`] trait is the seam the provisioning engine programs
//! against; [`RestPanelClient`] is the production implementation. Every call
//! carries a bounded timeout, and transport failures, non-2xx responses and
//! unusable payloads are all normalized into [`PanelError`] so callers never
//! branch on transport detail.

pub mod client;
pub mod config;
pub mod error;
pub mod rest;

pub use client::{
    CredentialInfo, CredentialResult, CredentialStatus, PanelClient, PanelClientFactory,
};
pub use config::PanelConfig;
pub use error::{PanelError, PanelResult};
pub use rest::{RestClientFactory, RestPanelClient};
