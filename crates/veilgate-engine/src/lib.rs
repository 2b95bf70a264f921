//! # Provisioning engine
//!
//! Keeps three independently-owned resources consistent in the presence of
//! partial failures: a local account row, a remote panel credential (on one
//! of several interchangeable endpoints), and a monetary balance.
//!
//! - [`registry`] — which endpoint a new or renewing account should use,
//!   plus endpoint administration with referential guarantees.
//! - [`provision`] — the create/renew/delete state machine for one
//!   account's credential, with compensating rollback.
//! - [`migrate`] — endpoint retirement: fast synchronous reassignment,
//!   detached background recreation, aggregate admin report.
//! - [`sweeps`] — idempotent reconciliation jobs (expire, warn, cleanup).
//! - [`notify`] — typed outbound notices; failures here never fail an
//!   operation.
//!
//! Within one operation the remote call always precedes the local commit
//! that depends on it: local state is the effect of provisioning
//! decisions, never the cause.

pub mod config;
pub mod error;
pub mod migrate;
pub mod notify;
pub mod provision;
pub mod registry;
pub mod sweeps;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, FailureCategory};
pub use migrate::{MigrationReport, MigrationStart, Migrator};
pub use notify::{AdminNotice, ChangeMirror, Notice, Notifier, NotifyError, NullMirror};
pub use provision::{Provisioned, Provisioner, Term};
pub use registry::EndpointRegistry;
pub use sweeps::{CleanupReport, CleanupSweep, ExpireReport, ExpireSweep, WarnReport, WarnSweep};
