//! Account and endpoint storage
//!
//! Owns the persisted data model: one [`models::Account`] row per
//! subscriber and one [`models::Endpoint`] row per provisioning backend,
//! plus the store traits the engine programs against.
//!
//! Two implementations ship here: [`pg::PgStore`] (Postgres via sqlx,
//! schema under `migrations/`) and [`memory::MemoryStore`] (used by tests
//! and local development).

pub mod error;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod pg;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{Account, AccountSnapshot, Endpoint, EndpointOverview, NewEndpoint};
pub use pg::PgStore;
pub use store::{AccountStats, AccountStore, EndpointStore};
