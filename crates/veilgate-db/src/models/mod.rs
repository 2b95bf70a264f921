//! Persisted data model.

pub mod account;
pub mod endpoint;

pub use account::{Account, AccountSnapshot};
pub use endpoint::{Endpoint, EndpointOverview, NewEndpoint};
