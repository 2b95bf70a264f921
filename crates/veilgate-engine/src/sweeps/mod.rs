//! Scheduled reconciliation jobs.
//!
//! Each sweep derives its whole work set from stored state at run time, so
//! re-running one after a crash or overlap repeats no externally visible
//! effect. A failure on one account is logged and counted; the sweep moves
//! on to the next account.

pub mod cleanup;
pub mod expire;
pub mod warn;

pub use cleanup::{CleanupReport, CleanupSweep};
pub use expire::{ExpireReport, ExpireSweep};
pub use warn::{WarnReport, WarnSweep};
