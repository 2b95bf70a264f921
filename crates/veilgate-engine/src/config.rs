//! Engine configuration.

use rust_decimal::Decimal;

/// Tunables for provisioning and reconciliation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Standard provisioning price, debited on `provision`.
    pub price: Decimal,

    /// Default trial length in days. Fractional values are valid and are
    /// converted to a timestamp delta, never truncated to whole days.
    pub trial_days: f64,

    /// Subscription extension granted to every account affected by an
    /// endpoint migration, success or failure.
    pub compensation_days: i64,

    /// How long after expiry an inactive account keeps its remote
    /// credential before the cleanup sweep removes it.
    pub cleanup_grace_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            price: Decimal::from(150),
            trial_days: 14.0,
            compensation_days: 30,
            cleanup_grace_days: 7,
        }
    }
}
