//! Schema migrations.

use sqlx::PgPool;
use tracing::info;

use crate::error::StoreResult;

/// Apply pending migrations from `crates/veilgate-db/migrations/`.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    info!("applying database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
