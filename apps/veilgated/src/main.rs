mod config;
mod notify;

use std::sync::Arc;

use chrono::{NaiveDate, Timelike, Utc};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use veilgate_db::{AccountStore, EndpointStore, PgStore};
use veilgate_engine::{
    CleanupSweep, EndpointRegistry, ExpireSweep, NullMirror, Provisioner, WarnSweep,
};
use veilgate_panel::RestClientFactory;

use config::VeilgateConfig;
use notify::LogNotifier;

/// Tracks whether a once-a-day job already ran today.
struct DailyGate {
    hour: u32,
    last_run: Option<NaiveDate>,
}

impl DailyGate {
    fn new(hour: u32) -> Self {
        Self {
            hour,
            last_run: None,
        }
    }

    fn due(&mut self, now: chrono::DateTime<Utc>) -> bool {
        if now.hour() < self.hour || self.last_run == Some(now.date_naive()) {
            return false;
        }
        self.last_run = Some(now.date_naive());
        true
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,veilgate_engine=debug")),
        )
        .init();

    let config = VeilgateConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    tracing::info!(
        price = %config.price,
        cleanup_grace_days = config.cleanup_grace_days,
        expire_sweep_hour = config.expire_sweep_hour,
        warn_sweep_hour = config.warn_sweep_hour,
        "starting veilgated"
    );

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Database connection error: {e}");
            std::process::exit(1);
        });

    veilgate_db::migrations::run_migrations(&pool)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Migration error: {e}");
            std::process::exit(1);
        });

    let store = Arc::new(PgStore::new(pool));
    let notifier = Arc::new(LogNotifier);
    let mirror = Arc::new(NullMirror);
    let registry = Arc::new(EndpointRegistry::new(
        Arc::clone(&store) as Arc<dyn EndpointStore>,
        Arc::new(RestClientFactory),
    ));
    let provisioner = Arc::new(Provisioner::new(
        Arc::clone(&store) as Arc<dyn AccountStore>,
        Arc::clone(&registry),
        mirror.clone(),
        config.engine(),
    ));

    let expire = ExpireSweep::new(
        Arc::clone(&store) as Arc<dyn AccountStore>,
        notifier.clone(),
        mirror.clone(),
    );
    let warn = WarnSweep::new(
        Arc::clone(&store) as Arc<dyn AccountStore>,
        notifier.clone(),
    );
    let cleanup = CleanupSweep::new(
        Arc::clone(&store) as Arc<dyn AccountStore>,
        provisioner,
        notifier.clone(),
        config.engine(),
    );

    let mut expire_gate = DailyGate::new(config.expire_sweep_hour);
    let mut warn_gate = DailyGate::new(config.warn_sweep_hour);
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));

    tracing::info!("reconciliation scheduler running");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                if expire_gate.due(now) {
                    if let Err(e) = expire.run(now).await {
                        tracing::error!(error = %e, "expiry sweep failed");
                    }
                    if let Err(e) = cleanup.run(now).await {
                        tracing::error!(error = %e, "cleanup sweep failed");
                    }
                }
                if warn_gate.due(now) {
                    if let Err(e) = warn.run(now).await {
                        tracing::error!(error = %e, "warning sweep failed");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }
}
