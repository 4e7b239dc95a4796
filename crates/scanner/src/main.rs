use std::time::Duration;

use herald_common::config::AppConfig;
use herald_common::db;
use herald_scanner::scan::DelinquencyScanner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_scanner=info".into()),
        )
        .json()
        .init();

    tracing::info!("CondoHerald delinquency scanner starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let scanner = DelinquencyScanner::new(pool, config.environments.clone());

    // `--once` runs a single scan and exits — the mode used when an external
    // scheduler (cron) owns the weekly firing time.
    if std::env::args().any(|arg| arg == "--once") {
        scanner.run_scan().await?;
        tracing::info!("CondoHerald delinquency scanner stopped.");
        return Ok(());
    }

    // Standalone mode: scan immediately, then on a fixed interval.
    tokio::select! {
        result = scan_loop(&scanner, Duration::from_secs(config.scan_interval_secs)) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Delinquency scanner exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("CondoHerald delinquency scanner stopped.");
    Ok(())
}

async fn scan_loop(scanner: &DelinquencyScanner, interval: Duration) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        scanner.run_scan().await?;
    }
}
