use herald_common::config::AppConfig;
use herald_common::db;
use herald_dispatch::worker::QueueWorker;
use herald_push::fcm::FcmClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_dispatch=info,herald_push=info".into()),
        )
        .json()
        .init();

    tracing::info!("CondoHerald dispatch worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    let project_id = config
        .fcm_project_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("FCM_PROJECT_ID environment variable is required"))?;
    let auth_token = config
        .fcm_auth_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("FCM_AUTH_TOKEN environment variable is required"))?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let gateway = FcmClient::new(project_id, auth_token);
    let worker = QueueWorker::new(pool, gateway, config.queue_poll_interval_ms);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = worker.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Queue drain worker exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("CondoHerald dispatch worker stopped.");
    Ok(())
}
