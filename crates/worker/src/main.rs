use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seco_core::gateway::NotificationGateway;
use seco_db::store::{PgEnvironmentStore, PgTaskStore, PgUserStore, PgVoteStore};
use seco_engine::{Engine, EngineSettings};
use seco_gateways::{EmailConfig, NullNotifier, ServiceApiClient, ServiceConfig, SmtpNotifier};
use seco_worker::{RoundScheduler, SchedulerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seco_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::error!("DATABASE_URL is not set");
            std::process::exit(1);
        }
    };
    let pool = match seco_db::create_pool(&database_url).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(error = %err, "Database connection failed");
            std::process::exit(1);
        }
    };
    if let Err(err) = seco_db::health_check(&pool).await {
        tracing::error!(error = %err, "Database health check failed");
        std::process::exit(1);
    }

    let service_config = ServiceConfig::from_env().unwrap_or_else(|| {
        tracing::warn!("SERVICE_API_BASE not set, defaulting to http://localhost:3002");
        ServiceConfig {
            api_base: "http://localhost:3002".into(),
            login: String::new(),
            password: String::new(),
        }
    });
    let service = Arc::new(ServiceApiClient::new(service_config));

    let notifier: Arc<dyn NotificationGateway> = match EmailConfig::from_env() {
        Some(config) => Arc::new(SmtpNotifier::new(config)),
        None => {
            tracing::warn!("SMTP_HOST not set, notifications will only be logged");
            Arc::new(NullNotifier)
        }
    };

    let engine = Arc::new(Engine::new(
        Arc::new(PgEnvironmentStore::new(pool.clone())),
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgVoteStore::new(pool.clone())),
        Arc::new(PgTaskStore::new(pool)),
        service.clone(),
        service,
        notifier,
        EngineSettings::default(),
    ));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_cancel.cancel();
        }
    });

    let config = SchedulerConfig::from_env();
    tracing::info!(tick_minutes = config.tick_minutes, "Round scheduler starting");
    RoundScheduler::new(engine, config).run(cancel).await;
}
