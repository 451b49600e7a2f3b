use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voyage_api::{app, AppState, AuthConfig, Backends};
use voyage_checkout::MockPaymentAdapter;
use voyage_core::events::EventPublisher;
use voyage_core::repository::{BookingRepository, PackageRepository, WebhookEventRepository};
use voyage_core::PaymentAdapter;
use voyage_store::app_config::{Config, PaymentProvider};
use voyage_store::{
    demo_packages, AirwallexAdapter, DbClient, InMemoryStore, LogEventPublisher, PgBookingRepository,
    PgPackageRepository, PgWebhookEventRepository, RedisClient, WebhookVerifier,
};

type Repositories = (
    Arc<dyn BookingRepository>,
    Arc<dyn PackageRepository>,
    Arc<dyn WebhookEventRepository>,
);

async fn repositories(config: &Config) -> anyhow::Result<Repositories> {
    let options = config.database.connect_options().context("Invalid database settings")?;
    match options {
        Some(options) => {
            let db = DbClient::new(options, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            if config.database.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            let bookings: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(db.pool.clone()));
            let packages: Arc<dyn PackageRepository> = Arc::new(PgPackageRepository::new(db.pool.clone()));
            let webhook_log: Arc<dyn WebhookEventRepository> = Arc::new(PgWebhookEventRepository::new(db.pool));
            Ok((bookings, packages, webhook_log))
        }
        None => {
            tracing::warn!("No database configured, bookings are kept in memory only");
            let store = Arc::new(InMemoryStore::with_packages(demo_packages()));
            let bookings: Arc<dyn BookingRepository> = store.clone();
            let packages: Arc<dyn PackageRepository> = store.clone();
            let webhook_log: Arc<dyn WebhookEventRepository> = store;
            Ok((bookings, packages, webhook_log))
        }
    }
}

fn payment_adapter(config: &Config) -> anyhow::Result<Arc<dyn PaymentAdapter>> {
    let payments = &config.payments;
    match payments.provider {
        PaymentProvider::Airwallex => {
            ensure!(
                !payments.client_id.is_empty() && !payments.api_key.is_empty(),
                "payments.client_id and payments.api_key are required for the airwallex provider"
            );
            ensure!(
                !payments.webhook_secret.is_empty(),
                "payments.webhook_secret is required for the airwallex provider"
            );
            let adapter = AirwallexAdapter::new(payments).context("Failed to build Airwallex client")?;
            tracing::info!("Using Airwallex {:?} at {}", payments.environment, payments.resolved_base_url());
            Ok(Arc::new(adapter))
        }
        PaymentProvider::Mock => {
            tracing::warn!("Using the mock payment provider; every payment succeeds");
            Ok(Arc::new(MockPaymentAdapter::auto_succeed()))
        }
    }
}

fn event_publisher(config: &Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    #[cfg(feature = "kafka")]
    if let Some(brokers) = &config.kafka.brokers {
        let producer = voyage_store::KafkaEventPublisher::new(brokers).context("Failed to create Kafka producer")?;
        tracing::info!("Publishing booking events to Kafka at {}", brokers);
        return Ok(Arc::new(producer));
    }

    #[cfg(not(feature = "kafka"))]
    if config.kafka.brokers.is_some() {
        tracing::warn!("kafka.brokers is set but this build has no kafka feature; events go to the log");
    }

    Ok(Arc::new(LogEventPublisher))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "voyage_api=debug,voyage_checkout=debug,voyage_store=info,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Voyage API on port {}", config.server.port);

    let (bookings, packages, webhook_log) = repositories(&config).await?;
    let backends = Backends {
        payments: payment_adapter(&config)?,
        bookings,
        packages,
        webhook_log,
        events: event_publisher(&config)?,
    };

    let verifier = WebhookVerifier::new(
        config.payments.webhook_secret.clone(),
        config.payments.webhook_tolerance_seconds,
    );
    let auth = AuthConfig { secret: config.auth.jwt_secret.clone() };

    let mut app_state = AppState::new(backends, verifier, auth).with_payment_breaker(
        config.resiliency.failure_threshold,
        Duration::from_secs(config.resiliency.reset_timeout_seconds),
    );

    if let Some(url) = &config.redis.url {
        let redis = RedisClient::new(url).await.context("Failed to create Redis client")?;
        app_state = app_state.with_rate_limit(Arc::new(redis), config.server.rate_limit_per_minute);
        tracing::info!("Rate limiting at {} requests/minute per client", config.server.rate_limit_per_minute);
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
