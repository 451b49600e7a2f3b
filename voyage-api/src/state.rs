use std::sync::Arc;
use std::time::Duration;

use voyage_checkout::{PaymentIntentInitiator, PaymentReconciler, WebhookListener};
use voyage_core::events::EventPublisher;
use voyage_core::repository::{BookingRepository, PackageRepository, WebhookEventRepository};
use voyage_core::PaymentAdapter;
use voyage_store::{RedisClient, WebhookVerifier};

use crate::middleware::resiliency::{CircuitBreaker, ResiliencyState};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Ports the services are wired against; Postgres or in-memory, Airwallex or mock.
pub struct Backends {
    pub payments: Arc<dyn PaymentAdapter>,
    pub bookings: Arc<dyn BookingRepository>,
    pub packages: Arc<dyn PackageRepository>,
    pub webhook_log: Arc<dyn WebhookEventRepository>,
    pub events: Arc<dyn EventPublisher>,
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub initiator: Arc<PaymentIntentInitiator>,
    pub reconciler: Arc<PaymentReconciler>,
    pub webhooks: Arc<WebhookListener>,
    pub bookings: Arc<dyn BookingRepository>,
    pub packages: Arc<dyn PackageRepository>,
    pub verifier: Arc<WebhookVerifier>,
    pub auth: AuthConfig,
    pub rate_limit: Option<RateLimit>,
    pub resiliency: Arc<ResiliencyState>,
}

impl AppState {
    pub fn new(backends: Backends, verifier: WebhookVerifier, auth: AuthConfig) -> Self {
        let initiator = PaymentIntentInitiator::new(
            backends.payments.clone(),
            backends.bookings.clone(),
            backends.packages.clone(),
            backends.events.clone(),
        );
        let reconciler = Arc::new(PaymentReconciler::new(
            backends.payments,
            backends.bookings.clone(),
            backends.events,
        ));
        let webhooks = WebhookListener::new(reconciler.clone(), backends.webhook_log);

        Self {
            initiator: Arc::new(initiator),
            reconciler,
            webhooks: Arc::new(webhooks),
            bookings: backends.bookings,
            packages: backends.packages,
            verifier: Arc::new(verifier),
            auth,
            rate_limit: None,
            resiliency: Arc::new(ResiliencyState::default()),
        }
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, per_minute: i64) -> Self {
        self.rate_limit = Some(RateLimit { redis, per_minute });
        self
    }

    pub fn with_payment_breaker(mut self, threshold: usize, reset_timeout: Duration) -> Self {
        self.resiliency = Arc::new(ResiliencyState {
            payment_cb: CircuitBreaker::new("payments", threshold, reset_timeout),
        });
        self
    }
}
