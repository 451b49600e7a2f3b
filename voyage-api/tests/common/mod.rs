#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;
use voyage_api::middleware::{AdminClaims, CustomerClaims};
use voyage_api::{app, AppState, AuthConfig, Backends};
use voyage_checkout::MockPaymentAdapter;
use voyage_core::events::EventPublisher;
use voyage_core::CoreResult;
use voyage_shared::models::events::{BookingCreatedEvent, BookingSettledEvent};
use voyage_store::{demo_packages, InMemoryStore, WebhookVerifier};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Default)]
pub struct RecordingPublisher {
    pub created: Mutex<Vec<BookingCreatedEvent>>,
    pub settled: Mutex<Vec<BookingSettledEvent>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn booking_created(&self, event: &BookingCreatedEvent) -> CoreResult<()> {
        self.created.lock().await.push(event.clone());
        Ok(())
    }

    async fn booking_settled(&self, event: &BookingSettledEvent) -> CoreResult<()> {
        self.settled.lock().await.push(event.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub payments: Arc<MockPaymentAdapter>,
    pub events: Arc<RecordingPublisher>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_breaker(5)
    }

    pub fn with_breaker(failure_threshold: usize) -> Self {
        Self::with_breaker_timeout(failure_threshold, Duration::from_secs(60))
    }

    pub fn with_breaker_timeout(failure_threshold: usize, reset_timeout: Duration) -> Self {
        let store = Arc::new(InMemoryStore::with_packages(demo_packages()));
        let payments = Arc::new(MockPaymentAdapter::new());
        let events = Arc::new(RecordingPublisher::default());

        let backends = Backends {
            payments: payments.clone(),
            bookings: store.clone(),
            packages: store.clone(),
            webhook_log: store.clone(),
            events: events.clone(),
        };
        let state = AppState::new(
            backends,
            WebhookVerifier::new(WEBHOOK_SECRET, 300),
            AuthConfig { secret: JWT_SECRET.to_string() },
        )
        .with_payment_breaker(failure_threshold, reset_timeout);

        Self { router: app(state), store, payments, events }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    /// Reads a booking with operator rights.
    pub async fn booking(&self, id: impl std::fmt::Display) -> (StatusCode, Value) {
        let token = admin_token();
        self.request(Method::GET, &format!("/bookings/{}", id), None, Some(&token)).await
    }

    /// Creates a booking from the standard draft and returns the initiation response.
    pub async fn initiate(&self) -> Value {
        let (status, body) = self.post("/create-payment-intent", scenario_draft()).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    pub async fn webhook(&self, event_id: &str, name: &str, intent_id: &str) -> (StatusCode, Value) {
        let payload = json!({
            "id": event_id,
            "name": name,
            "data": { "object": { "id": intent_id, "amount": 2500.0, "currency": "AUD" } }
        })
        .to_string();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = WebhookVerifier::new(WEBHOOK_SECRET, 300).sign(&timestamp, payload.as_bytes());
        self.raw_webhook(payload, &timestamp, &signature).await
    }

    pub async fn raw_webhook(&self, payload: String, timestamp: &str, signature: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/airwallex")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-timestamp", timestamp)
            .header("x-signature", signature)
            .body(Body::from(payload))
            .unwrap();
        self.send(request).await
    }
}

pub fn scenario_draft() -> Value {
    json!({
        "package_id": 199,
        "total_amount": 2500,
        "customer_email": "john@test.com",
        "travel_date": "2024-12-15"
    })
}

fn expiry() -> usize {
    (Utc::now().timestamp() + 3600) as usize
}

pub fn customer_token(email: &str) -> String {
    let claims = CustomerClaims {
        sub: format!("cust-{}", email),
        email: email.to_string(),
        role: "CUSTOMER".to_string(),
        exp: expiry(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

pub fn admin_token() -> String {
    let claims = AdminClaims {
        sub: "admin-1".to_string(),
        email: "ops@voyage.test".to_string(),
        role: "ADMIN".to_string(),
        exp: expiry(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}
