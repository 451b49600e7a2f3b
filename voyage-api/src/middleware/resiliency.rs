use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::UpstreamFailure;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: usize },
    Open { since: Instant },
    HalfOpen,
}

/// Consecutive-failure breaker in front of the payment processor.
pub struct CircuitBreaker {
    name: &'static str,
    threshold: usize,
    reset_timeout: Duration,
    phase: Mutex<Phase>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name,
            threshold: threshold.max(1),
            reset_timeout,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub async fn current(&self) -> CircuitState {
        match *self.phase.lock().await {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen => CircuitState::HalfOpen,
        }
    }

    /// Whether a request may reach the processor. An open breaker turns
    /// half-open once the reset timeout has elapsed.
    pub async fn allow(&self) -> bool {
        let mut phase = self.phase.lock().await;
        let current = *phase;
        match current {
            Phase::Open { since } if since.elapsed() >= self.reset_timeout => {
                tracing::info!("Circuit breaker [{}] half-open, letting a request through", self.name);
                *phase = Phase::HalfOpen;
                true
            }
            Phase::Open { .. } => false,
            Phase::Closed { .. } | Phase::HalfOpen => true,
        }
    }

    pub async fn record_success(&self) {
        let mut phase = self.phase.lock().await;
        if matches!(*phase, Phase::HalfOpen) {
            tracing::info!("Circuit breaker [{}] closed again", self.name);
        }
        *phase = Phase::Closed { failures: 0 };
    }

    pub async fn record_failure(&self) {
        let mut phase = self.phase.lock().await;
        let current = *phase;
        let failures = match current {
            Phase::Closed { failures } => failures + 1,
            Phase::HalfOpen => self.threshold,
            Phase::Open { .. } => return,
        };
        *phase = if failures >= self.threshold {
            tracing::error!("Circuit breaker [{}] open after {} processor failures", self.name, failures);
            Phase::Open { since: Instant::now() }
        } else {
            Phase::Closed { failures }
        };
    }
}

pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payments", 5, Duration::from_secs(30)),
        }
    }
}

/// Guards the routes that call the payment processor synchronously. Failures
/// are responses marked with [`UpstreamFailure`]. GET routes degrade to 200
/// while the processor is down, so they never count as a success.
pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let cb = &state.resiliency.payment_cb;

    if !cb.allow().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("Circuit breaker [{}] is OPEN", cb.name()) })),
        )
            .into_response();
    }

    let counts_success = req.method() != Method::GET;
    let response = next.run(req).await;

    if response.extensions().get::<UpstreamFailure>().is_some() {
        cb.record_failure().await;
    } else if counts_success && response.status().is_success() {
        cb.record_success().await;
    }

    response
}
