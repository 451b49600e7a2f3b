use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use voyage_checkout::{PaymentEvent, WebhookDisposition};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/airwallex", post(handle_airwallex_webhook))
}

#[derive(Debug, Deserialize)]
pub struct AirwallexWebhook {
    pub id: String,
    pub name: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

/// A payment intent for `payment_intent.*` events, a payment attempt otherwise.
#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

impl From<AirwallexWebhook> for PaymentEvent {
    fn from(hook: AirwallexWebhook) -> Self {
        let object = hook.data.object;
        let payment_intent_id = object.payment_intent_id.or_else(|| {
            object.id.filter(|_| hook.name.starts_with("payment_intent."))
        });
        PaymentEvent {
            event_id: hook.id,
            name: hook.name,
            payment_intent_id,
            amount: object.amount,
            currency: object.currency,
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

/// POST /webhooks/airwallex
/// The signature covers the raw body, so it is read as bytes and parsed after verification.
async fn handle_airwallex_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let timestamp = header(&headers, "x-timestamp");
    let signature = header(&headers, "x-signature");

    if let Err(e) = state.verifier.verify(timestamp, signature, &body) {
        warn!("Rejected webhook: {}", e);
        return Err(AppError::AuthenticationError(format!("Invalid webhook signature: {}", e)));
    }

    let payload: AirwallexWebhook = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Malformed webhook payload: {}", e)))?;
    info!("Received webhook {} ({})", payload.id, payload.name);

    let outcome = match state.webhooks.handle(payload.into()).await? {
        WebhookDisposition::Applied(booking) => {
            info!("Booking {} settled as {} via webhook", booking.id, booking.booking_status.label());
            "applied"
        }
        WebhookDisposition::AlreadySettled(_) => "already_settled",
        WebhookDisposition::Duplicate => "duplicate",
        WebhookDisposition::Ignored => "ignored",
    };

    Ok(Json(json!({ "received": true, "outcome": outcome })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> PaymentEvent {
        serde_json::from_value::<AirwallexWebhook>(value).unwrap().into()
    }

    #[test]
    fn intent_events_use_object_id() {
        let event = parse(json!({
            "id": "evt_1",
            "name": "payment_intent.succeeded",
            "data": { "object": { "id": "int_1", "amount": 2500.0, "currency": "AUD", "status": "SUCCEEDED" } }
        }));
        assert_eq!(event.payment_intent_id.as_deref(), Some("int_1"));
        assert_eq!(event.amount, Some(Decimal::new(2500, 0)));
    }

    #[test]
    fn attempt_events_use_parent_intent() {
        let event = parse(json!({
            "id": "evt_2",
            "name": "payment_attempt.failed",
            "data": { "object": { "id": "att_1", "payment_intent_id": "int_1" } }
        }));
        assert_eq!(event.payment_intent_id.as_deref(), Some("int_1"));

        let unrelated = parse(json!({
            "id": "evt_3",
            "name": "refund.created",
            "data": { "object": { "id": "rfd_1" } }
        }));
        assert_eq!(unrelated.payment_intent_id, None);
    }
}
