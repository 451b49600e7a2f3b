use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use voyage_core::repository::{WebhookEventRecord, WebhookEventRepository};
use voyage_core::{Booking, CoreError, CoreResult, PaymentStatus};

use crate::reconciler::{ObservedPayment, PaymentReconciler, SettlementSource};

/// A verified processor notification, reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub event_id: String,
    pub name: String,
    pub payment_intent_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub enum WebhookDisposition {
    Applied(Booking),
    AlreadySettled(Booking),
    Duplicate,
    Ignored,
}

/// Which notifications move a booking. Failed attempts are deliberately absent:
/// the customer can retry another card on the same intent, so only the
/// intent-level outcomes are final.
pub fn settlement_status(event_name: &str) -> Option<PaymentStatus> {
    match event_name {
        "payment_intent.succeeded" => Some(PaymentStatus::Succeeded),
        "payment_intent.cancelled" => Some(PaymentStatus::Cancelled),
        _ => None,
    }
}

pub struct WebhookListener {
    reconciler: Arc<PaymentReconciler>,
    log: Arc<dyn WebhookEventRepository>,
}

impl WebhookListener {
    pub fn new(reconciler: Arc<PaymentReconciler>, log: Arc<dyn WebhookEventRepository>) -> Self {
        Self { reconciler, log }
    }

    /// Delivery order and count are not guaranteed by the processor. Duplicates
    /// are dropped by event id, and late or reordered events cannot move a
    /// settled booking. The event is only recorded after it has been applied,
    /// so a failure here is retried by the processor's redelivery.
    pub async fn handle(&self, event: PaymentEvent) -> CoreResult<WebhookDisposition> {
        if self.log.is_processed(&event.event_id).await? {
            info!("Duplicate webhook {} ({}) dropped", event.event_id, event.name);
            return Ok(WebhookDisposition::Duplicate);
        }

        let Some(status) = settlement_status(&event.name) else {
            info!("Webhook {} ({}) acknowledged without action", event.event_id, event.name);
            self.record(&event).await?;
            return Ok(WebhookDisposition::Ignored);
        };

        let intent_id = event
            .payment_intent_id
            .as_deref()
            .ok_or_else(|| CoreError::validation("webhook payload is missing the payment intent id"))?;

        let observed = ObservedPayment {
            status,
            amount: event.amount,
            currency: event.currency.clone(),
        };
        let reconciliation = self
            .reconciler
            .settle_intent(intent_id, observed, SettlementSource::Webhook)
            .await?;

        self.record(&event).await?;

        let booking = reconciliation.booking;
        Ok(if reconciliation.transitioned {
            WebhookDisposition::Applied(booking)
        } else {
            WebhookDisposition::AlreadySettled(booking)
        })
    }

    async fn record(&self, event: &PaymentEvent) -> CoreResult<()> {
        let record = WebhookEventRecord {
            event_id: event.event_id.clone(),
            name: event.name.clone(),
            payment_intent_id: event.payment_intent_id.clone(),
            received_at: Utc::now(),
        };
        self.log.mark_processed(&record).await?;
        Ok(())
    }
}
