use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};
use voyage_core::events::EventPublisher;
use voyage_core::repository::BookingRepository;
use voyage_core::{Booking, BookingStatus, CoreError, CoreResult, PaymentAdapter, PaymentStatus};
use voyage_shared::models::events::BookingSettledEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementSource {
    Confirmation,
    Webhook,
}

impl SettlementSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SettlementSource::Confirmation => "confirmation",
            SettlementSource::Webhook => "webhook",
        }
    }
}

/// What the processor says about an intent, from a live lookup or a signed notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedPayment {
    pub status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub booking: Booking,
    /// None when the booking was already settled and the processor was not consulted.
    pub processor_status: Option<PaymentStatus>,
    pub transitioned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    pub booking_id: i64,
    pub payment_intent_id: String,
    pub booking_status: BookingStatus,
    pub payment_status: String,
    pub processor_status: Option<PaymentStatus>,
}

/// Applies the Pending -> {Confirmed, Failed} transition for a payment intent.
/// Shared by the confirmation endpoint and the webhook listener.
pub struct PaymentReconciler {
    payments: Arc<dyn PaymentAdapter>,
    bookings: Arc<dyn BookingRepository>,
    events: Arc<dyn EventPublisher>,
}

impl PaymentReconciler {
    pub fn new(
        payments: Arc<dyn PaymentAdapter>,
        bookings: Arc<dyn BookingRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { payments, bookings, events }
    }

    /// Client-triggered confirmation after the hosted widget completes.
    /// The processor is always asked for the real status; repeated calls on a
    /// settled booking return it unchanged without touching the processor.
    pub async fn confirm(&self, payment_intent_id: &str) -> CoreResult<Reconciliation> {
        let booking = self.load(payment_intent_id).await?;

        if booking.booking_status.is_terminal() {
            return Ok(Reconciliation { booking, processor_status: None, transitioned: false });
        }

        let intent = self.payments.get_intent(payment_intent_id).await?;
        let observed = ObservedPayment {
            status: intent.status,
            amount: Some(intent.amount),
            currency: Some(intent.currency),
        };

        self.apply(booking, observed, SettlementSource::Confirmation).await
    }

    pub async fn settle_intent(
        &self,
        payment_intent_id: &str,
        observed: ObservedPayment,
        source: SettlementSource,
    ) -> CoreResult<Reconciliation> {
        let booking = self.load(payment_intent_id).await?;
        self.apply(booking, observed, source).await
    }

    /// Read-only view combining the stored booking and a live processor lookup.
    pub async fn status(&self, payment_intent_id: &str) -> CoreResult<PaymentStatusView> {
        let booking = self.load(payment_intent_id).await?;

        let processor_status = match self.payments.get_intent(payment_intent_id).await {
            Ok(intent) => Some(intent.status),
            Err(e) => {
                warn!("Processor lookup for {} failed, serving stored status: {}", payment_intent_id, e);
                None
            }
        };

        Ok(PaymentStatusView {
            booking_id: booking.id,
            payment_intent_id: booking.payment_intent_id,
            booking_status: booking.booking_status,
            payment_status: booking.payment_status,
            processor_status,
        })
    }

    async fn load(&self, payment_intent_id: &str) -> CoreResult<Booking> {
        self.bookings
            .find_by_payment_intent(payment_intent_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("No booking for payment intent {}", payment_intent_id)))
    }

    async fn apply(
        &self,
        booking: Booking,
        observed: ObservedPayment,
        source: SettlementSource,
    ) -> CoreResult<Reconciliation> {
        check_amount(&booking, &observed)?;

        let Some(target) = observed.status.settles_to() else {
            info!(
                "Payment intent {} is {:?}; booking {} stays PENDING",
                booking.payment_intent_id, observed.status, booking.id
            );
            return Ok(Reconciliation { booking, processor_status: Some(observed.status), transitioned: false });
        };

        let outcome = self
            .bookings
            .settle(&booking.payment_intent_id, target, observed.status.mirror())
            .await?;
        let transitioned = outcome.transitioned();
        let booking = outcome.into_booking();

        if transitioned {
            info!(
                "Booking {} moved PENDING -> {} via {} (intent {})",
                booking.id,
                booking.booking_status.label(),
                source.as_str(),
                booking.payment_intent_id
            );
            self.publish_settled(&booking, source).await;
        } else if booking.booking_status != target {
            warn!(
                "Ignoring {:?} from {} for booking {}: already {}",
                observed.status,
                source.as_str(),
                booking.id,
                booking.booking_status.label()
            );
        }

        Ok(Reconciliation { booking, processor_status: Some(observed.status), transitioned })
    }

    async fn publish_settled(&self, booking: &Booking, source: SettlementSource) {
        let event = BookingSettledEvent {
            booking_id: booking.id,
            payment_intent_id: booking.payment_intent_id.clone(),
            booking_status: booking.booking_status.code(),
            payment_status: booking.payment_status.clone(),
            source: source.as_str().to_string(),
            timestamp: Utc::now().timestamp(),
        };
        if let Err(e) = self.events.booking_settled(&event).await {
            warn!("Failed to publish booking.settled for {}: {}", booking.id, e);
        }
    }
}

/// The processor must have charged exactly what the booking records.
fn check_amount(booking: &Booking, observed: &ObservedPayment) -> CoreResult<()> {
    if let Some(amount) = observed.amount {
        if amount != booking.booking_amount {
            error!(
                "Amount mismatch on intent {}: processor {} vs booking {} ({})",
                booking.payment_intent_id, amount, booking.booking_amount, booking.id
            );
            return Err(CoreError::Conflict(format!(
                "Payment amount does not match booking {}",
                booking.id
            )));
        }
    }
    if let Some(currency) = &observed.currency {
        if !currency.eq_ignore_ascii_case(&booking.currency) {
            error!(
                "Currency mismatch on intent {}: processor {} vs booking {}",
                booking.payment_intent_id, currency, booking.currency
            );
            return Err(CoreError::Conflict(format!(
                "Payment currency does not match booking {}",
                booking.id
            )));
        }
    }
    Ok(())
}
