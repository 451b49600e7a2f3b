use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use voyage_core::events::EventPublisher;
use voyage_core::repository::{BookingRepository, PackageRepository};
use voyage_core::{
    Booking, BookingDraft, BookingStatus, CoreError, CoreResult, CreateIntentRequest, NewBooking,
    PaymentAdapter, Upserted, ValidatedDraft,
};
use voyage_shared::models::events::BookingCreatedEvent;
use voyage_shared::pii::redact_email;

#[derive(Debug, Clone, Serialize)]
pub struct InitiatedPayment {
    pub booking_id: i64,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub merchant_order_id: String,
    pub amount: Decimal,
    pub currency: String,
    /// True when the merchant order already had a booking and nothing new was created.
    #[serde(skip)]
    pub replayed: bool,
}

/// Turns a booking draft into a Pending booking correlated with a processor payment intent.
///
/// Ordering: the intent is requested first, keyed by `merchant_order_id` on the
/// processor side, and the booking row is upserted on the same key afterwards.
/// A failed processor call leaves nothing behind; a failed insert leaves only an
/// unreferenced intent that a retry with the same key picks up again.
pub struct PaymentIntentInitiator {
    payments: Arc<dyn PaymentAdapter>,
    bookings: Arc<dyn BookingRepository>,
    packages: Arc<dyn PackageRepository>,
    events: Arc<dyn EventPublisher>,
}

impl PaymentIntentInitiator {
    pub fn new(
        payments: Arc<dyn PaymentAdapter>,
        bookings: Arc<dyn BookingRepository>,
        packages: Arc<dyn PackageRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { payments, bookings, packages, events }
    }

    pub async fn initiate(&self, draft: BookingDraft) -> CoreResult<InitiatedPayment> {
        let draft = draft.validate()?;

        let package = self
            .packages
            .get_package(draft.package_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::NotFound(format!("Package {} not found", draft.package_id)))?;

        let merchant_order_id = draft
            .merchant_order_id
            .clone()
            .unwrap_or_else(generate_merchant_order_id);

        if let Some(existing) = self.bookings.find_by_merchant_order(&merchant_order_id).await? {
            return self.replay(existing, &draft).await;
        }

        let request = CreateIntentRequest {
            request_id: merchant_order_id.clone(),
            merchant_order_id: merchant_order_id.clone(),
            amount: draft.total_amount,
            currency: package.currency.clone(),
            metadata: serde_json::json!({
                "package_id": draft.package_id,
                "travel_date": draft.travel_date,
                "travelers": draft.traveler_count(),
            }),
        };

        let intent = self.payments.create_intent(&request).await?;
        if intent.amount != draft.total_amount {
            // Only possible when a merchant_order_id is reused with a new amount
            // after an earlier attempt never reached the database.
            return Err(CoreError::Conflict(format!(
                "merchant_order_id {} is already bound to a payment of {} {}",
                merchant_order_id, intent.amount, intent.currency
            )));
        }

        let client_secret = intent.client_secret.clone();
        let new_booking = NewBooking::pending(draft.clone(), merchant_order_id.clone(), &intent);

        let booking = match self.bookings.insert_pending(&new_booking).await? {
            Upserted::Created(booking) => {
                info!(
                    "Booking {} created as PENDING for {} (order {}, intent {})",
                    booking.id,
                    redact_email(booking.customer_email.expose()),
                    booking.merchant_order_id,
                    booking.payment_intent_id
                );
                self.publish_created(&booking).await;
                booking
            }
            Upserted::Existing(booking) => {
                // A concurrent request with the same merchant_order_id won the insert.
                if booking.payment_intent_id != intent.id || !same_checkout(&booking, &draft) {
                    return Err(CoreError::Conflict(format!(
                        "merchant_order_id {} is already bound to another payment intent",
                        merchant_order_id
                    )));
                }
                booking
            }
        };

        Ok(InitiatedPayment {
            booking_id: booking.id,
            payment_intent_id: booking.payment_intent_id,
            client_secret,
            merchant_order_id: booking.merchant_order_id,
            amount: booking.booking_amount,
            currency: booking.currency,
            replayed: false,
        })
    }

    async fn replay(&self, existing: Booking, draft: &ValidatedDraft) -> CoreResult<InitiatedPayment> {
        if !same_checkout(&existing, draft) {
            warn!(
                "Replay of order {} does not match booking {}; refusing",
                existing.merchant_order_id, existing.id
            );
            return Err(CoreError::Conflict(format!(
                "merchant_order_id {} was already used for a different booking",
                existing.merchant_order_id
            )));
        }
        if existing.booking_status != BookingStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "Booking {} is already {}; start a new order to pay again",
                existing.id,
                existing.booking_status.label()
            )));
        }

        let intent = self.payments.get_intent(&existing.payment_intent_id).await?;
        info!(
            "Replayed payment initiation for booking {} (order {})",
            existing.id, existing.merchant_order_id
        );

        Ok(InitiatedPayment {
            booking_id: existing.id,
            payment_intent_id: existing.payment_intent_id,
            client_secret: intent.client_secret,
            merchant_order_id: existing.merchant_order_id,
            amount: existing.booking_amount,
            currency: existing.currency,
            replayed: true,
        })
    }

    async fn publish_created(&self, booking: &Booking) {
        let event = BookingCreatedEvent {
            booking_id: booking.id,
            merchant_order_id: booking.merchant_order_id.clone(),
            payment_intent_id: booking.payment_intent_id.clone(),
            package_id: booking.package_id,
            travel_date: booking.travel_date,
            amount: booking.booking_amount,
            currency: booking.currency.clone(),
            timestamp: Utc::now().timestamp(),
        };
        if let Err(e) = self.events.booking_created(&event).await {
            warn!("Failed to publish booking.created for {}: {}", booking.id, e);
        }
    }
}

/// A replay must come from the same customer for the same trip; anything else
/// would hand out another customer's client secret.
fn same_checkout(existing: &Booking, draft: &ValidatedDraft) -> bool {
    existing.customer_email.expose().eq_ignore_ascii_case(&draft.customer_email)
        && existing.package_id == draft.package_id
        && existing.booking_amount == draft.total_amount
        && existing.adults == draft.adults
        && existing.children == draft.children
        && existing.infants == draft.infants
}

/// `VOY-<yyyymmdd>-<12 hex>`; unique enough to double as the processor request id.
pub fn generate_merchant_order_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("VOY-{}-{}", Utc::now().format("%Y%m%d"), &suffix[..12])
}
