use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use voyage_shared::pii::Masked;

use crate::draft::ValidatedDraft;
use crate::payment::PaymentIntent;
use crate::traveler::{ContactDetails, Passenger};
use crate::CoreError;

/// Booking lifecycle. Stored and serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum BookingStatus {
    Pending = 0,
    Confirmed = 1,
    Failed = 2,
}

impl BookingStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    /// Pending -> {Confirmed, Failed}. Terminal states never move again,
    /// including Failed -> Pending on a payment retry.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Failed)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Failed => "FAILED",
        }
    }
}

impl From<BookingStatus> for u8 {
    fn from(status: BookingStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for BookingStatus {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(BookingStatus::Pending),
            1 => Ok(BookingStatus::Confirmed),
            2 => Ok(BookingStatus::Failed),
            other => Err(CoreError::InternalError(format!("unknown booking_status code {}", other))),
        }
    }
}

impl TryFrom<i16> for BookingStatus {
    type Error = CoreError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        u8::try_from(code)
            .map_err(|_| CoreError::InternalError(format!("unknown booking_status code {}", code)))
            .and_then(BookingStatus::try_from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub payment_intent_id: String,
    pub merchant_order_id: String,
    pub package_id: i64,
    pub customer_name: Option<String>,
    pub customer_email: Masked<String>,
    pub customer_phone: Option<String>,
    pub travel_date: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub rooms: u32,
    pub booking_amount: Decimal,
    pub currency: String,
    pub booking_status: BookingStatus,
    pub payment_status: String,
    pub passenger_details: Vec<Passenger>,
    pub contact_details: Option<ContactDetails>,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking as it is inserted: everything except the surrogate key and timestamps.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub payment_intent_id: String,
    pub merchant_order_id: String,
    pub package_id: i64,
    pub customer_name: Option<String>,
    pub customer_email: Masked<String>,
    pub customer_phone: Option<String>,
    pub travel_date: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub rooms: u32,
    pub booking_amount: Decimal,
    pub currency: String,
    pub passenger_details: Vec<Passenger>,
    pub contact_details: Option<ContactDetails>,
    pub special_requests: Option<String>,
}

impl NewBooking {
    pub fn pending(draft: ValidatedDraft, merchant_order_id: String, intent: &PaymentIntent) -> Self {
        Self {
            payment_intent_id: intent.id.clone(),
            merchant_order_id,
            package_id: draft.package_id,
            customer_name: draft.customer_name,
            customer_email: Masked::new(draft.customer_email),
            customer_phone: draft.customer_phone,
            travel_date: draft.travel_date,
            adults: draft.adults,
            children: draft.children,
            infants: draft.infants,
            rooms: draft.rooms,
            booking_amount: draft.total_amount,
            currency: intent.currency.clone(),
            passenger_details: draft.passengers,
            contact_details: draft.contact,
            special_requests: draft.special_requests,
        }
    }

    /// Materializes the row the store would return, used by the in-memory store.
    pub fn into_booking(self, id: i64, now: DateTime<Utc>) -> Booking {
        Booking {
            id,
            payment_intent_id: self.payment_intent_id,
            merchant_order_id: self.merchant_order_id,
            package_id: self.package_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            travel_date: self.travel_date,
            adults: self.adults,
            children: self.children,
            infants: self.infants,
            rooms: self.rooms,
            booking_amount: self.booking_amount,
            currency: self.currency,
            booking_status: BookingStatus::Pending,
            payment_status: "pending".to_string(),
            passenger_details: self.passenger_details,
            contact_details: self.contact_details,
            special_requests: self.special_requests,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable descriptive fields. Only applied while the booking is Pending.
#[derive(Debug, Clone, Default)]
pub struct BookingUpdate {
    pub travel_date: Option<NaiveDate>,
    pub special_requests: Option<String>,
    pub passenger_details: Option<Vec<Passenger>>,
    pub contact_details: Option<ContactDetails>,
}

impl BookingUpdate {
    pub fn is_empty(&self) -> bool {
        self.travel_date.is_none()
            && self.special_requests.is_none()
            && self.passenger_details.is_none()
            && self.contact_details.is_none()
    }

    pub fn apply_to(&self, booking: &mut Booking) {
        if let Some(date) = self.travel_date {
            booking.travel_date = date;
        }
        if let Some(requests) = &self.special_requests {
            booking.special_requests = Some(requests.clone());
        }
        if let Some(passengers) = &self.passenger_details {
            booking.passenger_details = passengers.clone();
        }
        if let Some(contact) = &self.contact_details {
            booking.contact_details = Some(contact.clone());
        }
    }
}

/// Result of an idempotent insert keyed by `merchant_order_id`.
#[derive(Debug, Clone)]
pub enum Upserted {
    Created(Booking),
    Existing(Booking),
}

impl Upserted {
    pub fn booking(&self) -> &Booking {
        match self {
            Upserted::Created(b) | Upserted::Existing(b) => b,
        }
    }

    pub fn into_booking(self) -> Booking {
        match self {
            Upserted::Created(b) | Upserted::Existing(b) => b,
        }
    }
}

/// Result of a guarded Pending -> terminal update.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// This call moved the booking out of Pending.
    Transitioned(Booking),
    /// The guard did not match; the booking is returned as currently stored.
    Unchanged(Booking),
}

impl SettleOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            SettleOutcome::Transitioned(b) | SettleOutcome::Unchanged(b) => b,
        }
    }

    pub fn into_booking(self) -> Booking {
        match self {
            SettleOutcome::Transitioned(b) | SettleOutcome::Unchanged(b) => b,
        }
    }

    pub fn transitioned(&self) -> bool {
        matches!(self, SettleOutcome::Transitioned(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_can_move() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Confirmed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Confirmed, Failed] {
                assert!(!terminal.can_transition_to(next), "{:?} -> {:?}", terminal, next);
            }
        }
    }

    #[test]
    fn status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&BookingStatus::Pending).unwrap(), "0");
        assert_eq!(serde_json::to_string(&BookingStatus::Confirmed).unwrap(), "1");
        assert_eq!(serde_json::from_str::<BookingStatus>("2").unwrap(), BookingStatus::Failed);
        assert!(serde_json::from_str::<BookingStatus>("7").is_err());
    }

    #[test]
    fn status_from_db_code() {
        assert_eq!(BookingStatus::try_from(1i16).unwrap(), BookingStatus::Confirmed);
        assert!(BookingStatus::try_from(-1i16).is_err());
    }
}
