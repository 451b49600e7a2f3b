use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::booking::BookingStatus;
use crate::CoreResult;

/// Payment intent status as reported by the processor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresCustomerAction,
    RequiresCapture,
    Pending,
    Succeeded,
    Cancelled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// The booking status this processor status settles to, if it is final.
    pub fn settles_to(self) -> Option<BookingStatus> {
        match self {
            PaymentStatus::Succeeded => Some(BookingStatus::Confirmed),
            PaymentStatus::Cancelled | PaymentStatus::Failed => Some(BookingStatus::Failed),
            _ => None,
        }
    }

    /// Free-text value mirrored into `bookings.payment_status`.
    pub fn mirror(self) -> &'static str {
        match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Failed => "failed",
            _ => "pending",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., int_hkdm...)
    pub merchant_order_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIntentRequest {
    /// Processor-side idempotency key. Replaying the same key returns the same intent.
    pub request_id: String,
    pub merchant_order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Create a payment intent with the provider
    async fn create_intent(&self, request: &CreateIntentRequest) -> CoreResult<PaymentIntent>;

    /// Retrieve intent status
    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_statuses_settle() {
        assert_eq!(PaymentStatus::Succeeded.settles_to(), Some(BookingStatus::Confirmed));
        assert_eq!(PaymentStatus::Cancelled.settles_to(), Some(BookingStatus::Failed));
        assert_eq!(PaymentStatus::Failed.settles_to(), Some(BookingStatus::Failed));
        assert_eq!(PaymentStatus::RequiresCapture.settles_to(), None);
        assert_eq!(PaymentStatus::Pending.mirror(), "pending");
    }

    #[test]
    fn unknown_provider_status_is_not_final() {
        let status: PaymentStatus = serde_json::from_str("\"EXPIRED_SOMEHOW\"").unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
        assert_eq!(status.settles_to(), None);

        let status: PaymentStatus = serde_json::from_str("\"REQUIRES_CUSTOMER_ACTION\"").unwrap();
        assert_eq!(status, PaymentStatus::RequiresCustomerAction);
    }
}
