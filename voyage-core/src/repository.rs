use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::booking::{Booking, BookingStatus, BookingUpdate, NewBooking, SettleOutcome, Upserted};
use crate::package::TravelPackage;
use crate::CoreResult;

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a Pending booking, or return the existing row for the same `merchant_order_id`.
    async fn insert_pending(&self, booking: &NewBooking) -> CoreResult<Upserted>;

    async fn find_by_id(&self, id: i64) -> CoreResult<Option<Booking>>;

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> CoreResult<Option<Booking>>;

    async fn find_by_merchant_order(&self, merchant_order_id: &str) -> CoreResult<Option<Booking>>;

    async fn list_by_customer(&self, customer_email: &str) -> CoreResult<Vec<Booking>>;

    async fn list_all(&self, limit: i64, offset: i64) -> CoreResult<Vec<Booking>>;

    /// Compare-and-set Pending -> `target`. `NotFound` when no booking carries the intent.
    async fn settle(
        &self,
        payment_intent_id: &str,
        target: BookingStatus,
        payment_status: &str,
    ) -> CoreResult<SettleOutcome>;

    /// Apply descriptive edits. `NotFound` if absent, `Conflict` once settled.
    async fn update_details(&self, id: i64, update: &BookingUpdate) -> CoreResult<Booking>;
}

/// Repository trait for package catalogue access
#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn get_package(&self, id: i64) -> CoreResult<Option<TravelPackage>>;

    async fn list_active(&self) -> CoreResult<Vec<TravelPackage>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub name: String,
    pub payment_intent_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Processed processor notifications, used to drop duplicate deliveries.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn is_processed(&self, event_id: &str) -> CoreResult<bool>;

    /// Returns false if the event was already recorded.
    async fn mark_processed(&self, record: &WebhookEventRecord) -> CoreResult<bool>;
}
