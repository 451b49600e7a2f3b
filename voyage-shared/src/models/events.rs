use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Emitted once when a pending booking is persisted against a payment intent.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCreatedEvent {
    pub booking_id: i64,
    pub merchant_order_id: String,
    pub payment_intent_id: String,
    pub package_id: i64,
    pub travel_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: i64,
}

/// Emitted exactly once per booking, by whichever path (confirmation call or
/// webhook) wins the Pending -> terminal transition.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingSettledEvent {
    pub booking_id: i64,
    pub payment_intent_id: String,
    pub booking_status: u8,
    pub payment_status: String,
    pub source: String,
    pub timestamp: i64,
}
