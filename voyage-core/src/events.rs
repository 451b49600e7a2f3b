use async_trait::async_trait;
use voyage_shared::models::events::{BookingCreatedEvent, BookingSettledEvent};

use crate::CoreResult;

pub const TOPIC_BOOKING_CREATED: &str = "booking.created";
pub const TOPIC_BOOKING_SETTLED: &str = "booking.settled";

/// Outbound booking lifecycle notifications.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn booking_created(&self, event: &BookingCreatedEvent) -> CoreResult<()>;

    async fn booking_settled(&self, event: &BookingSettledEvent) -> CoreResult<()>;
}
