pub mod booking;
pub mod traveler;
pub mod draft;
pub mod package;
pub mod payment;
pub mod repository;
pub mod events;

pub use booking::{Booking, BookingStatus, BookingUpdate, NewBooking, SettleOutcome, Upserted};
pub use draft::{BookingDraft, BookingUpdateDraft, ValidatedDraft};
pub use package::TravelPackage;
pub use payment::{CreateIntentRequest, PaymentAdapter, PaymentIntent, PaymentStatus};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment provider error: {0}")]
    UpstreamError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::ValidationError(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
