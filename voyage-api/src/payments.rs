use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::info;
use voyage_checkout::{InitiatedPayment, PaymentStatusView};
use voyage_core::{BookingDraft, BookingStatus, PaymentStatus};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/confirm-payment", post(confirm_payment))
        .route("/payment-status/{payment_intent_id}", get(payment_status))
}

/// 201 for a new booking, 200 when the merchant order was already initiated.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    WithRejection(Json(draft), _): WithRejection<Json<BookingDraft>, AppError>,
) -> Result<(StatusCode, Json<InitiatedPayment>), AppError> {
    let initiated = state.initiator.initiate(draft).await?;
    let status = if initiated.replayed { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(initiated)))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    #[serde(alias = "paymentIntentId")]
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub booking_id: i64,
    pub payment_intent_id: String,
    pub booking_status: BookingStatus,
    pub payment_status: String,
    pub processor_status: Option<PaymentStatus>,
}

async fn confirm_payment(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<ConfirmPaymentRequest>, AppError>,
) -> Result<Json<ConfirmPaymentResponse>, AppError> {
    let payment_intent_id = req
        .payment_intent_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing required fields: payment_intent_id".to_string()))?;

    let reconciliation = state.reconciler.confirm(&payment_intent_id).await?;
    let booking = reconciliation.booking;
    info!(
        "Confirmation for intent {}: booking {} is {}",
        payment_intent_id,
        booking.id,
        booking.booking_status.label()
    );

    Ok(Json(ConfirmPaymentResponse {
        success: booking.booking_status == BookingStatus::Confirmed,
        booking_id: booking.id,
        payment_intent_id: booking.payment_intent_id,
        booking_status: booking.booking_status,
        payment_status: booking.payment_status,
        processor_status: reconciliation.processor_status,
    }))
}

async fn payment_status(
    State(state): State<AppState>,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<PaymentStatusView>, AppError> {
    let view = state.reconciler.status(&payment_intent_id).await?;
    Ok(Json(view))
}
