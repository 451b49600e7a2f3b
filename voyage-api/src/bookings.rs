use axum::{
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;
use voyage_core::{Booking, BookingUpdateDraft};

use crate::error::AppError;
use crate::middleware::{
    admin_auth_middleware, booking_viewer_middleware, circuit_breaker_middleware, customer_auth_middleware,
    AdminClaims, BookingViewer, CustomerClaims,
};
use crate::payments::create_payment_intent;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

pub fn routes(state: &AppState) -> Router<AppState> {
    let customer_auth = from_fn_with_state(state.clone(), customer_auth_middleware);
    let viewer_auth = from_fn_with_state(state.clone(), booking_viewer_middleware);
    let admin_auth = from_fn_with_state(state.clone(), admin_auth_middleware);
    let payment_breaker = from_fn_with_state(state.clone(), circuit_breaker_middleware);

    Router::new()
        .route(
            "/bookings",
            get(list_my_bookings)
                .route_layer(customer_auth)
                .merge(post(create_payment_intent).route_layer(payment_breaker)),
        )
        .route(
            "/bookings/{id}",
            get(get_booking).put(update_booking).route_layer(viewer_auth),
        )
        .route("/admin/bookings", get(list_all_bookings).route_layer(admin_auth))
}

/// Loads a booking the viewer may see. Other customers' bookings read as
/// missing so ids cannot be enumerated.
async fn load_for(state: &AppState, viewer: &BookingViewer, id: i64) -> Result<Booking, AppError> {
    state
        .bookings
        .find_by_id(id)
        .await?
        .filter(|booking| viewer.can_access(booking))
        .ok_or_else(|| AppError::NotFoundError(format!("Booking {} not found", id)))
}

async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.bookings.list_by_customer(&claims.email).await?;
    Ok(Json(bookings))
}

#[derive(Debug, Deserialize)]
struct Pagination {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_all_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0).max(0);
    info!("Admin {} listing bookings (limit {}, offset {})", claims.sub, limit, offset);

    let bookings = state.bookings.list_all(limit, offset).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(viewer): Extension<BookingViewer>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    load_for(&state, &viewer, id).await.map(Json)
}

async fn update_booking(
    State(state): State<AppState>,
    Extension(viewer): Extension<BookingViewer>,
    Path(id): Path<i64>,
    WithRejection(Json(draft), _): WithRejection<Json<BookingUpdateDraft>, AppError>,
) -> Result<Json<Booking>, AppError> {
    let booking = load_for(&state, &viewer, id).await?;

    if booking.booking_status.is_terminal() {
        return Err(AppError::ConflictError(format!(
            "Booking {} is {} and can no longer be modified",
            id,
            booking.booking_status.label()
        )));
    }

    let update = draft.validate(&booking)?;
    let updated = state.bookings.update_details(id, &update).await?;
    info!("Booking {} details updated", id);
    Ok(Json(updated))
}
