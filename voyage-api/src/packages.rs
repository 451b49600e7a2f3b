use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use voyage_core::TravelPackage;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/packages", get(list_packages))
        .route("/packages/{id}", get(get_package))
}

async fn list_packages(State(state): State<AppState>) -> Result<Json<Vec<TravelPackage>>, AppError> {
    Ok(Json(state.packages.list_active().await?))
}

async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TravelPackage>, AppError> {
    state
        .packages
        .get_package(id)
        .await?
        .filter(|p| p.is_active)
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Package {} not found", id)))
}
