use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use voyage_core::Booking;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// Issued by the storefront's identity provider; `email` scopes the customer's bookings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

fn decode_bearer<T: DeserializeOwned>(headers: &HeaderMap, secret: &str) -> Result<T, AppError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims: CustomerClaims = decode_bearer(req.headers(), &state.auth.secret)?;

    if claims.role != "CUSTOMER" {
        return Err(AppError::AuthorizationError("Customer token required".to_string()));
    }
    if claims.email.trim().is_empty() {
        return Err(AppError::AuthenticationError("Token carries no customer email".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims: AdminClaims = decode_bearer(req.headers(), &state.auth.secret)?;

    if claims.role != "ADMIN" && claims.role != "SUPER_ADMIN" {
        return Err(AppError::AuthorizationError("Admin token required".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Single-booking access (owner or admin)
// ============================================================================

/// Who is reading or editing a single booking.
#[derive(Debug, Clone)]
pub enum BookingViewer {
    Customer { email: String },
    Admin { sub: String },
}

impl BookingViewer {
    pub fn can_access(&self, booking: &Booking) -> bool {
        match self {
            BookingViewer::Admin { .. } => true,
            BookingViewer::Customer { email } => booking.customer_email.expose().eq_ignore_ascii_case(email),
        }
    }
}

/// Accepts either token kind; ownership is checked by the handler once the booking is loaded.
pub async fn booking_viewer_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims: CustomerClaims = decode_bearer(req.headers(), &state.auth.secret)?;

    let viewer = match claims.role.as_str() {
        "ADMIN" | "SUPER_ADMIN" => BookingViewer::Admin { sub: claims.sub },
        "CUSTOMER" if !claims.email.trim().is_empty() => BookingViewer::Customer { email: claims.email },
        "CUSTOMER" => return Err(AppError::AuthenticationError("Token carries no customer email".to_string())),
        _ => return Err(AppError::AuthorizationError("Customer or admin token required".to_string())),
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}
