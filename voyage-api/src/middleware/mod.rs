pub mod auth;
pub mod resiliency;

pub use auth::{
    admin_auth_middleware, booking_viewer_middleware, customer_auth_middleware, AdminClaims, BookingViewer,
    CustomerClaims,
};
pub use resiliency::circuit_breaker_middleware;
