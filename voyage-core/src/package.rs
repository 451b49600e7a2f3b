use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A sellable tour package. Owned by the catalogue; this service only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TravelPackage {
    pub id: i64,
    pub title: String,
    pub destination: String,
    pub duration_days: u32,
    pub price: Decimal,
    pub currency: String,
    pub is_active: bool,
}
