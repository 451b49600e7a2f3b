use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::booking::{Booking, BookingUpdate};
use crate::traveler::{check_passenger_mix, looks_like_email, ContactDetails, JsonField, Passenger};
use crate::{CoreError, CoreResult};

const MAX_MERCHANT_ORDER_ID_LEN: usize = 64;
const MAX_TRAVELERS: u32 = 50;

/// Booking draft as posted by the booking wizard. Every field is optional at
/// the wire level so that missing fields produce a readable validation error
/// instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingDraft {
    pub package_id: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub travel_date: Option<String>,
    pub adults: Option<i64>,
    pub children: Option<i64>,
    pub infants: Option<i64>,
    pub rooms: Option<i64>,
    pub total_amount: Option<Decimal>,
    /// Client-generated idempotency token; reused across retries of the same checkout.
    pub merchant_order_id: Option<String>,
    pub passenger_details: Option<JsonField<Vec<Passenger>>>,
    pub contact_details: Option<JsonField<ContactDetails>>,
    pub special_requests: Option<String>,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDraft {
    pub package_id: i64,
    pub customer_name: Option<String>,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub travel_date: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
    pub rooms: u32,
    pub total_amount: Decimal,
    pub merchant_order_id: Option<String>,
    pub passengers: Vec<Passenger>,
    pub contact: Option<ContactDetails>,
    pub special_requests: Option<String>,
}

impl ValidatedDraft {
    pub fn traveler_count(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

impl BookingDraft {
    pub fn validate(self) -> CoreResult<ValidatedDraft> {
        let mut missing = Vec::new();
        if self.package_id.is_none() {
            missing.push("package_id");
        }
        if non_blank(&self.customer_email).is_none() {
            missing.push("customer_email");
        }
        if non_blank(&self.travel_date).is_none() {
            missing.push("travel_date");
        }
        if self.total_amount.is_none() {
            missing.push("total_amount");
        }
        if !missing.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let package_id = self.package_id.unwrap_or_default();
        if package_id <= 0 {
            return Err(CoreError::validation("package_id must be a positive integer"));
        }

        let total_amount = self.total_amount.unwrap_or_default();
        if total_amount <= Decimal::ZERO {
            return Err(CoreError::validation("total_amount must be greater than 0"));
        }
        if total_amount >= amount_ceiling() {
            return Err(CoreError::ValidationError(format!(
                "total_amount must be less than {}",
                amount_ceiling()
            )));
        }
        if total_amount.scale() > 2 && total_amount.round_dp(2) != total_amount {
            return Err(CoreError::validation("total_amount must have at most 2 decimal places"));
        }

        let customer_email = self.customer_email.unwrap_or_default().trim().to_string();
        if !looks_like_email(&customer_email) {
            return Err(CoreError::validation("customer_email is not a valid email"));
        }

        let raw_date = self.travel_date.unwrap_or_default();
        let travel_date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d")
            .map_err(|_| CoreError::ValidationError(format!("travel_date '{}' is not a YYYY-MM-DD date", raw_date)))?;

        let adults = count("adults", self.adults, 1)?;
        let children = count("children", self.children, 0)?;
        let infants = count("infants", self.infants, 0)?;
        let rooms = count("rooms", self.rooms, 1)?;

        if adults == 0 {
            return Err(CoreError::validation("at least one adult is required"));
        }
        if rooms == 0 {
            return Err(CoreError::validation("rooms must be at least 1"));
        }
        let travelers = adults + children + infants;
        if travelers > MAX_TRAVELERS {
            return Err(CoreError::ValidationError(format!(
                "a booking may include at most {} travelers",
                MAX_TRAVELERS
            )));
        }
        if rooms > travelers {
            return Err(CoreError::ValidationError(format!(
                "rooms ({}) cannot exceed the number of travelers ({})",
                rooms, travelers
            )));
        }

        let merchant_order_id = match non_blank(&self.merchant_order_id) {
            Some(id) => Some(check_merchant_order_id(id)?),
            None => None,
        };

        let passengers = match self.passenger_details {
            Some(field) => field.decode("passenger_details")?,
            None => Vec::new(),
        };
        check_passenger_mix(&passengers, adults, children, infants)?;

        let contact = match self.contact_details {
            Some(field) => Some(field.decode("contact_details")?),
            None => None,
        };
        if let Some(contact) = &contact {
            contact.validate()?;
        }

        Ok(ValidatedDraft {
            package_id,
            customer_name: non_blank(&self.customer_name).map(str::to_string),
            customer_email,
            customer_phone: non_blank(&self.customer_phone).map(str::to_string),
            travel_date,
            adults,
            children,
            infants,
            rooms,
            total_amount,
            merchant_order_id,
            passengers,
            contact,
            special_requests: non_blank(&self.special_requests).map(str::to_string),
        })
    }
}

/// Edits posted to `PUT /bookings/:id`. Traveler counts and the amount are
/// bound to the payment intent and cannot change here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingUpdateDraft {
    pub travel_date: Option<String>,
    pub special_requests: Option<String>,
    pub passenger_details: Option<JsonField<Vec<Passenger>>>,
    pub contact_details: Option<JsonField<ContactDetails>>,
}

impl BookingUpdateDraft {
    pub fn validate(self, booking: &Booking) -> CoreResult<BookingUpdate> {
        let travel_date = match non_blank(&self.travel_date) {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                CoreError::ValidationError(format!("travel_date '{}' is not a YYYY-MM-DD date", raw))
            })?),
            None => None,
        };

        let passenger_details = match self.passenger_details {
            Some(field) => {
                let passengers = field.decode("passenger_details")?;
                check_passenger_mix(&passengers, booking.adults, booking.children, booking.infants)?;
                Some(passengers)
            }
            None => None,
        };

        let contact_details = match self.contact_details {
            Some(field) => {
                let contact: ContactDetails = field.decode("contact_details")?;
                contact.validate()?;
                Some(contact)
            }
            None => None,
        };

        let update = BookingUpdate {
            travel_date,
            special_requests: non_blank(&self.special_requests).map(str::to_string),
            passenger_details,
            contact_details,
        };
        if update.is_empty() {
            return Err(CoreError::validation("No updatable fields supplied"));
        }
        Ok(update)
    }
}

/// `bookings.booking_amount` is `NUMERIC(12,2)`.
fn amount_ceiling() -> Decimal {
    Decimal::new(10_000_000_000, 0)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Each count is capped individually so the traveler total cannot overflow.
fn count(field: &str, value: Option<i64>, default: u32) -> CoreResult<u32> {
    match value {
        None => Ok(default),
        Some(n) if n < 0 => Err(CoreError::ValidationError(format!("{} must not be negative", field))),
        Some(n) if n > i64::from(MAX_TRAVELERS) => Err(CoreError::ValidationError(format!(
            "{} must be at most {}",
            field, MAX_TRAVELERS
        ))),
        Some(n) => Ok(n as u32),
    }
}

fn check_merchant_order_id(id: &str) -> CoreResult<String> {
    let valid = id.len() <= MAX_MERCHANT_ORDER_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(CoreError::ValidationError(format!(
            "merchant_order_id must be at most {} characters of [A-Za-z0-9_-]",
            MAX_MERCHANT_ORDER_ID_LEN
        )));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn draft(value: serde_json::Value) -> BookingDraft {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn minimal_draft_gets_defaults() {
        let validated = draft(json!({
            "package_id": 199,
            "total_amount": 2500,
            "customer_email": "john@test.com",
            "travel_date": "2024-12-15"
        }))
        .validate()
        .unwrap();

        assert_eq!(validated.package_id, 199);
        assert_eq!(validated.total_amount, dec!(2500));
        assert_eq!(validated.adults, 1);
        assert_eq!(validated.rooms, 1);
        assert_eq!(validated.travel_date, NaiveDate::from_ymd_opt(2024, 12, 15).unwrap());
        assert!(validated.passengers.is_empty());
    }

    #[test]
    fn reports_every_missing_field() {
        let err = draft(json!({ "customer_email": "john@test.com" })).validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("package_id"));
        assert!(msg.contains("travel_date"));
        assert!(msg.contains("total_amount"));
        assert!(!msg.contains("customer_email"));
    }

    #[test]
    fn rejects_non_positive_amount() {
        for amount in [json!(0), json!(-10), json!("0.00")] {
            let err = draft(json!({
                "package_id": 1,
                "total_amount": amount,
                "customer_email": "john@test.com",
                "travel_date": "2024-12-15"
            }))
            .validate()
            .unwrap_err();
            assert!(err.to_string().contains("greater than 0"));
        }
    }

    #[test]
    fn rejects_negative_counts_and_bad_dates() {
        let base = json!({
            "package_id": 1,
            "total_amount": 100,
            "customer_email": "john@test.com",
            "travel_date": "2024-12-15"
        });

        let mut negative = base.clone();
        negative["children"] = json!(-1);
        assert!(draft(negative).validate().unwrap_err().to_string().contains("children"));

        let mut bad_date = base.clone();
        bad_date["travel_date"] = json!("15/12/2024");
        assert!(draft(bad_date).validate().unwrap_err().to_string().contains("travel_date"));

        let mut no_adults = base;
        no_adults["adults"] = json!(0);
        assert!(draft(no_adults).validate().is_err());
    }

    #[test]
    fn merchant_order_id_charset() {
        let mut value = json!({
            "package_id": 1,
            "total_amount": 100,
            "customer_email": "john@test.com",
            "travel_date": "2024-12-15",
            "merchant_order_id": "VOY-20241215-abc_123"
        });
        assert_eq!(
            draft(value.clone()).validate().unwrap().merchant_order_id.as_deref(),
            Some("VOY-20241215-abc_123")
        );

        value["merchant_order_id"] = json!("drop table;");
        assert!(draft(value).validate().is_err());
    }

    #[test]
    fn accepts_stringified_blobs() {
        let passengers = json!([
            { "type": "adult", "firstName": "John", "lastName": "Smith" },
            { "type": "infant", "firstName": "Ella", "lastName": "Smith" }
        ]);
        let validated = draft(json!({
            "package_id": 1,
            "total_amount": "1999.50",
            "customer_email": "john@test.com",
            "travel_date": "2024-12-15",
            "adults": 1,
            "infants": 1,
            "passenger_details": passengers.to_string(),
            "contact_details": { "primary": { "name": "John Smith", "email": "john@test.com" } }
        }))
        .validate()
        .unwrap();

        assert_eq!(validated.passengers.len(), 2);
        assert_eq!(validated.total_amount, dec!(1999.50));
        assert!(validated.contact.is_some());
    }

    #[test]
    fn invalid_stringified_passengers_are_rejected() {
        let err = draft(json!({
            "package_id": 1,
            "total_amount": 100,
            "customer_email": "john@test.com",
            "travel_date": "2024-12-15",
            "passenger_details": "[{broken"
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }
    fn base() -> serde_json::Value {
        json!({
            "package_id": 1,
            "total_amount": 100,
            "customer_email": "john@test.com",
            "travel_date": "2024-12-15"
        })
    }

    #[test]
    fn oversized_counts_are_rejected_without_overflow() {
        let mut huge = base();
        huge["adults"] = json!(4_294_967_295u64);
        huge["children"] = json!(1);
        let err = draft(huge).validate().unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert!(err.to_string().contains("adults"));

        let mut too_many = base();
        too_many["adults"] = json!(30);
        too_many["children"] = json!(30);
        assert!(draft(too_many).validate().unwrap_err().to_string().contains("at most 50 travelers"));
    }

    #[test]
    fn rooms_are_bounded_by_travelers() {
        let mut rooms = base();
        rooms["rooms"] = json!(3_000_000_000u64);
        assert!(matches!(draft(rooms).validate(), Err(CoreError::ValidationError(_))));

        let mut three_rooms = base();
        three_rooms["adults"] = json!(2);
        three_rooms["rooms"] = json!(3);
        assert!(draft(three_rooms.clone()).validate().unwrap_err().to_string().contains("rooms"));

        three_rooms["rooms"] = json!(2);
        assert_eq!(draft(three_rooms).validate().unwrap().rooms, 2);
    }

    #[test]
    fn amount_must_fit_the_booking_column() {
        let mut largest = base();
        largest["total_amount"] = json!("9999999999.99");
        assert_eq!(draft(largest).validate().unwrap().total_amount, dec!(9999999999.99));

        let mut too_large = base();
        too_large["total_amount"] = json!("10000000000");
        assert!(draft(too_large).validate().unwrap_err().to_string().contains("less than"));
    }

    fn pending_booking() -> Booking {
        let validated = draft(json!({
            "package_id": 199,
            "total_amount": 2500,
            "customer_email": "john@test.com",
            "travel_date": "2024-12-15",
            "adults": 2
        }))
        .validate()
        .unwrap();
        let intent = crate::PaymentIntent {
            id: "int_1".to_string(),
            merchant_order_id: Some("ORD-1".to_string()),
            amount: dec!(2500),
            currency: "AUD".to_string(),
            status: crate::PaymentStatus::RequiresPaymentMethod,
            client_secret: None,
            created_at: None,
        };
        crate::NewBooking::pending(validated, "ORD-1".to_string(), &intent).into_booking(1, chrono::Utc::now())
    }

    #[test]
    fn update_checks_passengers_against_booking_counts() {
        let booking = pending_booking();
        let one_adult: BookingUpdateDraft = serde_json::from_value(json!({
            "passenger_details": [{ "type": "adult", "firstName": "John", "lastName": "Smith" }]
        }))
        .unwrap();
        assert!(matches!(one_adult.validate(&booking), Err(CoreError::ValidationError(_))));

        let two_adults: BookingUpdateDraft = serde_json::from_value(json!({
            "travel_date": "2025-01-10",
            "passenger_details": [
                { "type": "adult", "firstName": "John", "lastName": "Smith" },
                { "type": "adult", "firstName": "Jane", "lastName": "Smith" }
            ]
        }))
        .unwrap();
        let update = two_adults.validate(&booking).unwrap();
        assert_eq!(update.travel_date, NaiveDate::from_ymd_opt(2025, 1, 10));
        assert_eq!(update.passenger_details.map(|p| p.len()), Some(2));
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = BookingUpdateDraft::default().validate(&pending_booking()).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }
}
