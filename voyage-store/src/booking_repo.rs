use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use voyage_core::repository::BookingRepository;
use voyage_core::traveler::{ContactDetails, Passenger};
use voyage_core::{
    Booking, BookingStatus, BookingUpdate, CoreError, CoreResult, NewBooking, SettleOutcome, Upserted,
};
use voyage_shared::Masked;

use crate::error::db;
use crate::StoreError;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, payment_intent_id, merchant_order_id, package_id, customer_name, \
     customer_email, customer_phone, travel_date, adults, children, infants, rooms, booking_amount, \
     currency, booking_status, payment_status, passenger_details, contact_details, special_requests, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    payment_intent_id: String,
    merchant_order_id: String,
    package_id: i64,
    customer_name: Option<String>,
    customer_email: String,
    customer_phone: Option<String>,
    travel_date: NaiveDate,
    adults: i32,
    children: i32,
    infants: i32,
    rooms: i32,
    booking_amount: Decimal,
    currency: String,
    booking_status: i16,
    payment_status: String,
    passenger_details: Json<Vec<Passenger>>,
    contact_details: Option<Json<ContactDetails>>,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn count(value: i32, column: &str, id: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("booking {} has negative {}", id, column)))
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Ok(Booking {
            id,
            payment_intent_id: row.payment_intent_id,
            merchant_order_id: row.merchant_order_id,
            package_id: row.package_id,
            customer_name: row.customer_name,
            customer_email: Masked::new(row.customer_email),
            customer_phone: row.customer_phone,
            travel_date: row.travel_date,
            adults: count(row.adults, "adults", id)?,
            children: count(row.children, "children", id)?,
            infants: count(row.infants, "infants", id)?,
            rooms: count(row.rooms, "rooms", id)?,
            booking_amount: row.booking_amount,
            currency: row.currency,
            booking_status: BookingStatus::try_from(row.booking_status)?,
            payment_status: row.payment_status,
            passenger_details: row.passenger_details.0,
            contact_details: row.contact_details.map(|c| c.0),
            special_requests: row.special_requests,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgBookingRepository {
    async fn fetch_one_where(&self, clause: &str, key: &str) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE {} = $1", BOOKING_COLUMNS, clause);
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(Booking::try_from)
            .transpose()
    }
}

/// Counts are `INTEGER` columns; anything wider is rejected rather than truncated.
fn int_column(value: u32, column: &str) -> CoreResult<i32> {
    i32::try_from(value).map_err(|_| CoreError::ValidationError(format!("{} is out of range", column)))
}

fn collect(rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert_pending(&self, booking: &NewBooking) -> CoreResult<Upserted> {
        let sql = format!(
            "INSERT INTO bookings (payment_intent_id, merchant_order_id, package_id, customer_name, \
             customer_email, customer_phone, travel_date, adults, children, infants, rooms, \
             booking_amount, currency, booking_status, payment_status, passenger_details, \
             contact_details, special_requests) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 0, 'pending', $14, $15, $16) \
             ON CONFLICT (merchant_order_id) DO NOTHING \
             RETURNING {}",
            BOOKING_COLUMNS
        );

        let adults = int_column(booking.adults, "adults")?;
        let children = int_column(booking.children, "children")?;
        let infants = int_column(booking.infants, "infants")?;
        let rooms = int_column(booking.rooms, "rooms")?;

        let inserted = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(&booking.payment_intent_id)
            .bind(&booking.merchant_order_id)
            .bind(booking.package_id)
            .bind(&booking.customer_name)
            .bind(booking.customer_email.expose())
            .bind(&booking.customer_phone)
            .bind(booking.travel_date)
            .bind(adults)
            .bind(children)
            .bind(infants)
            .bind(rooms)
            .bind(booking.booking_amount)
            .bind(&booking.currency)
            .bind(Json(&booking.passenger_details))
            .bind(booking.contact_details.as_ref().map(Json))
            .bind(&booking.special_requests)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;

        match inserted {
            Some(row) => Ok(Upserted::Created(row.try_into()?)),
            None => self
                .find_by_merchant_order(&booking.merchant_order_id)
                .await?
                .map(Upserted::Existing)
                .ok_or_else(|| {
                    CoreError::InternalError(format!(
                        "merchant_order_id {} conflicted but no row is visible",
                        booking.merchant_order_id
                    ))
                }),
        }
    }

    async fn find_by_id(&self, id: i64) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> CoreResult<Option<Booking>> {
        self.fetch_one_where("payment_intent_id", payment_intent_id).await
    }

    async fn find_by_merchant_order(&self, merchant_order_id: &str) -> CoreResult<Option<Booking>> {
        self.fetch_one_where("merchant_order_id", merchant_order_id).await
    }

    async fn list_by_customer(&self, customer_email: &str) -> CoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE LOWER(customer_email) = LOWER($1) ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(customer_email)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        collect(rows)
    }

    async fn list_all(&self, limit: i64, offset: i64) -> CoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        collect(rows)
    }

    async fn settle(
        &self,
        payment_intent_id: &str,
        target: BookingStatus,
        payment_status: &str,
    ) -> CoreResult<SettleOutcome> {
        // The status guard makes this a compare-and-set; concurrent settlers
        // see zero rows and fall through to the re-read below.
        let sql = format!(
            "UPDATE bookings SET booking_status = $2, payment_status = $3, updated_at = NOW() \
             WHERE payment_intent_id = $1 AND booking_status = 0 \
             RETURNING {}",
            BOOKING_COLUMNS
        );
        let updated = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(payment_intent_id)
            .bind(i16::from(target.code()))
            .bind(payment_status)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;

        if let Some(row) = updated {
            return Ok(SettleOutcome::Transitioned(row.try_into()?));
        }

        self.find_by_payment_intent(payment_intent_id)
            .await?
            .map(SettleOutcome::Unchanged)
            .ok_or_else(|| CoreError::NotFound(format!("No booking for payment intent {}", payment_intent_id)))
    }

    async fn update_details(&self, id: i64, update: &BookingUpdate) -> CoreResult<Booking> {
        let sql = format!(
            "UPDATE bookings SET \
                travel_date = COALESCE($2, travel_date), \
                special_requests = COALESCE($3, special_requests), \
                passenger_details = COALESCE($4, passenger_details), \
                contact_details = COALESCE($5, contact_details), \
                updated_at = NOW() \
             WHERE id = $1 AND booking_status = 0 \
             RETURNING {}",
            BOOKING_COLUMNS
        );
        let updated = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(update.travel_date)
            .bind(&update.special_requests)
            .bind(update.passenger_details.as_ref().map(Json))
            .bind(update.contact_details.as_ref().map(Json))
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;

        if let Some(row) = updated {
            return row.try_into();
        }

        match self.find_by_id(id).await? {
            None => Err(CoreError::NotFound(format!("Booking {} not found", id))),
            Some(existing) => Err(CoreError::Conflict(format!(
                "Booking {} is {} and can no longer be modified",
                id,
                existing.booking_status.label()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_beyond_integer_range_are_rejected() {
        assert_eq!(int_column(4, "adults").unwrap(), 4);
        let err = int_column(3_000_000_000, "rooms").unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(msg) if msg.contains("rooms")));
    }
}
