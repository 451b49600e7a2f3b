use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use voyage_core::repository::{
    BookingRepository, PackageRepository, WebhookEventRecord, WebhookEventRepository,
};
use voyage_core::{
    Booking, BookingStatus, BookingUpdate, CoreError, CoreResult, NewBooking, SettleOutcome,
    TravelPackage, Upserted,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    bookings: BTreeMap<i64, Booking>,
    packages: BTreeMap<i64, TravelPackage>,
    webhook_events: HashMap<String, WebhookEventRecord>,
}

impl Tables {
    fn by_intent_mut(&mut self, payment_intent_id: &str) -> Option<&mut Booking> {
        self.bookings
            .values_mut()
            .find(|b| b.payment_intent_id == payment_intent_id)
    }
}

/// Process-local backing for all three repositories. Used when no database is
/// configured and by the test suites. Every operation holds the table lock,
/// so the unique keys and the settle guard behave as the Postgres constraints do.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packages(packages: impl IntoIterator<Item = TravelPackage>) -> Self {
        let tables = Tables {
            packages: packages.into_iter().map(|p| (p.id, p)).collect(),
            ..Tables::default()
        };
        Self { tables: RwLock::new(tables) }
    }

    pub async fn add_package(&self, package: TravelPackage) {
        self.tables.write().await.packages.insert(package.id, package);
    }

    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }
}

/// Small catalogue for local runs without a database.
pub fn demo_packages() -> Vec<TravelPackage> {
    let package = |id: i64, title: &str, destination: &str, days: u32, price: i64| TravelPackage {
        id,
        title: title.to_string(),
        destination: destination.to_string(),
        duration_days: days,
        price: Decimal::new(price, 0),
        currency: "AUD".to_string(),
        is_active: true,
    };
    vec![
        package(101, "Kyoto Autumn Colours", "Kyoto, Japan", 7, 3200),
        package(150, "Great Barrier Reef Escape", "Cairns, Australia", 5, 1850),
        package(199, "Bali Wellness Retreat", "Ubud, Indonesia", 6, 2500),
    ]
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert_pending(&self, booking: &NewBooking) -> CoreResult<Upserted> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .bookings
            .values()
            .find(|b| b.merchant_order_id == booking.merchant_order_id)
        {
            return Ok(Upserted::Existing(existing.clone()));
        }
        if tables
            .bookings
            .values()
            .any(|b| b.payment_intent_id == booking.payment_intent_id)
        {
            return Err(CoreError::Conflict(format!(
                "payment intent {} is already bound to a booking",
                booking.payment_intent_id
            )));
        }

        tables.next_id += 1;
        let id = tables.next_id;
        let created = booking.clone().into_booking(id, Utc::now());
        tables.bookings.insert(id, created.clone());
        Ok(Upserted::Created(created))
    }

    async fn find_by_id(&self, id: i64) -> CoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> CoreResult<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|b| b.payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn find_by_merchant_order(&self, merchant_order_id: &str) -> CoreResult<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|b| b.merchant_order_id == merchant_order_id)
            .cloned())
    }

    async fn list_by_customer(&self, customer_email: &str) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .rev()
            .filter(|b| b.customer_email.expose().eq_ignore_ascii_case(customer_email))
            .cloned()
            .collect())
    }

    async fn list_all(&self, limit: i64, offset: i64) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn settle(
        &self,
        payment_intent_id: &str,
        target: BookingStatus,
        payment_status: &str,
    ) -> CoreResult<SettleOutcome> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .by_intent_mut(payment_intent_id)
            .ok_or_else(|| CoreError::NotFound(format!("No booking for payment intent {}", payment_intent_id)))?;

        if !booking.booking_status.can_transition_to(target) {
            return Ok(SettleOutcome::Unchanged(booking.clone()));
        }

        booking.booking_status = target;
        booking.payment_status = payment_status.to_string();
        booking.updated_at = Utc::now();
        Ok(SettleOutcome::Transitioned(booking.clone()))
    }

    async fn update_details(&self, id: i64, update: &BookingUpdate) -> CoreResult<Booking> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Booking {} not found", id)))?;

        if booking.booking_status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Booking {} is {} and can no longer be modified",
                id,
                booking.booking_status.label()
            )));
        }

        update.apply_to(booking);
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }
}

#[async_trait]
impl PackageRepository for InMemoryStore {
    async fn get_package(&self, id: i64) -> CoreResult<Option<TravelPackage>> {
        Ok(self.tables.read().await.packages.get(&id).cloned())
    }

    async fn list_active(&self) -> CoreResult<Vec<TravelPackage>> {
        let tables = self.tables.read().await;
        Ok(tables.packages.values().filter(|p| p.is_active).cloned().collect())
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryStore {
    async fn is_processed(&self, event_id: &str) -> CoreResult<bool> {
        Ok(self.tables.read().await.webhook_events.contains_key(event_id))
    }

    async fn mark_processed(&self, record: &WebhookEventRecord) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.webhook_events.contains_key(&record.event_id) {
            return Ok(false);
        }
        tables
            .webhook_events
            .insert(record.event_id.clone(), record.clone());
        Ok(true)
    }
}
