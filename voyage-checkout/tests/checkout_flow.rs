use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::sync::Mutex;
use voyage_checkout::{
    MockPaymentAdapter, ObservedPayment, PaymentEvent, PaymentIntentInitiator, PaymentReconciler,
    SettlementSource, WebhookDisposition, WebhookListener,
};
use voyage_core::events::EventPublisher;
use voyage_core::repository::BookingRepository;
use voyage_core::{BookingDraft, BookingStatus, CoreError, CoreResult, PaymentStatus};
use voyage_shared::models::events::{BookingCreatedEvent, BookingSettledEvent};
use voyage_store::{demo_packages, InMemoryStore};

#[derive(Default)]
struct RecordingPublisher {
    created: Mutex<Vec<BookingCreatedEvent>>,
    settled: Mutex<Vec<BookingSettledEvent>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn booking_created(&self, event: &BookingCreatedEvent) -> CoreResult<()> {
        self.created.lock().await.push(event.clone());
        Ok(())
    }

    async fn booking_settled(&self, event: &BookingSettledEvent) -> CoreResult<()> {
        self.settled.lock().await.push(event.clone());
        Ok(())
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    payments: Arc<MockPaymentAdapter>,
    events: Arc<RecordingPublisher>,
    initiator: PaymentIntentInitiator,
    reconciler: Arc<PaymentReconciler>,
    webhooks: WebhookListener,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::with_packages(demo_packages()));
    let payments = Arc::new(MockPaymentAdapter::new());
    let events = Arc::new(RecordingPublisher::default());

    let initiator = PaymentIntentInitiator::new(payments.clone(), store.clone(), store.clone(), events.clone());
    let reconciler = Arc::new(PaymentReconciler::new(payments.clone(), store.clone(), events.clone()));
    let webhooks = WebhookListener::new(reconciler.clone(), store.clone());

    Harness { store, payments, events, initiator, reconciler, webhooks }
}

fn draft() -> BookingDraft {
    serde_json::from_value(json!({
        "package_id": 199,
        "total_amount": 2500,
        "customer_email": "john@test.com",
        "travel_date": "2024-12-15",
        "adults": 2,
        "passenger_details": [
            { "id": 1, "type": "adult", "title": "Mr", "firstName": "John", "lastName": "Smith", "passportNumber": "PA1234567" },
            { "id": 2, "type": "adult", "title": "Mrs", "firstName": "Jane", "lastName": "Smith" }
        ]
    }))
    .unwrap()
}

fn event(id: &str, name: &str, intent: &str) -> PaymentEvent {
    PaymentEvent {
        event_id: id.to_string(),
        name: name.to_string(),
        payment_intent_id: Some(intent.to_string()),
        amount: Some(dec!(2500)),
        currency: Some("AUD".to_string()),
    }
}

#[tokio::test]
async fn initiation_persists_pending_booking_with_passengers() {
    let h = harness();
    let initiated = h.initiator.initiate(draft()).await.unwrap();

    let booking = h.store.find_by_id(initiated.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.booking_status, BookingStatus::Pending);
    assert_eq!(booking.payment_intent_id, initiated.payment_intent_id);
    assert_eq!(booking.merchant_order_id, initiated.merchant_order_id);
    assert_eq!(booking.passenger_details.len(), 2);
    assert_eq!(
        booking.passenger_details[0].passport_number.as_ref().map(|p| p.expose().as_str()),
        Some("PA1234567")
    );
    assert_eq!(booking.passenger_details[1].passport_number, None);
    assert_eq!(h.events.created.lock().await.len(), 1);
}

#[tokio::test]
async fn concurrent_initiations_with_one_token_create_one_booking() {
    let h = Arc::new(harness());
    let mut token_draft = draft();
    token_draft.merchant_order_id = Some("WEB-RACE-1".to_string());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = h.clone();
            let d = token_draft.clone();
            tokio::spawn(async move { h.initiator.initiate(d).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let initiated = handle.await.unwrap().unwrap();
        ids.push((initiated.booking_id, initiated.payment_intent_id));
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(h.store.booking_count().await, 1);
    assert_eq!(h.payments.intent_count().await, 1);
    assert_eq!(h.events.created.lock().await.len(), 1);
}

#[tokio::test]
async fn replay_by_another_customer_is_refused() {
    let h = harness();
    let mut john = draft();
    john.merchant_order_id = Some("VOY-20241215-000000000001".to_string());
    let initiated = h.initiator.initiate(john.clone()).await.unwrap();

    let mut stranger = john.clone();
    stranger.customer_email = Some("attacker@evil.com".to_string());
    let err = h.initiator.initiate(stranger).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let mut more_travelers = john.clone();
    more_travelers.adults = Some(1);
    more_travelers.children = Some(1);
    more_travelers.passenger_details = None;
    assert!(matches!(h.initiator.initiate(more_travelers).await, Err(CoreError::Conflict(_))));

    // Email comparison ignores case, so the owner can still retry.
    let mut owner = john;
    owner.customer_email = Some("John@Test.com".to_string());
    let replayed = h.initiator.initiate(owner).await.unwrap();
    assert!(replayed.replayed);
    assert_eq!(replayed.booking_id, initiated.booking_id);
    assert_eq!(h.store.booking_count().await, 1);
}

#[tokio::test]
async fn racing_stranger_does_not_receive_the_winners_secret() {
    let h = Arc::new(harness());
    let mut john = draft();
    john.merchant_order_id = Some("WEB-RACE-2".to_string());
    let mut stranger = john.clone();
    stranger.customer_email = Some("attacker@evil.com".to_string());

    let (a, b) = tokio::join!(h.initiator.initiate(john), h.initiator.initiate(stranger));
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(CoreError::Conflict(_)))));
    assert_eq!(h.store.booking_count().await, 1);
}

#[tokio::test]
async fn replay_after_settlement_is_refused() {
    let h = harness();
    let mut token_draft = draft();
    token_draft.merchant_order_id = Some("WEB-PAID-1".to_string());

    let initiated = h.initiator.initiate(token_draft.clone()).await.unwrap();
    h.payments.set_status(&initiated.payment_intent_id, PaymentStatus::Succeeded).await.unwrap();
    h.reconciler.confirm(&initiated.payment_intent_id).await.unwrap();

    let err = h.initiator.initiate(token_draft).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_confirmations_publish_once() {
    let h = Arc::new(harness());
    let initiated = h.initiator.initiate(draft()).await.unwrap();
    h.payments.set_status(&initiated.payment_intent_id, PaymentStatus::Succeeded).await.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let h = h.clone();
            let id = initiated.payment_intent_id.clone();
            tokio::spawn(async move { h.reconciler.confirm(&id).await.unwrap() })
        })
        .collect();

    let mut transitions = 0;
    for handle in handles {
        let reconciliation = handle.await.unwrap();
        assert_eq!(reconciliation.booking.booking_status, BookingStatus::Confirmed);
        if reconciliation.transitioned {
            transitions += 1;
        }
    }
    assert_eq!(transitions, 1);
    assert_eq!(h.events.settled.lock().await.len(), 1);
}

#[tokio::test]
async fn processor_amount_must_match_booking() {
    let h = harness();
    let initiated = h.initiator.initiate(draft()).await.unwrap();

    let observed = ObservedPayment {
        status: PaymentStatus::Succeeded,
        amount: Some(dec!(2499.99)),
        currency: Some("AUD".to_string()),
    };
    let err = h
        .reconciler
        .settle_intent(&initiated.payment_intent_id, observed, SettlementSource::Webhook)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let booking = h.store.find_by_id(initiated.booking_id).await.unwrap().unwrap();
    assert_eq!(booking.booking_status, BookingStatus::Pending);
}

#[tokio::test]
async fn out_of_order_webhooks_keep_first_outcome() {
    let h = harness();
    let initiated = h.initiator.initiate(draft()).await.unwrap();
    let intent = initiated.payment_intent_id.as_str();

    let cancelled = h.webhooks.handle(event("evt_2", "payment_intent.cancelled", intent)).await.unwrap();
    assert!(matches!(cancelled, WebhookDisposition::Applied(ref b) if b.booking_status == BookingStatus::Failed));

    let succeeded = h.webhooks.handle(event("evt_1", "payment_intent.succeeded", intent)).await.unwrap();
    assert!(matches!(succeeded, WebhookDisposition::AlreadySettled(ref b) if b.booking_status == BookingStatus::Failed));

    let duplicate = h.webhooks.handle(event("evt_2", "payment_intent.cancelled", intent)).await.unwrap();
    assert!(matches!(duplicate, WebhookDisposition::Duplicate));

    assert_eq!(h.events.settled.lock().await.len(), 1);
}

#[tokio::test]
async fn unknown_intent_is_not_recorded() {
    let h = harness();
    let err = h
        .webhooks
        .handle(event("evt_9", "payment_intent.succeeded", "int_nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    use voyage_core::repository::WebhookEventRepository;
    assert!(!h.store.is_processed("evt_9").await.unwrap());
}

#[tokio::test]
async fn status_survives_processor_outage() {
    let h = harness();
    let initiated = h.initiator.initiate(draft()).await.unwrap();
    h.payments.fail_next(1);

    let view = h.reconciler.status(&initiated.payment_intent_id).await.unwrap();
    assert_eq!(view.booking_status, BookingStatus::Pending);
    assert_eq!(view.processor_status, None);
}
