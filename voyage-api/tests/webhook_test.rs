mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_signed_success_webhook_confirms_booking() {
    let app = TestApp::new();
    let created = app.initiate().await;
    let intent_id = created["payment_intent_id"].as_str().unwrap();

    let (status, body) = app.webhook("evt_1", "payment_intent.succeeded", intent_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let (_, booking) = app.booking(&created["booking_id"]).await;
    assert_eq!(booking["booking_status"], 1);
    assert_eq!(booking["payment_status"], "succeeded");

    let settled = app.events.settled.lock().await;
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].source, "webhook");
}

#[tokio::test]
async fn test_bad_signature_is_rejected_without_mutation() {
    let app = TestApp::new();
    let created = app.initiate().await;
    let intent_id = created["payment_intent_id"].as_str().unwrap();

    let payload = json!({
        "id": "evt_forged",
        "name": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id } }
    })
    .to_string();
    let timestamp = Utc::now().timestamp_millis().to_string();

    let (status, _) = app.raw_webhook(payload.clone(), &timestamp, "deadbeef").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.raw_webhook(payload, "", "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, booking) = app.booking(&created["booking_id"]).await;
    assert_eq!(booking["booking_status"], 0);
}

#[tokio::test]
async fn test_duplicate_delivery_applies_once() {
    let app = TestApp::new();
    let created = app.initiate().await;
    let intent_id = created["payment_intent_id"].as_str().unwrap();

    let (_, first) = app.webhook("evt_1", "payment_intent.succeeded", intent_id).await;
    let (status, second) = app.webhook("evt_1", "payment_intent.succeeded", intent_id).await;

    assert_eq!(first["outcome"], "applied");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "duplicate");
    assert_eq!(app.events.settled.lock().await.len(), 1);
}

#[tokio::test]
async fn test_late_cancellation_cannot_undo_confirmation() {
    let app = TestApp::new();
    let created = app.initiate().await;
    let intent_id = created["payment_intent_id"].as_str().unwrap();

    app.webhook("evt_1", "payment_intent.succeeded", intent_id).await;
    let (status, body) = app.webhook("evt_2", "payment_intent.cancelled", intent_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_settled");

    let (_, booking) = app.booking(&created["booking_id"]).await;
    assert_eq!(booking["booking_status"], 1);
}

#[tokio::test]
async fn test_attempt_failure_keeps_booking_pending() {
    let app = TestApp::new();
    let created = app.initiate().await;
    let intent_id = created["payment_intent_id"].as_str().unwrap();

    let (status, body) = app.webhook("evt_1", "payment_attempt.failed", intent_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");

    let (_, booking) = app.booking(&created["booking_id"]).await;
    assert_eq!(booking["booking_status"], 0);
}

#[tokio::test]
async fn test_webhook_and_confirmation_race_settles_once() {
    let app = TestApp::new();
    let created = app.initiate().await;
    let intent_id = created["payment_intent_id"].as_str().unwrap().to_string();
    app.payments
        .set_status(&intent_id, voyage_core::PaymentStatus::Succeeded)
        .await
        .unwrap();

    let (hook, confirm) = tokio::join!(
        app.webhook("evt_1", "payment_intent.succeeded", &intent_id),
        app.post("/confirm-payment", json!({ "payment_intent_id": intent_id }))
    );
    assert_eq!(hook.0, StatusCode::OK);
    assert_eq!(confirm.0, StatusCode::OK);
    assert_eq!(confirm.1["booking_status"], 1);
    assert_eq!(app.events.settled.lock().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_intent_asks_for_redelivery() {
    let app = TestApp::new();
    let (status, _) = app.webhook("evt_1", "payment_intent.succeeded", "int_unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Not recorded, so a later redelivery is still processed.
    let (status, _) = app.webhook("evt_1", "payment_intent.succeeded", "int_unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_amount_mismatch_is_refused() {
    let app = TestApp::new();
    let created = app.initiate().await;
    let intent_id = created["payment_intent_id"].as_str().unwrap();

    let payload = json!({
        "id": "evt_1",
        "name": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id, "amount": 25.0, "currency": "AUD" } }
    })
    .to_string();
    let timestamp = Utc::now().timestamp_millis().to_string();
    let signature = voyage_store::WebhookVerifier::new(common::WEBHOOK_SECRET, 300).sign(&timestamp, payload.as_bytes());

    let (status, _) = app.raw_webhook(payload, &timestamp, &signature).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, booking) = app.booking(&created["booking_id"]).await;
    assert_eq!(booking["booking_status"], 0);
}
