use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;
use voyage_core::{CoreError, CoreResult, CreateIntentRequest, PaymentAdapter, PaymentIntent, PaymentStatus};

#[derive(Default)]
struct MockLedger {
    intents: HashMap<String, PaymentIntent>,
    by_request: HashMap<String, String>,
}

/// In-process stand-in for the payment processor.
///
/// Honors `request_id` idempotency like the real processor. With
/// `auto_succeed`, every lookup reports the intent as paid, which lets the
/// checkout flow complete locally without the hosted widget.
pub struct MockPaymentAdapter {
    ledger: Mutex<MockLedger>,
    auto_succeed: bool,
    failures_remaining: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MockPaymentAdapter {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(MockLedger::default()),
            auto_succeed: false,
            failures_remaining: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    pub fn auto_succeed() -> Self {
        Self { auto_succeed: true, ..Self::new() }
    }

    /// Make the next `count` processor calls fail as an upstream outage would.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Simulate the customer completing (or abandoning) the hosted payment step.
    pub async fn set_status(&self, intent_id: &str, status: PaymentStatus) -> CoreResult<()> {
        let mut ledger = self.ledger.lock().await;
        let intent = ledger
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| CoreError::UpstreamError(format!("unknown intent {}", intent_id)))?;
        intent.status = status;
        Ok(())
    }

    /// Number of create calls that reached the ledger, replays included.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub async fn intent_count(&self) -> usize {
        self.ledger.lock().await.intents.len()
    }

    fn injected_failure(&self) -> CoreResult<()> {
        let tripped = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(CoreError::UpstreamError("Simulated payment processor failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MockPaymentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn create_intent(&self, request: &CreateIntentRequest) -> CoreResult<PaymentIntent> {
        self.injected_failure()?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let mut ledger = self.ledger.lock().await;
        if let Some(existing_id) = ledger.by_request.get(&request.request_id).cloned() {
            if let Some(existing) = ledger.intents.get(&existing_id) {
                return Ok(existing.clone());
            }
        }

        let key = Uuid::new_v4().simple().to_string();
        let intent = PaymentIntent {
            id: format!("int_mock_{}", key),
            merchant_order_id: Some(request.merchant_order_id.clone()),
            amount: request.amount,
            currency: request.currency.clone(),
            status: PaymentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("cs_mock_{}", key)),
            created_at: Some(Utc::now()),
        };
        ledger.by_request.insert(request.request_id.clone(), intent.id.clone());
        ledger.intents.insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent> {
        self.injected_failure()?;

        let ledger = self.ledger.lock().await;
        let mut intent = ledger
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| CoreError::UpstreamError(format!("Payment intent {} not found at processor", intent_id)))?;

        if self.auto_succeed && intent.status.settles_to().is_none() {
            intent.status = PaymentStatus::Succeeded;
        }
        Ok(intent)
    }
}
