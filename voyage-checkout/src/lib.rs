pub mod initiator;
pub mod reconciler;
pub mod webhook;
pub mod mock;

pub use initiator::{InitiatedPayment, PaymentIntentInitiator};
pub use reconciler::{ObservedPayment, PaymentReconciler, PaymentStatusView, Reconciliation, SettlementSource};
pub use webhook::{PaymentEvent, WebhookDisposition, WebhookListener};
pub use mock::MockPaymentAdapter;
