pub mod app_config;
pub mod error;
pub mod database;
pub mod booking_repo;
pub mod package_repo;
pub mod webhook_repo;
pub mod memory;
pub mod airwallex;
pub mod redis_repo;
pub mod events;

pub use database::DbClient;
pub use error::StoreError;
pub use redis_repo::RedisClient;
pub use booking_repo::PgBookingRepository;
pub use package_repo::PgPackageRepository;
pub use webhook_repo::PgWebhookEventRepository;
pub use memory::{demo_packages, InMemoryStore};
pub use airwallex::{AirwallexAdapter, SignatureError, WebhookVerifier};
pub use events::LogEventPublisher;
#[cfg(feature = "kafka")]
pub use events::KafkaEventPublisher;
