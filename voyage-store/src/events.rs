use async_trait::async_trait;
use tracing::info;
use voyage_core::events::{EventPublisher, TOPIC_BOOKING_CREATED, TOPIC_BOOKING_SETTLED};
use voyage_core::CoreResult;
use voyage_shared::models::events::{BookingCreatedEvent, BookingSettledEvent};

/// Default publisher: lifecycle events go to the structured log only.
#[derive(Clone, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn booking_created(&self, event: &BookingCreatedEvent) -> CoreResult<()> {
        info!(
            topic = TOPIC_BOOKING_CREATED,
            booking_id = event.booking_id,
            payment_intent_id = %event.payment_intent_id,
            "booking event"
        );
        Ok(())
    }

    async fn booking_settled(&self, event: &BookingSettledEvent) -> CoreResult<()> {
        info!(
            topic = TOPIC_BOOKING_SETTLED,
            booking_id = event.booking_id,
            booking_status = event.booking_status,
            source = %event.source,
            "booking event"
        );
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaEventPublisher;

#[cfg(feature = "kafka")]
mod kafka {
    use super::*;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::error;
    use voyage_core::CoreError;

    #[derive(Clone)]
    pub struct KafkaEventPublisher {
        producer: FutureProducer,
    }

    impl KafkaEventPublisher {
        pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self { producer })
        }

        async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()> {
            let record = FutureRecord::to(topic).key(key).payload(payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        "Sent message to {}/{}: partition {} offset {}",
                        topic, key, delivery.partition, delivery.offset
                    );
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send message to {}: {}", topic, e);
                    Err(CoreError::InternalError(format!("kafka publish failed: {}", e)))
                }
            }
        }
    }

    fn encode<T: serde::Serialize>(event: &T) -> CoreResult<String> {
        serde_json::to_string(event)
            .map_err(|e| CoreError::InternalError(format!("could not encode event: {}", e)))
    }

    #[async_trait]
    impl EventPublisher for KafkaEventPublisher {
        async fn booking_created(&self, event: &BookingCreatedEvent) -> CoreResult<()> {
            let payload = encode(event)?;
            self.publish(TOPIC_BOOKING_CREATED, &event.booking_id.to_string(), &payload).await
        }

        async fn booking_settled(&self, event: &BookingSettledEvent) -> CoreResult<()> {
            let payload = encode(event)?;
            self.publish(TOPIC_BOOKING_SETTLED, &event.booking_id.to_string(), &payload).await
        }
    }
}
