use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use supplier_core::{
    ChannelError, CommandPublisher, Delivery, DeliveryTag, Lane, LaneSubscriber, LaneSubscription,
};
use tracing::{debug, error, info};

use crate::app_config::KafkaConfig;

fn unavailable(err: rdkafka::error::KafkaError) -> ChannelError {
    ChannelError::Unavailable(err.to_string())
}

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("acks", "all")
            .create()?;

        Ok(Self { producer })
    }

    /// Send one record and wait for the broker's delivery report.
    pub async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                debug!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CommandPublisher for EventProducer {
    async fn publish(&self, lane: Lane, payload: Vec<u8>) -> Result<(), ChannelError> {
        // Constant key pins the whole lane to one partition, which keeps it FIFO
        self.send(lane.topic(), lane.topic(), &payload)
            .await
            .map_err(unavailable)
    }
}

/// Opens one manually-committed consumer per lane.
pub struct KafkaLaneSubscriber {
    brokers: String,
    group_id: String,
}

impl KafkaLaneSubscriber {
    pub fn new(config: &KafkaConfig) -> Self {
        Self {
            brokers: config.brokers.clone(),
            group_id: config.group_id.clone(),
        }
    }
}

#[async_trait]
impl LaneSubscriber for KafkaLaneSubscriber {
    async fn subscribe(&self, lane: Lane) -> Result<Box<dyn LaneSubscription>, ChannelError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", format!("{}.{}", self.group_id, lane.topic()))
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(unavailable)?;

        consumer.subscribe(&[lane.topic()]).map_err(unavailable)?;
        info!("Subscribed to lane {}", lane);

        Ok(Box::new(KafkaLaneSubscription { consumer, lane }))
    }
}

/// Offsets are committed only on `ack`; a restart resumes at the last committed offset,
/// so anything that was delivered but never acked is delivered again.
pub struct KafkaLaneSubscription {
    consumer: StreamConsumer,
    lane: Lane,
}

#[async_trait]
impl LaneSubscription for KafkaLaneSubscription {
    fn lane(&self) -> Lane {
        self.lane
    }

    async fn next(&mut self) -> Result<Delivery, ChannelError> {
        let message = self.consumer.recv().await.map_err(unavailable)?;
        Ok(Delivery {
            payload: message.payload().unwrap_or_default().to_vec(),
            tag: DeliveryTag {
                partition: message.partition(),
                offset: message.offset(),
            },
        })
    }

    async fn ack(&mut self, tag: DeliveryTag) -> Result<(), ChannelError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(self.lane.topic(), tag.partition, Offset::Offset(tag.offset + 1))
            .map_err(unavailable)?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(unavailable)
    }

    async fn nack(&mut self, tag: DeliveryTag) -> Result<(), ChannelError> {
        // Rewind so the same message is fetched again
        self.consumer
            .seek(
                self.lane.topic(),
                tag.partition,
                Offset::Offset(tag.offset),
                Duration::from_secs(5),
            )
            .map_err(unavailable)
    }
}
