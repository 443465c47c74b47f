use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::Client;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::error::ProducerError;
use crate::stream::classify_sdk_error;

use super::{DeliveryFuture, ProducerFactory, RecordAck, RecordProducer, UserRecord};

/// Producer writing each record with its own `PutRecord` call.
///
/// Every in-flight call runs on a task owned by the tracker, so flushing is a matter
/// of waiting for the tracker to drain.
pub struct KinesisProducer {
    client: Client,
    tracker: TaskTracker,
    destroyed: AtomicBool,
}

impl KinesisProducer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            tracker: TaskTracker::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    async fn put_record(client: Client, record: UserRecord) -> Result<RecordAck, ProducerError> {
        let output = client
            .put_record()
            .stream_name(&record.stream_name)
            .partition_key(record.partition_key)
            .data(Blob::new(record.data.to_vec()))
            .send()
            .await
            .map_err(|err| ProducerError::Put {
                stream: record.stream_name.clone(),
                source: classify_sdk_error(&err),
            })?;

        Ok(RecordAck {
            shard_id: output.shard_id().to_owned(),
            sequence_number: output.sequence_number().to_owned(),
        })
    }
}

#[async_trait]
impl RecordProducer for KinesisProducer {
    fn submit(&self, record: UserRecord) -> Result<DeliveryFuture, ProducerError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(ProducerError::Destroyed);
        }

        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        self.tracker.spawn(async move {
            let result = Self::put_record(client, record).await;
            // The receiver may be gone, nobody is waiting for this outcome then
            drop(tx.send(result));
        });

        Ok(rx)
    }

    async fn flush(&self) -> Result<(), ProducerError> {
        debug!(outstanding = self.tracker.len(), "flushing Kinesis producer");

        self.tracker.close();
        self.tracker.wait().await;
        if !self.destroyed.load(Ordering::SeqCst) {
            self.tracker.reopen();
        }

        Ok(())
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.tracker.close();
        info!(outstanding = self.tracker.len(), "Kinesis producer destroyed");
    }
}

pub struct KinesisProducerFactory {
    client: Client,
}

impl KinesisProducerFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ProducerFactory for KinesisProducerFactory {
    fn create(&self) -> Result<Box<dyn RecordProducer>, ProducerError> {
        Ok(Box::new(KinesisProducer::new(self.client.clone())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use aws_sdk_kinesis::config::retry::RetryConfig;
    use aws_sdk_kinesis::config::{BehaviorVersion, Credentials, Region};
    use bytes::Bytes;

    use super::*;

    // Nothing listens on port 1, every call fails with a connection error
    fn unreachable_client() -> Client {
        let config = aws_sdk_kinesis::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .endpoint_url("http://127.0.0.1:1")
            .retry_config(RetryConfig::disabled())
            .build();
        Client::from_conf(config)
    }

    fn record(n: usize) -> UserRecord {
        UserRecord {
            stream_name: "test-stream".to_string(),
            partition_key: format!("Message {n}"),
            data: Bytes::from(format!("Message {n}")),
        }
    }

    #[tokio::test]
    async fn flush_waits_for_every_submitted_record() {
        let producer = KinesisProducer::new(unreachable_client());

        let mut deliveries: Vec<DeliveryFuture> = (0..3)
            .map(|n| producer.submit(record(n)).unwrap())
            .collect();

        producer.flush().await.unwrap();

        for delivery in &mut deliveries {
            match delivery.try_recv() {
                Ok(Err(ProducerError::Put { stream, .. })) => assert_eq!(stream, "test-stream"),
                other => panic!("record not resolved by flush: {other:?}"),
            }
        }

        // Still usable after a flush
        let delivery = producer.submit(record(3)).unwrap();
        assert!(matches!(
            delivery.await,
            Ok(Err(ProducerError::Put { .. }))
        ));
    }

    #[tokio::test]
    async fn flush_with_nothing_outstanding_returns_right_away() {
        let producer = KinesisProducer::new(unreachable_client());

        tokio::time::timeout(Duration::from_secs(1), producer.flush())
            .await
            .expect("flush did not return")
            .unwrap();
    }

    #[tokio::test]
    async fn destroyed_producer_refuses_records() {
        let producer = KinesisProducer::new(unreachable_client());

        producer.destroy().await;

        assert!(matches!(
            producer.submit(record(0)),
            Err(ProducerError::Destroyed)
        ));
    }
}
