use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, error, info, instrument};

use crate::error::{EncodingFault, ProducerError};
use crate::metrics_constants::{
    ACK_LATENCY, RECORDS_ACKED, RECORDS_DROPPED, RECORDS_FAILED, RECORDS_SUBMITTED,
};
use crate::producer::{DeliveryFuture, RecordProducer, UserRecord};
use crate::scheduler::{PublishTask, TickHandler};

const MAX_PARTITION_KEY_CHARS: usize = 256;

/// Turn a payload into a record. The payload text doubles as the partition key.
pub fn encode(stream_name: &str, payload: Bytes) -> Result<UserRecord, EncodingFault> {
    let partition_key = std::str::from_utf8(&payload)?.to_owned();

    let chars = partition_key.chars().count();
    if chars == 0 || chars > MAX_PARTITION_KEY_CHARS {
        return Err(EncodingFault::InvalidPartitionKey { chars });
    }

    Ok(UserRecord {
        stream_name: stream_name.to_owned(),
        partition_key,
        data: payload,
    })
}

/// Submits records to the stream and drains them on shutdown.
pub struct RecordPublisher {
    producer: Box<dyn RecordProducer>,
    stream_name: String,
}

impl RecordPublisher {
    pub fn new(producer: Box<dyn RecordProducer>, stream_name: impl Into<String>) -> Self {
        Self {
            producer,
            stream_name: stream_name.into(),
        }
    }

    /// Hand the payload over for delivery without waiting for it.
    ///
    /// Payloads that can't be encoded are logged and dropped. The only error is the
    /// producer refusing the record outright, delivery failures are logged by a
    /// detached watcher.
    pub fn submit(&self, payload: Bytes) -> Result<(), ProducerError> {
        let record = match encode(&self.stream_name, payload) {
            Ok(record) => record,
            Err(fault) => {
                let cause = match fault {
                    EncodingFault::InvalidUtf8(_) => "invalid_utf8",
                    EncodingFault::InvalidPartitionKey { .. } => "invalid_partition_key",
                };
                counter!(RECORDS_DROPPED, "cause" => cause).increment(1);
                error!("dropping record that can't be encoded: {}", fault);
                return Ok(());
            }
        };

        let partition_key = record.partition_key.clone();
        let delivery = self.producer.submit(record)?;
        counter!(RECORDS_SUBMITTED).increment(1);
        debug!(%partition_key, "record submitted");

        tokio::spawn(watch_ack(delivery, partition_key));
        Ok(())
    }

    /// Wait for every submitted record to resolve, then release the producer.
    ///
    /// The producer is destroyed even if flushing failed. There is no timeout, a
    /// stuck producer blocks here.
    #[instrument(skip_all, fields(stream = %self.stream_name))]
    pub async fn flush_and_close(&self) -> Result<(), ProducerError> {
        info!("Flushing remaining records.");
        let flushed = self.producer.flush().await;

        info!("Destroying producer.");
        self.producer.destroy().await;

        flushed
    }
}

async fn watch_ack(delivery: DeliveryFuture, partition_key: String) {
    let started = Instant::now();

    match delivery.await {
        Ok(Ok(ack)) => {
            counter!(RECORDS_ACKED).increment(1);
            histogram!(ACK_LATENCY).record(started.elapsed().as_secs_f64());
            debug!(
                %partition_key,
                shard_id = %ack.shard_id,
                sequence_number = %ack.sequence_number,
                "record acknowledged"
            );
        }
        Ok(Err(err)) => {
            counter!(RECORDS_FAILED).increment(1);
            error!(%partition_key, "failed to put record: {}", err);
        }
        Err(_) => {
            counter!(RECORDS_FAILED).increment(1);
            error!(%partition_key, "record was dropped by the producer before delivery");
        }
    }
}

#[async_trait]
impl TickHandler for RecordPublisher {
    async fn on_tick(&self, task: PublishTask) -> anyhow::Result<()> {
        self.submit(task.payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::producer::MockRecordProducer;

    const STREAM: &str = "test-stream";

    fn publisher(producer: &MockRecordProducer) -> RecordPublisher {
        RecordPublisher::new(Box::new(producer.clone()), STREAM)
    }

    #[test]
    fn encodes_text_payloads() {
        let record = encode(STREAM, Bytes::from_static(b"Message 3")).unwrap();

        assert_eq!(record.stream_name, STREAM);
        assert_eq!(record.partition_key, "Message 3");
        assert_eq!(record.data, Bytes::from_static(b"Message 3"));
    }

    #[test]
    fn rejects_unencodable_payloads() {
        assert!(matches!(
            encode(STREAM, Bytes::from_static(&[0xff, 0xfe, 0xfd])),
            Err(EncodingFault::InvalidUtf8(_))
        ));
        assert_eq!(
            encode(STREAM, Bytes::new()),
            Err(EncodingFault::InvalidPartitionKey { chars: 0 })
        );
        assert_eq!(
            encode(STREAM, Bytes::from("é".repeat(257))),
            Err(EncodingFault::InvalidPartitionKey { chars: 257 })
        );
        // Multi-byte characters count once
        assert!(encode(STREAM, Bytes::from("é".repeat(256))).is_ok());
    }

    #[tokio::test]
    async fn submit_does_not_wait_for_acks() {
        let producer = MockRecordProducer::new();
        let publisher = publisher(&producer);

        publisher.submit(Bytes::from_static(b"Message 0")).unwrap();
        publisher.submit(Bytes::from_static(b"Message 1")).unwrap();

        assert_eq!(producer.pending(), 2);
        let keys: Vec<_> = producer
            .submitted()
            .into_iter()
            .map(|record| record.partition_key)
            .collect();
        assert_eq!(keys, vec!["Message 0", "Message 1"]);
    }

    #[tokio::test]
    async fn encoding_faults_drop_the_record() {
        let producer = MockRecordProducer::new();
        let publisher = publisher(&producer);

        publisher.submit(Bytes::from_static(&[0xc3, 0x28])).unwrap();
        publisher.submit(Bytes::from_static(b"Message 1")).unwrap();

        assert_eq!(producer.submitted().len(), 1);
    }

    #[tokio::test]
    async fn refused_records_are_reported() {
        let producer = MockRecordProducer::new();
        let publisher = publisher(&producer);
        producer.destroy().await;

        assert_eq!(
            publisher.submit(Bytes::from_static(b"Message 0")),
            Err(ProducerError::Destroyed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flush_and_close_waits_for_every_pending_record() {
        let producer = MockRecordProducer::new();
        let publisher = publisher(&producer);
        for seq in 0..5 {
            publisher.submit(Bytes::from(format!("Message {seq}"))).unwrap();
        }

        let closing = tokio::spawn(async move { publisher.flush_and_close().await });

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(!closing.is_finished());
            producer.ack_next();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!closing.is_finished());
        assert!(!producer.is_destroyed());

        producer.fail_next(ProducerError::Flush("gave up".to_string()));
        closing.await.unwrap().unwrap();
        assert_eq!(producer.pending(), 0);
        assert!(producer.is_destroyed());
    }

    #[tokio::test]
    async fn producer_is_destroyed_even_if_flush_fails() {
        let producer =
            MockRecordProducer::new().fail_flush(ProducerError::Flush("broken".to_string()));
        let publisher = publisher(&producer);

        let result = publisher.flush_and_close().await;

        assert_eq!(result, Err(ProducerError::Flush("broken".to_string())));
        assert!(producer.is_destroyed());
    }
}
