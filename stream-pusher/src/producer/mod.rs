//! The record producer seam.
//!
//! A producer accepts records for asynchronous delivery and hands back a future
//! resolving to the delivery outcome. It owns whatever batching, retrying and
//! connection handling it needs; callers only see submit, flush and destroy.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::ProducerError;

mod kinesis;
mod mock;

pub use kinesis::{KinesisProducer, KinesisProducerFactory};
pub use mock::MockRecordProducer;

/// A record as handed to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub stream_name: String,
    pub partition_key: String,
    pub data: Bytes,
}

/// Where a record landed once the stream accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAck {
    pub shard_id: String,
    pub sequence_number: String,
}

/// Resolves once the record is acknowledged or has finally failed. A receive error
/// means the producer dropped the record without resolving it.
pub type DeliveryFuture = oneshot::Receiver<Result<RecordAck, ProducerError>>;

#[async_trait]
pub trait RecordProducer: Send + Sync {
    /// Queue a record for delivery. Never waits for the remote side.
    fn submit(&self, record: UserRecord) -> Result<DeliveryFuture, ProducerError>;

    /// Wait until every record submitted so far is resolved.
    async fn flush(&self) -> Result<(), ProducerError>;

    /// Release the producer. Later submissions are refused.
    async fn destroy(&self);
}

/// Builds producers once the stream they write to is ready.
pub trait ProducerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn RecordProducer>, ProducerError>;
}
