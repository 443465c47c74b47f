use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use crate::error::ProducerError;

use super::{DeliveryFuture, ProducerFactory, RecordAck, RecordProducer, UserRecord};

/// In-memory producer for tests, always available so integration tests can use it.
///
/// Submitted records stay pending until resolved with [`MockRecordProducer::ack_next`]
/// or [`MockRecordProducer::fail_next`], unless auto-ack is enabled. `flush` waits
/// for the pending queue to drain, just like a real producer would. Clones share
/// their state, which is also how the factory hands out producers.
#[derive(Clone)]
pub struct MockRecordProducer {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<MockState>,
    counts: watch::Sender<Counts>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counts {
    submitted: usize,
    pending: usize,
}

#[derive(Default)]
struct MockState {
    auto_ack: bool,
    create_error: Option<ProducerError>,
    flush_error: Option<ProducerError>,
    submitted: Vec<UserRecord>,
    pending: VecDeque<oneshot::Sender<Result<RecordAck, ProducerError>>>,
    acked: u64,
    flush_calls: usize,
    destroyed: bool,
}

impl Default for MockRecordProducer {
    fn default() -> Self {
        let (counts, _) = watch::channel(Counts::default());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MockState::default()),
                counts,
            }),
        }
    }
}

impl MockRecordProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledge every record as soon as it is submitted.
    pub fn auto_ack(self) -> Self {
        self.state().auto_ack = true;
        self
    }

    pub fn fail_create(self, err: ProducerError) -> Self {
        self.state().create_error = Some(err);
        self
    }

    pub fn fail_flush(self, err: ProducerError) -> Self {
        self.state().flush_error = Some(err);
        self
    }

    pub fn submitted(&self) -> Vec<UserRecord> {
        self.state().submitted.clone()
    }

    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }

    pub fn flush_calls(&self) -> usize {
        self.state().flush_calls
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    /// Acknowledge the oldest pending record. Returns false if nothing was pending.
    pub fn ack_next(&self) -> bool {
        let mut state = self.state();
        let ack = state.next_ack();
        self.resolve(state, Ok(ack))
    }

    /// Finally fail the oldest pending record. Returns false if nothing was pending.
    pub fn fail_next(&self, err: ProducerError) -> bool {
        self.resolve(self.state(), Err(err))
    }

    pub fn ack_all(&self) {
        while self.ack_next() {}
    }

    /// Wait until at least `count` records were submitted.
    pub async fn wait_for_submissions(&self, count: usize) {
        let mut counts = self.inner.counts.subscribe();
        // The sender lives as long as self, this can't fail
        drop(counts.wait_for(|c| c.submitted >= count).await);
    }

    fn resolve(
        &self,
        mut state: MutexGuard<'_, MockState>,
        result: Result<RecordAck, ProducerError>,
    ) -> bool {
        let Some(tx) = state.pending.pop_front() else {
            return false;
        };
        drop(tx.send(result));
        self.publish_counts(&state);
        true
    }

    fn publish_counts(&self, state: &MockState) {
        let counts = Counts {
            submitted: state.submitted.len(),
            pending: state.pending.len(),
        };
        self.inner.counts.send_replace(counts);
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl MockState {
    fn next_ack(&mut self) -> RecordAck {
        let ack = RecordAck {
            shard_id: "shardId-000000000000".to_string(),
            sequence_number: format!("{:056}", self.acked),
        };
        self.acked += 1;
        ack
    }
}

#[async_trait]
impl RecordProducer for MockRecordProducer {
    fn submit(&self, record: UserRecord) -> Result<DeliveryFuture, ProducerError> {
        let mut state = self.state();
        if state.destroyed {
            return Err(ProducerError::Destroyed);
        }

        let (tx, rx) = oneshot::channel();
        state.submitted.push(record);
        if state.auto_ack {
            let ack = state.next_ack();
            drop(tx.send(Ok(ack)));
        } else {
            state.pending.push_back(tx);
        }
        self.publish_counts(&state);

        Ok(rx)
    }

    async fn flush(&self) -> Result<(), ProducerError> {
        let mut counts = {
            let mut state = self.state();
            state.flush_calls += 1;
            if let Some(err) = state.flush_error.clone() {
                return Err(err);
            }
            self.inner.counts.subscribe()
        };

        counts
            .wait_for(|c| c.pending == 0)
            .await
            .map(drop)
            .map_err(|err| ProducerError::Flush(err.to_string()))
    }

    async fn destroy(&self) {
        self.state().destroyed = true;
    }
}

impl ProducerFactory for MockRecordProducer {
    fn create(&self) -> Result<Box<dyn RecordProducer>, ProducerError> {
        match self.state().create_error.clone() {
            Some(err) => Err(err),
            None => Ok(Box::new(self.clone())),
        }
    }
}
