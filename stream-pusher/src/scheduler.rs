use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SchedulerError;
use crate::metrics_constants::TICKS;
use crate::supervisor::spawn_supervised;

/// The work of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTask {
    pub sequence: u64,
    pub payload: Bytes,
}

impl PublishTask {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            payload: Bytes::from(format!("Message {sequence}")),
        }
    }
}

#[async_trait]
pub trait TickHandler: Send + Sync + 'static {
    async fn on_tick(&self, task: PublishTask) -> anyhow::Result<()>;
}

/// Runs a handler at a fixed cadence.
///
/// The first tick fires one interval after start. Each tick runs on its own
/// supervised task, so a slow handler never delays the next tick and ticks may
/// overlap. The sequence counter lives in the loop and starts at zero for every
/// scheduler.
pub struct PeriodicScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicScheduler {
    pub fn start(
        period: Duration,
        handler: Arc<dyn TickHandler>,
    ) -> Result<Self, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(period, handler, cancel.clone()));
        info!(?period, "started message pusher");

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Stop scheduling ticks. Ticks already running are left to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(err) = handle.await {
            warn!("scheduler loop ended abnormally: {}", err);
        }
        info!("stopped message pusher");
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(period: Duration, handler: Arc<dyn TickHandler>, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let task = PublishTask::new(sequence);
        sequence += 1;
        counter!(TICKS).increment(1);
        debug!(sequence = task.sequence, "tick");

        let handler = handler.clone();
        drop(spawn_supervised("publish tick", async move {
            handler.on_tick(task).await
        }));
    }
}
