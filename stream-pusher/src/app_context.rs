use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::artifacts;
use crate::config::Config;
use crate::error::LifecycleError;
use crate::producer::ProducerFactory;
use crate::publisher::RecordPublisher;
use crate::scheduler::PeriodicScheduler;
use crate::stream::StreamResourceManager;
use crate::supervisor;

/// Owns every long-lived component and sequences their startup and shutdown.
///
/// Startup goes stream, native artifacts, publisher, scheduler. Shutdown walks the
/// same components in reverse, whatever startup managed to build, and always tries
/// to delete the stream at the end.
pub struct AppContext {
    config: Config,
    streams: StreamResourceManager,
    producers: Arc<dyn ProducerFactory>,
    publisher: Option<Arc<RecordPublisher>>,
    scheduler: Option<PeriodicScheduler>,
    shut_down: bool,
}

impl AppContext {
    pub fn new(
        config: Config,
        streams: StreamResourceManager,
        producers: Arc<dyn ProducerFactory>,
    ) -> Self {
        Self {
            config,
            streams,
            producers,
            publisher: None,
            scheduler: None,
            shut_down: false,
        }
    }

    /// Whether the scheduler is pushing messages.
    pub fn is_running(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(PeriodicScheduler::is_running)
    }

    #[instrument(skip_all, fields(stream = %self.config.kinesis.stream_name))]
    pub async fn initialize(&mut self) -> Result<(), LifecycleError> {
        supervisor::install_panic_hook();

        let kinesis = &self.config.kinesis;
        self.streams
            .ensure(
                &kinesis.stream_name,
                kinesis.stream_shards,
                kinesis.stream_creation_timeout.0,
            )
            .await?;

        artifacts::materialize(&self.config.native_artifacts)?;

        info!("Creating Kinesis producer");
        let producer = self.producers.create().map_err(LifecycleError::Producer)?;
        let publisher = Arc::new(RecordPublisher::new(
            producer,
            kinesis.stream_name.clone(),
        ));
        self.publisher = Some(publisher.clone());

        info!("Starting message pusher");
        let scheduler = PeriodicScheduler::start(self.config.publish_interval.0, publisher)?;
        self.scheduler = Some(scheduler);

        Ok(())
    }

    /// Stop everything, in reverse startup order. Runs only once, later calls are
    /// no-ops. Each step is attempted even if an earlier one failed, and every
    /// failure is returned.
    #[instrument(skip_all, fields(stream = %self.config.kinesis.stream_name))]
    pub async fn shutdown(&mut self) -> Vec<LifecycleError> {
        if self.shut_down {
            debug!("already shut down");
            return Vec::new();
        }
        self.shut_down = true;

        let mut faults = Vec::new();

        if let Some(mut scheduler) = self.scheduler.take() {
            info!("Stopping message pusher");
            scheduler.stop().await;
        }

        if let Some(publisher) = self.publisher.take() {
            if let Err(err) = publisher.flush_and_close().await {
                faults.push(LifecycleError::FlushFault(err));
            }
        }

        if let Err(err) = self.streams.teardown(&self.config.kinesis.stream_name).await {
            faults.push(LifecycleError::TeardownFault(err));
        }

        faults
    }
}
