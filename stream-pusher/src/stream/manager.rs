use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::StreamError;
use crate::metrics_constants::PROVISIONING_POLLS;

use super::{DeleteOutcome, StreamApi, StreamState};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Creates, waits for and deletes the remote stream.
///
/// Stream creation is not atomic on the remote side: a freshly created stream goes
/// through `CREATING`, and may even be reported as missing for a short while. Both
/// are treated as transient and polled through. `DELETING` is terminal for our
/// purposes, as the name can be neither reused nor recreated until the deletion is
/// over, so it aborts instead of being retried.
pub struct StreamResourceManager {
    api: Arc<dyn StreamApi>,
    poll_interval: Duration,
}

impl StreamResourceManager {
    pub fn new(api: Arc<dyn StreamApi>) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Make sure the stream exists and is `ACTIVE`, creating it if needed.
    #[instrument(skip(self))]
    pub async fn ensure(
        &self,
        name: &str,
        shard_count: NonZeroU32,
        creation_timeout: Duration,
    ) -> Result<(), StreamError> {
        info!("Creating Kinesis stream");

        let state = self
            .api
            .describe(name)
            .await
            .map_err(|source| StreamError::Query {
                name: name.to_owned(),
                source,
            })?;

        match state {
            StreamState::Active => {
                trace!("found existing stream {}, has a status of {}", name, state);
                return Ok(());
            }
            StreamState::Deleting => {
                return Err(StreamError::ResourceConflict {
                    name: name.to_owned(),
                })
            }
            StreamState::Absent => {
                info!("stream {} does not exist, creating it now", name);
                match self.api.create(name, shard_count.get()).await {
                    Ok(()) => {}
                    // Someone else created it between our describe and create
                    Err(err) if err.is_in_use() => {
                        warn!("stream {} is already being created: {}", name, err)
                    }
                    Err(source) => {
                        return Err(StreamError::Create {
                            name: name.to_owned(),
                            source,
                        })
                    }
                }
            }
            _ => trace!("found existing stream {}, has a status of {}", name, state),
        }

        self.wait_until_active(name, creation_timeout).await
    }

    async fn wait_until_active(&self, name: &str, timeout: Duration) -> Result<(), StreamError> {
        debug!("waiting for stream {} to become ACTIVE...", name);

        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;

        while Instant::now() < deadline {
            tokio::time::sleep_until(deadline.min(Instant::now() + self.poll_interval)).await;
            attempts += 1;
            counter!(PROVISIONING_POLLS).increment(1);

            match self.api.describe(name).await {
                Ok(StreamState::Active) => {
                    info!(attempts, "stream {} is ACTIVE", name);
                    return Ok(());
                }
                // Not visible yet right after create, keep polling
                Ok(StreamState::Absent) => debug!(attempts, "stream {} not found yet", name),
                Ok(StreamState::Deleting) => {
                    return Err(StreamError::ResourceConflict {
                        name: name.to_owned(),
                    })
                }
                Ok(state) => debug!(attempts, "current stream status: {}", state),
                Err(source) => {
                    return Err(StreamError::Query {
                        name: name.to_owned(),
                        source,
                    })
                }
            }
        }

        Err(StreamError::ProvisioningTimeout {
            name: name.to_owned(),
            timeout,
        })
    }

    /// Delete the stream. A stream that is already gone is not an error.
    #[instrument(skip(self))]
    pub async fn teardown(&self, name: &str) -> Result<(), StreamError> {
        info!("Destroying Kinesis stream...");

        match self.api.delete(name).await {
            Ok(DeleteOutcome::Deleted) => info!("deleted Kinesis stream {}", name),
            Ok(DeleteOutcome::NotFound) => warn!("Kinesis stream {} not found", name),
            Err(source) => {
                return Err(StreamError::Delete {
                    name: name.to_owned(),
                    source,
                })
            }
        }

        Ok(())
    }
}
