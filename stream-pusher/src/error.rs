use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures reported by the remote stream API, classified from the SDK error code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamApiError {
    /// The stream does not exist (yet, or anymore).
    #[error("stream not found: {0}")]
    NotFound(String),
    /// The stream exists but is not in a state that accepts the operation.
    #[error("stream is in use: {0}")]
    InUse(String),
    #[error("rate limit exceeded: {0}")]
    Throttled(String),
    #[error("kinesis error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl StreamApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StreamApiError::NotFound(_))
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self, StreamApiError::InUse(_))
    }
}

/// Enumeration of errors raised while provisioning or removing the stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("stream {name} is in DELETING state, can't use the existing stream and can't create a new one")]
    ResourceConflict { name: String },
    #[error("stream {name} never became active within {timeout:?}")]
    ProvisioningTimeout { name: String, timeout: Duration },
    #[error("error querying stream {name}")]
    Query {
        name: String,
        #[source]
        source: StreamApiError,
    },
    #[error("error creating stream {name}")]
    Create {
        name: String,
        #[source]
        source: StreamApiError,
    },
    #[error("error deleting stream {name}")]
    Delete {
        name: String,
        #[source]
        source: StreamApiError,
    },
}

/// A payload that can't be turned into a record. Records hitting this are dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingFault {
    #[error("payload is not valid UTF-8 text: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("payload can't be used as a partition key: {chars} characters, expected 1 to 256")]
    InvalidPartitionKey { chars: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    #[error("failed to put record to stream {stream}")]
    Put {
        stream: String,
        #[source]
        source: StreamApiError,
    },
    #[error("producer was destroyed, no more records are accepted")]
    Destroyed,
    #[error("failed to flush outstanding records: {0}")]
    Flush(String),
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("invalid artifact mapping '{0}', expected SOURCE:DESTINATION")]
    InvalidMapping(String),
    #[error("failed to materialize {}", destination.display())]
    Io {
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler interval must be greater than zero")]
    ZeroInterval,
}

/// Enumeration of errors surfaced by the startup and shutdown sequences.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("failed to provision stream")]
    Provisioning(#[from] StreamError),
    #[error("failed to materialize native artifacts")]
    Artifacts(#[from] ArtifactError),
    #[error("failed to create record producer")]
    Producer(#[source] ProducerError),
    #[error("failed to start message pusher")]
    Scheduler(#[from] SchedulerError),
    #[error("failed to flush and close the record publisher")]
    FlushFault(#[source] ProducerError),
    #[error("failed to tear down stream")]
    TeardownFault(#[source] StreamError),
    #[error("unhandled fault in background task {task}: {reason}")]
    UnhandledBackgroundFault { task: String, reason: String },
}
