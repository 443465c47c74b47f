use std::fmt;

use aws_sdk_kinesis::types::StreamStatus;

mod api;
mod manager;
mod mock;

pub(crate) use api::classify_sdk_error;
pub use api::{classify_kinesis_error, kinesis_client, KinesisStreamApi, StreamApi};
pub use manager::{StreamResourceManager, DEFAULT_POLL_INTERVAL};
pub use mock::{MockStreamApi, StreamCall};

/// Lifecycle state of the remote stream, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The stream does not exist.
    Absent,
    Creating,
    Active,
    /// Resharding or another configuration change is in progress.
    Updating,
    Deleting,
    /// A status this version does not know about.
    Unknown,
}

impl From<&StreamStatus> for StreamState {
    fn from(status: &StreamStatus) -> Self {
        match status {
            StreamStatus::Active => StreamState::Active,
            StreamStatus::Creating => StreamState::Creating,
            StreamStatus::Updating => StreamState::Updating,
            StreamStatus::Deleting => StreamState::Deleting,
            _ => StreamState::Unknown,
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Absent => "ABSENT",
            StreamState::Creating => "CREATING",
            StreamState::Active => "ACTIVE",
            StreamState::Updating => "UPDATING",
            StreamState::Deleting => "DELETING",
            StreamState::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}
