use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kinesis::config::Region;
use aws_sdk_kinesis::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kinesis::Client;
use tracing::{debug, info};

use crate::config::KinesisConfig;
use crate::error::StreamApiError;

use super::{DeleteOutcome, StreamState};

/// Remote operations on a single stream. Both the Kinesis client and the test mock
/// implement it.
#[async_trait]
pub trait StreamApi: Send + Sync {
    /// Current state of the stream. A missing stream is reported as
    /// [`StreamState::Absent`], not as an error.
    async fn describe(&self, name: &str) -> Result<StreamState, StreamApiError>;

    async fn create(&self, name: &str, shard_count: u32) -> Result<(), StreamApiError>;

    async fn delete(&self, name: &str) -> Result<DeleteOutcome, StreamApiError>;
}

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException"];

const IN_USE_CODES: &[&str] = &["ResourceInUseException"];

const THROTTLING_CODES: &[&str] = &[
    "LimitExceededException",
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
];

/// Classify a Kinesis error from its error code.
pub fn classify_kinesis_error(code: Option<&str>, message: String) -> StreamApiError {
    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => StreamApiError::NotFound(message),
        Some(c) if IN_USE_CODES.contains(&c) => StreamApiError::InUse(message),
        Some(c) if THROTTLING_CODES.contains(&c) => StreamApiError::Throttled(message),
        _ => StreamApiError::Sdk {
            code: code.map(str::to_owned),
            message,
        },
    }
}

pub(crate) fn classify_sdk_error<E>(err: &SdkError<E>) -> StreamApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = err
        .message()
        .map(str::to_owned)
        .unwrap_or_else(|| DisplayErrorContext(err).to_string());

    classify_kinesis_error(err.code(), message)
}

/// Build a Kinesis client for the configured region.
///
/// Uses the default AWS credential chain (env vars, web identity, instance profile, etc.).
pub async fn kinesis_client(config: &KinesisConfig) -> Client {
    let region = Region::new(config.aws_region.clone());
    info!("Set AWS region to {}", config.aws_region);

    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region.clone())
        .load()
        .await;

    let mut builder = aws_sdk_kinesis::config::Builder::from(&aws_config).region(region);
    if let Some(endpoint) = &config.kinesis_endpoint {
        debug!("using Kinesis endpoint {}", endpoint);
        builder = builder.endpoint_url(endpoint);
    }

    Client::from_conf(builder.build())
}

#[derive(Clone)]
pub struct KinesisStreamApi {
    client: Client,
}

impl KinesisStreamApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamApi for KinesisStreamApi {
    async fn describe(&self, name: &str) -> Result<StreamState, StreamApiError> {
        match self.client.describe_stream().stream_name(name).send().await {
            Ok(output) => Ok(output
                .stream_description()
                .map(|description| StreamState::from(description.stream_status()))
                .unwrap_or(StreamState::Unknown)),
            Err(err) => match classify_sdk_error(&err) {
                StreamApiError::NotFound(_) => Ok(StreamState::Absent),
                other => Err(other),
            },
        }
    }

    async fn create(&self, name: &str, shard_count: u32) -> Result<(), StreamApiError> {
        let shard_count = i32::try_from(shard_count).map_err(|_| StreamApiError::Sdk {
            code: None,
            message: format!("shard count {shard_count} is out of range"),
        })?;

        self.client
            .create_stream()
            .stream_name(name)
            .shard_count(shard_count)
            .send()
            .await
            .map_err(|err| classify_sdk_error(&err))?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<DeleteOutcome, StreamApiError> {
        match self.client.delete_stream().stream_name(name).send().await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(err) => match classify_sdk_error(&err) {
                StreamApiError::NotFound(_) => Ok(DeleteOutcome::NotFound),
                other => Err(other),
            },
        }
    }
}
