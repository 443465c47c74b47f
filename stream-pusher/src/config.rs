use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

use crate::artifacts::NativeArtifacts;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "0.0.0.0:8080")]
    pub address: SocketAddr,

    #[envconfig(nested = true)]
    pub kinesis: KinesisConfig,

    #[envconfig(from = "PUBLISH_INTERVAL_MS", default = "10000")]
    pub publish_interval: EnvMsDuration,

    // SOURCE:DESTINATION pairs, comma separated
    #[envconfig(default = "")]
    pub native_artifacts: NativeArtifacts,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,

    #[envconfig(default = "text")]
    pub log_format: LogFormat,
}

#[derive(Envconfig, Clone)]
pub struct KinesisConfig {
    #[envconfig(default = "kpl-test-stream")]
    pub stream_name: String,

    #[envconfig(default = "1")]
    pub stream_shards: NonZeroU32,

    #[envconfig(from = "STREAM_CREATION_TIMEOUT_MS", default = "180000")]
    pub stream_creation_timeout: EnvMsDuration,

    #[envconfig(from = "STREAM_POLL_INTERVAL_MS", default = "10000")]
    pub stream_poll_interval: EnvMsDuration,

    #[envconfig(default = "us-east-1")]
    pub aws_region: String,

    // Point at localstack or another Kinesis-compatible endpoint
    pub kinesis_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLogFormatError(String);

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ParseLogFormatError(other.to_owned())),
        }
    }
}
