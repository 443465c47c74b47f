#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

use envconfig::Envconfig;
use tracing_subscriber::EnvFilter;

use stream_pusher::app_context::AppContext;
use stream_pusher::config::Config;
use stream_pusher::producer::MockRecordProducer;
use stream_pusher::stream::{MockStreamApi, StreamResourceManager};

pub const STREAM_NAME: &str = "integration-stream";
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(10);
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

static TRACING_INIT: Once = Once::new();

pub fn setup_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init()
    });
}

pub fn test_config() -> Config {
    let env = HashMap::from([
        ("ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("STREAM_NAME".to_string(), STREAM_NAME.to_string()),
        ("STREAM_SHARDS".to_string(), "2".to_string()),
        ("STREAM_CREATION_TIMEOUT_MS".to_string(), "60000".to_string()),
        ("STREAM_POLL_INTERVAL_MS".to_string(), "10000".to_string()),
        ("PUBLISH_INTERVAL_MS".to_string(), "10000".to_string()),
    ]);

    Config::init_from_hashmap(&env).expect("failed to load test config")
}

pub fn test_context(api: &MockStreamApi, producer: &MockRecordProducer) -> AppContext {
    let config = test_config();
    let streams =
        StreamResourceManager::new(Arc::new(api.clone())).with_poll_interval(POLL_INTERVAL);

    AppContext::new(config, streams, Arc::new(producer.clone()))
}

/// Let spawned tasks run after a jump of the paused clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
