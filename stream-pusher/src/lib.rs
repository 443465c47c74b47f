pub mod app_context;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod metrics_constants;
pub mod producer;
pub mod prometheus;
pub mod publisher;
pub mod scheduler;
pub mod server;
pub mod stream;
pub mod supervisor;
