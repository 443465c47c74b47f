use std::io::Write;
use std::sync::Arc;

use envconfig::Envconfig;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use stream_pusher::app_context::AppContext;
use stream_pusher::config::{Config, LogFormat};
use stream_pusher::producer::KinesisProducerFactory;
use stream_pusher::prometheus::setup_metrics_recorder;
use stream_pusher::server;
use stream_pusher::stream::{kinesis_client, KinesisStreamApi, StreamResourceManager};
use stream_pusher::supervisor::install_panic_hook;

async fn wait_for_signal(cancel: CancellationToken) {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    info!("Stopping stream-pusher...");
    cancel.cancel();
}

fn setup_tracing(format: LogFormat) {
    // The AWS SDK is very chatty at info
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
        .add_directive("aws_config=warn".parse().unwrap())
        .add_directive("aws_smithy_runtime=warn".parse().unwrap())
        .add_directive("aws_sdk_kinesis=warn".parse().unwrap());

    let log_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    }
    .with_filter(filter);

    tracing_subscriber::registry().with(log_layer).init();
}

async fn shutdown(context: &mut AppContext) {
    for fault in context.shutdown().await {
        error!("{:#}", anyhow::Error::from(fault));
    }

    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "an unknown time".to_string());
    writeln!(std::io::stderr(), "stream-pusher shutdown complete at {now}").ok();
}

#[tokio::main]
async fn main() {
    let config = Config::init_from_env().expect("Invalid configuration:");

    setup_tracing(config.log_format);
    install_panic_hook();

    // Don't install metrics unless asked to
    let metrics = config.export_prometheus.then(|| {
        setup_metrics_recorder().expect("failed to install the prometheus recorder")
    });

    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_signal(cancel.clone()));

    let client = kinesis_client(&config.kinesis).await;
    let streams = StreamResourceManager::new(Arc::new(KinesisStreamApi::new(client.clone())))
        .with_poll_interval(config.kinesis.stream_poll_interval.0);
    let producers = Arc::new(KinesisProducerFactory::new(client));
    let mut context = AppContext::new(config.clone(), streams, producers);

    // Initialization faults leave the process serving health checks only
    tokio::select! {
        result = context.initialize() => {
            if let Err(err) = result {
                error!("initialization failed: {:#}", anyhow::Error::from(err));
            }
        }
        _ = cancel.cancelled() => warn!("shutdown requested during initialization"),
    }

    if cancel.is_cancelled() {
        shutdown(&mut context).await;
        return;
    }

    let listener = match TcpListener::bind(config.address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("could not bind health endpoint on {}: {}", config.address, err);
            shutdown(&mut context).await;
            std::process::exit(1);
        }
    };

    let stop = cancel.clone();
    let served = health::serve(server::router(metrics), listener, async move {
        stop.cancelled().await
    })
    .await;

    if let Err(err) = served {
        error!("health endpoint failed: {}", err);
        shutdown(&mut context).await;
        std::process::exit(1);
    }

    shutdown(&mut context).await;
}
