//! Last-resort handling of faults escaping background tasks.
//!
//! Every report is written to stderr first, which works even when no tracing
//! subscriber is installed or the subscriber itself is broken, then logged.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use futures::FutureExt;
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::error;

use crate::error::LifecycleError;
use crate::metrics_constants::BACKGROUND_FAULTS;

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install the process-wide panic hook. Safe to call more than once.
///
/// The previous hook is not chained: a panic in a background task must not take
/// the process down, whatever hook was installed before.
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        panic::set_hook(Box::new(|panic_info| {
            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("<unnamed>");

            writeln!(std::io::stderr(), "{}", panic_line(thread_name, panic_info)).ok();
            error!(thread = %thread_name, panic = %panic_info, "thread panicked");
        }));
    });
}

/// Run a background future, turning its errors and panics into a fault report.
pub async fn supervise<F>(task: &'static str, future: F) -> Result<(), LifecycleError>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let reason = match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => format!("{err:#}"),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    let fault = LifecycleError::UnhandledBackgroundFault {
        task: task.to_owned(),
        reason,
    };
    report(&fault);
    Err(fault)
}

/// Spawn a background task whose faults are captured and reported, never propagated.
pub fn spawn_supervised<F>(task: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        // Already reported
        drop(supervise(task, future).await);
    })
}

// The panic info renders as "panicked at <location>:\n<message>"
fn panic_line(thread_name: &str, panic_info: &dyn Display) -> String {
    format!("stream-pusher: thread '{thread_name}' {panic_info}")
}

fn report(fault: &LifecycleError) {
    writeln!(std::io::stderr(), "stream-pusher: {fault}").ok();
    error!("{}", fault);
    counter!(BACKGROUND_FAULTS).increment(1);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn explode(sequence: u64) -> anyhow::Result<()> {
        panic!("tick {sequence} blew up")
    }

    #[tokio::test]
    async fn successful_tasks_are_not_reported() {
        assert!(supervise("tick", async { Ok(()) }).await.is_ok());
    }

    #[tokio::test]
    async fn errors_are_captured() {
        let err = supervise("tick", async {
            Err(anyhow::anyhow!("producer refused the record"))
        })
        .await
        .unwrap_err();

        match err {
            LifecycleError::UnhandledBackgroundFault { task, reason } => {
                assert_eq!(task, "tick");
                assert_eq!(reason, "producer refused the record");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn panics_are_captured() {
        install_panic_hook();

        let err = supervise("tick", explode(7)).await.unwrap_err();

        match err {
            LifecycleError::UnhandledBackgroundFault { reason, .. } => {
                assert_eq!(reason, "panicked: tick 7 blew up");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn panic_line_does_not_repeat_panicked() {
        let info = "panicked at src/scheduler.rs:42:9:\ntick 7 blew up";

        let line = panic_line("tokio-runtime-worker", &info);

        assert_eq!(
            line,
            "stream-pusher: thread 'tokio-runtime-worker' panicked at src/scheduler.rs:42:9:\ntick 7 blew up"
        );
        assert_eq!(line.matches("panicked").count(), 1);
    }

    #[tokio::test]
    async fn spawned_tasks_never_fail_their_join_handle() {
        let handle = spawn_supervised("tick", explode(1));

        assert!(handle.await.is_ok());
    }
}
