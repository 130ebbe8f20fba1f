//! Supervised background loops
//!
//! A `ScheduledTask` runs a long-lived async body until the cancellation
//! token fires. When the body fails or panics it is logged and restarted
//! after a fixed delay; the task itself never brings the process down.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ScheduledTask {
    name: &'static str,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl ScheduledTask {
    pub fn new(name: &'static str, retry_delay: Duration, cancel: CancellationToken) -> Self {
        Self {
            name,
            retry_delay,
            cancel,
        }
    }

    /// Run `body` until it returns `Ok` or the token is cancelled.
    ///
    /// Each attempt runs as its own task, so a panic counts as a failure.
    /// Returns the number of failed runs.
    pub async fn run<F, Fut, E>(self, mut body: F) -> u32
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let mut failures = 0u32;
        tracing::info!(task = self.name, "scheduled task started");

        loop {
            let mut attempt = tokio::spawn(body());
            let reason = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    attempt.abort();
                    break;
                }
                joined = &mut attempt => match joined {
                    Ok(Ok(())) => break,
                    Ok(Err(e)) => e.to_string(),
                    Err(e) if e.is_panic() => format!("panicked: {}", panic_message(e.into_panic())),
                    Err(e) => e.to_string(),
                },
            };

            failures += 1;
            tracing::error!(
                target: "error",
                task = self.name,
                failures,
                retry_in_ms = self.retry_delay.as_millis() as u64,
                "scheduled task failed: {}",
                reason
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        tracing::info!(task = self.name, failures, "scheduled task stopped");
        failures
    }

    /// Spawn [`run`](Self::run) onto the runtime
    pub fn spawn<F, Fut, E>(self, body: F) -> JoinHandle<u32>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        tokio::spawn(self.run(body))
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}
