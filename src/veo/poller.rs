//! OperationPoller - fixed-interval polling of long-running operations.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::{VeoClient, VeoError};
use super::operation::OperationHandle;

/// Interval between status checks (8 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(8);

/// Progress narration, emitted one entry per poll cycle in this order.
///
/// Purely cosmetic: the entries are not tied to provider-side stages.
pub const NARRATION: [&str; 8] = [
    "Analyzing spatial geometry...",
    "Calculating lighting transitions...",
    "Simulating material metamorphosis...",
    "Rendering temporal frames...",
    "Optimizing cinematic motion...",
    "Applying ultra-realistic shadows...",
    "Finalizing architectural details...",
    "Encoding 9:16 cinematic output...",
];

/// Notification emitted once per poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub message: String,
}

/// Cycles through `NARRATION`, wrapping around when exhausted.
#[derive(Debug, Default)]
pub struct Narrator {
    cycle: usize,
}

impl Narrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message for the current cycle; advances to the next one.
    pub fn next_message(&mut self) -> &'static str {
        let message = NARRATION[self.cycle % NARRATION.len()];
        self.cycle += 1;
        message
    }

    /// Number of messages emitted so far.
    pub fn cycles(&self) -> usize {
        self.cycle
    }
}

/// Polls an operation until the provider reports it done.
#[derive(Debug, Clone)]
pub struct OperationPoller {
    interval: Duration,
    max_wait: Option<Duration>,
}

impl Default for OperationPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl OperationPoller {
    /// A poller with the given fixed interval and no deadline.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_wait: None,
        }
    }

    /// Give up with `VeoError::Timeout` once `max_wait` has elapsed.
    ///
    /// The deadline is only checked between cycles; it never shortens the
    /// interval.
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    /// Poll `handle` until done and return the completed handle.
    ///
    /// Each cycle emits one narration message, sleeps for the fixed
    /// interval, then re-fetches the operation, replacing the local handle.
    /// A handle that is already done is returned without any progress.
    ///
    /// Once `cancel` fires no further progress is emitted and no further
    /// request is started; a fetch already in flight completes and its
    /// result is discarded, whether it succeeded or failed.
    ///
    /// # Errors
    ///
    /// Returns `VeoError::Cancelled` after cancellation, `VeoError::Timeout`
    /// if a deadline is configured and exceeded, or any error raised by the
    /// status fetch.
    pub async fn poll_until_done<F>(
        &self,
        client: &VeoClient,
        handle: OperationHandle,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<OperationHandle, VeoError>
    where
        F: FnMut(ProgressEvent),
    {
        let started = Instant::now();
        let mut narrator = Narrator::new();
        let mut handle = handle;

        loop {
            if handle.is_done() {
                log::info!(
                    "Operation {} finished after {} poll cycles",
                    handle.name(),
                    narrator.cycles()
                );
                return Ok(handle);
            }

            if cancel.is_cancelled() {
                return Err(VeoError::Cancelled);
            }

            if let Some(max_wait) = self.max_wait {
                if started.elapsed() >= max_wait {
                    log::error!("Generation timed out after {:?}", max_wait);
                    return Err(VeoError::Timeout(max_wait));
                }
            }

            let message = narrator.next_message();
            log::debug!("Poll cycle {}: {}", narrator.cycles(), message);
            on_progress(ProgressEvent {
                message: message.to_string(),
            });

            tokio::select! {
                _ = cancel.cancelled() => return Err(VeoError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }

            if cancel.is_cancelled() {
                return Err(VeoError::Cancelled);
            }

            let fetched = client.fetch_operation(&handle).await;

            if cancel.is_cancelled() {
                log::debug!("Discarding status of {} after cancellation", handle.name());
                return Err(VeoError::Cancelled);
            }

            handle = fetched?;
        }
    }
}
