//! GenerationSession - runs one timelapse job at a time.
//!
//! The session owns everything that outlives a single call: the current
//! state, the cancellation token of the job in flight, and the most
//! recently materialized video. Every provider error is caught here,
//! classified, and turned into a `GenerationFailure`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use super::classify::{ErrorKind, GenerationFailure};
use super::client::{VeoClient, VeoError};
use super::credential::CredentialGate;
use super::materialize::{materialize, VideoResource};
use super::poller::{OperationPoller, ProgressEvent};
use super::request::GenerationRequest;

/// Lifecycle of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Submitting,
    Polling,
    Materializing,
    Done,
    Failed(ErrorKind),
}

impl GenerationState {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::Polling | Self::Materializing
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight flag when a generation ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs timelapse generations against one client, one at a time.
pub struct GenerationSession {
    client: VeoClient,
    gate: CredentialGate,
    poller: OperationPoller,
    in_flight: AtomicBool,
    state: Mutex<GenerationState>,
    cancel: Mutex<Option<CancellationToken>>,
    video: Mutex<Option<VideoResource>>,
}

impl GenerationSession {
    pub fn new(client: VeoClient, gate: CredentialGate, poller: OperationPoller) -> Self {
        Self {
            client,
            gate,
            poller,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(GenerationState::Idle),
            cancel: Mutex::new(None),
            video: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &VeoClient {
        &self.client
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    pub fn state(&self) -> GenerationState {
        *lock(&self.state)
    }

    fn set_state(&self, state: GenerationState) {
        log::debug!("Generation state: {:?}", state);
        *lock(&self.state) = state;
    }

    /// Run a full generation: submit, poll until done, materialize.
    ///
    /// `on_progress` receives one narration message per poll cycle and is
    /// never called after `cancel()`. The API key is refreshed from the
    /// credential gate before each job. On success the previous video (if any)
    /// has been released and the path of the new one is returned; it stays
    /// valid until `clear()` or the next generation.
    ///
    /// # Errors
    ///
    /// A `GenerationFailure` whose kind is:
    /// - `Conflict` if another generation is running (that one is not
    ///   affected)
    /// - `Input` if an image is missing; the provider is not contacted
    /// - `Credential` if no credential is available (selection is opened
    ///   off the async runtime) or the provider rejected it (the gate is
    ///   invalidated)
    /// - `Cancelled` after `cancel()` or `clear()`
    /// - `Transient`, `NoResult` or `Timeout` for the remaining failures
    pub async fn generate<F>(
        &self,
        request: GenerationRequest,
        on_progress: F,
    ) -> Result<PathBuf, GenerationFailure>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("Rejecting generation: another one is in progress");
            return Err(VeoError::Conflict.into());
        }
        let _in_flight = InFlight(&self.in_flight);

        let token = CancellationToken::new();
        *lock(&self.cancel) = Some(token.clone());

        self.release_video();
        self.set_state(GenerationState::Idle);

        let result = self.run(&request, &token, on_progress).await;

        *lock(&self.cancel) = None;

        match result {
            Ok(video) => {
                let path = video.path().to_path_buf();
                *lock(&self.video) = Some(video);
                self.set_state(GenerationState::Done);
                Ok(path)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run<F>(
        &self,
        request: &GenerationRequest,
        token: &CancellationToken,
        on_progress: F,
    ) -> Result<VideoResource, VeoError>
    where
        F: FnMut(ProgressEvent),
    {
        request.images()?;

        if !self.gate.has_credential() {
            self.gate.select_credential().await;
            return Err(VeoError::CredentialRequired);
        }
        if let Some(api_key) = self.gate.current_credential() {
            self.client.set_api_key(api_key);
        }

        if token.is_cancelled() {
            return Err(VeoError::Cancelled);
        }

        self.set_state(GenerationState::Submitting);
        log::info!("Starting timelapse generation: {}", request.effective_prompt());
        let submitted = self.client.submit(request).await;
        if token.is_cancelled() {
            return Err(VeoError::Cancelled);
        }
        let handle = submitted?;

        self.set_state(GenerationState::Polling);
        let handle = self
            .poller
            .poll_until_done(&self.client, handle, token, on_progress)
            .await?;

        self.set_state(GenerationState::Materializing);
        let video = materialize(&self.client, &handle).await;
        if token.is_cancelled() {
            return Err(VeoError::Cancelled);
        }
        video
    }

    fn fail(&self, error: VeoError) -> GenerationFailure {
        let failure = GenerationFailure::from(error);
        match failure.kind {
            ErrorKind::Cancelled => {
                log::info!("Generation cancelled");
                self.set_state(GenerationState::Idle);
                return failure;
            }
            ErrorKind::Credential if !matches!(failure.source, VeoError::CredentialRequired) => {
                self.gate.invalidate();
            }
            _ => {}
        }
        log::error!("Generation failed ({:?}): {}", failure.kind, failure.source);
        self.set_state(GenerationState::Failed(failure.kind));
        failure
    }

    /// Stop the generation in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = lock(&self.cancel).as_ref() {
            log::info!("Cancelling generation in flight");
            token.cancel();
        }
    }

    /// Cancel any generation and release the current video.
    pub fn clear(&self) {
        self.cancel();
        self.release_video();
        if !self.in_flight.load(Ordering::SeqCst) {
            self.set_state(GenerationState::Idle);
        }
    }

    /// Path of the current video, if one is held.
    pub fn video_path(&self) -> Option<PathBuf> {
        lock(&self.video).as_ref().map(|v| v.path().to_path_buf())
    }

    /// Copy the current video to `dest`; see `VideoResource::save_as`.
    pub fn save_video(&self, dest: &Path) -> Result<Option<PathBuf>, std::io::Error> {
        lock(&self.video)
            .as_ref()
            .map(|video| video.save_as(dest))
            .transpose()
    }

    fn release_video(&self) {
        let previous = lock(&self.video).take();
        if let Some(video) = previous {
            if let Err(e) = video.release() {
                log::warn!("Failed to delete previous video: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!GenerationState::Idle.is_active());
        assert!(GenerationState::Submitting.is_active());
        assert!(GenerationState::Polling.is_active());
        assert!(GenerationState::Materializing.is_active());
        assert!(!GenerationState::Done.is_active());
        assert!(!GenerationState::Failed(ErrorKind::Transient).is_active());
    }

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let client = VeoClient::with_api_key("k".to_string()).unwrap();
        let session =
            GenerationSession::new(client, CredentialGate::new(None, true), OperationPoller::default());
        assert_eq!(session.state(), GenerationState::Idle);
        assert_eq!(session.video_path(), None);
        assert_eq!(session.save_video(Path::new("/nonexistent")).unwrap(), None);
        session.cancel();
        session.clear();
        assert_eq!(session.state(), GenerationState::Idle);
    }
}
