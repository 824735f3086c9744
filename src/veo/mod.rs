//! Veo long-running video generation.
//!
//! This module submits before/after timelapse jobs to the Gemini API,
//! polls the returned long-running operation at a fixed interval while
//! narrating progress, and materializes the finished video as a local,
//! releasable resource.

mod classify;
mod client;
mod credential;
mod materialize;
mod operation;
mod poller;
mod request;
mod session;

pub use classify::{classify, ErrorKind, GenerationFailure};
pub use client::{
    VeoClient, VeoError, DEFAULT_MODEL, GEMINI_API_KEY_ENV, VEO_API_BASE_URL, VIDEO_ASPECT_RATIO,
    VIDEO_COUNT, VIDEO_RESOLUTION,
};
pub use credential::{CredentialGate, CredentialSelector, EnvCredentialSelector};
pub use materialize::{materialize, VideoResource, DOWNLOAD_FILENAME};
pub use operation::{OperationErrorInfo, OperationHandle, OperationStatus};
pub use poller::{Narrator, OperationPoller, ProgressEvent, DEFAULT_POLL_INTERVAL, NARRATION};
pub use request::{compose_prompt, GenerationRequest, ImagePayload, DEFAULT_PROMPT};
pub use session::{GenerationSession, GenerationState};
