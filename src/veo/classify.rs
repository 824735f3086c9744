//! Error classification into user-facing categories.

use super::client::VeoError;

/// Provider error texts that mean the credential is missing or invalid.
const CREDENTIAL_ERROR_PATTERNS: &[&str] = &[
    "Requested entity was not found",
    "API key not valid",
    "API_KEY_INVALID",
];

/// User-facing error category.
///
/// No category triggers an automatic retry; recovery is always started by
/// the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or unusable input, detected before contacting the provider.
    Input,
    /// Credential missing or rejected; the user must re-select it.
    Credential,
    /// Any other provider or network failure.
    Transient,
    /// The operation finished without a result.
    NoResult,
    /// A generation is already running.
    Conflict,
    /// The configured polling deadline passed.
    Timeout,
    /// The caller abandoned the generation.
    Cancelled,
}

impl ErrorKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Input => "Please upload both 'Before' and 'After' images.",
            ErrorKind::Credential => "API Key issue detected. Please re-select your key.",
            ErrorKind::Transient | ErrorKind::NoResult | ErrorKind::Timeout => {
                "Generation failed. Please try a different prompt or check your connection."
            }
            ErrorKind::Conflict => "A generation is already in progress.",
            ErrorKind::Cancelled => "Generation cancelled.",
        }
    }

    pub fn requires_credential_reselection(&self) -> bool {
        matches!(self, ErrorKind::Credential)
    }
}

fn is_credential_error(error_text: &str) -> bool {
    CREDENTIAL_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_text.contains(pattern))
}

/// Map a low-level error to its category.
pub fn classify(error: &VeoError) -> ErrorKind {
    match error {
        VeoError::InvalidInput(_) => ErrorKind::Input,
        VeoError::MissingApiKey | VeoError::CredentialRequired => ErrorKind::Credential,
        VeoError::Api { message, .. } | VeoError::Operation { message, .. }
            if is_credential_error(message) =>
        {
            ErrorKind::Credential
        }
        VeoError::NoResult | VeoError::InvalidUri(_) => ErrorKind::NoResult,
        VeoError::Conflict => ErrorKind::Conflict,
        VeoError::Timeout(_) => ErrorKind::Timeout,
        VeoError::Cancelled => ErrorKind::Cancelled,
        VeoError::HttpError(_)
        | VeoError::Api { .. }
        | VeoError::Operation { .. }
        | VeoError::ContentFiltered { .. }
        | VeoError::Download { .. }
        | VeoError::IoError(_) => ErrorKind::Transient,
    }
}

/// A classified failure: category, user message and underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GenerationFailure {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: VeoError,
}

impl GenerationFailure {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<VeoError> for GenerationFailure {
    fn from(source: VeoError) -> Self {
        let kind = classify(&source);
        let message = match (&kind, &source) {
            (ErrorKind::Credential, VeoError::CredentialRequired) => {
                "Please select an API key, then submit again.".to_string()
            }
            _ => kind.user_message().to_string(),
        };
        Self {
            kind,
            message,
            source,
        }
    }
}
