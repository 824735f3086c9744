//! Credential gate - decides whether a job may be submitted.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Host-provided credential selection facility.
///
/// The mechanism behind it is up to the host: a dialog, a terminal prompt
/// or an environment reload.
pub trait CredentialSelector: Send + Sync {
    /// Whether the user has a credential selected right now.
    fn has_selected_credential(&self) -> bool;

    /// Run the selection flow. Returns once the user has completed or
    /// abandoned it; a credential is not guaranteed to be set afterwards.
    ///
    /// May block on user input.
    fn open_select_credential(&self);

    /// The selected credential itself, when the host can hand it out.
    fn current_credential(&self) -> Option<String> {
        None
    }
}

/// Checks for a usable credential and triggers selection when needed.
pub struct CredentialGate {
    selector: Option<Arc<dyn CredentialSelector>>,
    fail_open: bool,
    invalidated: AtomicBool,
}

impl CredentialGate {
    /// Create a gate.
    ///
    /// `fail_open` decides what `has_credential` reports when no selector
    /// is available: `true` assumes the credential is configured some other
    /// way, `false` blocks submission.
    pub fn new(selector: Option<Arc<dyn CredentialSelector>>, fail_open: bool) -> Self {
        if selector.is_none() {
            if fail_open {
                log::warn!(
                    "No credential selector available; assuming an API key is configured"
                );
            } else {
                log::warn!("No credential selector available; submissions will be blocked");
            }
        }
        Self {
            selector,
            fail_open,
            invalidated: AtomicBool::new(false),
        }
    }

    /// Gate backed by a selector.
    pub fn with_selector(selector: impl CredentialSelector + 'static) -> Self {
        Self::new(Some(Arc::new(selector)), true)
    }

    pub fn is_fail_open(&self) -> bool {
        self.fail_open
    }

    pub fn has_credential(&self) -> bool {
        if self.invalidated.load(Ordering::SeqCst) {
            return false;
        }
        match &self.selector {
            Some(selector) => selector.has_selected_credential(),
            None => self.fail_open,
        }
    }

    /// The credential to send with the next job, if the selector exposes it.
    ///
    /// `None` means the client keeps the key it was built with.
    pub fn current_credential(&self) -> Option<String> {
        self.selector
            .as_ref()
            .and_then(|selector| selector.current_credential())
            .filter(|key| !key.trim().is_empty())
    }

    /// Run the host selection flow and clear any earlier invalidation.
    ///
    /// Blocks for as long as the selector does; from async code use
    /// `select_credential` instead.
    pub fn request_credential_selection(&self) {
        if let Some(selector) = &self.selector {
            log::info!("Opening credential selection");
            selector.open_select_credential();
        }
        self.invalidated.store(false, Ordering::SeqCst);
    }

    /// Async variant of `request_credential_selection`.
    ///
    /// The selector runs on tokio's blocking pool so a terminal prompt does
    /// not stall the runtime.
    pub async fn select_credential(&self) {
        if let Some(selector) = self.selector.clone() {
            log::info!("Opening credential selection");
            if let Err(e) =
                tokio::task::spawn_blocking(move || selector.open_select_credential()).await
            {
                log::warn!("Credential selection did not complete: {}", e);
            }
        }
        self.invalidated.store(false, Ordering::SeqCst);
    }

    /// Forget the cached "credential present" answer after the provider
    /// rejected the credential. `has_credential` reports `false` until the
    /// next selection.
    pub fn invalidate(&self) {
        log::warn!("Credential rejected by provider; re-selection required");
        self.invalidated.store(true, Ordering::SeqCst);
    }
}

/// Selector that treats a non-empty environment variable as the selected key.
///
/// Selection reloads `.env` and, if the variable is still unset, asks for
/// the key on the terminal.
pub struct EnvCredentialSelector {
    var: String,
}

impl EnvCredentialSelector {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    fn prompt_for_key(&self) -> Option<String> {
        eprint!("Enter your Gemini API key ({}): ", self.var);
        io::stderr().flush().ok();

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let key = line.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }
}

impl CredentialSelector for EnvCredentialSelector {
    fn has_selected_credential(&self) -> bool {
        std::env::var(&self.var)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }

    fn current_credential(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    fn open_select_credential(&self) {
        // Missing .env is fine
        let _ = dotenv::dotenv();
        if self.has_selected_credential() {
            return;
        }
        match self.prompt_for_key() {
            Some(key) => std::env::set_var(&self.var, key),
            None => log::warn!("No API key entered"),
        }
    }
}
