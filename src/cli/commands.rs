//! Subcommand handlers for generate and config actions.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::args::ConfigAction;
use crate::config::{default_path as get_config_path, Config, DEFAULT_CONFIG_TOML};
use crate::veo::{
    CredentialGate, CredentialSelector, EnvCredentialSelector, ErrorKind, GenerationRequest,
    GenerationSession, ImagePayload, VeoClient, VeoError,
};

/// Load the config file.
///
/// If a path was given explicitly it must exist. Otherwise the default
/// location is tried and any problem falls back to built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, String> {
    match path {
        Some(path) => Config::load_from_explicit(path).map_err(|e| e.to_string()),
        None => match Config::load(None) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                eprintln!("Using default settings.\n");
                Ok(Config::default())
            }
        },
    }
}

/// Run the generate command: read both images, generate, save the result.
///
/// Returns the path the video was saved to, or `None` if the user
/// cancelled with Ctrl-C.
pub fn run_generate(
    config: &Config,
    before: &Path,
    after: &Path,
    prompt: &str,
    output: Option<PathBuf>,
) -> Result<Option<PathBuf>, String> {
    let before = ImagePayload::from_path(before).map_err(|e| e.to_string())?;
    let after = ImagePayload::from_path(after).map_err(|e| e.to_string())?;
    let request = GenerationRequest::new(before, after, prompt);

    let api_key_env = config.api_key_env();
    let gate = credential_gate(config, std::io::stdin().is_terminal());
    if !gate.has_credential() {
        gate.request_credential_selection();
        if !gate.has_credential() {
            return Err(missing_key_message(api_key_env));
        }
    }

    let api_key = std::env::var(api_key_env).unwrap_or_default();
    let client = VeoClient::with_base_url(api_key, config.base_url().to_string())
        .map_err(|e| match e {
            VeoError::MissingApiKey => missing_key_message(api_key_env),
            _ => format!("Failed to create Gemini API client: {}", e),
        })?
        .with_model(config.model());

    let session = Arc::new(GenerationSession::new(client, gate, config.poller()));

    {
        let session = session.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nCancelling...");
            session.cancel();
        })
        .map_err(|e| format!("Failed to install Ctrl-C handler: {}", e))?;
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create async runtime: {}", e))?;

    println!("Generating timelapse for: \"{}\"", request.effective_prompt());
    println!("Initializing generative session...");

    let result = rt.block_on(session.generate(request, |event| {
        println!("  {}", event.message);
        std::io::stdout().flush().ok();
    }));

    let video_path = match result {
        Ok(path) => path,
        Err(failure) if failure.kind == ErrorKind::Cancelled => return Ok(None),
        Err(failure) => {
            log::debug!("Generation failure source: {:?}", failure.source);
            return Err(match failure.kind {
                ErrorKind::Credential => format!(
                    "{}\nCheck the key in {} and run the command again.",
                    failure.message, api_key_env
                ),
                _ => failure.message,
            });
        }
    };
    log::debug!("Video held at {}", video_path.display());

    let dest = output.unwrap_or_else(|| config.output_path());
    let saved = session
        .save_video(&dest)
        .map_err(|e| format!("Failed to save video to '{}': {}", dest.display(), e))?
        .ok_or_else(|| "Generation finished without a video".to_string())?;

    session.clear();
    Ok(Some(saved))
}

/// Build the credential gate for the CLI.
///
/// When stdin is a terminal the user can be asked for a key. Otherwise
/// there is no selection facility and `credential.fail_open` decides.
fn credential_gate(config: &Config, interactive: bool) -> CredentialGate {
    let selector: Option<Arc<dyn CredentialSelector>> = if interactive {
        Some(Arc::new(EnvCredentialSelector::new(config.api_key_env())))
    } else {
        None
    };
    CredentialGate::new(selector, config.credential.fail_open)
}

fn missing_key_message(var: &str) -> String {
    format!(
        "{var} environment variable is not set.\n\n\
        Add your Gemini API key to a .env file:\n\
            echo '{var}=your-api-key-here' >> .env\n\n\
        Or set it as an environment variable:\n\
            export {var}=\"your-api-key-here\"\n\n\
        Video generation with Veo requires a key from a paid project."
    )
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, config: &Config, config_path: Option<&Path>) {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!("  Base URL: {}", config.base_url());
            println!("  Model: {}", config.model());
            println!("  API key variable: {}", config.api_key_env());
            println!("  Poll interval: {:?}", config.poll_interval());
            match config.poll_timeout() {
                Some(timeout) => println!("  Poll timeout: {:?}", timeout),
                None => println!("  Poll timeout: none"),
            }
            println!(
                "  Credential fail-open: {}",
                if config.credential.fail_open { "yes" } else { "no" }
            );
            println!("  Output: {}", config.output_path().display());
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            if config_path.exists() {
                eprintln!("Config file already exists: {}", config_path.display());
                eprintln!("Use 'temporal-architect config show' to view current settings.");
                std::process::exit(1);
            }

            if let Some(parent) = config_path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("Error creating config directory: {}", e);
                    std::process::exit(1);
                }
            }

            if let Err(e) = std::fs::write(&config_path, DEFAULT_CONFIG_TOML) {
                eprintln!("Error writing config file: {}", e);
                std::process::exit(1);
            }

            println!("Created config file: {}", config_path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_message_names_variable() {
        let message = missing_key_message("MY_KEY");
        assert!(message.starts_with("MY_KEY environment variable is not set."));
        assert!(message.contains("echo 'MY_KEY=your-api-key-here' >> .env"));
    }

    #[test]
    fn test_non_interactive_gate_follows_fail_open() {
        let mut config = Config::default();
        assert!(credential_gate(&config, false).has_credential());

        config.credential.fail_open = false;
        assert!(!credential_gate(&config, false).has_credential());
    }

    #[test]
    fn test_interactive_gate_checks_key_variable() {
        let mut config = Config::default();
        config.provider.api_key_env = Some("TEMPORAL_ARCHITECT_TEST_CLI_GATE_KEY".to_string());
        std::env::remove_var("TEMPORAL_ARCHITECT_TEST_CLI_GATE_KEY");
        assert!(!credential_gate(&config, true).has_credential());

        std::env::set_var("TEMPORAL_ARCHITECT_TEST_CLI_GATE_KEY", "k");
        let gate = credential_gate(&config, true);
        assert!(gate.has_credential());
        assert_eq!(gate.current_credential(), Some("k".to_string()));
        std::env::remove_var("TEMPORAL_ARCHITECT_TEST_CLI_GATE_KEY");
    }

    #[test]
    fn test_load_config_explicit_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(load_config(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_run_generate_rejects_unreadable_image() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_generate(
            &Config::default(),
            &dir.path().join("before.png"),
            &dir.path().join("after.png"),
            "",
            None,
        );
        assert!(result.is_err());
    }
}
