pub mod chat;
pub mod config;
pub mod domains;
pub mod replay;
pub mod turn;

use cotiza_core::catalog::load_catalog_dir;
use cotiza_core::config::{AppConfig, LoadOptions};
use cotiza_core::errors::ApplicationError;
use cotiza_core::registry::SpecialistRegistry;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &ApplicationError) -> Self {
        Self::failure(command, error.error_class(), error.to_string(), error.exit_code())
    }

    /// Successful command whose output is `value` itself, pretty-printed.
    pub fn json<T>(command: &str, value: &T) -> Self
    where
        T: Serialize,
    {
        match serde_json::to_string_pretty(value) {
            Ok(output) => Self { exit_code: 0, output },
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Effective configuration plus the registry built from it.
pub struct Runtime {
    pub config: AppConfig,
    pub registry: SpecialistRegistry,
}

pub fn load_runtime(options: LoadOptions) -> Result<Runtime, ApplicationError> {
    let config = AppConfig::load(options)?;
    let overrides = match &config.engine.catalog_dir {
        Some(dir) => load_catalog_dir(dir)?,
        None => Vec::new(),
    };
    let registry = SpecialistRegistry::with_overrides(&config.engine.currency, overrides)?;
    Ok(Runtime { config, registry })
}

/// Runtime whose registry knows `domain`; unknown domains are an input error.
pub(crate) fn runtime_for(options: LoadOptions, domain: &str) -> Result<Runtime, ApplicationError> {
    let runtime = load_runtime(options)?;
    if !runtime.registry.contains(domain) {
        let known = runtime.registry.domains().collect::<Vec<_>>().join(", ");
        return Err(ApplicationError::InvalidInput(format!(
            "unknown domain `{domain}` (registered: {known})"
        )));
    }
    Ok(runtime)
}
