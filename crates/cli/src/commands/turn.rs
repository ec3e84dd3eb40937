use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cotiza_core::config::LoadOptions;
use cotiza_core::errors::ApplicationError;
use cotiza_core::ConversationState;
use tracing::debug;

use crate::commands::{runtime_for, CommandResult};

#[derive(Debug, Clone)]
pub struct TurnArgs {
    pub domain: String,
    pub message: String,
    pub state: Option<PathBuf>,
    pub save: bool,
}

pub fn run(options: LoadOptions, args: TurnArgs) -> CommandResult {
    match execute(options, &args) {
        Ok(result) => result,
        Err(error) => CommandResult::from_error("turn", &error),
    }
}

fn execute(options: LoadOptions, args: &TurnArgs) -> Result<CommandResult, ApplicationError> {
    let runtime = runtime_for(options, &args.domain)?;
    let state = match &args.state {
        Some(path) => read_state(path)?,
        None => ConversationState::new(),
    };

    let response = runtime.registry.handle(&args.domain, &args.message, Some(&state));

    if args.save {
        if let Some(path) = &args.state {
            write_state(path, &response.state)?;
            debug!(
                event_name = "cli.state_saved",
                path = %path.display(),
                stage = %response.state.stage,
                "conversation state written"
            );
        }
    }

    Ok(CommandResult::json("turn", &response))
}

/// Missing file means a new conversation.
pub(crate) fn read_state(path: &Path) -> Result<ConversationState, ApplicationError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(ConversationState::new()),
        Err(error) => return Err(ApplicationError::io(path.display().to_string(), &error)),
    };

    serde_json::from_str(&raw).map_err(|error| {
        ApplicationError::InvalidInput(format!(
            "conversation state `{}` is not valid JSON: {error}",
            path.display()
        ))
    })
}

fn write_state(path: &Path, state: &ConversationState) -> Result<(), ApplicationError> {
    let encoded = serde_json::to_string_pretty(state)
        .map_err(|error| ApplicationError::InvalidInput(error.to_string()))?;
    fs::write(path, encoded)
        .map_err(|error| ApplicationError::io(path.display().to_string(), &error))
}
