use std::fs;
use std::path::Path;

use cotiza_core::config::LoadOptions;
use cotiza_core::errors::ApplicationError;
use cotiza_core::{ConversationState, Totals, TurnOutcome};
use serde::Serialize;
use tracing::info;

use crate::commands::{runtime_for, CommandResult};

#[derive(Debug, Serialize)]
struct ReplaySummary {
    domain: String,
    turns: usize,
    rejected: usize,
    final_stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    totals: Option<Totals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    last_reply: String,
}

pub fn run(options: LoadOptions, domain: &str, script: &Path) -> CommandResult {
    match execute(options, domain, script) {
        Ok(summary) => CommandResult::json("replay", &summary),
        Err(error) => CommandResult::from_error("replay", &error),
    }
}

fn execute(
    options: LoadOptions,
    domain: &str,
    script: &Path,
) -> Result<ReplaySummary, ApplicationError> {
    let runtime = runtime_for(options, domain)?;
    let raw = fs::read_to_string(script)
        .map_err(|error| ApplicationError::io(script.display().to_string(), &error))?;

    let mut state = ConversationState::new();
    let mut quotation = None;
    let mut last_reply = String::new();
    for message in script_messages(&raw) {
        let response = runtime.registry.handle(domain, message, Some(&state));
        if response.quotation.is_some() {
            quotation = response.quotation;
        }
        last_reply = response.reply_text;
        state = response.state;
    }

    let rejected =
        state.history.iter().filter(|turn| turn.outcome == TurnOutcome::Rejected).count();
    info!(
        event_name = "cli.replay_finished",
        domain = %domain,
        turns = state.history.len(),
        rejected,
        final_stage = %state.stage,
        "script replayed"
    );

    Ok(ReplaySummary {
        domain: domain.to_string(),
        turns: state.history.len(),
        rejected,
        final_stage: state.stage,
        totals: quotation.as_ref().map(|quotation| quotation.totals()),
        checksum: quotation.as_ref().map(|quotation| quotation.checksum()),
        last_reply,
    })
}

/// One message per line. Blank lines and `#` comments are skipped.
fn script_messages(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines().map(str::trim).filter(|line| !line.is_empty() && !line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::script_messages;

    #[test]
    fn script_skips_blank_and_comment_lines() {
        let raw = "# pozo arenoso\nhola\n\n  ARENOSO  \n# pozos\n3\n";
        assert_eq!(script_messages(raw).collect::<Vec<_>>(), vec!["hola", "ARENOSO", "3"]);
    }
}
