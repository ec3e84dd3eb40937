use std::io::{self, BufRead, Write};

use anyhow::Context;
use cotiza_core::config::LoadOptions;
use cotiza_core::dialogue::{encode_risks, is_structured, RISK_TABLE_SUBSTEP};
use cotiza_core::registry::SpecialistRegistry;
use cotiza_core::{ConversationState, RiskEntry, TurnResponse};

use crate::commands::{runtime_for, CommandResult};

pub fn run(options: LoadOptions, domain: &str) -> CommandResult {
    let runtime = match runtime_for(options, domain) {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::from_error("chat", &error),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    match converse(&runtime.registry, domain, stdin.lock(), stdout.lock()) {
        Ok(state) => CommandResult::success(
            "chat",
            format!(
                "conversation ended at stage `{}` after {} turn(s)",
                state.stage,
                state.history.len()
            ),
        ),
        Err(error) => CommandResult::failure("chat", "io", format!("{error:#}"), 4),
    }
}

const RISK_TABLE_HINT: &str =
    "  Un riesgo por línea: «descripción; probabilidad; impacto». Línea vacía para enviar.";

/// Drives a conversation until the quotation is produced or `input` runs dry.
///
/// At risk-table stages plain lines are collected as rows and sent as one
/// structured payload on the first empty line. A line that already is a
/// payload is sent as typed.
pub fn converse<R, W>(
    registry: &SpecialistRegistry,
    domain: &str,
    input: R,
    mut output: W,
) -> anyhow::Result<ConversationState>
where
    R: BufRead,
    W: Write,
{
    let opening = registry.handle(domain, "", None);
    render(&mut output, &opening)?;
    let mut table = risk_table(&opening);
    let mut state = opening.state;

    for line in input.lines() {
        let line = line.context("reading chat input")?;
        let message = match table.as_mut() {
            Some(rows) if !is_structured(&line) => {
                if line.trim().is_empty() {
                    encode_risks(rows).context("encoding risk table")?
                } else {
                    match parse_risk_row(&line) {
                        Some(entry) => rows.push(entry),
                        None => writeln!(output, "{RISK_TABLE_HINT}")
                            .context("writing chat output")?,
                    }
                    continue;
                }
            }
            _ => line,
        };

        let response = registry.handle(domain, &message, Some(&state));
        render(&mut output, &response)?;
        table = risk_table(&response);
        state = response.state;
        if state.is_terminal() {
            break;
        }
    }

    Ok(state)
}

fn risk_table(response: &TurnResponse) -> Option<Vec<RiskEntry>> {
    response
        .next_substep_request
        .as_ref()
        .filter(|substep| substep.kind == RISK_TABLE_SUBSTEP)
        .map(|_| Vec::new())
}

fn parse_risk_row(line: &str) -> Option<RiskEntry> {
    let columns = line.split(';').map(str::trim).collect::<Vec<_>>();
    match columns.as_slice() {
        [description, probability, impact]
            if columns.iter().all(|column| !column.is_empty()) =>
        {
            Some(RiskEntry::new(*description, *probability, *impact))
        }
        _ => None,
    }
}

fn render<W: Write>(output: &mut W, response: &TurnResponse) -> anyhow::Result<()> {
    writeln!(output, "{}", response.reply_text).context("writing chat output")?;
    if let Some(replies) = &response.quick_replies {
        let options =
            replies.iter().map(|reply| format!("[{}]", reply.value)).collect::<Vec<_>>().join(" ");
        writeln!(output, "  {options}").context("writing chat output")?;
    }
    if risk_table(response).is_some() {
        writeln!(output, "{RISK_TABLE_HINT}").context("writing chat output")?;
    }
    if let Some(quotation) = &response.quotation {
        for item in quotation.items() {
            writeln!(
                output,
                "  {:<16} {:>10} {:<12} x {:>10} = {:>12}",
                item.code,
                item.quantity.normalize(),
                item.unit,
                item.unit_price.normalize(),
                item.line_total().normalize()
            )
            .context("writing chat output")?;
        }
    }
    output.flush().context("flushing chat output")?;
    Ok(())
}
