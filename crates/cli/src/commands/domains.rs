use cotiza_core::config::LoadOptions;
use serde::Serialize;

use crate::commands::{load_runtime, CommandResult};

#[derive(Debug, Serialize)]
struct DomainSummary {
    domain: String,
    title: String,
    stages: Vec<String>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let runtime = match load_runtime(options) {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::from_error("domains", &error),
    };

    let summaries = runtime
        .registry
        .specialists()
        .map(|specialist| DomainSummary {
            domain: specialist.domain().to_string(),
            title: specialist.title().to_string(),
            stages: specialist.stage_sequence(),
        })
        .collect::<Vec<_>>();

    CommandResult::json("domains", &summaries)
}
