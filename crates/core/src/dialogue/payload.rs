//! `RIESGOS::[...]` payloads produced by the caller's risk-table widget.

use thiserror::Error;

use crate::domain::risk::RiskEntry;

pub const RISK_PAYLOAD_PREFIX: &str = "RIESGOS::";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("La tabla de riesgos no tiene un formato válido: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("La tabla de riesgos solo se acepta en la etapa de riesgos.")]
    UnexpectedStage,
}

pub fn is_structured(message: &str) -> bool {
    message.trim_start().starts_with(RISK_PAYLOAD_PREFIX)
}

/// Parses the JSON array after the prefix. `None` when `message` is not a
/// structured payload at all.
pub fn parse_risks(message: &str) -> Option<Result<Vec<RiskEntry>, PayloadError>> {
    let body = message.trim_start().strip_prefix(RISK_PAYLOAD_PREFIX)?;
    Some(serde_json::from_str::<Vec<RiskEntry>>(body.trim()).map_err(PayloadError::from))
}

pub fn encode_risks(entries: &[RiskEntry]) -> Result<String, PayloadError> {
    Ok(format!("{RISK_PAYLOAD_PREFIX}{}", serde_json::to_string(entries)?))
}
