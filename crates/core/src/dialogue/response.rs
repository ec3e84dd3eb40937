use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::QuickReply;
use crate::domain::conversation::{ConversationState, FieldValue};
use crate::domain::quotation::Quotation;

/// Substep kind asking the caller's widget for the risk table.
pub const RISK_TABLE_SUBSTEP: &str = "tabla_riesgos";

/// Reply annotation. Never persisted in the conversation state.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnError {
    #[error("{message}")]
    Validation { stage: String, message: String },
    #[error("{message}")]
    Parse { stage: String, message: String },
    #[error("no specialist is registered for domain `{domain}`")]
    UnknownDomain { domain: String },
    #[error("stage `{stage}` is not part of domain `{domain}`")]
    UnknownStage { domain: String, stage: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstepRequest {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_values: Option<FieldValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub reply_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_replies: Option<Vec<QuickReply>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_substep_request: Option<SubstepRequest>,
    pub state: ConversationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotation: Option<Quotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TurnError>,
}

impl TurnResponse {
    /// Plain reply that hands `state` back untouched.
    pub fn echo(reply_text: impl Into<String>, state: ConversationState) -> Self {
        Self {
            reply_text: reply_text.into(),
            quick_replies: None,
            next_substep_request: None,
            state,
            quotation: None,
            error: None,
        }
    }

    pub fn with_error(mut self, error: TurnError) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{TurnError, TurnResponse};
    use crate::domain::conversation::ConversationState;

    #[test]
    fn optional_parts_are_left_out_of_the_wire_form() {
        let response = TurnResponse::echo("Hola", ConversationState::new());
        let value = serde_json::to_value(&response).expect("response should serialize");

        assert_eq!(value["reply_text"], "Hola");
        assert_eq!(value["state"]["stage"], "inicio");
        assert!(value.get("quotation").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn errors_serialize_with_their_kind() {
        let response = TurnResponse::echo("x", ConversationState::new()).with_error(
            TurnError::UnknownStage { domain: "pozo_tierra".into(), stage: "techo".into() },
        );
        let value = serde_json::to_value(&response).expect("response should serialize");

        assert!(response.error.is_some());
        assert_eq!(value["error"]["kind"], "unknown_stage");
        assert_eq!(value["error"]["stage"], "techo");
    }
}
