use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::risk::RiskEntry;

/// Stage of a conversation that has not received its first turn yet.
pub const INITIAL_STAGE: &str = "inicio";
/// Stage reached once the quotation has been produced.
pub const TERMINAL_STAGE: &str = "cotizado";
/// Data key holding the selected variant code.
pub const VARIANT_FIELD: &str = "variante";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Risks(Vec<RiskEntry>),
}

impl FieldValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(value) => Some(Decimal::from(*value)),
            Self::Decimal(value) => Some(*value),
            Self::Text(_) | Self::Risks(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Decimal(value) if value.fract().is_zero() => value.to_i64(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_risks(&self) -> Option<&[RiskEntry]> {
        match self {
            Self::Risks(entries) => Some(entries),
            _ => None,
        }
    }

    /// Human-readable rendering used in replies and quotation metadata.
    pub fn render(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Decimal(value) => value.normalize().to_string(),
            Self::Text(value) => value.clone(),
            Self::Risks(entries) => format!("{} riesgo(s)", entries.len()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Opened,
    Accepted,
    Rejected,
    Shortcut,
    Structured,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub stage: String,
    pub message: String,
    pub outcome: TurnOutcome,
}

/// Conversation state owned by the caller. The engine reads it and hands back
/// an updated copy; it never keeps a reference between turns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub stage: String,
    #[serde(default)]
    pub data: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub history: Vec<Turn>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self { stage: INITIAL_STAGE.to_string(), data: BTreeMap::new(), history: Vec::new() }
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initial(&self) -> bool {
        self.stage == INITIAL_STAGE
    }

    pub fn is_terminal(&self) -> bool {
        self.stage == TERMINAL_STAGE
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.data.get(field)
    }

    pub fn decimal(&self, field: &str) -> Option<Decimal> {
        self.get(field).and_then(FieldValue::as_decimal)
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(FieldValue::as_integer)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn variant(&self) -> Option<&str> {
        self.text(VARIANT_FIELD)
    }

    /// Writes a field. Existing values are overwritten; keys are never removed.
    pub(crate) fn record(&mut self, field: impl Into<String>, value: FieldValue) {
        self.data.insert(field.into(), value);
    }

    pub(crate) fn push_turn(&mut self, stage: &str, message: &str, outcome: TurnOutcome) {
        self.history.push(Turn {
            stage: stage.to_string(),
            message: message.to_string(),
            outcome,
        });
    }
}
