use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    pub label: String,
    pub value: String,
}

impl QuickReply {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

/// Expected input of a stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputKind {
    Integer { min: i64, max: i64 },
    Decimal { min: Decimal, max: Decimal },
    Text { min_len: usize, max_len: usize },
    /// One of the knowledge base's variants, by code or label.
    Variant,
    /// Risk batch delivered as a structured payload.
    Risks,
}

/// How the stage after an accepted answer is chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextStage {
    #[default]
    Sequence,
    Goto { stage: String },
    /// A positive answer is a total duration: phases are split from it and the
    /// dialogue jumps to `skip_to`, past the manual per-phase stages.
    SplitWhenPositive { skip_to: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub id: String,
    pub prompt: String,
    pub input: InputKind,
    #[serde(default)]
    pub quick_replies: Vec<QuickReply>,
    #[serde(default)]
    pub next: NextStage,
}

/// Entry of the global shortcut table. Valid at every non-terminal stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutTransition {
    pub token: String,
    pub label: String,
    pub target: String,
    #[serde(default)]
    pub variant: Option<String>,
}

impl ShortcutTransition {
    pub fn quick_reply(&self) -> QuickReply {
        QuickReply::new(&self.label, &self.token)
    }
}
