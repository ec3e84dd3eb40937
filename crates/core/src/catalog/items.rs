use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum QuantitySource {
    /// Quantity typed by the user at stage `field`.
    Field { field: String },
    /// `scaling × Π fields`, e.g. `area × cable_per_m2 × floors`.
    Derived {
        scaling: String,
        fields: Vec<String>,
        #[serde(default)]
        whole_units: bool,
    },
    Fixed { quantity: Decimal },
    /// One line per scheduled phase: `days × multiplier`.
    Schedule { multiplier: String },
    /// One line per risk, priced by the severity lookup `table`.
    Risks { field: String, table: String },
}

/// Item line declaration. Declaration order is output order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub price: String,
    pub quantity: QuantitySource,
}

impl ItemTemplate {
    /// Data fields this template reads.
    pub fn referenced_fields(&self) -> Vec<&str> {
        match &self.quantity {
            QuantitySource::Field { field } | QuantitySource::Risks { field, .. } => {
                vec![field.as_str()]
            }
            QuantitySource::Derived { fields, .. } => fields.iter().map(String::as_str).collect(),
            QuantitySource::Schedule { multiplier } => vec![multiplier.as_str()],
            QuantitySource::Fixed { .. } => Vec::new(),
        }
    }
}
