use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::domain::risk::AssessedRisk;

/// IGV rate applied to every quotation. Not configurable per call.
pub const TAX_RATE_PERCENT: u32 = 18;

pub fn tax_rate() -> Decimal {
    Decimal::new(i64::from(TAX_RATE_PERCENT), 2)
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LineItem {
    pub code: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
}

impl LineItem {
    /// Saturates instead of overflowing; quotations assembled by the engine
    /// never reach the bound.
    pub fn line_total(&self) -> Decimal {
        self.quantity.saturating_mul(self.unit_price)
    }
}

#[derive(Serialize)]
struct LineItemRecord<'a> {
    code: &'a str,
    description: &'a str,
    quantity: Decimal,
    unit: &'a str,
    unit_price: Decimal,
    line_total: Decimal,
}

impl Serialize for LineItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        LineItemRecord {
            code: &self.code,
            description: &self.description,
            quantity: self.quantity,
            unit: &self.unit,
            unit_price: self.unit_price,
            line_total: self.line_total(),
        }
        .serialize(serializer)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Totals {
    pub fn from_items(items: &[LineItem]) -> Self {
        let subtotal = items
            .iter()
            .map(LineItem::line_total)
            .fold(Decimal::ZERO, |sum, line_total| sum.saturating_add(line_total));
        let tax = subtotal.saturating_mul(tax_rate());
        Self { subtotal, tax, total: subtotal.saturating_add(tax) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPhase {
    pub id: String,
    pub label: String,
    pub days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationMetadata {
    pub domain: String,
    pub title: String,
    pub variant: String,
    pub variant_label: String,
    pub currency: String,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<ScheduledPhase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risks: Vec<AssessedRisk>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Finalized quotation. Totals are derived from the items on every read so
/// they cannot drift from the line items.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Quotation {
    items: Vec<LineItem>,
    metadata: QuotationMetadata,
}

#[derive(Serialize)]
struct QuotationRecord<'a> {
    items: &'a [LineItem],
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
    metadata: &'a QuotationMetadata,
}

impl Serialize for Quotation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let totals = self.totals();
        QuotationRecord {
            items: &self.items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

impl Quotation {
    pub fn new(items: Vec<LineItem>, metadata: QuotationMetadata) -> Self {
        Self { items, metadata }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn metadata(&self) -> &QuotationMetadata {
        &self.metadata
    }

    pub fn totals(&self) -> Totals {
        Totals::from_items(&self.items)
    }

    /// Content checksum over the canonical JSON form.
    pub fn checksum(&self) -> String {
        let canonical = serde_json::to_string(self)
            .unwrap_or_else(|error| format!("serialization_error:{error}"));
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("sha256:{:x}", hasher.finalize())
    }
}
