//! Quotation assembly: line items from the knowledge base's item templates,
//! the proportional phase schedule and the risk contingency lines.
//!
//! Assembly never fails. Unknown variants, missing prices and absent fields
//! are substituted with documented defaults, noted in the quotation metadata
//! and logged as `pricing.fallback` events.

pub mod risk;
pub mod schedule;

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};

use crate::catalog::{ItemTemplate, KnowledgeBase, QuantitySource, Variant};
use crate::domain::conversation::ConversationState;
use crate::domain::quotation::{
    tax_rate, LineItem, Quotation, QuotationMetadata, ScheduledPhase,
};
use crate::domain::risk::AssessedRisk;

use self::risk::RiskMatrix;

/// Decimal places kept for derived quantities.
pub const DERIVED_QUANTITY_DP: u32 = 2;

pub trait QuotationEngine: Send + Sync {
    fn assemble(
        &self,
        knowledge_base: &KnowledgeBase,
        state: &ConversationState,
        currency: &str,
    ) -> Quotation;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicQuotationEngine;

impl QuotationEngine for DeterministicQuotationEngine {
    fn assemble(
        &self,
        knowledge_base: &KnowledgeBase,
        state: &ConversationState,
        currency: &str,
    ) -> Quotation {
        assemble_quotation(knowledge_base, state, currency)
    }
}

pub fn assemble_quotation(
    knowledge_base: &KnowledgeBase,
    state: &ConversationState,
    currency: &str,
) -> Quotation {
    let mut assembly = Assembly::new(knowledge_base, state);
    let lookup = knowledge_base.variant(state.variant());
    if lookup.substituted {
        assembly.fallback(
            "variant",
            format!(
                "Variante «{}» no reconocida; se usó «{}».",
                state.variant().unwrap_or_default(),
                lookup.code
            ),
        );
    }

    let schedule = assembly.schedule();
    let mut items = Vec::new();
    let mut risks = Vec::new();
    for template in &knowledge_base.items {
        assembly.expand(template, lookup.variant, &schedule, &mut items, &mut risks);
    }
    items.retain(|item| !item.quantity.is_zero());
    let items = assembly.within_range(items);

    let metadata = QuotationMetadata {
        domain: knowledge_base.domain.clone(),
        title: knowledge_base.title.clone(),
        variant: lookup.code.to_string(),
        variant_label: lookup.variant.label.clone(),
        currency: currency.to_string(),
        answers: assembly.answers(),
        schedule,
        risks,
        notes: assembly.into_notes(),
    };

    let quotation = Quotation::new(items, metadata);
    debug!(
        event_name = "pricing.quotation_assembled",
        domain = %knowledge_base.domain,
        variant = %lookup.code,
        items = quotation.items().len(),
        subtotal = %quotation.totals().subtotal,
        "assembled quotation"
    );
    quotation
}

struct Assembly<'a> {
    knowledge_base: &'a KnowledgeBase,
    state: &'a ConversationState,
    matrix: RiskMatrix,
    missing: BTreeSet<String>,
    notes: Vec<String>,
}

impl<'a> Assembly<'a> {
    fn new(knowledge_base: &'a KnowledgeBase, state: &'a ConversationState) -> Self {
        Self {
            knowledge_base,
            state,
            matrix: RiskMatrix::standard(),
            missing: BTreeSet::new(),
            notes: Vec::new(),
        }
    }

    fn fallback(&mut self, kind: &str, note: String) {
        warn!(
            event_name = "pricing.fallback",
            domain = %self.knowledge_base.domain,
            kind,
            note = %note,
            "catalog value substituted"
        );
        self.notes.push(note);
    }

    fn overflow(&mut self, code: &str) {
        self.fallback(
            "overflow",
            format!("El importe de «{code}» excede el rango de cálculo; se omitió la línea."),
        );
    }

    /// Keeps the lines whose totals, taxed subtotal included, fit in a
    /// `Decimal`. Later lines that would overflow are dropped and noted.
    fn within_range(&mut self, items: Vec<LineItem>) -> Vec<LineItem> {
        let mut subtotal = Decimal::ZERO;
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let next = item
                .quantity
                .checked_mul(item.unit_price)
                .and_then(|line_total| subtotal.checked_add(line_total))
                .filter(|next| {
                    next.checked_mul(tax_rate()).and_then(|tax| next.checked_add(tax)).is_some()
                });
            match next {
                Some(next) => {
                    subtotal = next;
                    kept.push(item);
                }
                None => self.overflow(&item.code),
            }
        }
        kept
    }

    /// Numeric field value; absent or non-numeric fields count as zero.
    fn field(&mut self, field: &str) -> Decimal {
        self.state.decimal(field).unwrap_or_else(|| {
            self.note_missing(field);
            Decimal::ZERO
        })
    }

    fn note_missing(&mut self, field: &str) {
        if self.missing.insert(field.to_string()) {
            self.fallback("field", format!("Dato «{field}» ausente; se consideró 0."));
        }
    }

    fn price(&mut self, variant: &Variant, template: &ItemTemplate) -> Decimal {
        let price = self.knowledge_base.unit_price(variant, &template.price);
        if price.substituted {
            self.fallback(
                "price",
                format!(
                    "Precio «{}» no definido para la variante; se usó {}.",
                    template.price, price.amount
                ),
            );
        }
        price.amount
    }

    fn scaling(&mut self, variant: &Variant, key: &str) -> Decimal {
        let scaling = self.knowledge_base.scaling(variant, key);
        if scaling.substituted {
            self.fallback(
                "scaling",
                format!("Factor «{key}» no definido para la variante; se usó {}.", scaling.amount),
            );
        }
        scaling.amount
    }

    /// Phase days as recorded in the conversation, in canonical phase order.
    fn schedule(&mut self) -> Vec<ScheduledPhase> {
        let (knowledge_base, state) = (self.knowledge_base, self.state);
        knowledge_base
            .phases
            .iter()
            .map(|phase| {
                let days = match state.integer(&phase.id) {
                    Some(days) => u32::try_from(days).unwrap_or(0),
                    None => {
                        self.note_missing(&phase.id);
                        0
                    }
                };
                ScheduledPhase { id: phase.id.clone(), label: phase.label.clone(), days }
            })
            .collect()
    }

    fn expand(
        &mut self,
        template: &ItemTemplate,
        variant: &Variant,
        schedule: &[ScheduledPhase],
        items: &mut Vec<LineItem>,
        risks: &mut Vec<AssessedRisk>,
    ) {
        let unit_price = self.price(variant, template);
        let line = |code: String, description: String, quantity: Decimal, unit_price: Decimal| {
            LineItem { code, description, quantity, unit: template.unit.clone(), unit_price }
        };

        match &template.quantity {
            QuantitySource::Field { field } => {
                let quantity = self.field(field);
                items.push(line(
                    template.code.clone(),
                    template.description.clone(),
                    quantity,
                    unit_price,
                ));
            }
            QuantitySource::Derived { scaling, fields, whole_units } => {
                let mut quantity = Some(self.scaling(variant, scaling));
                for field in fields {
                    let value = self.field(field);
                    quantity = quantity.and_then(|quantity| quantity.checked_mul(value));
                }
                let Some(quantity) = quantity else {
                    self.overflow(&template.code);
                    return;
                };
                let quantity = if *whole_units {
                    quantity.ceil()
                } else {
                    quantity.round_dp_with_strategy(
                        DERIVED_QUANTITY_DP,
                        RoundingStrategy::MidpointAwayFromZero,
                    )
                };
                items.push(line(
                    template.code.clone(),
                    template.description.clone(),
                    quantity,
                    unit_price,
                ));
            }
            QuantitySource::Fixed { quantity } => {
                items.push(line(
                    template.code.clone(),
                    template.description.clone(),
                    *quantity,
                    unit_price,
                ));
            }
            QuantitySource::Schedule { multiplier } => {
                let multiplier = self.field(multiplier);
                for (index, phase) in schedule.iter().enumerate() {
                    let code = format!("{}_{}", template.code, index + 1);
                    let Some(quantity) = Decimal::from(phase.days).checked_mul(multiplier) else {
                        self.overflow(&code);
                        continue;
                    };
                    items.push(line(
                        code,
                        format!("{}: {}", template.description, phase.label),
                        quantity,
                        unit_price,
                    ));
                }
            }
            QuantitySource::Risks { field, table } => {
                let state = self.state;
                let entries = match state.get(field).and_then(|value| value.as_risks()) {
                    Some(entries) => entries,
                    None => {
                        self.note_missing(field);
                        &[]
                    }
                };
                let lookup = self.knowledge_base.lookup_table(table);
                for (index, entry) in entries.iter().enumerate() {
                    let code = format!("{}_{}", template.code, index + 1);
                    let assessed = self.matrix.assess(entry);
                    let factor = lookup
                        .map(|table| table.get(assessed.severity.label()))
                        .unwrap_or(Decimal::ONE);
                    let Some(risk_price) = unit_price.checked_mul(factor) else {
                        self.overflow(&code);
                        continue;
                    };
                    items.push(line(
                        code,
                        format!(
                            "{}: {} (severidad {})",
                            template.description,
                            entry.description,
                            assessed.severity.label()
                        ),
                        Decimal::ONE,
                        risk_price,
                    ));
                    risks.push(assessed);
                }
            }
        }
    }

    /// Rendered answers for every stage the conversation recorded.
    fn answers(&self) -> BTreeMap<String, String> {
        self.knowledge_base
            .stages
            .iter()
            .filter_map(|stage| {
                self.state.get(&stage.id).map(|value| (stage.id.clone(), value.render()))
            })
            .collect()
    }

    fn into_notes(self) -> Vec<String> {
        self.notes
    }
}
