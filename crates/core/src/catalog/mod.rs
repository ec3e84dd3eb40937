//! Per-domain knowledge base: variants with their price and scaling tables,
//! lookup tables, the canonical phase weights and the declarative stage table
//! the dialogue interpreter walks.
//!
//! Catalogs are TOML documents parsed and validated once at startup. After
//! that a [`KnowledgeBase`] is immutable and shared by reference.

pub mod builtin;
pub mod items;
pub mod stages;

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::{INITIAL_STAGE, TERMINAL_STAGE, VARIANT_FIELD};
use crate::pricing::schedule::PhaseWeight;

pub use self::builtin::{builtin_catalogs, load_catalog_dir};
pub use self::items::{ItemTemplate, QuantitySource};
pub use self::stages::{InputKind, NextStage, QuickReply, ShortcutTransition, StageDescriptor};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not parse catalog `{origin}`: {source}")]
    Parse { origin: String, source: toml::de::Error },
    #[error("catalog `{domain}` is invalid: {reason}")]
    Invalid { domain: String, reason: String },
    #[error("could not read catalogs from `{path}`: {message}")]
    Io { path: String, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub label: String,
    #[serde(default)]
    pub prices: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub scaling: BTreeMap<String, Decimal>,
}

static EMPTY_VARIANT: Variant =
    Variant { label: String::new(), prices: BTreeMap::new(), scaling: BTreeMap::new() };

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTable {
    pub default: Decimal,
    #[serde(default)]
    pub entries: BTreeMap<String, Decimal>,
}

impl LookupTable {
    /// Unknown keys return the table's `default`.
    pub fn get(&self, key: &str) -> Decimal {
        self.entries.get(key).copied().unwrap_or(self.default)
    }
}

/// Result of resolving a variant code. `substituted` is set when the requested
/// code was unknown and the default variant was used instead.
#[derive(Clone, Copy, Debug)]
pub struct VariantLookup<'a> {
    pub code: &'a str,
    pub variant: &'a Variant,
    pub substituted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogValue {
    pub amount: Decimal,
    pub substituted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub domain: String,
    pub title: String,
    pub greeting: String,
    pub default_variant: String,
    pub variants: BTreeMap<String, Variant>,
    #[serde(default)]
    pub lookup_tables: BTreeMap<String, LookupTable>,
    #[serde(default)]
    pub phases: Vec<PhaseWeight>,
    pub stages: Vec<StageDescriptor>,
    #[serde(default)]
    pub shortcuts: Vec<ShortcutTransition>,
    pub items: Vec<ItemTemplate>,
}

impl KnowledgeBase {
    /// Parses and validates a TOML catalog. `origin` names the source in errors.
    pub fn from_toml_str(origin: &str, raw: &str) -> Result<Self, CatalogError> {
        let knowledge_base = toml::from_str::<KnowledgeBase>(raw)
            .map_err(|source| CatalogError::Parse { origin: origin.to_string(), source })?;
        knowledge_base.validate()?;
        Ok(knowledge_base)
    }

    pub fn stage(&self, id: &str) -> Option<&StageDescriptor> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    pub fn stage_sequence(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|stage| stage.id.as_str())
    }

    pub fn first_stage(&self) -> &str {
        self.stages.first().map(|stage| stage.id.as_str()).unwrap_or(TERMINAL_STAGE)
    }

    /// Stage following `id` in declaration order; the terminal sentinel after
    /// the last stage or for unknown ids.
    pub fn next_in_sequence(&self, id: &str) -> &str {
        self.stages
            .iter()
            .position(|stage| stage.id == id)
            .and_then(|index| self.stages.get(index + 1))
            .map(|stage| stage.id.as_str())
            .unwrap_or(TERMINAL_STAGE)
    }

    pub fn shortcut(&self, token: &str) -> Option<&ShortcutTransition> {
        self.shortcuts.iter().find(|shortcut| shortcut.token == token)
    }

    pub fn variant(&self, requested: Option<&str>) -> VariantLookup<'_> {
        if let Some((code, variant)) = requested.and_then(|code| self.variants.get_key_value(code))
        {
            return VariantLookup { code: code.as_str(), variant, substituted: false };
        }

        let variant = self.variants.get(&self.default_variant).unwrap_or(&EMPTY_VARIANT);
        VariantLookup { code: &self.default_variant, variant, substituted: requested.is_some() }
    }

    /// Unit price for `key` in the variant, then in the default variant, then zero.
    pub fn unit_price(&self, variant: &Variant, key: &str) -> CatalogValue {
        self.lookup_variant_table(variant, key, |variant| &variant.prices)
    }

    pub fn scaling(&self, variant: &Variant, key: &str) -> CatalogValue {
        self.lookup_variant_table(variant, key, |variant| &variant.scaling)
    }

    pub fn lookup_table(&self, name: &str) -> Option<&LookupTable> {
        self.lookup_tables.get(name)
    }

    pub fn variant_options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variants.iter().map(|(code, variant)| (code.as_str(), variant.label.as_str()))
    }

    fn lookup_variant_table<'a, F>(
        &'a self,
        variant: &'a Variant,
        key: &str,
        table: F,
    ) -> CatalogValue
    where
        F: Fn(&'a Variant) -> &'a BTreeMap<String, Decimal>,
    {
        if let Some(amount) = table(variant).get(key) {
            return CatalogValue { amount: *amount, substituted: false };
        }

        let fallback =
            self.variants.get(&self.default_variant).and_then(|default| table(default).get(key));
        CatalogValue { amount: fallback.copied().unwrap_or(Decimal::ZERO), substituted: true }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::Invalid { domain: self.domain.clone(), reason };

        if self.domain.trim().is_empty() {
            return Err(invalid("domain must not be empty".to_string()));
        }
        if self.stages.is_empty() {
            return Err(invalid("at least one stage is required".to_string()));
        }
        if !self.variants.contains_key(&self.default_variant) {
            return Err(invalid(format!(
                "default_variant `{}` is not a declared variant",
                self.default_variant
            )));
        }

        let mut stage_ids = BTreeSet::new();
        for stage in &self.stages {
            if stage.id == INITIAL_STAGE || stage.id == TERMINAL_STAGE || stage.id == VARIANT_FIELD
            {
                return Err(invalid(format!("stage id `{}` is reserved", stage.id)));
            }
            if !stage_ids.insert(stage.id.as_str()) {
                return Err(invalid(format!("stage `{}` is declared twice", stage.id)));
            }
        }

        let known_target = |target: &str| target == TERMINAL_STAGE || stage_ids.contains(target);

        for stage in &self.stages {
            validate_input(&stage.input)
                .map_err(|reason| invalid(format!("stage `{}`: {reason}", stage.id)))?;
            match &stage.next {
                NextStage::Sequence => {}
                NextStage::Goto { stage: target } => {
                    if !known_target(target.as_str()) {
                        return Err(invalid(format!(
                            "stage `{}` jumps to unknown stage `{target}`",
                            stage.id
                        )));
                    }
                }
                NextStage::SplitWhenPositive { skip_to } => {
                    if !known_target(skip_to.as_str()) {
                        return Err(invalid(format!(
                            "stage `{}` skips to unknown stage `{skip_to}`",
                            stage.id
                        )));
                    }
                    if !matches!(stage.input, InputKind::Integer { .. }) {
                        return Err(invalid(format!(
                            "stage `{}` splits phases but does not take an integer",
                            stage.id
                        )));
                    }
                    if self.phases.is_empty() {
                        return Err(invalid(format!(
                            "stage `{}` splits phases but no phases are declared",
                            stage.id
                        )));
                    }
                }
            }
        }

        let inputs: BTreeMap<&str, &InputKind> =
            self.stages.iter().map(|stage| (stage.id.as_str(), &stage.input)).collect();

        for phase in &self.phases {
            match inputs.get(phase.id.as_str()) {
                None => {
                    return Err(invalid(format!(
                        "phase `{}` has no manual entry stage",
                        phase.id
                    )));
                }
                Some(InputKind::Integer { .. }) => {}
                Some(_) => {
                    return Err(invalid(format!(
                        "phase `{}` must be entered through an integer stage",
                        phase.id
                    )));
                }
            }
        }

        let mut tokens = BTreeSet::new();
        for shortcut in &self.shortcuts {
            if !tokens.insert(shortcut.token.as_str()) {
                return Err(invalid(format!("shortcut `{}` is declared twice", shortcut.token)));
            }
            if !known_target(shortcut.target.as_str()) {
                return Err(invalid(format!(
                    "shortcut `{}` targets unknown stage `{}`",
                    shortcut.token, shortcut.target
                )));
            }
            if let Some(variant) = &shortcut.variant {
                if !self.variants.contains_key(variant) {
                    return Err(invalid(format!(
                        "shortcut `{}` selects unknown variant `{variant}`",
                        shortcut.token
                    )));
                }
            }
        }

        for item in &self.items {
            let reads_risks = matches!(item.quantity, QuantitySource::Risks { .. });
            for field in item.referenced_fields() {
                let Some(input) = inputs.get(field) else {
                    return Err(invalid(format!(
                        "item `{}` reads `{field}` which no stage collects",
                        item.code
                    )));
                };
                let numeric =
                    matches!(input, InputKind::Integer { .. } | InputKind::Decimal { .. });
                if reads_risks && !matches!(input, InputKind::Risks) {
                    return Err(invalid(format!(
                        "item `{}` reads risks from `{field}`, which does not collect a risk table",
                        item.code
                    )));
                }
                if !reads_risks && !numeric {
                    return Err(invalid(format!(
                        "item `{}` reads `{field}`, which is not a numeric stage",
                        item.code
                    )));
                }
            }
            match &item.quantity {
                QuantitySource::Risks { table, .. } if !self.lookup_tables.contains_key(table) => {
                    return Err(invalid(format!(
                        "item `{}` uses unknown lookup table `{table}`",
                        item.code
                    )));
                }
                QuantitySource::Schedule { .. } if self.phases.is_empty() => {
                    return Err(invalid(format!(
                        "item `{}` expands a schedule but no phases are declared",
                        item.code
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn validate_input(input: &InputKind) -> Result<(), String> {
    match input {
        InputKind::Integer { min, max } if min > max => {
            Err(format!("integer bounds are reversed ({min} > {max})"))
        }
        InputKind::Decimal { min, max } if min > max => {
            Err(format!("decimal bounds are reversed ({min} > {max})"))
        }
        InputKind::Text { min_len, max_len } if min_len > max_len => {
            Err(format!("text bounds are reversed ({min_len} > {max_len})"))
        }
        _ => Ok(()),
    }
}
