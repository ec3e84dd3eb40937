//! Domain id to specialist map, built once at startup and shared read-only.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{builtin_catalogs, CatalogError, KnowledgeBase};
use crate::dialogue::{Controller, TurnError, TurnResponse};
use crate::domain::conversation::ConversationState;
use crate::pricing::QuotationEngine;

pub trait Specialist: Send + Sync {
    fn domain(&self) -> &str;
    fn title(&self) -> &str;
    fn stage_sequence(&self) -> Vec<String>;
    fn handle(&self, state: &ConversationState, message: &str) -> TurnResponse;
}

impl<E> Specialist for Controller<E>
where
    E: QuotationEngine,
{
    fn domain(&self) -> &str {
        Controller::domain(self)
    }

    fn title(&self) -> &str {
        &self.knowledge_base().title
    }

    fn stage_sequence(&self) -> Vec<String> {
        self.knowledge_base().stage_sequence().map(str::to_string).collect()
    }

    fn handle(&self, state: &ConversationState, message: &str) -> TurnResponse {
        Controller::handle(self, state, message)
    }
}

/// Stand-in for domains without a registered specialist.
#[derive(Clone, Debug)]
pub struct UnavailableSpecialist {
    domain: String,
}

impl UnavailableSpecialist {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }
}

impl Specialist for UnavailableSpecialist {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn title(&self) -> &str {
        "Servicio no disponible"
    }

    fn stage_sequence(&self) -> Vec<String> {
        Vec::new()
    }

    fn handle(&self, state: &ConversationState, _message: &str) -> TurnResponse {
        TurnResponse::echo(
            "Este servicio de cotización no está disponible por el momento.",
            state.clone(),
        )
        .with_error(TurnError::UnknownDomain { domain: self.domain.clone() })
    }
}

#[derive(Clone, Default)]
pub struct SpecialistRegistry {
    specialists: BTreeMap<String, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    /// One controller per knowledge base. A later catalog for the same
    /// domain replaces an earlier one.
    pub fn from_catalogs<I>(currency: &str, catalogs: I) -> Self
    where
        I: IntoIterator<Item = KnowledgeBase>,
    {
        let mut specialists: BTreeMap<String, Arc<dyn Specialist>> = BTreeMap::new();
        for knowledge_base in catalogs {
            let domain = knowledge_base.domain.clone();
            let controller = Controller::new(Arc::new(knowledge_base), currency);
            if specialists.insert(domain.clone(), Arc::new(controller)).is_some() {
                info!(
                    event_name = "registry.domain_replaced",
                    domain = %domain,
                    "catalog replaced an earlier definition"
                );
            }
        }
        Self { specialists }
    }

    pub fn builtin(currency: &str) -> Result<Self, CatalogError> {
        Ok(Self::from_catalogs(currency, builtin_catalogs()?))
    }

    /// Builtin domains followed by `overrides`, which win on domain clashes.
    pub fn with_overrides(
        currency: &str,
        overrides: Vec<KnowledgeBase>,
    ) -> Result<Self, CatalogError> {
        let mut catalogs = builtin_catalogs()?;
        catalogs.extend(overrides);
        Ok(Self::from_catalogs(currency, catalogs))
    }

    pub fn resolve(&self, domain: &str) -> Arc<dyn Specialist> {
        match self.specialists.get(domain) {
            Some(specialist) => Arc::clone(specialist),
            None => {
                warn!(
                    event_name = "registry.unknown_domain",
                    domain = %domain,
                    "no specialist registered for domain"
                );
                Arc::new(UnavailableSpecialist::new(domain))
            }
        }
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.specialists.contains_key(domain)
    }

    /// Single entry point for callers. A missing state starts a new conversation.
    pub fn handle(
        &self,
        domain: &str,
        message: &str,
        state: Option<&ConversationState>,
    ) -> TurnResponse {
        let fresh;
        let state = match state {
            Some(state) => state,
            None => {
                fresh = ConversationState::new();
                &fresh
            }
        };
        self.resolve(domain).handle(state, message)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.specialists.keys().map(String::as_str)
    }

    pub fn specialists(&self) -> impl Iterator<Item = &Arc<dyn Specialist>> {
        self.specialists.values()
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::{Specialist, SpecialistRegistry};
    use crate::catalog::{builtin_catalogs, KnowledgeBase};
    use crate::dialogue::TurnError;
    use crate::domain::conversation::{ConversationState, TERMINAL_STAGE};

    fn registry() -> SpecialistRegistry {
        SpecialistRegistry::builtin("PEN").expect("builtin registry")
    }

    #[test]
    fn builtin_registry_lists_every_domain() {
        let registry = registry();
        assert_eq!(
            registry.domains().collect::<Vec<_>>(),
            vec!["certificado_seguridad", "instalacion_electrica", "pozo_tierra", "proyecto_pmi"]
        );
        assert_eq!(registry.len(), 4);
        assert!(!registry.is_empty());
        assert_eq!(
            registry.resolve("pozo_tierra").stage_sequence(),
            vec!["tipo_suelo", "pozos", "profundidad"]
        );
    }

    #[test]
    fn unknown_domain_echoes_state_with_unavailable_reply() {
        let registry = registry();
        let mut state = ConversationState::new();
        state.stage = "area".to_string();

        let response = registry.handle("jardineria", "hola", Some(&state));
        assert_eq!(response.state, state);
        assert!(response.reply_text.contains("no está disponible"));
        assert_eq!(
            response.error,
            Some(TurnError::UnknownDomain { domain: "jardineria".to_string() })
        );
        assert!(registry.resolve("jardineria").stage_sequence().is_empty());
    }

    #[test]
    fn missing_state_starts_a_new_conversation() {
        let response = registry().handle("instalacion_electrica", "hola", None);
        assert_eq!(response.state.stage, "area");
        assert_eq!(response.state.history.len(), 1);
    }

    #[test]
    fn overrides_replace_builtin_domains() {
        let mut custom = builtin_catalogs()
            .expect("builtin catalogs")
            .into_iter()
            .find(|knowledge_base| knowledge_base.domain == "pozo_tierra")
            .expect("pozo_tierra");
        custom.title = "Puesta a tierra (tarifa 2027)".to_string();

        let registry = SpecialistRegistry::with_overrides("PEN", vec![custom]).expect("registry");
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.resolve("pozo_tierra").title(), "Puesta a tierra (tarifa 2027)");
    }

    const UNBOUNDED: &str = r#"
domain = "grande"
title = "Metrado sin límite"
greeting = "Hola"
default_variant = "BASE"

[variants.BASE]
label = "Base"
prices = { m2 = "10" }
scaling = { factor = "1" }

[[stages]]
id = "area"
prompt = "¿Área?"
input = { kind = "decimal", min = "1", max = "79228162514264337593543950335" }

[[stages]]
id = "pisos"
prompt = "¿Pisos?"
input = { kind = "decimal", min = "1", max = "79228162514264337593543950335" }

[[items]]
code = "metrado"
description = "Metrado"
unit = "m2"
price = "m2"
quantity = { source = "derived", scaling = "factor", fields = ["area", "pisos"] }
"#;

    #[test]
    fn in_range_answers_that_overflow_pricing_still_produce_a_quotation() {
        let catalog = KnowledgeBase::from_toml_str("grande.toml", UNBOUNDED).expect("catalog");
        let registry = SpecialistRegistry::from_catalogs("PEN", vec![catalog]);

        let mut state = ConversationState::new();
        let mut quotation = None;
        for message in ["hola", "100000000000000000000", "100000000000000000000"] {
            let response = registry.handle("grande", message, Some(&state));
            assert!(response.error.is_none());
            quotation = response.quotation;
            state = response.state;
        }

        let quotation = quotation.expect("quotation on the closing turn");
        assert_eq!(state.stage, TERMINAL_STAGE);
        assert!(quotation.items().is_empty());
        assert!(quotation.metadata().notes[0].contains("«metrado»"));
    }

    #[test]
    fn registry_is_shared_across_threads() {
        let registry = Arc::new(registry());
        let script = ["hola", "ROCOSO", "2", "3"];

        let totals = thread::scope(|scope| {
            let handles = (0..4)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || {
                        let mut state = ConversationState::new();
                        let mut total = None;
                        for message in script {
                            let response = registry.handle("pozo_tierra", message, Some(&state));
                            total = response.quotation.map(|quotation| quotation.totals().total);
                            state = response.state;
                        }
                        assert_eq!(state.stage, TERMINAL_STAGE);
                        total
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("worker thread"))
                .collect::<Vec<_>>()
        });

        assert!(totals[0].is_some());
        assert!(totals.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
