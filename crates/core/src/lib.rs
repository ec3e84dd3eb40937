//! Stage-based quotation dialogues over declarative domain catalogs.
//!
//! A [`SpecialistRegistry`] maps domain ids to specialists. Each builtin
//! specialist is a [`Controller`] interpreting one [`KnowledgeBase`]: it walks
//! the catalog's stage table turn by turn and, once every stage is answered,
//! hands the collected data to the [`QuotationEngine`].

pub mod audit;
pub mod catalog;
pub mod config;
pub mod dialogue;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod registry;
pub mod validator;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
pub use catalog::{CatalogError, KnowledgeBase, QuickReply};
pub use dialogue::{Controller, SubstepRequest, TurnError, TurnResponse};
pub use domain::conversation::{ConversationState, FieldValue, Turn, TurnOutcome};
pub use domain::quotation::{LineItem, Quotation, QuotationMetadata, Totals};
pub use domain::risk::{Impact, Probability, RiskEntry, Severity};
pub use errors::ApplicationError;
pub use pricing::{DeterministicQuotationEngine, QuotationEngine};
pub use registry::{Specialist, SpecialistRegistry, UnavailableSpecialist};
pub use validator::{validate, Number, NumberKind, ValidationError};
