use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::catalog::{
    InputKind, KnowledgeBase, NextStage, QuickReply, ShortcutTransition, StageDescriptor,
};
use crate::dialogue::payload::{self, PayloadError};
use crate::dialogue::response::{SubstepRequest, TurnError, TurnResponse, RISK_TABLE_SUBSTEP};
use crate::domain::conversation::{
    ConversationState, FieldValue, TurnOutcome, INITIAL_STAGE, TERMINAL_STAGE, VARIANT_FIELD,
};
use crate::domain::quotation::{Quotation, TAX_RATE_PERCENT};
use crate::pricing::schedule;
use crate::pricing::{DeterministicQuotationEngine, QuotationEngine};
use crate::validator::{self, NumberKind, ValidationError};

const ALREADY_QUOTED_REPLY: &str =
    "La cotización ya fue generada. Inicia una nueva conversación para cotizar otra vez.";

/// Table-driven interpreter over one domain's stage descriptors.
///
/// Every turn is a pure `(state, message) -> response` step: the controller
/// keeps no per-conversation data and never fails, so errors only ever show
/// up as [`TurnError`] annotations on the reply.
pub struct Controller<E = DeterministicQuotationEngine> {
    knowledge_base: Arc<KnowledgeBase>,
    engine: E,
    currency: String,
}

impl Controller<DeterministicQuotationEngine> {
    pub fn new(knowledge_base: Arc<KnowledgeBase>, currency: impl Into<String>) -> Self {
        Self::with_engine(knowledge_base, DeterministicQuotationEngine, currency)
    }
}

impl<E> Controller<E>
where
    E: QuotationEngine,
{
    pub fn with_engine(
        knowledge_base: Arc<KnowledgeBase>,
        engine: E,
        currency: impl Into<String>,
    ) -> Self {
        Self { knowledge_base, engine, currency: currency.into() }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn domain(&self) -> &str {
        &self.knowledge_base.domain
    }

    pub fn handle(&self, state: &ConversationState, message: &str) -> TurnResponse {
        let message = message.trim();

        if state.is_terminal() {
            debug!(
                event_name = "dialogue.turn_after_quotation",
                domain = %self.domain(),
                "conversation already quoted"
            );
            return TurnResponse::echo(ALREADY_QUOTED_REPLY, state.clone());
        }

        if state.is_initial() {
            return match self.knowledge_base.shortcut(message) {
                Some(shortcut) => self.apply_shortcut(state, message, shortcut),
                None => self.open(state, message),
            };
        }

        let Some(stage) = self.knowledge_base.stage(&state.stage) else {
            return self.unknown_stage(state);
        };

        if let Some(shortcut) = self.knowledge_base.shortcut(message) {
            return self.apply_shortcut(state, message, shortcut);
        }

        if let Some(parsed) = payload::parse_risks(message) {
            let entries = match (&stage.input, parsed) {
                (InputKind::Risks, Ok(entries)) => entries,
                (InputKind::Risks, Err(error)) => {
                    return self.reject_payload(state, stage, message, error);
                }
                (_, _) => {
                    let error = PayloadError::UnexpectedStage;
                    return self.reject_payload(state, stage, message, error);
                }
            };
            let mut next = state.clone();
            next.record(&stage.id, FieldValue::Risks(entries));
            next.push_turn(&stage.id, message, TurnOutcome::Structured);
            let target = self.knowledge_base.next_in_sequence(&stage.id).to_string();
            return self.advance(next, &stage.id, &target, None);
        }

        match self.accept(stage, message) {
            Ok(value) => {
                let mut next = state.clone();
                self.record_answer(&mut next, stage, value.clone());
                let target = self.resolve_next(stage, &value, &mut next);
                next.push_turn(&stage.id, message, TurnOutcome::Accepted);
                self.advance(next, &stage.id, &target, None)
            }
            Err(error) => self.reject(
                state,
                stage,
                message,
                TurnError::Validation { stage: stage.id.clone(), message: error.to_string() },
            ),
        }
    }

    /// [`Controller::handle`] plus audit events for the turn outcome and, on
    /// the closing turn, the produced quotation.
    pub fn handle_with_audit<S>(
        &self,
        state: &ConversationState,
        message: &str,
        sink: &S,
        audit: &AuditContext,
    ) -> TurnResponse
    where
        S: AuditSink,
    {
        let response = self.handle(state, message);
        match &response.error {
            Some(error) => sink.emit(
                audit
                    .event(
                        self.domain(),
                        "dialogue.turn_rejected",
                        AuditCategory::Dialogue,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("stage", state.stage.clone())
                    .with_metadata("error", error.to_string()),
            ),
            // Informational replies hand the state back untouched.
            None if response.state == *state => {}
            None => sink.emit(
                audit
                    .event(
                        self.domain(),
                        "dialogue.turn_accepted",
                        AuditCategory::Dialogue,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", state.stage.clone())
                    .with_metadata("to", response.state.stage.clone()),
            ),
        }

        if let Some(quotation) = &response.quotation {
            let totals = quotation.totals();
            sink.emit(
                audit
                    .event(
                        self.domain(),
                        "dialogue.quotation_produced",
                        AuditCategory::Pricing,
                        AuditOutcome::Success,
                    )
                    .with_metadata("variant", quotation.metadata().variant.clone())
                    .with_metadata("total", totals.total.to_string())
                    .with_metadata("checksum", quotation.checksum()),
            );
        }

        response
    }

    fn open(&self, state: &ConversationState, message: &str) -> TurnResponse {
        let first = self.knowledge_base.first_stage().to_string();
        let mut next = state.clone();
        next.push_turn(INITIAL_STAGE, message, TurnOutcome::Opened);
        debug!(
            event_name = "dialogue.opened",
            domain = %self.domain(),
            stage = %first,
            "dialogue opened"
        );
        self.advance(next, INITIAL_STAGE, &first, Some(self.knowledge_base.greeting.as_str()))
    }

    fn apply_shortcut(
        &self,
        state: &ConversationState,
        message: &str,
        shortcut: &ShortcutTransition,
    ) -> TurnResponse {
        let mut next = state.clone();
        if let Some(variant) = &shortcut.variant {
            self.record_variant(&mut next, variant);
        }
        next.push_turn(&state.stage, message, TurnOutcome::Shortcut);
        info!(
            event_name = "dialogue.shortcut_applied",
            domain = %self.domain(),
            from = %state.stage,
            to = %shortcut.target,
            token = %shortcut.token,
            "shortcut applied"
        );
        let preface = format!("Perfecto: {}.", shortcut.label);
        self.advance(next, &state.stage, &shortcut.target, Some(preface.as_str()))
    }

    fn accept(
        &self,
        stage: &StageDescriptor,
        message: &str,
    ) -> Result<FieldValue, ValidationError> {
        match &stage.input {
            InputKind::Integer { min, max } => {
                validator::validate_integer(message, *min, *max).map(FieldValue::Integer)
            }
            InputKind::Decimal { min, max } => {
                validator::validate(message, NumberKind::Decimal, *min, *max).map(FieldValue::from)
            }
            InputKind::Text { min_len, max_len } => {
                validator::validate_text(message, *min_len, *max_len).map(FieldValue::Text)
            }
            InputKind::Variant => {
                validator::validate_choice(message, self.knowledge_base.variant_options())
                    .map(FieldValue::Text)
            }
            InputKind::Risks => Err(ValidationError::StructuredInputRequired),
        }
    }

    fn record_answer(
        &self,
        state: &mut ConversationState,
        stage: &StageDescriptor,
        value: FieldValue,
    ) {
        match (&stage.input, &value) {
            (InputKind::Variant, FieldValue::Text(code)) => self.record_variant(state, code),
            _ => state.record(&stage.id, value),
        }
    }

    /// Stores the variant code and mirrors it into every variant stage.
    fn record_variant(&self, state: &mut ConversationState, code: &str) {
        state.record(VARIANT_FIELD, FieldValue::Text(code.to_string()));
        for stage in &self.knowledge_base.stages {
            if stage.input == InputKind::Variant {
                state.record(&stage.id, FieldValue::Text(code.to_string()));
            }
        }
    }

    fn resolve_next(
        &self,
        stage: &StageDescriptor,
        value: &FieldValue,
        state: &mut ConversationState,
    ) -> String {
        match &stage.next {
            NextStage::Sequence => self.knowledge_base.next_in_sequence(&stage.id).to_string(),
            NextStage::Goto { stage: target } => target.clone(),
            NextStage::SplitWhenPositive { skip_to } => {
                match value.as_integer().and_then(|total| u32::try_from(total).ok()) {
                    Some(total) if total > 0 => {
                        for phase in schedule::allocate(&self.knowledge_base.phases, total) {
                            state.record(phase.id, FieldValue::Integer(i64::from(phase.days)));
                        }
                        skip_to.clone()
                    }
                    _ => self.knowledge_base.next_in_sequence(&stage.id).to_string(),
                }
            }
        }
    }

    /// Moves `next` to `target` and builds the reply for it. Reaching the
    /// terminal stage assembles the quotation.
    fn advance(
        &self,
        mut next: ConversationState,
        from: &str,
        target: &str,
        preface: Option<&str>,
    ) -> TurnResponse {
        next.stage = target.to_string();

        if target == TERMINAL_STAGE {
            let quotation = self.engine.assemble(&self.knowledge_base, &next, &self.currency);
            let totals = quotation.totals();
            info!(
                event_name = "dialogue.quotation_produced",
                domain = %self.domain(),
                from = %from,
                variant = %quotation.metadata().variant,
                subtotal = %totals.subtotal,
                total = %totals.total,
                "quotation produced"
            );
            let reply_text = self.closing_reply(&quotation, preface);
            let mut response = TurnResponse::echo(reply_text, next);
            response.quotation = Some(quotation);
            return response;
        }

        let Some(stage) = self.knowledge_base.stage(target) else {
            return self.unknown_stage(&next);
        };
        info!(
            event_name = "dialogue.turn_accepted",
            domain = %self.domain(),
            from = %from,
            to = %target,
            "turn accepted"
        );
        let reply_text = match preface {
            Some(preface) => format!("{preface}\n\n{}", stage.prompt),
            None => stage.prompt.clone(),
        };
        self.prompt_response(reply_text, stage, next)
    }

    fn reject(
        &self,
        state: &ConversationState,
        stage: &StageDescriptor,
        message: &str,
        error: TurnError,
    ) -> TurnResponse {
        info!(
            event_name = "dialogue.turn_rejected",
            domain = %self.domain(),
            stage = %stage.id,
            error = %error,
            "turn rejected"
        );
        let mut next = state.clone();
        next.push_turn(&stage.id, message, TurnOutcome::Rejected);
        let reply_text = format!("{error}\n\n{}", stage.prompt);
        self.prompt_response(reply_text, stage, next).with_error(error)
    }

    fn reject_payload(
        &self,
        state: &ConversationState,
        stage: &StageDescriptor,
        message: &str,
        error: PayloadError,
    ) -> TurnResponse {
        let error = TurnError::Parse { stage: stage.id.clone(), message: error.to_string() };
        self.reject(state, stage, message, error)
    }

    fn unknown_stage(&self, state: &ConversationState) -> TurnResponse {
        info!(
            event_name = "dialogue.unknown_stage",
            domain = %self.domain(),
            stage = %state.stage,
            "stage is not part of this domain"
        );
        TurnResponse::echo(
            "Esta etapa de la conversación aún no está implementada.",
            state.clone(),
        )
        .with_error(TurnError::UnknownStage {
            domain: self.domain().to_string(),
            stage: state.stage.clone(),
        })
    }

    fn prompt_response(
        &self,
        reply_text: String,
        stage: &StageDescriptor,
        state: ConversationState,
    ) -> TurnResponse {
        let next_substep_request = (stage.input == InputKind::Risks).then(|| SubstepRequest {
            kind: RISK_TABLE_SUBSTEP.to_string(),
            prior_values: state.get(&stage.id).cloned(),
        });
        let mut response = TurnResponse::echo(reply_text, state);
        response.quick_replies = self.quick_replies(stage);
        response.next_substep_request = next_substep_request;
        response
    }

    /// Stage quick replies followed by the global shortcuts, without duplicates.
    fn quick_replies(&self, stage: &StageDescriptor) -> Option<Vec<QuickReply>> {
        let mut replies: Vec<QuickReply> = stage.quick_replies.clone();
        for shortcut in &self.knowledge_base.shortcuts {
            if replies.iter().all(|reply| reply.value != shortcut.token) {
                replies.push(shortcut.quick_reply());
            }
        }
        (!replies.is_empty()).then_some(replies)
    }

    fn closing_reply(&self, quotation: &Quotation, preface: Option<&str>) -> String {
        let totals = quotation.totals();
        let metadata = quotation.metadata();
        let money = |amount: Decimal| format!("{} {}", metadata.currency, amount.round_dp(2));
        let summary = format!(
            "Cotización de {} ({}): subtotal {}, IGV ({TAX_RATE_PERCENT}%) {}, total {}.",
            metadata.title,
            metadata.variant_label,
            money(totals.subtotal),
            money(totals.tax),
            money(totals.total),
        );
        match preface {
            Some(preface) => format!("{preface}\n\n{summary}"),
            None => summary,
        }
    }
}
