//! Per-conversation entry point for inbound customer messages.
//!
//! Every active conversation owns a slot with a FIFO turn lock and its current phase. The
//! turn lock is held for the whole retrieve, extract, reconcile and persist sequence, so a
//! draft order has exactly one writer; different conversations never contend. The phase
//! sits behind its own short lock so `close_conversation` can land while an extraction is
//! in flight. Such a result is still awaited but then discarded.
//!
//! A slot lives only while someone holds or waits for it. Once a turn settles back to idle
//! with nobody queued, the slot is dropped. Closed conversations are remembered in a
//! bounded set instead, oldest forgotten first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use chatorder_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use chatorder_core::domain::conversation::InboundMessage;
use chatorder_core::domain::intent::{ExtractedOrderData, OrderIntent};
use chatorder_core::domain::order::{ConversationId, DraftOrder};
use chatorder_core::errors::{ApplicationError, DomainError};
use chatorder_core::flows::{ConversationEvent, ConversationFlow, ConversationPhase};
use chatorder_core::menu::{retrieve, MenuIndex, MenuRegistry};
use chatorder_core::reconcile::Reconciler;
use chatorder_core::text::normalize_text;
use chatorder_db::repositories::{DraftOrderRepository, OrderIntentRepository, RepositoryError};

use crate::collaborators::{CustomerMessenger, OrderManagement};
use crate::extraction::ExtractionInvoker;

const ACTOR: &str = "orchestrator";

pub const MENU_UNAVAILABLE_FIELD: &str = "menu_unavailable";
pub const MENU_UNAVAILABLE_QUESTION: &str =
    "Our menu is being updated right now. Please give us a moment and send your order again.";
pub const CONFIRMATION_QUESTION: &str =
    "Just to be sure I got that right, could you repeat what you would like to order?";

/// How many closed conversation ids are remembered once their slot is gone.
pub const CLOSED_CONVERSATION_RETENTION: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePhase {
    Accepted,
    Clarifying,
    /// The draft was already confirmed or cancelled; nothing was extracted.
    Frozen,
    /// The extraction finished but was not applied.
    Discarded,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub phase: OutcomePhase,
    pub intent: Option<OrderIntent>,
    pub draft: Option<DraftOrder>,
    pub missing_fields: Vec<String>,
    pub total: Option<Decimal>,
    pub clarification_question: Option<String>,
}

impl ProcessOutcome {
    fn without_changes(phase: OutcomePhase, draft: Option<DraftOrder>) -> Self {
        Self {
            phase,
            intent: None,
            draft,
            missing_fields: Vec::new(),
            total: None,
            clarification_question: None,
        }
    }
}

/// Collaborators the orchestrator sequences.
pub struct OrchestratorParts {
    pub registry: Arc<MenuRegistry>,
    pub extractor: Arc<ExtractionInvoker>,
    pub reconciler: Reconciler,
    pub drafts: Arc<dyn DraftOrderRepository>,
    pub intents: Arc<dyn OrderIntentRepository>,
    pub order_management: Arc<dyn OrderManagement>,
    pub messenger: Arc<dyn CustomerMessenger>,
    pub audit: Arc<dyn AuditSink>,
    pub top_k: usize,
}

struct ConversationSlot {
    turn: tokio::sync::Mutex<()>,
    phase: Mutex<ConversationPhase>,
}

impl ConversationSlot {
    fn new(initial: ConversationPhase) -> Self {
        Self { turn: tokio::sync::Mutex::new(()), phase: Mutex::new(initial) }
    }
}

#[derive(Default)]
struct ClosedConversations {
    order: VecDeque<ConversationId>,
    members: HashSet<ConversationId>,
}

impl ClosedConversations {
    fn contains(&self, conversation_id: &ConversationId) -> bool {
        self.members.contains(conversation_id)
    }

    fn insert(&mut self, conversation_id: ConversationId) {
        if !self.members.insert(conversation_id.clone()) {
            return;
        }
        self.order.push_back(conversation_id);
        while self.order.len() > CLOSED_CONVERSATION_RETENTION {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }
}

#[derive(Default)]
struct Conversations {
    slots: HashMap<ConversationId, Arc<ConversationSlot>>,
    closed: ClosedConversations,
}

pub struct Orchestrator {
    parts: OrchestratorParts,
    flow: ConversationFlow,
    conversations: Mutex<Conversations>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

impl Orchestrator {
    pub fn new(parts: OrchestratorParts) -> Self {
        Self { parts, flow: ConversationFlow, conversations: Mutex::new(Conversations::default()) }
    }

    pub fn registry(&self) -> &Arc<MenuRegistry> {
        &self.parts.registry
    }

    /// Current phase; conversations without a slot are idle unless remembered as closed.
    pub fn phase(&self, conversation_id: &ConversationId) -> ConversationPhase {
        let conversations = lock(&self.conversations);
        match conversations.slots.get(conversation_id) {
            Some(slot) => *lock(&slot.phase),
            None if conversations.closed.contains(conversation_id) => ConversationPhase::Closed,
            None => self.flow.initial_phase(),
        }
    }

    /// Conversations currently holding a slot: a turn in flight or queued.
    pub fn active_conversations(&self) -> usize {
        lock(&self.conversations).slots.len()
    }

    pub async fn process_message(
        &self,
        message: InboundMessage,
    ) -> Result<ProcessOutcome, ApplicationError> {
        if message.text.trim().is_empty() {
            return Err(ApplicationError::InvalidInput("message text is empty".to_string()));
        }

        let slot = self.slot(&message.conversation_id);
        let result = self.take_turn(&slot, &message).await;
        self.release(&message.conversation_id, slot);
        result
    }

    async fn take_turn(
        &self,
        slot: &ConversationSlot,
        message: &InboundMessage,
    ) -> Result<ProcessOutcome, ApplicationError> {
        let _turn = slot.turn.lock().await;

        let audit = AuditContext::new(
            Some(message.conversation_id.0.clone()),
            Some(message.message_id.0.clone()),
            message.message_id.0.clone(),
            ACTOR,
        );
        self.parts.audit.emit(
            AuditEvent::from_context(
                &audit,
                "ingress.message_received",
                AuditCategory::Ingress,
                AuditOutcome::Success,
            )
            .with_metadata("tenant_id", message.tenant_id.0.clone()),
        );

        self.transition(slot, ConversationEvent::MessageReceived, &audit)?;
        let result = self.run_turn(slot, message, &audit).await;
        self.settle(slot, &audit);

        if let Err(error) = &result {
            warn!(
                event_name = "orchestrator.turn_failed",
                conversation_id = %message.conversation_id.0,
                message_id = %message.message_id.0,
                error = %error,
                "message processing failed"
            );
        }
        result
    }

    /// Ends the state machine for a conversation. Closing twice is a no-op.
    pub fn close_conversation(&self, conversation_id: &ConversationId) {
        let slot = {
            let mut conversations = lock(&self.conversations);
            let existing = conversations.slots.get(conversation_id).cloned();
            match existing {
                Some(slot) => slot,
                None => {
                    // Nothing in flight: remember the id without allocating a slot.
                    let initial = self.flow.initial_phase();
                    if !conversations.closed.contains(conversation_id)
                        && self.close_phase(conversation_id, initial, false).is_some()
                    {
                        conversations.closed.insert(conversation_id.clone());
                    }
                    return;
                }
            }
        };

        {
            let mut phase = lock(&slot.phase);
            if *phase == ConversationPhase::Closed {
                return;
            }
            let in_flight = *phase == ConversationPhase::Extracting;
            if let Some(closed) = self.close_phase(conversation_id, *phase, in_flight) {
                *phase = closed;
            }
        }
        self.release(conversation_id, slot);
    }

    fn close_phase(
        &self,
        conversation_id: &ConversationId,
        current: ConversationPhase,
        in_flight: bool,
    ) -> Option<ConversationPhase> {
        let audit =
            AuditContext::new(Some(conversation_id.0.clone()), None, conversation_id.0.clone(), ACTOR);
        match self.flow.apply_with_audit(
            current,
            ConversationEvent::ConversationClosed,
            self.parts.audit.as_ref(),
            &audit,
        ) {
            Ok(transition) => {
                info!(
                    event_name = "orchestrator.conversation_closed",
                    conversation_id = %conversation_id.0,
                    in_flight,
                    "conversation closed"
                );
                Some(transition.to)
            }
            Err(error) => {
                warn!(
                    event_name = "orchestrator.close_rejected",
                    conversation_id = %conversation_id.0,
                    error = %error,
                    "conversation close rejected"
                );
                None
            }
        }
    }

    async fn run_turn(
        &self,
        slot: &ConversationSlot,
        message: &InboundMessage,
        audit: &AuditContext,
    ) -> Result<ProcessOutcome, ApplicationError> {
        let conversation_id = &message.conversation_id;
        let existing = self.parts.drafts.find(conversation_id).await.map_err(persistence)?;

        if let Some(draft) = existing.as_ref().filter(|draft| draft.is_frozen()) {
            info!(
                event_name = "orchestrator.draft_frozen",
                conversation_id = %conversation_id.0,
                status = draft.status.as_str(),
                "draft order is frozen; message not extracted"
            );
            self.parts.audit.emit(
                AuditEvent::from_context(
                    audit,
                    "reconciliation.skipped_frozen",
                    AuditCategory::Reconciliation,
                    AuditOutcome::Rejected,
                )
                .with_metadata("status", draft.status.as_str()),
            );
            return Ok(ProcessOutcome::without_changes(OutcomePhase::Frozen, existing));
        }

        let Some(index) = self.parts.registry.current(&message.tenant_id) else {
            let stale = ApplicationError::MenuIndexStale(message.tenant_id.0.clone());
            warn!(
                event_name = "orchestrator.menu_index_stale",
                conversation_id = %conversation_id.0,
                tenant_id = %message.tenant_id.0,
                error = %stale,
                "no published menu; asking the customer to wait"
            );
            self.parts.audit.emit(
                AuditEvent::from_context(
                    audit,
                    "retrieval.menu_index_stale",
                    AuditCategory::Retrieval,
                    AuditOutcome::Rejected,
                )
                .with_metadata("tenant_id", message.tenant_id.0.clone())
                .with_metadata("error", stale.to_string()),
            );
            let data =
                ExtractedOrderData::clarification(MENU_UNAVAILABLE_QUESTION, MENU_UNAVAILABLE_FIELD);
            return self.clarify(slot, message, existing, data, false, None, audit).await;
        };

        let candidates = retrieve(&message.text, &index, self.parts.top_k);
        self.parts.audit.emit(
            AuditEvent::from_context(
                audit,
                "retrieval.candidates_ranked",
                AuditCategory::Retrieval,
                AuditOutcome::Success,
            )
            .with_metadata("menu_version", index.version().to_string())
            .with_metadata("candidates", candidates.len().to_string()),
        );

        let draft_items = existing.as_ref().map(|draft| draft.items.clone()).unwrap_or_default();
        let attempt =
            self.parts.extractor.extract(&message.turns(), &draft_items, &candidates).await;
        let extraction_outcome =
            if attempt.flagged_for_audit { AuditOutcome::Failed } else { AuditOutcome::Success };
        let mut event = AuditEvent::from_context(
            audit,
            "extraction.completed",
            AuditCategory::Extraction,
            extraction_outcome,
        )
        .with_metadata("attempts", attempt.attempts.to_string())
        .with_metadata("confidence", attempt.data.confidence.to_string());
        if let Some(failure) = &attempt.failure {
            event = event.with_metadata("failure", failure.to_string());
        }
        self.parts.audit.emit(event);

        let outcome = self.parts.reconciler.reconcile(&draft_items, &attempt.data, &index);
        if !outcome.accepted {
            return self
                .clarify(
                    slot,
                    message,
                    existing,
                    attempt.data,
                    attempt.flagged_for_audit,
                    Some(outcome.total),
                    audit,
                )
                .await;
        }

        if !self.conclude(slot, ConversationEvent::ExtractionAccepted, audit)? {
            return Ok(self.discard_closed(message, existing, audit));
        }

        let (mut draft, expected_revision) = match existing {
            Some(draft) => {
                let revision = draft.revision;
                (draft, revision)
            }
            None => (DraftOrder::empty(conversation_id.clone(), message.tenant_id.clone()), 0),
        };
        draft.replace_items(outcome.items).map_err(ApplicationError::from)?;

        let follow_up = (!outcome.missing_fields.is_empty())
            .then(|| follow_up_question(&outcome.missing_fields, &index));
        let mut intent = OrderIntent::new(
            conversation_id.clone(),
            message.message_id.clone(),
            attempt.data,
            true,
            attempt.flagged_for_audit,
        );
        intent.clarification_question = follow_up.clone();
        self.parts.intents.append(intent.clone()).await.map_err(persistence)?;

        let saved = match self.parts.drafts.save(draft, expected_revision).await {
            Ok(saved) => saved,
            Err(RepositoryError::Conflict(reason)) => {
                warn!(
                    event_name = "orchestrator.reconciliation_conflict",
                    conversation_id = %conversation_id.0,
                    message_id = %message.message_id.0,
                    reason = %reason,
                    "draft order changed during extraction; discarding result"
                );
                self.parts.audit.emit(
                    AuditEvent::from_context(
                        audit,
                        "reconciliation.conflict",
                        AuditCategory::Reconciliation,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("intent_id", intent.id.0.clone())
                    .with_metadata("expected_revision", expected_revision.to_string())
                    .with_metadata("reason", reason),
                );
                let current = self.parts.drafts.find(conversation_id).await.map_err(persistence)?;
                let mut discarded =
                    ProcessOutcome::without_changes(OutcomePhase::Discarded, current);
                discarded.intent = Some(intent);
                return Ok(discarded);
            }
            Err(error) => return Err(persistence(error)),
        };

        info!(
            event_name = "orchestrator.extraction.accepted",
            conversation_id = %conversation_id.0,
            message_id = %message.message_id.0,
            intent_id = %intent.id.0,
            revision = saved.revision,
            lines = saved.items.len(),
            "extraction applied to draft order"
        );
        self.parts.audit.emit(
            AuditEvent::from_context(
                audit,
                "reconciliation.accepted",
                AuditCategory::Reconciliation,
                AuditOutcome::Success,
            )
            .with_metadata("intent_id", intent.id.0.clone())
            .with_metadata("revision", saved.revision.to_string())
            .with_metadata("total", outcome.total.to_string()),
        );

        if let Err(error) = self.parts.order_management.apply_draft(&saved).await {
            warn!(
                event_name = "orchestrator.order_management_failed",
                conversation_id = %conversation_id.0,
                error = %error,
                "order management did not accept the draft"
            );
        }
        if let Some(question) = follow_up.as_deref() {
            self.deliver(conversation_id, question).await;
        }

        Ok(ProcessOutcome {
            phase: OutcomePhase::Accepted,
            intent: Some(intent),
            draft: Some(saved),
            missing_fields: outcome.missing_fields,
            total: Some(outcome.total),
            clarification_question: follow_up,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn clarify(
        &self,
        slot: &ConversationSlot,
        message: &InboundMessage,
        draft: Option<DraftOrder>,
        data: ExtractedOrderData,
        flagged_for_audit: bool,
        total: Option<Decimal>,
        audit: &AuditContext,
    ) -> Result<ProcessOutcome, ApplicationError> {
        if !self.conclude(slot, ConversationEvent::ClarificationNeeded, audit)? {
            return Ok(self.discard_closed(message, draft, audit));
        }

        let question =
            data.clarification_question.clone().unwrap_or_else(|| CONFIRMATION_QUESTION.to_string());
        let missing_fields = data.missing_fields.clone();
        let mut intent = OrderIntent::new(
            message.conversation_id.clone(),
            message.message_id.clone(),
            data,
            false,
            flagged_for_audit,
        );
        intent.clarification_question = Some(question.clone());
        self.parts.intents.append(intent.clone()).await.map_err(persistence)?;

        info!(
            event_name = "orchestrator.extraction.clarifying",
            conversation_id = %message.conversation_id.0,
            message_id = %message.message_id.0,
            intent_id = %intent.id.0,
            confidence = intent.confidence,
            flagged_for_audit,
            "extraction needs clarification; draft unchanged"
        );
        self.parts.audit.emit(
            AuditEvent::from_context(
                audit,
                "reconciliation.clarification_needed",
                AuditCategory::Reconciliation,
                AuditOutcome::Rejected,
            )
            .with_metadata("intent_id", intent.id.0.clone())
            .with_metadata("missing_fields", missing_fields.join(",")),
        );

        self.deliver(&message.conversation_id, &question).await;

        Ok(ProcessOutcome {
            phase: OutcomePhase::Clarifying,
            intent: Some(intent),
            draft,
            missing_fields,
            total,
            clarification_question: Some(question),
        })
    }

    fn discard_closed(
        &self,
        message: &InboundMessage,
        draft: Option<DraftOrder>,
        audit: &AuditContext,
    ) -> ProcessOutcome {
        info!(
            event_name = "orchestrator.extraction.discarded",
            conversation_id = %message.conversation_id.0,
            message_id = %message.message_id.0,
            "conversation closed during extraction; result discarded"
        );
        self.parts.audit.emit(AuditEvent::from_context(
            audit,
            "extraction.discarded",
            AuditCategory::Extraction,
            AuditOutcome::Rejected,
        ));
        ProcessOutcome::without_changes(OutcomePhase::Discarded, draft)
    }

    async fn deliver(&self, conversation_id: &ConversationId, question: &str) {
        if let Err(error) = self.parts.messenger.send_clarification(conversation_id, question).await
        {
            warn!(
                event_name = "orchestrator.messenger_failed",
                conversation_id = %conversation_id.0,
                error = %error,
                "clarification could not be delivered"
            );
        }
    }

    fn slot(&self, conversation_id: &ConversationId) -> Arc<ConversationSlot> {
        let mut conversations = lock(&self.conversations);
        let initial = if conversations.closed.contains(conversation_id) {
            ConversationPhase::Closed
        } else {
            self.flow.initial_phase()
        };
        conversations
            .slots
            .entry(conversation_id.clone())
            .or_insert_with(|| Arc::new(ConversationSlot::new(initial)))
            .clone()
    }

    /// Drops a caller's handle and evicts the slot when nobody else holds it and it is at
    /// rest. Clones only happen under the same lock, so an evicted slot has no waiters.
    fn release(&self, conversation_id: &ConversationId, slot: Arc<ConversationSlot>) {
        drop(slot);
        let mut conversations = lock(&self.conversations);
        let Some(held) = conversations.slots.get(conversation_id) else {
            return;
        };
        if Arc::strong_count(held) > 1 {
            return;
        }
        let phase = *lock(&held.phase);
        match phase {
            ConversationPhase::Idle => {
                conversations.slots.remove(conversation_id);
            }
            ConversationPhase::Closed => {
                conversations.slots.remove(conversation_id);
                conversations.closed.insert(conversation_id.clone());
            }
            ConversationPhase::Extracting
            | ConversationPhase::Accepted
            | ConversationPhase::Clarifying => {}
        }
    }

    fn transition(
        &self,
        slot: &ConversationSlot,
        event: ConversationEvent,
        audit: &AuditContext,
    ) -> Result<ConversationPhase, ApplicationError> {
        let mut phase = lock(&slot.phase);
        let transition = self
            .flow
            .apply_with_audit(*phase, event, self.parts.audit.as_ref(), audit)
            .map_err(DomainError::from)?;
        *phase = transition.to;
        Ok(transition.to)
    }

    /// Moves out of `Extracting`. Returns `false` when the conversation was closed meanwhile.
    fn conclude(
        &self,
        slot: &ConversationSlot,
        event: ConversationEvent,
        audit: &AuditContext,
    ) -> Result<bool, ApplicationError> {
        let mut phase = lock(&slot.phase);
        if *phase == ConversationPhase::Closed {
            return Ok(false);
        }
        let transition = self
            .flow
            .apply_with_audit(*phase, event, self.parts.audit.as_ref(), audit)
            .map_err(DomainError::from)?;
        *phase = transition.to;
        Ok(true)
    }

    /// Returns the slot to `Idle` after a turn, whatever happened. Closed stays closed.
    fn settle(&self, slot: &ConversationSlot, audit: &AuditContext) {
        let mut phase = lock(&slot.phase);
        let event = match *phase {
            ConversationPhase::Accepted | ConversationPhase::Clarifying => {
                ConversationEvent::OutcomeDelivered
            }
            ConversationPhase::Extracting => ConversationEvent::ExtractionDiscarded,
            ConversationPhase::Idle | ConversationPhase::Closed => return,
        };
        if let Ok(transition) =
            self.flow.apply_with_audit(*phase, event, self.parts.audit.as_ref(), audit)
        {
            *phase = transition.to;
        }
    }
}

/// Customer-facing question for the structural gaps the reconciler found.
pub fn follow_up_question(missing_fields: &[String], menu: &MenuIndex) -> String {
    let mut questions: Vec<String> = Vec::new();
    for field in missing_fields {
        let (path, tag) = field.split_once(':').unwrap_or((field.as_str(), ""));
        let (item_id, group_name) = path.split_once('.').unwrap_or((path, ""));
        let item_name = menu
            .items()
            .find(|entry| entry.menu_item_id.0 == item_id)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| item_id.to_string());

        let options = menu
            .items()
            .find(|entry| entry.menu_item_id.0 == item_id)
            .map(|entry| menu.groups_for_item(&entry.menu_item_id))
            .unwrap_or_default()
            .into_iter()
            .find(|group| normalize_text(&group.name) == normalize_text(group_name))
            .map(|group| {
                let names = group.options.iter().map(|option| option.name.as_str());
                (group.max_select, names.collect::<Vec<_>>().join(", "))
            });

        let question = match (tag, options) {
            ("unavailable", _) => {
                format!("{item_name} is no longer available. Would you like something else instead?")
            }
            ("too_many", Some((max, _))) => {
                format!("Please choose at most {max} {group_name} for {item_name}.")
            }
            ("unknown_option", Some((_, names))) => {
                format!("We do not offer that {group_name} for {item_name}. Options: {names}.")
            }
            ("", Some((_, names))) => {
                format!("Which {group_name} would you like for {item_name}? Options: {names}.")
            }
            _ => format!("Could you tell me more about the {item_name}?"),
        };
        if !questions.contains(&question) {
            questions.push(question);
        }
    }
    questions.join(" ")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use chatorder_core::domain::menu::{
        CanonicalMenuExport, MenuCategory, MenuItem, MenuItemId, MenuOption, OptionGroup,
        OptionGroupId, OptionId, TenantId,
    };
    use chatorder_core::menu::MenuIndex;

    use super::follow_up_question;

    fn menu() -> MenuIndex {
        MenuIndex::build(CanonicalMenuExport {
            tenant_id: TenantId("ocakbasi".to_string()),
            version: 1,
            categories: vec![MenuCategory {
                name: "Pideler".to_string(),
                items: vec![MenuItem {
                    id: MenuItemId("pide".to_string()),
                    name: "Kuşbaşılı Pide".to_string(),
                    base_price: Decimal::new(28_000, 2),
                    option_group_ids: vec![OptionGroupId("boyut".to_string())],
                }],
            }],
            option_groups: vec![OptionGroup {
                id: OptionGroupId("boyut".to_string()),
                name: "Boyut".to_string(),
                min_select: 1,
                max_select: 1,
                options: vec![
                    MenuOption {
                        id: OptionId("boyut-kucuk".to_string()),
                        name: "Küçük".to_string(),
                        price_delta: Decimal::ZERO,
                    },
                    MenuOption {
                        id: OptionId("boyut-buyuk".to_string()),
                        name: "Büyük".to_string(),
                        price_delta: Decimal::new(6_000, 2),
                    },
                ],
            }],
            synonyms: Vec::new(),
        })
        .expect("valid menu")
    }

    #[test]
    fn asks_for_required_option_with_choices() {
        let question = follow_up_question(&["pide.Boyut".to_string()], &menu());
        assert_eq!(
            question,
            "Which Boyut would you like for Kuşbaşılı Pide? Options: Küçük, Büyük."
        );
    }

    #[test]
    fn reports_unavailable_items_by_id() {
        let question = follow_up_question(&["lahmacun:unavailable".to_string()], &menu());
        assert!(question.starts_with("lahmacun is no longer available"));
    }
}
