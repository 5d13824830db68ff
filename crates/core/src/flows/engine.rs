use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{ConversationEvent, ConversationPhase, PhaseAction, PhaseTransition};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {phase:?} using event {event:?}")]
    InvalidTransition { phase: ConversationPhase, event: ConversationEvent },
}

/// Per-conversation order-taking state machine.
///
/// `Idle -> Extracting -> (Accepted | Clarifying) -> Idle`. Closing is accepted from any
/// phase; an extraction that finishes after closure is discarded.
#[derive(Clone, Debug, Default)]
pub struct ConversationFlow;

impl ConversationFlow {
    pub fn initial_phase(&self) -> ConversationPhase {
        ConversationPhase::Idle
    }

    pub fn apply(
        &self,
        current: ConversationPhase,
        event: ConversationEvent,
    ) -> Result<PhaseTransition, FlowTransitionError> {
        transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: ConversationPhase,
        event: ConversationEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<PhaseTransition, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => sink.emit(
                AuditEvent::from_context(
                    audit,
                    "flow.transition_applied",
                    AuditCategory::Flow,
                    AuditOutcome::Success,
                )
                .with_metadata("from", format!("{:?}", outcome.from))
                .with_metadata("to", format!("{:?}", outcome.to))
                .with_metadata("event", format!("{:?}", outcome.event)),
            ),
            Err(error) => sink.emit(
                AuditEvent::from_context(
                    audit,
                    "flow.transition_rejected",
                    AuditCategory::Flow,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            ),
        }
        result
    }
}

fn transition(
    current: ConversationPhase,
    event: ConversationEvent,
) -> Result<PhaseTransition, FlowTransitionError> {
    use ConversationEvent::{
        ClarificationNeeded, ConversationClosed, ExtractionAccepted, ExtractionDiscarded,
        MessageReceived, OutcomeDelivered,
    };
    use ConversationPhase::{Accepted, Clarifying, Closed, Extracting, Idle};
    use PhaseAction::{
        ApplyDraftOrder, DeliverClarification, DiscardResult, InvokeExtraction,
        RetrieveCandidates,
    };

    let (to, actions) = match (current, event) {
        (Idle, MessageReceived) => (Extracting, vec![RetrieveCandidates, InvokeExtraction]),
        (Extracting, ExtractionAccepted) => (Accepted, vec![ApplyDraftOrder]),
        (Extracting, ClarificationNeeded) => (Clarifying, vec![DeliverClarification]),
        (Extracting, ExtractionDiscarded) => (Idle, vec![DiscardResult]),
        (Accepted, OutcomeDelivered) | (Clarifying, OutcomeDelivered) => (Idle, Vec::new()),
        (Extracting, ConversationClosed) => (Closed, vec![DiscardResult]),
        (Closed, ConversationClosed) => {
            return Err(FlowTransitionError::InvalidTransition { phase: current, event });
        }
        (_, ConversationClosed) => (Closed, Vec::new()),
        _ => {
            return Err(FlowTransitionError::InvalidTransition { phase: current, event });
        }
    };

    Ok(PhaseTransition { from: current, to, event, actions })
}
