use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Idle,
    Extracting,
    Accepted,
    Clarifying,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationEvent {
    MessageReceived,
    ExtractionAccepted,
    ClarificationNeeded,
    ExtractionDiscarded,
    OutcomeDelivered,
    ConversationClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseAction {
    RetrieveCandidates,
    InvokeExtraction,
    ApplyDraftOrder,
    DeliverClarification,
    DiscardResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: ConversationPhase,
    pub to: ConversationPhase,
    pub event: ConversationEvent,
    pub actions: Vec<PhaseAction>,
}
