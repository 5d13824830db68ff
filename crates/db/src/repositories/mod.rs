use async_trait::async_trait;
use thiserror::Error;

use chatorder_core::domain::intent::{AgentFeedback, FeedbackSummary, OrderIntent, OrderIntentId};
use chatorder_core::domain::order::{ConversationId, DraftOrder, DraftOrderStatus};

pub mod draft_order;
pub mod intent;
pub mod memory;

pub use draft_order::SqlDraftOrderRepository;
pub use intent::SqlOrderIntentRepository;
pub use memory::{InMemoryDraftOrderRepository, InMemoryOrderIntentRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("write conflict: {0}")]
    Conflict(String),
}

/// Result of a single-write feedback attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackWrite {
    Recorded,
    AlreadyRecorded(AgentFeedback),
    NotFound,
}

#[async_trait]
pub trait OrderIntentRepository: Send + Sync {
    async fn append(&self, intent: OrderIntent) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &OrderIntentId) -> Result<Option<OrderIntent>, RepositoryError>;

    /// Oldest first.
    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<OrderIntent>, RepositoryError>;

    /// Sets `agent_feedback` only when it is still unset.
    async fn record_feedback(
        &self,
        id: &OrderIntentId,
        feedback: AgentFeedback,
    ) -> Result<FeedbackWrite, RepositoryError>;

    async fn feedback_summary(&self) -> Result<FeedbackSummary, RepositoryError>;
}

#[async_trait]
pub trait DraftOrderRepository: Send + Sync {
    async fn find(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<DraftOrder>, RepositoryError>;

    /// Compare-and-swap on `revision`. `expected_revision` 0 means the draft must not exist
    /// yet. Returns the stored draft with its new revision. Frozen drafts are never
    /// overwritten.
    async fn save(
        &self,
        draft: DraftOrder,
        expected_revision: u64,
    ) -> Result<DraftOrder, RepositoryError>;

    /// Freezes an open draft. `Ok(None)` when the conversation has no draft.
    async fn update_status(
        &self,
        conversation_id: &ConversationId,
        status: DraftOrderStatus,
    ) -> Result<Option<DraftOrder>, RepositoryError>;
}

pub(crate) fn revision_conflict(conversation_id: &ConversationId, expected: u64) -> RepositoryError {
    RepositoryError::Conflict(format!(
        "draft order for conversation `{}` is no longer at revision {expected} or is frozen",
        conversation_id.0
    ))
}
