//! Outbound seams to the services around order intake.

use async_trait::async_trait;
use tracing::info;

use chatorder_core::domain::order::{ConversationId, DraftOrder};

/// Receives every accepted draft order revision.
#[async_trait]
pub trait OrderManagement: Send + Sync {
    async fn apply_draft(&self, draft: &DraftOrder) -> anyhow::Result<()>;
}

/// Delivers clarification questions back to the customer.
#[async_trait]
pub trait CustomerMessenger: Send + Sync {
    async fn send_clarification(
        &self,
        conversation_id: &ConversationId,
        question: &str,
    ) -> anyhow::Result<()>;
}

/// Stand-in used until the real services are wired; records the hand-off in the log.
#[derive(Clone, Debug, Default)]
pub struct LoggingOrderManagement;

#[async_trait]
impl OrderManagement for LoggingOrderManagement {
    async fn apply_draft(&self, draft: &DraftOrder) -> anyhow::Result<()> {
        info!(
            event_name = "collaborator.order_management.apply_draft",
            conversation_id = %draft.conversation_id.0,
            revision = draft.revision,
            lines = draft.items.len(),
            "draft order handed to order management"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoggingCustomerMessenger;

#[async_trait]
impl CustomerMessenger for LoggingCustomerMessenger {
    async fn send_clarification(
        &self,
        conversation_id: &ConversationId,
        question: &str,
    ) -> anyhow::Result<()> {
        info!(
            event_name = "collaborator.messenger.send_clarification",
            conversation_id = %conversation_id.0,
            question,
            "clarification handed to messenger"
        );
        Ok(())
    }
}
