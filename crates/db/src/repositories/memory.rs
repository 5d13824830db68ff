use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use chatorder_core::domain::intent::{AgentFeedback, FeedbackSummary, OrderIntent, OrderIntentId};
use chatorder_core::domain::order::{ConversationId, DraftOrder, DraftOrderStatus};

use super::{
    revision_conflict, DraftOrderRepository, FeedbackWrite, OrderIntentRepository,
    RepositoryError,
};

#[derive(Default)]
pub struct InMemoryOrderIntentRepository {
    intents: RwLock<Vec<OrderIntent>>,
}

#[async_trait::async_trait]
impl OrderIntentRepository for InMemoryOrderIntentRepository {
    async fn append(&self, intent: OrderIntent) -> Result<(), RepositoryError> {
        let mut intents = self.intents.write().await;
        if intents.iter().any(|existing| existing.id == intent.id) {
            return Err(RepositoryError::Conflict(format!(
                "intent `{}` already exists",
                intent.id.0
            )));
        }
        intents.push(intent);
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderIntentId) -> Result<Option<OrderIntent>, RepositoryError> {
        let intents = self.intents.read().await;
        Ok(intents.iter().find(|intent| &intent.id == id).cloned())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<OrderIntent>, RepositoryError> {
        let intents = self.intents.read().await;
        Ok(intents
            .iter()
            .filter(|intent| &intent.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn record_feedback(
        &self,
        id: &OrderIntentId,
        feedback: AgentFeedback,
    ) -> Result<FeedbackWrite, RepositoryError> {
        let mut intents = self.intents.write().await;
        let Some(intent) = intents.iter_mut().find(|intent| &intent.id == id) else {
            return Ok(FeedbackWrite::NotFound);
        };
        if let Some(existing) = intent.agent_feedback {
            return Ok(FeedbackWrite::AlreadyRecorded(existing));
        }
        intent.agent_feedback = Some(feedback);
        Ok(FeedbackWrite::Recorded)
    }

    async fn feedback_summary(&self) -> Result<FeedbackSummary, RepositoryError> {
        let intents = self.intents.read().await;
        let count = |label: AgentFeedback| {
            intents.iter().filter(|intent| intent.agent_feedback == Some(label)).count() as u64
        };
        Ok(FeedbackSummary::from_counts(
            count(AgentFeedback::Correct),
            count(AgentFeedback::Incorrect),
        ))
    }
}

#[derive(Default)]
pub struct InMemoryDraftOrderRepository {
    drafts: RwLock<HashMap<String, DraftOrder>>,
}

#[async_trait::async_trait]
impl DraftOrderRepository for InMemoryDraftOrderRepository {
    async fn find(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<DraftOrder>, RepositoryError> {
        let drafts = self.drafts.read().await;
        Ok(drafts.get(&conversation_id.0).cloned())
    }

    async fn save(
        &self,
        mut draft: DraftOrder,
        expected_revision: u64,
    ) -> Result<DraftOrder, RepositoryError> {
        let mut drafts = self.drafts.write().await;
        let current = drafts.get(&draft.conversation_id.0);
        let matches = match current {
            None => expected_revision == 0,
            Some(stored) => stored.revision == expected_revision && !stored.is_frozen(),
        };
        if !matches {
            return Err(revision_conflict(&draft.conversation_id, expected_revision));
        }

        draft.revision = expected_revision + 1;
        draft.updated_at = Utc::now();
        drafts.insert(draft.conversation_id.0.clone(), draft.clone());
        Ok(draft)
    }

    async fn update_status(
        &self,
        conversation_id: &ConversationId,
        status: DraftOrderStatus,
    ) -> Result<Option<DraftOrder>, RepositoryError> {
        let mut drafts = self.drafts.write().await;
        let Some(draft) = drafts.get_mut(&conversation_id.0) else {
            return Ok(None);
        };
        draft.transition_to(status).map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        draft.revision += 1;
        draft.updated_at = Utc::now();
        Ok(Some(draft.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chatorder_core::domain::intent::{
        AgentFeedback, ExtractedOrderData, MessageId, OrderIntent,
    };
    use chatorder_core::domain::menu::TenantId;
    use chatorder_core::domain::order::{
        ConversationId, DraftOrder, DraftOrderItem, DraftOrderStatus,
    };

    use crate::repositories::{
        DraftOrderRepository, FeedbackWrite, InMemoryDraftOrderRepository,
        InMemoryOrderIntentRepository, OrderIntentRepository, RepositoryError,
    };

    #[tokio::test]
    async fn in_memory_intent_repo_keeps_first_label() {
        let repo = InMemoryOrderIntentRepository::default();
        let intent = OrderIntent::new(
            ConversationId("conv-1".to_string()),
            MessageId("m-1".to_string()),
            ExtractedOrderData::fallback(),
            false,
            true,
        );
        repo.append(intent.clone()).await.expect("append");

        assert_eq!(
            repo.record_feedback(&intent.id, AgentFeedback::Incorrect).await.expect("label"),
            FeedbackWrite::Recorded
        );
        assert_eq!(
            repo.record_feedback(&intent.id, AgentFeedback::Correct).await.expect("relabel"),
            FeedbackWrite::AlreadyRecorded(AgentFeedback::Incorrect)
        );

        let summary = repo.feedback_summary().await.expect("summary");
        assert_eq!(summary.incorrect, 1);
        assert_eq!(summary.accuracy, Some(0.0));
    }

    #[tokio::test]
    async fn in_memory_draft_repo_enforces_revision_and_freeze() {
        let repo = InMemoryDraftOrderRepository::default();
        let conversation = ConversationId("conv-1".to_string());
        let mut draft = DraftOrder::empty(conversation.clone(), TenantId("ocakbasi".to_string()));
        draft.items.push(DraftOrderItem::new("kebap", 1));

        let saved = repo.save(draft.clone(), 0).await.expect("create");
        assert_eq!(saved.revision, 1);
        assert!(matches!(repo.save(draft.clone(), 0).await, Err(RepositoryError::Conflict(_))));

        repo.update_status(&conversation, DraftOrderStatus::Cancelled)
            .await
            .expect("cancel")
            .expect("exists");
        let frozen = repo.find(&conversation).await.expect("find").expect("exists");
        assert!(frozen.is_frozen());
        assert!(matches!(
            repo.save(frozen.clone(), frozen.revision).await,
            Err(RepositoryError::Conflict(_))
        ));
    }
}
