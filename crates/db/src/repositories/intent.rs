use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use chatorder_core::domain::intent::{
    AgentFeedback, ExtractedOrderData, FeedbackSummary, MessageId, OrderIntent, OrderIntentId,
};
use chatorder_core::domain::order::ConversationId;

use super::{FeedbackWrite, OrderIntentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderIntentRepository {
    pool: DbPool,
}

impl SqlOrderIntentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, conversation_id, last_user_message_id, extracted_json,
        confidence, needs_clarification, clarification_question, agent_feedback,
        flagged_for_audit, created_at
     FROM order_intent";

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_intent(row: &sqlx::sqlite::SqliteRow) -> Result<OrderIntent, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_user_message_id: String =
        row.try_get("last_user_message_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let extracted_json: String =
        row.try_get("extracted_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let confidence: f64 =
        row.try_get("confidence").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let needs_clarification: bool =
        row.try_get("needs_clarification").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let clarification_question: Option<String> = row
        .try_get("clarification_question")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agent_feedback: Option<String> =
        row.try_get("agent_feedback").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let flagged_for_audit: bool =
        row.try_get("flagged_for_audit").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let extracted_json = serde_json::from_str::<ExtractedOrderData>(&extracted_json)
        .map_err(|e| RepositoryError::Decode(format!("extracted_json for `{id}`: {e}")))?;
    let agent_feedback = agent_feedback
        .map(|value| {
            AgentFeedback::parse(&value).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown agent_feedback `{value}` for `{id}`"))
            })
        })
        .transpose()?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at for `{id}`: {e}")))?;

    Ok(OrderIntent {
        id: OrderIntentId(id),
        conversation_id: ConversationId(conversation_id),
        last_user_message_id: MessageId(last_user_message_id),
        extracted_json,
        confidence,
        needs_clarification,
        clarification_question,
        agent_feedback,
        flagged_for_audit,
        created_at,
    })
}

#[async_trait::async_trait]
impl OrderIntentRepository for SqlOrderIntentRepository {
    async fn append(&self, intent: OrderIntent) -> Result<(), RepositoryError> {
        let extracted_json = serde_json::to_string(&intent.extracted_json)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO order_intent
                (id, conversation_id, last_user_message_id, extracted_json, confidence,
                 needs_clarification, clarification_question, agent_feedback,
                 flagged_for_audit, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&intent.id.0)
        .bind(&intent.conversation_id.0)
        .bind(&intent.last_user_message_id.0)
        .bind(extracted_json)
        .bind(intent.confidence)
        .bind(intent.needs_clarification)
        .bind(&intent.clarification_question)
        .bind(intent.agent_feedback.map(|feedback| feedback.as_str()))
        .bind(intent.flagged_for_audit)
        .bind(timestamp(&intent.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderIntentId) -> Result<Option<OrderIntent>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_intent).transpose()
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<OrderIntent>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_intent).collect::<Result<Vec<_>, _>>()
    }

    async fn record_feedback(
        &self,
        id: &OrderIntentId,
        feedback: AgentFeedback,
    ) -> Result<FeedbackWrite, RepositoryError> {
        let result = sqlx::query(
            "UPDATE order_intent
             SET agent_feedback = ?, feedback_recorded_at = ?
             WHERE id = ? AND agent_feedback IS NULL",
        )
        .bind(feedback.as_str())
        .bind(timestamp(&Utc::now()))
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(FeedbackWrite::Recorded);
        }

        let existing = sqlx::query("SELECT agent_feedback FROM order_intent WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = existing else {
            return Ok(FeedbackWrite::NotFound);
        };
        let stored: Option<String> =
            row.try_get("agent_feedback").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let stored = stored.as_deref().and_then(AgentFeedback::parse).ok_or_else(|| {
            RepositoryError::Decode(format!("intent `{}` rejected feedback but has none", id.0))
        })?;
        Ok(FeedbackWrite::AlreadyRecorded(stored))
    }

    async fn feedback_summary(&self) -> Result<FeedbackSummary, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                 COALESCE(SUM(CASE WHEN agent_feedback = 'correct' THEN 1 ELSE 0 END), 0)
                     AS correct_count,
                 COALESCE(SUM(CASE WHEN agent_feedback = 'incorrect' THEN 1 ELSE 0 END), 0)
                     AS incorrect_count
             FROM order_intent",
        )
        .fetch_one(&self.pool)
        .await?;

        let correct: i64 =
            row.try_get("correct_count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let incorrect: i64 =
            row.try_get("incorrect_count").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(FeedbackSummary::from_counts(correct as u64, incorrect as u64))
    }
}

#[cfg(test)]
mod tests {
    use chatorder_core::domain::intent::{
        AgentFeedback, ExtractedOrderData, ExtractedOrderItem, ItemAction, MessageId, OrderIntent,
        OrderIntentId,
    };
    use chatorder_core::domain::menu::MenuItemId;
    use chatorder_core::domain::order::ConversationId;

    use super::SqlOrderIntentRepository;
    use crate::repositories::{FeedbackWrite, OrderIntentRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn accepted_intent(conversation: &str, message: &str) -> OrderIntent {
        let extracted = ExtractedOrderData {
            items: vec![ExtractedOrderItem {
                menu_item_id: Some(MenuItemId("kebap".to_string())),
                unresolved: None,
                qty: 1,
                option_selections: Vec::new(),
                extras: Vec::new(),
                notes: None,
                action: ItemAction::Add,
                item_confidence: 0.9,
            }],
            missing_fields: Vec::new(),
            clarification_question: None,
            confidence: 0.9,
            order_notes: None,
        };
        OrderIntent::new(
            ConversationId(conversation.to_string()),
            MessageId(message.to_string()),
            extracted,
            true,
            false,
        )
    }

    #[tokio::test]
    async fn sql_intent_repo_round_trip_and_conversation_order() {
        let repo = SqlOrderIntentRepository::new(setup_pool().await);
        let first = accepted_intent("conv-1", "m-1");
        let second = OrderIntent::new(
            ConversationId("conv-1".to_string()),
            MessageId("m-2".to_string()),
            ExtractedOrderData::fallback(),
            false,
            true,
        );
        let other = accepted_intent("conv-2", "m-9");

        repo.append(first.clone()).await.expect("append first");
        repo.append(second.clone()).await.expect("append second");
        repo.append(other).await.expect("append other");

        let found = repo.find_by_id(&first.id).await.expect("find").expect("intent exists");
        assert_eq!(found.extracted_json, first.extracted_json);
        assert!(!found.needs_clarification);

        let listed = repo
            .list_for_conversation(&ConversationId("conv-1".to_string()))
            .await
            .expect("list");
        assert_eq!(
            listed.iter().map(|intent| intent.id.clone()).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
        assert!(listed[1].flagged_for_audit);
        assert!(listed[1].needs_clarification);
        assert!(listed[1].clarification_question.is_some());
    }

    #[tokio::test]
    async fn feedback_is_written_once() {
        let repo = SqlOrderIntentRepository::new(setup_pool().await);
        let intent = accepted_intent("conv-1", "m-1");
        repo.append(intent.clone()).await.expect("append");

        let first = repo.record_feedback(&intent.id, AgentFeedback::Correct).await.expect("first");
        assert_eq!(first, FeedbackWrite::Recorded);

        let second =
            repo.record_feedback(&intent.id, AgentFeedback::Incorrect).await.expect("second");
        assert_eq!(second, FeedbackWrite::AlreadyRecorded(AgentFeedback::Correct));

        let stored = repo.find_by_id(&intent.id).await.expect("find").expect("exists");
        assert_eq!(stored.agent_feedback, Some(AgentFeedback::Correct));

        let missing = repo
            .record_feedback(&OrderIntentId("OI-missing".to_string()), AgentFeedback::Correct)
            .await
            .expect("missing");
        assert_eq!(missing, FeedbackWrite::NotFound);
    }

    #[tokio::test]
    async fn stored_intents_reject_content_updates() {
        let pool = setup_pool().await;
        let repo = SqlOrderIntentRepository::new(pool.clone());
        let intent = accepted_intent("conv-1", "m-1");
        repo.append(intent.clone()).await.expect("append");

        let result = sqlx::query("UPDATE order_intent SET confidence = 0.1 WHERE id = ?")
            .bind(&intent.id.0)
            .execute(&pool)
            .await;
        assert!(result.is_err(), "append-only trigger should abort the update");
    }

    #[tokio::test]
    async fn feedback_summary_counts_labels() {
        let repo = SqlOrderIntentRepository::new(setup_pool().await);
        let labels = [
            Some(AgentFeedback::Correct),
            Some(AgentFeedback::Correct),
            Some(AgentFeedback::Incorrect),
            None,
        ];
        for (index, label) in labels.into_iter().enumerate() {
            let intent = accepted_intent("conv-1", &format!("m-{index}"));
            repo.append(intent.clone()).await.expect("append");
            if let Some(label) = label {
                repo.record_feedback(&intent.id, label).await.expect("label");
            }
        }

        let summary = repo.feedback_summary().await.expect("summary");
        assert_eq!(summary.labelled, 3);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.incorrect, 1);
    }
}
