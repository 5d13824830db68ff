use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use chatorder_core::domain::menu::TenantId;
use chatorder_core::domain::order::{
    ConversationId, DraftOrder, DraftOrderItem, DraftOrderStatus,
};

use super::{revision_conflict, DraftOrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDraftOrderRepository {
    pool: DbPool,
}

impl SqlDraftOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_draft(row: &sqlx::sqlite::SqliteRow) -> Result<DraftOrder, RepositoryError> {
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tenant_id: String =
        row.try_get("tenant_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let items_json: String =
        row.try_get("items_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let revision: i64 =
        row.try_get("revision").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = DraftOrderStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown draft status `{status}`")))?;
    let items = serde_json::from_str::<Vec<DraftOrderItem>>(&items_json)
        .map_err(|e| RepositoryError::Decode(format!("items_json for `{conversation_id}`: {e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(DraftOrder {
        conversation_id: ConversationId(conversation_id),
        tenant_id: TenantId(tenant_id),
        status,
        items,
        revision: revision as u64,
        updated_at,
    })
}

#[async_trait::async_trait]
impl DraftOrderRepository for SqlDraftOrderRepository {
    async fn find(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<DraftOrder>, RepositoryError> {
        let row = sqlx::query(
            "SELECT conversation_id, tenant_id, status, items_json, revision, updated_at
             FROM draft_order
             WHERE conversation_id = ?",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_draft).transpose()
    }

    async fn save(
        &self,
        mut draft: DraftOrder,
        expected_revision: u64,
    ) -> Result<DraftOrder, RepositoryError> {
        let items_json =
            serde_json::to_string(&draft.items).map_err(|e| RepositoryError::Decode(e.to_string()))?;
        draft.revision = expected_revision + 1;
        draft.updated_at = Utc::now();
        let updated_at = draft.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true);

        let result = if expected_revision == 0 {
            sqlx::query(
                "INSERT INTO draft_order
                    (conversation_id, tenant_id, status, items_json, revision, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(conversation_id) DO NOTHING",
            )
            .bind(&draft.conversation_id.0)
            .bind(&draft.tenant_id.0)
            .bind(draft.status.as_str())
            .bind(&items_json)
            .bind(draft.revision as i64)
            .bind(&updated_at)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "UPDATE draft_order
                 SET status = ?, items_json = ?, revision = ?, updated_at = ?
                 WHERE conversation_id = ? AND revision = ? AND status = 'open'",
            )
            .bind(draft.status.as_str())
            .bind(&items_json)
            .bind(draft.revision as i64)
            .bind(&updated_at)
            .bind(&draft.conversation_id.0)
            .bind(expected_revision as i64)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(revision_conflict(&draft.conversation_id, expected_revision));
        }
        Ok(draft)
    }

    async fn update_status(
        &self,
        conversation_id: &ConversationId,
        status: DraftOrderStatus,
    ) -> Result<Option<DraftOrder>, RepositoryError> {
        let Some(mut draft) = self.find(conversation_id).await? else {
            return Ok(None);
        };
        let expected_revision = draft.revision;
        draft.transition_to(status).map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        self.save(draft, expected_revision).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use chatorder_core::domain::menu::TenantId;
    use chatorder_core::domain::order::{
        ConversationId, DraftOrder, DraftOrderItem, DraftOrderStatus,
    };

    use super::SqlDraftOrderRepository;
    use crate::repositories::{DraftOrderRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn conversation() -> ConversationId {
        ConversationId("conv-1".to_string())
    }

    fn draft_with(items: Vec<DraftOrderItem>) -> DraftOrder {
        let mut draft = DraftOrder::empty(conversation(), TenantId("ocakbasi".to_string()));
        draft.items = items;
        draft
    }

    #[tokio::test]
    async fn sql_draft_repo_creates_and_advances_revision() {
        let repo = SqlDraftOrderRepository::new(setup_pool().await);
        assert!(repo.find(&conversation()).await.expect("find").is_none());

        let created =
            repo.save(draft_with(vec![DraftOrderItem::new("kebap", 1)]), 0).await.expect("create");
        assert_eq!(created.revision, 1);

        let mut next = created.clone();
        next.items.push(DraftOrderItem::new("ayran", 1));
        let saved = repo.save(next, created.revision).await.expect("update");
        assert_eq!(saved.revision, 2);

        let stored = repo.find(&conversation()).await.expect("find").expect("exists");
        assert_eq!(stored.items, saved.items);
        assert_eq!(stored.revision, 2);
    }

    #[tokio::test]
    async fn stale_revision_is_a_conflict() {
        let repo = SqlDraftOrderRepository::new(setup_pool().await);
        let created = repo.save(draft_with(Vec::new()), 0).await.expect("create");
        repo.save(draft_with(vec![DraftOrderItem::new("kebap", 1)]), created.revision)
            .await
            .expect("first writer");

        let error = repo
            .save(draft_with(vec![DraftOrderItem::new("ayran", 1)]), created.revision)
            .await
            .expect_err("second writer on stale revision");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let duplicate = repo.save(draft_with(Vec::new()), 0).await.expect_err("already exists");
        assert!(matches!(duplicate, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn frozen_draft_rejects_further_writes() {
        let repo = SqlDraftOrderRepository::new(setup_pool().await);
        repo.save(draft_with(vec![DraftOrderItem::new("kebap", 1)]), 0).await.expect("create");

        let confirmed = repo
            .update_status(&conversation(), DraftOrderStatus::Confirmed)
            .await
            .expect("confirm")
            .expect("draft exists");
        assert_eq!(confirmed.status, DraftOrderStatus::Confirmed);

        let error = repo
            .save(draft_with(Vec::new()), confirmed.revision)
            .await
            .expect_err("frozen draft");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let again = repo
            .update_status(&conversation(), DraftOrderStatus::Cancelled)
            .await
            .expect_err("confirmed is terminal");
        assert!(matches!(again, RepositoryError::Conflict(_)));

        let missing = repo
            .update_status(&ConversationId("conv-none".to_string()), DraftOrderStatus::Cancelled)
            .await
            .expect("no draft");
        assert!(missing.is_none());
    }
}
