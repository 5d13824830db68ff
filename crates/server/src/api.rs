//! JSON routes for the conversation service and the operator UI.
//!
//! - `PUT  /v1/menus/{tenant_id}`                           publish a canonical menu export
//! - `POST /v1/conversations/{conversation_id}/messages`    process one customer message
//! - `POST /v1/conversations/{conversation_id}/close`       end the conversation
//! - `PUT  /v1/conversations/{conversation_id}/draft/status` confirm or cancel the draft
//! - `GET  /v1/conversations/{conversation_id}/intents`     intent history, oldest first
//! - `POST /v1/intents/{intent_id}/feedback`                 operator label, written once
//! - `GET  /v1/intents/feedback/summary`                     labelled accuracy

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chatorder_agent::{FeedbackRecorder, Orchestrator, ProcessOutcome};
use chatorder_core::domain::conversation::{ConversationTurn, InboundMessage};
use chatorder_core::domain::intent::{
    AgentFeedback, FeedbackSummary, MessageId, OrderIntent, OrderIntentId,
};
use chatorder_core::domain::menu::{CanonicalMenuExport, TenantId};
use chatorder_core::domain::order::{ConversationId, DraftOrder, DraftOrderStatus};
use chatorder_core::errors::{ApplicationError, DomainError};
use chatorder_core::flows::ConversationPhase;
use chatorder_db::{DraftOrderRepository, OrderIntentRepository, RepositoryError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub feedback: Arc<FeedbackRecorder>,
    pub drafts: Arc<dyn DraftOrderRepository>,
    pub intents: Arc<dyn OrderIntentRepository>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub tenant_id: String,
    pub message_id: String,
    pub text: String,
    #[serde(default)]
    pub prior_turns: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
pub struct DraftStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: AgentFeedback,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuPublished {
    pub tenant_id: String,
    pub version: u64,
    pub items: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationClosed {
    pub conversation_id: String,
    pub phase: ConversationPhase,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAccepted {
    pub intent_id: String,
    pub feedback: AgentFeedback,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/menus/{tenant_id}", put(publish_menu))
        .route("/v1/conversations/{conversation_id}/messages", post(process_message))
        .route("/v1/conversations/{conversation_id}/close", post(close_conversation))
        .route("/v1/conversations/{conversation_id}/draft/status", put(update_draft_status))
        .route("/v1/conversations/{conversation_id}/intents", get(list_intents))
        .route("/v1/intents/feedback/summary", get(feedback_summary))
        .route("/v1/intents/{intent_id}/feedback", post(submit_feedback))
        .with_state(state)
}

fn request_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

fn api_error(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    let status = StatusCode::from_u16(interface.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!(
            event_name = "api.request.failed",
            correlation_id = %interface.correlation_id(),
            status = status.as_u16(),
            error = %interface,
            "request failed"
        );
    }
    (
        status,
        Json(ApiError {
            error: interface.user_message().to_string(),
            detail: interface.to_string(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn publish_menu(
    Path(tenant_id): Path<String>,
    State(state): State<ApiState>,
    Json(export): Json<CanonicalMenuExport>,
) -> ApiResult<MenuPublished> {
    let correlation_id = request_correlation_id();
    if export.tenant_id.0 != tenant_id {
        return Err(api_error(
            ApplicationError::InvalidInput(format!(
                "menu export is for tenant `{}`, not `{tenant_id}`",
                export.tenant_id.0
            )),
            &correlation_id,
        ));
    }

    let index = state
        .orchestrator
        .registry()
        .publish(export)
        .map_err(|error| api_error(ApplicationError::InvalidInput(error.to_string()), &correlation_id))?;

    Ok(Json(MenuPublished {
        tenant_id,
        version: index.version(),
        items: index.items().count(),
    }))
}

async fn process_message(
    Path(conversation_id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<MessageRequest>,
) -> ApiResult<ProcessOutcome> {
    let correlation_id = body.message_id.clone();
    if body.tenant_id.trim().is_empty() || body.message_id.trim().is_empty() {
        return Err(api_error(
            ApplicationError::InvalidInput("tenantId and messageId are required".to_string()),
            &correlation_id,
        ));
    }

    let message = InboundMessage {
        tenant_id: TenantId(body.tenant_id),
        conversation_id: ConversationId(conversation_id),
        message_id: MessageId(body.message_id),
        text: body.text,
        prior_turns: body.prior_turns,
    };

    let outcome = state
        .orchestrator
        .process_message(message)
        .await
        .map_err(|error| api_error(error, &correlation_id))?;
    Ok(Json(outcome))
}

async fn close_conversation(
    Path(conversation_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<ConversationClosed> {
    let conversation = ConversationId(conversation_id);
    state.orchestrator.close_conversation(&conversation);
    Ok(Json(ConversationClosed {
        phase: state.orchestrator.phase(&conversation),
        conversation_id: conversation.0,
    }))
}

async fn update_draft_status(
    Path(conversation_id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<DraftStatusRequest>,
) -> ApiResult<DraftOrder> {
    let correlation_id = request_correlation_id();
    let conversation = ConversationId(conversation_id);

    let target = match DraftOrderStatus::parse(body.status.trim()) {
        Some(status) if status.is_frozen() => status,
        _ => {
            return Err(api_error(
                ApplicationError::InvalidInput(format!(
                    "draft status must be `confirmed` or `cancelled`, got `{}`",
                    body.status
                )),
                &correlation_id,
            ))
        }
    };

    let current = state
        .drafts
        .find(&conversation)
        .await
        .map_err(|error| api_error(persistence(error), &correlation_id))?;
    match current {
        None => {
            return Err(api_error(
                ApplicationError::NotFound(format!(
                    "draft order for conversation `{}`",
                    conversation.0
                )),
                &correlation_id,
            ))
        }
        Some(draft) if draft.is_frozen() => {
            return Err(api_error(
                DomainError::DraftFrozen {
                    conversation_id: conversation.0.clone(),
                    status: draft.status,
                }
                .into(),
                &correlation_id,
            ))
        }
        Some(_) => {}
    }

    let updated = match state.drafts.update_status(&conversation, target).await {
        Ok(Some(draft)) => draft,
        Ok(None) => {
            return Err(api_error(
                ApplicationError::NotFound(format!(
                    "draft order for conversation `{}`",
                    conversation.0
                )),
                &correlation_id,
            ))
        }
        Err(RepositoryError::Conflict(_)) => {
            return Err(api_error(
                ApplicationError::ReconciliationConflict(conversation.0.clone()),
                &correlation_id,
            ))
        }
        Err(error) => return Err(api_error(persistence(error), &correlation_id)),
    };

    info!(
        event_name = "draft.status.updated",
        correlation_id = %correlation_id,
        conversation_id = %conversation.0,
        status = updated.status.as_str(),
        revision = updated.revision,
        "draft order frozen"
    );
    Ok(Json(updated))
}

async fn list_intents(
    Path(conversation_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Vec<OrderIntent>> {
    let correlation_id = request_correlation_id();
    let intents = state
        .intents
        .list_for_conversation(&ConversationId(conversation_id))
        .await
        .map_err(|error| api_error(persistence(error), &correlation_id))?;
    Ok(Json(intents))
}

async fn submit_feedback(
    Path(intent_id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<FeedbackRequest>,
) -> ApiResult<FeedbackAccepted> {
    let correlation_id = request_correlation_id();
    let id = OrderIntentId(intent_id);
    state
        .feedback
        .record_feedback(&id, body.feedback)
        .await
        .map_err(|error| api_error(error.into(), &correlation_id))?;
    Ok(Json(FeedbackAccepted { intent_id: id.0, feedback: body.feedback }))
}

async fn feedback_summary(State(state): State<ApiState>) -> ApiResult<FeedbackSummary> {
    let correlation_id = request_correlation_id();
    let summary =
        state.feedback.summary().await.map_err(|error| api_error(error.into(), &correlation_id))?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        Json,
    };
    use chatorder_agent::llm::{LlmClient, LlmError, LlmRequest};
    use chatorder_agent::{
        ExtractionInvoker, ExtractionSettings, FeedbackRecorder, LoggingCustomerMessenger,
        LoggingOrderManagement, Orchestrator, OrchestratorParts, OutcomePhase,
    };
    use chatorder_core::audit::InMemoryAuditSink;
    use chatorder_core::domain::intent::AgentFeedback;
    use chatorder_core::domain::menu::CanonicalMenuExport;
    use chatorder_core::domain::order::DraftOrderStatus;
    use chatorder_core::menu::MenuRegistry;
    use chatorder_core::reconcile::Reconciler;
    use chatorder_db::{InMemoryDraftOrderRepository, InMemoryOrderIntentRepository};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    struct ScriptedModel {
        replies: Mutex<VecDeque<String>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedModel {
        async fn complete(&self, _request: &LlmRequest) -> Result<String, LlmError> {
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))
        }
    }

    fn state(replies: Vec<String>) -> State<ApiState> {
        let model = Arc::new(ScriptedModel { replies: Mutex::new(replies.into()) });
        let settings =
            ExtractionSettings { max_turns: 6, timeout: Duration::from_secs(2), max_retries: 1 };
        let extractor = Arc::new(ExtractionInvoker::new(model, settings).expect("template"));
        let drafts: Arc<dyn DraftOrderRepository> =
            Arc::new(InMemoryDraftOrderRepository::default());
        let intents: Arc<dyn OrderIntentRepository> =
            Arc::new(InMemoryOrderIntentRepository::default());
        let audit = Arc::new(InMemoryAuditSink::default());

        let orchestrator = Arc::new(Orchestrator::new(OrchestratorParts {
            registry: Arc::new(MenuRegistry::new()),
            extractor,
            reconciler: Reconciler::default(),
            drafts: drafts.clone(),
            intents: intents.clone(),
            order_management: Arc::new(LoggingOrderManagement),
            messenger: Arc::new(LoggingCustomerMessenger),
            audit: audit.clone(),
            top_k: 5,
        }));
        let feedback = Arc::new(FeedbackRecorder::new(intents.clone(), audit));

        State(ApiState { orchestrator, feedback, drafts, intents })
    }

    fn menu(version: u64) -> CanonicalMenuExport {
        serde_json::from_value(json!({
            "tenantId": "ocakbasi",
            "version": version,
            "categories": [
                {
                    "name": "Kebaplar",
                    "items": [{ "id": "kebap", "name": "Adana Kebap", "basePrice": "320.00" }]
                },
                {
                    "name": "İçecekler",
                    "items": [{ "id": "ayran", "name": "Ayran", "basePrice": "40.00" }]
                }
            ],
            "synonyms": [
                { "phrase": "adana", "itemId": "kebap", "weight": 0.9 },
                { "phrase": "ayran", "itemId": "ayran", "weight": 1.0 }
            ]
        }))
        .expect("menu export")
    }

    fn adana_and_ayran() -> String {
        json!({
            "items": [
                { "menuItemId": "kebap", "qty": 1, "action": "add", "itemConfidence": 0.9 },
                { "menuItemId": "ayran", "qty": 1, "action": "add", "itemConfidence": 0.9 }
            ],
            "missingFields": [],
            "clarificationQuestion": null,
            "confidence": 0.9
        })
        .to_string()
    }

    fn message(message_id: &str, text: &str) -> Json<MessageRequest> {
        Json(MessageRequest {
            tenant_id: "ocakbasi".to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
            prior_turns: Vec::new(),
        })
    }

    async fn publish(state: &State<ApiState>) {
        publish_menu(Path("ocakbasi".to_string()), state.clone(), Json(menu(1)))
            .await
            .expect("menu published");
    }

    #[tokio::test]
    async fn message_builds_draft_and_feedback_is_written_once() {
        let state = state(vec![adana_and_ayran()]);
        publish(&state).await;

        let Json(outcome) = process_message(
            Path("conv-1".to_string()),
            state.clone(),
            message("m-1", "bir adana bir ayran"),
        )
        .await
        .expect("processed");
        assert_eq!(outcome.phase, OutcomePhase::Accepted);
        assert_eq!(outcome.total, Some(Decimal::new(36_000, 2)));

        let Json(intents) = list_intents(Path("conv-1".to_string()), state.clone())
            .await
            .expect("intents listed");
        assert_eq!(intents.len(), 1);
        let intent_id = intents[0].id.0.clone();

        submit_feedback(
            Path(intent_id.clone()),
            state.clone(),
            Json(FeedbackRequest { feedback: AgentFeedback::Correct }),
        )
        .await
        .expect("first label accepted");

        let (status, Json(body)) = submit_feedback(
            Path(intent_id),
            state.clone(),
            Json(FeedbackRequest { feedback: AgentFeedback::Incorrect }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.detail.contains("already recorded"));

        let Json(summary) = feedback_summary(state).await.expect("summary");
        assert_eq!(summary.labelled, 1);
        assert_eq!(summary.correct, 1);
    }

    #[tokio::test]
    async fn feedback_for_unknown_intent_is_not_found() {
        let state = state(Vec::new());

        let (status, _) = submit_feedback(
            Path("OI-missing".to_string()),
            state,
            Json(FeedbackRequest { feedback: AgentFeedback::Correct }),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn menu_publish_rejects_wrong_tenant_and_stale_version() {
        let state = state(Vec::new());

        let (status, _) =
            publish_menu(Path("other-tenant".to_string()), state.clone(), Json(menu(1)))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let Json(published) =
            publish_menu(Path("ocakbasi".to_string()), state.clone(), Json(menu(2)))
                .await
                .expect("published");
        assert_eq!(published.version, 2);
        assert_eq!(published.items, 2);

        let (status, Json(body)) =
            publish_menu(Path("ocakbasi".to_string()), state, Json(menu(2))).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_a_bad_request() {
        let state = state(Vec::new());
        publish(&state).await;

        let (status, Json(body)) =
            process_message(Path("conv-1".to_string()), state, message("m-1", "   "))
                .await
                .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.correlation_id, "m-1");
    }

    #[tokio::test]
    async fn draft_can_be_frozen_once() {
        let state = state(vec![adana_and_ayran()]);
        publish(&state).await;

        let (status, _) = update_draft_status(
            Path("conv-1".to_string()),
            state.clone(),
            Json(DraftStatusRequest { status: "confirmed".to_string() }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        process_message(Path("conv-1".to_string()), state.clone(), message("m-1", "adana ayran"))
            .await
            .expect("processed");

        let (status, _) = update_draft_status(
            Path("conv-1".to_string()),
            state.clone(),
            Json(DraftStatusRequest { status: "open".to_string() }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let Json(draft) = update_draft_status(
            Path("conv-1".to_string()),
            state.clone(),
            Json(DraftStatusRequest { status: "confirmed".to_string() }),
        )
        .await
        .expect("confirmed");
        assert_eq!(draft.status, DraftOrderStatus::Confirmed);

        let (status, _) = update_draft_status(
            Path("conv-1".to_string()),
            state,
            Json(DraftStatusRequest { status: "cancelled".to_string() }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn closed_conversation_rejects_further_messages() {
        let state = state(Vec::new());
        publish(&state).await;

        let Json(closed) = close_conversation(Path("conv-9".to_string()), state.clone())
            .await
            .expect("closed");
        assert_eq!(closed.phase, ConversationPhase::Closed);

        let (status, _) =
            process_message(Path("conv-9".to_string()), state, message("m-1", "bir ayran"))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
