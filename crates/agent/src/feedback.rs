use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use chatorder_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use chatorder_core::domain::intent::{AgentFeedback, FeedbackSummary, OrderIntentId};
use chatorder_core::errors::ApplicationError;
use chatorder_db::repositories::{FeedbackWrite, OrderIntentRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("order intent `{0}` does not exist")]
    NotFound(OrderIntentId),
    #[error("order intent `{intent_id}` is already labelled `{existing}`")]
    AlreadyRecorded { intent_id: OrderIntentId, existing: AgentFeedback },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<FeedbackError> for ApplicationError {
    fn from(error: FeedbackError) -> Self {
        match error {
            FeedbackError::NotFound(id) => {
                ApplicationError::NotFound(format!("order intent `{id}`"))
            }
            FeedbackError::AlreadyRecorded { intent_id, .. } => {
                ApplicationError::AlreadyRecorded(intent_id.0)
            }
            FeedbackError::Repository(error) => ApplicationError::Persistence(error.to_string()),
        }
    }
}

/// Attaches one human correctness label to a stored order intent.
pub struct FeedbackRecorder {
    intents: Arc<dyn OrderIntentRepository>,
    audit: Arc<dyn AuditSink>,
}

impl FeedbackRecorder {
    pub fn new(intents: Arc<dyn OrderIntentRepository>, audit: Arc<dyn AuditSink>) -> Self {
        Self { intents, audit }
    }

    pub async fn record_feedback(
        &self,
        intent_id: &OrderIntentId,
        feedback: AgentFeedback,
    ) -> Result<(), FeedbackError> {
        let audit =
            AuditContext::new(None, None, intent_id.0.clone(), "feedback-recorder".to_string());
        let write = self.intents.record_feedback(intent_id, feedback).await;

        let (outcome, result) = match write {
            Ok(FeedbackWrite::Recorded) => {
                info!(
                    event_name = "feedback.recorded",
                    intent_id = %intent_id.0,
                    feedback = feedback.as_str(),
                    "agent feedback recorded"
                );
                (AuditOutcome::Success, Ok(()))
            }
            Ok(FeedbackWrite::AlreadyRecorded(existing)) => {
                warn!(
                    event_name = "feedback.already_recorded",
                    intent_id = %intent_id.0,
                    existing = existing.as_str(),
                    submitted = feedback.as_str(),
                    "feedback rejected; intent already labelled"
                );
                (
                    AuditOutcome::Rejected,
                    Err(FeedbackError::AlreadyRecorded { intent_id: intent_id.clone(), existing }),
                )
            }
            Ok(FeedbackWrite::NotFound) => {
                (AuditOutcome::Rejected, Err(FeedbackError::NotFound(intent_id.clone())))
            }
            Err(error) => (AuditOutcome::Failed, Err(FeedbackError::Repository(error))),
        };

        let mut event =
            AuditEvent::from_context(&audit, "feedback.submitted", AuditCategory::Feedback, outcome)
                .with_metadata("intent_id", intent_id.0.clone())
                .with_metadata("feedback", feedback.as_str());
        if let Err(error) = &result {
            event = event.with_metadata("error", error.to_string());
        }
        self.audit.emit(event);
        result
    }

    pub async fn summary(&self) -> Result<FeedbackSummary, FeedbackError> {
        Ok(self.intents.feedback_summary().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chatorder_core::audit::{AuditOutcome, InMemoryAuditSink};
    use chatorder_core::domain::intent::{
        AgentFeedback, ExtractedOrderData, MessageId, OrderIntent, OrderIntentId,
    };
    use chatorder_core::domain::order::ConversationId;
    use chatorder_core::errors::ApplicationError;
    use chatorder_db::repositories::{InMemoryOrderIntentRepository, OrderIntentRepository};

    use super::{FeedbackError, FeedbackRecorder};

    async fn recorder_with_intent() -> (FeedbackRecorder, Arc<InMemoryAuditSink>, OrderIntentId) {
        let intents = Arc::new(InMemoryOrderIntentRepository::default());
        let intent = OrderIntent::new(
            ConversationId("conv-1".to_string()),
            MessageId("m-1".to_string()),
            ExtractedOrderData::fallback(),
            false,
            true,
        );
        let id = intent.id.clone();
        intents.append(intent).await.expect("append intent");
        let audit = Arc::new(InMemoryAuditSink::default());
        (FeedbackRecorder::new(intents, audit.clone()), audit, id)
    }

    #[tokio::test]
    async fn second_submission_is_rejected_and_keeps_the_first_label() {
        let (recorder, audit, id) = recorder_with_intent().await;

        recorder.record_feedback(&id, AgentFeedback::Correct).await.expect("first label");
        let error = recorder
            .record_feedback(&id, AgentFeedback::Incorrect)
            .await
            .expect_err("second label");
        assert!(matches!(
            error,
            FeedbackError::AlreadyRecorded { existing: AgentFeedback::Correct, .. }
        ));
        assert!(matches!(ApplicationError::from(error), ApplicationError::AlreadyRecorded(_)));

        let summary = recorder.summary().await.expect("summary");
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.incorrect, 0);

        let outcomes = audit
            .events_of_type("feedback.submitted")
            .into_iter()
            .map(|event| event.outcome)
            .collect::<Vec<_>>();
        assert_eq!(outcomes, vec![AuditOutcome::Success, AuditOutcome::Rejected]);
    }

    #[tokio::test]
    async fn unknown_intent_is_not_found() {
        let (recorder, _audit, _id) = recorder_with_intent().await;
        let missing = OrderIntentId("OI-missing".to_string());

        let error = recorder
            .record_feedback(&missing, AgentFeedback::Correct)
            .await
            .expect_err("missing intent");
        assert!(matches!(&error, FeedbackError::NotFound(id) if id == &missing));
        assert!(matches!(ApplicationError::from(error), ApplicationError::NotFound(_)));
    }
}
