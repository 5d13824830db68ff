use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::menu::MenuItemId;
use crate::domain::order::{ConversationId, Extra, OptionSelection};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderIntentId(pub String);

impl OrderIntentId {
    pub fn generate() -> Self {
        Self(format!("OI-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for OrderIntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Add,
    Remove,
    Keep,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedOrderItem {
    /// `None` when the model could not ground the mention in the candidate list.
    #[serde(default)]
    pub menu_item_id: Option<MenuItemId>,
    /// Customer wording for an item the model flagged as unresolved.
    #[serde(default)]
    pub unresolved: Option<String>,
    pub qty: u32,
    #[serde(default)]
    pub option_selections: Vec<OptionSelection>,
    #[serde(default)]
    pub extras: Vec<Extra>,
    #[serde(default)]
    pub notes: Option<String>,
    pub action: ItemAction,
    pub item_confidence: f64,
}

impl ExtractedOrderItem {
    pub fn is_unresolved(&self) -> bool {
        self.menu_item_id.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedOrderData {
    #[serde(default)]
    pub items: Vec<ExtractedOrderItem>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub clarification_question: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub order_notes: Option<String>,
}

pub const UNRESOLVED_FIELD: &str = "unresolved";
pub const UNRESOLVED_ITEM_FIELD: &str = "unresolved_item";
pub const FALLBACK_CLARIFICATION: &str =
    "Sorry, I could not quite follow that. Could you tell me again what you would like to order?";

impl ExtractedOrderData {
    /// Safe stand-in used when the model could not produce a usable extraction.
    pub fn fallback() -> Self {
        Self {
            items: Vec::new(),
            missing_fields: vec![UNRESOLVED_FIELD.to_string()],
            clarification_question: Some(FALLBACK_CLARIFICATION.to_string()),
            confidence: 0.0,
            order_notes: None,
        }
    }

    pub fn clarification(question: impl Into<String>, missing_field: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            missing_fields: vec![missing_field.into()],
            clarification_question: Some(question.into()),
            confidence: 0.0,
            order_notes: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentFeedback {
    Correct,
    Incorrect,
}

impl AgentFeedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "correct" => Some(Self::Correct),
            "incorrect" => Some(Self::Incorrect),
            _ => None,
        }
    }
}

impl fmt::Display for AgentFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one extraction attempt. Only `agent_feedback` may change, once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIntent {
    pub id: OrderIntentId,
    pub conversation_id: ConversationId,
    pub last_user_message_id: MessageId,
    pub extracted_json: ExtractedOrderData,
    pub confidence: f64,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
    pub agent_feedback: Option<AgentFeedback>,
    pub flagged_for_audit: bool,
    pub created_at: DateTime<Utc>,
}

impl OrderIntent {
    pub fn new(
        conversation_id: ConversationId,
        last_user_message_id: MessageId,
        extracted: ExtractedOrderData,
        accepted: bool,
        flagged_for_audit: bool,
    ) -> Self {
        Self {
            id: OrderIntentId::generate(),
            conversation_id,
            last_user_message_id,
            confidence: extracted.confidence,
            needs_clarification: !accepted,
            clarification_question: extracted.clarification_question.clone(),
            extracted_json: extracted,
            agent_feedback: None,
            flagged_for_audit,
            created_at: Utc::now(),
        }
    }
}

/// Aggregate of human labels, used to calibrate the confidence threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSummary {
    pub labelled: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub accuracy: Option<f64>,
}

impl FeedbackSummary {
    pub fn from_counts(correct: u64, incorrect: u64) -> Self {
        let labelled = correct + incorrect;
        let accuracy = (labelled > 0).then(|| correct as f64 / labelled as f64);
        Self { labelled, correct, incorrect, accuracy }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ExtractedOrderData, FeedbackSummary, ItemAction, UNRESOLVED_FIELD};

    #[test]
    fn extraction_deserializes_from_model_json() {
        let data: ExtractedOrderData = serde_json::from_value(json!({
            "items": [{
                "menuItemId": "adana-kebap",
                "qty": 2,
                "optionSelections": [{"groupName": "Acı", "optionName": "Acılı"}],
                "action": "add",
                "itemConfidence": 0.8
            }],
            "missingFields": [],
            "clarificationQuestion": null,
            "confidence": 0.85
        }))
        .expect("valid extraction");

        assert_eq!(data.items.len(), 1);
        assert_eq!(data.items[0].action, ItemAction::Add);
        assert!(data.items[0].extras.is_empty());
        assert!(!data.items[0].is_unresolved());
    }

    #[test]
    fn fallback_always_needs_clarification() {
        let fallback = ExtractedOrderData::fallback();
        assert!(fallback.items.is_empty());
        assert_eq!(fallback.missing_fields, vec![UNRESOLVED_FIELD.to_string()]);
        assert!(fallback.clarification_question.is_some());
    }

    #[test]
    fn feedback_summary_has_no_accuracy_without_labels() {
        assert_eq!(FeedbackSummary::from_counts(0, 0).accuracy, None);
        let summary = FeedbackSummary::from_counts(3, 1);
        assert_eq!(summary.labelled, 4);
        assert_eq!(summary.accuracy, Some(0.75));
    }
}
