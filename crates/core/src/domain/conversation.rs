use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::intent::MessageId;
use crate::domain::menu::TenantId;
use crate::domain::order::ConversationId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Customer,
    Agent,
    Bot,
}

impl TurnRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
            Self::Bot => "bot",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub message_id: MessageId,
    pub role: TurnRole,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn customer(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message_id: MessageId(message_id.into()),
            role: TurnRole::Customer,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }
}

/// One inbound customer message as handed over by the conversation service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub text: String,
    #[serde(default)]
    pub prior_turns: Vec<ConversationTurn>,
}

impl InboundMessage {
    /// Prior turns plus this message, oldest first. A prior turn carrying this message's id
    /// is the same message echoed back and is skipped.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        let mut turns: Vec<ConversationTurn> = self
            .prior_turns
            .iter()
            .filter(|turn| turn.message_id != self.message_id)
            .cloned()
            .collect();
        turns.sort_by_key(|turn| turn.sent_at);
        turns.push(ConversationTurn {
            message_id: self.message_id.clone(),
            role: TurnRole::Customer,
            text: self.text.clone(),
            sent_at: Utc::now(),
        });
        turns
    }
}
