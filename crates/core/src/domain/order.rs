use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::menu::{MenuItemId, TenantId};
use crate::errors::DomainError;
use crate::text::normalize_text;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSelection {
    pub group_name: String,
    pub option_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extra {
    pub name: String,
    pub qty: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftOrderItem {
    pub menu_item_id: MenuItemId,
    pub qty: u32,
    #[serde(default)]
    pub option_selections: Vec<OptionSelection>,
    #[serde(default)]
    pub extras: Vec<Extra>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DraftOrderItem {
    pub fn new(menu_item_id: impl Into<String>, qty: u32) -> Self {
        Self {
            menu_item_id: MenuItemId(menu_item_id.into()),
            qty,
            option_selections: Vec::new(),
            extras: Vec::new(),
            notes: None,
        }
    }

    pub fn line_key(&self) -> LineKey {
        LineKey::new(&self.menu_item_id, &self.option_selections)
    }
}

/// Reconciliation identity of a draft line: the item plus its normalized selections.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineKey {
    pub menu_item_id: MenuItemId,
    pub selections: Vec<(String, String)>,
}

impl LineKey {
    pub fn new(menu_item_id: &MenuItemId, selections: &[OptionSelection]) -> Self {
        let mut normalized = selections
            .iter()
            .map(|selection| {
                (normalize_text(&selection.group_name), normalize_text(&selection.option_name))
            })
            .collect::<Vec<_>>();
        normalized.sort();
        normalized.dedup();
        Self { menu_item_id: menu_item_id.clone(), selections: normalized }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftOrderStatus {
    Open,
    Confirmed,
    Cancelled,
}

impl DraftOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Per-conversation order under construction. `revision` is bumped on every persisted write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftOrder {
    pub conversation_id: ConversationId,
    pub tenant_id: TenantId,
    pub status: DraftOrderStatus,
    pub items: Vec<DraftOrderItem>,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl DraftOrder {
    pub fn empty(conversation_id: ConversationId, tenant_id: TenantId) -> Self {
        Self {
            conversation_id,
            tenant_id,
            status: DraftOrderStatus::Open,
            items: Vec::new(),
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.status.is_frozen()
    }

    pub fn can_transition_to(&self, next: DraftOrderStatus) -> bool {
        matches!(
            (self.status, next),
            (DraftOrderStatus::Open, DraftOrderStatus::Confirmed)
                | (DraftOrderStatus::Open, DraftOrderStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: DraftOrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidDraftTransition { from: self.status, to: next })
    }

    /// Replaces the lines of an open draft.
    pub fn replace_items(&mut self, items: Vec<DraftOrderItem>) -> Result<(), DomainError> {
        if self.is_frozen() {
            return Err(DomainError::DraftFrozen {
                conversation_id: self.conversation_id.0.clone(),
                status: self.status,
            });
        }
        self.items = items;
        self.updated_at = Utc::now();
        Ok(())
    }
}
