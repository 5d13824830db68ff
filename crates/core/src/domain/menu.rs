use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionGroupId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub String);

/// Published, flattened menu as delivered by the menu-publishing service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMenuExport {
    pub tenant_id: TenantId,
    pub version: u64,
    pub categories: Vec<MenuCategory>,
    #[serde(default)]
    pub option_groups: Vec<OptionGroup>,
    #[serde(default)]
    pub synonyms: Vec<SynonymRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuCategory {
    pub name: String,
    pub items: Vec<MenuItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub option_group_ids: Vec<OptionGroupId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionGroup {
    pub id: OptionGroupId,
    pub name: String,
    #[serde(default)]
    pub min_select: u32,
    #[serde(default = "default_max_select")]
    pub max_select: u32,
    pub options: Vec<MenuOption>,
}

fn default_max_select() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub id: OptionId,
    pub name: String,
    #[serde(default)]
    pub price_delta: Decimal,
}

/// Synonym row as exported; exactly one of `item_id`/`option_id` must be set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynonymRecord {
    pub phrase: String,
    #[serde(default)]
    pub item_id: Option<MenuItemId>,
    #[serde(default)]
    pub option_id: Option<OptionId>,
    pub weight: f64,
}

/// What a synonym phrase points at once the export has been validated.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SynonymTarget {
    Item(MenuItemId),
    Option(OptionId),
}

impl SynonymTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Item(id) => &id.0,
            Self::Option(id) => &id.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuIndexEntry {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    pub option_group_ids: Vec<OptionGroupId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynonymEntry {
    /// Normalized phrase.
    pub phrase: String,
    pub target: SynonymTarget,
    pub weight: f64,
    #[serde(skip)]
    pub tokens: Vec<String>,
}

/// Ranked retrieval hit. Ephemeral, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuCandidate {
    pub target: SynonymTarget,
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    pub synonyms_matched: Vec<String>,
    pub score: f64,
    #[serde(skip)]
    pub winning_phrase_tokens: usize,
}

impl MenuCandidate {
    pub fn menu_item_id(&self) -> Option<&MenuItemId> {
        match &self.target {
            SynonymTarget::Item(id) => Some(id),
            SynonymTarget::Option(_) => None,
        }
    }
}
