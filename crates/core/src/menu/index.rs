use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::menu::{
    CanonicalMenuExport, MenuIndexEntry, MenuItemId, MenuOption, OptionGroup, OptionGroupId,
    OptionId, SynonymEntry, SynonymTarget, TenantId,
};
use crate::text::{normalize_text, tokenize};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum MenuIndexError {
    #[error("menu item `{0}` is listed more than once")]
    DuplicateItem(String),
    #[error("option group `{0}` is listed more than once")]
    DuplicateOptionGroup(String),
    #[error("option `{0}` is listed more than once")]
    DuplicateOption(String),
    #[error("menu item `{item_id}` references unknown option group `{group_id}`")]
    UnknownOptionGroup { item_id: String, group_id: String },
    #[error("option group `{group_id}` has min_select {min} greater than max_select {max}")]
    InvalidSelectionBounds { group_id: String, min: u32, max: u32 },
    #[error("synonym `{phrase}` must map to exactly one item or option")]
    AmbiguousSynonymTarget { phrase: String },
    #[error("synonym `{phrase}` has weight {weight} outside (0, 1]")]
    InvalidSynonymWeight { phrase: String, weight: f64 },
    #[error("synonym `{phrase}` is empty after normalization")]
    EmptySynonym { phrase: String },
    #[error("synonym `{phrase}` maps to unknown target `{target}`")]
    UnknownSynonymTarget { phrase: String, target: String },
    #[error("menu version {offered} for tenant `{tenant}` is not newer than published {current}")]
    StaleVersion { tenant: String, current: u64, offered: u64 },
}

/// Immutable, query-ready view of one published menu version.
#[derive(Clone, Debug)]
pub struct MenuIndex {
    tenant_id: TenantId,
    version: u64,
    items: BTreeMap<MenuItemId, MenuIndexEntry>,
    option_groups: BTreeMap<OptionGroupId, OptionGroup>,
    options: BTreeMap<OptionId, (OptionGroupId, MenuOption)>,
    synonyms: Vec<SynonymEntry>,
}

impl MenuIndex {
    pub fn build(export: CanonicalMenuExport) -> Result<Self, MenuIndexError> {
        let mut option_groups = BTreeMap::new();
        let mut options = BTreeMap::new();
        for group in export.option_groups {
            if group.min_select > group.max_select {
                return Err(MenuIndexError::InvalidSelectionBounds {
                    group_id: group.id.0.clone(),
                    min: group.min_select,
                    max: group.max_select,
                });
            }
            for option in &group.options {
                if options.insert(option.id.clone(), (group.id.clone(), option.clone())).is_some()
                {
                    return Err(MenuIndexError::DuplicateOption(option.id.0.clone()));
                }
            }
            let group_id = group.id.clone();
            if option_groups.insert(group_id.clone(), group).is_some() {
                return Err(MenuIndexError::DuplicateOptionGroup(group_id.0));
            }
        }

        let mut items = BTreeMap::new();
        for category in export.categories {
            for item in category.items {
                if let Some(group_id) =
                    item.option_group_ids.iter().find(|id| !option_groups.contains_key(*id))
                {
                    return Err(MenuIndexError::UnknownOptionGroup {
                        item_id: item.id.0.clone(),
                        group_id: group_id.0.clone(),
                    });
                }
                let entry = MenuIndexEntry {
                    menu_item_id: item.id.clone(),
                    name: item.name,
                    category: category.name.clone(),
                    base_price: item.base_price,
                    option_group_ids: item.option_group_ids,
                };
                if items.insert(item.id.clone(), entry).is_some() {
                    return Err(MenuIndexError::DuplicateItem(item.id.0));
                }
            }
        }

        let mut synonyms = Vec::with_capacity(export.synonyms.len());
        for record in export.synonyms {
            let target = match (record.item_id, record.option_id) {
                (Some(item_id), None) => SynonymTarget::Item(item_id),
                (None, Some(option_id)) => SynonymTarget::Option(option_id),
                _ => return Err(MenuIndexError::AmbiguousSynonymTarget { phrase: record.phrase }),
            };
            if !(record.weight > 0.0 && record.weight <= 1.0) {
                return Err(MenuIndexError::InvalidSynonymWeight {
                    phrase: record.phrase,
                    weight: record.weight,
                });
            }
            let known = match &target {
                SynonymTarget::Item(id) => items.contains_key(id),
                SynonymTarget::Option(id) => options.contains_key(id),
            };
            if !known {
                return Err(MenuIndexError::UnknownSynonymTarget {
                    phrase: record.phrase,
                    target: target.id().to_string(),
                });
            }
            let tokens = tokenize(&record.phrase);
            if tokens.is_empty() {
                return Err(MenuIndexError::EmptySynonym { phrase: record.phrase });
            }
            synonyms.push(SynonymEntry {
                phrase: normalize_text(&record.phrase),
                target,
                weight: record.weight,
                tokens,
            });
        }

        Ok(Self {
            tenant_id: export.tenant_id,
            version: export.version,
            items,
            option_groups,
            options,
            synonyms,
        })
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn item(&self, id: &MenuItemId) -> Option<&MenuIndexEntry> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &MenuIndexEntry> {
        self.items.values()
    }

    /// Option plus the group that owns it.
    pub fn option(&self, id: &OptionId) -> Option<(&OptionGroup, &MenuOption)> {
        let (group_id, option) = self.options.get(id)?;
        self.option_groups.get(group_id).map(|group| (group, option))
    }

    /// Option groups attached to an item, in the order the menu lists them.
    pub fn groups_for_item(&self, id: &MenuItemId) -> Vec<&OptionGroup> {
        self.items
            .get(id)
            .map(|entry| {
                entry
                    .option_group_ids
                    .iter()
                    .filter_map(|group_id| self.option_groups.get(group_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn synonyms(&self) -> &[SynonymEntry] {
        &self.synonyms
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rust_decimal::Decimal;

    use crate::domain::menu::{
        CanonicalMenuExport, MenuCategory, MenuItem, MenuItemId, MenuOption, OptionGroup,
        OptionGroupId, OptionId, SynonymRecord, TenantId,
    };

    pub fn item(id: &str, name: &str, price: i64, groups: &[&str]) -> MenuItem {
        MenuItem {
            id: MenuItemId(id.to_string()),
            name: name.to_string(),
            base_price: Decimal::new(price, 2),
            option_group_ids: groups.iter().map(|id| OptionGroupId(id.to_string())).collect(),
        }
    }

    pub fn item_synonym(phrase: &str, item_id: &str, weight: f64) -> SynonymRecord {
        SynonymRecord {
            phrase: phrase.to_string(),
            item_id: Some(MenuItemId(item_id.to_string())),
            option_id: None,
            weight,
        }
    }

    pub fn option_synonym(phrase: &str, option_id: &str, weight: f64) -> SynonymRecord {
        SynonymRecord {
            phrase: phrase.to_string(),
            item_id: None,
            option_id: Some(OptionId(option_id.to_string())),
            weight,
        }
    }

    /// Small kebab-house menu used across core tests.
    pub fn kebab_menu() -> CanonicalMenuExport {
        CanonicalMenuExport {
            tenant_id: TenantId("ocakbasi".to_string()),
            version: 3,
            categories: vec![
                MenuCategory {
                    name: "Kebaplar".to_string(),
                    items: vec![
                        item("kebap", "Adana Kebap", 32_000, &["porsiyon"]),
                        item("tavuk", "Tavuk Izgara", 24_000, &[]),
                        item("tavuk-sis", "Tavuk Şiş", 26_000, &["porsiyon"]),
                    ],
                },
                MenuCategory {
                    name: "İçecekler".to_string(),
                    items: vec![item("ayran", "Ayran", 4_000, &[])],
                },
            ],
            option_groups: vec![OptionGroup {
                id: OptionGroupId("porsiyon".to_string()),
                name: "Porsiyon".to_string(),
                min_select: 0,
                max_select: 1,
                options: vec![
                    MenuOption {
                        id: OptionId("porsiyon-tam".to_string()),
                        name: "Tam".to_string(),
                        price_delta: Decimal::ZERO,
                    },
                    MenuOption {
                        id: OptionId("porsiyon-bucuk".to_string()),
                        name: "Buçuk".to_string(),
                        price_delta: Decimal::new(12_000, 2),
                    },
                ],
            }],
            synonyms: vec![
                item_synonym("adana kebap", "kebap", 1.0),
                item_synonym("adana", "kebap", 0.9),
                item_synonym("kebap", "kebap", 0.6),
                item_synonym("tavuk", "tavuk", 0.9),
                item_synonym("tavuk şiş", "tavuk-sis", 0.95),
                item_synonym("ayran", "ayran", 1.0),
                option_synonym("buçuk", "porsiyon-bucuk", 0.8),
            ],
        }
    }
}
