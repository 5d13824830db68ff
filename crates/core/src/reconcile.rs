//! Merges a validated extraction into the current draft order lines.
//!
//! Lines are identified by [`LineKey`]: the menu item plus its normalized option
//! selections. The gate is all-or-nothing; a rejected extraction leaves the lines untouched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::intent::{ExtractedOrderData, ExtractedOrderItem, ItemAction};
use crate::domain::order::{DraftOrderItem, LineKey};
use crate::menu::MenuIndex;
use crate::text::normalize_text;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.55;

const NOTE_SEPARATOR: &str = "; ";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub items: Vec<DraftOrderItem>,
    pub accepted: bool,
    /// Structural gaps found after the merge, separate from the extraction's own list.
    pub missing_fields: Vec<String>,
    pub total: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reconciler {
    confidence_threshold: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl Reconciler {
    pub fn new(confidence_threshold: f64) -> Self {
        Self { confidence_threshold }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn passes_gate(&self, extracted: &ExtractedOrderData) -> bool {
        extracted.confidence >= self.confidence_threshold
            && extracted.missing_fields.is_empty()
            && extracted.clarification_question.is_none()
    }

    pub fn reconcile(
        &self,
        draft: &[DraftOrderItem],
        extracted: &ExtractedOrderData,
        menu: &MenuIndex,
    ) -> ReconcileOutcome {
        let accepted = self.passes_gate(extracted);
        let mut items = draft.to_vec();
        if accepted {
            for extracted_item in &extracted.items {
                apply_item(&mut items, extracted_item);
            }
        }

        ReconcileOutcome {
            missing_fields: derived_missing_fields(&items, menu),
            total: derived_total(&items, menu),
            items,
            accepted,
        }
    }
}

fn apply_item(items: &mut Vec<DraftOrderItem>, extracted: &ExtractedOrderItem) {
    let Some(menu_item_id) = extracted.menu_item_id.as_ref() else {
        return;
    };
    let key = LineKey::new(menu_item_id, &extracted.option_selections);
    let position = items.iter().position(|line| line.line_key() == key);

    match (extracted.action, position) {
        (ItemAction::Add, Some(index)) => {
            let line = &mut items[index];
            line.qty = line.qty.saturating_add(extracted.qty);
            for extra in &extracted.extras {
                if !line.extras.contains(extra) {
                    line.extras.push(extra.clone());
                }
            }
            line.notes = merge_notes(line.notes.take(), extracted.notes.as_deref());
        }
        (ItemAction::Add, None) => items.push(DraftOrderItem {
            menu_item_id: menu_item_id.clone(),
            qty: extracted.qty,
            option_selections: extracted.option_selections.clone(),
            extras: extracted.extras.clone(),
            notes: extracted.notes.clone().filter(|note| !note.trim().is_empty()),
        }),
        (ItemAction::Remove, Some(index)) => {
            items.remove(index);
        }
        (ItemAction::Remove, None) | (ItemAction::Keep, _) => {}
    }
}

fn merge_notes(existing: Option<String>, incoming: Option<&str>) -> Option<String> {
    let incoming = incoming.map(str::trim).filter(|note| !note.is_empty());
    match (existing, incoming) {
        (existing, None) => existing,
        (None, Some(note)) => Some(note.to_string()),
        (Some(existing), Some(note)) => {
            if existing.split(NOTE_SEPARATOR).any(|part| part == note) {
                Some(existing)
            } else {
                Some(format!("{existing}{NOTE_SEPARATOR}{note}"))
            }
        }
    }
}

fn derived_missing_fields(items: &[DraftOrderItem], menu: &MenuIndex) -> Vec<String> {
    let mut missing = Vec::new();
    let mut push = |field: String| {
        if !missing.contains(&field) {
            missing.push(field);
        }
    };

    for line in items {
        let id = &line.menu_item_id.0;
        if menu.item(&line.menu_item_id).is_none() {
            push(format!("{id}:unavailable"));
            continue;
        }

        let groups = menu.groups_for_item(&line.menu_item_id);
        for group in &groups {
            let group_key = normalize_text(&group.name);
            let selected = line
                .option_selections
                .iter()
                .filter(|selection| normalize_text(&selection.group_name) == group_key)
                .count() as u32;
            if selected < group.min_select {
                push(format!("{id}.{}", group.name));
            } else if selected > group.max_select {
                push(format!("{id}.{}:too_many", group.name));
            }
        }

        for selection in &line.option_selections {
            let group_key = normalize_text(&selection.group_name);
            let option_key = normalize_text(&selection.option_name);
            let known = groups.iter().any(|group| {
                normalize_text(&group.name) == group_key
                    && group.options.iter().any(|option| normalize_text(&option.name) == option_key)
            });
            if !known {
                push(format!("{id}.{}:unknown_option", selection.group_name));
            }
        }
    }

    missing
}

fn derived_total(items: &[DraftOrderItem], menu: &MenuIndex) -> Decimal {
    items
        .iter()
        .filter_map(|line| {
            let entry = menu.item(&line.menu_item_id)?;
            let groups = menu.groups_for_item(&line.menu_item_id);
            let deltas = line
                .option_selections
                .iter()
                .filter_map(|selection| {
                    let group_key = normalize_text(&selection.group_name);
                    let option_key = normalize_text(&selection.option_name);
                    groups
                        .iter()
                        .find(|group| normalize_text(&group.name) == group_key)?
                        .options
                        .iter()
                        .find(|option| normalize_text(&option.name) == option_key)
                        .map(|option| option.price_delta)
                })
                .sum::<Decimal>();
            Some(Decimal::from(line.qty) * (entry.base_price + deltas))
        })
        .sum()
}
