//! Selection validation and local pricing.
//!
//! `validate_selections` is a pure function of a menu snapshot and the
//! caller's selections. Violations accumulate so the caller receives the
//! complete problem list in one round trip; partial success is not
//! possible.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::menu::{MenuIndex, ModifierGroup, NormalizedMenu};
use crate::domain::order::DraftOrder;
use crate::errors::ServiceError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionModifier {
    pub group_id: String,
    pub option_ids: Vec<String>,
}

/// One requested line: an item, a quantity, and the chosen modifiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub item_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub modifiers: Vec<SelectionModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLineOption {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLineModifier {
    pub group_id: String,
    pub group_name: String,
    pub options: Vec<DraftLineOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    pub item_id: String,
    pub name: String,
    pub quantity: u32,
    pub modifiers: Vec<DraftLineModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    pub line_subtotal_cents: i64,
}

/// Deterministic summary of a validated draft. Recomputed wholesale from a
/// menu snapshot plus selections, never diffed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub items: Vec<DraftLine>,
    pub subtotal_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_phone: Option<String>,
}

pub fn validate_selections(
    menu: &NormalizedMenu,
    selections: &[Selection],
) -> Result<DraftSummary, ServiceError> {
    let index = menu.index();
    let mut errors: Vec<String> = Vec::new();
    let mut lines: Vec<DraftLine> = Vec::new();
    let mut subtotal_cents: i64 = 0;

    for (position, selection) in selections.iter().enumerate() {
        let Some(item) = index.item(&selection.item_id) else {
            errors.push(format!("selection[{position}]: item `{}` not found", selection.item_id));
            continue;
        };

        if selection.quantity == 0 {
            errors.push(format!("selection[{position}]: quantity must be >= 1"));
            continue;
        }
        let quantity = i64::from(selection.quantity);

        let chosen: HashMap<&str, &SelectionModifier> = selection
            .modifiers
            .iter()
            .map(|modifier| (modifier.group_id.as_str(), modifier))
            .collect();

        let mut modifier_summaries: Vec<DraftLineModifier> = Vec::new();
        let mut line_subtotal = item.price_cents * quantity;

        for group_id in &item.modifier_group_ids {
            let Some(group) = index.group(group_id) else {
                errors.push(format!(
                    "menu missing modifier group `{group_id}` for item `{}`",
                    item.id
                ));
                continue;
            };

            let option_ids =
                chosen.get(group_id.as_str()).map(|m| m.option_ids.as_slice()).unwrap_or(&[]);
            let valid_options =
                collect_valid_options(&index, group, option_ids, &item.name, &mut errors);

            let count = valid_options.len() as u32;
            if count < group.required_min {
                errors.push(format!(
                    "item {} requires at least {} option(s) for {}",
                    item.name, group.required_min, group.name
                ));
            } else if count > group.required_max {
                errors.push(format!(
                    "item {} allows at most {} option(s) for {}",
                    item.name, group.required_max, group.name
                ));
            }

            for option in &valid_options {
                line_subtotal += option.delta_cents * quantity;
            }

            if !valid_options.is_empty() || group.required_min > 0 {
                modifier_summaries.push(DraftLineModifier {
                    group_id: group.id.clone(),
                    group_name: group.name.clone(),
                    options: valid_options
                        .into_iter()
                        .map(|option| DraftLineOption { id: option.id, name: option.name })
                        .collect(),
                });
            }
        }

        for modifier in &selection.modifiers {
            if !item.modifier_group_ids.contains(&modifier.group_id) {
                errors.push(format!(
                    "modifier group `{}` is not valid for item {}",
                    modifier.group_id, item.name
                ));
            }
        }

        lines.push(DraftLine {
            item_id: item.id.clone(),
            name: item.name.clone(),
            quantity: selection.quantity,
            modifiers: modifier_summaries,
            special_instructions: selection.special_instructions.clone(),
            line_subtotal_cents: line_subtotal,
        });
        subtotal_cents += line_subtotal;
    }

    if errors.is_empty() {
        Ok(DraftSummary {
            items: lines,
            subtotal_cents,
            notes: None,
            pickup_name: None,
            pickup_phone: None,
        })
    } else {
        Err(ServiceError::ValidationFailed { errors })
    }
}

/// Validates and summarizes a whole draft, carrying the pickup metadata
/// through to the summary.
pub fn build_draft_summary(
    menu: &NormalizedMenu,
    draft: &DraftOrder,
) -> Result<DraftSummary, ServiceError> {
    let mut summary = validate_selections(menu, &draft.selections)?;
    summary.notes = draft.notes.clone();
    summary.pickup_name = draft.pickup_name.clone();
    summary.pickup_phone = draft.pickup_phone.clone();
    Ok(summary)
}

struct ValidOption {
    id: String,
    name: String,
    delta_cents: i64,
}

/// Deduplicates the chosen option ids (duplicates collapse) and keeps only
/// those that belong to the group; each stray id reports its own error and
/// is excluded from the cardinality count.
fn collect_valid_options(
    index: &MenuIndex<'_>,
    group: &ModifierGroup,
    option_ids: &[String],
    item_name: &str,
    errors: &mut Vec<String>,
) -> Vec<ValidOption> {
    let mut seen: Vec<&str> = Vec::new();
    let mut valid = Vec::new();

    for option_id in option_ids {
        if seen.contains(&option_id.as_str()) {
            continue;
        }
        seen.push(option_id);

        if !group.option_ids.contains(option_id) {
            errors.push(format!(
                "option `{option_id}` is not valid for modifier group {} on item {item_name}",
                group.name
            ));
            continue;
        }
        match index.option(option_id) {
            Some(option) => valid.push(ValidOption {
                id: option.id.clone(),
                name: option.name.clone(),
                delta_cents: option.price_delta_cents,
            }),
            None => errors.push(format!("modifier option `{option_id}` not found")),
        }
    }

    valid
}
