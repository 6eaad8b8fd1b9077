use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::restaurant::{PosProvider, RestaurantId};
use crate::errors::ServiceError;

/// Provider-native ids for one menu entity. An entity without the id for
/// the tenant's configured provider cannot be submitted to that provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntityIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier_option_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toast: Option<ProviderEntityIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clover: Option<ProviderEntityIds>,
}

impl ExternalIds {
    pub fn for_provider(&self, provider: PosProvider) -> Option<&ProviderEntityIds> {
        match provider {
            PosProvider::Toast => self.toast.as_ref(),
            PosProvider::Clover => self.clover.as_ref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub item_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    /// Integer minor-currency units (cents).
    pub price_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub modifier_group_ids: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<ExternalIds>,
}

impl MenuItem {
    pub fn provider_ids(&self, provider: PosProvider) -> Option<&ProviderEntityIds> {
        self.external_ids.as_ref().and_then(|ids| ids.for_provider(provider))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierGroup {
    pub id: String,
    pub name: String,
    pub required_min: u32,
    pub required_max: u32,
    #[serde(default)]
    pub option_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<ExternalIds>,
}

impl ModifierGroup {
    pub fn provider_ids(&self, provider: PosProvider) -> Option<&ProviderEntityIds> {
        self.external_ids.as_ref().and_then(|ids| ids.for_provider(provider))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierOption {
    pub id: String,
    pub name: String,
    /// May be negative or zero.
    pub price_delta_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<ExternalIds>,
}

impl ModifierOption {
    pub fn provider_ids(&self, provider: PosProvider) -> Option<&ProviderEntityIds> {
        self.external_ids.as_ref().and_then(|ids| ids.for_provider(provider))
    }
}

/// The provider-agnostic catalog for one restaurant. Replaced wholesale on
/// every sync, never patched field-by-field, so every id referenced inside
/// a snapshot resolves within that same snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMenu {
    #[serde(default)]
    pub categories: Vec<MenuCategory>,
    #[serde(default)]
    pub items: Vec<MenuItem>,
    #[serde(default)]
    pub modifier_groups: Vec<ModifierGroup>,
    #[serde(default)]
    pub modifier_options: Vec<ModifierOption>,
}

impl NormalizedMenu {
    pub fn index(&self) -> MenuIndex<'_> {
        MenuIndex {
            items: self.items.iter().map(|item| (item.id.as_str(), item)).collect(),
            groups: self.modifier_groups.iter().map(|group| (group.id.as_str(), group)).collect(),
            options: self
                .modifier_options
                .iter()
                .map(|option| (option.id.as_str(), option))
                .collect(),
        }
    }

    /// Enforces the snapshot invariants: every referenced id resolves and
    /// every group's cardinality bounds are ordered. A menu failing these
    /// checks aborts the whole request rather than serving partially.
    pub fn check_integrity(&self) -> Result<(), ServiceError> {
        let index = self.index();
        let mut problems = Vec::new();

        for category in &self.categories {
            for item_id in &category.item_ids {
                if index.item(item_id).is_none() {
                    problems.push(format!(
                        "category `{}` references unknown item `{item_id}`",
                        category.id
                    ));
                }
            }
        }

        for item in &self.items {
            for group_id in &item.modifier_group_ids {
                if index.group(group_id).is_none() {
                    problems.push(format!(
                        "item `{}` references unknown modifier group `{group_id}`",
                        item.id
                    ));
                }
            }
        }

        for group in &self.modifier_groups {
            if group.required_min > group.required_max {
                problems.push(format!(
                    "modifier group `{}` has required_min {} > required_max {}",
                    group.id, group.required_min, group.required_max
                ));
            }
            for option_id in &group.option_ids {
                if index.option(option_id).is_none() {
                    problems.push(format!(
                        "modifier group `{}` references unknown option `{option_id}`",
                        group.id
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Storage(format!(
                "menu failed integrity checks: {}",
                problems.join("; ")
            )))
        }
    }

    /// Content hash of the menu structure, used to detect sync changes.
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{digest:x}")
    }
}

/// Borrowed id lookups over one menu snapshot.
pub struct MenuIndex<'a> {
    items: HashMap<&'a str, &'a MenuItem>,
    groups: HashMap<&'a str, &'a ModifierGroup>,
    options: HashMap<&'a str, &'a ModifierOption>,
}

impl<'a> MenuIndex<'a> {
    pub fn item(&self, id: &str) -> Option<&'a MenuItem> {
        self.items.get(id).copied()
    }

    pub fn group(&self, id: &str) -> Option<&'a ModifierGroup> {
        self.groups.get(id).copied()
    }

    pub fn option(&self, id: &str) -> Option<&'a ModifierOption> {
        self.options.get(id).copied()
    }
}

/// One stored menu row: the snapshot plus its monotonically increasing
/// version and sync metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSnapshot {
    pub restaurant_id: RestaurantId,
    pub version: i64,
    pub menu: NormalizedMenu,
    pub source_hash: String,
    pub last_sync_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{MenuItem, ModifierGroup, ModifierOption, NormalizedMenu};

    fn menu_with_group(required_min: u32, required_max: u32) -> NormalizedMenu {
        NormalizedMenu {
            categories: Vec::new(),
            items: vec![MenuItem {
                id: "item-1".to_owned(),
                name: "Burger".to_owned(),
                price_cents: 1199,
                description: None,
                modifier_group_ids: vec!["group-1".to_owned()],
                synonyms: Vec::new(),
                external_ids: None,
            }],
            modifier_groups: vec![ModifierGroup {
                id: "group-1".to_owned(),
                name: "Cheese".to_owned(),
                required_min,
                required_max,
                option_ids: vec!["opt-1".to_owned()],
                external_ids: None,
            }],
            modifier_options: vec![ModifierOption {
                id: "opt-1".to_owned(),
                name: "Cheddar".to_owned(),
                price_delta_cents: 0,
                external_ids: None,
            }],
        }
    }

    #[test]
    fn well_formed_menu_passes_integrity() {
        menu_with_group(1, 1).check_integrity().expect("integrity");
    }

    #[test]
    fn dangling_references_fail_integrity() {
        let mut menu = menu_with_group(1, 1);
        menu.modifier_options.clear();
        menu.items[0].modifier_group_ids.push("group-missing".to_owned());

        let error = menu.check_integrity().expect_err("should fail");
        let rendered = error.to_string();
        assert!(rendered.contains("unknown option `opt-1`"));
        assert!(rendered.contains("unknown modifier group `group-missing`"));
    }

    #[test]
    fn inverted_cardinality_bounds_fail_integrity() {
        assert!(menu_with_group(2, 1).check_integrity().is_err());
    }

    #[test]
    fn content_hash_is_stable_and_tracks_structure() {
        let menu = menu_with_group(1, 1);
        assert_eq!(menu.content_hash(), menu.content_hash());

        let mut changed = menu.clone();
        changed.items[0].price_cents = 1299;
        assert_ne!(menu.content_hash(), changed.content_hash());
    }

    #[test]
    fn menu_json_round_trips_with_camel_case_fields() {
        let json = serde_json::to_value(menu_with_group(0, 3)).expect("serialize");
        assert_eq!(json["items"][0]["priceCents"], 1199);
        assert_eq!(json["modifierGroups"][0]["requiredMax"], 3);

        let back: NormalizedMenu = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.items[0].price_cents, 1199);
    }
}
