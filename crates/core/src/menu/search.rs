//! Substring scoring over item names and synonyms.

use crate::domain::menu::{MenuItem, NormalizedMenu};

const FULL_QUERY_SCORE: u32 = 10;
const TOKEN_SCORE: u32 = 2;

/// Scores each item by whole-query and per-token substring matches over
/// its name plus synonyms. Zero-score items are excluded; ties keep the
/// menu's natural order; the result is truncated to `limit`.
pub fn search_menu<'a>(menu: &'a NormalizedMenu, query: &str, limit: usize) -> Vec<&'a MenuItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let tokens: Vec<&str> = needle.split_whitespace().collect();

    let mut scored: Vec<(u32, &MenuItem)> = menu
        .items
        .iter()
        .filter_map(|item| {
            let mut haystack = item.name.to_lowercase();
            for synonym in &item.synonyms {
                haystack.push(' ');
                haystack.push_str(&synonym.to_lowercase());
            }

            let mut score = 0;
            if haystack.contains(&needle) {
                score += FULL_QUERY_SCORE;
            }
            for token in &tokens {
                if haystack.contains(token) {
                    score += TOKEN_SCORE;
                }
            }

            (score > 0).then_some((score, item))
        })
        .collect();

    // Stable sort preserves table order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(limit);
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use crate::domain::menu::{MenuItem, NormalizedMenu};

    use super::search_menu;

    fn item(id: &str, name: &str, synonyms: &[&str]) -> MenuItem {
        MenuItem {
            id: id.to_owned(),
            name: name.to_owned(),
            price_cents: 100,
            description: None,
            modifier_group_ids: Vec::new(),
            synonyms: synonyms.iter().map(|s| (*s).to_owned()).collect(),
            external_ids: None,
        }
    }

    fn menu() -> NormalizedMenu {
        NormalizedMenu {
            items: vec![
                item("item-classic", "Classic Burger", &["burger", "cheeseburger"]),
                item("item-veggie", "Veggie Burger", &["veggie"]),
                item("item-fries", "French Fries", &["fries", "chips"]),
                item("item-water", "Bottled Water", &["water"]),
            ],
            ..NormalizedMenu::default()
        }
    }

    #[test]
    fn whole_query_match_outranks_token_matches() {
        let menu = menu();
        let hits = search_menu(&menu, "veggie burger", 5);
        assert_eq!(hits[0].id, "item-veggie");
        // "Classic Burger" still matches the "burger" token.
        assert!(hits.iter().any(|hit| hit.id == "item-classic"));
    }

    #[test]
    fn zero_score_items_are_excluded() {
        let menu = menu();
        let hits = search_menu(&menu, "burger", 5);
        assert!(hits.iter().all(|hit| hit.id != "item-water"));
        assert!(search_menu(&menu, "milkshake", 5).is_empty());
    }

    #[test]
    fn ties_keep_menu_order_and_limit_truncates() {
        let menu = menu();
        // Both burgers score identically for the shared synonym token.
        let hits = search_menu(&menu, "burger", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "item-classic");
    }

    #[test]
    fn blank_query_returns_nothing() {
        let menu = menu();
        assert!(search_menu(&menu, "   ", 5).is_empty());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let menu = menu();
        let hits = search_menu(&menu, "FRENCH fries", 5);
        assert_eq!(hits[0].id, "item-fries");
    }
}
