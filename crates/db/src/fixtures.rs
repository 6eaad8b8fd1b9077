//! Seed data for integration tests: one sample diner with a menu covering
//! required single-choice groups, an optional multi-select group, and one
//! item deliberately lacking provider mappings.

use chrono::{Duration, Utc};
use secrecy::SecretString;
use uuid::Uuid;

use orderline_core::{
    Call, CallId, ExternalIds, MenuCategory, MenuItem, ModifierGroup, ModifierOption,
    NormalizedMenu, PosEnvironment, PosProvider, ProviderCredential, ProviderEntityIds,
    Restaurant, RestaurantId, RestaurantStatus,
};

use crate::repositories::{
    CallRepository, CredentialRepository, MenuRepository, RepositoryError, RestaurantRepository,
    SqlCallRepository, SqlCredentialRepository, SqlMenuRepository, SqlRestaurantRepository,
};
use crate::DbPool;

pub const ITEM_CLASSIC_BURGER: &str = "item-classic-burger";
pub const ITEM_FRIES: &str = "item-fries";
/// Deliberately has no external provider ids.
pub const ITEM_WATER: &str = "item-water";
pub const GROUP_CHEESE: &str = "mod-cheese";
pub const GROUP_EXTRAS: &str = "mod-extras";
pub const GROUP_FRY_SIZE: &str = "mod-fry-size";
pub const OPT_CHEDDAR: &str = "opt-cheddar";
pub const OPT_SWISS: &str = "opt-swiss";
pub const OPT_BACON: &str = "opt-bacon";
pub const OPT_REGULAR: &str = "opt-regular";
pub const OPT_LARGE: &str = "opt-large";

pub struct SeedOptions {
    pub provider: PosProvider,
    pub active: bool,
    pub phone_number: String,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self { provider: PosProvider::Toast, active: true, phone_number: "+15551234567".to_owned() }
    }
}

pub struct SeedResult {
    pub restaurant_id: RestaurantId,
    pub call_id: CallId,
    pub menu_version: i64,
}

fn mapped(item: Option<&str>, group: Option<&str>, option: Option<&str>) -> Option<ExternalIds> {
    let toast = ProviderEntityIds {
        item_id: item.map(|id| format!("toast-{id}")),
        modifier_group_id: group.map(|id| format!("toast-{id}")),
        modifier_option_id: option.map(|id| format!("toast-{id}")),
    };
    let clover = ProviderEntityIds {
        item_id: item.map(|id| format!("clover-{id}")),
        modifier_group_id: group.map(|id| format!("clover-{id}")),
        modifier_option_id: option.map(|id| format!("clover-{id}")),
    };
    Some(ExternalIds { toast: Some(toast), clover: Some(clover) })
}

fn item(
    id: &str,
    name: &str,
    price_cents: i64,
    groups: &[&str],
    synonyms: &[&str],
    external: bool,
) -> MenuItem {
    MenuItem {
        id: id.to_owned(),
        name: name.to_owned(),
        price_cents,
        description: None,
        modifier_group_ids: groups.iter().map(|g| (*g).to_owned()).collect(),
        synonyms: synonyms.iter().map(|s| (*s).to_owned()).collect(),
        external_ids: if external { mapped(Some(id), None, None) } else { None },
    }
}

fn group(id: &str, name: &str, min: u32, max: u32, options: &[&str]) -> ModifierGroup {
    ModifierGroup {
        id: id.to_owned(),
        name: name.to_owned(),
        required_min: min,
        required_max: max,
        option_ids: options.iter().map(|o| (*o).to_owned()).collect(),
        external_ids: mapped(None, Some(id), None),
    }
}

fn option(id: &str, name: &str, price_delta_cents: i64) -> ModifierOption {
    ModifierOption {
        id: id.to_owned(),
        name: name.to_owned(),
        price_delta_cents,
        external_ids: mapped(None, None, Some(id)),
    }
}

pub fn sample_menu() -> NormalizedMenu {
    NormalizedMenu {
        categories: vec![
            MenuCategory {
                id: "cat-burgers".to_owned(),
                name: "Burgers".to_owned(),
                item_ids: vec![ITEM_CLASSIC_BURGER.to_owned()],
            },
            MenuCategory {
                id: "cat-sides".to_owned(),
                name: "Sides".to_owned(),
                item_ids: vec![ITEM_FRIES.to_owned(), ITEM_WATER.to_owned()],
            },
        ],
        items: vec![
            item(
                ITEM_CLASSIC_BURGER,
                "Classic Burger",
                1199,
                &[GROUP_CHEESE, GROUP_EXTRAS],
                &["burger", "cheeseburger"],
                true,
            ),
            item(ITEM_FRIES, "French Fries", 399, &[GROUP_FRY_SIZE], &["fries", "chips"], true),
            item(ITEM_WATER, "Bottled Water", 199, &[], &["water"], false),
        ],
        modifier_groups: vec![
            group(GROUP_CHEESE, "Cheese", 1, 1, &[OPT_CHEDDAR, OPT_SWISS]),
            group(GROUP_EXTRAS, "Extras", 0, 3, &[OPT_BACON]),
            group(GROUP_FRY_SIZE, "Size", 1, 1, &[OPT_REGULAR, OPT_LARGE]),
        ],
        modifier_options: vec![
            option(OPT_CHEDDAR, "Cheddar", 0),
            option(OPT_SWISS, "Swiss", 0),
            option(OPT_BACON, "Bacon", 199),
            option(OPT_REGULAR, "Regular", 0),
            option(OPT_LARGE, "Large", 150),
        ],
    }
}

/// Seeds one restaurant with its menu, an inbound call, and credentials for
/// the configured provider. Returns the generated ids tests need.
pub async fn seed_sample_restaurant(
    pool: &DbPool,
    options: SeedOptions,
) -> Result<SeedResult, RepositoryError> {
    let restaurants = SqlRestaurantRepository::new(pool.clone());
    let menus = SqlMenuRepository::new(pool.clone());
    let calls = SqlCallRepository::new(pool.clone());
    let credentials = SqlCredentialRepository::new(pool.clone());

    let restaurant_id = RestaurantId(Uuid::new_v4().to_string());
    restaurants
        .insert(&Restaurant {
            id: restaurant_id.clone(),
            name: "Sample Diner".to_owned(),
            phone_number: options.phone_number.clone(),
            timezone: "America/Los_Angeles".to_owned(),
            status: if options.active {
                RestaurantStatus::Active
            } else {
                RestaurantStatus::Inactive
            },
            pos_provider: options.provider.as_str().to_owned(),
        })
        .await?;

    let menu_version = menus.replace(&restaurant_id, &sample_menu()).await?;

    let call_id = CallId(Uuid::new_v4().to_string());
    calls
        .insert(&Call {
            id: call_id.clone(),
            restaurant_id: restaurant_id.clone(),
            from_number: "+15557654321".to_owned(),
            to_number: options.phone_number,
            started_at: Utc::now(),
        })
        .await?;

    credentials
        .upsert(&ProviderCredential {
            restaurant_id: restaurant_id.clone(),
            provider: options.provider,
            merchant_ref: format!("merchant-{}", restaurant_id.0),
            client_id: "seed-client-id".to_owned(),
            client_secret: SecretString::from("seed-client-secret"),
            environment: PosEnvironment::Sandbox,
            access_token: Some("seed-cached-token".to_owned()),
            token_expires_at: Some(Utc::now() + Duration::hours(1)),
        })
        .await?;

    Ok(SeedResult { restaurant_id, call_id, menu_version })
}
