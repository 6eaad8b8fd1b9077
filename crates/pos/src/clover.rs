//! Clover adapter: OAuth code exchange, locally computed pricing, order
//! submission via the v3 merchant API, and catalog sync into the
//! normalized menu shape.
//!
//! Clover has no pricing endpoint, so `price_order` always computes totals
//! locally from the validated draft. Clover also has no client-credentials
//! refresh flow; an expired token means the merchant must re-authorize
//! through the OAuth callback.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use orderline_core::{
    CloverConfig, DraftRecord, ExternalIds, MenuCategory, MenuItem, ModifierGroup, ModifierOption,
    NormalizedMenu, OrderTotals, PosEnvironment, PosProvider, PricingOutcome, ProviderEntityIds,
    Restaurant, ServiceError,
};
use orderline_db::repositories::{CredentialRepository, MenuRepository};

use crate::http::PosHttp;
use crate::{string_field, MappedOrder, PosAdapter, ProviderSession, SubmitResult};

const PROVIDER: &str = "clover";
const TOKEN_SKEW_SECS: i64 = 60;
const CATALOG_PAGE_SIZE: usize = 200;

/// Result of an OAuth authorization-code exchange.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
}

pub struct CloverAdapter {
    config: CloverConfig,
    http: PosHttp,
    credentials: Arc<dyn CredentialRepository>,
}

impl CloverAdapter {
    pub fn new(
        config: CloverConfig,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Result<Self, ServiceError> {
        let http = PosHttp::new(PosProvider::Clover, config.timeout_secs)?;
        Ok(Self { config, http, credentials })
    }

    fn base_url(&self, environment: PosEnvironment) -> &str {
        match environment {
            PosEnvironment::Prod => &self.config.prod_base_url,
            PosEnvironment::Sandbox => &self.config.sandbox_base_url,
        }
    }

    /// Exchanges an OAuth authorization code for an access token, using the
    /// app-level client credentials from configuration.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, ServiceError> {
        let client_id = self.config.client_id.as_deref().ok_or_else(|| {
            ServiceError::Misconfigured("CLOVER_CLIENT_ID is not set".to_owned())
        })?;
        let client_secret = self.config.client_secret.as_ref().ok_or_else(|| {
            ServiceError::Misconfigured("CLOVER_CLIENT_SECRET is not set".to_owned())
        })?;

        let base_url = self.base_url(self.config.environment);
        let response = self
            .http
            .post_form(
                &format!("{base_url}/oauth/token"),
                &[
                    ("grant_type", "authorization_code"),
                    ("client_id", client_id),
                    ("client_secret", client_secret.expose_secret()),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                ],
            )
            .await?;

        let access_token =
            string_field(&response, &["access_token", "accessToken"]).ok_or_else(|| {
                ServiceError::UpstreamFailure {
                    provider: PROVIDER,
                    status: None,
                    body: format!("oauth response missing token: {response}"),
                }
            })?;
        let expires_in =
            crate::int_field(&response, &["expires_in", "expiresIn"]).unwrap_or(3600);

        Ok(TokenGrant { access_token, expires_in })
    }

    /// Pulls the merchant's full catalog and replaces the stored menu
    /// snapshot with its normalized form. Returns the new menu version.
    pub async fn sync_menu(
        &self,
        restaurant: &Restaurant,
        menus: &dyn MenuRepository,
    ) -> Result<i64, ServiceError> {
        if self.config.mock {
            return Err(ServiceError::Misconfigured(
                "clover mock enabled; disable CLOVER_MOCK to sync the menu".to_owned(),
            ));
        }

        let session = self.get_token(restaurant).await?;
        let items = self
            .fetch_all(
                &session,
                &format!("/v3/merchants/{}/items", session.merchant_ref),
                Some("categories,modifierGroups,modifierGroups.modifierOptions"),
            )
            .await?;
        if items.is_empty() {
            return Err(ServiceError::UpstreamFailure {
                provider: PROVIDER,
                status: None,
                body: "merchant catalog returned no items".to_owned(),
            });
        }

        let menu = normalize_catalog(&items);
        menu.check_integrity()?;
        let version = menus.replace(&restaurant.id, &menu).await?;
        info!(
            restaurant_id = %restaurant.id.0,
            version,
            items = menu.items.len(),
            modifier_groups = menu.modifier_groups.len(),
            "clover menu synced"
        );
        Ok(version)
    }

    async fn fetch_all(
        &self,
        session: &ProviderSession,
        path: &str,
        expand: Option<&str>,
    ) -> Result<Vec<Value>, ServiceError> {
        let mut results = Vec::new();
        let mut offset = 0usize;
        loop {
            let mut url =
                format!("{}{path}?limit={CATALOG_PAGE_SIZE}&offset={offset}", session.base_url);
            if let Some(expand) = expand {
                url.push_str(&format!("&expand={expand}"));
            }
            let page = self.http.get_json(&url, &session.token).await?;
            let batch = elements(&page);
            let batch_len = batch.len();
            results.extend(batch);
            if batch_len < CATALOG_PAGE_SIZE {
                return Ok(results);
            }
            offset += CATALOG_PAGE_SIZE;
        }
    }

    async fn post(
        &self,
        session: &ProviderSession,
        path: &str,
        body: &Value,
    ) -> Result<Value, ServiceError> {
        self.http
            .post_json(&format!("{}{path}", session.base_url), Some(&session.token), body)
            .await
    }
}

#[async_trait]
impl PosAdapter for CloverAdapter {
    fn provider(&self) -> PosProvider {
        PosProvider::Clover
    }

    async fn get_token(&self, restaurant: &Restaurant) -> Result<ProviderSession, ServiceError> {
        let credential = self
            .credentials
            .find(&restaurant.id, PosProvider::Clover)
            .await?
            .ok_or_else(|| {
                ServiceError::Misconfigured(format!(
                    "clover credentials not configured for restaurant {}",
                    restaurant.id.0
                ))
            })?;

        let base_url = self.base_url(credential.environment).to_owned();
        if self.config.mock {
            return Ok(ProviderSession {
                token: "mock-token".to_owned(),
                base_url,
                merchant_ref: credential.merchant_ref,
            });
        }

        if let Some(token) = credential.token_valid_for(TOKEN_SKEW_SECS) {
            return Ok(ProviderSession {
                token: token.to_owned(),
                base_url,
                merchant_ref: credential.merchant_ref.clone(),
            });
        }

        // No refresh grant exists for merchant tokens.
        Err(ServiceError::Misconfigured(format!(
            "clover access token expired for restaurant {}; re-authorize the merchant",
            restaurant.id.0
        )))
    }

    fn map_payload(
        &self,
        menu: &NormalizedMenu,
        draft: &DraftRecord,
    ) -> Result<MappedOrder, ServiceError> {
        let index = menu.index();
        let mut line_items = Vec::with_capacity(draft.draft.selections.len());

        for selection in &draft.draft.selections {
            let item = index.item(&selection.item_id).ok_or_else(|| {
                ServiceError::not_found("menu item", selection.item_id.clone())
            })?;
            let clover_item_id = item
                .provider_ids(PosProvider::Clover)
                .and_then(|ids| ids.item_id.as_deref())
                .ok_or_else(|| ServiceError::BadMapping {
                    provider: PROVIDER,
                    entity: "item",
                    id: selection.item_id.clone(),
                })?;

            let mut modifications = Vec::new();
            for modifier in &selection.modifiers {
                let group_id = index
                    .group(&modifier.group_id)
                    .and_then(|group| group.provider_ids(PosProvider::Clover))
                    .and_then(|ids| ids.modifier_group_id.as_deref())
                    .ok_or_else(|| ServiceError::BadMapping {
                        provider: PROVIDER,
                        entity: "modifier group",
                        id: modifier.group_id.clone(),
                    })?;
                for option_id in &modifier.option_ids {
                    let clover_option_id = index
                        .option(option_id)
                        .and_then(|option| option.provider_ids(PosProvider::Clover))
                        .and_then(|ids| ids.modifier_option_id.as_deref())
                        .ok_or_else(|| ServiceError::BadMapping {
                            provider: PROVIDER,
                            entity: "modifier option",
                            id: option_id.clone(),
                        })?;
                    modifications.push(json!({
                        "modifierGroupId": group_id,
                        "modifierOptionId": clover_option_id,
                    }));
                }
            }

            line_items.push(json!({
                "itemId": clover_item_id,
                "name": item.name,
                "quantity": selection.quantity,
                "modifications": modifications,
                "specialInstructions": selection.special_instructions,
            }));
        }

        let body = json!({
            "orderType": "TAKEOUT",
            "title": draft.draft.pickup_name,
            "note": draft.draft.notes,
            "phone": draft.draft.pickup_phone,
            "lineItems": line_items,
        });

        Ok(MappedOrder { body, local_subtotal_cents: draft.summary.subtotal_cents })
    }

    async fn price_order(
        &self,
        _restaurant: &Restaurant,
        mapped: &MappedOrder,
    ) -> Result<PricingOutcome, ServiceError> {
        let pricing_mode = if self.config.mock { "mock" } else { "local" };
        Ok(PricingOutcome {
            pricing_mode: pricing_mode.to_owned(),
            totals: OrderTotals::untaxed(mapped.local_subtotal_cents),
            raw: json!({}),
        })
    }

    async fn submit_order(
        &self,
        restaurant: &Restaurant,
        mapped: &MappedOrder,
    ) -> Result<SubmitResult, ServiceError> {
        if self.config.mock {
            return Ok(SubmitResult {
                provider_order_id: format!("mock-{}", Uuid::new_v4()),
                status: "SUBMITTED".to_owned(),
            });
        }

        let session = self.get_token(restaurant).await?;
        let orders_path = format!("/v3/merchants/{}/orders", session.merchant_ref);
        let created = self
            .post(
                &session,
                &orders_path,
                &json!({
                    "title": mapped.body["title"],
                    "note": mapped.body["note"],
                    "phone": mapped.body["phone"],
                }),
            )
            .await?;
        let order_id =
            string_field(&created, &["id", "orderId", "order_id"]).ok_or_else(|| {
                ServiceError::UpstreamFailure {
                    provider: PROVIDER,
                    status: None,
                    body: format!("order create response missing id: {created}"),
                }
            })?;

        let line_items = mapped.body["lineItems"].as_array().cloned().unwrap_or_default();
        for line_item in &line_items {
            let item_id = string_field(line_item, &["itemId"]).ok_or_else(|| {
                ServiceError::UpstreamFailure {
                    provider: PROVIDER,
                    status: None,
                    body: "mapped line item is missing its clover item id".to_owned(),
                }
            })?;
            let quantity = crate::int_field(line_item, &["quantity"]).unwrap_or(1).max(1);

            // The v3 API models quantity as repeated line items.
            for _ in 0..quantity {
                let created_line = self
                    .post(
                        &session,
                        &format!("{orders_path}/{order_id}/line_items"),
                        &json!({ "item": { "id": item_id } }),
                    )
                    .await?;
                let line_item_id = string_field(&created_line, &["id"]).ok_or_else(|| {
                    ServiceError::UpstreamFailure {
                        provider: PROVIDER,
                        status: None,
                        body: format!("line item response missing id: {created_line}"),
                    }
                })?;

                for modification in
                    line_item["modifications"].as_array().into_iter().flatten()
                {
                    let modifier_id = string_field(modification, &["modifierOptionId"])
                        .ok_or_else(|| ServiceError::UpstreamFailure {
                            provider: PROVIDER,
                            status: None,
                            body: "mapped modification is missing its clover option id"
                                .to_owned(),
                        })?;
                    self.post(
                        &session,
                        &format!("{orders_path}/{order_id}/line_items/{line_item_id}/modifications"),
                        &json!({ "modifier": { "id": modifier_id } }),
                    )
                    .await?;
                }
            }
        }

        info!(restaurant_id = %restaurant.id.0, order_id, "clover order submitted");
        Ok(SubmitResult { provider_order_id: order_id, status: "SUBMITTED".to_owned() })
    }
}

/// Unwraps Clover's `{ "elements": [...] }` list envelope; bare arrays pass
/// through unchanged.
fn elements(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(_) => value
            .get("elements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn price_cents(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().map(|f| f.round() as i64).unwrap_or(0),
        Some(Value::String(s)) => s.parse::<f64>().map(|f| f.round() as i64).unwrap_or(0),
        _ => 0,
    }
}

fn clover_external(
    item: Option<&str>,
    group: Option<&str>,
    option: Option<&str>,
) -> Option<ExternalIds> {
    Some(ExternalIds {
        toast: None,
        clover: Some(ProviderEntityIds {
            item_id: item.map(str::to_owned),
            modifier_group_id: group.map(str::to_owned),
            modifier_option_id: option.map(str::to_owned),
        }),
    })
}

fn normalize_group(raw: &Value, id: &str) -> ModifierGroup {
    let min = crate::int_field(raw, &["minRequired", "min"]).unwrap_or(0).max(0) as u32;
    let mut max = crate::int_field(raw, &["maxRequired", "max"]).unwrap_or(min as i64).max(0) as u32;
    if max == 0 && min > 0 {
        max = min;
    }
    ModifierGroup {
        id: id.to_owned(),
        name: string_field(raw, &["name"]).unwrap_or_else(|| "Modifier".to_owned()),
        required_min: min,
        required_max: max.max(min),
        option_ids: Vec::new(),
        external_ids: clover_external(None, Some(id), None),
    }
}

fn normalize_option(raw: &Value, id: &str) -> ModifierOption {
    ModifierOption {
        id: id.to_owned(),
        name: string_field(raw, &["name"]).unwrap_or_else(|| "Option".to_owned()),
        price_delta_cents: price_cents(raw.get("price")),
        external_ids: clover_external(None, None, Some(id)),
    }
}

/// Folds the raw Clover item list (with expanded categories and modifier
/// groups) into the normalized menu shape. Items without an id or name are
/// skipped; uncategorized items land in a synthetic category.
pub fn normalize_catalog(raw_items: &[Value]) -> NormalizedMenu {
    let mut categories: BTreeMap<String, MenuCategory> = BTreeMap::new();
    let mut groups: BTreeMap<String, ModifierGroup> = BTreeMap::new();
    let mut options: BTreeMap<String, ModifierOption> = BTreeMap::new();
    let mut items = Vec::new();

    for raw in raw_items {
        let (Some(id), Some(name)) =
            (string_field(raw, &["id"]), string_field(raw, &["name"]))
        else {
            continue;
        };

        let raw_categories = raw.get("categories").map(elements).unwrap_or_default();
        if raw_categories.is_empty() {
            categories
                .entry("cat-uncategorized".to_owned())
                .or_insert_with(|| MenuCategory {
                    id: "cat-uncategorized".to_owned(),
                    name: "Uncategorized".to_owned(),
                    item_ids: Vec::new(),
                })
                .item_ids
                .push(id.clone());
        } else {
            for raw_category in &raw_categories {
                let Some(category_id) = string_field(raw_category, &["id"]) else { continue };
                categories
                    .entry(category_id.clone())
                    .or_insert_with(|| MenuCategory {
                        id: category_id,
                        name: string_field(raw_category, &["name"])
                            .unwrap_or_else(|| "Category".to_owned()),
                        item_ids: Vec::new(),
                    })
                    .item_ids
                    .push(id.clone());
            }
        }

        let mut modifier_group_ids = Vec::new();
        for raw_group in raw.get("modifierGroups").map(elements).unwrap_or_default() {
            let Some(group_id) = string_field(&raw_group, &["id"]) else { continue };
            if !modifier_group_ids.contains(&group_id) {
                modifier_group_ids.push(group_id.clone());
            }
            let group = groups
                .entry(group_id.clone())
                .or_insert_with(|| normalize_group(&raw_group, &group_id));

            for raw_option in raw_group.get("modifierOptions").map(elements).unwrap_or_default()
            {
                let Some(option_id) = string_field(&raw_option, &["id"]) else { continue };
                options
                    .entry(option_id.clone())
                    .or_insert_with(|| normalize_option(&raw_option, &option_id));
                if !group.option_ids.contains(&option_id) {
                    group.option_ids.push(option_id);
                }
            }
        }

        items.push(MenuItem {
            id: id.clone(),
            name,
            price_cents: price_cents(raw.get("price")),
            description: string_field(raw, &["description"]),
            modifier_group_ids,
            synonyms: Vec::new(),
            external_ids: clover_external(Some(&id), None, None),
        });
    }

    for category in categories.values_mut() {
        category.item_ids.dedup();
    }

    NormalizedMenu {
        categories: categories.into_values().collect(),
        items,
        modifier_groups: groups.into_values().collect(),
        modifier_options: options.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use serde_json::json;

    use orderline_core::{
        build_draft_summary, CloverConfig, DraftOrder, DraftRecord, PosEnvironment, PosProvider,
        ProviderCredential, Restaurant, RestaurantId, RestaurantStatus, Selection, ServiceError,
    };
    use orderline_db::repositories::{CredentialRepository, RepositoryError};
    use orderline_db::sample_menu;

    use super::{normalize_catalog, CloverAdapter};
    use crate::PosAdapter;

    fn clover_config(mock: bool) -> CloverConfig {
        CloverConfig {
            client_id: None,
            client_secret: None,
            environment: PosEnvironment::Sandbox,
            sandbox_base_url: "http://localhost".to_owned(),
            prod_base_url: "http://localhost".to_owned(),
            mock,
            timeout_secs: 1,
        }
    }

    fn restaurant() -> Restaurant {
        Restaurant {
            id: RestaurantId("rest-1".to_owned()),
            name: "Sample Diner".to_owned(),
            phone_number: "+15551234567".to_owned(),
            timezone: "America/New_York".to_owned(),
            status: RestaurantStatus::Active,
            pos_provider: "clover".to_owned(),
        }
    }

    fn credential_expiring_in(secs: i64) -> ProviderCredential {
        ProviderCredential {
            restaurant_id: RestaurantId("rest-1".to_owned()),
            provider: PosProvider::Clover,
            merchant_ref: "M123".to_owned(),
            client_id: "client".to_owned(),
            client_secret: SecretString::from("secret"),
            environment: PosEnvironment::Sandbox,
            access_token: Some("cached-token".to_owned()),
            token_expires_at: Some(Utc::now() + Duration::seconds(secs)),
        }
    }

    #[tokio::test]
    async fn cached_token_is_reused_while_it_has_headroom() {
        let adapter = CloverAdapter::new(
            clover_config(false),
            Arc::new(StaticCredential(credential_expiring_in(3600))),
        )
        .expect("adapter");

        let session = adapter.get_token(&restaurant()).await.expect("session");
        assert_eq!(session.token, "cached-token");
        assert_eq!(session.merchant_ref, "M123");
    }

    #[tokio::test]
    async fn token_inside_the_skew_window_requires_reauthorization() {
        let adapter = CloverAdapter::new(
            clover_config(false),
            Arc::new(StaticCredential(credential_expiring_in(30))),
        )
        .expect("adapter");

        let error = adapter.get_token(&restaurant()).await.expect_err("no refresh grant");
        assert!(matches!(error, ServiceError::Misconfigured(_)), "unexpected: {error}");
    }

    #[tokio::test]
    async fn mock_mode_never_touches_stored_tokens() {
        let adapter = CloverAdapter::new(
            clover_config(true),
            Arc::new(StaticCredential(credential_expiring_in(-3600))),
        )
        .expect("adapter");

        let session = adapter.get_token(&restaurant()).await.expect("session");
        assert_eq!(session.token, "mock-token");
    }

    #[test]
    fn catalog_normalization_unwraps_envelopes_and_maps_ids() {
        let raw = vec![json!({
            "id": "IT1",
            "name": "Burrito",
            "price": 1050,
            "categories": { "elements": [ { "id": "C1", "name": "Mains" } ] },
            "modifierGroups": { "elements": [ {
                "id": "G1",
                "name": "Salsa",
                "minRequired": 1,
                "maxRequired": 0,
                "modifierOptions": { "elements": [
                    { "id": "O1", "name": "Mild", "price": 0 },
                    { "id": "O2", "name": "Hot", "price": "50" }
                ] }
            } ] }
        })];

        let menu = normalize_catalog(&raw);
        menu.check_integrity().expect("integrity");

        assert_eq!(menu.categories[0].item_ids, vec!["IT1"]);
        assert_eq!(menu.items[0].price_cents, 1050);
        assert_eq!(
            menu.items[0].provider_ids(orderline_core::PosProvider::Clover).unwrap().item_id,
            Some("IT1".to_owned())
        );

        let group = &menu.modifier_groups[0];
        // maxRequired of 0 with a nonzero minimum collapses to exactly-min.
        assert_eq!((group.required_min, group.required_max), (1, 1));
        assert_eq!(group.option_ids, vec!["O1", "O2"]);
        assert_eq!(menu.modifier_options.iter().find(|o| o.id == "O2").unwrap().price_delta_cents, 50);
    }

    #[test]
    fn catalog_normalization_buckets_uncategorized_items() {
        let raw = vec![json!({ "id": "IT9", "name": "Mystery", "price": 100 })];
        let menu = normalize_catalog(&raw);
        assert_eq!(menu.categories[0].id, "cat-uncategorized");
        assert_eq!(menu.categories[0].item_ids, vec!["IT9"]);
    }

    #[test]
    fn unmapped_item_fails_clover_mapping() {
        let draft = DraftOrder {
            selections: vec![Selection {
                item_id: orderline_db::fixtures::ITEM_WATER.to_owned(),
                quantity: 1,
                modifiers: Vec::new(),
                special_instructions: None,
            }],
            notes: None,
            pickup_name: None,
            pickup_phone: None,
        };
        let summary = build_draft_summary(&sample_menu(), &draft).expect("valid draft");
        let record = DraftRecord { draft, summary };

        let adapter =
            CloverAdapter::new(clover_config(true), Arc::new(NoCredentials)).expect("adapter");

        let error = adapter
            .map_payload(&sample_menu(), &record)
            .expect_err("water has no clover mapping");
        assert!(matches!(
            error,
            ServiceError::BadMapping { provider: "clover", entity: "item", .. }
        ));
    }

    struct NoCredentials;

    #[async_trait::async_trait]
    impl CredentialRepository for NoCredentials {
        async fn find(
            &self,
            _restaurant_id: &RestaurantId,
            _provider: PosProvider,
        ) -> Result<Option<ProviderCredential>, RepositoryError> {
            Ok(None)
        }

        async fn upsert(&self, _credential: &ProviderCredential) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn update_token(
            &self,
            _restaurant_id: &RestaurantId,
            _provider: PosProvider,
            _access_token: &str,
            _expires_at: chrono::DateTime<chrono::Utc>,
        ) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    struct StaticCredential(ProviderCredential);

    #[async_trait::async_trait]
    impl CredentialRepository for StaticCredential {
        async fn find(
            &self,
            _restaurant_id: &RestaurantId,
            _provider: PosProvider,
        ) -> Result<Option<ProviderCredential>, RepositoryError> {
            Ok(Some(self.0.clone()))
        }

        async fn upsert(&self, _credential: &ProviderCredential) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn update_token(
            &self,
            _restaurant_id: &RestaurantId,
            _provider: PosProvider,
            _access_token: &str,
            _expires_at: chrono::DateTime<chrono::Utc>,
        ) -> Result<(), RepositoryError> {
            Ok(())
        }
    }
}
