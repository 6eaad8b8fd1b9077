//! Toast adapter: machine-client login, order pricing, and order submission
//! against the Toast orders API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use orderline_core::{
    DraftRecord, NormalizedMenu, OrderTotals, PosEnvironment, PosProvider, PricingOutcome,
    Restaurant, ServiceError, ToastConfig,
};
use orderline_db::repositories::CredentialRepository;

use crate::http::PosHttp;
use crate::{int_field, string_field, MappedOrder, PosAdapter, ProviderSession, SubmitResult};

const PROVIDER: &str = "toast";
const LOGIN_PATH: &str = "/authentication/v1/authentication/login";
const PRICE_PATH: &str = "/orders/v2/prices";
const SUBMIT_PATH: &str = "/orders/v2/orders";
/// Remaining validity below this threshold forces a fresh login.
const TOKEN_SKEW_SECS: i64 = 60;
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

pub struct ToastAdapter {
    config: ToastConfig,
    http: PosHttp,
    credentials: Arc<dyn CredentialRepository>,
}

impl ToastAdapter {
    pub fn new(
        config: ToastConfig,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Result<Self, ServiceError> {
        let http = PosHttp::new(PosProvider::Toast, config.timeout_secs)?;
        Ok(Self { config, http, credentials })
    }

    fn base_url(&self, environment: PosEnvironment) -> &str {
        match environment {
            PosEnvironment::Prod => &self.config.prod_base_url,
            PosEnvironment::Sandbox => &self.config.sandbox_base_url,
        }
    }

    /// Injects the merchant guid the orders API requires on every payload.
    fn with_restaurant_guid(body: &Value, merchant_ref: &str) -> Value {
        let mut body = body.clone();
        if let Some(object) = body.as_object_mut() {
            object.insert("restaurantGuid".to_owned(), Value::String(merchant_ref.to_owned()));
        }
        body
    }
}

#[async_trait]
impl PosAdapter for ToastAdapter {
    fn provider(&self) -> PosProvider {
        PosProvider::Toast
    }

    async fn get_token(&self, restaurant: &Restaurant) -> Result<ProviderSession, ServiceError> {
        let credential = self
            .credentials
            .find(&restaurant.id, PosProvider::Toast)
            .await?
            .ok_or_else(|| {
                ServiceError::Misconfigured(format!(
                    "toast credentials not configured for restaurant {}",
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

        let login = json!({
            "clientId": credential.client_id,
            "clientSecret": credential.client_secret.expose_secret(),
            "userAccessType": "Restaurant",
            "restaurantGuid": credential.merchant_ref,
        });
        let response =
            self.http.post_json(&format!("{base_url}{LOGIN_PATH}"), None, &login).await?;

        let token =
            string_field(&response, &["accessToken", "access_token"]).ok_or_else(|| {
                ServiceError::UpstreamFailure {
                    provider: PROVIDER,
                    status: None,
                    body: format!("auth response missing token: {response}"),
                }
            })?;
        let expires_in =
            int_field(&response, &["expiresIn", "expires_in"]).unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let expires_at = Utc::now() + Duration::seconds(expires_in);

        self.credentials
            .update_token(&restaurant.id, PosProvider::Toast, &token, expires_at)
            .await?;
        info!(restaurant_id = %restaurant.id.0, expires_in, "toast token refreshed");

        Ok(ProviderSession { token, base_url, merchant_ref: credential.merchant_ref })
    }

    fn map_payload(
        &self,
        menu: &NormalizedMenu,
        draft: &DraftRecord,
    ) -> Result<MappedOrder, ServiceError> {
        let index = menu.index();
        let mut items = Vec::with_capacity(draft.draft.selections.len());

        for selection in &draft.draft.selections {
            let item = index.item(&selection.item_id).ok_or_else(|| {
                ServiceError::not_found("menu item", selection.item_id.clone())
            })?;
            let item_guid = item
                .provider_ids(PosProvider::Toast)
                .and_then(|ids| ids.item_id.as_deref())
                .ok_or_else(|| ServiceError::BadMapping {
                    provider: PROVIDER,
                    entity: "item",
                    id: selection.item_id.clone(),
                })?;

            let mut modifiers = Vec::new();
            for modifier in &selection.modifiers {
                let group_guid = index
                    .group(&modifier.group_id)
                    .and_then(|group| group.provider_ids(PosProvider::Toast))
                    .and_then(|ids| ids.modifier_group_id.as_deref())
                    .ok_or_else(|| ServiceError::BadMapping {
                        provider: PROVIDER,
                        entity: "modifier group",
                        id: modifier.group_id.clone(),
                    })?;
                for option_id in &modifier.option_ids {
                    let option_guid = index
                        .option(option_id)
                        .and_then(|option| option.provider_ids(PosProvider::Toast))
                        .and_then(|ids| ids.modifier_option_id.as_deref())
                        .ok_or_else(|| ServiceError::BadMapping {
                            provider: PROVIDER,
                            entity: "modifier option",
                            id: option_id.clone(),
                        })?;
                    modifiers.push(json!({
                        "modifierGroupGuid": group_guid,
                        "modifierOptionGuid": option_guid,
                    }));
                }
            }

            items.push(json!({
                "itemGuid": item_guid,
                "name": item.name,
                "quantity": selection.quantity,
                "modifiers": modifiers,
                "specialInstructions": selection.special_instructions,
            }));
        }

        let body = json!({
            "source": "PHONE",
            "diningOption": "TAKE_OUT",
            "customer": {
                "name": draft.draft.pickup_name,
                "phone": draft.draft.pickup_phone,
            },
            "items": items,
            "notes": draft.draft.notes,
        });

        Ok(MappedOrder { body, local_subtotal_cents: draft.summary.subtotal_cents })
    }

    async fn price_order(
        &self,
        restaurant: &Restaurant,
        mapped: &MappedOrder,
    ) -> Result<PricingOutcome, ServiceError> {
        if self.config.mock {
            return Ok(PricingOutcome {
                pricing_mode: "mock".to_owned(),
                totals: OrderTotals::untaxed(mapped.local_subtotal_cents),
                raw: json!({}),
            });
        }

        let session = self.get_token(restaurant).await?;
        let body = Self::with_restaurant_guid(&mapped.body, &session.merchant_ref);
        let response = self
            .http
            .post_json(
                &format!("{}{PRICE_PATH}", session.base_url),
                Some(&session.token),
                &body,
            )
            .await?;

        let totals = response.get("totals").and_then(parse_totals).ok_or_else(|| {
            ServiceError::UpstreamFailure {
                provider: PROVIDER,
                status: None,
                body: format!("pricing response missing totals: {response}"),
            }
        })?;

        Ok(PricingOutcome { pricing_mode: "provider".to_owned(), totals, raw: response })
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
        let body = Self::with_restaurant_guid(&mapped.body, &session.merchant_ref);
        let response = self
            .http
            .post_json(
                &format!("{}{SUBMIT_PATH}", session.base_url),
                Some(&session.token),
                &body,
            )
            .await?;

        let provider_order_id =
            string_field(&response, &["orderGuid", "orderId", "order_id", "id"]).ok_or_else(
                || ServiceError::UpstreamFailure {
                    provider: PROVIDER,
                    status: None,
                    body: format!("submit response missing order id: {response}"),
                },
            )?;
        let status =
            string_field(&response, &["status"]).unwrap_or_else(|| "SUBMITTED".to_owned());

        info!(restaurant_id = %restaurant.id.0, provider_order_id, "toast order submitted");
        Ok(SubmitResult { provider_order_id, status })
    }
}

fn parse_totals(raw: &Value) -> Option<OrderTotals> {
    Some(OrderTotals {
        subtotal_cents: int_field(raw, &["subtotalCents", "subtotal_cents"])?,
        tax_cents: int_field(raw, &["taxCents", "tax_cents"])?,
        total_cents: int_field(raw, &["totalCents", "total_cents"])?,
    })
}
