//! The order lifecycle: draft → priced → confirmed.
//!
//! The pipeline is request-scoped and stateless between calls; all durable
//! state lives in the store. Submission correctness under concurrent
//! retries rests on two things rather than locks: the storage-level
//! uniqueness of `client_order_id`, and forward-only status transitions
//! that turn late duplicate writes into no-ops.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use chrono::Utc;
use orderline_core::{
    build_draft_summary, search_menu, CallId, DraftOrder, DraftRecord, MenuSnapshot, Order,
    OrderId, OrderStatus, Restaurant, RestaurantId, ServiceError, SubmitOutcome,
};
use orderline_db::repositories::{CallRepository, OrderRepository};
use orderline_pos::PosRegistry;

use crate::tenant::TenantResolver;

/// One search result, expanded with everything the caller needs to place
/// the item without a second lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub item_id: String,
    pub name: String,
    pub price_cents: i64,
    pub description: Option<String>,
    pub modifier_groups: Vec<SearchHitGroup>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHitGroup {
    pub group_id: String,
    pub name: String,
    pub required_min: u32,
    pub required_max: u32,
    pub options: Vec<SearchHitOption>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHitOption {
    pub option_id: String,
    pub name: String,
    pub price_delta_cents: i64,
}

pub struct OrderPipeline {
    tenants: TenantResolver,
    calls: Arc<dyn CallRepository>,
    orders: Arc<dyn OrderRepository>,
    registry: Arc<PosRegistry>,
}

impl OrderPipeline {
    pub fn new(
        tenants: TenantResolver,
        calls: Arc<dyn CallRepository>,
        orders: Arc<dyn OrderRepository>,
        registry: Arc<PosRegistry>,
    ) -> Self {
        Self { tenants, calls, orders, registry }
    }

    pub async fn lookup_menu(
        &self,
        restaurant_id: &RestaurantId,
    ) -> Result<MenuSnapshot, ServiceError> {
        self.tenants.require_active(restaurant_id).await?;
        self.tenants.require_menu(restaurant_id).await
    }

    pub async fn search_menu(
        &self,
        restaurant_id: &RestaurantId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        self.tenants.require_active(restaurant_id).await?;
        let snapshot = self.tenants.require_menu(restaurant_id).await?;
        let index = snapshot.menu.index();
        Ok(search_menu(&snapshot.menu, query, limit)
            .into_iter()
            .map(|item| SearchHit {
                item_id: item.id.clone(),
                name: item.name.clone(),
                price_cents: item.price_cents,
                description: item.description.clone(),
                modifier_groups: item
                    .modifier_group_ids
                    .iter()
                    .filter_map(|group_id| index.group(group_id))
                    .map(|group| SearchHitGroup {
                        group_id: group.id.clone(),
                        name: group.name.clone(),
                        required_min: group.required_min,
                        required_max: group.required_max,
                        options: group
                            .option_ids
                            .iter()
                            .filter_map(|option_id| index.option(option_id))
                            .map(|option| SearchHitOption {
                                option_id: option.id.clone(),
                                name: option.name.clone(),
                                price_delta_cents: option.price_delta_cents,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect())
    }

    /// Validates the draft against the menu and persists it. The call must
    /// belong to the restaurant; a reused idempotency key is a conflict.
    pub async fn create_draft(
        &self,
        restaurant_id: &RestaurantId,
        call_id: &CallId,
        draft: DraftOrder,
        client_order_id: Option<String>,
    ) -> Result<Order, ServiceError> {
        let restaurant = self.tenants.require_active(restaurant_id).await?;

        let call = self
            .calls
            .find_by_id(call_id)
            .await?
            .filter(|call| call.restaurant_id == restaurant.id)
            .ok_or_else(|| ServiceError::not_found("call", call_id.0.clone()))?;

        let snapshot = self.tenants.require_menu(restaurant_id).await?;
        let summary = build_draft_summary(&snapshot.menu, &draft)?;

        let now = Utc::now();
        let order = Order {
            id: OrderId(Uuid::new_v4().to_string()),
            restaurant_id: restaurant.id.clone(),
            call_id: Some(call.id.clone()),
            status: OrderStatus::Draft,
            draft: DraftRecord { draft, summary },
            priced: None,
            provider_order_id: None,
            client_order_id: client_order_id
                .unwrap_or_else(|| format!("order-{}", Uuid::new_v4())),
            created_at: now,
            updated_at: now,
        };

        if let Err(error) = self.orders.insert_draft(&order).await {
            if error.is_unique_violation() {
                return Err(ServiceError::conflict(format!(
                    "client_order_id `{}` is already bound to another order",
                    order.client_order_id
                )));
            }
            return Err(error.into());
        }

        info!(
            order_id = %order.id.0,
            restaurant_id = %restaurant.id.0,
            subtotal_cents = order.draft.summary.subtotal_cents,
            "draft order created"
        );
        Ok(order)
    }

    /// Prices the draft through the configured provider and flips the order
    /// to `priced`. Re-pricing stays legal until the order confirms.
    pub async fn price(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
    ) -> Result<Order, ServiceError> {
        let restaurant = self.tenants.require_active(restaurant_id).await?;
        let mut order = self.load_owned(&restaurant, order_id).await?;
        if order.draft.draft.selections.is_empty() {
            return Err(ServiceError::not_found("order draft", order_id.0.clone()));
        }
        order.transition_to(OrderStatus::Priced)?;

        let snapshot = self.tenants.require_menu(restaurant_id).await?;
        let adapter = self.registry.adapter_for(&restaurant)?;
        let mapped = adapter.map_payload(&snapshot.menu, &order.draft)?;
        let outcome = adapter.price_order(&restaurant, &mapped).await?;

        self.orders.set_priced(&order.id, &outcome).await?;
        info!(
            order_id = %order.id.0,
            pricing_mode = %outcome.pricing_mode,
            total_cents = outcome.totals.total_cents,
            "order priced"
        );
        order.priced = Some(outcome);
        Ok(order)
    }

    /// Idempotent submission. Safe to call arbitrarily many times with the
    /// same `client_order_id`; the provider network sees at most one
    /// submission per key.
    pub async fn submit(
        &self,
        restaurant_id: &RestaurantId,
        order_id: &OrderId,
        client_order_id: &str,
    ) -> Result<SubmitOutcome, ServiceError> {
        let restaurant = self.tenants.require_active(restaurant_id).await?;

        if let Some(existing) = self.orders.find_by_client_order_id(client_order_id).await? {
            // A key that already went through wins regardless of which order
            // id the retry names; only an unsettled key is a binding conflict.
            if let Some(provider_order_id) = existing.provider_order_id {
                return Ok(SubmitOutcome {
                    provider_order_id,
                    already_submitted: true,
                    confirmation: "order was already submitted".to_owned(),
                });
            }
            if existing.id != *order_id {
                return Err(ServiceError::conflict(format!(
                    "client_order_id `{client_order_id}` is already bound to another order"
                )));
            }
        }

        let mut order = self.load_owned(&restaurant, order_id).await?;

        // Submitted earlier under a different key; never resubmit.
        if let Some(provider_order_id) = order.provider_order_id.clone() {
            return Ok(SubmitOutcome {
                provider_order_id,
                already_submitted: true,
                confirmation: "order was already submitted".to_owned(),
            });
        }
        order.transition_to(OrderStatus::Confirmed)?;

        if order.client_order_id != client_order_id {
            if let Err(error) =
                self.orders.set_client_order_id(&order.id, client_order_id).await
            {
                if error.is_unique_violation() {
                    // Lost the race to another writer claiming this key.
                    return Err(ServiceError::conflict(format!(
                        "client_order_id `{client_order_id}` is already bound to another order"
                    )));
                }
                return Err(error.into());
            }
        }

        if order.draft.draft.selections.is_empty() {
            return Err(ServiceError::not_found("order draft", order_id.0.clone()));
        }

        let snapshot = self.tenants.require_menu(restaurant_id).await?;
        let adapter = self.registry.adapter_for(&restaurant)?;
        let mapped = adapter.map_payload(&snapshot.menu, &order.draft)?;
        let result = adapter.submit_order(&restaurant, &mapped).await?;

        self.orders.set_confirmed(&order.id, &result.provider_order_id).await?;
        info!(
            order_id = %order.id.0,
            provider_order_id = %result.provider_order_id,
            provider = %adapter.provider(),
            "order submitted"
        );

        Ok(SubmitOutcome {
            provider_order_id: result.provider_order_id,
            already_submitted: false,
            confirmation: format!("order submitted with status {}", result.status),
        })
    }

    async fn load_owned(
        &self,
        restaurant: &Restaurant,
        order_id: &OrderId,
    ) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .filter(|order| order.restaurant_id == restaurant.id)
            .ok_or_else(|| {
                warn!(order_id = %order_id.0, restaurant_id = %restaurant.id.0, "order lookup missed");
                ServiceError::not_found("order", order_id.0.clone())
            })?;
        Ok(order)
    }
}
