//! Tenant resolution and inbound call registration.
//!
//! Every pipeline operation starts here: a restaurant is resolved by id or
//! by its unique phone number, must be active before any order work
//! proceeds, and must have a menu snapshot that passes integrity checks
//! before that menu is served.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use orderline_core::{Call, CallId, MenuSnapshot, Restaurant, RestaurantId, ServiceError};
use orderline_db::repositories::{CallRepository, MenuRepository, RestaurantRepository};

#[derive(Clone)]
pub struct TenantResolver {
    restaurants: Arc<dyn RestaurantRepository>,
    menus: Arc<dyn MenuRepository>,
}

impl TenantResolver {
    pub fn new(
        restaurants: Arc<dyn RestaurantRepository>,
        menus: Arc<dyn MenuRepository>,
    ) -> Self {
        Self { restaurants, menus }
    }

    /// Maps an inbound dialed number to its restaurant.
    pub async fn resolve_by_phone(&self, phone: &str) -> Result<Restaurant, ServiceError> {
        self.restaurants
            .find_by_phone(phone)
            .await?
            .ok_or_else(|| ServiceError::not_found("restaurant", phone))
    }

    /// Loads a restaurant and refuses inactive tenants.
    pub async fn require_active(&self, id: &RestaurantId) -> Result<Restaurant, ServiceError> {
        let restaurant = self
            .restaurants
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("restaurant", id.0.clone()))?;
        if !restaurant.is_active() {
            return Err(ServiceError::Forbidden { id: restaurant.id.0 });
        }
        Ok(restaurant)
    }

    /// Loads the restaurant's menu snapshot, refusing to serve one that
    /// fails integrity checks.
    pub async fn require_menu(
        &self,
        restaurant_id: &RestaurantId,
    ) -> Result<MenuSnapshot, ServiceError> {
        let snapshot = self
            .menus
            .find_for_restaurant(restaurant_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("menu", restaurant_id.0.clone()))?;
        snapshot.menu.check_integrity()?;
        Ok(snapshot)
    }
}

/// Creates call records for inbound phone legs. Calls are only ever created
/// here; the pipeline treats them as read-only ownership evidence.
#[derive(Clone)]
pub struct CallRegistry {
    tenants: TenantResolver,
    calls: Arc<dyn CallRepository>,
}

impl CallRegistry {
    pub fn new(tenants: TenantResolver, calls: Arc<dyn CallRepository>) -> Self {
        Self { tenants, calls }
    }

    /// Resolves the dialed number to its restaurant and records the call leg.
    pub async fn register_inbound(
        &self,
        from_number: &str,
        to_number: &str,
    ) -> Result<(Restaurant, Call), ServiceError> {
        let restaurant = self.tenants.resolve_by_phone(to_number).await?;
        let call = Call {
            id: CallId(Uuid::new_v4().to_string()),
            restaurant_id: restaurant.id.clone(),
            from_number: from_number.to_owned(),
            to_number: to_number.to_owned(),
            started_at: Utc::now(),
        };
        self.calls.insert(&call).await?;
        info!(call_id = %call.id.0, restaurant_id = %restaurant.id.0, "inbound call registered");
        Ok((restaurant, call))
    }
}
