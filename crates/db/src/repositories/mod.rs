use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use orderline_core::{
    Call, CallId, MenuSnapshot, NormalizedMenu, Order, OrderId, PosProvider, PricingOutcome,
    ProviderCredential, Restaurant, RestaurantId, ServiceError,
};

pub mod call;
pub mod credential;
pub mod menu;
pub mod order;
pub mod restaurant;

pub use call::SqlCallRepository;
pub use credential::SqlCredentialRepository;
pub use menu::SqlMenuRepository;
pub use order::SqlOrderRepository;
pub use restaurant::SqlRestaurantRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// True when the underlying failure was a uniqueness-constraint
    /// violation. The order pipeline relies on this to turn a lost
    /// idempotency-key race into a Conflict instead of a storage failure.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => db.message().contains("UNIQUE constraint"),
            _ => false,
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        ServiceError::Storage(error.to_string())
    }
}

#[async_trait]
pub trait RestaurantRepository: Send + Sync {
    async fn find_by_id(&self, id: &RestaurantId) -> Result<Option<Restaurant>, RepositoryError>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Restaurant>, RepositoryError>;
    async fn insert(&self, restaurant: &Restaurant) -> Result<(), RepositoryError>;
    /// Used when an OAuth connection flips the configured backend.
    async fn set_provider(
        &self,
        id: &RestaurantId,
        provider: PosProvider,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn find_for_restaurant(
        &self,
        restaurant_id: &RestaurantId,
    ) -> Result<Option<MenuSnapshot>, RepositoryError>;
    /// Wholesale snapshot replacement: swaps the JSON, recomputes the
    /// content hash, and bumps `version` in one statement. Returns the new
    /// version.
    async fn replace(
        &self,
        restaurant_id: &RestaurantId,
        menu: &NormalizedMenu,
    ) -> Result<i64, RepositoryError>;
}

#[async_trait]
pub trait CallRepository: Send + Sync {
    async fn find_by_id(&self, id: &CallId) -> Result<Option<Call>, RepositoryError>;
    async fn insert(&self, call: &Call) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn find_by_client_order_id(
        &self,
        client_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError>;
    async fn insert_draft(&self, order: &Order) -> Result<(), RepositoryError>;
    async fn set_priced(
        &self,
        id: &OrderId,
        outcome: &PricingOutcome,
    ) -> Result<(), RepositoryError>;
    async fn set_client_order_id(
        &self,
        id: &OrderId,
        client_order_id: &str,
    ) -> Result<(), RepositoryError>;
    async fn set_confirmed(
        &self,
        id: &OrderId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find(
        &self,
        restaurant_id: &RestaurantId,
        provider: PosProvider,
    ) -> Result<Option<ProviderCredential>, RepositoryError>;
    async fn upsert(&self, credential: &ProviderCredential) -> Result<(), RepositoryError>;
    /// Token refresh write-back. Later writers win, which is acceptable for
    /// bearer tokens.
    async fn update_token(
        &self,
        restaurant_id: &RestaurantId,
        provider: PosProvider,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}
