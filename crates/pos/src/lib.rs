//! POS provider adapters.
//!
//! Toast and Clover each implement the [`PosAdapter`] contract: token
//! acquisition with expiry-aware reuse, translation of a normalized menu
//! plus draft into the provider's payload shape, and the provider-specific
//! price/submit calls. The order pipeline depends only on this contract and
//! selects an adapter by the restaurant's configured `pos_provider` value.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use orderline_core::{
    AppConfig, DraftRecord, NormalizedMenu, PosProvider, PricingOutcome, Restaurant, ServiceError,
};
use orderline_db::repositories::CredentialRepository;

pub mod clover;
pub mod http;
pub mod toast;

pub use clover::CloverAdapter;
pub use toast::ToastAdapter;

/// Resolved credentials for one provider call: a usable bearer token, the
/// environment-selected base URL, and the provider's merchant/restaurant id.
#[derive(Clone, Debug)]
pub struct ProviderSession {
    pub token: String,
    pub base_url: String,
    pub merchant_ref: String,
}

/// A draft translated into one provider's payload shape, plus the locally
/// computed subtotal used when pricing is mocked or computed off-network.
#[derive(Clone, Debug)]
pub struct MappedOrder {
    pub body: Value,
    pub local_subtotal_cents: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitResult {
    pub provider_order_id: String,
    pub status: String,
}

#[async_trait]
pub trait PosAdapter: Send + Sync {
    fn provider(&self) -> PosProvider;

    async fn get_token(&self, restaurant: &Restaurant) -> Result<ProviderSession, ServiceError>;

    /// Must fail with `BadMapping` when the menu lacks the provider id for
    /// a selected entity. Silently dropping a line is never acceptable.
    fn map_payload(
        &self,
        menu: &NormalizedMenu,
        draft: &DraftRecord,
    ) -> Result<MappedOrder, ServiceError>;

    async fn price_order(
        &self,
        restaurant: &Restaurant,
        mapped: &MappedOrder,
    ) -> Result<PricingOutcome, ServiceError>;

    async fn submit_order(
        &self,
        restaurant: &Restaurant,
        mapped: &MappedOrder,
    ) -> Result<SubmitResult, ServiceError>;
}

/// Owns one adapter per supported provider and dispatches by the
/// restaurant's configured value. An unrecognized or empty `pos_provider`
/// is a hard configuration error, never silently defaulted.
pub struct PosRegistry {
    toast: ToastAdapter,
    clover: CloverAdapter,
}

impl PosRegistry {
    pub fn new(
        config: &AppConfig,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            toast: ToastAdapter::new(config.toast.clone(), Arc::clone(&credentials))?,
            clover: CloverAdapter::new(config.clover.clone(), credentials)?,
        })
    }

    pub fn adapter_for(&self, restaurant: &Restaurant) -> Result<&dyn PosAdapter, ServiceError> {
        match restaurant.provider()? {
            PosProvider::Toast => Ok(&self.toast),
            PosProvider::Clover => Ok(&self.clover),
        }
    }

    pub fn clover(&self) -> &CloverAdapter {
        &self.clover
    }
}

pub(crate) fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

pub(crate) fn int_field(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| value.get(key)).and_then(Value::as_i64)
}
