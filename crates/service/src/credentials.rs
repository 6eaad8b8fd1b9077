//! Credential administration: OAuth callback ingestion and admin seeding.

use std::sync::Arc;

use chrono::{Duration, Utc};
use secrecy::SecretString;
use tracing::info;

use orderline_core::{
    CloverConfig, PosEnvironment, PosProvider, ProviderCredential, RestaurantId, ServiceError,
};
use orderline_db::repositories::{CredentialRepository, RestaurantRepository};
use orderline_pos::PosRegistry;

/// Fields accepted from an OAuth callback or an admin seeding request.
/// Secrets only ever travel inward; nothing here is echoed back out.
pub struct CredentialUpdate {
    pub provider: PosProvider,
    pub merchant_ref: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub environment: PosEnvironment,
    pub access_token: Option<String>,
    pub token_expires_at: Option<chrono::DateTime<Utc>>,
}

pub struct CredentialService {
    restaurants: Arc<dyn RestaurantRepository>,
    credentials: Arc<dyn CredentialRepository>,
    registry: Arc<PosRegistry>,
    clover_config: CloverConfig,
}

impl CredentialService {
    pub fn new(
        restaurants: Arc<dyn RestaurantRepository>,
        credentials: Arc<dyn CredentialRepository>,
        registry: Arc<PosRegistry>,
        clover_config: CloverConfig,
    ) -> Self {
        Self { restaurants, credentials, registry, clover_config }
    }

    /// Writes the credential row and, when the provider differs from the
    /// restaurant's configured one, flips `pos_provider` accordingly.
    pub async fn upsert(
        &self,
        restaurant_id: &RestaurantId,
        update: CredentialUpdate,
    ) -> Result<(), ServiceError> {
        let restaurant = self
            .restaurants
            .find_by_id(restaurant_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("restaurant", restaurant_id.0.clone()))?;

        let provider = update.provider;
        self.credentials
            .upsert(&ProviderCredential {
                restaurant_id: restaurant.id.clone(),
                provider,
                merchant_ref: update.merchant_ref,
                client_id: update.client_id,
                client_secret: update.client_secret,
                environment: update.environment,
                access_token: update.access_token,
                token_expires_at: update.token_expires_at,
            })
            .await?;

        if restaurant.provider().ok() != Some(provider) {
            self.restaurants.set_provider(&restaurant.id, provider).await?;
        }

        info!(
            restaurant_id = %restaurant.id.0,
            provider = %provider,
            "provider credential upserted"
        );
        Ok(())
    }

    /// Completes a Clover OAuth callback: exchanges the authorization code
    /// for a token and stores it against the restaurant, switching the
    /// tenant onto Clover.
    pub async fn connect_clover(
        &self,
        restaurant_id: &RestaurantId,
        merchant_ref: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<(), ServiceError> {
        let client_id = self.clover_config.client_id.clone().ok_or_else(|| {
            ServiceError::Misconfigured("CLOVER_CLIENT_ID is not set".to_owned())
        })?;
        let client_secret = self.clover_config.client_secret.clone().ok_or_else(|| {
            ServiceError::Misconfigured("CLOVER_CLIENT_SECRET is not set".to_owned())
        })?;

        let grant = self.registry.clover().exchange_code(code, redirect_uri).await?;
        let expires_at = Utc::now() + Duration::seconds(grant.expires_in);

        self.upsert(
            restaurant_id,
            CredentialUpdate {
                provider: PosProvider::Clover,
                merchant_ref: merchant_ref.to_owned(),
                client_id,
                client_secret,
                environment: self.clover_config.environment,
                access_token: Some(grant.access_token),
                token_expires_at: Some(expires_at),
            },
        )
        .await
    }
}
