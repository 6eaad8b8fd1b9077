use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{sqlite::SqliteRow, Row};

use orderline_core::{PosEnvironment, PosProvider, ProviderCredential, RestaurantId};

use super::{CredentialRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCredentialRepository {
    pool: DbPool,
}

impl SqlCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CredentialRepository for SqlCredentialRepository {
    async fn find(
        &self,
        restaurant_id: &RestaurantId,
        provider: PosProvider,
    ) -> Result<Option<ProviderCredential>, RepositoryError> {
        let row = sqlx::query(
            "SELECT restaurant_id, provider, merchant_ref, client_id, client_secret,
                    environment, access_token, token_expires_at
             FROM pos_credentials
             WHERE restaurant_id = ? AND provider = ?",
        )
        .bind(&restaurant_id.0)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(credential_from_row).transpose()
    }

    async fn upsert(&self, credential: &ProviderCredential) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pos_credentials (
                restaurant_id, provider, merchant_ref, client_id, client_secret,
                environment, access_token, token_expires_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(restaurant_id, provider) DO UPDATE SET
                merchant_ref = excluded.merchant_ref,
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                environment = excluded.environment,
                access_token = excluded.access_token,
                token_expires_at = excluded.token_expires_at,
                updated_at = excluded.updated_at",
        )
        .bind(&credential.restaurant_id.0)
        .bind(credential.provider.as_str())
        .bind(&credential.merchant_ref)
        .bind(&credential.client_id)
        .bind(credential.client_secret.expose_secret())
        .bind(credential.environment.as_str())
        .bind(credential.access_token.as_deref())
        .bind(credential.token_expires_at.map(|value| value.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_token(
        &self,
        restaurant_id: &RestaurantId,
        provider: PosProvider,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE pos_credentials
             SET access_token = ?, token_expires_at = ?, updated_at = ?
             WHERE restaurant_id = ? AND provider = ?",
        )
        .bind(access_token)
        .bind(expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(&restaurant_id.0)
        .bind(provider.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn credential_from_row(row: SqliteRow) -> Result<ProviderCredential, RepositoryError> {
    let provider_raw: String = row.try_get("provider")?;
    let provider = PosProvider::parse(&provider_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown provider `{provider_raw}`")))?;

    let environment_raw: String = row.try_get("environment")?;
    let secret: String = row.try_get("client_secret")?;

    let token_expires_at = row
        .try_get::<Option<String>, _>("token_expires_at")?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|value| value.with_timezone(&Utc))
                .map_err(|error| RepositoryError::Decode(format!("bad expiry `{raw}`: {error}")))
        })
        .transpose()?;

    Ok(ProviderCredential {
        restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
        provider,
        merchant_ref: row.try_get("merchant_ref")?,
        client_id: row.try_get("client_id")?,
        client_secret: SecretString::from(secret),
        environment: PosEnvironment::parse(&environment_raw),
        access_token: row.try_get("access_token")?,
        token_expires_at,
    })
}
