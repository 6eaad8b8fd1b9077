use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use orderline_core::{MenuSnapshot, NormalizedMenu, RestaurantId};

use super::{MenuRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMenuRepository {
    pool: DbPool,
}

impl SqlMenuRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MenuRepository for SqlMenuRepository {
    async fn find_for_restaurant(
        &self,
        restaurant_id: &RestaurantId,
    ) -> Result<Option<MenuSnapshot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT restaurant_id, version, normalized_json, source_hash, last_sync_at
             FROM menus
             WHERE restaurant_id = ?",
        )
        .bind(&restaurant_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(snapshot_from_row).transpose()
    }

    async fn replace(
        &self,
        restaurant_id: &RestaurantId,
        menu: &NormalizedMenu,
    ) -> Result<i64, RepositoryError> {
        let normalized_json = serde_json::to_string(menu)
            .map_err(|error| RepositoryError::Decode(format!("menu serialization: {error}")))?;
        let source_hash = menu.content_hash();

        // Upsert swaps JSON and bumps version in one atomic statement.
        let version: i64 = sqlx::query_scalar(
            "INSERT INTO menus (restaurant_id, version, normalized_json, source_hash, last_sync_at)
             VALUES (?, 1, ?, ?, ?)
             ON CONFLICT(restaurant_id) DO UPDATE SET
                version = version + 1,
                normalized_json = excluded.normalized_json,
                source_hash = excluded.source_hash,
                last_sync_at = excluded.last_sync_at
             RETURNING version",
        )
        .bind(&restaurant_id.0)
        .bind(&normalized_json)
        .bind(&source_hash)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }
}

fn snapshot_from_row(row: SqliteRow) -> Result<MenuSnapshot, RepositoryError> {
    let normalized_json: String = row.try_get("normalized_json")?;
    let menu: NormalizedMenu = serde_json::from_str(&normalized_json)
        .map_err(|error| RepositoryError::Decode(format!("stored menu is invalid: {error}")))?;

    Ok(MenuSnapshot {
        restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
        version: row.try_get("version")?,
        menu,
        source_hash: row.try_get("source_hash")?,
        last_sync_at: parse_timestamp(row.try_get("last_sync_at")?)?,
    })
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{raw}`: {error}")))
}
