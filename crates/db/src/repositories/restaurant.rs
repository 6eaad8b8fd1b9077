use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use orderline_core::{PosProvider, Restaurant, RestaurantId, RestaurantStatus};

use super::{RepositoryError, RestaurantRepository};
use crate::DbPool;

pub struct SqlRestaurantRepository {
    pool: DbPool,
}

impl SqlRestaurantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_FIELDS: &str = "id, name, phone_number, timezone, status, pos_provider";

#[async_trait::async_trait]
impl RestaurantRepository for SqlRestaurantRepository {
    async fn find_by_id(&self, id: &RestaurantId) -> Result<Option<Restaurant>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {SELECT_FIELDS} FROM restaurants WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(restaurant_from_row).transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Restaurant>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_FIELDS} FROM restaurants WHERE phone_number = ?"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.map(restaurant_from_row).transpose()
    }

    async fn insert(&self, restaurant: &Restaurant) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO restaurants (id, name, phone_number, timezone, status, pos_provider, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&restaurant.id.0)
        .bind(&restaurant.name)
        .bind(&restaurant.phone_number)
        .bind(&restaurant.timezone)
        .bind(restaurant.status.as_str())
        .bind(&restaurant.pos_provider)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_provider(
        &self,
        id: &RestaurantId,
        provider: PosProvider,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE restaurants SET pos_provider = ? WHERE id = ?")
            .bind(provider.as_str())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn restaurant_from_row(row: SqliteRow) -> Result<Restaurant, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = RestaurantStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown restaurant status `{status_raw}`"))
    })?;

    Ok(Restaurant {
        id: RestaurantId(row.try_get("id")?),
        name: row.try_get("name")?,
        phone_number: row.try_get("phone_number")?,
        timezone: row.try_get("timezone")?,
        status,
        pos_provider: row.try_get("pos_provider")?,
    })
}
