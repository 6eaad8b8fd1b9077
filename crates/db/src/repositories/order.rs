use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use orderline_core::{
    CallId, DraftRecord, Order, OrderId, OrderStatus, PricingOutcome, RestaurantId,
};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_FIELDS: &str = "id, restaurant_id, call_id, status, draft_json, priced_json, \
     provider_order_id, client_order_id, created_at, updated_at";

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_FIELDS} FROM orders WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(order_from_row).transpose()
    }

    async fn find_by_client_order_id(
        &self,
        client_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_FIELDS} FROM orders WHERE client_order_id = ?"
        ))
        .bind(client_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(order_from_row).transpose()
    }

    async fn insert_draft(&self, order: &Order) -> Result<(), RepositoryError> {
        let draft_json = serde_json::to_string(&order.draft)
            .map_err(|error| RepositoryError::Decode(format!("draft serialization: {error}")))?;

        sqlx::query(
            "INSERT INTO orders (id, restaurant_id, call_id, status, draft_json, client_order_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.restaurant_id.0)
        .bind(order.call_id.as_ref().map(|call| call.0.as_str()))
        .bind(order.status.as_str())
        .bind(&draft_json)
        .bind(&order.client_order_id)
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_priced(
        &self,
        id: &OrderId,
        outcome: &PricingOutcome,
    ) -> Result<(), RepositoryError> {
        let priced_json = serde_json::to_string(outcome)
            .map_err(|error| RepositoryError::Decode(format!("pricing serialization: {error}")))?;

        sqlx::query("UPDATE orders SET priced_json = ?, status = 'priced', updated_at = ? WHERE id = ?")
            .bind(&priced_json)
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_client_order_id(
        &self,
        id: &OrderId,
        client_order_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET client_order_id = ?, updated_at = ? WHERE id = ?")
            .bind(client_order_id)
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_confirmed(
        &self,
        id: &OrderId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET provider_order_id = ?, status = 'confirmed', updated_at = ? WHERE id = ?",
        )
        .bind(provider_order_id)
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn order_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    let draft_json: String = row.try_get("draft_json")?;
    let draft: DraftRecord = serde_json::from_str(&draft_json)
        .map_err(|error| RepositoryError::Decode(format!("stored draft is invalid: {error}")))?;

    let priced = row
        .try_get::<Option<String>, _>("priced_json")?
        .map(|raw| {
            serde_json::from_str::<PricingOutcome>(&raw).map_err(|error| {
                RepositoryError::Decode(format!("stored pricing is invalid: {error}"))
            })
        })
        .transpose()?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
        call_id: row.try_get::<Option<String>, _>("call_id")?.map(CallId),
        status,
        draft,
        priced,
        provider_order_id: row.try_get("provider_order_id")?,
        client_order_id: row.try_get("client_order_id")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{raw}`: {error}")))
}
