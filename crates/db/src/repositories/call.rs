use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use orderline_core::{Call, CallId, RestaurantId};

use super::{CallRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCallRepository {
    pool: DbPool,
}

impl SqlCallRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallRepository for SqlCallRepository {
    async fn find_by_id(&self, id: &CallId) -> Result<Option<Call>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, restaurant_id, from_number, to_number, started_at FROM calls WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(call_from_row).transpose()
    }

    async fn insert(&self, call: &Call) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO calls (id, restaurant_id, from_number, to_number, started_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&call.id.0)
        .bind(&call.restaurant_id.0)
        .bind(&call.from_number)
        .bind(&call.to_number)
        .bind(call.started_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn call_from_row(row: SqliteRow) -> Result<Call, RepositoryError> {
    let started_raw: String = row.try_get("started_at")?;
    let started_at = DateTime::parse_from_rfc3339(&started_raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{started_raw}`: {error}")))?;

    Ok(Call {
        id: CallId(row.try_get("id")?),
        restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
        from_number: row.try_get("from_number")?,
        to_number: row.try_get("to_number")?,
        started_at,
    })
}
