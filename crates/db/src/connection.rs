use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use orderline_core::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Opens the SQLite pool described by the configuration. Foreign keys are
/// enforced on every connection, journaling runs in WAL mode, and the busy
/// handler waits as long as pool acquisition does rather than failing fast
/// on writer contention.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let acquire_timeout = Duration::from_secs(config.timeout_secs.max(1));
    let busy_timeout_ms = acquire_timeout.as_millis().min(u128::from(u32::MAX)) as u64;
    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(acquire_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

/// `connect` without a full configuration in hand. Tests use this to pin
/// the pool to a single connection, since each `sqlite::memory:` connection
/// gets its own database.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    connect(&DatabaseConfig { url: database_url.to_owned(), max_connections, timeout_secs }).await
}

#[cfg(test)]
mod tests {
    use orderline_core::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn pool_pragmas_follow_the_configuration() {
        let pool = connect(&DatabaseConfig {
            url: "sqlite::memory:".to_owned(),
            max_connections: 1,
            timeout_secs: 7,
        })
        .await
        .expect("connect");

        let busy_timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_timeout, 7000);

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);
    }
}
