//! Database module for SQLite persistence.
//!
//! One module per table; every query takes a `&mut SqliteConnection` so the
//! same functions run against a pooled connection or inside a transaction.

mod pool;
pub mod points;
pub mod settings;
pub mod tags;
pub mod trip_routes;
pub mod trips;

pub use pool::*;

use sqlx::SqliteConnection;
use waymark_engine::EntityKind;

/// Delete every row of `kind`. Returns the number of rows removed.
pub async fn delete_all(conn: &mut SqliteConnection, kind: EntityKind) -> Result<u64, sqlx::Error> {
    // Table names come from a closed enum, never from input.
    let sql = format!("DELETE FROM {}", kind.table());
    let result = sqlx::query(&sql).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Number of rows of `kind`.
pub async fn count(conn: &mut SqliteConnection, kind: EntityKind) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    sqlx::query_scalar::<_, i64>(&sql).fetch_one(conn).await
}
