//! Database operations for the routes table.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use waymark_engine::{EntityId, Record, Route};

/// A stored route row from the database.
#[derive(Debug)]
pub struct StoredRoute {
    pub id: EntityId,
    pub trip_id: EntityId,
    pub transport_type: String,
    pub geojson_data: String,
    pub color: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredRoute {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRoute {
            id: row.try_get("id")?,
            trip_id: row.try_get("trip_id")?,
            transport_type: row.try_get("transport_type")?,
            geojson_data: row.try_get("geojson_data")?,
            color: row.try_get("color")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRoute {
    pub fn into_record(self) -> Record<Route> {
        Record::new(
            Some(self.id),
            Route {
                trip_id: self.trip_id,
                transport_type: self.transport_type,
                geojson_data: self.geojson_data,
                color: self.color,
            },
        )
        .with_timestamps(self.created_at, self.updated_at)
    }
}

/// Every route, ordered by id.
pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<StoredRoute>, sqlx::Error> {
    sqlx::query_as::<_, StoredRoute>(
        r#"
        SELECT id, trip_id, transport_type, geojson_data, color, created_at, updated_at
        FROM routes
        ORDER BY id ASC
        "#,
    )
    .fetch_all(conn)
    .await
}

/// Find a route on the same trip with identical transport and geometry.
///
/// `route.trip_id` must already be a target-store id.
pub async fn find_match(
    conn: &mut SqliteConnection,
    route: &Route,
) -> Result<Option<EntityId>, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        SELECT id FROM routes
        WHERE trip_id = ? AND transport_type = ? AND geojson_data = ?
        ORDER BY id ASC
        LIMIT 1
        "#,
    )
    .bind(route.trip_id)
    .bind(route.transport_type.as_str())
    .bind(route.geojson_data.as_str())
    .fetch_optional(conn)
    .await
}

pub async fn insert(conn: &mut SqliteConnection, route: &Route) -> Result<EntityId, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        INSERT INTO routes (trip_id, transport_type, geojson_data, color)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(route.trip_id)
    .bind(route.transport_type.as_str())
    .bind(route.geojson_data.as_str())
    .bind(route.color.as_deref())
    .fetch_one(conn)
    .await
}

/// Overwrite the display color, the only field outside the natural key.
pub async fn update(
    conn: &mut SqliteConnection,
    id: EntityId,
    route: &Route,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE routes SET color = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(route.color.as_deref())
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}
