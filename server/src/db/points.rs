//! Database operations for the points_of_interest table.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use waymark_engine::{EntityId, Point, Record};

/// A stored point of interest from the database.
#[derive(Debug)]
pub struct StoredPoint {
    pub id: EntityId,
    pub trip_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub point_type: Option<String>,
    pub icon: Option<String>,
    pub image_path: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub visit_date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredPoint {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredPoint {
            id: row.try_get("id")?,
            trip_id: row.try_get("trip_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            point_type: row.try_get("type")?,
            icon: row.try_get("icon")?,
            image_path: row.try_get("image_path")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            visit_date: row.try_get("visit_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredPoint {
    pub fn into_record(self) -> Record<Point> {
        Record::new(
            Some(self.id),
            Point {
                trip_id: self.trip_id,
                title: self.title,
                description: self.description,
                point_type: self.point_type,
                icon: self.icon,
                image_path: self.image_path,
                latitude: self.latitude,
                longitude: self.longitude,
                visit_date: self.visit_date,
            },
        )
        .with_timestamps(self.created_at, self.updated_at)
    }
}

/// Every point, ordered by id.
pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<StoredPoint>, sqlx::Error> {
    sqlx::query_as::<_, StoredPoint>(
        r#"
        SELECT id, trip_id, title, description, "type", icon, image_path,
               latitude, longitude, visit_date, created_at, updated_at
        FROM points_of_interest
        ORDER BY id ASC
        "#,
    )
    .fetch_all(conn)
    .await
}

/// Find the same visit: trip, title, coordinates and visit date.
///
/// An undated point only matches another undated point, so repeated stays on
/// different dates stay distinct.
pub async fn find_match(
    conn: &mut SqliteConnection,
    point: &Point,
) -> Result<Option<EntityId>, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        SELECT id FROM points_of_interest
        WHERE trip_id = ? AND title = ? AND latitude = ? AND longitude = ?
          AND visit_date IS ?
        ORDER BY id ASC
        LIMIT 1
        "#,
    )
    .bind(point.trip_id)
    .bind(point.title.as_str())
    .bind(point.latitude)
    .bind(point.longitude)
    .bind(point.visit_date.as_deref())
    .fetch_optional(conn)
    .await
}

pub async fn insert(conn: &mut SqliteConnection, point: &Point) -> Result<EntityId, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        INSERT INTO points_of_interest
            (trip_id, title, description, "type", icon, image_path,
             latitude, longitude, visit_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(point.trip_id)
    .bind(point.title.as_str())
    .bind(point.description.as_deref())
    .bind(point.point_type.as_deref())
    .bind(point.icon.as_deref())
    .bind(point.image_path.as_deref())
    .bind(point.latitude)
    .bind(point.longitude)
    .bind(point.visit_date.as_deref())
    .fetch_one(conn)
    .await
}

/// Overwrite description, type, icon and image.
pub async fn update(
    conn: &mut SqliteConnection,
    id: EntityId,
    point: &Point,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE points_of_interest
        SET description = ?, "type" = ?, icon = ?, image_path = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(point.description.as_deref())
    .bind(point.point_type.as_deref())
    .bind(point.icon.as_deref())
    .bind(point.image_path.as_deref())
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}
