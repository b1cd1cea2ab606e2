//! Database operations for the trips table.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use waymark_engine::{EntityId, Record, Trip};

/// A stored trip row from the database.
#[derive(Debug)]
pub struct StoredTrip {
    pub id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub color_hex: Option<String>,
    pub status: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredTrip {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredTrip {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            color_hex: row.try_get("color_hex")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredTrip {
    /// Convert the row into a snapshot record, keeping id and timestamps.
    pub fn into_record(self) -> Record<Trip> {
        Record::new(
            Some(self.id),
            Trip {
                title: self.title,
                description: self.description,
                start_date: self.start_date,
                end_date: self.end_date,
                color_hex: self.color_hex,
                status: self.status,
            },
        )
        .with_timestamps(self.created_at, self.updated_at)
    }
}

/// Every trip, ordered by id.
pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<StoredTrip>, sqlx::Error> {
    sqlx::query_as::<_, StoredTrip>(
        r#"
        SELECT id, title, description, start_date, end_date, color_hex, status,
               created_at, updated_at
        FROM trips
        ORDER BY id ASC
        "#,
    )
    .fetch_all(conn)
    .await
}

/// Find a trip with the same title and date range.
pub async fn find_match(
    conn: &mut SqliteConnection,
    trip: &Trip,
) -> Result<Option<EntityId>, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        SELECT id FROM trips
        WHERE title = ? AND start_date IS ? AND end_date IS ?
        ORDER BY id ASC
        LIMIT 1
        "#,
    )
    .bind(trip.title.as_str())
    .bind(trip.start_date)
    .bind(trip.end_date)
    .fetch_optional(conn)
    .await
}

/// Insert a trip and return its new id.
pub async fn insert(conn: &mut SqliteConnection, trip: &Trip) -> Result<EntityId, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        INSERT INTO trips (title, description, start_date, end_date, color_hex, status)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(trip.title.as_str())
    .bind(trip.description.as_deref())
    .bind(trip.start_date)
    .bind(trip.end_date)
    .bind(trip.color_hex.as_deref())
    .bind(trip.status.as_str())
    .fetch_one(conn)
    .await
}

/// Overwrite the fields outside the natural key.
pub async fn update(
    conn: &mut SqliteConnection,
    id: EntityId,
    trip: &Trip,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE trips
        SET description = ?, color_hex = ?, status = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(trip.description.as_deref())
    .bind(trip.color_hex.as_deref())
    .bind(trip.status.as_str())
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}
