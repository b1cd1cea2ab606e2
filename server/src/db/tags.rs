//! Database operations for the trip_tags table.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use waymark_engine::{EntityId, Record, Tag};

/// A stored tag row from the database.
#[derive(Debug)]
pub struct StoredTag {
    pub id: EntityId,
    pub trip_id: EntityId,
    pub tag_name: String,
    pub created_at: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredTag {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredTag {
            id: row.try_get("id")?,
            trip_id: row.try_get("trip_id")?,
            tag_name: row.try_get("tag_name")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl StoredTag {
    pub fn into_record(self) -> Record<Tag> {
        Record::new(
            Some(self.id),
            Tag {
                trip_id: self.trip_id,
                tag_name: self.tag_name,
            },
        )
        .with_timestamps(self.created_at, None)
    }
}

/// Every tag, ordered by id.
pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<StoredTag>, sqlx::Error> {
    sqlx::query_as::<_, StoredTag>(
        "SELECT id, trip_id, tag_name, created_at FROM trip_tags ORDER BY id ASC",
    )
    .fetch_all(conn)
    .await
}

/// Find a tag on the same trip whose name folds to the same text.
pub async fn find_match(
    conn: &mut SqliteConnection,
    tag: &Tag,
) -> Result<Option<EntityId>, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        SELECT id FROM trip_tags
        WHERE trip_id = ? AND tag_name_folded = ?
        ORDER BY id ASC
        LIMIT 1
        "#,
    )
    .bind(tag.trip_id)
    .bind(tag.folded_name())
    .fetch_optional(conn)
    .await
}

pub async fn insert(conn: &mut SqliteConnection, tag: &Tag) -> Result<EntityId, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        "INSERT INTO trip_tags (trip_id, tag_name, tag_name_folded) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(tag.trip_id)
    .bind(tag.tag_name.as_str())
    .bind(tag.folded_name())
    .fetch_one(conn)
    .await
}

/// Insert unless the trip already carries the tag in any casing.
///
/// Returns `None` when the row was not inserted.
pub async fn insert_or_ignore(
    conn: &mut SqliteConnection,
    tag: &Tag,
) -> Result<Option<EntityId>, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        INSERT INTO trip_tags (trip_id, tag_name, tag_name_folded) VALUES (?, ?, ?)
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(tag.trip_id)
    .bind(tag.tag_name.as_str())
    .bind(tag.folded_name())
    .fetch_optional(conn)
    .await
}
