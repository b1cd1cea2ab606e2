//! Database operations for the settings table.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use waymark_engine::{EntityId, Record, Setting};

/// A stored setting row from the database.
#[derive(Debug)]
pub struct StoredSetting {
    pub id: EntityId,
    pub setting_key: String,
    pub setting_value: Option<String>,
    pub setting_type: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredSetting {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(StoredSetting {
            id: row.try_get("id")?,
            setting_key: row.try_get("setting_key")?,
            setting_value: row.try_get("setting_value")?,
            setting_type: row.try_get("setting_type")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredSetting {
    pub fn into_record(self) -> Record<Setting> {
        Record::new(
            Some(self.id),
            Setting {
                setting_key: self.setting_key,
                setting_value: self.setting_value,
                setting_type: self.setting_type,
                description: self.description,
            },
        )
        .with_timestamps(self.created_at, self.updated_at)
    }
}

/// Every setting, ordered by id.
pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<StoredSetting>, sqlx::Error> {
    sqlx::query_as::<_, StoredSetting>(
        r#"
        SELECT id, setting_key, setting_value, setting_type, description,
               created_at, updated_at
        FROM settings
        ORDER BY id ASC
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn find_match(
    conn: &mut SqliteConnection,
    setting: &Setting,
) -> Result<Option<EntityId>, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>("SELECT id FROM settings WHERE setting_key = ?")
        .bind(setting.setting_key.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn insert(
    conn: &mut SqliteConnection,
    setting: &Setting,
) -> Result<EntityId, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        INSERT INTO settings (setting_key, setting_value, setting_type, description)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(setting.setting_key.as_str())
    .bind(setting.setting_value.as_deref())
    .bind(setting.setting_type.as_str())
    .bind(setting.description.as_deref())
    .fetch_one(conn)
    .await
}

/// Insert unless the key is already taken. Returns `None` when skipped.
pub async fn insert_or_ignore(
    conn: &mut SqliteConnection,
    setting: &Setting,
) -> Result<Option<EntityId>, sqlx::Error> {
    sqlx::query_scalar::<_, EntityId>(
        r#"
        INSERT INTO settings (setting_key, setting_value, setting_type, description)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (setting_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(setting.setting_key.as_str())
    .bind(setting.setting_value.as_deref())
    .bind(setting.setting_type.as_str())
    .bind(setting.description.as_deref())
    .fetch_optional(conn)
    .await
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: EntityId,
    setting: &Setting,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE settings
        SET setting_value = ?, setting_type = ?, description = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(setting.setting_value.as_deref())
    .bind(setting.setting_type.as_str())
    .bind(setting.description.as_deref())
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}
