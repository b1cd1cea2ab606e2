//! Entity types carried by snapshots.
//!
//! Each row of the trip collection is represented by a typed field set
//! (`Trip`, `Route`, `Point`, `Tag`, `Setting`) wrapped in a [`Record`] that
//! also carries the exporting store's bookkeeping columns. Those columns are
//! informational only: a restore never trusts them.

use crate::EntityId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of entity a snapshot can hold.
///
/// Ordering follows restore dependency order, so a `BTreeSet<EntityKind>`
/// iterates parents before children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "trips")]
    Trip,
    #[serde(rename = "routes")]
    Route,
    #[serde(rename = "points")]
    Point,
    #[serde(rename = "tags")]
    Tag,
    #[serde(rename = "settings")]
    Setting,
}

impl EntityKind {
    /// Every kind, in restore order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Trip,
        EntityKind::Route,
        EntityKind::Point,
        EntityKind::Tag,
        EntityKind::Setting,
    ];

    /// Order in which kinds are reconciled: parents first.
    pub const RESTORE_ORDER: [EntityKind; 5] = Self::ALL;

    /// Order in which kinds are cleared by a full replace: children first.
    pub const DELETION_ORDER: [EntityKind; 5] = [
        EntityKind::Route,
        EntityKind::Point,
        EntityKind::Tag,
        EntityKind::Trip,
        EntityKind::Setting,
    ];

    /// Name used in `includedKinds` and in restore reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Trip => "trips",
            EntityKind::Route => "routes",
            EntityKind::Point => "points",
            EntityKind::Tag => "tags",
            EntityKind::Setting => "settings",
        }
    }

    /// Key of this kind's array inside the snapshot `entities` object.
    pub fn document_key(&self) -> &'static str {
        self.table()
    }

    /// Backing table name in the entity store.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Trip => "trips",
            EntityKind::Route => "routes",
            EntityKind::Point => "points_of_interest",
            EntityKind::Tag => "trip_tags",
            EntityKind::Setting => "settings",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown entity kind name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity kind: {}", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.table() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

fn default_trip_status() -> String {
    "planned".to_string()
}

fn default_setting_type() -> String {
    "string".to_string()
}

/// A trip: the parent of routes, points and tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default = "default_trip_status")]
    pub status: String,
}

/// A GPS track belonging to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub trip_id: EntityId,
    pub transport_type: String,
    /// Raw GeoJSON text; matched byte for byte.
    pub geojson_data: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// A point of interest visited during a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub trip_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub point_type: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Path of the image relative to the installation root.
    #[serde(default)]
    pub image_path: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub visit_date: Option<String>,
}

/// A free-form label attached to a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub trip_id: EntityId,
    pub tag_name: String,
}

impl Tag {
    /// Case-folded name used to compare tags on one trip.
    ///
    /// Upper-casing first lets `ß` and `SS` fold to the same text.
    pub fn folded_name(&self) -> String {
        fold_case(&self.tag_name)
    }
}

/// Unicode case fold: `München` and `MÜNCHEN` fold to `münchen`.
pub fn fold_case(text: &str) -> String {
    text.to_uppercase().to_lowercase()
}

/// A global key/value setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub setting_key: String,
    #[serde(default)]
    pub setting_value: Option<String>,
    #[serde(default = "default_setting_type")]
    pub setting_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Field-level checks applied when a snapshot is decoded.
pub trait Validate {
    /// Return a human-readable reason when the fields are unusable.
    fn check(&self) -> Result<(), String>;
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

impl Validate for Trip {
    fn check(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!("end_date {end} is before start_date {start}"));
            }
        }
        Ok(())
    }
}

impl Validate for Route {
    fn check(&self) -> Result<(), String> {
        require_text("transport_type", &self.transport_type)?;
        require_text("geojson_data", &self.geojson_data)
    }
}

impl Validate for Point {
    fn check(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err("coordinates must be finite numbers".to_string());
        }
        Ok(())
    }
}

impl Validate for Tag {
    fn check(&self) -> Result<(), String> {
        require_text("tag_name", &self.tag_name)
    }
}

impl Validate for Setting {
    fn check(&self) -> Result<(), String> {
        require_text("setting_key", &self.setting_key)
    }
}

/// One exported row: typed fields plus the exporting store's bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    /// Primary key in the exporting store. Only meaningful inside the snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(flatten)]
    pub fields: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl<T> Record<T> {
    /// Wrap fields with a source id and no timestamps.
    pub fn new(id: Option<EntityId>, fields: T) -> Self {
        Self {
            id,
            fields,
            created_at: None,
            updated_at: None,
        }
    }

    /// Attach the exporting store's timestamps.
    pub fn with_timestamps(
        mut self,
        created_at: Option<String>,
        updated_at: Option<String>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Drop the server-generated columns, keeping the source id for remapping.
    pub fn strip(&self) -> (Option<EntityId>, &T) {
        (self.id, &self.fields)
    }
}

/// A kind-tagged record, used where kinds are handled uniformly.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Trip(Record<Trip>),
    Route(Record<Route>),
    Point(Record<Point>),
    Tag(Record<Tag>),
    Setting(Record<Setting>),
}

impl EntityRecord {
    /// The kind of this record.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::Trip(_) => EntityKind::Trip,
            EntityRecord::Route(_) => EntityKind::Route,
            EntityRecord::Point(_) => EntityKind::Point,
            EntityRecord::Tag(_) => EntityKind::Tag,
            EntityRecord::Setting(_) => EntityKind::Setting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_names() {
        assert_eq!(EntityKind::Point.as_str(), "points");
        assert_eq!(EntityKind::Point.document_key(), "points_of_interest");
        assert_eq!(EntityKind::Tag.table(), "trip_tags");
        assert_eq!(
            serde_json::to_string(&EntityKind::Setting).unwrap(),
            "\"settings\""
        );
    }

    #[test]
    fn kind_from_str_accepts_both_names() {
        assert_eq!("tags".parse::<EntityKind>(), Ok(EntityKind::Tag));
        assert_eq!("trip_tags".parse::<EntityKind>(), Ok(EntityKind::Tag));
        assert!("flights".parse::<EntityKind>().is_err());
    }

    #[test]
    fn deletion_order_is_children_first() {
        let trip_pos = EntityKind::DELETION_ORDER
            .iter()
            .position(|k| *k == EntityKind::Trip)
            .unwrap();
        for child in [EntityKind::Route, EntityKind::Point, EntityKind::Tag] {
            let pos = EntityKind::DELETION_ORDER
                .iter()
                .position(|k| *k == child)
                .unwrap();
            assert!(pos < trip_pos, "{child} must be deleted before trips");
        }
    }

    #[test]
    fn record_flattens_fields() {
        let record = Record::new(
            Some(7),
            Tag {
                trip_id: 3,
                tag_name: "Paris".into(),
            },
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": 7, "trip_id": 3, "tag_name": "Paris"}));
    }

    #[test]
    fn record_ignores_timestamps_on_strip() {
        let record: Record<Trip> = serde_json::from_value(json!({
            "id": 12,
            "title": "Japan 2024",
            "start_date": "2024-04-01",
            "end_date": "2024-04-10",
            "created_at": "2024-03-01 10:00:00",
            "updated_at": "2024-03-02 10:00:00"
        }))
        .unwrap();

        let (source_id, trip) = record.strip();
        assert_eq!(source_id, Some(12));
        assert_eq!(trip.title, "Japan 2024");
        assert_eq!(trip.status, "planned");
        assert_eq!(record.created_at.as_deref(), Some("2024-03-01 10:00:00"));
    }

    #[test]
    fn point_type_uses_reserved_name() {
        let point: Point = serde_json::from_value(json!({
            "trip_id": 1,
            "title": "Ueno",
            "type": "park",
            "latitude": 35.71,
            "longitude": 139.77
        }))
        .unwrap();
        assert_eq!(point.point_type.as_deref(), Some("park"));
        assert_eq!(point.visit_date, None);
    }

    #[test]
    fn trip_validation() {
        let mut trip = Trip {
            title: " ".into(),
            description: None,
            start_date: None,
            end_date: None,
            color_hex: None,
            status: "planned".into(),
        };
        assert!(trip.check().is_err());

        trip.title = "Lisbon".into();
        trip.start_date = NaiveDate::from_ymd_opt(2024, 5, 10);
        trip.end_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert!(trip.check().unwrap_err().contains("before start_date"));
    }

    #[test]
    fn entity_record_kind() {
        let route = EntityRecord::Route(Record::new(
            Some(4),
            Route {
                trip_id: 9,
                transport_type: "train".into(),
                geojson_data: "{}".into(),
                color: None,
            },
        ));
        assert_eq!(route.kind(), EntityKind::Route);
    }

    #[test]
    fn tag_folding_is_unicode_aware() {
        let tag = |name: &str| Tag {
            trip_id: 1,
            tag_name: name.into(),
        };
        assert_eq!(tag("MÜNCHEN").folded_name(), tag("München").folded_name());
        assert_eq!(tag("Éte").folded_name(), "éte");
        assert_eq!(fold_case("STRASSE"), fold_case("Straße"));
        assert_ne!(tag("Munchen").folded_name(), tag("München").folded_name());
    }
}
