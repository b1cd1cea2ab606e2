//! Snapshot types for exporting and restoring a trip collection.
//!
//! A snapshot is the portable document produced by an export. Its top-level
//! field order is fixed (`formatVersion`, `exportedAt`, `appVersion`,
//! `includedKinds`, `entities`) so the same store always serializes the same
//! way.

use crate::{
    entity::{Point, Record, Route, Setting, Tag, Trip, Validate},
    error::Result,
    EntityKind, EntityRecord, Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The only snapshot format version this engine reads and writes.
pub const SNAPSHOT_FORMAT_VERSION: &str = "1.0";

/// Per-kind record arrays, keyed the way the document names them.
///
/// An array is `Some` exactly when its kind was exported, even if empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trips: Option<Vec<Record<Trip>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Record<Route>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_of_interest: Option<Vec<Record<Point>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_tags: Option<Vec<Record<Tag>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Vec<Record<Setting>>>,
}

impl Entities {
    /// Mark a kind as exported by giving it an (empty) array.
    pub fn include(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Trip => {
                self.trips.get_or_insert_with(Vec::new);
            }
            EntityKind::Route => {
                self.routes.get_or_insert_with(Vec::new);
            }
            EntityKind::Point => {
                self.points_of_interest.get_or_insert_with(Vec::new);
            }
            EntityKind::Tag => {
                self.trip_tags.get_or_insert_with(Vec::new);
            }
            EntityKind::Setting => {
                self.settings.get_or_insert_with(Vec::new);
            }
        }
    }

    /// Append a record to its kind's array.
    pub fn push(&mut self, record: EntityRecord) {
        match record {
            EntityRecord::Trip(r) => self.trips.get_or_insert_with(Vec::new).push(r),
            EntityRecord::Route(r) => self.routes.get_or_insert_with(Vec::new).push(r),
            EntityRecord::Point(r) => self
                .points_of_interest
                .get_or_insert_with(Vec::new)
                .push(r),
            EntityRecord::Tag(r) => self.trip_tags.get_or_insert_with(Vec::new).push(r),
            EntityRecord::Setting(r) => self.settings.get_or_insert_with(Vec::new).push(r),
        }
    }

    /// Whether the document carries an array for `kind`.
    pub fn contains(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Trip => self.trips.is_some(),
            EntityKind::Route => self.routes.is_some(),
            EntityKind::Point => self.points_of_interest.is_some(),
            EntityKind::Tag => self.trip_tags.is_some(),
            EntityKind::Setting => self.settings.is_some(),
        }
    }

    /// Number of records of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Trip => self.trips().len(),
            EntityKind::Route => self.routes().len(),
            EntityKind::Point => self.points().len(),
            EntityKind::Tag => self.tags().len(),
            EntityKind::Setting => self.settings().len(),
        }
    }

    pub fn trips(&self) -> &[Record<Trip>] {
        self.trips.as_deref().unwrap_or_default()
    }

    pub fn routes(&self) -> &[Record<Route>] {
        self.routes.as_deref().unwrap_or_default()
    }

    pub fn points(&self) -> &[Record<Point>] {
        self.points_of_interest.as_deref().unwrap_or_default()
    }

    pub fn tags(&self) -> &[Record<Tag>] {
        self.trip_tags.as_deref().unwrap_or_default()
    }

    pub fn settings(&self) -> &[Record<Setting>] {
        self.settings.as_deref().unwrap_or_default()
    }
}

/// A point-in-time export of the trip collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot format version
    pub format_version: String,
    /// When the export ran
    pub exported_at: DateTime<Utc>,
    /// Name and version of the exporting tool
    #[serde(default)]
    pub app_version: String,
    /// Kinds the export was asked for
    pub included_kinds: BTreeSet<EntityKind>,
    /// The exported rows
    pub entities: Entities,
}

impl Snapshot {
    /// Create an empty snapshot covering `kinds`, stamped with the current time.
    pub fn new(
        kinds: impl IntoIterator<Item = EntityKind>,
        app_version: impl Into<String>,
    ) -> Self {
        let included_kinds: BTreeSet<_> = kinds.into_iter().collect();
        let mut entities = Entities::default();
        for kind in &included_kinds {
            entities.include(*kind);
        }

        Self {
            format_version: SNAPSHOT_FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: app_version.into(),
            included_kinds,
            entities,
        }
    }

    /// Whether `kind` is part of this snapshot.
    pub fn includes(&self, kind: EntityKind) -> bool {
        self.included_kinds.contains(&kind)
    }

    /// Count records across all kinds.
    pub fn record_count(&self) -> usize {
        EntityKind::ALL
            .iter()
            .map(|kind| self.entities.count(*kind))
            .sum()
    }

    /// Check version, kind listing and every record's fields.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::UnsupportedFormatVersion {
                found: self.format_version.clone(),
                supported: SNAPSHOT_FORMAT_VERSION.to_string(),
            });
        }

        for kind in EntityKind::ALL {
            if self.entities.contains(kind) && !self.includes(kind) {
                return Err(Error::UnlistedKind(kind));
            }
        }

        check_records(EntityKind::Trip, self.entities.trips())?;
        check_records(EntityKind::Route, self.entities.routes())?;
        check_records(EntityKind::Point, self.entities.points())?;
        check_records(EntityKind::Tag, self.entities.tags())?;
        check_records(EntityKind::Setting, self.entities.settings())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedDocument(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::MalformedDocument(e.to_string()))
    }

    /// Deserialize from JSON bytes and validate.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        // Check the version before the typed parse so a newer document is
        // reported as such rather than as a field error.
        let raw: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| Error::MalformedDocument(e.to_string()))?;
        match raw.get("formatVersion") {
            Some(serde_json::Value::String(v)) if v != SNAPSHOT_FORMAT_VERSION => {
                return Err(Error::UnsupportedFormatVersion {
                    found: v.clone(),
                    supported: SNAPSHOT_FORMAT_VERSION.to_string(),
                });
            }
            Some(serde_json::Value::String(_)) => {}
            Some(other) => {
                return Err(Error::MalformedDocument(format!(
                    "formatVersion must be a string, got {other}"
                )));
            }
            None => {
                return Err(Error::MalformedDocument(
                    "missing field `formatVersion`".to_string(),
                ));
            }
        }

        let snapshot: Self =
            serde_json::from_value(raw).map_err(|e| Error::MalformedDocument(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Deserialize from a JSON string and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_slice(json.as_bytes())
    }
}

fn check_records<T: Validate>(kind: EntityKind, records: &[Record<T>]) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        record
            .fields
            .check()
            .map_err(|reason| Error::InvalidRecord {
                kind,
                index,
                reason,
            })?;
    }
    Ok(())
}

/// Summary of a snapshot (without the records).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    /// Snapshot format version
    pub format_version: String,
    /// When the export ran
    pub exported_at: DateTime<Utc>,
    /// Kinds the export covered
    pub included_kinds: BTreeSet<EntityKind>,
    /// Record count per included kind
    pub record_counts: BTreeMap<EntityKind, usize>,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            format_version: snapshot.format_version.clone(),
            exported_at: snapshot.exported_at,
            included_kinds: snapshot.included_kinds.clone(),
            record_counts: snapshot
                .included_kinds
                .iter()
                .map(|kind| (*kind, snapshot.entities.count(*kind)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn japan_trip(id: i64) -> Record<Trip> {
        Record::new(
            Some(id),
            Trip {
                title: "Japan 2024".into(),
                description: None,
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1),
                end_date: NaiveDate::from_ymd_opt(2024, 4, 10),
                color_hex: Some("#d7263d".into()),
                status: "completed".into(),
            },
        )
    }

    #[test]
    fn create_empty_snapshot() {
        let snapshot = Snapshot::new([EntityKind::Trip, EntityKind::Tag], "waymark test");
        assert_eq!(snapshot.format_version, SNAPSHOT_FORMAT_VERSION);
        assert!(snapshot.includes(EntityKind::Trip));
        assert!(!snapshot.includes(EntityKind::Route));
        assert!(snapshot.entities.contains(EntityKind::Tag));
        assert!(!snapshot.entities.contains(EntityKind::Setting));
        assert_eq!(snapshot.record_count(), 0);
    }

    #[test]
    fn top_level_field_order() {
        let snapshot = Snapshot::new([EntityKind::Trip], "waymark test");
        let json = snapshot.to_json().unwrap();

        let positions: Vec<usize> = [
            "\"formatVersion\"",
            "\"exportedAt\"",
            "\"appVersion\"",
            "\"includedKinds\"",
            "\"entities\"",
        ]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn json_roundtrip() {
        let mut snapshot = Snapshot::new(EntityKind::ALL, "waymark test");
        snapshot.entities.push(EntityRecord::Trip(japan_trip(1)));
        snapshot.entities.push(EntityRecord::Tag(Record::new(
            Some(2),
            Tag {
                trip_id: 1,
                tag_name: "asia".into(),
            },
        )));

        let json = snapshot.to_json().unwrap();
        let restored = Snapshot::from_json(&json).unwrap();

        assert_eq!(snapshot, restored);
    }

    #[test]
    fn document_uses_table_keys() {
        let mut snapshot = Snapshot::new([EntityKind::Point], "waymark test");
        snapshot.entities.push(EntityRecord::Point(Record::new(
            Some(5),
            Point {
                trip_id: 1,
                title: "Ueno".into(),
                description: None,
                point_type: None,
                icon: None,
                image_path: None,
                latitude: 35.71,
                longitude: 139.77,
                visit_date: Some("2024-04-02".into()),
            },
        )));

        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["includedKinds"], json!(["points"]));
        assert_eq!(value["entities"]["points_of_interest"][0]["title"], "Ueno");
    }

    #[test]
    fn reject_future_format_version() {
        let json = r#"{
            "formatVersion": "2.0",
            "exportedAt": "2024-05-01T10:00:00Z",
            "includedKinds": [],
            "entities": {}
        }"#;

        let result = Snapshot::from_json(json);
        assert!(matches!(
            result,
            Err(Error::UnsupportedFormatVersion { .. })
        ));
    }

    #[test]
    fn reject_missing_top_level_field() {
        let json = r#"{
            "formatVersion": "1.0",
            "includedKinds": ["trips"],
            "entities": {"trips": []}
        }"#;

        let err = Snapshot::from_json(json).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
        assert!(err.to_string().contains("exportedAt"));
    }

    #[test]
    fn reject_missing_format_version() {
        let json = r#"{"exportedAt": "2024-05-01T10:00:00Z", "includedKinds": [], "entities": {}}"#;
        assert!(matches!(
            Snapshot::from_json(json),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn reject_records_for_unlisted_kind() {
        let json = r#"{
            "formatVersion": "1.0",
            "exportedAt": "2024-05-01T10:00:00Z",
            "includedKinds": ["trips"],
            "entities": {"trips": [], "trip_tags": [{"trip_id": 1, "tag_name": "x"}]}
        }"#;

        assert_eq!(
            Snapshot::from_json(json),
            Err(Error::UnlistedKind(EntityKind::Tag))
        );
    }

    #[test]
    fn listed_kind_without_array_is_empty() {
        let json = r#"{
            "formatVersion": "1.0",
            "exportedAt": "2024-05-01T10:00:00Z",
            "includedKinds": ["trips", "settings"],
            "entities": {"trips": []}
        }"#;

        let snapshot = Snapshot::from_json(json).unwrap();
        assert!(snapshot.includes(EntityKind::Setting));
        assert!(snapshot.entities.settings().is_empty());
    }

    #[test]
    fn reject_invalid_record() {
        let json = r#"{
            "formatVersion": "1.0",
            "exportedAt": "2024-05-01T10:00:00Z",
            "includedKinds": ["trips"],
            "entities": {"trips": [{"id": 1, "title": "ok"}, {"id": 2, "title": ""}]}
        }"#;

        let err = Snapshot::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRecord {
                kind: EntityKind::Trip,
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn snapshot_summary() {
        let mut snapshot = Snapshot::new([EntityKind::Trip, EntityKind::Route], "waymark test");
        snapshot.entities.push(EntityRecord::Trip(japan_trip(1)));
        snapshot.entities.push(EntityRecord::Trip(japan_trip(2)));

        let summary = SnapshotSummary::from(&snapshot);

        assert_eq!(summary.format_version, SNAPSHOT_FORMAT_VERSION);
        assert_eq!(summary.record_counts[&EntityKind::Trip], 2);
        assert_eq!(summary.record_counts[&EntityKind::Route], 0);
        assert!(!summary.record_counts.contains_key(&EntityKind::Setting));
    }
}
