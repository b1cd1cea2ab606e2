//! # Waymark Engine
//!
//! Snapshot model and restore bookkeeping for a personal trip collection.
//!
//! This crate describes what a backup *is* and how restore decisions are
//! made. It never touches a database or the filesystem: the server crate
//! reads and writes rows and asset files, and consults this crate for every
//! decision in between.
//!
//! ## Core Concepts
//!
//! ### Entities
//!
//! A trip collection holds five kinds of entity ([`EntityKind`]):
//! - [`Trip`] - the parent of everything else
//! - [`Route`] - a GPS track (`trip_id`)
//! - [`Point`] - a point of interest (`trip_id`)
//! - [`Tag`] - a label, unique per trip ignoring case (`trip_id`)
//! - [`Setting`] - a global key/value pair
//!
//! Each exported row is a [`Record`]: the typed fields plus the exporting
//! store's id and timestamps, which a restore never trusts.
//!
//! ### Snapshots
//!
//! A [`Snapshot`] is the portable document: format version, export time,
//! the included kinds and the records. The [`archive`] module packs it as
//! plain JSON or as a zip bundling point images.
//!
//! ### Restore
//!
//! A [`RestorePolicy`] decides what happens to records matching an existing
//! row by natural key:
//! - [`RestorePolicy::SkipExisting`] - keep the existing row
//! - [`RestorePolicy::UpdateExisting`] - overwrite its mutable fields
//! - [`RestorePolicy::ReplaceAll`] - clear included kinds, insert everything
//!
//! Child records are remapped through an [`IdMap`] and outcomes are counted in
//! a [`RestoreReport`].
//!
//! ## Quick Start
//!
//! ```rust
//! use waymark_engine::{archive, EntityKind, EntityRecord, Record, Snapshot, Trip};
//!
//! // 1. Build a snapshot
//! let mut snapshot = Snapshot::new([EntityKind::Trip], "example 0.1.0");
//! snapshot.entities.push(EntityRecord::Trip(Record::new(
//!     Some(1),
//!     Trip {
//!         title: "Japan 2024".into(),
//!         description: None,
//!         start_date: None,
//!         end_date: None,
//!         color_hex: None,
//!         status: "planned".into(),
//!     },
//! )));
//!
//! // 2. Encode it (no assets, so plain JSON)
//! let encoded = archive::encode(&snapshot, &[]).unwrap();
//! assert_eq!(encoded.format, archive::ArchiveFormat::Json);
//!
//! // 3. Decode and validate
//! let decoded = archive::decode(&encoded.bytes).unwrap();
//! assert_eq!(decoded.snapshot.entities.trips().len(), 1);
//! ```

pub mod archive;
pub mod entity;
pub mod error;
pub mod reconcile;
pub mod snapshot;

// Re-export main types at crate root
pub use archive::{ArchiveFormat, Asset, DecodeLimits, DecodedArchive, EncodedArchive};
pub use entity::{EntityKind, EntityRecord, Point, Record, Route, Setting, Tag, Trip};
pub use error::Error;
pub use reconcile::{Action, IdMap, KindReport, Outcome, RestorePolicy, RestoreReport};
pub use snapshot::{Entities, Snapshot, SnapshotSummary, SNAPSHOT_FORMAT_VERSION};

/// Primary key of a row in an entity store.
pub type EntityId = i64;
