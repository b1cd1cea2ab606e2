//! Snapshot builder: reads the entity store into a [`Snapshot`].

use crate::db::{self, Pool};
use crate::error::Result;
use std::collections::BTreeSet;
use waymark_engine::{EntityKind, EntityRecord, Snapshot};

/// Tool version stamped into every snapshot.
pub fn app_version() -> String {
    format!("waymark-server {}", env!("CARGO_PKG_VERSION"))
}

/// Export every row of the requested kinds, ordered by id.
///
/// All reads share one transaction. Nothing is written.
pub async fn build_snapshot(pool: &Pool, kinds: &BTreeSet<EntityKind>) -> Result<Snapshot> {
    let mut tx = pool.begin().await?;
    let mut snapshot = Snapshot::new(kinds.iter().copied(), app_version());

    for kind in kinds {
        match kind {
            EntityKind::Trip => {
                for row in db::trips::list_all(&mut *tx).await? {
                    snapshot.entities.push(EntityRecord::Trip(row.into_record()));
                }
            }
            EntityKind::Route => {
                for row in db::trip_routes::list_all(&mut *tx).await? {
                    snapshot.entities.push(EntityRecord::Route(row.into_record()));
                }
            }
            EntityKind::Point => {
                for row in db::points::list_all(&mut *tx).await? {
                    snapshot.entities.push(EntityRecord::Point(row.into_record()));
                }
            }
            EntityKind::Tag => {
                for row in db::tags::list_all(&mut *tx).await? {
                    snapshot.entities.push(EntityRecord::Tag(row.into_record()));
                }
            }
            EntityKind::Setting => {
                for row in db::settings::list_all(&mut *tx).await? {
                    snapshot.entities.push(EntityRecord::Setting(row.into_record()));
                }
            }
        }
    }

    tx.commit().await?;

    tracing::info!(
        kinds = ?kinds,
        records = snapshot.record_count(),
        "Built snapshot"
    );

    Ok(snapshot)
}
