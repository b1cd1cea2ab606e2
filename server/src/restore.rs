//! Reconciliation engine: applies a [`Snapshot`] to the entity store.
//!
//! The whole restore runs in one transaction. Returning early with an error
//! drops the transaction handle, which rolls back every delete and insert
//! made so far.
//!
//! Kinds are processed parents first. Each trip's target id is recorded in
//! an [`IdMap`] whatever its outcome, and children look their trip up there;
//! a child whose trip did not resolve is counted as an orphan and never
//! written.

use crate::db::{self, points, settings, tags, trip_routes, trips, Pool};
use crate::error::Result;
use sqlx::SqliteConnection;
use waymark_engine::{
    Action, EntityId, EntityKind, IdMap, Outcome, Point, Record, RestorePolicy, RestoreReport,
    Route, Setting, Snapshot, Tag, Trip,
};

/// Restore `snapshot` into the store under `policy`.
pub async fn restore(
    pool: &Pool,
    snapshot: &Snapshot,
    policy: RestorePolicy,
) -> Result<RestoreReport> {
    let mut tx = pool.begin().await?;
    let mut restorer = Restorer::new(policy);

    if policy.clears_first() {
        restorer.clear(&mut *tx, snapshot).await?;
    }

    for kind in EntityKind::RESTORE_ORDER {
        if !snapshot.includes(kind) {
            continue;
        }
        restorer.report.touch(kind);

        match kind {
            EntityKind::Trip => restorer.trips(&mut *tx, snapshot.entities.trips()).await?,
            EntityKind::Route => restorer.routes(&mut *tx, snapshot.entities.routes()).await?,
            EntityKind::Point => restorer.points(&mut *tx, snapshot.entities.points()).await?,
            EntityKind::Tag => restorer.tags(&mut *tx, snapshot.entities.tags()).await?,
            EntityKind::Setting => {
                restorer
                    .settings(&mut *tx, snapshot.entities.settings())
                    .await?
            }
        }
    }

    tx.commit().await?;

    let report = restorer.report;
    tracing::info!(
        %policy,
        imported = report.total_imported(),
        updated = report.total_updated(),
        skipped = report.total_skipped(),
        "Restore committed"
    );

    Ok(report)
}

/// State for one restore call.
struct Restorer {
    policy: RestorePolicy,
    ids: IdMap,
    report: RestoreReport,
}

impl Restorer {
    fn new(policy: RestorePolicy) -> Self {
        Self {
            policy,
            ids: IdMap::new(),
            report: RestoreReport::new(),
        }
    }

    /// Delete every row of the included kinds, children first.
    async fn clear(&self, conn: &mut SqliteConnection, snapshot: &Snapshot) -> Result<()> {
        for kind in EntityKind::DELETION_ORDER {
            if snapshot.includes(kind) {
                let removed = db::delete_all(conn, kind).await?;
                tracing::debug!(%kind, removed, "Cleared kind before replace");
            }
        }
        Ok(())
    }

    /// Whether records are matched against existing rows.
    fn wants_match(&self) -> bool {
        self.policy.matches_existing()
    }

    /// Resolve a child's trip, counting an orphan when it is unknown.
    fn parent(&mut self, kind: EntityKind, source_trip: EntityId) -> Option<EntityId> {
        let resolved = self.ids.resolve(EntityKind::Trip, source_trip);
        if resolved.is_none() {
            tracing::debug!(%kind, source_trip, "Skipping record with unresolved trip");
            self.report.record(kind, Outcome::SkippedOrphan);
        }
        resolved
    }

    async fn trips(
        &mut self,
        conn: &mut SqliteConnection,
        records: &[Record<Trip>],
    ) -> Result<()> {
        for record in records {
            let (source_id, trip) = record.strip();

            let existing = if self.wants_match() {
                trips::find_match(conn, trip).await?
            } else {
                None
            };

            let (target, outcome) = match self.policy.action(existing) {
                Action::Insert => (trips::insert(conn, trip).await?, Outcome::Imported),
                Action::Update(id) => {
                    trips::update(conn, id, trip).await?;
                    (id, Outcome::Updated)
                }
                Action::Skip(id) => (id, Outcome::SkippedDuplicate),
            };

            if let Some(source_id) = source_id {
                self.ids.insert(EntityKind::Trip, source_id, target);
            }
            self.report.record(EntityKind::Trip, outcome);
        }
        Ok(())
    }

    async fn routes(
        &mut self,
        conn: &mut SqliteConnection,
        records: &[Record<Route>],
    ) -> Result<()> {
        for record in records {
            let (_, fields) = record.strip();
            let Some(trip_id) = self.parent(EntityKind::Route, fields.trip_id) else {
                continue;
            };
            let route = Route {
                trip_id,
                ..fields.clone()
            };

            let existing = if self.wants_match() {
                trip_routes::find_match(conn, &route).await?
            } else {
                None
            };

            let outcome = match self.policy.action(existing) {
                Action::Insert => {
                    trip_routes::insert(conn, &route).await?;
                    Outcome::Imported
                }
                Action::Update(id) => {
                    trip_routes::update(conn, id, &route).await?;
                    Outcome::Updated
                }
                Action::Skip(_) => Outcome::SkippedDuplicate,
            };
            self.report.record(EntityKind::Route, outcome);
        }
        Ok(())
    }

    async fn points(
        &mut self,
        conn: &mut SqliteConnection,
        records: &[Record<Point>],
    ) -> Result<()> {
        for record in records {
            let (_, fields) = record.strip();
            let Some(trip_id) = self.parent(EntityKind::Point, fields.trip_id) else {
                continue;
            };
            let point = Point {
                trip_id,
                ..fields.clone()
            };

            let existing = if self.wants_match() {
                points::find_match(conn, &point).await?
            } else {
                None
            };

            let outcome = match self.policy.action(existing) {
                Action::Insert => {
                    points::insert(conn, &point).await?;
                    Outcome::Imported
                }
                Action::Update(id) => {
                    points::update(conn, id, &point).await?;
                    Outcome::Updated
                }
                Action::Skip(_) => Outcome::SkippedDuplicate,
            };
            self.report.record(EntityKind::Point, outcome);
        }
        Ok(())
    }

    async fn tags(
        &mut self,
        conn: &mut SqliteConnection,
        records: &[Record<Tag>],
    ) -> Result<()> {
        for record in records {
            let (_, fields) = record.strip();
            let Some(trip_id) = self.parent(EntityKind::Tag, fields.trip_id) else {
                continue;
            };
            let tag = Tag {
                trip_id,
                tag_name: fields.tag_name.clone(),
            };

            let existing = if self.wants_match() {
                tags::find_match(conn, &tag).await?
            } else {
                None
            };

            let outcome = match self.policy.action(existing) {
                // Case variants within one snapshot collapse onto the first.
                Action::Insert => match tags::insert_or_ignore(conn, &tag).await? {
                    Some(_) => Outcome::Imported,
                    None => Outcome::SkippedDuplicate,
                },
                // A tag is all natural key: nothing to update.
                Action::Update(_) | Action::Skip(_) => Outcome::SkippedDuplicate,
            };
            self.report.record(EntityKind::Tag, outcome);
        }
        Ok(())
    }

    async fn settings(
        &mut self,
        conn: &mut SqliteConnection,
        records: &[Record<Setting>],
    ) -> Result<()> {
        for record in records {
            let (_, setting) = record.strip();

            let existing = if self.wants_match() {
                settings::find_match(conn, setting).await?
            } else {
                None
            };

            let outcome = match self.policy.action(existing) {
                Action::Insert => match settings::insert_or_ignore(conn, setting).await? {
                    Some(_) => Outcome::Imported,
                    None => Outcome::SkippedDuplicate,
                },
                Action::Update(id) => {
                    settings::update(conn, id, setting).await?;
                    Outcome::Updated
                }
                Action::Skip(_) => Outcome::SkippedDuplicate,
            };
            self.report.record(EntityKind::Setting, outcome);
        }
        Ok(())
    }
}
