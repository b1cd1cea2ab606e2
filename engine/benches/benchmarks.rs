//! Performance benchmarks for waymark-engine

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use waymark_engine::{
    archive, Asset, EntityKind, EntityRecord, IdMap, Point, Record, RestorePolicy, Snapshot, Tag,
    Trip,
};

fn create_snapshot(trips: i64, points_per_trip: i64) -> Snapshot {
    let mut snapshot = Snapshot::new(EntityKind::ALL, "waymark bench");
    let mut next_id = 1;

    for t in 1..=trips {
        snapshot.entities.push(EntityRecord::Trip(Record::new(
            Some(t),
            Trip {
                title: format!("Trip {t}"),
                description: Some("A long weekend somewhere".into()),
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1),
                end_date: NaiveDate::from_ymd_opt(2024, 4, 10),
                color_hex: Some("#336699".into()),
                status: "completed".into(),
            },
        )));
        snapshot.entities.push(EntityRecord::Tag(Record::new(
            Some(t),
            Tag {
                trip_id: t,
                tag_name: format!("tag-{t}"),
            },
        )));
        for _ in 0..points_per_trip {
            snapshot.entities.push(EntityRecord::Point(Record::new(
                Some(next_id),
                Point {
                    trip_id: t,
                    title: format!("Point {next_id}"),
                    description: None,
                    point_type: Some("sight".into()),
                    icon: Some("camera".into()),
                    image_path: Some(format!("uploads/points/p{next_id}.jpg")),
                    latitude: 35.0 + next_id as f64 * 0.001,
                    longitude: 139.0,
                    visit_date: Some("2024-04-02".into()),
                },
            )));
            next_id += 1;
        }
    }

    snapshot
}

fn bench_snapshot_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_codec");

    for trips in [10, 100, 500] {
        let snapshot = create_snapshot(trips, 10);
        let json = snapshot.to_json().unwrap();

        group.bench_with_input(BenchmarkId::new("to_json", trips), &snapshot, |b, s| {
            b.iter(|| black_box(s).to_json())
        });

        group.bench_with_input(BenchmarkId::new("from_json", trips), &json, |b, json| {
            b.iter(|| Snapshot::from_json(black_box(json)))
        });
    }

    group.finish();
}

fn bench_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive");

    let snapshot = create_snapshot(50, 10);
    let assets: Vec<Asset> = (1..=100)
        .map(|i| Asset::new(format!("uploads/points/p{i}.jpg"), vec![0xAB; 16 * 1024]))
        .collect();

    group.bench_function("encode_plain", |b| {
        b.iter(|| archive::encode(black_box(&snapshot), &[]))
    });

    group.bench_function("encode_bundle", |b| {
        b.iter(|| archive::encode(black_box(&snapshot), black_box(&assets)))
    });

    let bundle = archive::encode(&snapshot, &assets).unwrap();
    group.bench_function("decode_bundle", |b| {
        b.iter(|| archive::decode(black_box(&bundle.bytes)))
    });

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    group.bench_function("id_map_10k", |b| {
        b.iter(|| {
            let mut ids = IdMap::new();
            for i in 0..10_000 {
                ids.insert(EntityKind::Trip, i, i + 1_000_000);
            }
            (0..10_000)
                .filter_map(|i| ids.resolve(EntityKind::Trip, black_box(i)))
                .count()
        })
    });

    group.bench_function("policy_action", |b| {
        b.iter(|| {
            RestorePolicy::UpdateExisting
                .action(black_box(Some(42)))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_snapshot_codec, bench_archive, bench_reconcile);
criterion_main!(benches);
