use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use sourcewatch::{compare, ContentKind, ShrinkGuard, Snapshot, Teaser};

fn listing(offset: usize, count: usize) -> Snapshot {
    Snapshot::new(
        ContentKind::Page,
        (offset..offset + count)
            .map(|i| Teaser::new(format!("headline {i}"), format!("https://example.org/{i}")))
            .collect(),
    )
}

fn bench_compare_unchanged(c: &mut Criterion) {
    let current = listing(0, 1000);
    let latest = listing(0, 1000);

    let mut group = c.benchmark_group("compare");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("unchanged_1000", |b| {
        b.iter(|| compare(black_box(&current), black_box(&latest), None, ShrinkGuard::Enforce));
    });
    group.finish();
}

fn bench_compare_with_additions(c: &mut Criterion) {
    let current = listing(0, 1000);
    // 50 rotated out, 50 new: key matching plus diff assembly.
    let latest = listing(50, 1000);

    let mut group = c.benchmark_group("compare");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("rolling_window_1000", |b| {
        b.iter(|| compare(black_box(&current), black_box(&latest), None, ShrinkGuard::Enforce));
    });
    group.finish();
}

fn bench_snapshot_digest(c: &mut Criterion) {
    let snapshot = listing(0, 1000);

    let mut group = c.benchmark_group("snapshot");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("digest_1000", |b| {
        b.iter(|| black_box(&snapshot).digest());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_compare_unchanged,
    bench_compare_with_additions,
    bench_snapshot_digest
);
criterion_main!(benches);
