use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use amr_decomp::geometry::{IndexBox, IntVector};
use amr_decomp::partition::AssumedPartitionBox;

fn domain(extent: i64) -> IndexBox<3> {
    IndexBox::new(IntVector::zero(), IntVector::splat(extent - 1))
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("assumed_partition");

    // Construction cost over a few domain/rank scales
    for &(extent, ranks) in &[(64_i64, 16_usize), (256, 512), (1024, 8192)] {
        group.bench_with_input(
            BenchmarkId::new(format!("partition_{extent}cubed"), ranks),
            &ranks,
            |b, &ranks| {
                let box_ = domain(extent);
                b.iter(|| {
                    // just measure timing
                    let _ = AssumedPartitionBox::new(box_, 0, ranks, 0, 1.0, false).unwrap();
                });
            },
        );
    }

    let part = AssumedPartitionBox::new(domain(256), 0, 512, 0, 1.0, false).unwrap();

    group.bench_function("owner_sweep_512", |b| {
        b.iter(|| {
            for i in part.begin()..part.end() {
                let _ = part.owner(i).unwrap();
            }
        });
    });

    group.bench_function("find_overlaps_512", |b| {
        let probe = IndexBox::new(IntVector::splat(100), IntVector::splat(140));
        b.iter(|| {
            let _ = part.find_overlaps(&probe);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_partition);
criterion_main!(benches);
