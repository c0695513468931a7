use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qserv_geom::{cartesian, htm_id, SphericalBox, SphericalTriangle};

/// A lon/lat grid of unit vectors, used to avoid measuring branch
/// prediction on a single repeated input.
fn sample_points(n: usize) -> Vec<qserv_geom::Vec3> {
    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            cartesian(t * 360.0, t * 180.0 - 90.0)
        })
        .collect()
}

fn bench_htm_id(c: &mut Criterion) {
    let points = sample_points(1024);
    let mut group = c.benchmark_group("htm_id");
    for level in [0, 7, 13] {
        group.throughput(Throughput::Elements(points.len() as u64));
        group.bench_with_input(BenchmarkId::new("level", level), &level, |b, &level| {
            b.iter(|| {
                for v in &points {
                    black_box(htm_id(v, level).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_triangle_intersection(c: &mut Criterion) {
    let tri = SphericalTriangle::from_htm_id(htm_id(&cartesian(10.0, 10.0), 4).unwrap()).unwrap();
    let boxes = [
        SphericalBox::new(0.0, 360.0, -90.0, 90.0).unwrap(),
        SphericalBox::new(5.0, 15.0, 5.0, 15.0).unwrap(),
        SphericalBox::new(9.0, 11.0, 9.0, 11.0).unwrap(),
    ];
    let mut group = c.benchmark_group("triangle_intersection_area");
    for (i, box_) in boxes.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("box", i), box_, |b, box_| {
            b.iter(|| black_box(tri.intersection_area(box_)));
        });
    }
    group.finish();
}

fn bench_box_htm_ids(c: &mut Criterion) {
    let box_ = SphericalBox::new(30.0, 60.0, -20.0, 20.0).unwrap();
    let mut group = c.benchmark_group("box_htm_ids");
    for level in [4, 8, 10] {
        group.bench_with_input(BenchmarkId::new("level", level), &level, |b, &level| {
            b.iter(|| black_box(box_.htm_ids(level).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_htm_id,
    bench_triangle_intersection,
    bench_box_htm_ids
);
criterion_main!(benches);
