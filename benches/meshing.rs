//! Benchmarks for the meshing pipeline.

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Point2;
use pavemesh::algo::pave::{pave, PaveOptions, PaveResult};
use pavemesh::algo::quad::{merge_triangles, QuadOptions};
use pavemesh::algo::redistribute::{redistribute_constant, RedistributeOptions};
use pavemesh::algo::relax::{relax, RelaxOptions};
use pavemesh::prelude::*;

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2<f64>> {
    vec![
        Point2::new(x0, y0),
        Point2::new(x1, y0),
        Point2::new(x1, y1),
        Point2::new(x0, y1),
    ]
}

fn paved_square(side: f64) -> PaveResult {
    let boundary =
        redistribute_constant(&rect(0.0, 0.0, side, side), true, 1.0, &RedistributeOptions::default())
            .unwrap();
    let size = ConstantSize::new(1.0).unwrap();
    pave(&Polygon::new(boundary, vec![]), &size, &PaveOptions::default())
        .unwrap()
}

fn bench_pave(c: &mut Criterion) {
    let boundary =
        redistribute_constant(&rect(0.0, 0.0, 20.0, 20.0), true, 1.0, &RedistributeOptions::default())
            .unwrap();
    let domain = Polygon::new(boundary, vec![]);
    let size = ConstantSize::new(1.0).unwrap();

    c.bench_function("pave_square_20", |b| {
        b.iter(|| pave(&domain, &size, &PaveOptions::default()).unwrap())
    });
}

fn bench_quads(c: &mut Criterion) {
    let mesh = paved_square(20.0).mesh;

    c.bench_function("merge_triangles_square_20", |b| {
        b.iter(|| {
            let mut m = mesh.clone();
            merge_triangles(&mut m, &[], &QuadOptions::default()).unwrap();
            m
        })
    });
}

fn bench_relax(c: &mut Criterion) {
    let PaveResult {
        mut mesh, fixed, ..
    } = paved_square(20.0);
    merge_triangles(&mut mesh, &[], &QuadOptions::default()).unwrap();

    c.bench_function("relax_square_20", |b| {
        b.iter(|| {
            let mut m = mesh.clone();
            relax(&mut m, &fixed, None, &RelaxOptions::default()).unwrap();
            m
        })
    });

    c.bench_function("relax_square_20_sequential", |b| {
        b.iter(|| {
            let mut m = mesh.clone();
            relax(&mut m, &fixed, None, &RelaxOptions::default().sequential()).unwrap();
            m
        })
    });
}

fn bench_multi_polygon(c: &mut Criterion) {
    let jobs: Vec<MeshingJob> = (0..8)
        .map(|i| {
            let x = i as f64 * 5.0;
            MeshingJob::new(rect(x, 0.0, x + 5.0, 5.0))
                .with_constant_size(0.5)
                .with_patch(false)
        })
        .collect();

    c.bench_function("mesh_polygons_8_parallel", |b| {
        b.iter(|| mesh_polygons(&jobs, &MesherOptions::default()).unwrap())
    });

    c.bench_function("mesh_polygons_8_sequential", |b| {
        b.iter(|| mesh_polygons(&jobs, &MesherOptions::default().sequential()).unwrap())
    });
}

criterion_group!(benches, bench_pave, bench_quads, bench_relax, bench_multi_polygon);
criterion_main!(benches);
