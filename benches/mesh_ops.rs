//! Benchmarks for simplification and reconstruction.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::Point3;
use progmesh::prelude::*;

fn create_grid_soup(n: usize) -> PolygonSoup {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    // Gently curved so the quadrics are not all degenerate
    for j in 0..=n {
        for i in 0..=n {
            let (x, y) = (i as f64, j as f64);
            vertices.push(Point3::new(x, y, (x * 0.3).sin() * (y * 0.2).cos()));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    PolygonSoup::new(vertices, faces)
}

fn bench_mesh_construction(c: &mut Criterion) {
    let soup = create_grid_soup(50);

    c.bench_function("build_grid_50x50", |b| {
        b.iter(|| {
            let mesh: HalfEdgeMesh = build_from_soup(&soup, BuildMode::Strict).unwrap();
            mesh
        });
    });

    c.bench_function("export_grid_50x50", |b| {
        let mesh: HalfEdgeMesh = build_from_soup(&soup, BuildMode::Strict).unwrap();
        b.iter(|| to_soup(&mesh).unwrap());
    });
}

fn bench_simplify(c: &mut Criterion) {
    let soup = create_grid_soup(30);
    let options = SimplifyOptions::new(100, 150);

    c.bench_function("edge_collapse_grid_30x30", |b| {
        b.iter(|| edge_collapse_with_record(&soup, &options));
    });

    let endpoint = options.clone().with_placement(PlacementKind::EndpointRestricted);
    c.bench_function("edge_collapse_grid_30x30_endpoint", |b| {
        b.iter(|| edge_collapse_with_record(&soup, &endpoint));
    });
}

fn bench_replay(c: &mut Criterion) {
    let soup = create_grid_soup(30);
    let options = SimplifyOptions::new(100, 150);

    c.bench_function("replay_grid_30x30", |b| {
        b.iter_batched(
            || {
                let mut mesh: HalfEdgeMesh = build_from_soup(&soup, BuildMode::Strict).unwrap();
                let stats = simplify_mesh(&mut mesh, &options);
                (mesh, stats.collapse_sequence)
            },
            |(mut mesh, records)| replay_reverse(&mut mesh, &records),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_mesh_construction, bench_simplify, bench_replay);
criterion_main!(benches);
