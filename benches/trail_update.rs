//! Benchmarks for the CPU-side trail and stage math.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec2, Vec4};

use trailshade::shader::mesh_shader;
use trailshade::stages::levels_from_texels;
use trailshade::{ColorBlendStage, DisplacementStage, TrailBuffer};

fn bench_trail_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("trail_update");

    for &(width, height) in &[(128u32, 72u32), (640, 360), (1280, 720)] {
        let label = format!("{}x{}", width, height);

        group.bench_with_input(BenchmarkId::new("impulse", &label), &(width, height), |b, &(w, h)| {
            let mut trail = TrailBuffer::new(w, h);
            let center = Vec2::new(w as f32, h as f32) * 0.5;
            b.iter(|| trail.update(black_box(Some(center))))
        });

        group.bench_with_input(BenchmarkId::new("decay_only", &label), &(width, height), |b, &(w, h)| {
            let mut trail = TrailBuffer::new(w, h);
            b.iter(|| trail.update(black_box(None)))
        });
    }

    group.bench_function("no_blur_1280x720", |b| {
        let mut trail = TrailBuffer::new(1280, 720).with_blur(0);
        b.iter(|| trail.update(black_box(Some(Vec2::new(640.0, 360.0)))))
    });

    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");

    let mut trail = TrailBuffer::new(256, 256);
    trail.update(Some(Vec2::new(128.0, 128.0)));

    group.bench_function("sample_bilinear", |b| {
        b.iter(|| black_box(trail.sample(black_box(Vec2::new(0.43, 0.57)))))
    });

    let blend = ColorBlendStage::default();
    let levels = levels_from_texels(Vec4::new(0.9, 0.6, 0.3, 1.0), Vec4::new(0.2, 0.1, 0.05, 1.0));
    group.bench_function("blend_scalar", |b| {
        b.iter(|| black_box(blend.blend_scalar(&levels, black_box(0.55))))
    });

    let displacement = DisplacementStage::default();
    group.bench_function("displace", |b| {
        b.iter(|| black_box(displacement.displace(black_box(glam::Vec3::new(0.3, -0.2, 1.1)), 0.4)))
    });

    group.finish();
}

fn bench_shader_gen(c: &mut Criterion) {
    c.bench_function("mesh_shader", |b| {
        let displacement = DisplacementStage::default();
        let blend = ColorBlendStage::default();
        b.iter(|| black_box(mesh_shader(&displacement, &blend)))
    });
}

criterion_group!(benches, bench_trail_update, bench_stages, bench_shader_gen);
criterion_main!(benches);
