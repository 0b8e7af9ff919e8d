use criterion::{Criterion, criterion_group};
use modelmaker_lib::surface_nets::extract_isosurface;
use std::time::Duration;

use super::shell_volume;

pub fn isosurface_single_label(c: &mut Criterion) {
    let volume = shell_volume(96, 4);

    let mut group = c.benchmark_group("isosurface");
    group.sample_size(30);
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("isosurface_single_label", |b| {
        b.iter(|| {
            let mask = volume.mask_of(2);
            let mesh = extract_isosurface::<f32>(&mask, 1..=1).unwrap();
            std::hint::black_box(mesh)
        })
    });

    group.bench_function("isosurface_joint_labels", |b| {
        b.iter(|| {
            let mesh = extract_isosurface::<f32>(&volume, 1..=4).unwrap();
            std::hint::black_box(mesh)
        })
    });

    group.finish();
}

criterion_group!(bench_isosurface, isosurface_single_label);
