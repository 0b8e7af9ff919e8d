use criterion::{BatchSize, Criterion, criterion_group};
use modelmaker_lib::backend::{DecimationParameters, SmoothingParameters};
use modelmaker_lib::decimation::decimate;
use modelmaker_lib::smoothing::smooth;
use modelmaker_lib::surface_nets::extract_isosurface;
use std::time::Duration;

use super::shell_volume;

pub fn decimation_and_smoothing(c: &mut Criterion) {
    let mask = shell_volume(64, 3).mask_of(1);
    let mesh = extract_isosurface::<f64>(&mask, 1..=1).unwrap();

    let mut group = c.benchmark_group("mesh processing");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(15));

    group.bench_function("decimate_25_percent", |b| {
        b.iter_batched(
            || mesh.clone(),
            |mesh| decimate(mesh, &DecimationParameters::with_target_reduction(0.25)).unwrap(),
            BatchSize::LargeInput,
        )
    });

    group.bench_function("windowed_sinc_10_iterations", |b| {
        b.iter_batched(
            || mesh.clone(),
            |mesh| smooth(mesh, &SmoothingParameters::windowed_sinc(10)).unwrap(),
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(bench_decimation, decimation_and_smoothing);
