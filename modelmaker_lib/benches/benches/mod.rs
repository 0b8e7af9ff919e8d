pub mod bench_decimation;
pub mod bench_isosurface;

use modelmaker_lib::{Label, LabelVolume};

/// Volume with nested spherical shells of different labels
pub fn shell_volume(n: usize, num_labels: Label) -> LabelVolume {
    let center = (n as f64 - 1.0) / 2.0;
    let max_radius = 0.45 * n as f64;

    let mut labels = Vec::with_capacity(n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let d = [i, j, k]
                    .iter()
                    .map(|&x| (x as f64 - center).powi(2))
                    .sum::<f64>()
                    .sqrt();
                let label = if d > max_radius {
                    0
                } else {
                    num_labels - ((d / max_radius) * num_labels as f64).min(num_labels as f64 - 1.0) as Label
                };
                labels.push(label);
            }
        }
    }

    LabelVolume::new([n, n, n], labels).unwrap()
}
