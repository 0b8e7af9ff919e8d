//! Per-label voxel counts of a label volume
//!
//! The histogram is used to skip labels without voxels before any geometry is computed and to
//! resolve the "generate all" label mode.

use crate::{Label, LabelVolume, PipelineError, profile};
use log::{info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Hard upper bound for the number of histogram bins
pub const MAX_HISTOGRAM_BINS: Label = 1_000_000;

/// Policy applied when the natural number of histogram bins exceeds [`MAX_HISTOGRAM_BINS`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HistogramOverflowPolicy {
    /// Clamp the bins and log a warning, labels above the clamp are treated as empty
    #[default]
    Clamp,
    /// Abort with a configuration error
    Error,
}

/// Mapping from label value to number of voxels with that label
///
/// A histogram computed from a volume stores a dense range of bins between the smallest and the
/// largest counted label (including empty bins in between).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelHistogram {
    bins: BTreeMap<Label, u64>,
}

impl LabelHistogram {
    /// Creates a histogram from explicit `(label, count)` pairs
    pub fn from_counts<I: IntoIterator<Item = (Label, u64)>>(counts: I) -> Self {
        Self {
            bins: counts.into_iter().collect(),
        }
    }

    /// Number of voxels with the given label, zero for labels without a bin
    pub fn count(&self, label: Label) -> u64 {
        self.bins.get(&label).copied().unwrap_or(0)
    }

    /// Iterator over all bins in ascending label order
    pub fn iter(&self) -> impl Iterator<Item = (Label, u64)> + '_ {
        self.bins.iter().map(|(&l, &c)| (l, c))
    }

    /// Iterator over the labels of all bins in the given range in ascending order
    pub fn bins_in(&self, range: RangeInclusive<Label>) -> impl Iterator<Item = Label> + '_ {
        self.bins.range(range).map(|(&l, _)| l)
    }

    /// The smallest positive label with at least one voxel
    pub fn min_positive_label(&self) -> Option<Label> {
        self.bins
            .range(1..)
            .find(|(_, c)| **c > 0)
            .map(|(&l, _)| l)
    }

    /// The largest label with at least one voxel
    pub fn max_label(&self) -> Option<Label> {
        self.bins
            .iter()
            .rev()
            .find(|(_, c)| **c > 0)
            .map(|(&l, _)| l)
    }

    /// Number of labels in the given range with at least one voxel
    pub fn num_non_empty_in(&self, range: RangeInclusive<Label>) -> usize {
        self.bins.range(range).filter(|(_, c)| **c > 0).count()
    }
}

/// Returns the index of the last histogram bin
///
/// With a color table this is `number_of_colors - 1` and fails if the table has no colors.
/// Otherwise it is derived from the largest value of the volume's scalar type, and values beyond
/// [`MAX_HISTOGRAM_BINS`] are handled according to the overflow policy.
pub fn histogram_bin_max(
    volume: &LabelVolume,
    number_of_colors: Option<usize>,
    policy: HistogramOverflowPolicy,
) -> Result<Label, PipelineError> {
    if let Some(number_of_colors) = number_of_colors {
        return match number_of_colors.checked_sub(1) {
            Some(max) => Label::try_from(max).map_err(|_| {
                PipelineError::ColorLookup(format!(
                    "the color table has too many colors ({})",
                    number_of_colors
                ))
            }),
            None => Err(PipelineError::ColorLookup(
                "the color table has no colors".to_string(),
            )),
        };
    }

    let natural_max = (volume.scalar_type().max_value() - 1.0).floor();
    if natural_max > MAX_HISTOGRAM_BINS as f64 {
        match policy {
            HistogramOverflowPolicy::Clamp => {
                warn!(
                    "Natural histogram maximum {} exceeds {}, clamping. Labels above this value will be treated as empty.",
                    natural_max, MAX_HISTOGRAM_BINS
                );
                Ok(MAX_HISTOGRAM_BINS)
            }
            HistogramOverflowPolicy::Error => Err(PipelineError::config(format!(
                "the natural histogram maximum {} exceeds the supported number of bins ({})",
                natural_max, MAX_HISTOGRAM_BINS
            ))),
        }
    } else {
        Ok(natural_max.max(0.0) as Label)
    }
}

/// Counts the voxels of every label in `[0, bin_max]`, labels outside of this range are ignored
pub fn compute_histogram(volume: &LabelVolume, bin_max: Label) -> LabelHistogram {
    profile!("compute_histogram");

    let num_bins = bin_max.max(0) as usize + 1;
    let counts = volume
        .labels()
        .par_chunks(1 << 16)
        .fold(
            || vec![0u64; num_bins],
            |mut counts, chunk| {
                for &label in chunk {
                    if label >= 0 && label <= bin_max {
                        counts[label as usize] += 1;
                    }
                }
                counts
            },
        )
        .reduce(
            || vec![0u64; num_bins],
            |mut a, b| {
                a.iter_mut().zip(b.iter()).for_each(|(a, b)| *a += b);
                a
            },
        );

    let first = counts.iter().position(|&c| c > 0);
    let last = counts.iter().rposition(|&c| c > 0);

    let histogram = match (first, last) {
        (Some(first), Some(last)) => LabelHistogram::from_counts(
            (first..=last).map(|l| (l as Label, counts[l])),
        ),
        _ => LabelHistogram::default(),
    };

    info!(
        "Computed label histogram with {} non-empty labels (bins 0 to {}).",
        histogram.iter().filter(|(_, c)| *c > 0).count(),
        bin_max
    );

    histogram
}
