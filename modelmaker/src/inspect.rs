//! Implementation of the `inspect` subcommand of the modelmaker CLI.

use crate::io;
use anyhow::Context;
use clap::value_parser;
use log::info;
use modelmaker_lib::HistogramOverflowPolicy;
use modelmaker_lib::color_table::ColorTable;
use modelmaker_lib::histogram::{compute_histogram, histogram_bin_max};
use modelmaker_lib::profile;
use std::path::PathBuf;

/// Command line arguments for the `inspect` subcommand
#[derive(Clone, Debug, clap::Parser)]
pub(crate) struct InspectSubcommandArgs {
    /// Path to the label volume (supported formats: VTK legacy structured points, VTK XML image data)
    #[arg(value_parser = value_parser!(PathBuf))]
    pub input_volume: PathBuf,
    /// Color table used to show the names of the labels and to limit the histogram bins
    #[arg(long, value_parser = value_parser!(PathBuf))]
    pub color_table: Option<PathBuf>,
}

/// Executes the `inspect` subcommand
pub(crate) fn inspect_subcommand(cmd_args: &InspectSubcommandArgs) -> Result<(), anyhow::Error> {
    profile!("inspect subcommand");

    let volume = io::read_label_volume(&cmd_args.input_volume)?;
    let color_table = cmd_args
        .color_table
        .as_ref()
        .map(io::read_color_table)
        .transpose()?;

    info!("Scalar type: {:?}", volume.scalar_type());
    info!("IJK to RAS transform:{}", volume.ijk_to_ras());
    if volume.check_is_3d().is_err() {
        info!("The volume is not 3D, no models can be generated from it.");
    }

    let bin_max = histogram_bin_max(
        &volume,
        color_table.as_ref().map(ColorTable::number_of_colors),
        HistogramOverflowPolicy::Clamp,
    )
    .context("Failed to determine the number of histogram bins")?;
    let histogram = compute_histogram(&volume, bin_max);

    info!("Labels with voxels:");
    for (label, count) in histogram.iter().filter(|&(_, count)| count > 0) {
        match color_table.as_ref().and_then(|t| t.color_name(label)) {
            Some(name) => info!("  {:>6}: {:>10} voxels ({})", label, count, name),
            None => info!("  {:>6}: {:>10} voxels", label, count),
        }
    }

    match (histogram.min_positive_label(), histogram.max_label()) {
        (Some(min), Some(max)) => info!(
            "Generating all labels would process the labels {} to {} ({} with voxels).",
            min,
            max,
            histogram.num_non_empty_in(min..=max)
        ),
        _ => info!("The volume contains no foreground labels."),
    }

    Ok(())
}
