//! Implementation of the `make` subcommand of the modelmaker CLI.

use crate::cli::Switch;
use crate::io::{self, OutputFormat};
use crate::logging;
use anyhow::{Context, anyhow};
use clap::{Parser, value_parser};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use modelmaker_lib::color_table::ColorTable;
use modelmaker_lib::labels::UNSET_LABEL;
use modelmaker_lib::mesh::SurfaceMesh;
use modelmaker_lib::nalgebra::Matrix4;
use modelmaker_lib::pipeline::{ExtractionEvent, ExtractionOutcome, ExtractionSink, SkipReason};
use modelmaker_lib::progress::ProgressObserver;
use modelmaker_lib::scene::{SceneManifest, SceneTarget, read_hierarchy_template};
use modelmaker_lib::{
    ExtractionInput, HistogramOverflowPolicy, Label, LabelSpec, LabelVolume, NativeBackend,
    PipelineConfig, PipelineError, Real, SinkError, SmoothingFilter, extract_models, profile,
};
use std::path::PathBuf;

static ARGS_IO: &str = "Input/output";
static ARGS_LABELS: &str = "Label selection";
static ARGS_PROC: &str = "Mesh processing";
static ARGS_SCENE: &str = "Naming and scene";
static ARGS_ADV: &str = "Advanced parameters";
static ARGS_DEBUG: &str = "Debug options";
static ARGS_OTHER: &str = "Remaining options";

/// Number of steps of the progress bar
const PROGRESS_BAR_STEPS: u64 = 1000;

/// Smoothing filter applied to the models of the individual labels
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum FilterType {
    Sinc,
    Laplacian,
}

/// Behavior if the labels of the volume exceed the maximum number of histogram bins
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum HistogramOverflow {
    Clamp,
    Error,
}

/// Command line arguments for the `make` subcommand
#[derive(Clone, Debug, clap::Parser)]
#[command(next_help_heading = ARGS_OTHER)]
pub(crate) struct MakeSubcommandArgs {
    /// Path to the label volume (supported formats: VTK legacy structured points, VTK XML image data)
    #[arg(help_heading = ARGS_IO, value_parser = value_parser!(PathBuf))]
    pub input_volume: PathBuf,
    /// Scene file that records the generated models, optionally followed by "#<hierarchy id>" (default: "<input name>.mrml.json"). The models are written to the directory of this file.
    #[arg(help_heading = ARGS_IO, long)]
    pub model_scene_file: Option<String>,
    /// File format of the written models
    #[arg(help_heading = ARGS_IO, long, value_enum, default_value = "vtk", ignore_case = true)]
    pub output_format: OutputFormat,

    /// Labels to generate models for
    #[arg(help_heading = ARGS_LABELS, long, num_args = 1..)]
    pub labels: Vec<Label>,
    /// First label of a range of labels to generate models for (requires end-label)
    #[arg(help_heading = ARGS_LABELS, long, default_value_t = UNSET_LABEL, allow_negative_numbers = true)]
    pub start_label: Label,
    /// Last label of a range of labels to generate models for (requires start-label)
    #[arg(help_heading = ARGS_LABELS, long, default_value_t = UNSET_LABEL, allow_negative_numbers = true)]
    pub end_label: Label,
    /// Generate models for all labels of the volume, from the smallest positive label to the largest label (overrides labels and the label range)
    #[arg(
        help_heading = ARGS_LABELS,
        long,
        default_value = "off",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub generate_all: Switch,

    /// Number of smoothing iterations (0 disables smoothing)
    #[arg(help_heading = ARGS_PROC, long, default_value = "10")]
    pub smooth: usize,
    /// Target reduction of the number of triangles by decimation (in the range [0, 1])
    #[arg(help_heading = ARGS_PROC, long, default_value = "0.25")]
    pub decimate: f64,
    /// Smoothing filter used for the models of individual labels
    #[arg(help_heading = ARGS_PROC, long, value_enum, default_value = "sinc", ignore_case = true)]
    pub filter_type: FilterType,
    /// Extract and smooth the surfaces of all labels together before separating them (only when generating several models)
    #[arg(
        help_heading = ARGS_PROC,
        long,
        default_value = "off",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub joint_smoothing: Switch,
    /// Split normals at sharp edges
    #[arg(
        help_heading = ARGS_PROC,
        long,
        default_value = "on",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub split_normals: Switch,
    /// Compute point normals (otherwise cell normals)
    #[arg(
        help_heading = ARGS_PROC,
        long,
        default_value = "on",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub point_normals: Switch,
    /// Pad the volume by one voxel on every side to close models that touch the border of the volume
    #[arg(
        help_heading = ARGS_PROC,
        long,
        default_value = "off",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub pad: Switch,

    /// Base name of the models
    #[arg(help_heading = ARGS_SCENE, long, default_value = "Model")]
    pub name: String,
    /// Color table used to name and color the models (lines of "index name r g b a")
    #[arg(help_heading = ARGS_SCENE, long, value_parser = value_parser!(PathBuf))]
    pub color_table: Option<PathBuf>,
    /// Hierarchy template (JSON list of nodes with "name" and "parent"), models are placed below the node named like their color
    #[arg(help_heading = ARGS_SCENE, long, value_parser = value_parser!(PathBuf))]
    pub model_hierarchy_file: Option<PathBuf>,
    /// Skip labels without a name in the color table
    #[arg(
        help_heading = ARGS_SCENE,
        long,
        default_value = "off",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub skip_unnamed: Switch,

    /// Enable the use of double precision for the meshes
    #[arg(
        help_heading = ARGS_ADV,
        short = 'd',
        long,
        default_value = "off",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub double_precision: Switch,
    /// Behavior if the labels of the volume exceed the maximum number of histogram bins
    #[arg(help_heading = ARGS_ADV, long, value_enum, default_value = "clamp", ignore_case = true)]
    pub histogram_overflow: HistogramOverflow,
    /// Transform from voxel indices to physical coordinates as 16 values in row-major order (default: derived from the spacing and origin of the volume)
    #[arg(
        help_heading = ARGS_ADV,
        long,
        num_args = 16,
        value_name = "M",
        allow_negative_numbers = true
    )]
    pub ijk_to_ras: Option<Vec<f64>>,

    /// Write the meshes after isosurface extraction, decimation and smoothing as additional models
    #[arg(
        help_heading = ARGS_DEBUG,
        long,
        default_value = "off",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub save_intermediate_models: Switch,
    /// Print the labels with voxels and additional diagnostics
    #[arg(
        help_heading = ARGS_DEBUG,
        long,
        default_value = "off",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub debug: Switch,
}

/// Everything the `make` subcommand needs after validating the command line
pub(crate) struct MakeRunnerArgs {
    pub labels: LabelSpec,
    pub config: PipelineConfig,
    pub base_name: String,
    pub scene: SceneTarget,
    pub output_format: OutputFormat,
    pub ijk_to_ras: Option<Matrix4<f64>>,
    pub double_precision: bool,
}

impl TryFrom<&MakeSubcommandArgs> for MakeRunnerArgs {
    type Error = anyhow::Error;

    fn try_from(args: &MakeSubcommandArgs) -> Result<Self, Self::Error> {
        let labels = LabelSpec::from_inputs(
            &args.labels,
            args.start_label,
            args.end_label,
            args.generate_all.into_bool(),
        )?;

        let config = PipelineConfig {
            smooth_iterations: args.smooth,
            decimate_target_reduction: args.decimate,
            joint_smoothing: args.joint_smoothing.into_bool(),
            split_normals: args.split_normals.into_bool(),
            point_normals: args.point_normals.into_bool(),
            pad: args.pad.into_bool(),
            filter_kind: match args.filter_type {
                FilterType::Sinc => SmoothingFilter::WindowedSinc,
                FilterType::Laplacian => SmoothingFilter::Laplacian,
            },
            save_intermediate: args.save_intermediate_models.into_bool(),
            skip_unnamed_labels: args.skip_unnamed.into_bool(),
            histogram_overflow: match args.histogram_overflow {
                HistogramOverflow::Clamp => HistogramOverflowPolicy::Clamp,
                HistogramOverflow::Error => HistogramOverflowPolicy::Error,
            },
            debug: args.debug.into_bool(),
        };
        config.validate()?;

        let scene = match &args.model_scene_file {
            Some(target) => SceneTarget::parse(target),
            None => {
                let stem = args
                    .input_volume
                    .file_stem()
                    .ok_or_else(|| anyhow!("Invalid input volume path \"{}\"", args.input_volume.display()))?
                    .to_string_lossy();
                let target = SceneTarget::parse(&format!("{}.mrml.json", stem));
                warn!(
                    "No model scene file given, writing the scene to \"{}\".",
                    target.path.display()
                );
                target
            }
        };

        let ijk_to_ras = args
            .ijk_to_ras
            .as_ref()
            .map(|values| Matrix4::from_row_slice(values));

        Ok(Self {
            labels,
            config,
            base_name: args.name.clone(),
            scene,
            output_format: args.output_format,
            ijk_to_ras,
            double_precision: args.double_precision.into_bool(),
        })
    }
}

/// Executes the `make` subcommand
pub(crate) fn make_subcommand(cmd_args: &MakeSubcommandArgs) -> Result<(), anyhow::Error> {
    profile!("make subcommand");

    let args = MakeRunnerArgs::try_from(cmd_args)
        .context("Failed processing parameters from command line")?;

    let mut volume = io::read_label_volume(&cmd_args.input_volume)?;
    if let Some(ijk_to_ras) = args.ijk_to_ras {
        info!("Using the IJK to RAS transform from the command line.");
        volume = volume.with_ijk_to_ras(ijk_to_ras);
    }

    let color_table = cmd_args
        .color_table
        .as_ref()
        .map(|path| {
            io::read_color_table(path).map_err(|e| PipelineError::ColorLookup(format!("{:#}", e)))
        })
        .transpose()?;

    let outcome = if args.double_precision {
        make_models::<f64>(&volume, color_table.as_ref(), &args, cmd_args)?
    } else {
        make_models::<f32>(&volume, color_table.as_ref(), &args, cmd_args)?
    };

    info!(
        "Successfully generated {} model(s) from {} label(s).",
        outcome.summary.made_labels().len(),
        outcome.selection.len()
    );
    Ok(())
}

/// Parses the arguments of the `make` subcommand and executes it without initializing logging
///
/// The first argument is ignored like the binary name of a command line.
pub fn run_make<I, T>(args: I) -> Result<(), anyhow::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cmd_args = MakeSubcommandArgs::try_parse_from(args)?;
    make_subcommand(&cmd_args)
}

/// Runs the pipeline, writes the models and the scene
fn make_models<R: Real>(
    volume: &LabelVolume,
    color_table: Option<&ColorTable>,
    args: &MakeRunnerArgs,
    cmd_args: &MakeSubcommandArgs,
) -> Result<ExtractionOutcome, anyhow::Error> {
    let mut scene = SceneManifest::load_or_default(&args.scene.path)?;
    let root_id = scene.ensure_root(args.scene.hierarchy_id.as_deref());
    if let Some(template_path) = &cmd_args.model_hierarchy_file {
        let template = read_hierarchy_template(template_path)?;
        scene
            .apply_template(&template, &root_id)
            .context("Failed to apply the model hierarchy template")?;
    }

    let mut writer = ModelWriter {
        root_dir: args.scene.root_dir(),
        format: args.output_format,
        color_table,
        scene: &mut scene,
        root_id: &root_id,
    };

    let pb = ProgressBar::new(PROGRESS_BAR_STEPS);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40}] {percent}% {msg}",
        )
        .context("Invalid progress bar template")?
        .progress_chars("=> "),
    );
    logging::set_progress_bar(Some(pb.downgrade()));

    let mut observer = |stage: &str, fraction: f64| {
        pb.set_position((fraction * PROGRESS_BAR_STEPS as f64).round() as u64);
        pb.set_message(stage.to_string());
    };

    let input = ExtractionInput {
        volume,
        labels: args.labels.clone(),
        base_name: &args.base_name,
        color_table,
    };
    let result = extract_models::<R, _, _>(
        &NativeBackend,
        &input,
        &args.config,
        &mut writer,
        Some(&mut observer as &mut dyn ProgressObserver),
    );

    pb.finish_and_clear();
    logging::set_progress_bar(None);
    let outcome = result?;

    scene.prune_empty_template_nodes();
    scene
        .save(&args.scene.path)
        .context("Failed to write the model scene")?;
    info!(
        "Wrote scene \"{}\" with {} model(s).",
        args.scene.path.display(),
        scene.models.len()
    );

    Ok(outcome)
}

/// Sink that writes every model to a file and records the final models in the scene
struct ModelWriter<'a> {
    root_dir: PathBuf,
    format: OutputFormat,
    color_table: Option<&'a ColorTable>,
    scene: &'a mut SceneManifest,
    root_id: &'a str,
}

impl ModelWriter<'_> {
    fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.format.extension())
    }

    fn write<R: Real>(&self, mesh: &SurfaceMesh<R>, name: &str) -> Result<(), anyhow::Error> {
        let path = self.root_dir.join(self.file_name(name));
        debug!("Writing model \"{}\" to \"{}\"", name, path.display());
        io::write_mesh(mesh, &path, self.format, name)
    }
}

impl<R: Real> ExtractionSink<R> for ModelWriter<'_> {
    fn consume(&mut self, event: ExtractionEvent<'_, R>) -> Result<(), SinkError> {
        match event {
            ExtractionEvent::Intermediate {
                name, kind, mesh, ..
            } => {
                let name = format!("{}{}", name, kind.suffix());
                self.write(mesh, &name)?;
            }
            ExtractionEvent::Produced(result) => {
                self.write(&result.mesh, &result.name)?;

                let color = self
                    .color_table
                    .and_then(|table| table.color(result.label))
                    .map(|[r, g, b, _]| [r, g, b]);
                let group = self
                    .color_table
                    .and_then(|table| table.color_name(result.label))
                    .map_or_else(|| result.label.to_string(), str::to_string);
                let file_name = self.file_name(&result.name);
                self.scene.add_model(
                    &result.name,
                    result.label,
                    &file_name,
                    color,
                    &group,
                    self.root_id,
                );
            }
            ExtractionEvent::Skipped { label, reason } => {
                if reason == SkipReason::Unnamed {
                    debug!("No model written for unnamed label {}", label);
                }
            }
        }
        Ok(())
    }
}

