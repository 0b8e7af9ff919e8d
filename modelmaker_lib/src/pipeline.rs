//! The extraction pipeline: turns a label volume into one surface mesh per label
//!
//! The labels are processed strictly one after another. For every label the geometry stages of the
//! [`GeometryBackend`] are chained and every produced mesh is handed to an [`ExtractionSink`]
//! right away. With joint smoothing, the surfaces of all labels are extracted and smoothed
//! together first and the meshes of the individual labels are cut out of the smoothed surface.

use crate::backend::{DecimationParameters, GeometryBackend, NormalsParameters, SmoothingParameters};
use crate::color_table::ColorTable;
use crate::histogram::{LabelHistogram, compute_histogram, histogram_bin_max};
use crate::labels::{ExtractionMode, LabelSelection, LabelSpec, resolve};
use crate::mesh::SurfaceMesh;
use crate::naming::{ArtifactNamer, ModelName, RunSummary};
use crate::progress::{ProgressObserver, ProgressPlan, ProgressTracker, Stage};
use crate::{GeometryError, Label, LabelVolume, PipelineConfig, PipelineError, Real, SinkError, profile};
use itertools::Itertools;
use log::{debug, info, trace, warn};
use nalgebra::Matrix4;
use std::borrow::Cow;

/// The kind of an intermediate mesh that is saved for debugging
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntermediateKind {
    /// Directly after the isosurface extraction
    MarchingCubes,
    /// After decimation
    Decimated,
    /// After smoothing
    Smoothed,
}

impl IntermediateKind {
    /// Suffix appended to the model name of the intermediate mesh
    pub fn suffix(self) -> &'static str {
        match self {
            IntermediateKind::MarchingCubes => "-MarchingCubes",
            IntermediateKind::Decimated => "-Decimated",
            IntermediateKind::Smoothed => "-Smoothed",
        }
    }
}

/// Why a label did not produce a model
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The histogram has no voxels for the label
    NoVoxels,
    /// The isosurface of the label has no polygons
    EmptySurface,
    /// The label has no usable color name and unnamed labels are skipped
    Unnamed,
}

/// The final mesh of a label
#[derive(Clone, Debug)]
pub struct ExtractionResult<R: Real> {
    pub label: Label,
    /// Name of the model, without suffix or file extension
    pub name: String,
    /// Stripped mesh with normals in physical coordinates
    pub mesh: SurfaceMesh<R>,
}

/// Events emitted by the pipeline to its [`ExtractionSink`]
#[derive(Debug)]
pub enum ExtractionEvent<'a, R: Real> {
    /// An intermediate mesh (only emitted if intermediate models are saved)
    Intermediate {
        label: Label,
        name: &'a str,
        kind: IntermediateKind,
        mesh: &'a SurfaceMesh<R>,
    },
    /// The final model of a label
    Produced(ExtractionResult<R>),
    /// The label did not produce a model
    Skipped { label: Label, reason: SkipReason },
}

/// Consumer of the meshes produced by the pipeline, e.g. a writer of mesh files
pub trait ExtractionSink<R: Real> {
    fn consume(&mut self, event: ExtractionEvent<'_, R>) -> Result<(), SinkError>;
}

impl<R: Real, F> ExtractionSink<R> for F
where
    F: FnMut(ExtractionEvent<'_, R>) -> Result<(), SinkError>,
{
    fn consume(&mut self, event: ExtractionEvent<'_, R>) -> Result<(), SinkError> {
        self(event)
    }
}

/// Sink that keeps all final models in memory and ignores everything else
#[derive(Clone, Debug)]
pub struct CollectingSink<R: Real> {
    pub results: Vec<ExtractionResult<R>>,
}

impl<R: Real> Default for CollectingSink<R> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
        }
    }
}

impl<R: Real> ExtractionSink<R> for CollectingSink<R> {
    fn consume(&mut self, event: ExtractionEvent<'_, R>) -> Result<(), SinkError> {
        if let ExtractionEvent::Produced(result) = event {
            self.results.push(result);
        }
        Ok(())
    }
}

/// Everything a run extracts models from
#[derive(Clone, Debug)]
pub struct ExtractionInput<'a> {
    pub volume: &'a LabelVolume,
    pub labels: LabelSpec,
    /// Base name of all models
    pub base_name: &'a str,
    pub color_table: Option<&'a ColorTable>,
}

/// Summary of a successful run
#[derive(Clone, Debug)]
pub struct ExtractionOutcome {
    /// The labels that were processed
    pub selection: LabelSelection,
    /// Made and skipped labels in processing order
    pub summary: RunSummary,
    /// The label histogram, only computed when several models are generated
    pub histogram: Option<LabelHistogram>,
}

/// Runs the extraction of all requested labels
///
/// Every final model and, if enabled, every intermediate mesh is handed to the `sink` as soon as
/// it is available. Progress is reported to the optional `observer` after every stage. Any
/// failure of the backend or of the sink aborts the run.
pub fn extract_models<R, B, S>(
    backend: &B,
    input: &ExtractionInput,
    config: &PipelineConfig,
    sink: &mut S,
    observer: Option<&mut dyn ProgressObserver>,
) -> Result<ExtractionOutcome, PipelineError>
where
    R: Real,
    B: GeometryBackend<R> + ?Sized,
    S: ExtractionSink<R> + ?Sized,
{
    profile!("extract_models");

    config.validate()?;
    input.volume.check_is_3d()?;

    let multiple = !input.labels.is_single();
    let plan = ProgressPlan {
        multiple,
        joint_smoothing: config.joint_smoothing,
        save_intermediate: config.save_intermediate,
    };

    let bin_max = if multiple {
        histogram_bin_max(
            input.volume,
            input.color_table.map(ColorTable::number_of_colors),
            config.histogram_overflow,
        )?
    } else {
        0
    };

    let mut progress = ProgressTracker::new(plan, input.labels.estimated_num_models(bin_max), observer);
    progress.complete(Stage::ReadVolume);

    let volume = if config.pad {
        let padded = input.volume.padded();
        progress.complete(Stage::PadVolume);
        Cow::Owned(padded)
    } else {
        Cow::Borrowed(input.volume)
    };

    let histogram = if multiple {
        let histogram = compute_histogram(&volume, bin_max);
        if config.debug {
            for (label, count) in histogram.iter().filter(|&(_, c)| c > 0) {
                info!("Label {} has {} voxels.", label, count);
            }
        }
        progress.complete(Stage::Histogram);
        Some(histogram)
    } else {
        None
    };

    let selection = resolve(&input.labels, histogram.as_ref())?;
    let generate_all = input.labels.needs_histogram();
    if generate_all {
        let num_with_voxels = match (selection.range(), histogram.as_ref()) {
            (Some(range), Some(histogram)) => histogram.num_non_empty_in(range),
            _ => 0,
        };
        info!(
            "Generating all labels: {} label(s) in the range {:?}, {} with voxels",
            selection.len(),
            selection.range(),
            num_with_voxels
        );
        progress.set_num_models(num_with_voxels);
    }
    debug!(
        "Processing labels {} in {:?} mode",
        selection.labels.iter().join(" "),
        selection.mode
    );

    let namer = ArtifactNamer::new(input.base_name, input.color_table, config.skip_unnamed_labels);
    let mut run = Run {
        backend,
        config,
        sink,
        namer,
        histogram: histogram.as_ref(),
        mode: selection.mode,
        reverse: input.volume.ijk_to_ras().determinant() < 0.0,
        ijk_to_ras: *input.volume.ijk_to_ras(),
        summary: RunSummary::default(),
        progress,
        empty_labels_counted: !generate_all,
    };

    if run.reverse {
        debug!("The IJK to RAS transform mirrors the volume, reversing the sense of all models.");
    }

    if selection.is_empty() {
        warn!("No labels with voxels found, no models are generated.");
    } else if selection.mode == ExtractionMode::Multi && config.joint_smoothing {
        run.extract_jointly::<R>(&volume, &selection)?;
    } else {
        if multiple {
            run.progress.complete_singleton_steps(Stage::Histogram);
        }
        for &label in &selection.labels {
            run.extract_label::<R>(&volume, label)?;
        }
    }

    run.progress.finish();
    run.summary.log_report();

    Ok(ExtractionOutcome {
        selection,
        summary: run.summary,
        histogram,
    })
}

/// State of a single run of the pipeline
struct Run<'a, 'p, B: ?Sized, S: ?Sized> {
    backend: &'a B,
    config: &'a PipelineConfig,
    sink: &'a mut S,
    namer: ArtifactNamer<'a>,
    histogram: Option<&'a LabelHistogram>,
    mode: ExtractionMode,
    /// Whether the transform mirrors the volume
    reverse: bool,
    ijk_to_ras: Matrix4<f64>,
    summary: RunSummary,
    progress: ProgressTracker<'p>,
    /// Whether labels without voxels were counted in the progress total
    empty_labels_counted: bool,
}

/// Maps a backend error to the error of the pipeline stage
fn stage_failed(stage: Stage, label: Label) -> impl FnOnce(GeometryError) -> PipelineError {
    move |source| PipelineError::GeometryOpFailed {
        stage,
        label,
        source,
    }
}

impl<B: ?Sized, S: ?Sized> Run<'_, '_, B, S> {
    /// Runs all stages for a single label on the label volume
    fn extract_label<R: Real>(&mut self, volume: &LabelVolume, label: Label) -> Result<(), PipelineError>
    where
        B: GeometryBackend<R>,
        S: ExtractionSink<R>,
    {
        profile!("extract_label");
        self.begin_label(label);

        let Some(name) = self.gate_and_name::<R>(label)? else {
            return Ok(());
        };
        info!("Making model '{}' from label {}", name, label);

        let mask = GeometryBackend::<R>::threshold(self.backend, volume, label)
            .map_err(stage_failed(Stage::Threshold, label))?;
        self.progress.complete(Stage::Threshold);

        let mut mesh: SurfaceMesh<R> = self
            .backend
            .isosurface(&mask, 1..=1)
            .map_err(stage_failed(Stage::Isosurface, label))?;
        drop(mask);
        mesh.cell_labels.fill(label);
        self.progress.complete(Stage::Isosurface);

        if mesh.is_empty() {
            info!("No polygons were created for label {}, skipping.", label);
            return self.skip::<R>(label, SkipReason::EmptySurface);
        }
        trace!("Isosurface of label {}: {} triangles", label, mesh.num_polygons());
        self.save_intermediate(label, &name, IntermediateKind::MarchingCubes, &mesh)?;

        let mesh = self.decimate(mesh, label)?;
        self.save_intermediate(label, &name, IntermediateKind::Decimated, &mesh)?;

        let mesh = self.fix_orientation(mesh, label)?;

        let smoothing = SmoothingParameters::new(self.config.filter_kind, self.config.smooth_iterations);
        let mesh = if smoothing.iterations > 0 {
            let mesh = self
                .backend
                .smooth(mesh, &smoothing)
                .map_err(stage_failed(Stage::Smooth, label))?;
            self.progress.complete(Stage::Smooth);
            self.save_intermediate(label, &name, IntermediateKind::Smoothed, &mesh)?;
            mesh
        } else {
            self.progress.complete(Stage::Smooth);
            mesh
        };

        self.finish_model(mesh, label, name)
    }

    /// Computes the joint surface of all selected labels, smooths it once and extracts every label from it
    fn extract_jointly<R: Real>(
        &mut self,
        volume: &LabelVolume,
        selection: &LabelSelection,
    ) -> Result<(), PipelineError>
    where
        B: GeometryBackend<R>,
        S: ExtractionSink<R>,
    {
        profile!("extract_jointly");

        let Some(range) = selection.range() else {
            return Ok(());
        };
        let first = *range.start();
        info!("Extracting the joint surface of labels {} to {}", range.start(), range.end());

        let mut joint: SurfaceMesh<R> = self
            .backend
            .isosurface(volume, range)
            .map_err(stage_failed(Stage::JointIsosurface, first))?;
        self.progress.complete_singleton_steps(Stage::JointIsosurface);

        if self.config.smooth_iterations > 0 && !joint.is_empty() {
            joint = self
                .backend
                .smooth(joint, &SmoothingParameters::joint(self.config.smooth_iterations))
                .map_err(stage_failed(Stage::JointSmooth, first))?;
            self.progress.complete_singleton_steps(Stage::JointSmooth);
        }
        debug!("Joint surface has {} triangles", joint.num_polygons());

        for &label in &selection.labels {
            self.begin_label(label);

            let Some(name) = self.gate_and_name::<R>(label)? else {
                continue;
            };
            info!("Making model '{}' from label {} of the joint surface", name, label);

            let mesh = self
                .backend
                .threshold_mesh(&joint, label)
                .map_err(stage_failed(Stage::Threshold, label))?;
            self.progress.complete(Stage::Threshold);

            if mesh.is_empty() {
                info!("No polygons were created for label {}, skipping.", label);
                self.skip::<R>(label, SkipReason::EmptySurface)?;
                continue;
            }

            let mesh = self.decimate(mesh, label)?;
            self.save_intermediate(label, &name, IntermediateKind::Decimated, &mesh)?;
            let mesh = self.fix_orientation(mesh, label)?;

            self.finish_model(mesh, label, name)?;
        }

        Ok(())
    }

    /// Starts the progress steps of a label unless it is an empty label that was not counted
    fn begin_label(&mut self, label: Label) {
        let empty = self
            .histogram
            .is_some_and(|histogram| histogram.count(label) == 0);
        if self.empty_labels_counted || !empty {
            self.progress.begin_model();
        }
    }

    /// Applies the histogram gate and names the model, returns `None` if the label was skipped
    fn gate_and_name<R: Real>(&mut self, label: Label) -> Result<Option<String>, PipelineError>
    where
        S: ExtractionSink<R>,
    {
        if self.mode == ExtractionMode::Multi
            && self.histogram.is_some_and(|histogram| histogram.count(label) == 0)
        {
            debug!("Label {} has no voxels, skipping.", label);
            self.skip::<R>(label, SkipReason::NoVoxels)?;
            return Ok(None);
        }

        match self.namer.name(label) {
            ModelName::Name(name) => Ok(Some(name)),
            ModelName::Skip => {
                debug!(
                    "Label {} has no usable color name ({:?}), skipping.",
                    label,
                    self.namer.color_name(label)
                );
                self.skip::<R>(label, SkipReason::Unnamed)?;
                Ok(None)
            }
        }
    }

    fn skip<R: Real>(&mut self, label: Label, reason: SkipReason) -> Result<(), PipelineError>
    where
        S: ExtractionSink<R>,
    {
        self.summary.record_skipped(label);
        self.sink
            .consume(ExtractionEvent::Skipped { label, reason })
            .map_err(|source| PipelineError::Sink { label, source })?;
        self.progress.end_model(Stage::SkipLabel);
        Ok(())
    }

    fn save_intermediate<R: Real>(
        &mut self,
        label: Label,
        name: &str,
        kind: IntermediateKind,
        mesh: &SurfaceMesh<R>,
    ) -> Result<(), PipelineError>
    where
        S: ExtractionSink<R>,
    {
        if !self.config.save_intermediate {
            return Ok(());
        }
        self.sink
            .consume(ExtractionEvent::Intermediate {
                label,
                name,
                kind,
                mesh,
            })
            .map_err(|source| PipelineError::Sink { label, source })?;
        self.progress.complete(Stage::SaveIntermediate);
        Ok(())
    }

    fn decimate<R: Real>(&mut self, mesh: SurfaceMesh<R>, label: Label) -> Result<SurfaceMesh<R>, PipelineError>
    where
        B: GeometryBackend<R>,
    {
        let num_before = mesh.num_polygons();
        let parameters = DecimationParameters::with_target_reduction(self.config.decimate_target_reduction);
        let mesh = self
            .backend
            .decimate(mesh, &parameters)
            .map_err(stage_failed(Stage::Decimate, label))?;
        debug!(
            "Decimated label {} from {} to {} polygons",
            label,
            num_before,
            mesh.num_polygons()
        );
        self.progress.complete(Stage::Decimate);
        Ok(mesh)
    }

    /// Reverses the mesh if the transform to physical space mirrors it
    fn fix_orientation<R: Real>(
        &mut self,
        mesh: SurfaceMesh<R>,
        label: Label,
    ) -> Result<SurfaceMesh<R>, PipelineError>
    where
        B: GeometryBackend<R>,
    {
        let mesh = if self.reverse {
            self.backend
                .reverse_sense(mesh)
                .map_err(stage_failed(Stage::ReverseSense, label))?
        } else {
            mesh
        };
        self.progress.complete(Stage::ReverseSense);
        Ok(mesh)
    }

    /// Transforms the mesh, computes normals and strips and hands the model to the sink
    fn finish_model<R: Real>(
        &mut self,
        mesh: SurfaceMesh<R>,
        label: Label,
        name: String,
    ) -> Result<(), PipelineError>
    where
        B: GeometryBackend<R>,
        S: ExtractionSink<R>,
    {
        let mesh = self
            .backend
            .transform(mesh, &self.ijk_to_ras)
            .map_err(stage_failed(Stage::Transform, label))?;
        self.progress.complete(Stage::Transform);

        let normals = NormalsParameters {
            splitting: self.config.split_normals,
            point_normals: self.config.point_normals,
            ..Default::default()
        };
        let mesh = self
            .backend
            .compute_normals(mesh, &normals)
            .map_err(stage_failed(Stage::Normals, label))?;
        self.progress.complete(Stage::Normals);

        let mesh = self
            .backend
            .strip(mesh)
            .map_err(stage_failed(Stage::Strip, label))?;
        self.progress.complete(Stage::Strip);

        self.sink
            .consume(ExtractionEvent::Produced(ExtractionResult { label, name, mesh }))
            .map_err(|source| PipelineError::Sink { label, source })?;
        self.summary.record_made(label);
        self.progress.end_model(Stage::Write);
        Ok(())
    }
}
