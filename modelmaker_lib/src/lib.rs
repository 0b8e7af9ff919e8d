//!
//! Library for extracting one surface mesh per label from a labeled volume. Entry point is the [extract_models] function.
//!
//! The geometry operations of the pipeline are abstracted by the [`GeometryBackend`](backend::GeometryBackend)
//! trait, the library ships a pure Rust implementation in [`NativeBackend`](backend::NativeBackend).
//!
//! Feature flags:
//!  - `vtk_extras`: conversion of meshes to [`vtkio`] data sets
//!  - `io`: reading label volumes and color tables, writing meshes (VTK, OBJ) and the JSON scene manifest
//!  - `profiling`: enables the [`profile`] macro that records coarse timings of the pipeline stages
//!

/// Re-export the version of nalgebra used by this crate
pub use nalgebra;
/// Re-export the version of vtkio used by this crate, if vtk support is enabled
#[cfg(feature = "vtk_extras")]
pub use vtkio;

#[cfg(feature = "profiling")]
#[cfg_attr(docsrs, doc(cfg(feature = "profiling")))]
pub mod profiling;
mod profiling_macro;

/// Geometry backend trait, its parameter types and the native implementation
pub mod backend;
/// Color tables mapping labels to names and colors
pub mod color_table;
/// Edge collapse decimation of triangle meshes
pub mod decimation;
mod error;
/// Voxel counts per label
pub mod histogram;
#[cfg(feature = "io")]
#[cfg_attr(docsrs, doc(cfg(feature = "io")))]
pub mod io;
/// Resolution of the requested labels into the sequence of labels to extract
pub mod labels;
/// Surface mesh type used by the library and implementation of VTK export
pub mod mesh;
/// Naming of the generated models and the summary of made and skipped labels
pub mod naming;
/// Computation of point and cell normals
pub mod normals;
mod numeric_types;
/// The extraction pipeline driving the geometry backend
pub mod pipeline;
/// Functions for post-processing of surface meshes (threshold by label, orientation, transformation)
pub mod postprocessing;
/// Progress reporting of the pipeline
pub mod progress;
#[cfg(feature = "io")]
#[cfg_attr(docsrs, doc(cfg(feature = "io")))]
pub mod scene;
/// Laplacian and windowed sinc smoothing of surface meshes
pub mod smoothing;
/// Conversion of triangle meshes into triangle strips
pub mod stripper;
/// Isosurface extraction from label volumes
pub mod surface_nets;
/// Connectivity helpers for triangle meshes
pub mod topology;
/// The labeled volume
pub mod volume;

pub use backend::{GeometryBackend, NativeBackend, SmoothingFilter};
pub use error::{GeometryError, PipelineError, SinkError};
pub use histogram::HistogramOverflowPolicy;
pub use labels::LabelSpec;
pub use numeric_types::{Label, Real, ThreadSafe};
pub use pipeline::{
    CollectingSink, ExtractionEvent, ExtractionInput, ExtractionOutcome, ExtractionResult,
    ExtractionSink, extract_models,
};
pub use volume::{LabelVolume, ScalarType};

pub(crate) type HashState = fxhash::FxBuildHasher;
pub(crate) type MapType<K, V> = std::collections::HashMap<K, V, HashState>;
pub(crate) fn new_map<K, V>() -> MapType<K, V> {
    MapType::with_hasher(HashState::default())
}
pub(crate) type SetType<K> = std::collections::HashSet<K, HashState>;
pub(crate) fn new_set<K>() -> SetType<K> {
    SetType::with_hasher(HashState::default())
}

/// Parameters of the extraction pipeline
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of smoothing iterations, smoothing is skipped if zero
    pub smooth_iterations: usize,
    /// Target fraction of triangles removed by decimation, in `[0, 1]`
    pub decimate_target_reduction: f64,
    /// Whether all labels are extracted and smoothed together before they are separated (multi-model mode only)
    pub joint_smoothing: bool,
    /// Whether normals are split at sharp edges
    pub split_normals: bool,
    /// Whether point normals (instead of cell normals) are computed
    pub point_normals: bool,
    /// Whether the volume is padded by one background voxel on every side to close surfaces at the volume border
    pub pad: bool,
    /// Filter used for per-label smoothing
    pub filter_kind: SmoothingFilter,
    /// Whether the meshes after isosurface extraction, decimation and smoothing are handed to the sink as well
    pub save_intermediate: bool,
    /// Whether labels without a name in the color table are skipped
    pub skip_unnamed_labels: bool,
    /// Behavior if the labels of the volume exceed the histogram bin limit
    pub histogram_overflow: HistogramOverflowPolicy,
    /// Enables additional diagnostic output
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smooth_iterations: 10,
            decimate_target_reduction: 0.25,
            joint_smoothing: false,
            split_normals: true,
            point_normals: true,
            pad: false,
            filter_kind: SmoothingFilter::WindowedSinc,
            save_intermediate: false,
            skip_unnamed_labels: false,
            histogram_overflow: HistogramOverflowPolicy::Clamp,
            debug: false,
        }
    }
}

impl PipelineConfig {
    /// Checks the parameters, reports invalid values as [`PipelineError::Config`]
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.decimate_target_reduction.is_finite()
            && (0.0..=1.0).contains(&self.decimate_target_reduction))
        {
            return Err(PipelineError::config(format!(
                "the decimation target reduction has to be in [0, 1] (got {})",
                self.decimate_target_reduction
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(PipelineConfig::default().validate().is_ok());

        for reduction in [-0.1, 1.5, f64::NAN] {
            let config = PipelineConfig {
                decimate_target_reduction: reduction,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
        }
    }
}
