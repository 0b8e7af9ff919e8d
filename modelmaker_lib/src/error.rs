//! Error types of the extraction pipeline and of the geometry backend

use crate::Label;
use crate::progress::Stage;
use thiserror::Error as ThisError;

/// Boxed error returned by an [`ExtractionSink`](crate::pipeline::ExtractionSink)
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned when the extraction pipeline fails
///
/// All variants abort the whole run. Empty labels and labels without a color name are not errors,
/// they are recorded as skipped in the [`RunSummary`](crate::naming::RunSummary).
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum PipelineError {
    /// Invalid or missing configuration, reported before any processing
    #[error("configuration error: {0}")]
    Config(String),
    /// The label volume does not span three dimensions
    #[error("the volume is not 3D (dimensions {dimensions:?}, every dimension needs at least two voxels)")]
    VolumeShape {
        /// Number of voxels along each axis
        dimensions: [usize; 3],
    },
    /// A geometry operation of the backend failed, this is fatal for the whole run
    #[error("geometry operation '{stage}' failed for label {label}")]
    GeometryOpFailed {
        /// Stage of the pipeline that failed
        stage: Stage,
        /// Label that was processed (the lowest label of the range for joint operations)
        label: Label,
        /// Error reported by the backend
        #[source]
        source: GeometryError,
    },
    /// The color table could not be used for a required lookup
    #[error("color lookup failed: {0}")]
    ColorLookup(String),
    /// The consumer of extraction results failed (e.g. an output file was not writable)
    #[error("failed to store the results for label {label}")]
    Sink {
        /// Label whose results were handed to the sink
        label: Label,
        /// Error reported by the sink
        #[source]
        source: SinkError,
    },
}

impl PipelineError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        PipelineError::Config(msg.into())
    }
}

/// Error type returned by the operations of a [`GeometryBackend`](crate::backend::GeometryBackend)
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum GeometryError {
    /// A parameter is outside of its valid range
    #[error("invalid value {value} for parameter '{name}'")]
    InvalidParameter {
        /// Name of the parameter
        name: &'static str,
        /// The rejected value
        value: f64,
    },
    /// An operation that selects cells by label was applied to a mesh without a label field
    #[error("the mesh has no per-cell label field")]
    MissingLabelField,
    /// The label range of an isosurface request is empty
    #[error("empty label range [{start}, {end}]")]
    EmptyLabelRange {
        /// First label of the range
        start: Label,
        /// Last label of the range
        end: Label,
    },
    /// The transform is not invertible or produced non-finite coordinates
    #[error("the transform produced non-finite coordinates")]
    NonFiniteCoordinates,
    /// The triangle connectivity references a vertex that does not exist
    #[error("triangle {triangle} references vertex {vertex} but the mesh only has {num_vertices} vertices")]
    InvalidConnectivity {
        /// Index of the triangle
        triangle: usize,
        /// The offending vertex index
        vertex: usize,
        /// Number of vertices of the mesh
        num_vertices: usize,
    },
}
