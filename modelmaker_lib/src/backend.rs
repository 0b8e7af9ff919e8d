//! The geometry operations used by the extraction pipeline and their native implementation
//!
//! The pipeline only talks to the [`GeometryBackend`] trait. Every operation is a blocking call
//! that consumes or borrows its input and returns a fresh value, so no state is shared between
//! stages or labels.

use crate::mesh::SurfaceMesh;
use crate::{GeometryError, Label, LabelVolume, Real};
use log::warn;
use nalgebra::Matrix4;
use std::ops::RangeInclusive;

/// Parameters of the decimation stage
///
/// The decimation always preserves the topology of the surface and never splits the mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct DecimationParameters {
    /// Fraction of triangles to remove, in `[0, 1]`
    pub target_reduction: f64,
    /// Maximum rotation in degrees of a triangle caused by a single edge collapse
    pub feature_angle: f64,
    /// Maximum length of a collapsed edge as a fraction of the bounding box diagonal of the mesh
    ///
    /// A value of 1 effectively only limits the decimation by the topology and feature angle checks.
    pub max_error: f64,
}

impl Default for DecimationParameters {
    fn default() -> Self {
        Self {
            target_reduction: 0.25,
            feature_angle: 60.0,
            max_error: 1.0,
        }
    }
}

impl DecimationParameters {
    /// The fixed decimation policy with the given target reduction
    pub fn with_target_reduction(target_reduction: f64) -> Self {
        Self {
            target_reduction,
            ..Default::default()
        }
    }
}

/// Smoothing filter kind
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SmoothingFilter {
    /// Windowed sinc low pass filter, approximately volume preserving
    #[default]
    WindowedSinc,
    /// Laplacian relaxation, shrinks the surface
    Laplacian,
}

/// Parameters of the smoothing stage
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothingParameters {
    pub filter: SmoothingFilter,
    /// Number of smoothing iterations, zero disables the smoothing
    pub iterations: usize,
    /// Pass band of the windowed sinc filter, in `[0, 2]`
    pub pass_band: f64,
    /// Relaxation factor of the Laplacian filter, in `[0, 1]`
    pub relaxation_factor: f64,
    /// The Laplacian filter stops early if no vertex moved more than this distance
    pub convergence: f64,
    /// Feature angle in degrees if vertices on sharp edges should only move along the edges
    pub feature_edge_smoothing: Option<f64>,
    pub boundary_smoothing: bool,
    pub non_manifold_smoothing: bool,
    /// Smooth in coordinates normalized to the unit cube
    pub normalize_coordinates: bool,
}

impl SmoothingParameters {
    /// Windowed sinc smoothing as used per label (pass band 0.1)
    ///
    /// The filter needs at least two iterations, a single iteration is raised to two.
    pub fn windowed_sinc(iterations: usize) -> Self {
        let iterations = if iterations == 1 {
            warn!("Windowed sinc smoothing needs at least 2 iterations, using 2 instead of 1.");
            2
        } else {
            iterations
        };

        Self {
            filter: SmoothingFilter::WindowedSinc,
            iterations,
            pass_band: 0.1,
            relaxation_factor: 0.0,
            convergence: 0.0,
            feature_edge_smoothing: None,
            boundary_smoothing: false,
            non_manifold_smoothing: false,
            normalize_coordinates: false,
        }
    }

    /// Laplacian smoothing as used per label (relaxation factor 0.33, no early convergence)
    pub fn laplacian(iterations: usize) -> Self {
        Self {
            filter: SmoothingFilter::Laplacian,
            iterations,
            pass_band: 0.0,
            relaxation_factor: 0.33,
            convergence: 0.0,
            feature_edge_smoothing: None,
            boundary_smoothing: false,
            non_manifold_smoothing: false,
            normalize_coordinates: false,
        }
    }

    /// Parameters of the given filter kind
    pub fn new(filter: SmoothingFilter, iterations: usize) -> Self {
        match filter {
            SmoothingFilter::WindowedSinc => Self::windowed_sinc(iterations),
            SmoothingFilter::Laplacian => Self::laplacian(iterations),
        }
    }

    /// Windowed sinc smoothing of the joint multi-label surface
    ///
    /// Uses a narrow pass band and smooths the non-manifold interfaces between labels as well.
    pub fn joint(iterations: usize) -> Self {
        Self {
            pass_band: 0.001,
            non_manifold_smoothing: true,
            normalize_coordinates: true,
            ..Self::windowed_sinc(iterations)
        }
    }
}

/// Parameters of the normals stage
#[derive(Clone, Debug, PartialEq)]
pub struct NormalsParameters {
    /// Angle in degrees above which an edge is considered sharp
    pub feature_angle: f64,
    /// Duplicate vertices on sharp edges
    pub splitting: bool,
    /// Compute point normals, otherwise one normal per triangle
    pub point_normals: bool,
}

impl Default for NormalsParameters {
    fn default() -> Self {
        Self {
            feature_angle: 60.0,
            splitting: true,
            point_normals: true,
        }
    }
}

/// The geometry operations of the extraction pipeline
pub trait GeometryBackend<R: Real> {
    /// Binary mask of all voxels with the given label (1 inside, 0 outside)
    fn threshold(&self, volume: &LabelVolume, label: Label) -> Result<LabelVolume, GeometryError>;

    /// Boundary surface of every label in `range`, each triangle carries the label it bounds
    fn isosurface(
        &self,
        volume: &LabelVolume,
        range: RangeInclusive<Label>,
    ) -> Result<SurfaceMesh<R>, GeometryError>;

    /// Subset of a labeled mesh consisting of the triangles with the given label
    fn threshold_mesh(
        &self,
        mesh: &SurfaceMesh<R>,
        label: Label,
    ) -> Result<SurfaceMesh<R>, GeometryError>;

    fn decimate(
        &self,
        mesh: SurfaceMesh<R>,
        parameters: &DecimationParameters,
    ) -> Result<SurfaceMesh<R>, GeometryError>;

    /// Reverses the orientation of all polygons and normals
    fn reverse_sense(&self, mesh: SurfaceMesh<R>) -> Result<SurfaceMesh<R>, GeometryError>;

    fn smooth(
        &self,
        mesh: SurfaceMesh<R>,
        parameters: &SmoothingParameters,
    ) -> Result<SurfaceMesh<R>, GeometryError>;

    /// Maps the mesh from index space to physical space
    fn transform(
        &self,
        mesh: SurfaceMesh<R>,
        matrix: &Matrix4<f64>,
    ) -> Result<SurfaceMesh<R>, GeometryError>;

    fn compute_normals(
        &self,
        mesh: SurfaceMesh<R>,
        parameters: &NormalsParameters,
    ) -> Result<SurfaceMesh<R>, GeometryError>;

    /// Converts the triangles into triangle strips
    fn strip(&self, mesh: SurfaceMesh<R>) -> Result<SurfaceMesh<R>, GeometryError>;
}

/// Backend implemented by this crate: surface nets, edge collapse decimation, windowed sinc or
/// Laplacian smoothing, area weighted normals and greedy stripping
#[derive(Copy, Clone, Debug, Default)]
pub struct NativeBackend;

impl<R: Real> GeometryBackend<R> for NativeBackend {
    fn threshold(&self, volume: &LabelVolume, label: Label) -> Result<LabelVolume, GeometryError> {
        Ok(volume.mask_of(label))
    }

    fn isosurface(
        &self,
        volume: &LabelVolume,
        range: RangeInclusive<Label>,
    ) -> Result<SurfaceMesh<R>, GeometryError> {
        crate::surface_nets::extract_isosurface(volume, range)
    }

    fn threshold_mesh(
        &self,
        mesh: &SurfaceMesh<R>,
        label: Label,
    ) -> Result<SurfaceMesh<R>, GeometryError> {
        crate::postprocessing::threshold_mesh(mesh, label)
    }

    fn decimate(
        &self,
        mesh: SurfaceMesh<R>,
        parameters: &DecimationParameters,
    ) -> Result<SurfaceMesh<R>, GeometryError> {
        crate::decimation::decimate(mesh, parameters)
    }

    fn reverse_sense(&self, mesh: SurfaceMesh<R>) -> Result<SurfaceMesh<R>, GeometryError> {
        Ok(crate::postprocessing::reverse_sense(mesh))
    }

    fn smooth(
        &self,
        mesh: SurfaceMesh<R>,
        parameters: &SmoothingParameters,
    ) -> Result<SurfaceMesh<R>, GeometryError> {
        crate::smoothing::smooth(mesh, parameters)
    }

    fn transform(
        &self,
        mesh: SurfaceMesh<R>,
        matrix: &Matrix4<f64>,
    ) -> Result<SurfaceMesh<R>, GeometryError> {
        crate::postprocessing::transform(mesh, matrix)
    }

    fn compute_normals(
        &self,
        mesh: SurfaceMesh<R>,
        parameters: &NormalsParameters,
    ) -> Result<SurfaceMesh<R>, GeometryError> {
        crate::normals::compute_normals(mesh, parameters)
    }

    fn strip(&self, mesh: SurfaceMesh<R>) -> Result<SurfaceMesh<R>, GeometryError> {
        crate::stripper::strip(mesh)
    }
}
