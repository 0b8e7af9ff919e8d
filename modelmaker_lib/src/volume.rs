//! Label volumes: dense 3D grids of integer labels with a voxel to physical space transform

use crate::{Label, PipelineError};
use nalgebra::{Matrix4, Vector3};
use rayon::prelude::*;

/// Scalar type of the voxel data the volume was loaded from
///
/// Only used to derive the natural number of histogram bins, the labels themselves are always
/// stored as [`Label`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ScalarType {
    /// Returns the largest value representable by the scalar type
    pub fn max_value(self) -> f64 {
        match self {
            ScalarType::U8 => u8::MAX as f64,
            ScalarType::I8 => i8::MAX as f64,
            ScalarType::U16 => u16::MAX as f64,
            ScalarType::I16 => i16::MAX as f64,
            ScalarType::U32 => u32::MAX as f64,
            ScalarType::I32 => i32::MAX as f64,
            ScalarType::U64 => u64::MAX as f64,
            ScalarType::I64 => i64::MAX as f64,
            ScalarType::F32 => f32::MAX as f64,
            ScalarType::F64 => f64::MAX,
        }
    }

    /// Returns whether the scalar type is a floating point type
    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }
}

/// A dense 3D grid of labels
///
/// Voxels are stored with the x index varying fastest. Meshes extracted from the volume live in
/// index space (one unit per voxel, shifted by [`index_offset`](LabelVolume::index_offset)) and
/// are mapped to physical space by [`ijk_to_ras`](LabelVolume::ijk_to_ras).
#[derive(Clone, Debug)]
pub struct LabelVolume {
    dimensions: [usize; 3],
    spacing: Vector3<f64>,
    origin: Vector3<f64>,
    ijk_to_ras: Matrix4<f64>,
    index_offset: [i64; 3],
    scalar_type: ScalarType,
    labels: Vec<Label>,
}

impl LabelVolume {
    /// Creates a volume with unit spacing, zero origin and an identity transform
    ///
    /// Returns `None` if the number of labels does not match the dimensions.
    pub fn new(dimensions: [usize; 3], labels: Vec<Label>) -> Option<Self> {
        let num_voxels = dimensions.iter().product::<usize>();
        (num_voxels == labels.len()).then(|| Self {
            dimensions,
            spacing: Vector3::repeat(1.0),
            origin: Vector3::zeros(),
            ijk_to_ras: Matrix4::identity(),
            index_offset: [0; 3],
            scalar_type: ScalarType::I32,
            labels,
        })
    }

    /// Sets the spacing and origin and derives the default voxel to physical transform from them
    pub fn with_geometry(mut self, spacing: Vector3<f64>, origin: Vector3<f64>) -> Self {
        self.spacing = spacing;
        self.origin = origin;
        self.ijk_to_ras = Matrix4::new_translation(&origin) * Matrix4::new_nonuniform_scaling(&spacing);
        self
    }

    /// Replaces the voxel to physical transform
    pub fn with_ijk_to_ras(mut self, ijk_to_ras: Matrix4<f64>) -> Self {
        self.ijk_to_ras = ijk_to_ras;
        self
    }

    /// Records the scalar type of the data the labels were converted from
    pub fn with_scalar_type(mut self, scalar_type: ScalarType) -> Self {
        self.scalar_type = scalar_type;
        self
    }

    /// Number of voxels along each axis
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    /// Total number of voxels
    pub fn num_voxels(&self) -> usize {
        self.labels.len()
    }

    pub fn spacing(&self) -> &Vector3<f64> {
        &self.spacing
    }

    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }

    /// The affine transform from voxel index space to physical space
    pub fn ijk_to_ras(&self) -> &Matrix4<f64> {
        &self.ijk_to_ras
    }

    /// Index space coordinate of the first voxel (non-zero after padding)
    pub fn index_offset(&self) -> [i64; 3] {
        self.index_offset
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// All labels of the volume, x varies fastest
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Flat storage index of the voxel with the given grid index
    #[inline(always)]
    pub fn flat_index(&self, ijk: [usize; 3]) -> usize {
        ijk[0] + self.dimensions[0] * (ijk[1] + self.dimensions[1] * ijk[2])
    }

    /// Returns the label of the voxel with the given grid index
    #[inline(always)]
    pub fn label_at(&self, ijk: [usize; 3]) -> Label {
        self.labels[self.flat_index(ijk)]
    }

    /// Checks that the volume spans three dimensions (at least two voxels along every axis)
    pub fn check_is_3d(&self) -> Result<(), PipelineError> {
        if self.dimensions.iter().any(|&d| d < 2) {
            Err(PipelineError::VolumeShape {
                dimensions: self.dimensions,
            })
        } else {
            Ok(())
        }
    }

    /// Returns a copy of the volume with one layer of background voxels (label 0) around it
    ///
    /// The index offset is shifted by -1 along every axis, so the original voxels keep their index
    /// space coordinates and meshes of labels touching the border become closed.
    pub fn padded(&self) -> LabelVolume {
        let [nx, ny, nz] = self.dimensions;
        let padded_dims = [nx + 2, ny + 2, nz + 2];

        let mut labels = vec![0; padded_dims.iter().product()];
        labels
            .par_chunks_mut(padded_dims[0] * padded_dims[1])
            .enumerate()
            .filter(|(k, _)| *k >= 1 && *k <= nz)
            .for_each(|(k, slice)| {
                for j in 0..ny {
                    let src_start = self.flat_index([0, j, k - 1]);
                    let dst_start = 1 + padded_dims[0] * (j + 1);
                    slice[dst_start..dst_start + nx]
                        .copy_from_slice(&self.labels[src_start..src_start + nx]);
                }
            });

        LabelVolume {
            dimensions: padded_dims,
            labels,
            index_offset: self.index_offset.map(|o| o - 1),
            ..self.clone_geometry()
        }
    }

    /// Returns a binary mask volume (1 inside, 0 outside) of all voxels with the given label
    pub fn mask_of(&self, label: Label) -> LabelVolume {
        let labels = self
            .labels
            .par_iter()
            .map(|&l| if l == label { 1 } else { 0 })
            .collect();

        LabelVolume {
            labels,
            ..self.clone_geometry()
        }
    }

    /// Copies everything except the voxel data
    fn clone_geometry(&self) -> LabelVolume {
        LabelVolume {
            dimensions: self.dimensions,
            spacing: self.spacing,
            origin: self.origin,
            ijk_to_ras: self.ijk_to_ras,
            index_offset: self.index_offset,
            scalar_type: self.scalar_type,
            labels: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_volume() -> LabelVolume {
        // 2x2x2 volume with labels 1..=8
        LabelVolume::new([2, 2, 2], (1..=8).collect()).unwrap()
    }

    #[test]
    fn test_new_checks_length() {
        assert!(LabelVolume::new([2, 2, 2], vec![0; 7]).is_none());
        assert!(LabelVolume::new([2, 2, 2], vec![0; 8]).is_some());
    }

    #[test]
    fn test_check_is_3d() {
        assert!(cube_volume().check_is_3d().is_ok());

        let flat = LabelVolume::new([4, 4, 1], vec![1; 16]).unwrap();
        match flat.check_is_3d() {
            Err(PipelineError::VolumeShape { dimensions }) => assert_eq!(dimensions, [4, 4, 1]),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_padding_keeps_voxel_positions() {
        let volume = cube_volume();
        let padded = volume.padded();

        assert_eq!(padded.dimensions(), [4, 4, 4]);
        assert_eq!(padded.index_offset(), [-1, -1, -1]);
        assert_eq!(padded.labels().iter().filter(|&&l| l != 0).count(), 8);

        for k in 0..2 {
            for j in 0..2 {
                for i in 0..2 {
                    assert_eq!(
                        volume.label_at([i, j, k]),
                        padded.label_at([i + 1, j + 1, k + 1])
                    );
                }
            }
        }

        // Border voxels are background
        assert_eq!(padded.label_at([0, 0, 0]), 0);
        assert_eq!(padded.label_at([3, 1, 1]), 0);
        assert_eq!(padded.label_at([1, 1, 3]), 0);
    }

    #[test]
    fn test_mask() {
        let volume = cube_volume();
        let mask = volume.mask_of(3);
        assert_eq!(mask.labels().iter().sum::<Label>(), 1);
        assert_eq!(mask.label_at([0, 1, 0]), 1);
        assert_eq!(mask.dimensions(), volume.dimensions());
    }

    #[test]
    fn test_geometry_transform() {
        let volume = cube_volume()
            .with_geometry(Vector3::new(2.0, 3.0, 4.0), Vector3::new(10.0, 0.0, -1.0));
        let p = volume.ijk_to_ras() * nalgebra::Vector4::new(1.0, 1.0, 1.0, 1.0);
        assert_eq!(p.xyz(), Vector3::new(12.0, 3.0, 3.0));
    }
}
