//! Helper functions for the VTK file format

use crate::io::io_utils;
use crate::mesh::{IntoVtkDataSet, SurfaceMesh};
use crate::{Label, LabelVolume, Real, ScalarType, profile};
use anyhow::{Context, anyhow};
use log::{debug, warn};
use nalgebra::Vector3;
use num_traits::ToPrimitive;
use std::fmt::Debug;
use std::fs::create_dir_all;
use std::path::Path;
use vtkio::IOBuffer;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, DataSet, Extent, ImageDataPiece, Piece, Version, Vtk,
};

/// Tries to read a label volume from a VTK legacy `STRUCTURED_POINTS` or VTK XML image data (`.vti`) file
///
/// The first scalar point attribute of the file holds the labels. Floating point values are
/// truncated to integer labels.
pub fn label_volume_from_vtk<P: AsRef<Path>>(file_path: P) -> Result<LabelVolume, anyhow::Error> {
    profile!("label_volume_from_vtk");

    let file_path = file_path.as_ref();
    let vtk_file = read_vtk(file_path)
        .with_context(|| anyhow!("Failed to load VTK file \"{}\"", file_path.display()))?;
    let source_path = vtk_file.file_path.clone();

    let DataSet::ImageData {
        extent,
        origin,
        spacing,
        pieces,
        ..
    } = vtk_file.data
    else {
        return Err(anyhow!(
            "VTK file \"{}\" does not contain image data (structured points)",
            file_path.display()
        ));
    };

    let dimensions = extent.into_dims().map(|d| d as usize);
    let piece = pieces
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("VTK file \"{}\" contains no image data piece", file_path.display()))?
        .into_loaded_piece_data(source_path.as_deref())
        .context("Failed to load image data piece")?;

    let (name, buffer) = first_scalar_attribute(&piece.data)
        .ok_or_else(|| anyhow!("Image data has no scalar point attribute to read labels from"))?;
    debug!(
        "Reading labels from point attribute \"{}\" with dimensions {:?}",
        name, dimensions
    );

    let (labels, scalar_type) = labels_from_io_buffer(buffer)
        .with_context(|| anyhow!("Failed to read labels from attribute \"{}\"", name))?;
    if scalar_type.is_float() {
        warn!(
            "The labels of \"{}\" are stored as floating point values, they are truncated to integers.",
            file_path.display()
        );
    }

    let num_labels = labels.len();
    let volume = LabelVolume::new(dimensions, labels).ok_or_else(|| {
        anyhow!(
            "Number of labels ({}) does not match the dimensions {:?}",
            num_labels,
            dimensions
        )
    })?;

    Ok(volume
        .with_scalar_type(scalar_type)
        .with_geometry(
            Vector3::from(spacing.map(f64::from)),
            Vector3::from(origin.map(f64::from)),
        ))
}

/// Writes the label volume as VTK image data (legacy `STRUCTURED_POINTS` for `.vtk` files)
pub fn label_volume_to_vtk<P: AsRef<Path>>(
    volume: &LabelVolume,
    file_path: P,
) -> Result<(), anyhow::Error> {
    let dims = volume.dimensions().map(|d| d as u32);
    let mut data = Attributes::new();
    data.point
        .push(Attribute::scalars("labels", 1).with_data(volume.labels().to_vec()));

    let image = DataSet::ImageData {
        extent: Extent::Dims(dims),
        origin: volume.origin().map(|x| x as f32).into(),
        spacing: volume.spacing().map(|x| x as f32).into(),
        meta: None,
        pieces: vec![Piece::Inline(Box::new(ImageDataPiece {
            extent: Extent::Dims(dims),
            data,
        }))],
    };

    write_vtk(image, file_path, "labels")
}

/// Writes a surface mesh as VTK legacy poly data
pub fn surface_mesh_to_vtk<R: Real, P: AsRef<Path>>(
    mesh: &SurfaceMesh<R>,
    file_path: P,
    title: &str,
) -> Result<(), anyhow::Error> {
    write_vtk(mesh, file_path, title)
}

/// Tries to write `data` that is convertible to a VTK `DataSet` into a big endian VTK file
pub fn write_vtk<P: AsRef<Path>>(
    data: impl IntoVtkDataSet,
    filename: P,
    title: &str,
) -> Result<(), anyhow::Error> {
    profile!("write_vtk");
    let vtk_file = Vtk {
        version: Version::new((4, 2)),
        title: title.to_string(),
        file_path: None,
        byte_order: ByteOrder::BigEndian,
        data: data.into_dataset(),
    };

    let filename = filename.as_ref();
    if let Some(dir) = filename.parent() {
        create_dir_all(dir).context("Failed to create parent directory of output file")?;
    }
    vtk_file
        .export_be(filename)
        .context("Error while writing VTK output to file")
}

/// Tries to read the given VTK file
pub fn read_vtk<P: AsRef<Path>>(filename: P) -> Result<Vtk, anyhow::Error> {
    let filename = filename.as_ref();
    let mut vtk_file = Vtk::import(filename)?;
    vtk_file.load_all_pieces()?;
    Ok(vtk_file)
}

/// Returns the name and values of the first single component point attribute
fn first_scalar_attribute(attributes: &Attributes) -> Option<(&str, &IOBuffer)> {
    attributes.point.iter().find_map(|attribute| match attribute {
        Attribute::DataArray(array) if array.num_comp() == 1 => {
            Some((array.name.as_str(), &array.data))
        }
        Attribute::Field { data_array, .. } => data_array
            .iter()
            .find(|array| array.num_comp() == 1)
            .map(|array| (array.name.as_str(), &array.data)),
        _ => None,
    })
}

/// Converts the values of an IO buffer to labels and returns the scalar type of the buffer
fn labels_from_io_buffer(buffer: &IOBuffer) -> Result<(Vec<Label>, ScalarType), anyhow::Error> {
    fn convert<T: Copy + Debug + ToPrimitive>(values: &[T]) -> Result<Vec<Label>, anyhow::Error> {
        io_utils::try_convert_scalar_slice(values, |v| v.to_i32())
    }

    let converted = match buffer {
        IOBuffer::U8(v) => (convert(v)?, ScalarType::U8),
        IOBuffer::I8(v) => (convert(v)?, ScalarType::I8),
        IOBuffer::U16(v) => (convert(v)?, ScalarType::U16),
        IOBuffer::I16(v) => (convert(v)?, ScalarType::I16),
        IOBuffer::U32(v) => (convert(v)?, ScalarType::U32),
        IOBuffer::I32(v) => (v.clone(), ScalarType::I32),
        IOBuffer::U64(v) => (convert(v)?, ScalarType::U64),
        IOBuffer::I64(v) => (convert(v)?, ScalarType::I64),
        IOBuffer::F32(v) => (convert(v)?, ScalarType::F32),
        IOBuffer::F64(v) => (convert(v)?, ScalarType::F64),
        _ => return Err(anyhow!("Unsupported IOBuffer data type for labels")),
    };

    Ok(converted)
}
