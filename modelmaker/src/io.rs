use anyhow::{Context, anyhow};
use log::info;
use modelmaker_lib::io::{obj_format, vtk_format};
use modelmaker_lib::mesh::SurfaceMesh;
use modelmaker_lib::{LabelVolume, Real, profile};
use std::path::Path;

pub(crate) use modelmaker_lib::io::read_color_table;

/// File format of the written models
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// VTK legacy poly data
    Vtk,
    /// Wavefront OBJ
    Obj,
}

impl OutputFormat {
    pub(crate) fn extension(self) -> &'static str {
        match self {
            OutputFormat::Vtk => "vtk",
            OutputFormat::Obj => "obj",
        }
    }
}

/// Loads a label volume from the given file path, the format is detected from the file extension
pub(crate) fn read_label_volume<P: AsRef<Path>>(input_file: P) -> Result<LabelVolume, anyhow::Error> {
    let input_file = input_file.as_ref();
    if !input_file.is_file() {
        return Err(anyhow!(
            "Input volume \"{}\" does not exist",
            input_file.display()
        ));
    }
    info!("Reading label volume from \"{}\"...", input_file.display());

    let extension = input_file
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("Unable to detect file format of input volume (missing file extension)"))?;

    let volume = match extension.to_lowercase().as_str() {
        "vtk" | "vti" => {
            profile!("loading label volume");
            vtk_format::label_volume_from_vtk(input_file)?
        }
        _ => {
            return Err(anyhow!(
                "Unsupported file format extension \"{}\" for reading label volumes",
                extension
            ));
        }
    };

    info!(
        "Successfully read volume with dimensions {:?}, spacing {:?} and origin {:?}.",
        volume.dimensions(),
        volume.spacing().as_slice(),
        volume.origin().as_slice()
    );
    Ok(volume)
}

/// Writes a model in the given format
pub(crate) fn write_mesh<R: Real, P: AsRef<Path>>(
    mesh: &SurfaceMesh<R>,
    output_file: P,
    format: OutputFormat,
    title: &str,
) -> Result<(), anyhow::Error> {
    profile!("writing model");

    let output_file = output_file.as_ref();
    match format {
        OutputFormat::Vtk => vtk_format::surface_mesh_to_vtk(mesh, output_file, title),
        OutputFormat::Obj => obj_format::surface_mesh_to_obj(mesh, output_file),
    }
    .with_context(|| anyhow!("Failed to write model to \"{}\"", output_file.display()))
}
