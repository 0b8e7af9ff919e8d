//! Helper functions for the OBJ file format

use crate::Real;
use crate::mesh::{MeshNormals, SurfaceMesh};
use anyhow::Context;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes the mesh as a Wavefront OBJ file, strips are written as triangles
///
/// Point normals are written as vertex normals, cell normals are not supported by the format and
/// are omitted.
pub fn surface_mesh_to_obj<R: Real, P: AsRef<Path>>(
    mesh: &SurfaceMesh<R>,
    filename: P,
) -> Result<(), anyhow::Error> {
    let filename = filename.as_ref();
    if let Some(dir) = filename.parent() {
        fs::create_dir_all(dir).context("Failed to create parent directory of output file")?;
    }
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(filename)
        .context("Failed to open file handle for writing OBJ file")?;
    let mut writer = BufWriter::with_capacity(100000, file);

    for v in &mesh.vertices {
        writeln!(&mut writer, "v {} {} {}", v.x, v.y, v.z)?;
    }

    let normals = match &mesh.normals {
        Some(MeshNormals::Point(normals)) if normals.len() == mesh.vertices.len() => Some(normals),
        _ => None,
    };
    if let Some(normals) = normals {
        for n in normals {
            writeln!(&mut writer, "vn {} {} {}", n.x, n.y, n.z)?;
        }
    }

    for [a, b, c] in mesh.triangulated() {
        if normals.is_some() {
            writeln!(writer, "f {0}//{0} {1}//{1} {2}//{2}", a + 1, b + 1, c + 1)?;
        } else {
            writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
    }

    writer.flush()?;
    Ok(())
}
