//! Functions for post-processing of surface meshes (label extraction, orientation and transformation)

use crate::mesh::{MeshNormals, SurfaceMesh};
use crate::{GeometryError, Label, Real, profile};
use log::trace;
use nalgebra::{Matrix3, Matrix4, Point3};
use rayon::prelude::*;

/// Extracts all triangles carrying the given label, unreferenced vertices are removed
///
/// Fails with [`GeometryError::MissingLabelField`] if a non-empty mesh has no per-cell labels.
pub fn threshold_mesh<R: Real>(
    mesh: &SurfaceMesh<R>,
    label: Label,
) -> Result<SurfaceMesh<R>, GeometryError> {
    profile!("threshold_mesh");

    if mesh.is_empty() {
        return Ok(SurfaceMesh::default());
    }
    if !mesh.has_cell_labels() {
        return Err(GeometryError::MissingLabelField);
    }

    let selected = mesh
        .cell_labels
        .iter()
        .enumerate()
        .filter(|(_, l)| **l == label)
        .map(|(f, _)| f)
        .collect::<Vec<_>>();

    let normals = match &mesh.normals {
        Some(MeshNormals::Point(n)) => Some(MeshNormals::Point(n.clone())),
        Some(MeshNormals::Cell(n)) => Some(MeshNormals::Cell(
            selected.iter().map(|&f| n[f]).collect(),
        )),
        None => None,
    };

    let mut subset = SurfaceMesh {
        vertices: mesh.vertices.clone(),
        triangles: selected.iter().map(|&f| mesh.triangles[f]).collect(),
        strips: Vec::new(),
        cell_labels: vec![label; selected.len()],
        normals,
    };
    subset.remove_unreferenced_vertices();

    trace!(
        "Extracted {} of {} triangles with label {}",
        subset.triangles.len(),
        mesh.triangles.len(),
        label
    );

    Ok(subset)
}

/// Flips the orientation of all polygons and negates the normals
pub fn reverse_sense<R: Real>(mut mesh: SurfaceMesh<R>) -> SurfaceMesh<R> {
    profile!("reverse_sense");

    for tri in mesh.triangles.iter_mut() {
        tri.swap(1, 2);
    }
    // Duplicating the first vertex shifts the winding parity of every triangle in the strip
    for strip in mesh.strips.iter_mut() {
        if let Some(&first) = strip.first() {
            strip.insert(0, first);
        }
    }
    match mesh.normals.as_mut() {
        Some(MeshNormals::Point(normals)) | Some(MeshNormals::Cell(normals)) => {
            normals.iter_mut().for_each(|n| *n = -*n);
        }
        None => {}
    }

    mesh
}

/// Applies an affine transform to all vertices, normals are transformed with the inverse transpose
pub fn transform<R: Real>(
    mut mesh: SurfaceMesh<R>,
    matrix: &Matrix4<f64>,
) -> Result<SurfaceMesh<R>, GeometryError> {
    profile!("transform");

    if !matrix.iter().all(|x| x.is_finite()) {
        return Err(GeometryError::NonFiniteCoordinates);
    }

    let all_finite = mesh
        .vertices
        .par_iter_mut()
        .map(|v| {
            let p = matrix.transform_point(&Point3::from(R::vec_to_f64(v)));
            *v = R::vec_from_f64(&p.coords);
            p.coords.iter().all(|x| x.is_finite())
        })
        .reduce(|| true, |a, b| a && b);
    if !all_finite {
        return Err(GeometryError::NonFiniteCoordinates);
    }

    if let Some(MeshNormals::Point(normals)) | Some(MeshNormals::Cell(normals)) = mesh.normals.as_mut()
    {
        let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear
            .try_inverse()
            .ok_or(GeometryError::NonFiniteCoordinates)?
            .transpose();
        normals.par_iter_mut().for_each(|n| {
            let transformed = normal_matrix * R::vec_to_f64(n);
            *n = R::vec_from_f64(&transformed.try_normalize(f64::EPSILON).unwrap_or(transformed));
        });
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::unit_cube;
    use nalgebra::Vector3;

    #[test]
    fn test_threshold_mesh_selects_label() {
        let mut cube = unit_cube();
        cube.cell_labels = (0..12).map(|f| if f < 2 { 4 } else { 7 }).collect();

        let bottom = threshold_mesh(&cube, 4).unwrap();
        assert_eq!(bottom.triangles.len(), 2);
        assert_eq!(bottom.vertices.len(), 4);
        assert!(bottom.vertices.iter().all(|v| v.z == 0.0));
        assert_eq!(bottom.cell_labels, vec![4, 4]);

        assert!(threshold_mesh(&cube, 5).unwrap().is_empty());
    }

    #[test]
    fn test_threshold_mesh_needs_labels() {
        assert_eq!(
            threshold_mesh(&unit_cube(), 1),
            Err(GeometryError::MissingLabelField)
        );
        assert!(threshold_mesh(&SurfaceMesh::<f64>::default(), 1).unwrap().is_empty());
    }

    #[test]
    fn test_reverse_sense_flips_volume() {
        let cube = unit_cube();
        let reversed = reverse_sense(cube);
        assert!((reversed.signed_volume() + 1.0).abs() < 1e-12);

        let mut strips = SurfaceMesh::<f64>::default();
        strips.vertices = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ];
        strips.strips = vec![vec![0, 1, 2, 3]];
        strips.normals = Some(MeshNormals::Point(vec![Vector3::z(); 4]));
        let reversed = reverse_sense(strips);
        for t in reversed.triangulated() {
            let n = reversed.triangle_area_normal(&t);
            assert!(n.z <= 0.0);
        }
        assert_eq!(
            reversed.normals,
            Some(MeshNormals::Point(vec![-Vector3::z(); 4]))
        );
    }

    #[test]
    fn test_transform_scales_and_mirrors() {
        let mut cube = unit_cube();
        cube.normals = Some(MeshNormals::Point(vec![Vector3::x(); 8]));
        let matrix = Matrix4::new_nonuniform_scaling(&Vector3::new(-2.0, 1.0, 1.0))
            .append_translation(&Vector3::new(10.0, 0.0, 0.0));

        let transformed = transform(cube, &matrix).unwrap();
        assert_eq!(transformed.vertices[1], Vector3::new(8.0, 0.0, 0.0));
        // Mirroring inverts the orientation
        assert!((transformed.signed_volume() + 2.0).abs() < 1e-9);
        assert_eq!(
            transformed.normals,
            Some(MeshNormals::Point(vec![-Vector3::x(); 8]))
        );
    }

    #[test]
    fn test_transform_rejects_non_finite() {
        let matrix = Matrix4::from_element(f64::NAN);
        assert_eq!(
            transform(unit_cube(), &matrix),
            Err(GeometryError::NonFiniteCoordinates)
        );
    }
}
