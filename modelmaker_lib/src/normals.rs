//! Vertex and triangle normals with optional splitting at sharp edges

use crate::backend::NormalsParameters;
use crate::mesh::{MeshNormals, SurfaceMesh};
use crate::topology::{UnionFind, shares_edge_at, vertex_face_connectivity};
use crate::{GeometryError, Real, profile};
use log::debug;
use nalgebra::Vector3;

/// Computes normals of the mesh
///
/// With point normals, every vertex gets the area weighted mean of its incident triangle normals.
/// If splitting is enabled, vertices on edges sharper than the feature angle are duplicated first,
/// so that each side of the edge gets its own normal. Strips are triangulated beforehand.
pub fn compute_normals<R: Real>(
    mut mesh: SurfaceMesh<R>,
    parameters: &NormalsParameters,
) -> Result<SurfaceMesh<R>, GeometryError> {
    profile!("compute_normals");

    if !(0.0..=180.0).contains(&parameters.feature_angle) {
        return Err(GeometryError::InvalidParameter {
            name: "feature_angle",
            value: parameters.feature_angle,
        });
    }
    mesh.check_connectivity()?;

    if !mesh.strips.is_empty() {
        let has_labels = mesh.has_cell_labels();
        mesh.triangles = mesh.triangulated();
        mesh.strips.clear();
        if !has_labels {
            mesh.cell_labels.clear();
        }
    }

    let face_normals = mesh
        .triangles
        .iter()
        .map(|t| mesh.triangle_area_normal(t))
        .collect::<Vec<_>>();

    if !parameters.point_normals {
        mesh.normals = Some(MeshNormals::Cell(
            face_normals
                .iter()
                .map(|n| R::vec_from_f64(&normalize_or_zero(n)))
                .collect(),
        ));
        return Ok(mesh);
    }

    if parameters.splitting {
        let num_before = mesh.vertices.len();
        split_sharp_edges(&mut mesh, &face_normals, parameters.feature_angle);
        debug!(
            "Split {} vertices at sharp edges",
            mesh.vertices.len() - num_before
        );
    }

    let mut point_normals = vec![Vector3::<f64>::zeros(); mesh.vertices.len()];
    for (tri, n) in mesh.triangles.iter().zip(&face_normals) {
        for &v in tri {
            point_normals[v] += n;
        }
    }

    mesh.normals = Some(MeshNormals::Point(
        point_normals
            .iter()
            .map(|n| R::vec_from_f64(&normalize_or_zero(n)))
            .collect(),
    ));

    Ok(mesh)
}

fn normalize_or_zero(n: &Vector3<f64>) -> Vector3<f64> {
    n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros)
}

/// Duplicates vertices whose incident triangles form several smooth groups
///
/// Two triangles around a vertex belong to the same group if they share an edge at the vertex and
/// their normals differ by at most the feature angle. The group with the smallest triangle index
/// keeps the original vertex.
fn split_sharp_edges<R: Real>(
    mesh: &mut SurfaceMesh<R>,
    face_normals: &[Vector3<f64>],
    feature_angle: f64,
) {
    let cos_feature_angle = feature_angle.to_radians().cos();
    let unit_normals = face_normals.iter().map(normalize_or_zero).collect::<Vec<_>>();
    let vertex_faces = vertex_face_connectivity(mesh.vertices.len(), &mesh.triangles);

    for (v, faces) in vertex_faces.iter().enumerate() {
        if faces.len() < 2 {
            continue;
        }

        let mut groups = UnionFind::new(faces.len());
        for i in 0..faces.len() {
            for j in (i + 1)..faces.len() {
                let (fi, fj) = (faces[i], faces[j]);
                if shares_edge_at(v, &mesh.triangles[fi], &mesh.triangles[fj])
                    && unit_normals[fi].dot(&unit_normals[fj]) >= cos_feature_angle
                {
                    groups.union(i, j);
                }
            }
        }

        // Faces are sorted ascending, so the group of the first face keeps the vertex
        let mut new_vertex_of_root = Vec::<(usize, usize)>::new();
        for i in 0..faces.len() {
            let root = groups.find(i);
            if root == groups.find(0) {
                continue;
            }
            let new_vertex = match new_vertex_of_root.iter().find(|(r, _)| *r == root) {
                Some(&(_, nv)) => nv,
                None => {
                    mesh.vertices.push(mesh.vertices[v]);
                    let nv = mesh.vertices.len() - 1;
                    new_vertex_of_root.push((root, nv));
                    nv
                }
            };
            for w in mesh.triangles[faces[i]].iter_mut() {
                if *w == v {
                    *w = new_vertex;
                }
            }
        }
    }
}
