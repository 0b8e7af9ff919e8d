//! Topology preserving edge collapse decimation
//!
//! Edges are collapsed shortest first. A collapse of the vertex `from` into the vertex `to` is only
//! performed if it keeps the mesh a manifold with the same topology and does not rotate any of the
//! remaining triangles by more than the feature angle. Boundary and non-manifold vertices are
//! never removed.

use crate::backend::DecimationParameters;
use crate::mesh::SurfaceMesh;
use crate::topology::{VertexKind, classify_vertices, edge_key, triangle_edges};
use crate::{GeometryError, Real, profile};
use log::{debug, trace};
use nalgebra::Vector3;

/// Why an edge collapse was rejected
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum IllegalCollapse {
    /// The vertex to remove is on a boundary or non-manifold
    LockedVertex,
    /// The edge is not shared by exactly two triangles
    NotTwoFaces,
    /// The one-rings of the endpoints intersect in more than the two opposite vertices
    LinkCondition,
    /// A vertex opposite to the edge would end up with a valence below three
    LowValence,
    /// A remaining triangle would flip, degenerate or rotate beyond the feature angle
    NormalChange,
    /// The edge is longer than the allowed error
    TooLong,
}

/// Mutable state of a decimation run
struct Decimator {
    positions: Vec<Vector3<f64>>,
    triangles: Vec<[usize; 3]>,
    alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    locked: Vec<bool>,
    num_alive: usize,
}

impl Decimator {
    fn new<R: Real>(mesh: &SurfaceMesh<R>) -> Self {
        let positions = mesh.vertices.iter().map(R::vec_to_f64).collect::<Vec<_>>();
        let locked = classify_vertices(positions.len(), &mesh.triangles)
            .into_iter()
            .map(|k| k != VertexKind::Interior)
            .collect();
        let vertex_faces =
            crate::topology::vertex_face_connectivity(positions.len(), &mesh.triangles);

        Self {
            positions,
            triangles: mesh.triangles.clone(),
            alive: vec![true; mesh.triangles.len()],
            vertex_faces,
            locked,
            num_alive: mesh.triangles.len(),
        }
    }

    /// Sorted neighbor vertices of `v` over all alive incident faces
    fn one_ring(&self, v: usize) -> Vec<usize> {
        let mut ring = self.vertex_faces[v]
            .iter()
            .flat_map(|&f| self.triangles[f])
            .filter(|&w| w != v)
            .collect::<Vec<_>>();
        ring.sort_unstable();
        ring.dedup();
        ring
    }

    /// Alive faces containing both `a` and `b`
    fn edge_faces(&self, a: usize, b: usize) -> Vec<usize> {
        self.vertex_faces[a]
            .iter()
            .copied()
            .filter(|&f| self.triangles[f].contains(&b))
            .collect()
    }

    fn area_normal(&self, tri: &[usize; 3]) -> Vector3<f64> {
        let [a, b, c] = tri.map(|i| self.positions[i]);
        (b - a).cross(&(c - a))
    }

    /// Unique alive edges sorted by length, ties are broken by the vertex indices
    fn sorted_edges(&self) -> Vec<(f64, usize, usize)> {
        let mut edges = self
            .triangles
            .iter()
            .zip(&self.alive)
            .filter(|(_, alive)| **alive)
            .flat_map(|(tri, _)| triangle_edges(tri))
            .map(|(a, b)| edge_key(a, b))
            .collect::<Vec<_>>();
        edges.sort_unstable();
        edges.dedup();

        let mut edges = edges
            .into_iter()
            .map(|(a, b)| ((self.positions[a] - self.positions[b]).norm(), a, b))
            .collect::<Vec<_>>();
        edges.sort_by(|x, y| x.0.total_cmp(&y.0).then((x.1, x.2).cmp(&(y.1, y.2))));
        edges
    }

    /// Checks whether `from` can be collapsed into `to`
    fn check_collapse(
        &self,
        from: usize,
        to: usize,
        parameters: &DecimationParameters,
        max_length: f64,
    ) -> Result<(), IllegalCollapse> {
        if self.locked[from] {
            return Err(IllegalCollapse::LockedVertex);
        }

        let faces = self.edge_faces(from, to);
        if faces.len() != 2 {
            return Err(IllegalCollapse::NotTwoFaces);
        }

        if (self.positions[from] - self.positions[to]).norm() > max_length {
            return Err(IllegalCollapse::TooLong);
        }

        let opposite = |f: usize| {
            self.triangles[f]
                .iter()
                .copied()
                .find(|&w| w != from && w != to)
        };
        let (Some(p), Some(q)) = (opposite(faces[0]), opposite(faces[1])) else {
            return Err(IllegalCollapse::NotTwoFaces);
        };
        if p == q {
            return Err(IllegalCollapse::LinkCondition);
        }

        let ring_from = self.one_ring(from);
        let ring_to = self.one_ring(to);
        let common = ring_from
            .iter()
            .filter(|v| ring_to.binary_search(v).is_ok())
            .count();
        if common != 2 {
            return Err(IllegalCollapse::LinkCondition);
        }

        if self.one_ring(p).len() <= 3 || self.one_ring(q).len() <= 3 {
            return Err(IllegalCollapse::LowValence);
        }

        let cos_feature_angle = parameters.feature_angle.to_radians().cos();
        for &f in &self.vertex_faces[from] {
            let old = self.triangles[f];
            if old.contains(&to) {
                continue;
            }
            let new = old.map(|v| if v == from { to } else { v });

            let n_old = self.area_normal(&old);
            let n_new = self.area_normal(&new);
            let (l_old, l_new) = (n_old.norm(), n_new.norm());
            if l_new <= f64::EPSILON * l_old.max(1.0) {
                return Err(IllegalCollapse::NormalChange);
            }
            if l_old > 0.0 && n_old.dot(&n_new) / (l_old * l_new) < cos_feature_angle {
                return Err(IllegalCollapse::NormalChange);
            }
        }

        Ok(())
    }

    /// Collapses `from` into `to`, assumes that the collapse was checked
    fn collapse(&mut self, from: usize, to: usize) {
        let from_faces = std::mem::take(&mut self.vertex_faces[from]);
        for f in from_faces {
            if self.triangles[f].contains(&to) {
                self.alive[f] = false;
                self.num_alive -= 1;
                for v in self.triangles[f] {
                    if v != from {
                        self.vertex_faces[v].retain(|&g| g != f);
                    }
                }
            } else {
                for v in self.triangles[f].iter_mut() {
                    if *v == from {
                        *v = to;
                    }
                }
                self.vertex_faces[to].push(f);
            }
        }
    }
}

/// Reduces the number of triangles by the target reduction of the given parameters
///
/// Stops early if no further edge can be collapsed. Per-cell labels are carried along, normals
/// and strips of the input are discarded.
pub fn decimate<R: Real>(
    mesh: SurfaceMesh<R>,
    parameters: &DecimationParameters,
) -> Result<SurfaceMesh<R>, GeometryError> {
    profile!("decimate");

    if !(0.0..=1.0).contains(&parameters.target_reduction) {
        return Err(GeometryError::InvalidParameter {
            name: "target_reduction",
            value: parameters.target_reduction,
        });
    }
    if !(0.0..=180.0).contains(&parameters.feature_angle) {
        return Err(GeometryError::InvalidParameter {
            name: "feature_angle",
            value: parameters.feature_angle,
        });
    }
    mesh.check_connectivity()?;

    let num_triangles = mesh.triangles.len();
    let target = (num_triangles as f64 * (1.0 - parameters.target_reduction)).ceil() as usize;
    if mesh.triangles.is_empty() || target >= num_triangles {
        return Ok(mesh);
    }

    let max_length = parameters.max_error * mesh.bounding_box_diagonal();
    let mut decimator = Decimator::new(&mesh);

    let mut pass = 0;
    while decimator.num_alive > target {
        pass += 1;
        let mut num_collapses = 0;

        for (_, a, b) in decimator.sorted_edges() {
            if decimator.num_alive <= target {
                break;
            }
            // One of the endpoints may have been removed earlier in this pass
            if decimator.vertex_faces[a].is_empty() || decimator.vertex_faces[b].is_empty() {
                continue;
            }

            for (from, to) in [(a, b), (b, a)] {
                match decimator.check_collapse(from, to, parameters, max_length) {
                    Ok(()) => {
                        decimator.collapse(from, to);
                        num_collapses += 1;
                        break;
                    }
                    Err(reason) => trace!("Rejected collapse of {} into {}: {:?}", from, to, reason),
                }
            }
        }

        trace!("Decimation pass {}: {} collapses", pass, num_collapses);
        if num_collapses == 0 {
            break;
        }
    }

    let Decimator {
        triangles, alive, ..
    } = decimator;

    let has_labels = mesh.has_cell_labels();
    let mut result = SurfaceMesh {
        vertices: mesh.vertices,
        ..Default::default()
    };
    for (f, tri) in triangles.into_iter().enumerate() {
        if alive[f] {
            result.triangles.push(tri);
            if has_labels {
                result.cell_labels.push(mesh.cell_labels[f]);
            }
        }
    }
    result.remove_unreferenced_vertices();

    debug!(
        "Decimated mesh from {} to {} triangles (target {}) in {} pass(es)",
        num_triangles,
        result.triangles.len(),
        target,
        pass
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface_nets::extract_isosurface;
    use crate::topology::classify_vertices;
    use crate::{Label, LabelVolume};

    fn block_mesh() -> SurfaceMesh<f64> {
        // A 6x6x6 block of voxels inside of an 8x8x8 volume
        let n = 8;
        let labels = (0..n * n * n)
            .map(|idx| {
                let (i, j, k) = (idx % n, (idx / n) % n, idx / (n * n));
                let inside = |x: usize| (1..7).contains(&x);
                if inside(i) && inside(j) && inside(k) { 1 } else { 0 }
            })
            .collect::<Vec<Label>>();
        let volume = LabelVolume::new([n, n, n], labels).unwrap();
        extract_isosurface(&volume, 1..=1).unwrap()
    }

    #[test]
    fn test_decimation_reduces_and_keeps_closed_surface() {
        let mesh = block_mesh();
        let num_before = mesh.triangles.len();
        let volume_before = mesh.signed_volume();

        let decimated = decimate(mesh, &DecimationParameters::default()).unwrap();
        assert!(decimated.triangles.len() < num_before);
        assert!(decimated.triangles.len() + 1 >= (num_before as f64 * 0.75).ceil() as usize);
        assert_eq!(decimated.cell_labels.len(), decimated.triangles.len());
        assert!(decimated.check_connectivity().is_ok());

        let kinds = classify_vertices(decimated.vertices.len(), &decimated.triangles);
        assert!(kinds.iter().all(|&k| k == VertexKind::Interior));

        let volume_after = decimated.signed_volume();
        assert!(volume_after > 0.0);
        assert!((volume_after - volume_before).abs() / volume_before < 0.2);
    }

    #[test]
    fn test_zero_reduction_is_identity() {
        let mesh = block_mesh();
        let parameters = DecimationParameters {
            target_reduction: 0.0,
            ..Default::default()
        };
        let decimated = decimate(mesh.clone(), &parameters).unwrap();
        assert_eq!(decimated, mesh);
    }

    #[test]
    fn test_invalid_reduction() {
        let parameters = DecimationParameters {
            target_reduction: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            decimate(block_mesh(), &parameters),
            Err(GeometryError::InvalidParameter {
                name: "target_reduction",
                ..
            })
        ));
    }

    #[test]
    fn test_max_error_is_relative_to_the_mesh_size() {
        let mesh = block_mesh();
        let mut scaled = mesh.clone();
        scaled.vertices.iter_mut().for_each(|v| *v *= 4.0);

        // Shorter than every edge of the mesh at any scale
        let strict = DecimationParameters {
            max_error: 0.01,
            ..Default::default()
        };
        assert_eq!(decimate(mesh.clone(), &strict).unwrap().triangles, mesh.triangles);
        assert_eq!(decimate(scaled.clone(), &strict).unwrap().triangles, scaled.triangles);

        let decimated = decimate(mesh, &DecimationParameters::default()).unwrap();
        let decimated_scaled = decimate(scaled, &DecimationParameters::default()).unwrap();
        assert_eq!(decimated.triangles, decimated_scaled.triangles);
    }

    #[test]
    fn test_cube_stays_solid() {
        let cube = crate::mesh::tests::unit_cube();
        let decimated = decimate(cube.clone(), &DecimationParameters::default()).unwrap();
        assert!(decimated.triangles.len() <= 12);
        assert!(decimated.signed_volume() > 0.0);
    }
}
