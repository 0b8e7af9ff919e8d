//! Surface mesh type passed between the geometry stages and conversion to VTK data sets

use crate::{GeometryError, Label, Real};
use nalgebra::Vector3;
#[cfg(feature = "vtk_extras")]
use vtkio::model::{Attribute, Attributes, DataSet, PolyDataPiece, VertexNumbers};

/// Normals attached to a [`SurfaceMesh`]
#[derive(Clone, Debug, PartialEq)]
pub enum MeshNormals<R: Real> {
    /// One normal per vertex
    Point(Vec<Vector3<R>>),
    /// One normal per triangle
    Cell(Vec<Vector3<R>>),
}

/// A polygonal surface mesh consisting of triangles or triangle strips
///
/// A mesh produced by an isosurface stage stores triangles and one label per triangle. After
/// stripping, the triangles are replaced by strips and the per-cell data is dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceMesh<R: Real> {
    /// Coordinates of all vertices of the mesh
    pub vertices: Vec<Vector3<R>>,
    /// Triangles identified by their vertex indices, counter-clockwise seen from outside
    pub triangles: Vec<[usize; 3]>,
    /// Triangle strips, the first triangle of a strip has the orientation of its first three vertices
    pub strips: Vec<Vec<usize>>,
    /// Label per triangle, either empty or of the same length as `triangles`
    pub cell_labels: Vec<Label>,
    /// Optional vertex or triangle normals
    pub normals: Option<MeshNormals<R>>,
}

impl<R: Real> Default for SurfaceMesh<R> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            strips: Vec::new(),
            cell_labels: Vec::new(),
            normals: None,
        }
    }
}

impl<R: Real> SurfaceMesh<R> {
    /// Creates a triangle mesh without labels or normals
    pub fn from_triangles(vertices: Vec<Vector3<R>>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            ..Default::default()
        }
    }

    /// Number of polygons (triangles plus strips)
    pub fn num_polygons(&self) -> usize {
        self.triangles.len() + self.strips.len()
    }

    /// Returns whether the mesh has no polygons
    pub fn is_empty(&self) -> bool {
        self.num_polygons() == 0
    }

    /// Returns whether the triangles carry a label field
    pub fn has_cell_labels(&self) -> bool {
        !self.triangles.is_empty() && self.cell_labels.len() == self.triangles.len()
    }

    /// All triangles of the mesh, strips are decomposed into triangles with consistent winding
    pub fn triangulated(&self) -> Vec<[usize; 3]> {
        let mut triangles = self.triangles.clone();
        for strip in &self.strips {
            for (i, w) in strip.windows(3).enumerate() {
                if i % 2 == 0 {
                    triangles.push([w[0], w[1], w[2]]);
                } else {
                    triangles.push([w[1], w[0], w[2]]);
                }
            }
        }
        triangles
    }

    /// Checks that every polygon references existing vertices
    pub fn check_connectivity(&self) -> Result<(), GeometryError> {
        let num_vertices = self.vertices.len();
        let polygons = self
            .triangles
            .iter()
            .map(|t| t.as_slice())
            .chain(self.strips.iter().map(|s| s.as_slice()));

        for (triangle, polygon) in polygons.enumerate() {
            if let Some(&vertex) = polygon.iter().find(|&&v| v >= num_vertices) {
                return Err(GeometryError::InvalidConnectivity {
                    triangle,
                    vertex,
                    num_vertices,
                });
            }
        }
        Ok(())
    }

    /// Length of the diagonal of the axis aligned bounding box of the vertices
    pub fn bounding_box_diagonal(&self) -> f64 {
        let mut vertices = self.vertices.iter().map(R::vec_to_f64);
        let Some(first) = vertices.next() else {
            return 0.0;
        };
        let (min, max) = vertices.fold((first, first), |(min, max), v| (min.inf(&v), max.sup(&v)));
        (max - min).norm()
    }

    /// Signed volume enclosed by the mesh, positive for closed meshes with outward facing triangles
    pub fn signed_volume(&self) -> f64 {
        self.triangulated()
            .iter()
            .map(|&[a, b, c]| {
                let a = R::vec_to_f64(&self.vertices[a]);
                let b = R::vec_to_f64(&self.vertices[b]);
                let c = R::vec_to_f64(&self.vertices[c]);
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Area weighted normal of the given triangle (twice the area in length)
    #[inline(always)]
    pub(crate) fn triangle_area_normal(&self, triangle: &[usize; 3]) -> Vector3<f64> {
        let a = R::vec_to_f64(&self.vertices[triangle[0]]);
        let b = R::vec_to_f64(&self.vertices[triangle[1]]);
        let c = R::vec_to_f64(&self.vertices[triangle[2]]);
        (b - a).cross(&(c - a))
    }

    /// Removes all vertices that are not referenced by any polygon, remapping the connectivity
    pub fn remove_unreferenced_vertices(&mut self) {
        let mut new_index = vec![usize::MAX; self.vertices.len()];
        let mut next = 0;
        let referenced = self
            .triangles
            .iter()
            .flatten()
            .chain(self.strips.iter().flatten());
        for &v in referenced {
            if new_index[v] == usize::MAX {
                new_index[v] = next;
                next += 1;
            }
        }

        let mut vertices = vec![Vector3::zeros(); next];
        let mut point_normals = match &self.normals {
            Some(MeshNormals::Point(_)) => Some(vec![Vector3::zeros(); next]),
            _ => None,
        };
        for (old, &new) in new_index.iter().enumerate() {
            if new != usize::MAX {
                vertices[new] = self.vertices[old];
                if let (Some(out), Some(MeshNormals::Point(normals))) =
                    (point_normals.as_mut(), &self.normals)
                {
                    out[new] = normals[old];
                }
            }
        }

        self.vertices = vertices;
        if let Some(normals) = point_normals {
            self.normals = Some(MeshNormals::Point(normals));
        }
        self.triangles
            .iter_mut()
            .flatten()
            .chain(self.strips.iter_mut().flatten())
            .for_each(|v| *v = new_index[*v]);
    }
}

/// Trait for data that can be converted into a VTK `DataSet` for writing
#[cfg(feature = "vtk_extras")]
pub trait IntoVtkDataSet {
    fn into_dataset(self) -> DataSet;
}

#[cfg(feature = "vtk_extras")]
impl IntoVtkDataSet for DataSet {
    fn into_dataset(self) -> DataSet {
        self
    }
}

#[cfg(feature = "vtk_extras")]
impl<R: Real> From<&SurfaceMesh<R>> for PolyDataPiece {
    fn from(mesh: &SurfaceMesh<R>) -> Self {
        let points = flatten(&mesh.vertices);

        let polys = (!mesh.triangles.is_empty()).then(|| {
            let mut vertices = Vec::with_capacity(mesh.triangles.len() * 4);
            for triangle in &mesh.triangles {
                vertices.push(3);
                vertices.extend(triangle.iter().map(|&i| i as u32));
            }
            VertexNumbers::Legacy {
                num_cells: mesh.triangles.len() as u32,
                vertices,
            }
        });

        let strips = (!mesh.strips.is_empty()).then(|| {
            let mut vertices = Vec::new();
            for strip in &mesh.strips {
                vertices.push(strip.len() as u32);
                vertices.extend(strip.iter().map(|&i| i as u32));
            }
            VertexNumbers::Legacy {
                num_cells: mesh.strips.len() as u32,
                vertices,
            }
        });

        let mut data = Attributes::new();
        match &mesh.normals {
            Some(MeshNormals::Point(normals)) if normals.len() == mesh.vertices.len() => {
                data.point
                    .push(Attribute::normals("Normals").with_data(flatten(normals)));
            }
            Some(MeshNormals::Cell(normals)) if normals.len() == mesh.num_polygons() => {
                data.cell
                    .push(Attribute::normals("Normals").with_data(flatten(normals)));
            }
            _ => {}
        }
        if mesh.has_cell_labels() && mesh.strips.is_empty() {
            data.cell
                .push(Attribute::scalars("Label", 1).with_data(mesh.cell_labels.clone()));
        }

        PolyDataPiece {
            points: points.into(),
            verts: None,
            lines: None,
            polys,
            strips,
            data,
        }
    }
}

#[cfg(feature = "vtk_extras")]
impl<R: Real> IntoVtkDataSet for &SurfaceMesh<R> {
    fn into_dataset(self) -> DataSet {
        DataSet::inline(PolyDataPiece::from(self))
    }
}

#[cfg(feature = "vtk_extras")]
fn flatten<R: Real>(vectors: &[Vector3<R>]) -> Vec<R> {
    let mut flat = Vec::with_capacity(vectors.len() * 3);
    for v in vectors {
        flat.extend(v.iter().copied());
    }
    flat
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Closed unit cube with outward facing triangles
    pub(crate) fn unit_cube() -> SurfaceMesh<f64> {
        let vertices = (0..8)
            .map(|i| Vector3::new((i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64))
            .collect();
        let triangles = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
        ];
        SurfaceMesh::from_triangles(vertices, triangles)
    }

    #[test]
    fn test_cube_volume_and_diagonal() {
        let cube = unit_cube();
        assert!((cube.signed_volume() - 1.0).abs() < 1e-12);
        assert!((cube.bounding_box_diagonal() - 3.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(cube.num_polygons(), 12);
        assert!(!cube.is_empty());
        assert!(cube.check_connectivity().is_ok());
    }

    #[test]
    fn test_strip_triangulation_keeps_winding() {
        let mut mesh = SurfaceMesh::<f64>::default();
        mesh.vertices = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ];
        mesh.strips = vec![vec![0, 1, 2, 3]];

        let triangles = mesh.triangulated();
        assert_eq!(triangles, vec![[0, 1, 2], [1, 3, 2]]);
        for t in &triangles {
            assert!(mesh.triangle_area_normal(t).z > 0.0);
        }
    }

    #[test]
    fn test_invalid_connectivity() {
        let mut cube = unit_cube();
        cube.triangles.push([0, 1, 8]);
        assert_eq!(
            cube.check_connectivity(),
            Err(GeometryError::InvalidConnectivity {
                triangle: 12,
                vertex: 8,
                num_vertices: 8
            })
        );
    }

    #[test]
    fn test_remove_unreferenced_vertices() {
        let mut mesh = SurfaceMesh::from_triangles(
            vec![
                Vector3::new(9.0, 9.0, 9.0),
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            vec![[1, 2, 3]],
        );
        mesh.remove_unreferenced_vertices();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        assert_eq!(mesh.vertices[0], Vector3::zeros());
    }

    #[cfg(feature = "vtk_extras")]
    #[test]
    fn test_poly_data_piece() {
        let mut cube = unit_cube();
        cube.cell_labels = vec![3; 12];
        let piece = PolyDataPiece::from(&cube);
        assert_eq!(piece.points.len(), 24);
        assert_eq!(piece.data.cell.len(), 1);
        assert!(piece.strips.is_none());
    }
}
