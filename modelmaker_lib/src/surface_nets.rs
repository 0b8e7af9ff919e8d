//! Discrete surface nets on label volumes
//!
//! Every grid cell (the cube spanned by 2x2x2 neighboring voxel samples) whose corners carry
//! different classes gets exactly one mesh vertex, placed at the mean of the midpoints of the cell
//! edges that connect different classes. For every pair of neighboring samples with different
//! classes, the four cells around their connecting edge form a quad. The quad is emitted once for
//! each side that belongs to a label of the requested range, oriented so that its normal points
//! away from that label and tagged with that label. All coordinates are in index space.

use crate::mesh::SurfaceMesh;
use crate::{GeometryError, Label, LabelVolume, MapType, Real, new_map, profile};
use log::debug;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::ops::RangeInclusive;

/// Class of samples with a label outside of the requested range
const BACKGROUND: Label = Label::MIN;

/// Offsets of the 8 corners of a cell, corner `c` has offset `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`
const CORNER_OFFSETS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// The 12 edges of a cell as pairs of corner indices
const CELL_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [2, 3],
    [4, 5],
    [6, 7],
    [0, 2],
    [1, 3],
    [4, 6],
    [5, 7],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// Extracts the boundary surfaces of all labels in `range`
///
/// Each resulting triangle carries the label it bounds in [`SurfaceMesh::cell_labels`]. Returns an
/// empty mesh if no label of the range has a boundary inside of the volume.
pub fn extract_isosurface<R: Real>(
    volume: &LabelVolume,
    range: RangeInclusive<Label>,
) -> Result<SurfaceMesh<R>, GeometryError> {
    profile!("extract_isosurface");

    if range.is_empty() {
        return Err(GeometryError::EmptyLabelRange {
            start: *range.start(),
            end: *range.end(),
        });
    }

    let dims = volume.dimensions();
    if dims.iter().any(|&d| d < 2) {
        return Ok(SurfaceMesh::default());
    }

    let classify = |label: Label| {
        if range.contains(&label) {
            label
        } else {
            BACKGROUND
        }
    };
    let class_at = |ijk: [usize; 3]| classify(volume.label_at(ijk));

    let offset = volume.index_offset().map(|o| o as f64);
    let cell_dims = [dims[0] - 1, dims[1] - 1, dims[2] - 1];

    // Vertex positions of all active cells, computed per slice and concatenated in cell order
    let cell_vertices: Vec<(usize, Vector3<f64>)> = (0..cell_dims[2])
        .into_par_iter()
        .flat_map_iter(|k| {
            let mut slice_vertices = Vec::new();
            for j in 0..cell_dims[1] {
                for i in 0..cell_dims[0] {
                    let corners = CORNER_OFFSETS
                        .map(|o| class_at([i + o[0], j + o[1], k + o[2]]));
                    if let Some(position) = cell_vertex_position(&corners) {
                        let cell = i + cell_dims[0] * (j + cell_dims[1] * k);
                        let global = position
                            + Vector3::new(
                                i as f64 + offset[0],
                                j as f64 + offset[1],
                                k as f64 + offset[2],
                            );
                        slice_vertices.push((cell, global));
                    }
                }
            }
            slice_vertices
        })
        .collect();

    let mut cell_to_vertex: MapType<usize, usize> = new_map();
    cell_to_vertex.reserve(cell_vertices.len());
    let vertices = cell_vertices
        .iter()
        .enumerate()
        .map(|(vertex, (cell, position))| {
            cell_to_vertex.insert(*cell, vertex);
            R::vec_from_f64(position)
        })
        .collect::<Vec<_>>();

    let cell_index = |ijk: [usize; 3]| ijk[0] + cell_dims[0] * (ijk[1] + cell_dims[1] * ijk[2]);

    // Quads around every sample edge with a class change, generated per slice of samples
    let faces: Vec<([usize; 3], Label)> = (0..dims[2])
        .into_par_iter()
        .flat_map_iter(|k| {
            let mut slice_faces = Vec::new();
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    let p = [i, j, k];
                    let c0 = class_at(p);

                    for a in 0..3 {
                        let (b, c) = ((a + 1) % 3, (a + 2) % 3);
                        if p[a] + 1 >= dims[a]
                            || p[b] == 0
                            || p[b] + 1 >= dims[b]
                            || p[c] == 0
                            || p[c] + 1 >= dims[c]
                        {
                            continue;
                        }

                        let mut q = p;
                        q[a] += 1;
                        let c1 = class_at(q);
                        if c0 == c1 {
                            continue;
                        }

                        // The four cells around the edge, counter-clockwise around axis a
                        let cell_at = |db: usize, dc: usize| {
                            let mut ijk = p;
                            ijk[b] = p[b] - 1 + db;
                            ijk[c] = p[c] - 1 + dc;
                            cell_to_vertex.get(&cell_index(ijk)).copied()
                        };
                        let quad = match (cell_at(0, 0), cell_at(1, 0), cell_at(1, 1), cell_at(0, 1))
                        {
                            (Some(v0), Some(v1), Some(v2), Some(v3)) => [v0, v1, v2, v3],
                            _ => continue,
                        };

                        if c0 != BACKGROUND {
                            push_quad(&vertices, quad, c0, &mut slice_faces);
                        }
                        if c1 != BACKGROUND {
                            let [v0, v1, v2, v3] = quad;
                            push_quad(&vertices, [v0, v3, v2, v1], c1, &mut slice_faces);
                        }
                    }
                }
            }
            slice_faces
        })
        .collect();

    let (triangles, cell_labels) = faces.into_iter().unzip();

    let mesh = SurfaceMesh {
        vertices,
        triangles,
        cell_labels,
        ..Default::default()
    };

    debug!(
        "Surface nets on labels {}..={}: {} vertices, {} triangles",
        range.start(),
        range.end(),
        mesh.vertices.len(),
        mesh.triangles.len()
    );

    Ok(mesh)
}

/// Returns the vertex position relative to the cell's minimum corner, `None` for inactive cells
#[inline]
fn cell_vertex_position(corners: &[Label; 8]) -> Option<Vector3<f64>> {
    let mut sum = Vector3::zeros();
    let mut count = 0;
    for [c0, c1] in CELL_EDGES {
        if corners[c0] != corners[c1] {
            let p0 = CORNER_OFFSETS[c0].map(|x| x as f64);
            let p1 = CORNER_OFFSETS[c1].map(|x| x as f64);
            sum += Vector3::new(p0[0] + p1[0], p0[1] + p1[1], p0[2] + p1[2]) * 0.5;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Splits a quad into two triangles along its shorter diagonal
fn push_quad<R: Real>(
    vertices: &[Vector3<R>],
    [v0, v1, v2, v3]: [usize; 4],
    label: Label,
    out: &mut Vec<([usize; 3], Label)>,
) {
    let dist = |a: usize, b: usize| (R::vec_to_f64(&vertices[a]) - R::vec_to_f64(&vertices[b])).norm_squared();
    if dist(v0, v2) <= dist(v1, v3) {
        out.push(([v0, v1, v2], label));
        out.push(([v0, v2, v3], label));
    } else {
        out.push(([v0, v1, v3], label));
        out.push(([v1, v2, v3], label));
    }
}
