//! Greedy conversion of triangles into triangle strips

use crate::mesh::{MeshNormals, SurfaceMesh};
use crate::topology::{edge_face_map, edge_key};
use crate::{GeometryError, MapType, Real, new_set, profile};
use log::debug;

/// Converts all triangles of the mesh into triangle strips
///
/// Every strip keeps the winding of the triangles it covers (see [`SurfaceMesh::triangulated`]).
/// Per-cell data (labels and cell normals) is dropped, point normals are kept.
pub fn strip<R: Real>(mut mesh: SurfaceMesh<R>) -> Result<SurfaceMesh<R>, GeometryError> {
    profile!("strip");
    mesh.check_connectivity()?;

    if mesh.triangles.is_empty() {
        return Ok(mesh);
    }

    let triangles = std::mem::take(&mut mesh.triangles);
    let edges = edge_face_map(&triangles);
    let mut visited = vec![false; triangles.len()];

    // Seeds with few neighbors first, so strips start at the ends of triangle chains
    let num_neighbors = |tri: &[usize; 3]| {
        tri.iter()
            .zip(tri.iter().cycle().skip(1))
            .map(|(&a, &b)| edges.get(&edge_key(a, b)).map_or(0, |f| f.len() - 1))
            .sum::<usize>()
    };
    let mut seeds = (0..triangles.len()).collect::<Vec<_>>();
    seeds.sort_by_key(|&f| (num_neighbors(&triangles[f]), f));

    let mut strips = std::mem::take(&mut mesh.strips);
    let num_existing = strips.len();
    for start in seeds {
        if visited[start] {
            continue;
        }

        // Try all three rotations of the seed triangle and keep the longest strip
        let [a, b, c] = triangles[start];
        let best = [[a, b, c], [b, c, a], [c, a, b]]
            .into_iter()
            .map(|seed| grow_strip(seed, start, &triangles, &edges, &visited))
            .reduce(|best, candidate| {
                if candidate.0.len() > best.0.len() {
                    candidate
                } else {
                    best
                }
            });

        if let Some((strip, faces)) = best {
            for f in faces {
                visited[f] = true;
            }
            strips.push(strip);
        }
    }

    debug!(
        "Converted {} triangles into {} strips",
        triangles.len(),
        strips.len() - num_existing
    );

    mesh.strips = strips;
    mesh.cell_labels.clear();
    if let Some(MeshNormals::Cell(_)) = mesh.normals {
        mesh.normals = None;
    }

    Ok(mesh)
}

/// Grows a strip from the given seed without marking any triangle, returns the strip and its faces
fn grow_strip(
    seed: [usize; 3],
    seed_face: usize,
    triangles: &[[usize; 3]],
    edges: &MapType<(usize, usize), Vec<usize>>,
    visited: &[bool],
) -> (Vec<usize>, Vec<usize>) {
    let mut strip = seed.to_vec();
    let mut faces = vec![seed_face];
    let mut in_strip = new_set();
    in_strip.insert(seed_face);

    loop {
        let n = strip.len();
        let (p, q) = (strip[n - 2], strip[n - 1]);
        // The next triangle (strip[n-2], strip[n-1], w) has alternating winding
        let expected = if (n - 2) % 2 == 0 { (p, q) } else { (q, p) };

        let next = edges.get(&edge_key(p, q)).and_then(|candidates| {
            candidates.iter().copied().find_map(|f| {
                if visited[f] || in_strip.contains(&f) {
                    return None;
                }
                let w = triangles[f].iter().copied().find(|&w| w != p && w != q)?;
                has_cyclic_order(&triangles[f], [expected.0, expected.1, w]).then_some((f, w))
            })
        });

        match next {
            Some((f, w)) => {
                in_strip.insert(f);
                faces.push(f);
                strip.push(w);
            }
            None => break,
        }
    }

    (strip, faces)
}

/// Returns whether the triangle equals `order` up to a cyclic rotation
#[inline]
fn has_cyclic_order(triangle: &[usize; 3], order: [usize; 3]) -> bool {
    let [a, b, c] = *triangle;
    [a, b, c] == order || [b, c, a] == order || [c, a, b] == order
}
