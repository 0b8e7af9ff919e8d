//! Connectivity helpers for triangle meshes

use crate::{MapType, new_map};

/// Classification of a vertex by its neighborhood
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertexKind {
    /// Not referenced by any triangle
    Isolated,
    /// Surrounded by a single closed fan of triangles
    Interior,
    /// Surrounded by a single open fan of triangles
    Boundary,
    /// Incident to an edge with more than two triangles or to more than one fan
    NonManifold,
}

/// Returns an undirected edge key with the smaller vertex index first
#[inline(always)]
pub(crate) fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Iterator over the three directed edges of a triangle
#[inline(always)]
pub(crate) fn triangle_edges(tri: &[usize; 3]) -> [(usize, usize); 3] {
    [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])]
}

/// Computes the indices of all triangles incident to each vertex
pub fn vertex_face_connectivity(num_vertices: usize, triangles: &[[usize; 3]]) -> Vec<Vec<usize>> {
    let mut vertex_faces = vec![Vec::new(); num_vertices];
    for (face, tri) in triangles.iter().enumerate() {
        for &v in tri {
            vertex_faces[v].push(face);
        }
    }
    vertex_faces
}

/// Computes the sorted neighbor vertices of each vertex
pub fn vertex_vertex_connectivity(num_vertices: usize, triangles: &[[usize; 3]]) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); num_vertices];
    for tri in triangles {
        for (a, b) in triangle_edges(tri) {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
    }
    for n in neighbors.iter_mut() {
        n.sort_unstable();
        n.dedup();
    }
    neighbors
}

/// Maps every undirected edge to the triangles containing it
pub fn edge_face_map(triangles: &[[usize; 3]]) -> MapType<(usize, usize), Vec<usize>> {
    let mut edges: MapType<(usize, usize), Vec<usize>> = new_map();
    for (face, tri) in triangles.iter().enumerate() {
        for (a, b) in triangle_edges(tri) {
            edges.entry(edge_key(a, b)).or_default().push(face);
        }
    }
    edges
}

/// Classifies every vertex as interior, boundary, non-manifold or isolated
pub fn classify_vertices(num_vertices: usize, triangles: &[[usize; 3]]) -> Vec<VertexKind> {
    let edges = edge_face_map(triangles);
    let vertex_faces = vertex_face_connectivity(num_vertices, triangles);

    vertex_faces
        .iter()
        .enumerate()
        .map(|(v, faces)| {
            if faces.is_empty() {
                return VertexKind::Isolated;
            }

            let mut is_boundary = false;
            for &f in faces {
                for (a, b) in triangle_edges(&triangles[f]) {
                    if a != v && b != v {
                        continue;
                    }
                    match edges.get(&edge_key(a, b)).map(|f| f.len()).unwrap_or(0) {
                        1 => is_boundary = true,
                        2 => {}
                        _ => return VertexKind::NonManifold,
                    }
                }
            }

            if count_fans(v, faces, triangles) > 1 {
                VertexKind::NonManifold
            } else if is_boundary {
                VertexKind::Boundary
            } else {
                VertexKind::Interior
            }
        })
        .collect()
}

/// Counts the groups of faces around `v` that are connected through edges incident to `v`
fn count_fans(v: usize, faces: &[usize], triangles: &[[usize; 3]]) -> usize {
    let mut groups = UnionFind::new(faces.len());
    for i in 0..faces.len() {
        for j in (i + 1)..faces.len() {
            if shares_edge_at(v, &triangles[faces[i]], &triangles[faces[j]]) {
                groups.union(i, j);
            }
        }
    }
    groups.num_sets()
}

/// Returns whether two triangles both incident to `v` share an edge that contains `v`
#[inline]
pub(crate) fn shares_edge_at(v: usize, a: &[usize; 3], b: &[usize; 3]) -> bool {
    a.iter().any(|&w| w != v && b.contains(&w))
}

/// Minimal disjoint set forest over `0..n`
#[derive(Clone, Debug)]
pub(crate) struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub(crate) fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Merges the sets of `i` and `j`, the smaller root becomes the representative
    pub(crate) fn union(&mut self, i: usize, j: usize) {
        let (ri, rj) = (self.find(i), self.find(j));
        if ri != rj {
            let (lo, hi) = if ri < rj { (ri, rj) } else { (rj, ri) };
            self.parent[hi] = lo;
        }
    }

    pub(crate) fn num_sets(&mut self) -> usize {
        (0..self.parent.len()).filter(|&i| self.find(i) == i).count()
    }
}
