//! Windowed sinc and Laplacian smoothing of surface meshes
//!
//! Both filters move vertices towards the mean of their neighbors. Vertices on boundaries,
//! non-manifold vertices and vertices on sharp feature edges are fixed or constrained depending on
//! the [`SmoothingParameters`].

use crate::backend::{SmoothingFilter, SmoothingParameters};
use crate::mesh::SurfaceMesh;
use crate::topology::{
    VertexKind, classify_vertices, edge_face_map, edge_key, vertex_vertex_connectivity,
};
use crate::{GeometryError, Real, profile};
use log::debug;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::f64::consts::PI;

/// How a vertex takes part in the smoothing
#[derive(Clone, Debug, PartialEq)]
enum VertexConstraint {
    /// The vertex does not move
    Fixed,
    /// The vertex moves towards the mean of the given neighbors
    Smoothed(Vec<usize>),
}

/// Smooths the vertex positions of the mesh, the connectivity is unchanged
pub fn smooth<R: Real>(
    mut mesh: SurfaceMesh<R>,
    parameters: &SmoothingParameters,
) -> Result<SurfaceMesh<R>, GeometryError> {
    profile!("smooth");

    if parameters.iterations == 0 || mesh.is_empty() {
        return Ok(mesh);
    }
    match parameters.filter {
        SmoothingFilter::WindowedSinc if !(0.0..=2.0).contains(&parameters.pass_band) => {
            return Err(GeometryError::InvalidParameter {
                name: "pass_band",
                value: parameters.pass_band,
            });
        }
        SmoothingFilter::Laplacian if !(0.0..=1.0).contains(&parameters.relaxation_factor) => {
            return Err(GeometryError::InvalidParameter {
                name: "relaxation_factor",
                value: parameters.relaxation_factor,
            });
        }
        _ => {}
    }
    mesh.check_connectivity()?;

    let triangles = mesh.triangulated();
    let constraints = vertex_constraints(&mesh, &triangles, parameters);

    let mut positions = mesh.vertices.iter().map(R::vec_to_f64).collect::<Vec<_>>();
    let normalization = parameters
        .normalize_coordinates
        .then(|| Normalization::new(&positions));
    if let Some(n) = &normalization {
        positions.iter_mut().for_each(|p| *p = n.apply(p));
    }

    let smoothed = match parameters.filter {
        SmoothingFilter::WindowedSinc => {
            windowed_sinc(&positions, &constraints, parameters.iterations, parameters.pass_band)
        }
        SmoothingFilter::Laplacian => laplacian(
            &positions,
            &constraints,
            parameters.iterations,
            parameters.relaxation_factor,
            parameters.convergence,
        ),
    };

    let num_moving = constraints
        .iter()
        .filter(|c| matches!(c, VertexConstraint::Smoothed(_)))
        .count();
    debug!(
        "{:?} smoothing with {} iterations: {} of {} vertices moved",
        parameters.filter,
        parameters.iterations,
        num_moving,
        positions.len()
    );

    mesh.vertices = smoothed
        .iter()
        .map(|p| match &normalization {
            Some(n) => n.revert(p),
            None => *p,
        })
        .map(|p| R::vec_from_f64(&p))
        .collect();

    Ok(mesh)
}

/// Computes the Hamming windowed sinc filter coefficients for the given number of iterations
pub fn windowed_sinc_coefficients(iterations: usize, pass_band: f64) -> Vec<f64> {
    let theta_pb = (1.0 - 0.5 * pass_band).clamp(-1.0, 1.0).acos();

    let mut coefficients = (0..=iterations)
        .map(|i| {
            let sinc = if i == 0 {
                theta_pb / PI
            } else {
                2.0 * (i as f64 * theta_pb).sin() / (i as f64 * PI)
            };
            let window = 0.54 + 0.46 * (i as f64 * PI / (iterations + 1) as f64).cos();
            sinc * window
        })
        .collect::<Vec<_>>();

    let sum: f64 = coefficients.iter().sum();
    if sum.abs() > f64::EPSILON {
        coefficients.iter_mut().for_each(|c| *c /= sum);
    }
    coefficients
}

/// Difference between the neighbor mean and the position of every smoothed vertex
fn umbrella(positions: &[Vector3<f64>], constraints: &[VertexConstraint]) -> Vec<Vector3<f64>> {
    constraints
        .par_iter()
        .enumerate()
        .map(|(v, constraint)| match constraint {
            VertexConstraint::Fixed => Vector3::zeros(),
            VertexConstraint::Smoothed(neighbors) => {
                let mean = neighbors
                    .iter()
                    .map(|&n| positions[n])
                    .sum::<Vector3<f64>>()
                    / neighbors.len() as f64;
                mean - positions[v]
            }
        })
        .collect()
}

/// Chebyshev recursion of the windowed sinc filter
fn windowed_sinc(
    positions: &[Vector3<f64>],
    constraints: &[VertexConstraint],
    iterations: usize,
    pass_band: f64,
) -> Vec<Vector3<f64>> {
    let coefficients = windowed_sinc_coefficients(iterations, pass_band);

    let x0 = positions.to_vec();
    let delta0 = umbrella(&x0, constraints);
    let mut x1 = x0
        .iter()
        .zip(&delta0)
        .map(|(x, d)| x + d * 0.5)
        .collect::<Vec<_>>();

    let mut result = x0
        .iter()
        .zip(&x1)
        .map(|(a, b)| a * coefficients[0] + b * coefficients[1])
        .collect::<Vec<_>>();

    let mut x_prev = x0;
    for &c in &coefficients[2..] {
        let delta = umbrella(&x1, constraints);
        let x_next = x1
            .iter()
            .zip(&delta)
            .zip(&x_prev)
            .map(|((x, d), p)| x * 2.0 + d - p)
            .collect::<Vec<_>>();
        result
            .iter_mut()
            .zip(&x_next)
            .for_each(|(r, x)| *r += x * c);
        x_prev = std::mem::replace(&mut x1, x_next);
    }

    result
}

/// Jacobi style Laplacian smoothing
fn laplacian(
    positions: &[Vector3<f64>],
    constraints: &[VertexConstraint],
    iterations: usize,
    relaxation_factor: f64,
    convergence: f64,
) -> Vec<Vector3<f64>> {
    let mut x = positions.to_vec();
    for _ in 0..iterations {
        let delta = umbrella(&x, constraints);
        let max_move = delta
            .iter()
            .map(|d| d.norm() * relaxation_factor)
            .fold(0.0, f64::max);
        x.iter_mut()
            .zip(&delta)
            .for_each(|(x, d)| *x += d * relaxation_factor);
        if max_move <= convergence {
            break;
        }
    }
    x
}

/// Determines which vertices move and which neighbors they are averaged with
fn vertex_constraints<R: Real>(
    mesh: &SurfaceMesh<R>,
    triangles: &[[usize; 3]],
    parameters: &SmoothingParameters,
) -> Vec<VertexConstraint> {
    let num_vertices = mesh.vertices.len();
    let kinds = classify_vertices(num_vertices, triangles);
    let neighbors = vertex_vertex_connectivity(num_vertices, triangles);
    let edges = edge_face_map(triangles);

    let cos_feature_angle = parameters
        .feature_edge_smoothing
        .map(|angle| angle.to_radians().cos());
    let face_normals = triangles
        .iter()
        .map(|t| mesh.triangle_area_normal(t).normalize())
        .collect::<Vec<_>>();

    // Neighbors along edges of the given kind, the vertex is only smoothed along a single curve
    let constrained = |v: usize, is_special: &dyn Fn(&[usize]) -> bool| {
        neighbors[v]
            .iter()
            .copied()
            .filter(|&n| {
                edges
                    .get(&edge_key(v, n))
                    .map(|faces| is_special(faces.as_slice()))
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>()
    };

    (0..num_vertices)
        .map(|v| match kinds[v] {
            VertexKind::Isolated => VertexConstraint::Fixed,
            VertexKind::NonManifold if !parameters.non_manifold_smoothing => {
                VertexConstraint::Fixed
            }
            VertexKind::Boundary => {
                if !parameters.boundary_smoothing {
                    return VertexConstraint::Fixed;
                }
                let boundary = constrained(v, &|faces: &[usize]| faces.len() == 1);
                if boundary.len() == 2 {
                    VertexConstraint::Smoothed(boundary)
                } else {
                    VertexConstraint::Fixed
                }
            }
            VertexKind::Interior | VertexKind::NonManifold => {
                let Some(cos_angle) = cos_feature_angle else {
                    return VertexConstraint::Smoothed(neighbors[v].clone());
                };
                let feature = constrained(v, &|faces: &[usize]| {
                    faces.len() == 2
                        && face_normals[faces[0]].dot(&face_normals[faces[1]]) < cos_angle
                });
                match feature.len() {
                    0 => VertexConstraint::Smoothed(neighbors[v].clone()),
                    2 => VertexConstraint::Smoothed(feature),
                    _ => VertexConstraint::Fixed,
                }
            }
        })
        .collect()
}

/// Maps coordinates into the unit cube around the origin and back
struct Normalization {
    center: Vector3<f64>,
    scale: f64,
}

impl Normalization {
    fn new(positions: &[Vector3<f64>]) -> Self {
        let (min, max) = positions.iter().fold(
            (Vector3::repeat(f64::MAX), Vector3::repeat(f64::MIN)),
            |(min, max), p| (min.inf(p), max.sup(p)),
        );
        let extent = (max - min).max();
        Self {
            center: (min + max) * 0.5,
            scale: if extent > 0.0 { extent } else { 1.0 },
        }
    }

    fn apply(&self, p: &Vector3<f64>) -> Vector3<f64> {
        (p - self.center) / self.scale
    }

    fn revert(&self, p: &Vector3<f64>) -> Vector3<f64> {
        p * self.scale + self.center
    }
}
