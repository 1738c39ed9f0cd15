//! Windowed-sinc mesh smoothing.
//!
//! Implements Taubin's windowed-sinc low-pass filter. The filter is a
//! polynomial in the smoothing operator `M = (I + W) / 2`, where `W` replaces
//! each point by the average of its neighbors, evaluated with the Chebyshev
//! recurrence
//!
//! ```text
//! T0 = x,  T1 = M x,  T(i+1) = 2 M T(i) - T(i-1)
//! x' = Σ c_i w_i T(i)      i = 0..=N
//! ```
//!
//! `c_i` are the Fourier coefficients of an ideal low-pass response with
//! cut-off `θ_pb = acos(1 - pass_band / 2)`, `w_i` is a Hamming window, and the
//! weights are normalised so that a constant signal passes unchanged. Unlike
//! plain Laplacian smoothing the filter does not shrink the mesh.
//!
//! Points are classified before filtering:
//!
//! - boundary points are fixed (unless boundary smoothing is enabled, in which
//!   case they slide along the boundary),
//! - points on exactly two feature edges slide along those edges, points on
//!   one or three or more feature edges are corners and stay fixed,
//! - points on non-manifold edges use all their edge neighbors,
//! - every other point uses all its edge neighbors.
//!
//! # Example
//!
//! ```
//! use meshmend::algo::smooth::{smooth, SmoothOptions};
//! use meshmend::mesh::shapes::icosphere;
//!
//! let sphere = icosphere(2);
//! let smoothed = smooth(&sphere, &SmoothOptions::default().with_iterations(5)).unwrap();
//! assert_eq!(smoothed.num_points(), sphere.num_points());
//! ```
//!
//! # References
//!
//! - Taubin, G., Zhang, T. & Golub, G. (1996). "Optimal Surface Smoothing as
//!   Filter Design." ECCV '96.

use std::collections::HashMap;
use std::f64::consts::PI;

use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::error::{MeshError, Result};
use crate::mesh::topology::{canonical_edge, edge_polygons, point_neighbors, Edge};
use crate::mesh::Mesh;

use super::Progress;

/// Options for [`smooth`].
#[derive(Debug, Clone)]
pub struct SmoothOptions {
    /// Number of filter terms (the polynomial degree).
    pub iterations: usize,

    /// Pass band in `(0, 2)`. Lower values smooth more.
    pub pass_band: f64,

    /// Dihedral angle in degrees at or above which an edge counts as a feature.
    pub feature_angle: f64,

    /// Restrict feature points to slide along their feature edges.
    pub feature_edge_smoothing: bool,

    /// Let boundary points slide along the boundary instead of staying fixed.
    pub boundary_smoothing: bool,

    /// Smooth points on non-manifold edges using all their neighbors.
    pub non_manifold_smoothing: bool,

    /// Map points into a unit box while filtering.
    pub normalize_coordinates: bool,

    /// Whether to use parallel execution.
    pub parallel: bool,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            iterations: 3,
            pass_band: 0.5,
            feature_angle: 60.0,
            feature_edge_smoothing: true,
            boundary_smoothing: false,
            non_manifold_smoothing: true,
            normalize_coordinates: true,
            parallel: false,
        }
    }
}

impl SmoothOptions {
    /// Set the number of filter terms.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the pass band.
    pub fn with_pass_band(mut self, pass_band: f64) -> Self {
        self.pass_band = pass_band;
        self
    }

    /// Set the feature angle in degrees.
    pub fn with_feature_angle(mut self, angle: f64) -> Self {
        self.feature_angle = angle;
        self
    }

    /// Let boundary points slide along the boundary.
    pub fn with_boundary_smoothing(mut self, enabled: bool) -> Self {
        self.boundary_smoothing = enabled;
        self
    }

    /// Enable or disable feature-edge handling.
    pub fn with_feature_edge_smoothing(mut self, enabled: bool) -> Self {
        self.feature_edge_smoothing = enabled;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.pass_band > 0.0 && self.pass_band < 2.0) {
            return Err(MeshError::invalid_param(
                "pass_band",
                self.pass_band,
                "must be in (0, 2)",
            ));
        }
        if !(self.feature_angle >= 0.0 && self.feature_angle <= 180.0) {
            return Err(MeshError::invalid_param(
                "feature_angle",
                self.feature_angle,
                "must be in [0, 180] degrees",
            ));
        }
        Ok(())
    }
}

/// Smooth a mesh with the windowed-sinc filter.
///
/// Returns a mesh with the same points (moved) and the same cells. Fails with
/// [`MeshError::ConvergenceFailed`] if the filter produces non-finite values.
pub fn smooth(mesh: &Mesh, options: &SmoothOptions) -> Result<Mesh> {
    smooth_with_progress(mesh, options, &Progress::none())
}

/// Smooth a mesh, degrading to a copy of the input on failure.
///
/// Any error from [`smooth`] is logged and the input is returned unchanged.
pub fn smooth_or_passthrough(mesh: &Mesh, options: &SmoothOptions) -> Mesh {
    match smooth(mesh, options) {
        Ok(smoothed) => smoothed,
        Err(e) => {
            warn!("smoothing skipped, returning input unchanged: {}", e);
            mesh.clone()
        }
    }
}

/// Smooth a mesh with progress reporting, one report per filter term.
pub fn smooth_with_progress(
    mesh: &Mesh,
    options: &SmoothOptions,
    progress: &Progress,
) -> Result<Mesh> {
    options.validate()?;
    if options.iterations == 0 || mesh.polygons.is_empty() {
        return Ok(mesh.clone());
    }

    let weights = filter_weights(options.iterations, options.pass_band)?;
    let stencils = build_stencils(mesh, options);
    let movable = stencils.iter().filter(|s| !s.is_empty()).count();
    debug!(
        "smooth: {} of {} points movable, {} terms, pass band {}",
        movable,
        mesh.points.len(),
        options.iterations,
        options.pass_band
    );
    if movable == 0 {
        return Ok(mesh.clone());
    }

    let frame = Frame::new(mesh, options.normalize_coordinates);
    let x: Vec<Vector3<f64>> = mesh.points.iter().map(|p| frame.to_local(p)).collect();

    let total = options.iterations + 1;
    let mut result: Vec<Vector3<f64>> = x.iter().map(|p| p * weights[0]).collect();
    let mut t_prev = x.clone();
    let mut t_curr = apply_operator(&x, &stencils, options.parallel);
    accumulate(&mut result, &t_curr, weights[1]);
    progress.report(2, total, "smoothing");

    for (i, &weight) in weights.iter().enumerate().skip(2) {
        let m = apply_operator(&t_curr, &stencils, options.parallel);
        let t_next: Vec<Vector3<f64>> = m
            .iter()
            .zip(&t_prev)
            .map(|(mt, tp)| 2.0 * mt - tp)
            .collect();
        accumulate(&mut result, &t_next, weight);
        t_prev = std::mem::replace(&mut t_curr, t_next);
        progress.report(i + 1, total, "smoothing");
    }

    if result.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
        return Err(MeshError::ConvergenceFailed {
            iterations: options.iterations,
        });
    }

    let mut out = mesh.clone();
    for (i, stencil) in stencils.iter().enumerate() {
        // Fixed points keep their exact input coordinates.
        if !stencil.is_empty() {
            out.points[i] = frame.to_world(&result[i]);
        }
    }
    out.invalidate_normals();
    Ok(out)
}

/// Hamming-windowed sinc weights `c_i w_i`, normalised to sum to one.
pub fn filter_weights(iterations: usize, pass_band: f64) -> Result<Vec<f64>> {
    let n = iterations;
    let theta = (1.0 - 0.5 * pass_band).clamp(-1.0, 1.0).acos();

    let mut weights: Vec<f64> = (0..=n)
        .map(|i| {
            let c = if i == 0 {
                theta / PI
            } else {
                2.0 * (i as f64 * theta).sin() / (i as f64 * PI)
            };
            let w = 0.54 + 0.46 * (i as f64 * PI / (n as f64 + 1.0)).cos();
            c * w
        })
        .collect();

    let sum: f64 = weights.iter().sum();
    if !sum.is_finite() || sum.abs() < 1e-12 {
        return Err(MeshError::ConvergenceFailed { iterations });
    }
    weights.iter_mut().for_each(|w| *w /= sum);
    Ok(weights)
}

/// Neighbor stencil per point; an empty stencil means the point is fixed.
fn build_stencils(mesh: &Mesh, options: &SmoothOptions) -> Vec<Vec<usize>> {
    let incidence = edge_polygons(mesh);
    let neighbors = point_neighbors(mesh);
    let cos_feature = options.feature_angle.to_radians().cos();

    let normals: Vec<Option<Vector3<f64>>> =
        (0..mesh.polygons.len()).map(|i| mesh.polygon_normal(i)).collect();

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum EdgeKind {
        Boundary,
        Interior,
        Feature,
        NonManifold,
    }

    let kinds: HashMap<Edge, EdgeKind> = incidence
        .iter()
        .map(|(&edge, polys)| {
            let kind = match polys.len() {
                1 => EdgeKind::Boundary,
                2 => match (normals[polys[0]], normals[polys[1]]) {
                    (Some(a), Some(b)) if a.dot(&b) <= cos_feature => EdgeKind::Feature,
                    _ => EdgeKind::Interior,
                },
                _ => EdgeKind::NonManifold,
            };
            (edge, kind)
        })
        .collect();

    neighbors
        .iter()
        .enumerate()
        .map(|(v, around)| {
            let kind_of = |n: usize| kinds.get(&canonical_edge(v, n)).copied();
            let along = |wanted: EdgeKind| -> Vec<usize> {
                around
                    .iter()
                    .copied()
                    .filter(|&n| kind_of(n) == Some(wanted))
                    .collect()
            };

            let boundary = along(EdgeKind::Boundary);
            if !boundary.is_empty() {
                return if options.boundary_smoothing && boundary.len() == 2 {
                    boundary
                } else {
                    Vec::new()
                };
            }

            if around.iter().any(|&n| kind_of(n) == Some(EdgeKind::NonManifold)) {
                return if options.non_manifold_smoothing {
                    around.clone()
                } else {
                    Vec::new()
                };
            }

            if options.feature_edge_smoothing {
                let features = along(EdgeKind::Feature);
                match features.len() {
                    0 => {}
                    2 => return features,
                    _ => return Vec::new(),
                }
            }

            around.clone()
        })
        .collect()
}

/// Apply `M = (I + W) / 2` to a signal.
fn apply_operator(
    x: &[Vector3<f64>],
    stencils: &[Vec<usize>],
    parallel: bool,
) -> Vec<Vector3<f64>> {
    let step = |i: usize| -> Vector3<f64> {
        let stencil = &stencils[i];
        if stencil.is_empty() {
            return x[i];
        }
        let mean: Vector3<f64> =
            stencil.iter().map(|&j| x[j]).sum::<Vector3<f64>>() / stencil.len() as f64;
        0.5 * (x[i] + mean)
    };

    if parallel {
        (0..x.len()).into_par_iter().map(step).collect()
    } else {
        (0..x.len()).map(step).collect()
    }
}

fn accumulate(result: &mut [Vector3<f64>], term: &[Vector3<f64>], weight: f64) {
    for (r, t) in result.iter_mut().zip(term) {
        *r += t * weight;
    }
}

/// Affine map between world coordinates and the filtering frame.
struct Frame {
    center: Vector3<f64>,
    scale: f64,
}

impl Frame {
    fn new(mesh: &Mesh, normalize: bool) -> Self {
        match mesh.bounding_box() {
            Some((min, max)) if normalize => {
                let extent = (max - min).max();
                Self {
                    center: (min.coords + max.coords) * 0.5,
                    scale: if extent > 0.0 { extent } else { 1.0 },
                }
            }
            _ => Self {
                center: Vector3::zeros(),
                scale: 1.0,
            },
        }
    }

    fn to_local(&self, p: &Point3<f64>) -> Vector3<f64> {
        (p.coords - self.center) / self.scale
    }

    fn to_world(&self, v: &Vector3<f64>) -> Point3<f64> {
        Point3::from(v * self.scale + self.center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{grid, icosphere, subdivided_cube};

    fn create_noisy_grid(n: usize) -> Mesh {
        let mut mesh = grid(n);
        for (i, p) in mesh.points.iter_mut().enumerate() {
            // Deterministic bumps on interior points.
            p.z = if i % 2 == 0 { 0.2 } else { -0.2 };
        }
        mesh
    }

    fn roughness(mesh: &Mesh) -> f64 {
        mesh.points.iter().map(|p| p.z * p.z).sum()
    }

    #[test]
    fn test_weights_sum_to_one() {
        for n in [1, 3, 10, 20] {
            let w = filter_weights(n, 0.5).unwrap();
            assert_eq!(w.len(), n + 1);
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_boundary_points_fixed() {
        let mesh = create_noisy_grid(6);
        let smoothed = smooth(&mesh, &SmoothOptions::default().with_iterations(10)).unwrap();
        let loops = crate::mesh::topology::boundary_loops(&mesh);
        for &v in &loops[0] {
            assert_eq!(smoothed.points[v], mesh.points[v]);
        }
    }

    #[test]
    fn test_reduces_noise() {
        let mesh = create_noisy_grid(8);
        let smoothed = smooth(
            &mesh,
            &SmoothOptions::default()
                .with_iterations(10)
                .with_pass_band(0.1)
                .with_feature_edge_smoothing(false),
        )
        .unwrap();
        assert!(roughness(&smoothed) < roughness(&mesh));
        assert_eq!(smoothed.polygons, mesh.polygons);
    }

    #[test]
    fn test_sphere_does_not_shrink() {
        let sphere = icosphere(2);
        let smoothed = smooth(
            &sphere,
            &SmoothOptions::default().with_iterations(15),
        )
        .unwrap();
        let mean_radius = |m: &Mesh| {
            m.points.iter().map(|p| p.coords.norm()).sum::<f64>() / m.num_points() as f64
        };
        assert!((mean_radius(&smoothed) - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_cube_corners_and_faces_kept() {
        let cube = subdivided_cube(4);
        let smoothed = smooth(&cube, &SmoothOptions::default().with_iterations(10)).unwrap();
        for (before, after) in cube.points.iter().zip(&smoothed.points) {
            // Every point stays on the cube surface.
            let on_surface = after.iter().any(|c| (c.abs() - 0.5).abs() < 1e-9);
            assert!(on_surface, "{:?} -> {:?} left the surface", before, after);
            let corner = before.iter().all(|c| (c.abs() - 0.5).abs() < 1e-12);
            if corner {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn test_zero_iterations_no_change() {
        let mesh = create_noisy_grid(4);
        let smoothed = smooth(&mesh, &SmoothOptions::default().with_iterations(0)).unwrap();
        assert_eq!(smoothed, mesh);
    }

    #[test]
    fn test_invalid_pass_band_rejected() {
        let mesh = create_noisy_grid(4);
        let err = smooth(&mesh, &SmoothOptions::default().with_pass_band(2.5)).unwrap_err();
        assert!(matches!(err, MeshError::InvalidParameter { name: "pass_band", .. }));
    }

    #[test]
    fn test_passthrough_on_non_finite_input() {
        let mut mesh = create_noisy_grid(4);
        let centre = 2 * 5 + 2;
        mesh.points[centre].z = f64::NAN;
        let out = smooth_or_passthrough(&mesh, &SmoothOptions::default());
        assert_eq!(out.num_points(), mesh.num_points());
        assert!(out.points[centre].z.is_nan());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mesh = create_noisy_grid(6);
        let seq = smooth(&mesh, &SmoothOptions::default()).unwrap();
        let par = smooth(&mesh, &SmoothOptions::default().with_parallel(true)).unwrap();
        for (a, b) in seq.points.iter().zip(&par.points) {
            assert!((a - b).norm() < 1e-12);
        }
    }
}
