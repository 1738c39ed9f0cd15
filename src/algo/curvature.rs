//! Discrete curvature for mesh inspection.
//!
//! Curvature is not part of the repair pipeline; the CLI's `info --curvature`
//! uses it to summarise a mesh. Polygons are triangulated first.
//!
//! # Curvature Types
//!
//! - **Gaussian curvature K**: angle defect over the mixed Voronoi area
//! - **Mean curvature H**: half the length of the cotangent Laplacian, positive
//!   where the surface bends away from its normals (a sphere with outward
//!   normals has `H = 1 / r`)
//! - **Principal curvatures k1, k2**: `H ± sqrt(H² - K)`
//!
//! Boundary points use `π` instead of `2π` in the angle defect.
//!
//! # Example
//!
//! ```
//! use meshmend::algo::curvature::{compute_curvature, CurvatureKind};
//! use meshmend::mesh::shapes::icosphere;
//!
//! let sphere = icosphere(2);
//! let result = compute_curvature(&sphere);
//! let (k1, k2) = result.principal(0);
//! assert!(k1 >= k2);
//!
//! let colored = result.to_scalars(&sphere, CurvatureKind::Mean);
//! assert_eq!(colored.scalars.map(|s| s.len()), Some(sphere.num_points()));
//! ```
//!
//! # References
//!
//! - Meyer, M., et al. (2003). "Discrete Differential-Geometry Operators for
//!   Triangulated 2-Manifolds." Visualization and Mathematics III.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::mesh::topology::boundary_edges;
use crate::mesh::{to_face_vertex, Mesh};

use super::normals::compute_normals;

/// Which curvature to write into a mesh's scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurvatureKind {
    /// Mean curvature.
    Mean,
    /// Gaussian curvature.
    Gaussian,
}

/// Per-point curvature values.
#[derive(Debug, Clone)]
pub struct CurvatureResult {
    gaussian: Vec<f64>,
    mean: Vec<f64>,
    /// Mixed Voronoi area per point.
    area: Vec<f64>,
}

impl CurvatureResult {
    /// Gaussian curvature at a point.
    #[inline]
    pub fn gaussian(&self, point: usize) -> f64 {
        self.gaussian[point]
    }

    /// Mean curvature at a point.
    #[inline]
    pub fn mean(&self, point: usize) -> f64 {
        self.mean[point]
    }

    /// Principal curvatures `(k1, k2)` with `k1 >= k2`.
    pub fn principal(&self, point: usize) -> (f64, f64) {
        let h = self.mean[point];
        let k = self.gaussian[point];
        let discriminant = h * h - k;
        if discriminant >= 0.0 {
            let s = discriminant.sqrt();
            (h + s, h - s)
        } else {
            // Numerical issues: fall back to H for both
            (h, h)
        }
    }

    /// Mixed Voronoi area of a point.
    #[inline]
    pub fn area(&self, point: usize) -> f64 {
        self.area[point]
    }

    /// All Gaussian curvatures.
    pub fn gaussian_values(&self) -> &[f64] {
        &self.gaussian
    }

    /// All mean curvatures.
    pub fn mean_values(&self) -> &[f64] {
        &self.mean
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.gaussian.len()
    }

    /// Whether there are no points.
    pub fn is_empty(&self) -> bool {
        self.gaussian.is_empty()
    }

    /// Shape index `(2/π) atan((k1+k2)/(k1-k2))` in `[-1, 1]`.
    pub fn shape_index(&self, point: usize) -> f64 {
        let (k1, k2) = self.principal(point);
        let diff = k1 - k2;
        if diff.abs() < 1e-10 {
            0.0 // Umbilical point
        } else {
            (2.0 / PI) * ((k1 + k2) / diff).atan()
        }
    }

    /// Curvedness `sqrt((k1² + k2²) / 2)`.
    pub fn curvedness(&self, point: usize) -> f64 {
        let (k1, k2) = self.principal(point);
        ((k1 * k1 + k2 * k2) / 2.0).sqrt()
    }

    /// A copy of `mesh` with the chosen curvature as point scalars.
    pub fn to_scalars(&self, mesh: &Mesh, kind: CurvatureKind) -> Mesh {
        let mut out = mesh.clone();
        out.scalars = Some(match kind {
            CurvatureKind::Mean => self.mean.clone(),
            CurvatureKind::Gaussian => self.gaussian.clone(),
        });
        out
    }
}

/// Summary of a set of curvature values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvatureStats {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

impl CurvatureStats {
    /// Statistics of the finite values, or `None` if there are none.
    pub fn of(values: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        Some(Self {
            min: finite.iter().copied().fold(f64::INFINITY, f64::min),
            max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: finite.iter().sum::<f64>() / finite.len() as f64,
        })
    }
}

/// Compute the angle at vertex `a` in triangle (a, b, c).
fn triangle_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let denom = ab.norm() * ac.norm();
    if denom < 1e-300 {
        return 0.0;
    }
    (ab.dot(&ac) / denom).clamp(-1.0, 1.0).acos()
}

/// Compute the cotangent of the angle at vertex `a` in triangle (a, b, c).
fn cotangent_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let cross_norm = ab.cross(&ac).norm();
    if cross_norm < 1e-10 {
        0.0
    } else {
        ab.dot(&ac) / cross_norm
    }
}

/// Per-point sums gathered triangle by triangle.
struct Accumulator {
    angle_sum: Vec<f64>,
    area: Vec<f64>,
    laplacian: Vec<Vector3<f64>>,
}

impl Accumulator {
    fn new(n: usize) -> Self {
        Self {
            angle_sum: vec![0.0; n],
            area: vec![0.0; n],
            laplacian: vec![Vector3::zeros(); n],
        }
    }

    fn add_triangle(&mut self, points: &[Point3<f64>], tri: [usize; 3]) {
        let p = tri.map(|v| points[v]);
        let angles = [
            triangle_angle(&p[0], &p[1], &p[2]),
            triangle_angle(&p[1], &p[2], &p[0]),
            triangle_angle(&p[2], &p[0], &p[1]),
        ];
        let cots = [
            cotangent_angle(&p[0], &p[1], &p[2]),
            cotangent_angle(&p[1], &p[2], &p[0]),
            cotangent_angle(&p[2], &p[0], &p[1]),
        ];
        let tri_area = 0.5 * (p[1] - p[0]).cross(&(p[2] - p[0])).norm();
        let obtuse = angles.iter().position(|&a| a > PI / 2.0);

        for i in 0..3 {
            let (j, k) = ((i + 1) % 3, (i + 2) % 3);
            let v = tri[i];
            self.angle_sum[v] += angles[i];

            // Mixed area (Meyer et al.)
            self.area[v] += match obtuse {
                None => {
                    0.125
                        * ((p[k] - p[i]).norm_squared() * cots[j]
                            + (p[j] - p[i]).norm_squared() * cots[k])
                }
                Some(o) if o == i => tri_area / 2.0,
                Some(_) => tri_area / 4.0,
            };

            // Edge (i, j) is opposite corner k.
            let w = 0.5 * cots[k].max(0.0);
            self.laplacian[v] += w * (p[j] - p[i]);
            self.laplacian[tri[j]] += w * (p[i] - p[j]);
        }
    }
}

/// Compute Gaussian and mean curvature for every point.
pub fn compute_curvature(mesh: &Mesh) -> CurvatureResult {
    let (points, faces) = to_face_vertex(mesh);
    let n = points.len();

    let mut acc = Accumulator::new(n);
    for tri in &faces {
        acc.add_triangle(&points, *tri);
    }

    let mut on_boundary = vec![false; n];
    for (a, b) in boundary_edges(mesh) {
        on_boundary[a] = true;
        on_boundary[b] = true;
    }
    let used = mesh.referenced_points();

    let normals = compute_normals(mesh).point_normals.unwrap_or_default();

    let per_point: Vec<(f64, f64)> = (0..n)
        .into_par_iter()
        .map(|v| {
            let area = acc.area[v];
            if !used[v] || area <= 1e-10 {
                return (0.0, 0.0);
            }
            let full = if on_boundary[v] { PI } else { 2.0 * PI };
            let k = (full - acc.angle_sum[v]) / area;

            let laplacian = acc.laplacian[v] / area;
            let normal = normals.get(v).copied().unwrap_or_else(Vector3::zeros);
            let sign = if laplacian.dot(&normal) <= 0.0 { 1.0 } else { -1.0 };
            (k, sign * laplacian.norm() / 2.0)
        })
        .collect();

    let (gaussian, mean) = per_point.into_iter().unzip();
    CurvatureResult {
        gaussian,
        mean,
        area: acc.area,
    }
}

/// Gaussian curvature of every point.
pub fn gaussian_curvature(mesh: &Mesh) -> Vec<f64> {
    compute_curvature(mesh).gaussian
}

/// Mean curvature of every point.
pub fn mean_curvature(mesh: &Mesh) -> Vec<f64> {
    compute_curvature(mesh).mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{grid, icosphere};

    #[test]
    fn test_curvature_flat_plane() {
        let mesh = grid(3);
        let result = compute_curvature(&mesh);

        // Interior point (1, 1)
        assert!(result.gaussian(5).abs() < 1e-9);
        assert!(result.mean(5).abs() < 1e-9);
    }

    #[test]
    fn test_curvature_sphere() {
        let mesh = icosphere(2);
        let result = compute_curvature(&mesh);
        for v in 0..mesh.num_points() {
            assert!(
                (result.mean(v) - 1.0).abs() < 0.2,
                "mean curvature {} at {}",
                result.mean(v),
                v
            );
            assert!(result.gaussian(v) > 0.0);
        }
    }

    #[test]
    fn test_gauss_bonnet() {
        let mesh = icosphere(2);
        let result = compute_curvature(&mesh);
        let total: f64 = (0..result.len())
            .map(|v| result.gaussian(v) * result.area(v))
            .sum();
        assert!((total - 4.0 * PI).abs() < 1e-6, "total {}", total);
    }

    #[test]
    fn test_principal_curvatures_relation() {
        let mesh = icosphere(1);
        let result = compute_curvature(&mesh);
        for v in 0..result.len() {
            let (k1, k2) = result.principal(v);
            assert!(k1 >= k2 - 1e-10);
            let h = result.mean(v);
            assert!(((k1 + k2) / 2.0 - h).abs() < 1e-9);
        }
    }

    #[test]
    fn test_boundary_and_single_triangle_finite() {
        let triangle = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        )
        .unwrap();
        for mesh in [grid(2), triangle] {
            let result = compute_curvature(&mesh);
            assert_eq!(result.len(), mesh.num_points());
            assert!(result.gaussian_values().iter().all(|k| k.is_finite()));
            assert!(result.mean_values().iter().all(|h| h.is_finite()));
        }
    }

    #[test]
    fn test_shape_index_and_curvedness() {
        let result = compute_curvature(&icosphere(1));
        for v in 0..result.len() {
            let si = result.shape_index(v);
            assert!((-1.0 - 1e-10..=1.0 + 1e-10).contains(&si));
            assert!(result.curvedness(v) >= 0.0);
        }
    }

    #[test]
    fn test_stats() {
        let stats = CurvatureStats::of(&[1.0, f64::NAN, -2.0, 4.0]).unwrap();
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 1.0);
        assert!(CurvatureStats::of(&[]).is_none());
    }
}
