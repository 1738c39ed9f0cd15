//! Mesh construction utilities.
//!
//! Helpers for building [`Mesh`] values from face-vertex lists as found in
//! file formats, and for splitting polygons into triangles.

use nalgebra::{Point2, Point3, Vector3};

use crate::error::Result;

use super::polymesh::{area_vector, Mesh};

/// Build a mesh from a list of points and triangles.
///
/// # Example
///
/// ```
/// use meshmend::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let points = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let mesh = build_from_triangles(&points, &[[0, 1, 2]]).unwrap();
/// assert_eq!(mesh.num_polygons(), 1);
/// ```
pub fn build_from_triangles(points: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Mesh> {
    Mesh::from_triangles(points.to_vec(), faces)
}

/// Build a mesh from a list of points and quads.
pub fn build_from_quads(points: &[Point3<f64>], faces: &[[usize; 4]]) -> Result<Mesh> {
    Mesh::from_polygons(points.to_vec(), faces.iter().map(|f| f.to_vec()).collect())
}

/// Extract points and triangles, triangulating any larger polygons.
pub fn to_face_vertex(mesh: &Mesh) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let faces = mesh
        .polygons
        .iter()
        .flat_map(|polygon| triangulate_polygon(&mesh.points, polygon))
        .collect();
    (mesh.points.clone(), faces)
}

/// Split a polygon into triangles with the same winding.
///
/// Ear clipping is tried first; if it stalls (self-intersecting or badly
/// non-planar input) the polygon is fanned around its first point.
pub fn triangulate_polygon(points: &[Point3<f64>], polygon: &[usize]) -> Vec<[usize; 3]> {
    match polygon.len() {
        0..=2 => Vec::new(),
        3 => vec![[polygon[0], polygon[1], polygon[2]]],
        _ => ear_clip(points, polygon).unwrap_or_else(|| fan(polygon)),
    }
}

/// Fan triangulation around the first point.
pub fn fan(polygon: &[usize]) -> Vec<[usize; 3]> {
    (1..polygon.len().saturating_sub(1))
        .map(|i| [polygon[0], polygon[i], polygon[i + 1]])
        .collect()
}

/// Ear-clipping triangulation of a simple polygon.
///
/// The polygon is projected onto the plane of its area vector. Returns `None`
/// when the polygon has no area or no ear can be found.
pub fn ear_clip(points: &[Point3<f64>], polygon: &[usize]) -> Option<Vec<[usize; 3]>> {
    let n = polygon.len();
    if n < 3 {
        return None;
    }
    if n == 3 {
        return Some(vec![[polygon[0], polygon[1], polygon[2]]]);
    }

    let normal = area_vector(points, polygon);
    let len = normal.norm();
    if len <= 0.0 || !len.is_finite() {
        return None;
    }
    let normal = normal / len;
    let (u, v) = plane_basis(&normal);
    let origin = points[polygon[0]];
    let projected: Vec<Point2<f64>> = polygon
        .iter()
        .map(|&i| {
            let d = points[i] - origin;
            Point2::new(d.dot(&u), d.dot(&v))
        })
        .collect();

    // Tolerance scaled by the polygon's extent.
    let extent = projected
        .iter()
        .map(|p| p.coords.norm())
        .fold(0.0_f64, f64::max);
    let eps = 1e-12 * extent * extent;

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        let mut clipped = false;

        for i in 0..m {
            let prev = remaining[(i + m - 1) % m];
            let curr = remaining[i];
            let next = remaining[(i + 1) % m];

            if !is_ear(&projected, &remaining, prev, curr, next, eps) {
                continue;
            }

            triangles.push([polygon[prev], polygon[curr], polygon[next]]);
            remaining.remove(i);
            clipped = true;
            break;
        }

        if !clipped {
            return None;
        }
    }

    triangles.push([
        polygon[remaining[0]],
        polygon[remaining[1]],
        polygon[remaining[2]],
    ]);
    Some(triangles)
}

/// Two unit vectors spanning the plane orthogonal to `normal`, right-handed.
pub(crate) fn plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = normal.cross(&helper).normalize();
    let v = normal.cross(&u);
    (u, v)
}

fn is_ear(
    projected: &[Point2<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    eps: f64,
) -> bool {
    let a = projected[prev];
    let b = projected[curr];
    let c = projected[next];

    // Must be convex with respect to the polygon's counter-clockwise order.
    if cross_2d(&a, &b, &c) <= eps {
        return false;
    }

    remaining
        .iter()
        .filter(|&&j| j != prev && j != curr && j != next)
        .all(|&j| !point_in_triangle(&projected[j], &a, &b, &c))
}

fn cross_2d(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn point_in_triangle(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    let d1 = cross_2d(a, b, p);
    let d2 = cross_2d(b, c, p);
    let d3 = cross_2d(c, a, p);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;

    !(has_neg && has_pos)
}
