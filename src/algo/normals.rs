//! Point and cell normal computation.
//!
//! Cell normals are the normalised area vector of each polygon, so they follow
//! the right-hand rule for the polygon's point order. Point normals are the
//! normalised sum of the area vectors of incident polygons, which weights
//! larger polygons more. Zero-area polygons and isolated points get the zero
//! vector.
//!
//! Normals point outward only if the polygons are wound outward; the
//! reconstructor's orientation pass and the hole filler's cap winding take
//! care of that before normals are recomputed.

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::mesh::{area_vector, Mesh};

/// Options for [`compute_normals_with`].
#[derive(Debug, Clone, Default)]
pub struct NormalsOptions {
    /// Compute cell area vectors on the rayon thread pool.
    pub parallel: bool,
}

/// Compute point and cell normals.
pub fn compute_normals(mesh: &Mesh) -> Mesh {
    compute_normals_with(mesh, &NormalsOptions::default())
}

/// Compute point and cell normals with options.
pub fn compute_normals_with(mesh: &Mesh, options: &NormalsOptions) -> Mesh {
    let areas: Vec<Vector3<f64>> = if options.parallel {
        mesh.polygons
            .par_iter()
            .map(|p| area_vector(&mesh.points, p))
            .collect()
    } else {
        mesh.polygons
            .iter()
            .map(|p| area_vector(&mesh.points, p))
            .collect()
    };

    let mut point_normals = vec![Vector3::zeros(); mesh.points.len()];
    for (polygon, a) in mesh.polygons.iter().zip(&areas) {
        for &v in polygon {
            point_normals[v] += a;
        }
    }

    let mut out = mesh.clone();
    out.cell_normals = Some(areas.iter().map(unit_or_zero).collect());
    out.point_normals = Some(point_normals.iter().map(unit_or_zero).collect());
    out
}

fn unit_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    let len = v.norm();
    if len > 1e-300 && len.is_finite() {
        v / len
    } else {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{grid, icosphere, unit_cube};
    use nalgebra::Point3;

    #[test]
    fn test_unit_cube_face_normals_axis_aligned_outward() {
        let cube = compute_normals(&unit_cube());
        let normals = cube.cell_normals.as_ref().unwrap();
        assert_eq!(normals.len(), 6);
        for (i, n) in normals.iter().enumerate() {
            // Exactly one axis component, magnitude one.
            let axis = n.iter().filter(|c| c.abs() > 1e-12).count();
            assert_eq!(axis, 1, "normal {:?} not axis-aligned", n);
            assert!((n.norm() - 1.0).abs() < 1e-12);

            let polygon = &cube.polygons[i];
            let center: Vector3<f64> = polygon.iter().map(|&v| cube.points[v].coords).sum();
            let center = center / polygon.len() as f64;
            assert!(n.dot(&center) > 0.0, "face {} points inward", i);
        }
    }

    #[test]
    fn test_sphere_point_normals_radial() {
        let sphere = compute_normals(&icosphere(2));
        let normals = sphere.point_normals.as_ref().unwrap();
        for (p, n) in sphere.points.iter().zip(normals) {
            assert!(n.dot(&p.coords.normalize()) > 0.99);
        }
    }

    #[test]
    fn test_isolated_point_gets_zero_normal() {
        let mut mesh = grid(1);
        mesh.points.push(Point3::new(5.0, 5.0, 5.0));
        let out = compute_normals(&mesh);
        let normals = out.point_normals.unwrap();
        assert_eq!(normals[4], Vector3::zeros());
        assert!((normals[0] - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let sphere = icosphere(2);
        let a = compute_normals(&sphere);
        let b = compute_normals_with(&sphere, &NormalsOptions { parallel: true });
        assert_eq!(a.cell_normals, b.cell_normals);
        assert_eq!(a.point_normals, b.point_normals);
    }
}
