//! Hole filling.
//!
//! A hole is a loop of boundary edges. Loops whose extent (the radius of the
//! loop's bounding sphere about its centroid) is at most
//! [`FillHolesOptions::hole_size`] are capped with triangles. Larger loops are
//! treated as intended boundaries and left open.
//!
//! Caps are wound opposite to the boundary edges they close, so a
//! consistently oriented mesh stays consistently oriented.

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::mesh::topology::boundary_loops;
use crate::mesh::{ear_clip, Mesh};

/// Options for [`fill_holes`].
#[derive(Debug, Clone)]
pub struct FillHolesOptions {
    /// Largest loop extent that is filled, in mesh units.
    pub hole_size: f64,
}

impl Default for FillHolesOptions {
    fn default() -> Self {
        Self { hole_size: 100.0 }
    }
}

impl FillHolesOptions {
    /// Create options with the given maximum hole size.
    pub fn with_hole_size(hole_size: f64) -> Self {
        Self { hole_size }
    }
}

/// Counts of holes handled by [`fill_holes_with_report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Loops that were capped.
    pub filled: usize,
    /// Loops left open because they exceed the size limit.
    pub skipped: usize,
    /// Caps that needed an added centroid point.
    pub fan_fallbacks: usize,
}

/// Fill boundary loops no larger than `options.hole_size`.
pub fn fill_holes(mesh: &Mesh, options: &FillHolesOptions) -> Mesh {
    fill_holes_with_report(mesh, options).0
}

/// Fill holes and report how many were filled or skipped.
pub fn fill_holes_with_report(mesh: &Mesh, options: &FillHolesOptions) -> (Mesh, FillReport) {
    let mut out = mesh.clone();
    let mut report = FillReport::default();

    for boundary in boundary_loops(mesh) {
        if boundary.len() < 3 {
            report.skipped += 1;
            continue;
        }

        let size = loop_extent(&mesh.points, &boundary);
        if size > options.hole_size {
            debug!(
                "fill_holes: leaving loop of {} edges open (extent {:.4} > {:.4})",
                boundary.len(),
                size,
                options.hole_size
            );
            report.skipped += 1;
            continue;
        }

        // Walk the loop backwards so cap edges oppose the existing ones.
        let cap: Vec<usize> = boundary.iter().rev().copied().collect();
        match ear_clip(&out.points, &cap) {
            Some(triangles) => {
                out.polygons.extend(triangles.iter().map(|t| t.to_vec()));
            }
            None => {
                let center = add_centroid_point(&mut out, &cap);
                let n = cap.len();
                for i in 0..n {
                    out.polygons.push(vec![cap[i], cap[(i + 1) % n], center]);
                }
                report.fan_fallbacks += 1;
            }
        }
        report.filled += 1;
    }

    out.invalidate_normals();
    debug!(
        "fill_holes: filled {} holes, skipped {}",
        report.filled, report.skipped
    );
    (out, report)
}

/// Radius of the loop's bounding sphere about its centroid.
pub fn loop_extent(points: &[Point3<f64>], boundary: &[usize]) -> f64 {
    let center = loop_centroid(points, boundary);
    boundary
        .iter()
        .map(|&v| (points[v] - center).norm())
        .fold(0.0, f64::max)
}

fn loop_centroid(points: &[Point3<f64>], boundary: &[usize]) -> Point3<f64> {
    let sum: Vector3<f64> = boundary.iter().map(|&v| points[v].coords).sum();
    Point3::from(sum / boundary.len().max(1) as f64)
}

fn add_centroid_point(mesh: &mut Mesh, boundary: &[usize]) -> usize {
    let center = loop_centroid(&mesh.points, boundary);
    if let Some(scalars) = &mut mesh.scalars {
        let mean = boundary.iter().map(|&v| scalars[v]).sum::<f64>() / boundary.len() as f64;
        scalars.push(mean);
    }
    mesh.points.push(center);
    mesh.points.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{grid, open_cube};
    use crate::mesh::topology::{boundary_loop_count, is_closed_manifold};

    fn create_bent_strip_loop() -> Mesh {
        // Four triangles around a non-planar square hole.
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.5),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.5),
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(2.0, -1.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(-1.0, 2.0, 0.0),
        ];
        let quads = vec![
            vec![4, 5, 1, 0],
            vec![5, 6, 2, 1],
            vec![6, 7, 3, 2],
            vec![7, 4, 0, 3],
        ];
        Mesh::from_polygons(points, quads).unwrap()
    }

    #[test]
    fn test_fills_open_cube() {
        let mesh = open_cube(3);
        let (filled, report) = fill_holes_with_report(&mesh, &FillHolesOptions::default());
        assert_eq!(report.filled, 1);
        assert_eq!(boundary_loop_count(&filled), 0);
        assert!(is_closed_manifold(&filled));
        // Cap winds outward like the rest of the cube.
        assert!((filled.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_hole_left_open() {
        let mesh = open_cube(3);
        let (filled, report) =
            fill_holes_with_report(&mesh, &FillHolesOptions::with_hole_size(0.1));
        assert_eq!(report.filled, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(filled.polygons, mesh.polygons);
    }

    #[test]
    fn test_extent_of_unit_square() {
        let g = grid(1);
        let extent = loop_extent(&g.points, &[0, 1, 3, 2]);
        assert!((extent - 0.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_inner_hole_filled_outer_kept() {
        let mesh = create_bent_strip_loop();
        assert_eq!(boundary_loop_count(&mesh), 2);
        let (filled, report) =
            fill_holes_with_report(&mesh, &FillHolesOptions::with_hole_size(1.0));
        assert_eq!(report.filled, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(boundary_loop_count(&filled), 1);
    }

    #[test]
    fn test_cap_edges_oppose_boundary_edges() {
        let mesh = open_cube(2);
        let filled = fill_holes(&mesh, &FillHolesOptions::default());
        let edges = crate::mesh::topology::edge_polygons(&filled);
        assert!(edges.values().all(|p| p.len() == 2));
        // Every directed edge appears exactly once when winding is consistent.
        let mut directed = std::collections::HashSet::new();
        for polygon in &filled.polygons {
            for i in 0..polygon.len() {
                let e = (polygon[i], polygon[(i + 1) % polygon.len()]);
                assert!(directed.insert(e), "directed edge {:?} repeated", e);
            }
        }
    }
}
