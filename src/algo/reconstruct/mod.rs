//! Implicit surface reconstruction from points.
//!
//! The mesh's points are treated as an unorganised cloud. Polygons only add
//! samples: faces larger than a lattice cell are sampled so a coarse mesh
//! does not leave holes in the cloud. Reconstruction follows Hoppe et al.:
//!
//! 1. Fit a tangent plane to the `k` nearest neighbours of every point.
//! 2. Orient the planes consistently by walking a minimum spanning tree of
//!    the neighbour graph, preferring edges between near-parallel planes.
//! 3. Sample the blended signed distance to the nearest planes on a padded
//!    lattice.
//! 4. Extract the zero level with marching tetrahedra.
//! 5. Make the winding consistent and outward, then compute normals.
//!
//! The output is a closed, consistently oriented triangle mesh.
//!
//! # Example
//!
//! ```
//! use meshmend::algo::reconstruct::{reconstruct, ReconstructOptions};
//! use meshmend::mesh::shapes::icosphere;
//! use meshmend::mesh::topology::is_closed_manifold;
//!
//! let sphere = icosphere(2);
//! let surface = reconstruct(&sphere, &ReconstructOptions::default().with_resolution(16)).unwrap();
//! assert!(is_closed_manifold(&surface));
//! ```
//!
//! # References
//!
//! - Hoppe, H., DeRose, T., Duchamp, T., McDonald, J. & Stuetzle, W. (1992).
//!   "Surface Reconstruction from Unorganized Points." SIGGRAPH '92.

mod field;
mod orient;
mod tetra;

use std::collections::BTreeSet;

use log::{debug, info};
use nalgebra::{Point3, Vector3};

pub use orient::orient_consistently;

use crate::error::{MeshError, Result};
use crate::mesh::topology::canonical_edge;
use crate::mesh::Mesh;

use super::clean::{clean, CleanOptions};
use super::normals::{compute_normals_with, NormalsOptions};
use field::TangentPlanes;
use tetra::Lattice;

/// Lattice origin shift in cells, keeping axis-aligned input planes off the
/// lattice planes.
const LATTICE_SHIFT: f64 = 0.37;

/// Samples within this fraction of a cell from zero are snapped outside.
const SNAP_FRACTION: f64 = 1e-2;

/// Options for [`reconstruct`].
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    /// Lattice cells along the longest bounding box axis.
    pub resolution: usize,
    /// Neighbours used to fit each tangent plane.
    pub neighbors: usize,
    /// Empty cells added around the bounding box on every side.
    pub padding: usize,
    /// Fit planes and sample the lattice on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            resolution: 32,
            neighbors: 12,
            padding: 2,
            parallel: false,
        }
    }
}

impl ReconstructOptions {
    /// Set the lattice resolution.
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the neighbourhood size.
    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// Enable or disable parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.resolution < 2 {
            return Err(MeshError::invalid_param(
                "resolution",
                self.resolution,
                "must be at least 2",
            ));
        }
        if self.neighbors < 3 {
            return Err(MeshError::invalid_param(
                "neighbors",
                self.neighbors,
                "must be at least 3",
            ));
        }
        if self.padding == 0 {
            return Err(MeshError::invalid_param(
                "padding",
                self.padding,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Reconstruct a closed surface from the points of `mesh`.
///
/// Fails with [`MeshError::InsufficientGeometry`] when there are fewer than
/// four points or the points do not span three dimensions.
pub fn reconstruct(mesh: &Mesh, options: &ReconstructOptions) -> Result<Mesh> {
    options.validate()?;
    field::check_spread(&mesh.points)?;

    let lattice = lattice_for(mesh, options)?;
    let points = surface_cloud(mesh, lattice.spacing);
    debug!(
        "reconstruct: {} points ({} sampled on faces), lattice {:?}, spacing {:.5}",
        points.len(),
        points.len() - mesh.points.len(),
        lattice.dims,
        lattice.spacing
    );

    let mut planes = TangentPlanes::fit(&points, options.neighbors, options.parallel);
    planes.orient();

    let values = tetra::sample(
        &lattice,
        |x| planes.distance(x),
        SNAP_FRACTION * lattice.spacing,
        options.parallel,
    );
    let (surface_points, triangles) = tetra::extract(&lattice, &values);
    if triangles.is_empty() {
        return Err(MeshError::insufficient("no zero crossing in the sampled field"));
    }

    let surface = Mesh::from_triangles(surface_points, &triangles)?;
    let mut surface = clean(&surface, &CleanOptions::default());
    let flipped = orient_consistently(&mut surface);
    info!(
        "reconstruct: {} points -> {} triangles ({} reoriented)",
        mesh.points.len(),
        surface.num_polygons(),
        flipped
    );

    Ok(compute_normals_with(
        &surface,
        &NormalsOptions {
            parallel: options.parallel,
        },
    ))
}

/// The mesh's points plus samples on its edges and faces, no further than
/// `spacing` apart along any edge. Repeated polygons are sampled once.
fn surface_cloud(mesh: &Mesh, spacing: f64) -> Vec<Point3<f64>> {
    let mut cloud = mesh.points.clone();
    if !(spacing > 0.0 && spacing.is_finite()) {
        return cloud;
    }
    let steps = |a: usize, b: usize| -> usize {
        ((mesh.points[a] - mesh.points[b]).norm() / spacing).ceil() as usize
    };

    let mut faces: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut edges = BTreeSet::new();
    let mut triangles = Vec::new();
    for polygon in &mesh.polygons {
        let mut key = polygon.clone();
        key.sort_unstable();
        if !faces.insert(key) {
            continue;
        }
        let n = polygon.len();
        for i in 0..n {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            if a != b {
                edges.insert(canonical_edge(a, b));
            }
        }
        // Fan diagonals are sampled like edges.
        for i in 1..n.saturating_sub(1) {
            if i > 1 {
                edges.insert(canonical_edge(polygon[0], polygon[i]));
            }
            triangles.push([polygon[0], polygon[i], polygon[i + 1]]);
        }
    }

    for (a, b) in edges {
        let m = steps(a, b);
        let (pa, pb) = (mesh.points[a], mesh.points[b]);
        for s in 1..m {
            cloud.push(pa + (pb - pa) * (s as f64 / m as f64));
        }
    }

    for [a, b, c] in triangles {
        let m = steps(a, b).max(steps(b, c)).max(steps(c, a));
        let p0 = mesh.points[a];
        let (u, v) = (mesh.points[b] - p0, mesh.points[c] - p0);
        for i in 1..m {
            for j in 1..m - i {
                cloud.push(p0 + u * (i as f64 / m as f64) + v * (j as f64 / m as f64));
            }
        }
    }
    cloud
}

fn lattice_for(mesh: &Mesh, options: &ReconstructOptions) -> Result<Lattice> {
    let (min, max) = mesh
        .bounding_box()
        .ok_or_else(|| MeshError::insufficient("no points"))?;
    let extent: Vector3<f64> = max - min;
    let longest = extent.max();
    if longest <= 0.0 || !longest.is_finite() {
        return Err(MeshError::insufficient("points have no extent"));
    }

    let spacing = longest / options.resolution as f64;
    let shift = options.padding as f64 + LATTICE_SHIFT;
    let origin = min - Vector3::repeat(shift * spacing);
    let dims = [0usize, 1, 2].map(|a| (extent[a] / spacing).ceil() as usize + 2 * options.padding + 2);
    Ok(Lattice {
        origin,
        spacing,
        dims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{grid, icosphere, subdivided_cube};
    use crate::mesh::topology::{boundary_loop_count, component_count, is_closed_manifold};
    use nalgebra::Point3;

    #[test]
    fn test_colinear_points_fail() {
        let cloud = Mesh::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 2.0),
        ]);
        assert!(matches!(
            reconstruct(&cloud, &ReconstructOptions::default()),
            Err(MeshError::InsufficientGeometry { .. })
        ));
    }

    #[test]
    fn test_planar_grid_fails() {
        assert!(matches!(
            reconstruct(&grid(4), &ReconstructOptions::default()),
            Err(MeshError::InsufficientGeometry { .. })
        ));
    }

    #[test]
    fn test_sphere_reconstruction() {
        let sphere = icosphere(3);
        let out = reconstruct(&sphere, &ReconstructOptions::default().with_resolution(20)).unwrap();
        assert!(is_closed_manifold(&out));
        assert_eq!(component_count(&out), 1);
        assert_eq!(boundary_loop_count(&out), 0);
        assert!(out.signed_volume() > 0.0);
        for p in &out.points {
            assert!((p.coords.norm() - 1.0).abs() < 0.1, "point {:?} off surface", p);
        }
        let normals = out.point_normals.as_ref().unwrap();
        assert_eq!(normals.len(), out.num_points());
    }

    #[test]
    fn test_cube_faces_outward() {
        let cube = subdivided_cube(6);
        let out = reconstruct(&cube, &ReconstructOptions::default().with_resolution(16)).unwrap();
        assert!(is_closed_manifold(&out));
        assert!(out.signed_volume() > 0.0);

        let center = out.centroid().unwrap();
        let normals = out.cell_normals.as_ref().unwrap();
        let mut outward = 0.0;
        let mut total = 0.0;
        for (i, polygon) in out.polygons.iter().enumerate() {
            let c = polygon.iter().map(|&v| out.points[v].coords).sum::<Vector3<f64>>() / 3.0;
            let area = out.polygon_area(i);
            total += area;
            if normals[i].dot(&(c - center.coords)) > 0.0 {
                outward += area;
            }
        }
        assert!(outward / total > 0.99);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let sphere = icosphere(2);
        let options = ReconstructOptions::default().with_resolution(12);
        let a = reconstruct(&sphere, &options).unwrap();
        let b = reconstruct(&sphere, &options.clone().with_parallel(true)).unwrap();
        assert_eq!(a.points, b.points);
        assert_eq!(a.polygons, b.polygons);
    }

    #[test]
    fn test_coarse_faces_are_sampled() {
        let cube = crate::mesh::shapes::unit_cube();
        let cloud = surface_cloud(&cube, 0.25);
        // 12 edges with 3 inner samples, 6 diagonals with 5, and 12 fan
        // triangles split six ways along their diagonal with 10 inner samples.
        assert_eq!(cloud.len(), 8 + 36 + 30 + 120);
        for p in &cloud {
            assert!(p.coords.amax() <= 0.5 + 1e-12);
            assert!((p.coords.amax() - 0.5).abs() < 1e-12, "{:?} is off the surface", p);
        }
        // Dense meshes gain nothing.
        let sphere = icosphere(3);
        assert_eq!(surface_cloud(&sphere, 1.0).len(), sphere.num_points());
    }

    #[test]
    fn test_eight_point_cube_reconstruction() {
        let cube = crate::mesh::shapes::unit_cube();
        let out = reconstruct(&cube, &ReconstructOptions::default().with_resolution(16)).unwrap();
        assert!(is_closed_manifold(&out));
        assert_eq!(component_count(&out), 1);
        assert!(out.signed_volume() > 0.5);
    }

    #[test]
    fn test_large_flat_faces() {
        let cube = subdivided_cube(60);
        assert!(cube.num_points() > 20_000);
        let out = reconstruct(&cube, &ReconstructOptions::default().with_resolution(8)).unwrap();
        assert!(is_closed_manifold(&out));
        assert_eq!(boundary_loop_count(&out), 0);
    }

    #[test]
    fn test_invalid_resolution() {
        let err = reconstruct(&icosphere(1), &ReconstructOptions::default().with_resolution(1));
        assert!(matches!(err, Err(MeshError::InvalidParameter { name: "resolution", .. })));
    }
}
