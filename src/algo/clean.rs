//! Mesh cleaning.
//!
//! Cleaning merges coincident points, removes degenerate cells and drops
//! points nothing references. After cleaning every polygon is a triangle with
//! three distinct points and non-zero area.
//!
//! Cleaning is idempotent: the first point of each merge bucket is kept as the
//! representative and the point order is preserved, so a second pass finds
//! nothing left to do.
//!
//! # Example
//!
//! ```
//! use meshmend::algo::clean::{clean, CleanOptions};
//! use meshmend::mesh::Mesh;
//! use nalgebra::Point3;
//!
//! // Two triangles that do not share point indices along their common edge.
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh = Mesh::from_triangles(points, &[[0, 1, 2], [3, 4, 5]]).unwrap();
//!
//! let cleaned = clean(&mesh, &CleanOptions::default());
//! assert_eq!(cleaned.num_points(), 4);
//! ```

use std::collections::{HashMap, HashSet};

use log::debug;
use nalgebra::Point3;

use crate::mesh::topology::canonical_edge;
use crate::mesh::{area_vector, triangulate_polygon, Mesh};

/// Options for [`clean`].
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Absolute merge distance. Zero merges only bit-identical coordinates.
    pub tolerance: f64,

    /// Polygons with area at or below `area_epsilon * diagonal²` are removed.
    pub area_epsilon: f64,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            area_epsilon: 1e-12,
        }
    }
}

impl CleanOptions {
    /// Set the absolute merge tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    /// Set the relative degenerate-area threshold.
    pub fn with_area_epsilon(mut self, epsilon: f64) -> Self {
        self.area_epsilon = epsilon.max(0.0);
        self
    }
}

/// What a cleaning pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Points folded into an earlier coincident point.
    pub merged_points: usize,
    /// Polygons dropped as degenerate (after triangulation).
    pub removed_polygons: usize,
    /// Lines dropped as zero-length or duplicate.
    pub removed_lines: usize,
    /// Points dropped because nothing referenced them.
    pub removed_points: usize,
}

/// Clean a mesh. See the module documentation for the exact steps.
pub fn clean(mesh: &Mesh, options: &CleanOptions) -> Mesh {
    clean_with_report(mesh, options).0
}

/// Clean a mesh and report what changed.
pub fn clean_with_report(mesh: &Mesh, options: &CleanOptions) -> (Mesh, CleanReport) {
    let mut report = CleanReport::default();

    // Merge coincident points.
    let (points, scalars, remap) = merge_points(mesh, options.tolerance);
    report.merged_points = mesh.points.len() - points.len();

    // Remap and triangulate polygons, dropping degenerate ones.
    let diagonal = bbox_diagonal(&points);
    let min_area = options.area_epsilon * diagonal * diagonal;
    let mut polygons = Vec::with_capacity(mesh.polygons.len());
    let mut triangles_in = 0;
    for polygon in &mesh.polygons {
        let Some(ring) = simplify_ring(polygon.iter().map(|&v| remap[v])) else {
            report.removed_polygons += 1;
            continue;
        };
        for tri in triangulate_polygon(&points, &ring) {
            triangles_in += 1;
            if area_vector(&points, &tri).norm() > min_area {
                polygons.push(tri.to_vec());
            }
        }
    }
    report.removed_polygons += triangles_in - polygons.len();

    // Remap lines, dropping zero-length and repeated ones.
    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(mesh.lines.len());
    for line in &mesh.lines {
        let (a, b) = (remap[line[0]], remap[line[1]]);
        if a != b && seen.insert(canonical_edge(a, b)) {
            lines.push([a, b]);
        }
    }
    report.removed_lines = mesh.lines.len() - lines.len();

    let merged = Mesh {
        points,
        polygons,
        lines,
        point_normals: None,
        cell_normals: None,
        scalars,
    };

    // A bare point cloud keeps its (merged) points.
    let cleaned = if mesh.has_cells() {
        merged.compact()
    } else {
        merged
    };
    report.removed_points = mesh.points.len() - report.merged_points - cleaned.points.len();

    debug!(
        "clean: merged {} points, removed {} polygons, {} lines, {} points",
        report.merged_points, report.removed_polygons, report.removed_lines, report.removed_points
    );

    (cleaned, report)
}

/// Bucket points by quantised coordinates; the first point of each bucket wins.
fn merge_points(mesh: &Mesh, tolerance: f64) -> (Vec<Point3<f64>>, Option<Vec<f64>>, Vec<usize>) {
    let mut buckets: HashMap<[i64; 3], usize> = HashMap::with_capacity(mesh.points.len());
    let mut points = Vec::with_capacity(mesh.points.len());
    let mut scalars = mesh.scalars.as_ref().map(|_| Vec::new());
    let mut remap = Vec::with_capacity(mesh.points.len());

    for (i, p) in mesh.points.iter().enumerate() {
        let key = quantize(p, tolerance);
        let next = points.len();
        let target = *buckets.entry(key).or_insert(next);
        if target == next {
            points.push(*p);
            if let (Some(out), Some(src)) = (&mut scalars, &mesh.scalars) {
                out.push(src[i]);
            }
        }
        remap.push(target);
    }

    (points, scalars, remap)
}

fn quantize(p: &Point3<f64>, tolerance: f64) -> [i64; 3] {
    if tolerance > 0.0 {
        [
            (p.x / tolerance).floor() as i64,
            (p.y / tolerance).floor() as i64,
            (p.z / tolerance).floor() as i64,
        ]
    } else {
        // Adding zero folds -0.0 into 0.0.
        [
            (p.x + 0.0).to_bits() as i64,
            (p.y + 0.0).to_bits() as i64,
            (p.z + 0.0).to_bits() as i64,
        ]
    }
}

/// Collapse consecutive repeats (including the wrap-around) and reject rings
/// that are too short or still revisit a point.
fn simplify_ring(indices: impl Iterator<Item = usize>) -> Option<Vec<usize>> {
    let mut ring: Vec<usize> = Vec::new();
    for v in indices {
        if ring.last() != Some(&v) {
            ring.push(v);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return None;
    }
    let unique: HashSet<usize> = ring.iter().copied().collect();
    (unique.len() == ring.len()).then_some(ring)
}

fn bbox_diagonal(points: &[Point3<f64>]) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (min, max) = points[1..]
        .iter()
        .fold((*first, *first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    (max - min).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{subdivided_cube, unit_cube};

    fn create_split_square() -> Mesh {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        Mesh::from_triangles(points, &[[0, 1, 2], [3, 4, 2]]).unwrap()
    }

    #[test]
    fn test_merges_duplicate_points() {
        let (cleaned, report) = clean_with_report(&create_split_square(), &CleanOptions::default());
        assert_eq!(cleaned.num_points(), 4);
        assert_eq!(report.merged_points, 2);
        assert_eq!(cleaned.polygons, vec![vec![0, 1, 2], vec![1, 3, 2]]);
    }

    #[test]
    fn test_negative_zero_merges() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(-0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = Mesh::from_triangles(points, &[[0, 2, 3], [1, 2, 3]]).unwrap();
        let cleaned = clean(&mesh, &CleanOptions::default());
        assert_eq!(cleaned.num_points(), 3);
    }

    #[test]
    fn test_tolerance_merge() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0004, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0004 + 1e-9, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let mesh = Mesh::from_triangles(points, &[[0, 1, 2], [3, 4, 2]]).unwrap();
        let exact = clean(&mesh, &CleanOptions::default());
        assert_eq!(exact.num_points(), 5);
        let loose = clean(&mesh, &CleanOptions::default().with_tolerance(1e-3));
        assert_eq!(loose.num_points(), 4);
    }

    #[test]
    fn test_removes_degenerate_polygons() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let mesh = Mesh::from_polygons(
            points,
            vec![
                vec![0, 1, 2],
                vec![0, 0, 1],    // repeated index
                vec![0, 1, 3],    // colinear, zero area
                vec![0, 1],       // too short
                vec![0, 1, 0, 2], // revisits a point
            ],
        )
        .unwrap();
        let (cleaned, report) = clean_with_report(&mesh, &CleanOptions::default());
        assert_eq!(cleaned.polygons, vec![vec![0, 1, 2]]);
        assert_eq!(report.removed_polygons, 4);
        // Point 3 is no longer referenced.
        assert_eq!(cleaned.num_points(), 3);
    }

    #[test]
    fn test_triangulates_quads() {
        let cleaned = clean(&unit_cube(), &CleanOptions::default());
        assert_eq!(cleaned.num_polygons(), 12);
        assert!(cleaned.is_triangle_mesh());
    }

    #[test]
    fn test_point_cloud_keeps_points() {
        let mesh = Mesh::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ]);
        let cleaned = clean(&mesh, &CleanOptions::default());
        assert_eq!(cleaned.num_points(), 2);
    }

    #[test]
    fn test_lines_deduplicated() {
        let mut mesh = Mesh::from_points(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
        mesh.lines = vec![[0, 1], [1, 0], [1, 1]];
        let cleaned = clean(&mesh, &CleanOptions::default());
        assert_eq!(cleaned.lines, vec![[0, 1]]);
    }

    #[test]
    fn test_scalars_follow_representative() {
        let mut mesh = create_split_square();
        mesh.scalars = Some(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let cleaned = clean(&mesh, &CleanOptions::default());
        assert_eq!(cleaned.scalars, Some(vec![0.0, 1.0, 2.0, 4.0]));
    }

    #[test]
    fn test_idempotent() {
        let mut mesh = subdivided_cube(3);
        // Duplicate every point reference of the first ten faces.
        for pi in 0..10 {
            let polygon = mesh.polygons[pi].clone();
            let base = mesh.points.len();
            for &v in &polygon {
                mesh.points.push(mesh.points[v]);
            }
            mesh.polygons[pi] = (base..base + polygon.len()).collect();
        }
        let once = clean(&mesh, &CleanOptions::default());
        let twice = clean(&once, &CleanOptions::default());
        assert_eq!(once, twice);
    }
}
