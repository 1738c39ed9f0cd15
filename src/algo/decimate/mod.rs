//! Topology-preserving mesh decimation.
//!
//! Reduces the triangle count by a target fraction using quadric error
//! metrics (Garland & Heckbert, 1997). Each point carries a quadric that sums
//! the squared distances to the planes of its original incident triangles;
//! the edge whose collapse adds the least error is collapsed first.
//!
//! Collapses that would change topology are refused: the link condition must
//! hold, boundary edges are never collapsed, an interior edge joining two
//! boundary points is never collapsed, non-manifold points are left alone and
//! no component may drop below [`DecimateOptions::min_component_faces`]. After
//! the run the number of connected components and boundary loops is measured
//! again; a difference is reported as [`MeshError::TopologyViolation`].
//!
//! # Example
//!
//! ```
//! use meshmend::algo::decimate::{decimate, DecimateOptions};
//! use meshmend::mesh::shapes::icosphere;
//!
//! let sphere = icosphere(2);
//! let reduced = decimate(&sphere, &DecimateOptions::with_reduction(0.5)).unwrap();
//! assert!(reduced.num_polygons() < sphere.num_polygons());
//! ```
//!
//! # References
//!
//! - Garland, M. & Heckbert, P. (1997). "Surface Simplification Using Quadric
//!   Error Metrics." SIGGRAPH '97.

mod qem;

use log::info;

use crate::error::{MeshError, Result};
use crate::mesh::topology::{boundary_loop_count, component_count};
use crate::mesh::{to_face_vertex, Mesh};

use super::Progress;

/// Options for mesh decimation.
#[derive(Debug, Clone)]
pub struct DecimateOptions {
    /// Fraction of triangles to remove, in `[0, 1)`.
    pub reduction: f64,

    /// Whether to preserve boundary edges (don't collapse them).
    pub preserve_boundary: bool,

    /// Maximum allowed error for a single edge collapse.
    /// Edges with error above this threshold won't be collapsed.
    pub max_error: Option<f64>,

    /// Smallest face count a connected component may be reduced to.
    pub min_component_faces: usize,
}

impl Default for DecimateOptions {
    fn default() -> Self {
        Self::with_reduction(0.05)
    }
}

impl DecimateOptions {
    /// Create options that remove the given fraction of triangles.
    pub fn with_reduction(reduction: f64) -> Self {
        Self {
            reduction,
            preserve_boundary: true,
            max_error: None,
            min_component_faces: 4,
        }
    }

    /// Set whether to preserve boundary edges.
    pub fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Set maximum error threshold for edge collapses.
    pub fn with_max_error(mut self, max_error: f64) -> Self {
        self.max_error = Some(max_error);
        self
    }

    /// Compute the target number of triangles given the original count.
    pub fn compute_target(&self, original_faces: usize) -> usize {
        ((original_faces as f64) * (1.0 - self.reduction)).round() as usize
    }

    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.reduction) {
            return Err(MeshError::invalid_param(
                "reduction",
                self.reduction,
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Decimate a mesh, preserving its topology.
///
/// The result is a triangle mesh with at most as many triangles as the
/// triangulated input. Polygons are triangulated first.
pub fn decimate(mesh: &Mesh, options: &DecimateOptions) -> Result<Mesh> {
    decimate_with_progress(mesh, options, &Progress::none())
}

/// Decimate a mesh with progress reporting.
pub fn decimate_with_progress(
    mesh: &Mesh,
    options: &DecimateOptions,
    progress: &Progress,
) -> Result<Mesh> {
    options.validate()?;
    if mesh.polygons.is_empty() {
        return Ok(mesh.clone());
    }

    let components_before = component_count(mesh);
    let loops_before = boundary_loop_count(mesh);

    let (points, faces) = to_face_vertex(mesh);
    let original = faces.len();
    let target = options.compute_target(original);

    let (points, faces) = if target < original {
        qem::decimate_triangles(points, faces, target, options, progress)
    } else {
        (points, faces)
    };

    let mut out = Mesh::from_triangles(points, &faces)?;
    out.lines = mesh.lines.clone();
    let out = out.compact();

    let components_after = component_count(&out);
    let loops_after = boundary_loop_count(&out);
    if components_before != components_after || loops_before != loops_after {
        return Err(MeshError::TopologyViolation {
            components_before,
            components_after,
            loops_before,
            loops_after,
        });
    }

    info!(
        "decimate: {} -> {} triangles (target {})",
        original,
        out.num_polygons(),
        target
    );
    Ok(out)
}
