//! # meshmend
//!
//! A mesh repair pipeline for noisy scans and broken models.
//!
//! meshmend works on a simple indexed [`Mesh`](mesh::Mesh): points, polygon
//! and line cells, plus optional normals and scalars. Every algorithm is a
//! pure function from a mesh and an options struct to a new mesh, so stages
//! can be used one at a time or chained by [`repair`].
//!
//! ## Features
//!
//! - **Cleaning and hole filling**: merge coincident points, drop degenerate
//!   cells, cap small boundary loops
//! - **Smoothing**: windowed-sinc low-pass filtering with feature edges held
//! - **Decimation**: quadric edge collapse that never changes topology
//! - **Outlier removal**: drop small connected components
//! - **Reconstruction**: closed implicit surfaces from unorganised points
//! - **File formats**: OBJ, STL, PLY, glTF
//!
//! ## Quick Start
//!
//! ```no_run
//! use meshmend::prelude::*;
//!
//! let scan = meshmend::io::load("scan.obj").unwrap();
//! let repaired = repair(&scan, &RepairConfig::default()).unwrap();
//! meshmend::io::save(&repaired, "repaired.obj").unwrap();
//! ```
//!
//! ## Running Single Stages
//!
//! ```
//! use meshmend::prelude::*;
//! use meshmend::algo::clean::{clean, CleanOptions};
//! use meshmend::algo::fill_holes::{fill_holes, FillHolesOptions};
//! use meshmend::mesh::shapes::open_cube;
//! use meshmend::mesh::topology::boundary_loop_count;
//!
//! let open = open_cube(4);
//! assert_eq!(boundary_loop_count(&open), 1);
//!
//! let cleaned = clean(&open, &CleanOptions::default());
//! let closed = fill_holes(&cleaned, &FillHolesOptions::default());
//! assert_eq!(boundary_loop_count(&closed), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod mesh;
pub mod pipeline;

/// Prelude module for convenient imports.
///
/// ```
/// use meshmend::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::Progress;
    pub use crate::error::{MeshError, PipelineError, Result};
    pub use crate::mesh::Mesh;
    pub use crate::pipeline::{repair, repair_with_progress, PipelineState, RepairConfig, Stage};
}

pub use pipeline::{repair, RepairConfig};

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::mesh::topology::is_closed_manifold;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];

        let faces = [
            [0, 2, 1], // bottom
            [0, 1, 3], // front
            [1, 2, 3], // right
            [2, 0, 3], // left
        ];

        let mesh = Mesh::from_triangles(points, &faces).unwrap();

        assert_eq!(mesh.num_points(), 4);
        assert_eq!(mesh.num_polygons(), 4);
        assert!(is_closed_manifold(&mesh));
        assert!(mesh.signed_volume() > 0.0);
    }
}
