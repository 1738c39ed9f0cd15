//! Core mesh data structures.
//!
//! The primary type is [`Mesh`], an indexed polygon mesh: a list of points plus
//! polygon and line cells that reference them by position. This is the shape
//! every pipeline stage consumes and produces, and the shape of the
//! interchange formats in [`crate::io`].
//!
//! Connectivity (edge incidence, boundary loops, components) is derived on
//! demand by the functions in [`topology`].
//!
//! # Construction
//!
//! ```
//! use meshmend::mesh::{build_from_triangles, Mesh};
//! use nalgebra::Point3;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh: Mesh = build_from_triangles(&points, &faces).unwrap();
//! assert_eq!(mesh.num_points(), 3);
//! ```

mod builder;
mod polymesh;
pub mod shapes;
pub mod topology;

pub use builder::{
    build_from_quads, build_from_triangles, ear_clip, fan, to_face_vertex, triangulate_polygon,
};
pub use polymesh::{area_vector, Mesh};
