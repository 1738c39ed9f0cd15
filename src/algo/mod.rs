//! Mesh processing algorithms.
//!
//! Each stage of the repair pipeline lives in its own module and can be used
//! on its own:
//!
//! - **Cleaning**: point merging, degenerate cell removal ([`clean`])
//! - **Hole filling**: capping small boundary loops ([`fill_holes`])
//! - **Smoothing**: windowed-sinc low-pass filtering ([`smooth`])
//! - **Decimation**: topology-preserving quadric edge collapse ([`decimate`])
//! - **Deformation**: uniform scaling about a pivot ([`transform`])
//! - **Normals**: point and cell normals ([`normals`])
//! - **Outlier removal**: dropping small connected components ([`connectivity`])
//! - **Multi-scale blending**: coarse plus fine smoothing ([`multiscale`])
//! - **Reconstruction**: implicit surface from points ([`reconstruct`])
//! - **Boundary merging**: carrying input borders and creases ([`boundary_merge`])
//! - **Curvature**: discrete curvature for inspection ([`curvature`])

pub mod boundary_merge;
pub mod clean;
pub mod connectivity;
pub mod curvature;
pub mod decimate;
pub mod fill_holes;
pub mod multiscale;
pub mod normals;
mod progress;
pub mod reconstruct;
pub mod smooth;
pub mod transform;

pub use progress::Progress;
