//! Two-band smoothing blend.
//!
//! Runs the windowed-sinc smoother twice, once with a low pass band (coarse
//! shape) and once with a high pass band (fine detail), then appends both
//! results into one mesh and cleans it. Detail that survives either pass is
//! kept.
//!
//! This is an approximation of multi-resolution filtering, not a frequency
//! decomposition: the two copies are concatenated, so point density roughly
//! doubles wherever the passes disagree.

use log::debug;

use crate::mesh::Mesh;

use super::clean::{clean, CleanOptions};
use super::smooth::{smooth_or_passthrough, SmoothOptions};

/// Options for [`multiscale`].
#[derive(Debug, Clone)]
pub struct MultiScaleOptions {
    /// Smoothing for the coarse copy.
    pub coarse: SmoothOptions,
    /// Smoothing for the fine copy.
    pub fine: SmoothOptions,
}

impl Default for MultiScaleOptions {
    fn default() -> Self {
        Self::from_base(&SmoothOptions::default())
    }
}

impl MultiScaleOptions {
    /// Derive both bands from a base smoothing configuration.
    pub fn from_base(base: &SmoothOptions) -> Self {
        Self {
            coarse: base.clone().with_pass_band(0.1),
            fine: base.clone().with_pass_band(1.0),
        }
    }
}

/// Blend a coarse and a fine smoothing of `mesh`.
pub fn multiscale(mesh: &Mesh, options: &MultiScaleOptions) -> Mesh {
    let coarse = smooth_or_passthrough(mesh, &options.coarse);
    let fine = smooth_or_passthrough(mesh, &options.fine);

    let mut blended = coarse;
    blended.append(&fine);
    let out = clean(&blended, &CleanOptions::default());
    debug!(
        "multiscale: {} points in, {} points out",
        mesh.num_points(),
        out.num_points()
    );
    out
}
