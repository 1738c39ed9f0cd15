//! Connectivity-based outlier removal.
//!
//! Scanned meshes often carry small floating fragments. The denoiser splits
//! the mesh into connected components (polygons sharing at least one point)
//! and drops every component whose size, the number of distinct points it
//! references, is at most [`DenoiseOptions::area_threshold`]. Survivors are
//! re-extracted and cleaned.
//!
//! Raising the threshold can only drop more components, so the surviving
//! point count never grows with it.

use std::collections::HashSet;

use log::debug;

use crate::mesh::topology::components;
use crate::mesh::Mesh;

use super::clean::{clean, CleanOptions};

/// Options for [`denoise`].
#[derive(Debug, Clone)]
pub struct DenoiseOptions {
    /// Components with at most this many points are removed.
    pub area_threshold: f64,
}

impl Default for DenoiseOptions {
    fn default() -> Self {
        Self {
            area_threshold: 50.0,
        }
    }
}

impl DenoiseOptions {
    /// Create options with the given threshold.
    pub fn with_threshold(area_threshold: f64) -> Self {
        Self { area_threshold }
    }
}

/// Size of one connected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSummary {
    /// Distinct points referenced by the component.
    pub size: usize,
    /// Polygons in the component.
    pub polygons: usize,
}

/// Summaries of every connected component, ordered like
/// [`crate::mesh::topology::components`].
pub fn component_summaries(mesh: &Mesh) -> Vec<ComponentSummary> {
    components(mesh)
        .iter()
        .map(|group| summarize(mesh, group))
        .collect()
}

fn summarize(mesh: &Mesh, group: &[usize]) -> ComponentSummary {
    let points: HashSet<usize> = group
        .iter()
        .flat_map(|&p| mesh.polygons[p].iter().copied())
        .collect();
    ComponentSummary {
        size: points.len(),
        polygons: group.len(),
    }
}

/// Remove components with `size <= options.area_threshold`.
///
/// A mesh without polygons is a point cloud and is returned unchanged.
pub fn denoise(mesh: &Mesh, options: &DenoiseOptions) -> Mesh {
    if mesh.polygons.is_empty() {
        return mesh.clone();
    }

    let groups = components(mesh);
    let mut keep = vec![false; mesh.polygons.len()];
    let mut dropped = 0;
    for group in &groups {
        let summary = summarize(mesh, group);
        debug!(
            "denoise: component of {} points, {} polygons",
            summary.size, summary.polygons
        );
        if summary.size as f64 <= options.area_threshold {
            dropped += 1;
            continue;
        }
        for &p in group {
            keep[p] = true;
        }
    }

    let mut out = mesh.clone();
    let mut flags = keep.into_iter();
    out.polygons.retain(|_| flags.next().unwrap_or(false));
    out.lines.clear();
    out.invalidate_normals();

    debug!(
        "denoise: kept {} of {} components",
        groups.len() - dropped,
        groups.len()
    );
    clean(&out.compact(), &CleanOptions::default())
}
