//! Carrying the input's boundary and feature edges into the output.
//!
//! Reconstruction replaces the input's cells, so open borders and sharp
//! creases of the input would be lost. The merger extracts them from a
//! cleaned copy of the input as line cells, maps them into the frame of the
//! reconstruction and appends them. Lines never change polygon topology, so
//! the reconstructed surface stays closed. Points used only by lines take the
//! normal of the nearest surface point.

use std::collections::HashSet;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use log::debug;
use nalgebra::Vector3;

use crate::mesh::topology::{boundary_edges, canonical_edge, feature_edges};
use crate::mesh::Mesh;

use super::clean::{clean, CleanOptions};
use super::normals::compute_normals;
use super::transform::ScaleTransform;

/// Options for [`merge_boundary`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Dihedral angle in degrees above which an edge is a feature.
    pub feature_angle: f64,
    /// Transform placing the original in the reconstruction's frame.
    pub alignment: Option<ScaleTransform>,
    /// Merge distance for the final clean.
    pub tolerance: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            feature_angle: 30.0,
            alignment: None,
            tolerance: 0.0,
        }
    }
}

impl MergeOptions {
    /// Set the alignment transform.
    pub fn with_alignment(mut self, alignment: ScaleTransform) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Set the feature angle.
    pub fn with_feature_angle(mut self, angle: f64) -> Self {
        self.feature_angle = angle;
        self
    }
}

/// Boundary and feature edges of `mesh` as a line-only mesh.
pub fn edge_patch(mesh: &Mesh, feature_angle: f64) -> Mesh {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    let boundary = boundary_edges(mesh);
    let features = feature_edges(mesh, feature_angle);
    for (a, b) in boundary.into_iter().chain(features) {
        if seen.insert(canonical_edge(a, b)) {
            lines.push([a, b]);
        }
    }
    Mesh {
        points: mesh.points.clone(),
        lines,
        scalars: mesh.scalars.clone(),
        ..Mesh::default()
    }
    .compact()
}

/// Append the boundary and feature edges of `original` to `reconstructed`.
pub fn merge_boundary(reconstructed: &Mesh, original: &Mesh, options: &MergeOptions) -> Mesh {
    let cleaned = clean(original, &CleanOptions::default());
    let mut patch = edge_patch(&cleaned, options.feature_angle);
    if let Some(alignment) = &options.alignment {
        patch.transform_points(|p| alignment.apply(p));
    }
    debug!(
        "merge_boundary: carrying {} edges from the input",
        patch.lines.len()
    );

    let mut merged = reconstructed.clone();
    merged.append(&patch);
    let merged = clean(
        &merged,
        &CleanOptions::default().with_tolerance(options.tolerance),
    );
    let mut merged = compute_normals(&merged);
    let borrowed = borrow_surface_normals(&mut merged);
    debug!("merge_boundary: {} line points took a surface normal", borrowed);
    merged
}

/// Copy the normal of the nearest polygon point onto every point that no
/// polygon uses. Returns the number of points updated.
fn borrow_surface_normals(mesh: &mut Mesh) -> usize {
    let Some(normals) = mesh.point_normals.as_mut() else {
        return 0;
    };
    let mut on_surface = vec![false; mesh.points.len()];
    for polygon in &mesh.polygons {
        for &v in polygon {
            on_surface[v] = true;
        }
    }
    let surface: Vec<usize> = (0..mesh.points.len())
        .filter(|&v| on_surface[v] && normals[v] != Vector3::zeros())
        .collect();
    if surface.is_empty() {
        return 0;
    }

    let coords: Vec<[f64; 3]> = surface
        .iter()
        .map(|&v| {
            let p = mesh.points[v];
            [p.x, p.y, p.z]
        })
        .collect();
    let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(&coords);

    let mut borrowed = 0;
    for (v, p) in mesh.points.iter().enumerate() {
        if on_surface[v] {
            continue;
        }
        let nearest = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]);
        normals[v] = normals[surface[nearest.item as usize]];
        borrowed += 1;
    }
    borrowed
}
