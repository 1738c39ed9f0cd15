//! glTF format support.
//!
//! Loads every triangle primitive of every mesh in a `.gltf` or `.glb` file
//! into one [`Mesh`]. Node transforms are not applied. Saving is not
//! supported.

use std::path::Path;

use ::gltf::mesh::Mode;
use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::Mesh;

/// Load a mesh from a glTF or GLB file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();

    let (document, buffers, _images) = ::gltf::import(path).map_err(|e| MeshError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut polygons: Vec<Vec<usize>> = Vec::new();

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b[..]));

            let offset = points.len();
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            points.extend(positions.map(|p| Point3::new(p[0] as f64, p[1] as f64, p[2] as f64)));
            let count = points.len() - offset;

            let indices: Vec<usize> = match reader.read_indices() {
                Some(indices) => indices.into_u32().map(|i| i as usize + offset).collect(),
                None => (offset..offset + count).collect(),
            };
            triangles_for(primitive.mode(), &indices, &mut polygons);
        }
    }

    if polygons.is_empty() {
        return Err(MeshError::LoadError {
            path: path.to_path_buf(),
            message: "glTF file contains no triangle primitives".to_string(),
        });
    }
    Mesh::from_polygons(points, polygons)
}

/// Expand a primitive's index list into triangles.
fn triangles_for(mode: Mode, indices: &[usize], out: &mut Vec<Vec<usize>>) {
    match mode {
        Mode::Triangles => {
            out.extend(indices.chunks_exact(3).map(|c| c.to_vec()));
        }
        Mode::TriangleStrip => {
            for i in 0..indices.len().saturating_sub(2) {
                if i % 2 == 0 {
                    out.push(vec![indices[i], indices[i + 1], indices[i + 2]]);
                } else {
                    out.push(vec![indices[i], indices[i + 2], indices[i + 1]]);
                }
            }
        }
        Mode::TriangleFan => {
            for i in 1..indices.len().saturating_sub(1) {
                out.push(vec![indices[0], indices[i], indices[i + 1]]);
            }
        }
        // Points and lines carry no surface.
        _ => {}
    }
}
