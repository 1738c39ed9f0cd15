//! Mesh file I/O.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ | Polygons, lines and point normals |
//! | STL | `.stl` | ✓ | ✓ | Binary and ASCII read, binary write |
//! | PLY | `.ply` | ✓ | ✓ | Stanford polygon format, ASCII write |
//! | glTF | `.gltf`, `.glb` | ✓ | ✗ | Triangle primitives only |
//!
//! # Usage
//!
//! ```no_run
//! use meshmend::io::{load, save};
//!
//! let mesh = load("scan.obj").unwrap();
//! save(&mesh, "scan.ply").unwrap();
//! ```

pub mod gltf;
pub mod obj;
pub mod ply;
pub mod stl;

use std::path::Path;

use log::debug;

use crate::error::{MeshError, Result};
use crate::mesh::Mesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ format.
    Obj,
    /// STL (stereolithography) format.
    Stl,
    /// PLY (Stanford polygon) format.
    Ply,
    /// glTF format.
    Gltf,
    /// glTF binary format.
    Glb,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            "stl" => Some(Format::Stl),
            "ply" => Some(Format::Ply),
            "gltf" => Some(Format::Gltf),
            "glb" => Some(Format::Glb),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn format_of(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh, picking the format from the file extension.
///
/// Fails with [`MeshError::FileNotFound`] when `path` does not exist.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(MeshError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let format = format_of(path)?;

    let mesh = match format {
        Format::Obj => obj::load(path),
        Format::Stl => stl::load(path),
        Format::Ply => ply::load(path),
        Format::Gltf | Format::Glb => gltf::load(path),
    }?;
    debug!(
        "loaded {}: {} points, {} polygons, {} lines",
        path.display(),
        mesh.num_points(),
        mesh.num_polygons(),
        mesh.lines.len()
    );
    Ok(mesh)
}

/// Save a mesh, picking the format from the file extension.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match format_of(path)? {
        Format::Obj => obj::save(mesh, path),
        Format::Stl => stl::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
        Format::Gltf | Format::Glb => Err(MeshError::SaveError {
            path: path.to_path_buf(),
            message: "glTF saving is not supported".to_string(),
        }),
    }
}
