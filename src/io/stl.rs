//! STL (stereolithography) format support.
//!
//! STL stores three corners per triangle with no sharing. Loading welds
//! corners with bitwise-equal coordinates; anything looser is left to the
//! cleaner. Saving triangulates polygons and writes binary STL.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use nalgebra::Point3;

use crate::error::{MeshError, Result};
use crate::mesh::{area_vector, Mesh};

/// Load a mesh from a binary or ASCII STL file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let stl = stl_io::read_stl(&mut file).map_err(|e| MeshError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut welded: HashMap<[u32; 3], usize> = HashMap::new();
    let mut index_of = |v: &stl_io::Vertex| -> usize {
        let key = [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()];
        *welded.entry(key).or_insert_with(|| {
            points.push(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64));
            points.len() - 1
        })
    };

    let mut polygons = Vec::with_capacity(stl.faces.len());
    for tri in &stl.faces {
        let [a, b, c] = tri.vertices.map(|i| index_of(&stl.vertices[i]));
        if a != b && b != c && a != c {
            polygons.push(vec![a, b, c]);
        }
    }

    if polygons.is_empty() {
        return Err(MeshError::LoadError {
            path: path.to_path_buf(),
            message: "STL file contains no valid triangles".to_string(),
        });
    }
    Mesh::from_polygons(points, polygons)
}

/// Save a mesh to a binary STL file.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let triangulated = mesh.triangulate();
    let vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);

    let triangles: Vec<stl_io::Triangle> = triangulated
        .polygons
        .iter()
        .map(|f| {
            let n = area_vector(&triangulated.points, f)
                .try_normalize(0.0)
                .unwrap_or_default();
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [
                    vertex(&triangulated.points[f[0]]),
                    vertex(&triangulated.points[f[1]]),
                    vertex(&triangulated.points[f[2]]),
                ],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| MeshError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(())
}
