//! PLY (Stanford polygon) format support.
//!
//! Loading goes through `ply-rs` and accepts ASCII and binary files. A file
//! without a `face` element loads as a point cloud. Polygons are kept as
//! polygons. Saving writes ASCII.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{MeshError, Result};
use crate::mesh::Mesh;

/// Load a mesh from a PLY file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let error = |message: &str| MeshError::LoadError {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| error(&e.to_string()))?;

    let vertex_element = ply
        .payload
        .get("vertex")
        .ok_or_else(|| error("PLY file has no vertex element"))?;

    let mut points = Vec::with_capacity(vertex_element.len());
    for vertex in vertex_element {
        let x = get_float_property(vertex, "x").ok_or_else(|| error("vertex missing x"))?;
        let y = get_float_property(vertex, "y").ok_or_else(|| error("vertex missing y"))?;
        let z = get_float_property(vertex, "z").ok_or_else(|| error("vertex missing z"))?;
        points.push(Point3::new(x, y, z));
    }

    let mut polygons = Vec::new();
    if let Some(face_element) = ply.payload.get("face") {
        polygons.reserve(face_element.len());
        for face in face_element {
            let indices = get_list_property(face, "vertex_indices")
                .or_else(|| get_list_property(face, "vertex_index"))
                .ok_or_else(|| error("face missing vertex_indices property"))?;
            if indices.len() >= 3 {
                polygons.push(indices);
            }
        }
    }

    if points.is_empty() {
        return Err(error("PLY file contains no vertices"));
    }
    Mesh::from_polygons(points, polygons).map_err(|e| error(&e.to_string()))
}

fn get_float_property(element: &DefaultElement, name: &str) -> Option<f64> {
    match element.get(name)? {
        Property::Float(v) => Some(*v as f64),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(*v as f64),
        Property::UInt(v) => Some(*v as f64),
        Property::Short(v) => Some(*v as f64),
        Property::UShort(v) => Some(*v as f64),
        Property::Char(v) => Some(*v as f64),
        Property::UChar(v) => Some(*v as f64),
        _ => None,
    }
}

fn get_list_property(element: &DefaultElement, name: &str) -> Option<Vec<usize>> {
    match element.get(name)? {
        Property::ListInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUInt(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUShort(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&x| x as usize).collect()),
        _ => None,
    }
}

/// Save a mesh to an ASCII PLY file.
///
/// Point normals are written as `nx ny nz` when present. Line cells are not
/// representable and are dropped.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let normals = mesh
        .point_normals
        .as_ref()
        .filter(|n| n.len() == mesh.num_points());

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "comment Generated by meshmend")?;
    writeln!(writer, "element vertex {}", mesh.num_points())?;
    writeln!(writer, "property double x")?;
    writeln!(writer, "property double y")?;
    writeln!(writer, "property double z")?;
    if normals.is_some() {
        writeln!(writer, "property double nx")?;
        writeln!(writer, "property double ny")?;
        writeln!(writer, "property double nz")?;
    }
    writeln!(writer, "element face {}", mesh.num_polygons())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for (i, p) in mesh.points.iter().enumerate() {
        match normals {
            Some(n) => writeln!(
                writer,
                "{} {} {} {} {} {}",
                p.x, p.y, p.z, n[i].x, n[i].y, n[i].z
            )?,
            None => writeln!(writer, "{} {} {}", p.x, p.y, p.z)?,
        }
    }

    for polygon in &mesh.polygons {
        if polygon.len() > u8::MAX as usize {
            return Err(MeshError::SaveError {
                path: path.to_path_buf(),
                message: format!("polygon with {} points exceeds PLY list size", polygon.len()),
            });
        }
        write!(writer, "{}", polygon.len())?;
        for &v in polygon {
            write!(writer, " {}", v)?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::normals::compute_normals;
    use crate::mesh::shapes::unit_cube;

    #[test]
    fn test_round_trip_keeps_quads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.ply");
        let cube = compute_normals(&unit_cube());
        save(&cube, &path).unwrap();

        let back = load(&path).unwrap();
        assert_eq!(back.polygons, cube.polygons);
        assert_eq!(back.points, cube.points);
    }

    #[test]
    fn test_point_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.ply");
        let cloud = Mesh::from_points(vec![Point3::new(1.0, 2.0, 3.0), Point3::origin()]);
        save(&cloud, &path).unwrap();

        let back = load(&path).unwrap();
        assert_eq!(back.num_points(), 2);
        assert!(back.polygons.is_empty());
    }
}
