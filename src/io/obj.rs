//! Wavefront OBJ format support.
//!
//! Reads `v`, `f` and `l` records. Face and line entries may use the
//! `v/vt/vn` forms and negative (relative) indices; only the position index is
//! used. Texture coordinates, groups and materials are skipped. The writer
//! emits `v`, `vn` when point normals are present, `f` and `l`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::Mesh;

/// Load a mesh from an OBJ file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let fail = |line: usize, message: String| MeshError::LoadError {
        path: path.to_path_buf(),
        message: format!("line {}: {}", line, message),
    };

    let mut mesh = Mesh::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let number = number + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let mut coords = [0.0; 3];
                for c in &mut coords {
                    let token = tokens
                        .next()
                        .ok_or_else(|| fail(number, "vertex needs three coordinates".into()))?;
                    *c = token
                        .parse::<f64>()
                        .map_err(|e| fail(number, format!("bad coordinate {:?}: {}", token, e)))?;
                }
                mesh.points.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let polygon = tokens
                    .map(|t| resolve(t, mesh.points.len()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| fail(number, "bad face index".into()))?;
                if polygon.len() < 3 {
                    return Err(fail(number, "face needs at least three points".into()));
                }
                mesh.polygons.push(polygon);
            }
            Some("l") => {
                let chain = tokens
                    .map(|t| resolve(t, mesh.points.len()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| fail(number, "bad line index".into()))?;
                mesh.lines.extend(chain.windows(2).map(|w| [w[0], w[1]]));
            }
            _ => {}
        }
    }

    mesh.validate().map_err(|e| MeshError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if mesh.is_empty() {
        return Err(MeshError::LoadError {
            path: path.to_path_buf(),
            message: "OBJ file contains no vertices".to_string(),
        });
    }
    Ok(mesh)
}

/// Resolve a 1-based or negative OBJ index against `count` points so far.
fn resolve(token: &str, count: usize) -> Option<usize> {
    let index: i64 = token.split('/').next()?.parse().ok()?;
    match index {
        0 => None,
        i if i > 0 => Some(i as usize - 1),
        i => count.checked_sub(i.unsigned_abs() as usize),
    }
}

/// Save a mesh to an OBJ file.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# meshmend")?;
    writeln!(
        writer,
        "# {} points, {} polygons, {} lines",
        mesh.num_points(),
        mesh.num_polygons(),
        mesh.lines.len()
    )?;
    for p in &mesh.points {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }

    let normals: Option<&Vec<Vector3<f64>>> = mesh
        .point_normals
        .as_ref()
        .filter(|n| n.len() == mesh.num_points());
    if let Some(normals) = normals {
        for n in normals {
            writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
        }
    }

    for polygon in &mesh.polygons {
        write!(writer, "f")?;
        for &v in polygon {
            if normals.is_some() {
                write!(writer, " {}//{}", v + 1, v + 1)?;
            } else {
                write!(writer, " {}", v + 1)?;
            }
        }
        writeln!(writer)?;
    }
    for line in &mesh.lines {
        writeln!(writer, "l {} {}", line[0] + 1, line[1] + 1)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::normals::compute_normals;
    use crate::mesh::shapes::{open_cube, unit_cube};

    fn write_temp(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.obj");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_resolve_indices() {
        assert_eq!(resolve("1", 4), Some(0));
        assert_eq!(resolve("3/7/2", 4), Some(2));
        assert_eq!(resolve("2//5", 4), Some(1));
        assert_eq!(resolve("-1", 4), Some(3));
        assert_eq!(resolve("-4", 4), Some(0));
        assert_eq!(resolve("-5", 4), None);
        assert_eq!(resolve("0", 4), None);
        assert_eq!(resolve("x", 4), None);
    }

    #[test]
    fn test_load_mixed_records() {
        let (_dir, path) = write_temp(
            "# quad and a polyline\n\
             v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvn 0 0 1\n\
             g patch\n\
             f 1/1/1 2/1/1 3/1/1 -1/1/1\n\
             l 1 3 2\n",
        );
        let mesh = load(&path).unwrap();
        assert_eq!(mesh.num_points(), 4);
        assert_eq!(mesh.polygons, vec![vec![0, 1, 2, 3]]);
        assert_eq!(mesh.lines, vec![[0, 2], [2, 1]]);
        assert!(mesh.point_normals.is_none());
    }

    #[test]
    fn test_load_rejects_dangling_index() {
        let (_dir, path) = write_temp("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n");
        assert!(matches!(load(&path), Err(MeshError::LoadError { .. })));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.obj");
        let mut cube = compute_normals(&open_cube(2));
        cube.lines.push([0, 1]);
        save(&cube, &path).unwrap();

        let back = load(&path).unwrap();
        assert_eq!(back.polygons, cube.polygons);
        assert_eq!(back.lines, cube.lines);
        for (a, b) in back.points.iter().zip(&cube.points) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_save_without_normals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.obj");
        save(&unit_cube(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("vn "));
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 8);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 6);
    }
}
