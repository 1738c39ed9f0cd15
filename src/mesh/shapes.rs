//! Procedural meshes for tests, benchmarks and demos.

use std::collections::HashMap;

use nalgebra::Point3;

use super::polymesh::Mesh;

/// Axis-aligned unit cube centred at the origin, six outward-wound quads.
pub fn unit_cube() -> Mesh {
    let points = vec![
        Point3::new(-0.5, -0.5, -0.5),
        Point3::new(0.5, -0.5, -0.5),
        Point3::new(0.5, 0.5, -0.5),
        Point3::new(-0.5, 0.5, -0.5),
        Point3::new(-0.5, -0.5, 0.5),
        Point3::new(0.5, -0.5, 0.5),
        Point3::new(0.5, 0.5, 0.5),
        Point3::new(-0.5, 0.5, 0.5),
    ];
    let polygons = vec![
        vec![0, 3, 2, 1], // -z
        vec![4, 5, 6, 7], // +z
        vec![0, 1, 5, 4], // -y
        vec![2, 3, 7, 6], // +y
        vec![0, 4, 7, 3], // -x
        vec![1, 2, 6, 5], // +x
    ];
    Mesh {
        points,
        polygons,
        ..Mesh::default()
    }
}

/// Unit cube centred at the origin with every side split into an `n` x `n`
/// grid of triangle pairs. Points along shared cube edges are welded.
pub fn subdivided_cube(n: usize) -> Mesh {
    let n = n.max(1);
    let mut index: HashMap<[usize; 3], usize> = HashMap::new();
    let mut points = Vec::new();
    let mut polygons = Vec::new();

    let mut point_at = |lattice: [usize; 3], points: &mut Vec<Point3<f64>>| -> usize {
        *index.entry(lattice).or_insert_with(|| {
            points.push(Point3::new(
                lattice[0] as f64 / n as f64 - 0.5,
                lattice[1] as f64 / n as f64 - 0.5,
                lattice[2] as f64 / n as f64 - 0.5,
            ));
            points.len() - 1
        })
    };

    for axis in 0..3 {
        for &positive in &[false, true] {
            // (u, v, axis) is a right-handed frame, so u x v points along +axis.
            let (u, v) = if positive {
                ((axis + 1) % 3, (axis + 2) % 3)
            } else {
                ((axis + 2) % 3, (axis + 1) % 3)
            };
            let level = if positive { n } else { 0 };

            for j in 0..n {
                for i in 0..n {
                    let mut corner = |di: usize, dj: usize| {
                        let mut lattice = [0; 3];
                        lattice[axis] = level;
                        lattice[u] = i + di;
                        lattice[v] = j + dj;
                        point_at(lattice, &mut points)
                    };
                    let c00 = corner(0, 0);
                    let c10 = corner(1, 0);
                    let c11 = corner(1, 1);
                    let c01 = corner(0, 1);
                    polygons.push(vec![c00, c10, c11]);
                    polygons.push(vec![c00, c11, c01]);
                }
            }
        }
    }

    Mesh {
        points,
        polygons,
        ..Mesh::default()
    }
}

/// [`subdivided_cube`] with the `+z` side removed, leaving one square hole.
pub fn open_cube(n: usize) -> Mesh {
    let mut cube = subdivided_cube(n);
    let top: Vec<bool> = cube
        .polygons
        .iter()
        .map(|p| p.iter().all(|&v| (cube.points[v].z - 0.5).abs() < 1e-12))
        .collect();
    let mut keep = top.iter().map(|&t| !t);
    cube.polygons.retain(|_| keep.next().unwrap_or(true));
    cube.compact()
}

/// Planar `n` x `n` triangle grid in the XY plane, facing `+z`.
pub fn grid(n: usize) -> Mesh {
    let mut points = Vec::with_capacity((n + 1) * (n + 1));
    let mut polygons = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            points.push(Point3::new(i as f64, j as f64, 0.0));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            polygons.push(vec![v00, v10, v11]);
            polygons.push(vec![v00, v11, v01]);
        }
    }

    Mesh {
        points,
        polygons,
        ..Mesh::default()
    }
}

/// Unit-radius icosphere with outward triangles.
pub fn icosphere(subdivisions: usize) -> Mesh {
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let mut points: Vec<Point3<f64>> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .iter()
    .map(|c| Point3::from(nalgebra::Vector3::new(c[0], c[1], c[2]).normalize()))
    .collect();

    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut midpoint = |a: usize, b: usize, points: &mut Vec<Point3<f64>>| -> usize {
            let key = if a < b { (a, b) } else { (b, a) };
            *midpoints.entry(key).or_insert_with(|| {
                let m = (points[a].coords + points[b].coords).normalize();
                points.push(Point3::from(m));
                points.len() - 1
            })
        };

        let mut next = Vec::with_capacity(faces.len() * 4);
        for &[a, b, c] in &faces {
            let ab = midpoint(a, b, &mut points);
            let bc = midpoint(b, c, &mut points);
            let ca = midpoint(c, a, &mut points);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    Mesh {
        points,
        polygons: faces.iter().map(|f| f.to_vec()).collect(),
        ..Mesh::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::topology::{boundary_loop_count, is_closed_manifold};

    #[test]
    fn test_subdivided_cube_is_closed_and_outward() {
        let cube = subdivided_cube(4);
        assert_eq!(cube.num_points(), 6 * 16 + 2);
        assert_eq!(cube.num_polygons(), 6 * 32);
        assert!(is_closed_manifold(&cube));
        assert!((cube.signed_volume() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_open_cube_has_one_hole() {
        let mesh = open_cube(4);
        assert_eq!(mesh.num_polygons(), 5 * 32);
        assert_eq!(boundary_loop_count(&mesh), 1);
    }

    #[test]
    fn test_icosphere_outward() {
        let sphere = icosphere(1);
        assert_eq!(sphere.num_polygons(), 80);
        assert!(is_closed_manifold(&sphere));
        assert!(sphere.signed_volume() > 0.0);
    }

    #[test]
    fn test_grid_faces_up() {
        let g = grid(3);
        for i in 0..g.num_polygons() {
            assert!(g.polygon_normal(i).unwrap().z > 0.99);
        }
    }
}
