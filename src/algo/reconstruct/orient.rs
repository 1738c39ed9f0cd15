//! Consistent polygon winding.

use std::collections::{HashMap, VecDeque};

use nalgebra::{Point3, Vector3};

use crate::mesh::topology::canonical_edge;
use crate::mesh::Mesh;

/// Make winding agree across manifold edges, then orient every component by
/// its nesting depth: a component enclosed by an even number of closed
/// components faces outward (positive volume), one enclosed by an odd number
/// faces inward so a cavity's wall faces into the cavity.
///
/// Returns the number of polygons whose winding changed.
pub fn orient_consistently(mesh: &mut Mesh) -> usize {
    let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (fi, polygon) in mesh.polygons.iter().enumerate() {
        for i in 0..polygon.len() {
            let e = canonical_edge(polygon[i], polygon[(i + 1) % polygon.len()]);
            edge_faces.entry(e).or_default().push(fi);
        }
    }

    let n = mesh.polygons.len();
    let mut component = vec![usize::MAX; n];
    let mut flipped = vec![false; n];
    let mut volumes: Vec<f64> = Vec::new();
    let mut closed: Vec<bool> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let id = volumes.len();
        volumes.push(0.0);
        closed.push(true);
        members.push(Vec::new());
        component[start] = id;
        let mut queue = VecDeque::from([start]);

        while let Some(f) = queue.pop_front() {
            members[id].push(f);
            let polygon = mesh.polygons[f].clone();
            for i in 0..polygon.len() {
                let (a, b) = (polygon[i], polygon[(i + 1) % polygon.len()]);
                let Some(faces) = edge_faces.get(&canonical_edge(a, b)) else {
                    continue;
                };
                if faces.len() != 2 {
                    closed[id] = false;
                    continue;
                }
                let g = if faces[0] == f { faces[1] } else { faces[0] };
                if component[g] != usize::MAX {
                    continue;
                }
                component[g] = id;
                // A consistent neighbour traverses the shared edge as b -> a.
                if traverses(&mesh.polygons[g], a, b) {
                    mesh.polygons[g].reverse();
                    flipped[g] = !flipped[g];
                }
                queue.push_back(g);
            }
        }
    }

    for (fi, polygon) in mesh.polygons.iter().enumerate() {
        volumes[component[fi]] += polygon_volume(mesh, polygon);
    }

    let depths = nesting_depths(mesh, &members, &closed);
    for (fi, polygon) in mesh.polygons.iter_mut().enumerate() {
        let c = component[fi];
        let wrong = if depths[c] % 2 == 0 {
            volumes[c] < 0.0
        } else {
            volumes[c] > 0.0
        };
        if wrong {
            polygon.reverse();
            flipped[fi] = !flipped[fi];
        }
    }

    let changed = flipped.iter().filter(|&&f| f).count();
    if changed > 0 {
        mesh.invalidate_normals();
    }
    changed
}

/// For every component, the number of other closed components enclosing it.
fn nesting_depths(mesh: &Mesh, members: &[Vec<usize>], closed: &[bool]) -> Vec<usize> {
    let shells: Vec<usize> = (0..members.len()).filter(|&c| closed[c]).collect();
    if members.len() < 2 || shells.is_empty() {
        return vec![0; members.len()];
    }
    let boxes: Vec<Option<(Point3<f64>, Point3<f64>)>> = members
        .iter()
        .map(|faces| component_box(mesh, faces))
        .collect();

    (0..members.len())
        .map(|c| {
            let Some(&q) = members[c]
                .first()
                .and_then(|&f| mesh.polygons[f].first())
            else {
                return 0;
            };
            shells
                .iter()
                .filter(|&&k| k != c && encloses(mesh, &members[k], boxes[k], q))
                .count()
        })
        .collect()
}

fn component_box(mesh: &Mesh, faces: &[usize]) -> Option<(Point3<f64>, Point3<f64>)> {
    let mut points = faces
        .iter()
        .flat_map(|&f| mesh.polygons[f].iter())
        .map(|&v| mesh.points[v]);
    let first = points.next()?;
    Some(points.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p))))
}

/// Whether point `q` lies inside the closed shell made of `faces`, by the
/// parity of crossings along a fixed ray. A shell touching `q` does not
/// enclose it.
fn encloses(
    mesh: &Mesh,
    faces: &[usize],
    bounds: Option<(Point3<f64>, Point3<f64>)>,
    q: usize,
) -> bool {
    let origin = mesh.points[q];
    match bounds {
        Some((lo, hi)) if (0..3).all(|a| origin[a] > lo[a] && origin[a] < hi[a]) => {}
        _ => return false,
    }

    // Skewed so the ray rarely grazes an edge of an axis-aligned mesh.
    let direction = Vector3::new(0.8017, 0.4461, 0.3975);
    let mut crossings = 0usize;
    for &f in faces {
        let polygon = &mesh.polygons[f];
        if polygon.contains(&q) {
            return false;
        }
        for i in 1..polygon.len().saturating_sub(1) {
            let triangle = [
                mesh.points[polygon[0]],
                mesh.points[polygon[i]],
                mesh.points[polygon[i + 1]],
            ];
            if ray_hits(&origin, &direction, &triangle) {
                crossings += 1;
            }
        }
    }
    crossings % 2 == 1
}

/// Möller-Trumbore ray/triangle test, counting hits in front of the origin.
fn ray_hits(origin: &Point3<f64>, direction: &Vector3<f64>, [a, b, c]: &[Point3<f64>; 3]) -> bool {
    let e1 = b - a;
    let e2 = c - a;
    let p = direction.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < 1e-300 {
        return false;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(&e1);
    let v = direction.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    e2.dot(&q) * inv > 0.0
}

fn traverses(polygon: &[usize], a: usize, b: usize) -> bool {
    (0..polygon.len()).any(|i| polygon[i] == a && polygon[(i + 1) % polygon.len()] == b)
}

fn polygon_volume(mesh: &Mesh, polygon: &[usize]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let p0 = mesh.points[polygon[0]].coords;
    (1..polygon.len() - 1)
        .map(|i| {
            let p1 = mesh.points[polygon[i]].coords;
            let p2 = mesh.points[polygon[i + 1]].coords;
            p0.dot(&p1.cross(&p2)) / 6.0
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{icosphere, subdivided_cube};

    #[test]
    fn test_scrambled_sphere_is_repaired() {
        let mut sphere = icosphere(1);
        for (i, polygon) in sphere.polygons.iter_mut().enumerate() {
            if i % 3 == 0 {
                polygon.reverse();
            }
        }
        let changed = orient_consistently(&mut sphere);
        assert!(changed > 0);
        assert!(sphere.signed_volume() > 0.0);
        assert_eq!(sphere.polygons.len(), 80);
        for (i, polygon) in sphere.polygons.iter().enumerate() {
            let n = sphere.polygon_normal(i).unwrap();
            let c = sphere.points[polygon[0]].coords;
            assert!(n.dot(&c) > 0.0);
        }
    }

    #[test]
    fn test_inside_out_cube_flipped() {
        let mut cube = subdivided_cube(2);
        cube.flip_orientation();
        assert!(cube.signed_volume() < 0.0);
        assert_eq!(orient_consistently(&mut cube), cube.polygons.len());
        assert!((cube.signed_volume() - 1.0).abs() < 1e-9);
    }

    fn shell_volume(mesh: &Mesh, polygons: std::ops::Range<usize>) -> f64 {
        mesh.polygons[polygons]
            .iter()
            .map(|p| polygon_volume(mesh, p))
            .sum()
    }

    #[test]
    fn test_cavity_faces_inward() {
        let mut hollow = icosphere(2);
        let mut cavity = icosphere(1);
        cavity.transform_points(|p| Point3::from(p.coords * 0.5));
        hollow.append(&cavity);
        let outer = 0..320;
        let inner = 320..400;
        assert_eq!(hollow.polygons.len(), inner.end);

        assert_eq!(orient_consistently(&mut hollow), 80);
        assert!(shell_volume(&hollow, outer.clone()) > 0.0);
        assert!(shell_volume(&hollow, inner.clone()) < 0.0);

        // Starting inside out, both shells end up the same way.
        hollow.flip_orientation();
        assert_eq!(orient_consistently(&mut hollow), 400);
        assert!(shell_volume(&hollow, outer) > 0.0);
        assert!(shell_volume(&hollow, inner) < 0.0);
    }

    #[test]
    fn test_separate_shells_face_outward() {
        let mut pair = icosphere(1);
        let mut other = icosphere(1);
        other.transform_points(|p| p + Vector3::new(3.0, 0.0, 0.0));
        other.flip_orientation();
        pair.append(&other);
        assert_eq!(orient_consistently(&mut pair), 80);
        assert!(shell_volume(&pair, 0..80) > 0.0);
        assert!(shell_volume(&pair, 80..160) > 0.0);
    }

    #[test]
    fn test_consistent_mesh_unchanged() {
        let mut cube = subdivided_cube(2);
        let before = cube.clone();
        assert_eq!(orient_consistently(&mut cube), 0);
        assert_eq!(cube, before);
    }
}
