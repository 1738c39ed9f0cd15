//! Zero-level extraction by marching tetrahedra.
//!
//! Every lattice cell is cut into six tetrahedra around its main diagonal
//! (corner 0 to corner 7). The split is the same in every cell, so the faces
//! of neighbouring tetrahedra match and crossing points are shared through a
//! cache keyed by lattice edge. With no sample exactly at zero the output is a
//! closed edge-manifold triangle mesh.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::mesh::area_vector;

/// The six tetrahedra of a cell, as cell corner numbers.
///
/// Corner `c` sits at offset `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

/// Regular sample lattice.
#[derive(Debug, Clone)]
pub(super) struct Lattice {
    pub(super) origin: Point3<f64>,
    pub(super) spacing: f64,
    /// Samples along each axis.
    pub(super) dims: [usize; 3],
}

impl Lattice {
    pub(super) fn len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    #[inline]
    fn coords(&self, index: usize) -> [usize; 3] {
        let i = index % self.dims[0];
        let j = (index / self.dims[0]) % self.dims[1];
        let k = index / (self.dims[0] * self.dims[1]);
        [i, j, k]
    }

    pub(super) fn position(&self, index: usize) -> Point3<f64> {
        let [i, j, k] = self.coords(index);
        self.origin + Vector3::new(i as f64, j as f64, k as f64) * self.spacing
    }

    fn on_border(&self, index: usize) -> bool {
        let c = self.coords(index);
        (0..3).any(|a| c[a] == 0 || c[a] + 1 == self.dims[a])
    }
}

/// Evaluate `field` at every lattice sample.
///
/// Samples closer to zero than `snap` are moved to `+snap`, and the outer
/// layer is forced positive so the extracted surface closes inside the
/// lattice.
pub(super) fn sample<F>(lattice: &Lattice, field: F, snap: f64, parallel: bool) -> Vec<f64>
where
    F: Fn(&Point3<f64>) -> f64 + Sync,
{
    let eval = |index: usize| -> f64 {
        if lattice.on_border(index) {
            return lattice.spacing.max(snap);
        }
        let value = field(&lattice.position(index));
        if value.is_nan() || value.abs() < snap {
            snap
        } else {
            value
        }
    };

    if parallel {
        (0..lattice.len()).into_par_iter().map(eval).collect()
    } else {
        (0..lattice.len()).map(eval).collect()
    }
}

/// Extract the triangles separating negative from positive samples.
///
/// Triangles face the positive side.
pub(super) fn extract(lattice: &Lattice, values: &[f64]) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut extractor = Extractor {
        lattice,
        values,
        points: Vec::new(),
        cache: HashMap::new(),
        triangles: Vec::new(),
    };

    let [nx, ny, nz] = lattice.dims;
    for k in 0..nz.saturating_sub(1) {
        for j in 0..ny.saturating_sub(1) {
            for i in 0..nx.saturating_sub(1) {
                let corners: [usize; 8] = std::array::from_fn(|c| {
                    lattice.index(i + (c & 1), j + ((c >> 1) & 1), k + ((c >> 2) & 1))
                });
                let inside = corners.iter().filter(|&&g| values[g] < 0.0).count();
                if inside == 0 || inside == 8 {
                    continue;
                }
                for tet in &TETRAHEDRA {
                    extractor.tetrahedron(tet.map(|c| corners[c]));
                }
            }
        }
    }

    (extractor.points, extractor.triangles)
}

struct Extractor<'a> {
    lattice: &'a Lattice,
    values: &'a [f64],
    points: Vec<Point3<f64>>,
    cache: HashMap<(usize, usize), usize>,
    triangles: Vec<[usize; 3]>,
}

impl Extractor<'_> {
    fn tetrahedron(&mut self, corners: [usize; 4]) {
        let (inside, outside): (Vec<usize>, Vec<usize>) =
            corners.iter().partition(|&&g| self.values[g] < 0.0);

        match (inside.as_slice(), outside.as_slice()) {
            ([a], [b, c, d]) | ([b, c, d], [a]) => {
                let ring = [self.crossing(*a, *b), self.crossing(*a, *c), self.crossing(*a, *d)];
                self.emit(&ring, &inside, &outside);
            }
            ([a, b], [c, d]) => {
                let ring = [
                    self.crossing(*a, *c),
                    self.crossing(*a, *d),
                    self.crossing(*b, *d),
                    self.crossing(*b, *c),
                ];
                self.emit(&ring, &inside, &outside);
            }
            _ => {}
        }
    }

    /// Add the ring as one triangle or a quad split in two, wound so its
    /// normal points from the inside corners to the outside corners.
    fn emit(&mut self, ring: &[usize], inside: &[usize], outside: &[usize]) {
        let mean = |ids: &[usize]| -> Vector3<f64> {
            ids.iter()
                .map(|&g| self.lattice.position(g).coords)
                .sum::<Vector3<f64>>()
                / ids.len() as f64
        };
        let direction = mean(outside) - mean(inside);
        let normal = area_vector(&self.points, ring);

        let mut ring = ring.to_vec();
        if normal.dot(&direction) < 0.0 {
            ring.reverse();
        }
        if ring.len() == 3 {
            self.triangles.push([ring[0], ring[1], ring[2]]);
        } else {
            self.triangles.push([ring[0], ring[1], ring[2]]);
            self.triangles.push([ring[0], ring[2], ring[3]]);
        }
    }

    /// Point where the field crosses zero on the lattice edge `(a, b)`.
    fn crossing(&mut self, a: usize, b: usize) -> usize {
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&id) = self.cache.get(&key) {
            return id;
        }
        let (fa, fb) = (self.values[key.0], self.values[key.1]);
        let t = fa / (fa - fb);
        let pa = self.lattice.position(key.0);
        let pb = self.lattice.position(key.1);
        self.points.push(pa + (pb - pa) * t);
        let id = self.points.len() - 1;
        self.cache.insert(key, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::topology::is_closed_manifold;
    use crate::mesh::Mesh;

    fn sphere_lattice() -> Lattice {
        Lattice {
            origin: Point3::new(-1.53, -1.53, -1.53),
            spacing: 0.2,
            dims: [17, 17, 17],
        }
    }

    #[test]
    fn test_index_round_trip() {
        let lattice = sphere_lattice();
        let idx = lattice.index(3, 5, 7);
        assert_eq!(lattice.coords(idx), [3, 5, 7]);
        let p = lattice.position(idx);
        assert!((p - Point3::new(-0.93, -0.53, -0.13)).norm() < 1e-12);
    }

    #[test]
    fn test_sphere_is_closed_and_outward() {
        let lattice = sphere_lattice();
        let values = sample(&lattice, |p| p.coords.norm() - 1.0, 1e-4, false);
        let (points, triangles) = extract(&lattice, &values);
        let mesh = Mesh::from_triangles(points, &triangles).unwrap();

        assert!(is_closed_manifold(&mesh));
        let volume = mesh.signed_volume();
        let exact = 4.0 / 3.0 * std::f64::consts::PI;
        assert!(volume > 0.0);
        assert!((volume - exact).abs() / exact < 0.1);
        for p in &mesh.points {
            assert!((p.coords.norm() - 1.0).abs() < 0.05);
        }
    }

    #[test]
    fn test_border_forced_outside() {
        let lattice = sphere_lattice();
        // Field negative everywhere still produces a closed box.
        let values = sample(&lattice, |_| -1.0, 1e-4, true);
        let (points, triangles) = extract(&lattice, &values);
        let mesh = Mesh::from_triangles(points, &triangles).unwrap();
        assert!(is_closed_manifold(&mesh));
        assert!(mesh.signed_volume() > 0.0);
    }
}
