//! Quadric Error Metrics (QEM) edge collapse.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::algo::Progress;
use crate::mesh::topology::{canonical_edge, UnionFind};

use super::DecimateOptions;

/// Minimum cosine between a triangle's normal before and after a collapse.
const FOLD_OVER_COS: f64 = 0.2;

/// A quadric error matrix (4x4 symmetric matrix).
///
/// Represents the sum of squared distances to a set of planes.
/// Stored as 10 unique elements since the matrix is symmetric.
#[derive(Debug, Clone, Copy)]
struct Quadric {
    /// Upper triangular elements: [a, b, c, d, e, f, g, h, i, j]
    /// Matrix form:
    /// | a b c d |
    /// | b e f g |
    /// | c f h i |
    /// | d g i j |
    data: [f64; 10],
}

impl Quadric {
    fn zero() -> Self {
        Self { data: [0.0; 10] }
    }

    /// Quadric of the plane ax + by + cz + d = 0 with a unit normal.
    fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            data: [
                a * a,
                a * b,
                a * c,
                a * d,
                b * b,
                b * c,
                b * d,
                c * c,
                c * d,
                d * d,
            ],
        }
    }

    fn add_assign(&mut self, other: &Quadric) {
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
    }

    /// v^T * Q * v where v = [x, y, z, 1].
    fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let (x, y, z) = (p.x, p.y, p.z);
        let q = &self.data;
        q[0] * x * x
            + 2.0 * q[1] * x * y
            + 2.0 * q[2] * x * z
            + 2.0 * q[3] * x
            + q[4] * y * y
            + 2.0 * q[5] * y * z
            + 2.0 * q[6] * y
            + q[7] * z * z
            + 2.0 * q[8] * z
            + q[9]
    }

    /// Point minimising the error, or `None` if the system is singular.
    fn optimal_point(&self) -> Option<Point3<f64>> {
        let q = &self.data;
        #[rustfmt::skip]
        let m = Matrix4::new(
            q[0], q[1], q[2], q[3],
            q[1], q[4], q[5], q[6],
            q[2], q[5], q[7], q[8],
            0.0,  0.0,  0.0,  1.0,
        );
        let inv = m.try_inverse()?;
        let v = inv * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let p = Point3::new(v.x, v.y, v.z);
        p.iter().all(|c| c.is_finite()).then_some(p)
    }
}

impl std::ops::Add for Quadric {
    type Output = Quadric;

    fn add(self, other: Quadric) -> Quadric {
        let mut result = self;
        result.add_assign(&other);
        result
    }
}

/// An edge candidate for collapse.
#[derive(Debug, Clone)]
struct EdgeCandidate {
    /// Point that survives the collapse.
    keep: usize,
    /// Point that is merged into `keep`.
    remove: usize,
    /// Position of `keep` after the collapse.
    target: Point3<f64>,
    /// Error cost of this collapse.
    error: f64,
    /// Versions of `keep` and `remove` when the candidate was created.
    versions: (usize, usize),
}

impl PartialEq for EdgeCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeCandidate {}

impl PartialOrd for EdgeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; equal errors pop lowest edge first.
        other
            .error
            .total_cmp(&self.error)
            .then_with(|| (other.keep, other.remove).cmp(&(self.keep, self.remove)))
            .then_with(|| other.versions.cmp(&self.versions))
    }
}

/// Working state for one decimation run.
struct Collapser<'a> {
    points: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    point_alive: Vec<bool>,
    point_faces: Vec<Vec<usize>>,
    quadrics: Vec<Quadric>,
    versions: Vec<usize>,
    face_component: Vec<usize>,
    component_faces: Vec<usize>,
    options: &'a DecimateOptions,
}

/// Decimate a triangle list down to `target` triangles.
pub(super) fn decimate_triangles(
    points: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
    target: usize,
    options: &DecimateOptions,
    progress: &Progress,
) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut state = Collapser::new(points, faces, options);
    let original = state.faces.len();
    let mut alive = original;

    let mut heap: BinaryHeap<EdgeCandidate> = BinaryHeap::new();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for face in &state.faces {
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            if seen.insert(canonical_edge(a, b)) {
                if let Some(c) = state.candidate(a, b) {
                    heap.push(c);
                }
            }
        }
    }

    while alive > target {
        let Some(candidate) = heap.pop() else {
            break;
        };

        if !state.is_current(&candidate) {
            continue;
        }

        if let Some(max_err) = options.max_error {
            if candidate.error > max_err {
                break;
            }
        }

        if !state.is_collapse_valid(&candidate) {
            continue;
        }

        alive -= state.collapse(&candidate);
        progress.report(original - alive, original - target, "decimating");

        let keep = candidate.keep;
        for neighbor in state.neighbors(keep) {
            if let Some(c) = state.candidate(keep, neighbor) {
                heap.push(c);
            }
        }
    }

    state.compact()
}

impl<'a> Collapser<'a> {
    fn new(points: Vec<Point3<f64>>, faces: Vec<[usize; 3]>, options: &'a DecimateOptions) -> Self {
        let n = points.len();
        let mut point_faces = vec![Vec::new(); n];
        for (fi, face) in faces.iter().enumerate() {
            for &v in face {
                point_faces[v].push(fi);
            }
        }

        let mut uf = UnionFind::new(n);
        for face in &faces {
            uf.union(face[0], face[1]);
            uf.union(face[1], face[2]);
        }
        let face_component: Vec<usize> = faces.iter().map(|f| uf.find(f[0])).collect();
        let mut component_faces = vec![0; n];
        for &c in &face_component {
            component_faces[c] += 1;
        }

        let quadrics = compute_vertex_quadrics(&points, &faces);

        Self {
            face_alive: vec![true; faces.len()],
            point_alive: vec![true; n],
            versions: vec![0; n],
            points,
            faces,
            point_faces,
            quadrics,
            face_component,
            component_faces,
            options,
        }
    }

    fn alive_faces(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.point_faces[v]
            .iter()
            .copied()
            .filter(move |&f| self.face_alive[f])
    }

    fn neighbors(&self, v: usize) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for f in self.alive_faces(v) {
            for &u in &self.faces[f] {
                if u != v {
                    out.insert(u);
                }
            }
        }
        out
    }

    /// Alive faces containing both `a` and `b`.
    fn shared_faces(&self, a: usize, b: usize) -> Vec<usize> {
        self.alive_faces(a)
            .filter(|&f| self.faces[f].contains(&b))
            .collect()
    }

    fn is_boundary_edge(&self, a: usize, b: usize) -> bool {
        self.shared_faces(a, b).len() == 1
    }

    fn is_boundary_point(&self, v: usize) -> bool {
        self.neighbors(v)
            .into_iter()
            .any(|n| self.is_boundary_edge(v, n))
    }

    /// A point whose faces form a single disk or half-disk fan.
    fn is_manifold_point(&self, v: usize) -> bool {
        let faces = self.alive_faces(v).count();
        let mut boundary = 0;
        let neighbors = self.neighbors(v);
        for &n in &neighbors {
            match self.shared_faces(v, n).len() {
                1 => boundary += 1,
                2 => {}
                _ => return false,
            }
        }
        match boundary {
            0 => neighbors.len() == faces,
            2 => neighbors.len() == faces + 1,
            _ => false,
        }
    }

    fn candidate(&self, a: usize, b: usize) -> Option<EdgeCandidate> {
        if !self.point_alive[a] || !self.point_alive[b] || a == b {
            return None;
        }
        let shared = self.shared_faces(a, b).len();
        if shared == 0 || shared > 2 {
            return None;
        }

        if self.options.preserve_boundary {
            if shared == 1 {
                return None;
            }
            let (ba, bb) = (self.is_boundary_point(a), self.is_boundary_point(b));
            if ba && bb {
                return None;
            }
            // A boundary point absorbs its interior neighbor without moving.
            if ba || bb {
                let (keep, remove) = if ba { (a, b) } else { (b, a) };
                let q = self.quadrics[keep] + self.quadrics[remove];
                let target = self.points[keep];
                return Some(self.make(keep, remove, target, q.evaluate(&target)));
            }
        }

        let (keep, remove) = if a < b { (a, b) } else { (b, a) };
        let (target, error) = self.placement(keep, remove);
        Some(self.make(keep, remove, target, error))
    }

    fn make(&self, keep: usize, remove: usize, target: Point3<f64>, error: f64) -> EdgeCandidate {
        EdgeCandidate {
            keep,
            remove,
            target,
            error: error.max(0.0),
            versions: (self.versions[keep], self.versions[remove]),
        }
    }

    /// Optimal collapse position, falling back to the best of the endpoints
    /// and the midpoint when the quadric is singular or the optimum strays.
    fn placement(&self, v0: usize, v1: usize) -> (Point3<f64>, f64) {
        let q = self.quadrics[v0] + self.quadrics[v1];
        let p0 = self.points[v0];
        let p1 = self.points[v1];
        let mid = Point3::from((p0.coords + p1.coords) * 0.5);

        if let Some(p) = q.optimal_point() {
            if (p - mid).norm() < (p1 - p0).norm() * 2.0 {
                return (p, q.evaluate(&p));
            }
        }

        [p0, p1, mid]
            .into_iter()
            .map(|p| (p, q.evaluate(&p)))
            .fold((mid, f64::INFINITY), |best, c| if c.1 < best.1 { c } else { best })
    }

    fn is_current(&self, c: &EdgeCandidate) -> bool {
        self.point_alive[c.keep]
            && self.point_alive[c.remove]
            && self.versions[c.keep] == c.versions.0
            && self.versions[c.remove] == c.versions.1
    }

    fn is_collapse_valid(&self, c: &EdgeCandidate) -> bool {
        let (keep, remove) = (c.keep, c.remove);
        let shared = self.shared_faces(keep, remove);
        if shared.is_empty() || shared.len() > 2 {
            return false;
        }
        if !self.is_manifold_point(keep) || !self.is_manifold_point(remove) {
            return false;
        }

        // Link condition: the only common neighbors are the apexes of the
        // shared triangles.
        let nk = self.neighbors(keep);
        let nr = self.neighbors(remove);
        if nk.intersection(&nr).count() != shared.len() {
            return false;
        }

        // Components never shrink below the minimum face count.
        let component = self.face_component[shared[0]];
        if self.component_faces[component] < self.options.min_component_faces + shared.len() {
            return false;
        }

        // Reject collapses that flip or flatten a surviving triangle.
        for v in [keep, remove] {
            for f in self.alive_faces(v) {
                if shared.contains(&f) {
                    continue;
                }
                let before = self.face_normal(&self.faces[f], None);
                let after = self.face_normal(&self.faces[f], Some((v, c.target)));
                match (before, after) {
                    (Some(b), Some(a)) if b.dot(&a) >= FOLD_OVER_COS => {}
                    (None, _) => {}
                    _ => return false,
                }
            }
        }

        true
    }

    fn face_normal(
        &self,
        face: &[usize; 3],
        moved: Option<(usize, Point3<f64>)>,
    ) -> Option<Vector3<f64>> {
        let pos = |v: usize| match moved {
            Some((m, p)) if m == v => p,
            _ => self.points[v],
        };
        let n = (pos(face[1]) - pos(face[0])).cross(&(pos(face[2]) - pos(face[0])));
        let len = n.norm();
        (len > 1e-300).then(|| n / len)
    }

    /// Merge `remove` into `keep`; returns the number of faces removed.
    fn collapse(&mut self, c: &EdgeCandidate) -> usize {
        let (keep, remove) = (c.keep, c.remove);
        let shared = self.shared_faces(keep, remove);

        for &f in &shared {
            self.face_alive[f] = false;
            self.component_faces[self.face_component[f]] -= 1;
        }

        let moved: Vec<usize> = self.alive_faces(remove).collect();
        for f in moved {
            for v in self.faces[f].iter_mut() {
                if *v == remove {
                    *v = keep;
                }
            }
            self.point_faces[keep].push(f);
        }

        self.points[keep] = c.target;
        let q = self.quadrics[remove];
        self.quadrics[keep].add_assign(&q);
        self.point_alive[remove] = false;
        self.point_faces[remove].clear();
        self.versions[keep] += 1;
        self.versions[remove] += 1;

        let face_alive = &self.face_alive;
        self.point_faces[keep].retain(|&f| face_alive[f]);

        // Apexes of removed faces lose an edge; refresh their candidates.
        for &f in &shared {
            for &v in &self.faces[f] {
                self.versions[v] += 1;
            }
        }

        shared.len()
    }

    fn compact(self) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let faces: Vec<[usize; 3]> = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, &alive)| alive)
            .map(|(f, _)| *f)
            .collect();
        // Unreferenced points are dropped by the caller.
        (self.points, faces)
    }
}

/// Compute initial quadrics for each vertex from adjacent faces.
fn compute_vertex_quadrics(points: &[Point3<f64>], faces: &[[usize; 3]]) -> Vec<Quadric> {
    let mut quadrics = vec![Quadric::zero(); points.len()];

    for face in faces {
        let p0 = &points[face[0]];
        let normal = (points[face[1]] - p0).cross(&(points[face[2]] - p0));

        let len = normal.norm();
        if len < 1e-300 {
            continue;
        }

        let n = normal / len;
        let d = -n.dot(&p0.coords);
        let q = Quadric::from_plane(n.x, n.y, n.z, d);

        for &v in face {
            quadrics[v].add_assign(&q);
        }
    }

    quadrics
}
