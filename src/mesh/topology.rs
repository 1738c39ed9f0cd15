//! Connectivity queries on indexed meshes.
//!
//! Everything here is derived on demand from [`Mesh::polygons`]; line cells
//! never take part in polygon topology.

use std::collections::HashMap;

use nalgebra::Vector3;

use super::polymesh::Mesh;

/// An undirected edge with the smaller index first.
pub type Edge = (usize, usize);

/// Get canonical edge representation (smaller index first).
#[inline]
pub fn canonical_edge(v0: usize, v1: usize) -> Edge {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

/// Map from each undirected edge to the polygons that use it.
pub fn edge_polygons(mesh: &Mesh) -> HashMap<Edge, Vec<usize>> {
    let mut map: HashMap<Edge, Vec<usize>> = HashMap::new();
    for (pi, polygon) in mesh.polygons.iter().enumerate() {
        let n = polygon.len();
        for i in 0..n {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            if a == b {
                continue;
            }
            map.entry(canonical_edge(a, b)).or_default().push(pi);
        }
    }
    map
}

/// Directed edges used by exactly one polygon, in that polygon's order.
///
/// The result is sorted so repeated calls agree.
pub fn boundary_edges(mesh: &Mesh) -> Vec<(usize, usize)> {
    let counts = edge_polygons(mesh);
    let mut edges = Vec::new();
    for polygon in &mesh.polygons {
        let n = polygon.len();
        for i in 0..n {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            if a != b && counts.get(&canonical_edge(a, b)).map_or(0, Vec::len) == 1 {
                edges.push((a, b));
            }
        }
    }
    edges.sort_unstable();
    edges
}

/// Edges shared by more than two polygons.
pub fn non_manifold_edges(mesh: &Mesh) -> Vec<Edge> {
    let mut edges: Vec<Edge> = edge_polygons(mesh)
        .into_iter()
        .filter(|(_, polys)| polys.len() > 2)
        .map(|(e, _)| e)
        .collect();
    edges.sort_unstable();
    edges
}

/// Manifold edges whose two polygon normals differ by at least `angle_deg`.
pub fn feature_edges(mesh: &Mesh, angle_deg: f64) -> Vec<Edge> {
    let cos_threshold = angle_deg.to_radians().cos();
    let normals: Vec<Option<Vector3<f64>>> =
        (0..mesh.polygons.len()).map(|i| mesh.polygon_normal(i)).collect();

    let mut edges: Vec<Edge> = edge_polygons(mesh)
        .into_iter()
        .filter_map(|(e, polys)| {
            if polys.len() != 2 {
                return None;
            }
            let (n0, n1) = (normals[polys[0]]?, normals[polys[1]]?);
            (n0.dot(&n1) <= cos_threshold).then_some(e)
        })
        .collect();
    edges.sort_unstable();
    edges
}

/// Sorted, deduplicated edge neighbors of every point.
pub fn point_neighbors(mesh: &Mesh) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); mesh.points.len()];
    for polygon in &mesh.polygons {
        let n = polygon.len();
        for i in 0..n {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            if a != b {
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

/// Polygons incident to every point.
pub fn point_polygons(mesh: &Mesh) -> Vec<Vec<usize>> {
    let mut incident = vec![Vec::new(); mesh.points.len()];
    for (pi, polygon) in mesh.polygons.iter().enumerate() {
        for &v in polygon {
            if incident[v].last() != Some(&pi) {
                incident[v].push(pi);
            }
        }
    }
    incident
}

/// Trace the boundary edges into loops.
///
/// Each loop lists its points once, following the direction the boundary
/// edges have in their polygons. Chains that do not close (inconsistent
/// winding or dangling boundary) are still returned as one loop each.
pub fn boundary_loops(mesh: &Mesh) -> Vec<Vec<usize>> {
    let edges = boundary_edges(mesh);
    if edges.is_empty() {
        return Vec::new();
    }

    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut incoming: HashMap<usize, Vec<usize>> = HashMap::new();
    for (ei, &(a, b)) in edges.iter().enumerate() {
        outgoing.entry(a).or_default().push(ei);
        incoming.entry(b).or_default().push(ei);
    }

    let mut used = vec![false; edges.len()];
    let mut loops = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (first, mut current) = edges[start];
        let mut chain = vec![first];

        while current != first {
            chain.push(current);
            // Prefer an edge leaving `current`; fall back to one arriving at it
            // when the winding around the hole is inconsistent.
            let next = outgoing
                .get(&current)
                .and_then(|list| list.iter().copied().find(|&e| !used[e]))
                .map(|e| (e, edges[e].1))
                .or_else(|| {
                    incoming
                        .get(&current)
                        .and_then(|list| list.iter().copied().find(|&e| !used[e]))
                        .map(|e| (e, edges[e].0))
                });
            match next {
                Some((e, to)) => {
                    used[e] = true;
                    current = to;
                }
                None => break,
            }
        }

        loops.push(chain);
    }

    loops
}

/// Number of boundary loops.
pub fn boundary_loop_count(mesh: &Mesh) -> usize {
    boundary_loops(mesh).len()
}

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    /// Create `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets containing `a` and `b`.
    pub fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Group polygons into connected components.
///
/// Two polygons are connected when they share at least one point. Components
/// are ordered by their lowest polygon index.
pub fn components(mesh: &Mesh) -> Vec<Vec<usize>> {
    let mut uf = UnionFind::new(mesh.points.len());
    for polygon in &mesh.polygons {
        for w in polygon.windows(2) {
            uf.union(w[0], w[1]);
        }
    }

    let mut by_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (pi, polygon) in mesh.polygons.iter().enumerate() {
        let Some(&first) = polygon.first() else {
            continue;
        };
        let root = uf.find(first);
        let slot = *by_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(pi);
    }
    groups
}

/// Number of connected polygon components.
pub fn component_count(mesh: &Mesh) -> usize {
    components(mesh).len()
}

/// Whether the mesh has polygons and every edge is shared by exactly two.
pub fn is_closed_manifold(mesh: &Mesh) -> bool {
    !mesh.polygons.is_empty() && edge_polygons(mesh).values().all(|p| p.len() == 2)
}
