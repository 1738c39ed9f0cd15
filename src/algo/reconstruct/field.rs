//! Signed distance to oriented tangent planes (Hoppe et al., 1992).
//!
//! The distance at a sample is a Gaussian-weighted blend over the `k`
//! nearest planes rather than the single nearest one, so the field has no
//! jumps where the nearest centre changes.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;

use crate::error::{MeshError, Result};

/// k-d tree over point positions. Items are indices into the built slice.
///
/// The immutable tree is balanced at construction, so any number of points
/// may share a coordinate on the split axis.
pub(super) type Tree = ImmutableKdTree<f64, 3>;

/// Smallest-to-largest eigenvalue ratio below which a cloud counts as flat.
const FLATNESS_RATIO: f64 = 1e-9;

pub(super) fn build_tree(points: &[Point3<f64>]) -> Tree {
    let coords: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
    Tree::new_from_slice(&coords)
}

/// Fail unless the cloud has at least four points spanning all three axes.
pub(super) fn check_spread(points: &[Point3<f64>]) -> Result<()> {
    if points.len() < 4 {
        return Err(MeshError::insufficient(format!(
            "{} points, at least 4 are needed",
            points.len()
        )));
    }

    let (_, cov) = covariance(points.iter());
    let eigen = SymmetricEigen::new(cov);
    let largest = eigen.eigenvalues.max();
    let smallest = eigen.eigenvalues.min();
    if largest <= 0.0 || !largest.is_finite() || smallest / largest < FLATNESS_RATIO {
        return Err(MeshError::insufficient(
            "points are coincident, colinear or coplanar",
        ));
    }
    Ok(())
}

/// Centroid and (unnormalised) covariance of a point set.
fn covariance<'a>(points: impl Iterator<Item = &'a Point3<f64>> + Clone) -> (Point3<f64>, Matrix3<f64>) {
    let mut count = 0usize;
    let mut sum = Vector3::zeros();
    for p in points.clone() {
        sum += p.coords;
        count += 1;
    }
    let center = sum / count.max(1) as f64;

    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p.coords - center;
        cov += d * d.transpose();
    }
    (Point3::from(center), cov)
}

/// Oriented tangent planes, one per input point.
pub(super) struct TangentPlanes {
    pub(super) centers: Vec<Point3<f64>>,
    pub(super) normals: Vec<Vector3<f64>>,
    neighbors: Vec<Vec<usize>>,
    tree: Tree,
    /// Planes blended per sample.
    blend: usize,
    /// Squared Gaussian width, the mean squared neighbourhood radius.
    bandwidth_sq: f64,
}

impl TangentPlanes {
    /// Fit a plane to the `k` nearest neighbours of every point.
    pub(super) fn fit(points: &[Point3<f64>], k: usize, parallel: bool) -> Self {
        let tree = build_tree(points);
        let k = k.min(points.len()).max(1);

        let fit_one = |p: &Point3<f64>| -> (Point3<f64>, Vector3<f64>, Vec<usize>, f64) {
            let found = tree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], NonZeroUsize::new(k).unwrap());
            let radius_sq = found.iter().map(|n| n.distance).fold(0.0, f64::max);
            let neighbors: Vec<usize> = found.iter().map(|n| n.item as usize).collect();
            let (center, cov) = covariance(neighbors.iter().map(|&i| &points[i]));
            (center, smallest_eigenvector(&cov), neighbors, radius_sq)
        };

        let fitted: Vec<_> = if parallel {
            points.par_iter().map(fit_one).collect()
        } else {
            points.iter().map(fit_one).collect()
        };

        let mut centers = Vec::with_capacity(fitted.len());
        let mut normals = Vec::with_capacity(fitted.len());
        let mut neighbors = Vec::with_capacity(fitted.len());
        let mut radius_sum = 0.0;
        for (c, n, nb, r) in fitted {
            centers.push(c);
            normals.push(n);
            neighbors.push(nb);
            radius_sum += r;
        }
        let bandwidth_sq = radius_sum / centers.len().max(1) as f64;

        let tree = build_tree(&centers);
        Self {
            centers,
            normals,
            neighbors,
            tree,
            blend: k,
            bandwidth_sq: if bandwidth_sq > 0.0 { bandwidth_sq } else { 1.0 },
        }
    }

    /// Make plane normals agree along a minimum spanning tree of the
    /// neighbour graph, then point the majority away from the centroid.
    pub(super) fn orient(&mut self) {
        let n = self.normals.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, list) in self.neighbors.iter().enumerate() {
            for &j in list {
                if i != j {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }

        let mut visited = vec![false; n];
        let mut heap = BinaryHeap::new();
        loop {
            // Seed each graph component at its highest point, facing up.
            let seed = (0..n)
                .filter(|&i| !visited[i])
                .max_by(|&a, &b| {
                    self.centers[a]
                        .z
                        .partial_cmp(&self.centers[b].z)
                        .unwrap_or(Ordering::Equal)
                });
            let Some(seed) = seed else {
                break;
            };
            if self.normals[seed].z < 0.0 {
                self.normals[seed] = -self.normals[seed];
            }
            visited[seed] = true;
            self.push_edges(seed, &adjacency, &visited, &mut heap);

            while let Some(TreeEdge { from, to, .. }) = heap.pop() {
                if visited[to] {
                    continue;
                }
                if self.normals[to].dot(&self.normals[from]) < 0.0 {
                    self.normals[to] = -self.normals[to];
                }
                visited[to] = true;
                self.push_edges(to, &adjacency, &visited, &mut heap);
            }
        }

        let (centroid, _) = covariance(self.centers.iter());
        let inward = self
            .centers
            .iter()
            .zip(&self.normals)
            .filter(|(c, nrm)| nrm.dot(&(**c - centroid)) < 0.0)
            .count();
        if inward * 2 > n {
            self.normals.iter_mut().for_each(|v| *v = -*v);
        }
    }

    fn push_edges(
        &self,
        from: usize,
        adjacency: &[Vec<usize>],
        visited: &[bool],
        heap: &mut BinaryHeap<TreeEdge>,
    ) {
        for &to in &adjacency[from] {
            if !visited[to] {
                let cost = 1.0 - self.normals[from].dot(&self.normals[to]).abs();
                heap.push(TreeEdge { cost, from, to });
            }
        }
    }

    /// Signed distance from `x` to the planes of the nearest centres.
    ///
    /// Weights are taken relative to the nearest centre, so they never all
    /// underflow far from the cloud.
    pub(super) fn distance(&self, x: &Point3<f64>) -> f64 {
        let found = self
            .tree
            .nearest_n::<SquaredEuclidean>(&[x.x, x.y, x.z], NonZeroUsize::new(self.blend).unwrap());
        let nearest = found.iter().map(|n| n.distance).fold(f64::INFINITY, f64::min);

        let mut sum = 0.0;
        let mut weight = 0.0;
        for n in &found {
            let i = n.item as usize;
            let w = (-(n.distance - nearest) / self.bandwidth_sq).exp();
            sum += w * (x - self.centers[i]).dot(&self.normals[i]);
            weight += w;
        }
        if weight > 0.0 {
            sum / weight
        } else {
            f64::NAN
        }
    }
}

fn smallest_eigenvector(cov: &Matrix3<f64>) -> Vector3<f64> {
    let eigen = SymmetricEigen::new(*cov);
    let min_idx = eigen.eigenvalues.imin();
    let normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
    let norm = normal.norm();
    if norm > 1e-10 {
        normal / norm
    } else {
        Vector3::z()
    }
}

/// Edge of the orientation spanning tree, ordered cheapest first.
struct TreeEdge {
    cost: f64,
    from: usize,
    to: usize,
}

impl PartialEq for TreeEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for TreeEdge {}

impl PartialOrd for TreeEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::icosphere;

    #[test]
    fn test_colinear_points_rejected() {
        let points: Vec<_> = (0..10).map(|i| Point3::new(i as f64, 2.0 * i as f64, 0.0)).collect();
        assert!(matches!(
            check_spread(&points),
            Err(MeshError::InsufficientGeometry { .. })
        ));
    }

    #[test]
    fn test_coplanar_points_rejected() {
        let points: Vec<_> = (0..25)
            .map(|i| Point3::new((i % 5) as f64, (i / 5) as f64, 1.0))
            .collect();
        assert!(check_spread(&points).is_err());
    }

    #[test]
    fn test_too_few_points_rejected() {
        let points = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0)];
        assert!(check_spread(&points).is_err());
    }

    #[test]
    fn test_tree_handles_many_points_on_one_plane() {
        // 3600 points share z = 0.5 on one face.
        let cube = crate::mesh::shapes::subdivided_cube(60);
        let tree = build_tree(&cube.points);
        for (i, p) in cube.points.iter().enumerate().step_by(97) {
            let nearest = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]);
            assert_eq!(nearest.distance, 0.0);
            assert_eq!(cube.points[nearest.item as usize], cube.points[i]);
        }
        let found = tree.nearest_n::<SquaredEuclidean>(&[0.0, 0.0, 0.5], NonZeroUsize::new(12).unwrap());
        assert_eq!(found.len(), 12);
    }

    #[test]
    fn test_sphere_planes_point_outward() {
        let sphere = icosphere(2);
        check_spread(&sphere.points).unwrap();
        let mut planes = TangentPlanes::fit(&sphere.points, 8, false);
        planes.orient();
        for (c, n) in planes.centers.iter().zip(&planes.normals) {
            assert!(n.dot(&c.coords.normalize()) > 0.9);
        }
        assert!(planes.distance(&Point3::origin()) < 0.0);
        assert!(planes.distance(&Point3::new(0.0, 0.0, 2.0)) > 0.0);
    }
}
