//! Indexed polygon mesh.

use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};

use super::builder::triangulate_polygon;

/// An indexed polygon mesh.
///
/// Points are addressed by their position in [`Mesh::points`]. Polygons and
/// line cells store indices into that list. Normals and scalars are optional
/// attributes; any operation that moves points or rewrites cells clears the
/// normals, which are recomputed by [`crate::algo::normals`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Point coordinates.
    pub points: Vec<Point3<f64>>,
    /// Polygon cells, each an ordered list of at least three point indices.
    pub polygons: Vec<Vec<usize>>,
    /// Two-point line cells.
    pub lines: Vec<[usize; 2]>,
    /// Unit normal per point, if computed.
    pub point_normals: Option<Vec<Vector3<f64>>>,
    /// Unit normal per polygon, if computed.
    pub cell_normals: Option<Vec<Vector3<f64>>>,
    /// One scalar value per point, if present.
    pub scalars: Option<Vec<f64>>,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a point cloud with no cells.
    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    /// Create a mesh from points and polygons, validating every index.
    pub fn from_polygons(points: Vec<Point3<f64>>, polygons: Vec<Vec<usize>>) -> Result<Self> {
        let mesh = Self {
            points,
            polygons,
            ..Self::default()
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Create a mesh from points and triangles, validating every index.
    pub fn from_triangles(points: Vec<Point3<f64>>, triangles: &[[usize; 3]]) -> Result<Self> {
        Self::from_polygons(points, triangles.iter().map(|t| t.to_vec()).collect())
    }

    /// Check that every cell index and attribute length is consistent.
    pub fn validate(&self) -> Result<()> {
        let n = self.points.len();
        for (pi, polygon) in self.polygons.iter().enumerate() {
            if let Some(&bad) = polygon.iter().find(|&&v| v >= n) {
                return Err(MeshError::InvalidVertexIndex {
                    polygon: pi,
                    point: bad,
                });
            }
        }
        for (li, line) in self.lines.iter().enumerate() {
            if let Some(&bad) = line.iter().find(|&&v| v >= n) {
                return Err(MeshError::InvalidVertexIndex {
                    polygon: li,
                    point: bad,
                });
            }
        }
        if let Some(normals) = &self.point_normals {
            if normals.len() != n {
                return Err(MeshError::degenerate("point normal count does not match points"));
            }
        }
        if let Some(normals) = &self.cell_normals {
            if normals.len() != self.polygons.len() {
                return Err(MeshError::degenerate("cell normal count does not match polygons"));
            }
        }
        if let Some(scalars) = &self.scalars {
            if scalars.len() != n {
                return Err(MeshError::degenerate("scalar count does not match points"));
            }
        }
        Ok(())
    }

    /// Number of points.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of polygon cells.
    #[inline]
    pub fn num_polygons(&self) -> usize {
        self.polygons.len()
    }

    /// Whether the mesh has no points at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the mesh has any polygon or line cells.
    #[inline]
    pub fn has_cells(&self) -> bool {
        !self.polygons.is_empty() || !self.lines.is_empty()
    }

    /// Whether every polygon is a triangle.
    pub fn is_triangle_mesh(&self) -> bool {
        self.polygons.iter().all(|p| p.len() == 3)
    }

    /// Axis-aligned bounding box, or `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.points[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        Some((min, max))
    }

    /// Length of the bounding box diagonal (zero for an empty mesh).
    pub fn diagonal(&self) -> f64 {
        self.bounding_box()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    /// Mean of all point positions.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.points.iter().map(|p| p.coords).sum();
        Some(Point3::from(sum / self.points.len() as f64))
    }

    /// Area vector of a polygon: unit normal times area.
    ///
    /// Computed as half the sum of fan cross products around the first point,
    /// which equals the Newell normal for planar polygons and follows the
    /// right-hand rule for the polygon's point order.
    pub fn polygon_area_vector(&self, polygon: usize) -> Vector3<f64> {
        area_vector(&self.points, &self.polygons[polygon])
    }

    /// Area of a polygon.
    pub fn polygon_area(&self, polygon: usize) -> f64 {
        self.polygon_area_vector(polygon).norm()
    }

    /// Unit normal of a polygon, or `None` if it has zero area.
    pub fn polygon_normal(&self, polygon: usize) -> Option<Vector3<f64>> {
        let v = self.polygon_area_vector(polygon);
        let len = v.norm();
        if len > 0.0 && len.is_finite() {
            Some(v / len)
        } else {
            None
        }
    }

    /// Total polygon area.
    pub fn surface_area(&self) -> f64 {
        (0..self.polygons.len()).map(|i| self.polygon_area(i)).sum()
    }

    /// Signed enclosed volume; positive when polygons wind outward.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for polygon in &self.polygons {
            if polygon.len() < 3 {
                continue;
            }
            let p0 = self.points[polygon[0]].coords;
            for i in 1..polygon.len() - 1 {
                let p1 = self.points[polygon[i]].coords;
                let p2 = self.points[polygon[i + 1]].coords;
                volume += p0.dot(&p1.cross(&p2));
            }
        }
        volume / 6.0
    }

    /// Drop normals after a geometry or connectivity change.
    pub fn invalidate_normals(&mut self) {
        self.point_normals = None;
        self.cell_normals = None;
    }

    /// Apply a point transformation to every point.
    pub fn transform_points<F>(&mut self, f: F)
    where
        F: Fn(&Point3<f64>) -> Point3<f64>,
    {
        for p in &mut self.points {
            *p = f(p);
        }
        self.invalidate_normals();
    }

    /// Reverse the winding of every polygon.
    pub fn flip_orientation(&mut self) {
        for polygon in &mut self.polygons {
            polygon.reverse();
        }
        if let Some(normals) = &mut self.point_normals {
            normals.iter_mut().for_each(|n| *n = -*n);
        }
        if let Some(normals) = &mut self.cell_normals {
            normals.iter_mut().for_each(|n| *n = -*n);
        }
    }

    /// Split every polygon into triangles.
    ///
    /// Triangles keep the winding of their source polygon. Cell normals are
    /// dropped because the cell count changes.
    pub fn triangulate(&self) -> Mesh {
        if self.is_triangle_mesh() {
            return self.clone();
        }
        let polygons = self
            .polygons
            .iter()
            .flat_map(|polygon| triangulate_polygon(&self.points, polygon))
            .map(|t| t.to_vec())
            .collect();
        Mesh {
            points: self.points.clone(),
            polygons,
            lines: self.lines.clone(),
            point_normals: self.point_normals.clone(),
            cell_normals: None,
            scalars: self.scalars.clone(),
        }
    }

    /// Append another mesh, offsetting its indices.
    ///
    /// Attributes survive only when both meshes carry them.
    pub fn append(&mut self, other: &Mesh) {
        let offset = self.points.len();
        let had_cells = self.polygons.len();
        self.points.extend_from_slice(&other.points);
        self.polygons.extend(
            other
                .polygons
                .iter()
                .map(|p| p.iter().map(|&v| v + offset).collect::<Vec<_>>()),
        );
        self.lines
            .extend(other.lines.iter().map(|l| [l[0] + offset, l[1] + offset]));

        self.point_normals = match (self.point_normals.take(), &other.point_normals) {
            (Some(mut a), Some(b)) if a.len() == offset => {
                a.extend_from_slice(b);
                Some(a)
            }
            _ => None,
        };
        self.cell_normals = match (self.cell_normals.take(), &other.cell_normals) {
            (Some(mut a), Some(b)) if a.len() == had_cells => {
                a.extend_from_slice(b);
                Some(a)
            }
            _ => None,
        };
        self.scalars = match (self.scalars.take(), &other.scalars) {
            (Some(mut a), Some(b)) if a.len() == offset => {
                a.extend_from_slice(b);
                Some(a)
            }
            _ => None,
        };
    }

    /// Flags for points used by at least one polygon or line.
    pub fn referenced_points(&self) -> Vec<bool> {
        let mut used = vec![false; self.points.len()];
        for polygon in &self.polygons {
            for &v in polygon {
                used[v] = true;
            }
        }
        for line in &self.lines {
            used[line[0]] = true;
            used[line[1]] = true;
        }
        used
    }

    /// Keep only the points flagged in `keep`, remapping cells.
    ///
    /// Cells that reference a dropped point are removed.
    pub fn retain_points(&self, keep: &[bool]) -> Mesh {
        let mut map = vec![usize::MAX; self.points.len()];
        let mut points = Vec::new();
        for (i, &k) in keep.iter().enumerate() {
            if k {
                map[i] = points.len();
                points.push(self.points[i]);
            }
        }

        let mut polygons = Vec::with_capacity(self.polygons.len());
        let mut cell_normals = self.cell_normals.as_ref().map(|_| Vec::new());
        for (pi, polygon) in self.polygons.iter().enumerate() {
            if polygon.iter().any(|&v| map[v] == usize::MAX) {
                continue;
            }
            polygons.push(polygon.iter().map(|&v| map[v]).collect());
            if let (Some(out), Some(src)) = (&mut cell_normals, &self.cell_normals) {
                out.push(src[pi]);
            }
        }
        let lines = self
            .lines
            .iter()
            .filter(|l| map[l[0]] != usize::MAX && map[l[1]] != usize::MAX)
            .map(|l| [map[l[0]], map[l[1]]])
            .collect();

        Mesh {
            points,
            polygons,
            lines,
            point_normals: self.point_normals.as_ref().map(|v| select(v, keep)),
            cell_normals,
            scalars: self.scalars.as_ref().map(|v| select(v, keep)),
        }
    }

    /// Remove points not referenced by any cell.
    pub fn compact(&self) -> Mesh {
        self.retain_points(&self.referenced_points())
    }
}

fn select<T: Copy>(values: &[T], keep: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(keep)
        .filter(|(_, &k)| k)
        .map(|(v, _)| *v)
        .collect()
}

/// Area vector of the polygon `indices` over `points`.
///
/// Half the sum of fan cross products around the first point: the unit normal
/// (right-hand rule) scaled by the area.
pub fn area_vector(points: &[Point3<f64>], indices: &[usize]) -> Vector3<f64> {
    if indices.len() < 3 {
        return Vector3::zeros();
    }
    let p0 = points[indices[0]];
    let mut sum = Vector3::zeros();
    for i in 1..indices.len() - 1 {
        let e1 = points[indices[i]] - p0;
        let e2 = points[indices[i + 1]] - p0;
        sum += e1.cross(&e2);
    }
    sum * 0.5
}
