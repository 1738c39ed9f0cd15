//! Uniform scale deformation.
//!
//! The deformer scales every point about a pivot by `s = 1 + factor * gain`.
//! With the default gain of 0.1 a factor of 1.0 enlarges the mesh by 10%.
//! Cells, lines and scalars are carried unchanged; cached normals are kept
//! because a positive uniform scale does not rotate them.

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::Mesh;

/// The point a [`ScaleTransform`] scales about.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Pivot {
    /// The coordinate origin.
    #[default]
    Origin,
    /// The mean of the mesh points.
    Centroid,
    /// A fixed point.
    Point(Point3<f64>),
}

/// Options for [`deform`].
#[derive(Debug, Clone)]
pub struct DeformOptions {
    /// Deformation factor.
    pub factor: f64,
    /// Gain applied to the factor.
    pub gain: f64,
    /// Scale center.
    pub pivot: Pivot,
}

impl Default for DeformOptions {
    fn default() -> Self {
        Self {
            factor: 1.0,
            gain: 0.1,
            pivot: Pivot::Origin,
        }
    }
}

impl DeformOptions {
    /// Create options with the given factor.
    pub fn with_factor(factor: f64) -> Self {
        Self {
            factor,
            ..Default::default()
        }
    }

    /// Set the gain.
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// Set the pivot.
    pub fn with_pivot(mut self, pivot: Pivot) -> Self {
        self.pivot = pivot;
        self
    }

    /// The scale factor `1 + factor * gain`.
    pub fn scale(&self) -> f64 {
        1.0 + self.factor * self.gain
    }

    /// Resolve the options against a mesh into a concrete transform.
    pub fn transform_for(&self, mesh: &Mesh) -> Result<ScaleTransform> {
        let scale = self.scale();
        if !scale.is_finite() || scale <= 0.0 {
            return Err(MeshError::invalid_param(
                "deform_factor",
                self.factor,
                "scale 1 + factor * gain must be finite and positive",
            ));
        }
        let center = match self.pivot {
            Pivot::Origin => Point3::origin(),
            Pivot::Centroid => mesh.centroid().unwrap_or_else(Point3::origin),
            Pivot::Point(p) => p,
        };
        Ok(ScaleTransform { center, scale })
    }
}

/// A uniform scale about a center point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTransform {
    /// Fixed point of the transform.
    pub center: Point3<f64>,
    /// Scale factor.
    pub scale: f64,
}

impl ScaleTransform {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            center: Point3::origin(),
            scale: 1.0,
        }
    }

    /// Map a point.
    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        self.center + (p - self.center) * self.scale
    }

    /// Map a point back.
    #[inline]
    pub fn invert(&self, p: &Point3<f64>) -> Point3<f64> {
        self.center + (p - self.center) / self.scale
    }

    /// Translation part when written as `x -> scale * x + t`.
    pub fn translation(&self) -> Vector3<f64> {
        self.center.coords * (1.0 - self.scale)
    }

    /// Apply the transform to every point of a mesh.
    pub fn apply_to(&self, mesh: &Mesh) -> Mesh {
        let mut out = mesh.clone();
        out.transform_points(|p| self.apply(p));
        // transform_points drops cached normals; a positive scale keeps them valid.
        out.point_normals = mesh.point_normals.clone();
        out.cell_normals = mesh.cell_normals.clone();
        out
    }
}

/// Scale a mesh by `1 + factor * gain` about the configured pivot.
pub fn deform(mesh: &Mesh, options: &DeformOptions) -> Result<Mesh> {
    let transform = options.transform_for(mesh)?;
    debug!(
        "deform: scale {:.4} about ({:.4}, {:.4}, {:.4})",
        transform.scale, transform.center.x, transform.center.y, transform.center.z
    );
    Ok(transform.apply_to(mesh))
}
