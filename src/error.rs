//! Error types for meshmend.
//!
//! Every stage reports failures through [`MeshError`]. The pipeline wraps the
//! failing stage's error in a [`PipelineError`] so callers can tell which stage
//! gave up.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::{PipelineState, Stage};

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The input file does not exist or cannot be opened.
    #[error("file not found: {path}")]
    FileNotFound {
        /// The file path.
        path: PathBuf,
    },

    /// Too few points, or all points coplanar/colinear, to reconstruct a surface.
    #[error("insufficient geometry: {details}")]
    InsufficientGeometry {
        /// What was missing.
        details: String,
    },

    /// The mesh has no usable cells or points.
    #[error("degenerate mesh: {details}")]
    DegenerateMesh {
        /// Description of the degenerate condition.
        details: String,
    },

    /// An operation that promised to keep topology changed it.
    #[error(
        "topology changed: {components_before} -> {components_after} components, \
         {loops_before} -> {loops_after} boundary loops"
    )]
    TopologyViolation {
        /// Connected components before the operation.
        components_before: usize,
        /// Connected components after the operation.
        components_after: usize,
        /// Boundary loops before the operation.
        loops_before: usize,
        /// Boundary loops after the operation.
        loops_after: usize,
    },

    /// A polygon references an invalid point index.
    #[error("polygon {polygon} references invalid point index {point}")]
    InvalidVertexIndex {
        /// The polygon (or line) index.
        polygon: usize,
        /// The invalid point index.
        point: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Algorithm failed to converge or produced non-finite values.
    #[error("algorithm failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// The configured time budget ran out before the pipeline finished.
    #[error("time budget of {budget_ms} ms exceeded")]
    TimeBudgetExceeded {
        /// The budget in milliseconds.
        budget_ms: u128,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a degenerate mesh error.
    pub fn degenerate(details: impl Into<String>) -> Self {
        MeshError::DegenerateMesh {
            details: details.into(),
        }
    }

    /// Create an insufficient geometry error.
    pub fn insufficient(details: impl Into<String>) -> Self {
        MeshError::InsufficientGeometry {
            details: details.into(),
        }
    }
}

/// A pipeline failure, tagged with the stage that produced it.
#[derive(Error, Debug)]
#[error("{stage} failed (pipeline state {state:?}): {source}")]
pub struct PipelineError {
    /// The stage that was running.
    pub stage: Stage,
    /// The last state the pipeline reached successfully.
    pub state: PipelineState,
    /// The underlying error.
    #[source]
    pub source: MeshError,
}

impl PipelineError {
    /// The underlying mesh error.
    pub fn kind(&self) -> &MeshError {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_message() {
        let err = MeshError::invalid_param("pass_band", 3.0, "must be in (0, 2]");
        assert_eq!(
            err.to_string(),
            "invalid parameter: pass_band = 3 (must be in (0, 2])"
        );
    }

    #[test]
    fn test_pipeline_error_reports_stage() {
        let err = PipelineError {
            stage: Stage::Reconstruct,
            state: PipelineState::MultiScaled,
            source: MeshError::insufficient("3 points"),
        };
        let message = err.to_string();
        assert!(message.contains("reconstruct"), "{}", message);
        assert!(matches!(
            err.kind(),
            MeshError::InsufficientGeometry { .. }
        ));
    }
}
