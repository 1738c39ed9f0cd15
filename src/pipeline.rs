//! The repair pipeline.
//!
//! [`repair`] runs every stage once, in a fixed order, as a state machine:
//!
//! ```text
//! Loaded -> Repaired -> Smoothed -> Decimated -> Deformed -> Renormalized
//!        -> Denoised -> MultiScaled -> Reconstructed -> Preserved -> Done
//! ```
//!
//! Each transition consumes the previous mesh and produces a new one. The
//! input is kept untouched for the final boundary merge. Any stage error
//! aborts the run with a [`PipelineError`] naming the stage; nothing partial
//! is returned. Only smoothing degrades instead of failing: a numerical
//! failure there passes the mesh through unchanged.
//!
//! # Example
//!
//! ```
//! use meshmend::mesh::shapes::open_cube;
//! use meshmend::mesh::topology::boundary_loop_count;
//! use meshmend::pipeline::{repair, RepairConfig};
//!
//! let config = RepairConfig::default().with_reconstruct_resolution(12);
//! let repaired = repair(&open_cube(4), &config).unwrap();
//! assert_eq!(boundary_loop_count(&repaired), 0);
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::algo::boundary_merge::{merge_boundary, MergeOptions};
use crate::algo::clean::{clean, CleanOptions};
use crate::algo::connectivity::{denoise, DenoiseOptions};
use crate::algo::decimate::{decimate, DecimateOptions};
use crate::algo::fill_holes::{fill_holes, FillHolesOptions};
use crate::algo::multiscale::{multiscale, MultiScaleOptions};
use crate::algo::normals::{compute_normals_with, NormalsOptions};
use crate::algo::reconstruct::{reconstruct, ReconstructOptions};
use crate::algo::smooth::{smooth_or_passthrough, SmoothOptions};
use crate::algo::transform::{DeformOptions, ScaleTransform};
use crate::algo::Progress;
use crate::error::{MeshError, PipelineError, Result};
use crate::mesh::Mesh;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Largest boundary loop extent that is filled.
    pub hole_size: f64,
    /// Windowed-sinc filter terms.
    pub smooth_iterations: usize,
    /// Smoothing pass band, in `(0, 2)`.
    pub pass_band: f64,
    /// Dihedral angle in degrees marking feature edges while smoothing.
    pub feature_angle: f64,
    /// Fraction of triangles removed by decimation, in `[0, 1)`.
    pub decimate_reduction: f64,
    /// Deformation factor; the mesh is scaled by `1 + deform_factor * deform_gain`.
    pub deform_factor: f64,
    /// Gain applied to the deformation factor.
    pub deform_gain: f64,
    /// Components with at most this many points are dropped.
    pub denoise_area_threshold: f64,
    /// Merge distance used when cleaning.
    pub merge_tolerance: f64,
    /// Reconstruction lattice cells along the longest axis.
    pub reconstruct_resolution: usize,
    /// Neighbours per tangent plane during reconstruction.
    pub reconstruct_neighbors: usize,
    /// Dihedral angle in degrees marking feature edges in the boundary merge.
    pub feature_edge_angle: f64,
    /// Use rayon inside stages that support it.
    pub parallel: bool,
    /// Abort before the next stage once this much time has passed.
    pub time_budget: Option<Duration>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            hole_size: 100.0,
            smooth_iterations: 3,
            pass_band: 0.5,
            feature_angle: 60.0,
            decimate_reduction: 0.05,
            deform_factor: 1.0,
            deform_gain: 0.1,
            denoise_area_threshold: 50.0,
            merge_tolerance: 0.0,
            reconstruct_resolution: 32,
            reconstruct_neighbors: 12,
            feature_edge_angle: 30.0,
            parallel: false,
            time_budget: None,
        }
    }
}

impl RepairConfig {
    /// Set the hole size.
    pub fn with_hole_size(mut self, hole_size: f64) -> Self {
        self.hole_size = hole_size;
        self
    }

    /// Set the number of smoothing filter terms.
    pub fn with_smooth_iterations(mut self, iterations: usize) -> Self {
        self.smooth_iterations = iterations;
        self
    }

    /// Set the smoothing pass band.
    pub fn with_pass_band(mut self, pass_band: f64) -> Self {
        self.pass_band = pass_band;
        self
    }

    /// Set the smoothing feature angle.
    pub fn with_feature_angle(mut self, angle: f64) -> Self {
        self.feature_angle = angle;
        self
    }

    /// Set the decimation reduction.
    pub fn with_decimate_reduction(mut self, reduction: f64) -> Self {
        self.decimate_reduction = reduction;
        self
    }

    /// Set the deformation factor.
    pub fn with_deform_factor(mut self, factor: f64) -> Self {
        self.deform_factor = factor;
        self
    }

    /// Set the denoise threshold.
    pub fn with_denoise_area_threshold(mut self, threshold: f64) -> Self {
        self.denoise_area_threshold = threshold;
        self
    }

    /// Set the reconstruction lattice resolution.
    pub fn with_reconstruct_resolution(mut self, resolution: usize) -> Self {
        self.reconstruct_resolution = resolution;
        self
    }

    /// Enable or disable rayon inside stages.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set a time budget for the whole run.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Check every parameter range.
    pub fn validate(&self) -> Result<()> {
        if !(self.hole_size >= 0.0) {
            return Err(MeshError::invalid_param(
                "hole_size",
                self.hole_size,
                "must be non-negative",
            ));
        }
        if !(self.denoise_area_threshold >= 0.0) {
            return Err(MeshError::invalid_param(
                "denoise_area_threshold",
                self.denoise_area_threshold,
                "must be non-negative",
            ));
        }
        if !(self.merge_tolerance >= 0.0) {
            return Err(MeshError::invalid_param(
                "merge_tolerance",
                self.merge_tolerance,
                "must be non-negative",
            ));
        }
        self.smooth_options().validate()?;
        self.decimate_options().validate()?;
        self.reconstruct_options().validate()?;
        Ok(())
    }

    fn clean_options(&self) -> CleanOptions {
        CleanOptions::default().with_tolerance(self.merge_tolerance)
    }

    fn smooth_options(&self) -> SmoothOptions {
        SmoothOptions::default()
            .with_iterations(self.smooth_iterations)
            .with_pass_band(self.pass_band)
            .with_feature_angle(self.feature_angle)
            .with_parallel(self.parallel)
    }

    fn decimate_options(&self) -> DecimateOptions {
        DecimateOptions::with_reduction(self.decimate_reduction)
    }

    fn deform_options(&self) -> DeformOptions {
        DeformOptions::with_factor(self.deform_factor).with_gain(self.deform_gain)
    }

    fn reconstruct_options(&self) -> ReconstructOptions {
        ReconstructOptions::default()
            .with_resolution(self.reconstruct_resolution)
            .with_neighbors(self.reconstruct_neighbors)
            .with_parallel(self.parallel)
    }
}

/// Where a pipeline run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Input accepted.
    Loaded,
    /// Cleaned and holes filled.
    Repaired,
    /// Smoothed.
    Smoothed,
    /// Decimated.
    Decimated,
    /// Deformed.
    Deformed,
    /// Normals recomputed.
    Renormalized,
    /// Small components removed.
    Denoised,
    /// Coarse and fine smoothing blended.
    MultiScaled,
    /// Surface reconstructed.
    Reconstructed,
    /// Input boundaries merged back.
    Preserved,
    /// Finished.
    Done,
}

impl PipelineState {
    /// Every state in run order.
    pub const ALL: [PipelineState; 11] = [
        PipelineState::Loaded,
        PipelineState::Repaired,
        PipelineState::Smoothed,
        PipelineState::Decimated,
        PipelineState::Deformed,
        PipelineState::Renormalized,
        PipelineState::Denoised,
        PipelineState::MultiScaled,
        PipelineState::Reconstructed,
        PipelineState::Preserved,
        PipelineState::Done,
    ];

    /// The state after this one, or `None` at [`PipelineState::Done`].
    pub fn next(self) -> Option<PipelineState> {
        let i = Self::ALL.iter().position(|&s| s == self)?;
        Self::ALL.get(i + 1).copied()
    }
}

/// The component that runs during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Point merging and degenerate cell removal.
    Clean,
    /// Boundary loop capping.
    FillHoles,
    /// Windowed-sinc smoothing.
    Smooth,
    /// Topology-preserving decimation.
    Decimate,
    /// Uniform scaling.
    Deform,
    /// Normal recomputation.
    Renormalize,
    /// Connectivity-based outlier removal.
    Denoise,
    /// Coarse plus fine smoothing.
    MultiScale,
    /// Implicit surface reconstruction.
    Reconstruct,
    /// Boundary and feature edge merge.
    Preserve,
    /// Final output validation.
    Validate,
}

impl Stage {
    /// Lowercase stage name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::FillHoles => "fill holes",
            Stage::Smooth => "smooth",
            Stage::Decimate => "decimate",
            Stage::Deform => "deform",
            Stage::Renormalize => "renormalize",
            Stage::Denoise => "denoise",
            Stage::MultiScale => "multiscale",
            Stage::Reconstruct => "reconstruct",
            Stage::Preserve => "preserve boundary",
            Stage::Validate => "validate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress steps in a full run: one per stage call, counting both
/// validations and the clean that opens the repair step.
const STEPS: usize = 12;

/// Run the full repair pipeline.
pub fn repair(mesh: &Mesh, config: &RepairConfig) -> std::result::Result<Mesh, PipelineError> {
    repair_with_progress(mesh, config, &Progress::none())
}

/// Run the full repair pipeline, reporting once per stage and once when done.
pub fn repair_with_progress(
    mesh: &Mesh,
    config: &RepairConfig,
    progress: &Progress,
) -> std::result::Result<Mesh, PipelineError> {
    let mut run = Run {
        config,
        progress,
        state: PipelineState::Loaded,
        started: Instant::now(),
        step: 0,
    };

    run.stage(Stage::Validate, || {
        config.validate()?;
        mesh.validate()?;
        if mesh.is_empty() {
            return Err(MeshError::degenerate("input has no points"));
        }
        Ok(())
    })?;
    info!(
        "repair: {} points, {} polygons",
        mesh.num_points(),
        mesh.num_polygons()
    );

    // Loaded -> Repaired
    let current = run.stage(Stage::Clean, || non_empty(clean(mesh, &config.clean_options())))?;
    let current = run.stage(Stage::FillHoles, || {
        let filled = fill_holes(&current, &FillHolesOptions::with_hole_size(config.hole_size));
        non_empty(clean(&filled, &config.clean_options()))
    })?;
    run.advance();

    // Repaired -> Smoothed
    let current = run.stage(Stage::Smooth, || {
        non_empty(smooth_or_passthrough(&current, &config.smooth_options()))
    })?;
    run.advance();

    // Smoothed -> Decimated
    let current = run.stage(Stage::Decimate, || {
        non_empty(decimate(&current, &config.decimate_options())?)
    })?;
    run.advance();

    // Decimated -> Deformed
    let mut alignment = ScaleTransform::identity();
    let current = run.stage(Stage::Deform, || {
        alignment = config.deform_options().transform_for(&current)?;
        non_empty(alignment.apply_to(&current))
    })?;
    run.advance();

    // Deformed -> Renormalized
    let normals = NormalsOptions {
        parallel: config.parallel,
    };
    let current = run.stage(Stage::Renormalize, || {
        non_empty(compute_normals_with(&current, &normals))
    })?;
    run.advance();

    // Renormalized -> Denoised
    let current = run.stage(Stage::Denoise, || {
        let options = DenoiseOptions::with_threshold(config.denoise_area_threshold);
        non_empty(denoise(&current, &options))
    })?;
    run.advance();

    // Denoised -> MultiScaled
    let current = run.stage(Stage::MultiScale, || {
        let options = MultiScaleOptions::from_base(&config.smooth_options());
        non_empty(multiscale(&current, &options))
    })?;
    run.advance();

    // MultiScaled -> Reconstructed
    let current = run.stage(Stage::Reconstruct, || {
        non_empty(reconstruct(&current, &config.reconstruct_options())?)
    })?;
    run.advance();

    // Reconstructed -> Preserved
    let current = run.stage(Stage::Preserve, || {
        let options = MergeOptions {
            feature_angle: config.feature_edge_angle,
            alignment: Some(alignment),
            tolerance: config.merge_tolerance,
        };
        non_empty(merge_boundary(&current, mesh, &options))
    })?;
    run.advance();

    // Preserved -> Done
    let current = run.stage(Stage::Validate, || {
        current.validate()?;
        non_empty(current)
    })?;
    run.advance();

    info!(
        "repair: done in {:.2?}, {} points, {} polygons",
        run.started.elapsed(),
        current.num_points(),
        current.num_polygons()
    );
    progress.report(STEPS, STEPS, "done");
    Ok(current)
}

/// Bookkeeping for one run.
struct Run<'a> {
    config: &'a RepairConfig,
    progress: &'a Progress,
    state: PipelineState,
    started: Instant,
    step: usize,
}

impl Run<'_> {
    /// Run one stage, tagging any error with the stage and current state.
    fn stage<T, F>(&mut self, stage: Stage, f: F) -> std::result::Result<T, PipelineError>
    where
        F: FnOnce() -> Result<T>,
    {
        let wrap = |source| PipelineError {
            stage,
            state: self.state,
            source,
        };

        if let Some(budget) = self.config.time_budget {
            if self.started.elapsed() >= budget {
                return Err(wrap(MeshError::TimeBudgetExceeded {
                    budget_ms: budget.as_millis(),
                }));
            }
        }

        self.progress.report(self.step, STEPS, stage.name());
        let started = Instant::now();
        let result = f().map_err(wrap)?;
        self.step += 1;
        debug!("{}: {:.2?}", stage, started.elapsed());
        Ok(result)
    }

    /// Move to the next pipeline state.
    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            self.state = next;
        }
    }
}

fn non_empty(mesh: Mesh) -> Result<Mesh> {
    if mesh.is_empty() {
        Err(MeshError::degenerate("mesh has no points"))
    } else {
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::shapes::{open_cube, unit_cube};
    use nalgebra::Point3;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_state_order() {
        let mut state = PipelineState::Loaded;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            seen.push(next);
            state = next;
        }
        assert_eq!(seen, PipelineState::ALL.to_vec());
        assert_eq!(PipelineState::Done.next(), None);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Reconstruct.to_string(), "reconstruct");
        assert_eq!(Stage::FillHoles.to_string(), "fill holes");
    }

    #[test]
    fn test_empty_mesh_is_degenerate() {
        let err = repair(&Mesh::new(), &RepairConfig::default()).unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert_eq!(err.state, PipelineState::Loaded);
        assert!(matches!(err.kind(), MeshError::DegenerateMesh { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RepairConfig::default().with_pass_band(5.0);
        let err = repair(&unit_cube(), &config).unwrap_err();
        assert!(matches!(
            err.kind(),
            MeshError::InvalidParameter {
                name: "pass_band",
                ..
            }
        ));
    }

    #[test]
    fn test_colinear_points_fail_in_reconstruct() {
        let cloud = Mesh::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ]);
        let err = repair(&cloud, &RepairConfig::default()).unwrap_err();
        assert_eq!(err.stage, Stage::Reconstruct);
        assert_eq!(err.state, PipelineState::MultiScaled);
        assert!(matches!(
            err.kind(),
            MeshError::InsufficientGeometry { .. }
        ));
    }

    #[test]
    fn test_small_mesh_denoised_away() {
        // The unit cube has 8 points, below the default threshold of 50.
        let err = repair(&unit_cube(), &RepairConfig::default()).unwrap_err();
        assert_eq!(err.stage, Stage::Denoise);
        assert!(matches!(err.kind(), MeshError::DegenerateMesh { .. }));
    }

    #[test]
    fn test_zero_time_budget() {
        let config = RepairConfig::default().with_time_budget(Duration::ZERO);
        let err = repair(&open_cube(2), &config).unwrap_err();
        assert!(matches!(
            err.kind(),
            MeshError::TimeBudgetExceeded { budget_ms: 0 }
        ));
    }

    #[test]
    fn test_progress_reports_every_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |step, total, message| {
            sink.lock().unwrap().push((step, total, message.to_string()));
        });
        let config = RepairConfig::default().with_reconstruct_resolution(10);
        repair_with_progress(&open_cube(4), &config, &progress).unwrap();

        let seen = seen.lock().unwrap();
        let names: Vec<&str> = seen.iter().map(|(_, _, m)| m.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "validate",
                "clean",
                "fill holes",
                "smooth",
                "decimate",
                "deform",
                "renormalize",
                "denoise",
                "multiscale",
                "reconstruct",
                "preserve boundary",
                "validate",
                "done",
            ]
        );
        // One step per stage, ending on a full bar.
        let steps: Vec<usize> = seen.iter().map(|(s, _, _)| *s).collect();
        assert_eq!(steps, (0..=STEPS).collect::<Vec<_>>());
        assert!(seen.iter().all(|(_, t, _)| *t == STEPS));
    }
}
