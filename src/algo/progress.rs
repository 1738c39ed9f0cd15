//! Progress reporting for the repair pipeline.
//!
//! The pipeline reports once per stage through a [`Progress`] callback. Stages
//! that loop internally (smoothing, decimation) may report finer steps with
//! [`Progress::report_sub`], which maps them into the stage's slot.
//!
//! # Example
//!
//! ```
//! use meshmend::algo::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     eprintln!("[{}/{}] {}", current, total, message);
//! });
//! progress.report(3, 10, "smooth");
//! ```

use std::fmt;

type Callback = dyn Fn(usize, usize, &str) + Send + Sync;

/// A progress callback receiving `(current, total, message)`.
pub struct Progress {
    callback: Box<Callback>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A reporter that discards every update.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }

    /// Report that step `current` of `total` is running.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report progress inside step `slot` of `slots`.
    ///
    /// `done` of `of` sub-steps is mapped into the fraction of the slot using
    /// per-mille resolution, so the callback sees `total = slots * 1000`.
    #[inline]
    pub fn report_sub(&self, done: usize, of: usize, slot: usize, slots: usize, message: &str) {
        if of == 0 || slots == 0 {
            return;
        }
        let fraction = (done.min(of) * 1000) / of;
        (self.callback)(slot * 1000 + fraction, slots * 1000, message);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
