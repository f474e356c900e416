//! Collaborator interfaces: forward model, noise model, convergence.
//!
//! ## Purpose
//!
//! The spatial engine does not know how parameters map to signal, how
//! the per-location posterior update is computed, or when a run should
//! stop. Those three concerns are behind the traits in this module; the
//! engine only moves distributions and a scalar objective across them.
//!
//! ## Key concepts
//!
//! * **Linearization centre**: the point each location's local linear
//!   approximation is expanded around. The engine re-centres it at the
//!   updated posterior mean each iteration unless a locked
//!   linearization was configured.
//! * **Posterior without prior**: the local posterior with the prior
//!   contribution factored out; evidence optimization needs it to
//!   estimate smoothing scales without double-counting the prior.
//!
//! ## Non-goals
//!
//! * No data layout is interpreted here — observed data stays behind
//!   the noise model, addressed only by location index.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::linalg::FloatLinalg;
use crate::primitives::dist::MvnDist;
use crate::primitives::errors::SvbError;

// ============================================================================
// Forward Model
// ============================================================================

/// Supplies the parameter space and initial distributions.
pub trait ForwardModel<T: FloatLinalg> {
    /// Number of estimated parameters per location.
    fn num_params(&self) -> usize;

    /// The global (non-spatial) prior.
    fn initial_prior(&self) -> MvnDist<T>;

    /// The starting posterior shared by all locations.
    fn initial_posterior(&self) -> MvnDist<T>;

    /// Optional per-location posterior initialization (e.g. data-driven
    /// starting values). The default keeps the shared posterior.
    fn init_location(&self, _voxel: usize, _posterior: &mut MvnDist<T>) {}
}

// ============================================================================
// Noise Model
// ============================================================================

/// Performs the local posterior update and the objective evaluation.
///
/// The engine calls `update_posterior` once per location per iteration
/// with the freshly reconstructed prior. When `without_prior` is
/// supplied the implementation must also store the posterior with the
/// prior contribution factored out (evidence optimization reads it).
pub trait NoiseModel<T: FloatLinalg> {
    /// Update `posterior` for one location.
    fn update_posterior(
        &mut self,
        voxel: usize,
        prior: &MvnDist<T>,
        posterior: &mut MvnDist<T>,
        centre: &[T],
        without_prior: Option<&mut MvnDist<T>>,
    ) -> Result<(), SvbError>;

    /// Scalar objective (free energy) contribution of one location.
    fn calc_objective(
        &self,
        voxel: usize,
        prior: &MvnDist<T>,
        posterior: &MvnDist<T>,
        centre: &[T],
    ) -> T;
}

// ============================================================================
// Convergence
// ============================================================================

/// Decides when the outer iteration loop stops.
pub trait ConvergenceCheck<T: Float> {
    /// Forget any history from a previous run.
    fn reset(&mut self);

    /// Record this iteration's global objective; return `true` to stop.
    fn test(&mut self, objective: T) -> bool;
}

/// Stop after a fixed number of iterations, ignoring the objective.
#[derive(Debug, Clone)]
pub struct MaxIterations {
    limit: usize,
    done: usize,
}

impl MaxIterations {
    /// Converge after `limit` iterations.
    pub fn new(limit: usize) -> Self {
        Self { limit, done: 0 }
    }

    /// Iterations recorded so far.
    #[inline]
    pub fn iterations(&self) -> usize {
        self.done
    }
}

impl<T: Float> ConvergenceCheck<T> for MaxIterations {
    fn reset(&mut self) {
        self.done = 0;
    }

    fn test(&mut self, _objective: T) -> bool {
        self.done += 1;
        self.done >= self.limit
    }
}

/// Stop when the objective's relative change drops below a tolerance,
/// with a hard iteration cap as backstop.
#[derive(Debug, Clone)]
pub struct ObjectiveChange<T> {
    tolerance: T,
    max_iterations: usize,
    history: Vec<T>,
}

impl<T: Float> ObjectiveChange<T> {
    /// Converge when `|F_i - F_{i-1}| <= tolerance * max(|F_i|, 1)`, or
    /// after `max_iterations` at the latest.
    pub fn new(tolerance: T, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            history: Vec::new(),
        }
    }

    /// Objectives recorded so far, oldest first.
    #[inline]
    pub fn history(&self) -> &[T] {
        &self.history
    }
}

impl<T: Float> ConvergenceCheck<T> for ObjectiveChange<T> {
    fn reset(&mut self) {
        self.history.clear();
    }

    fn test(&mut self, objective: T) -> bool {
        self.history.push(objective);
        if self.history.len() >= self.max_iterations {
            return true;
        }
        if self.history.len() < 2 {
            return false;
        }
        let prev = self.history[self.history.len() - 2];
        let scale = T::max(objective.abs(), T::one());
        (objective - prev).abs() <= self.tolerance * scale
    }
}
