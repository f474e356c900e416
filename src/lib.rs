//! # svb-rs — Spatially regularized variational Bayes for Rust
//!
//! Per-location (voxel) Bayesian parameter estimation over a spatial
//! grid, where neighbouring locations' estimates influence each other
//! through a coupled prior. The crate provides the spatial
//! regularization machinery: adjacency-graph construction from scattered
//! grid coordinates, a cache of distance-derived covariance/precision
//! matrices, numerical root finding for the smoothing-strength
//! hyperparameters, and the outer iteration loop that alternates
//! per-location posterior updates with spatial hyperparameter
//! re-estimation until convergence.
//!
//! The statistical forward model, the noise model (how the local
//! posterior update is computed), and the convergence policy are
//! *collaborators*: trait interfaces supplied by the caller. The engine
//! moves distributions and a scalar objective across them and owns
//! everything spatial in between.
//!
//! ## Prior families
//!
//! Each estimated parameter is assigned one spatial prior variant via a
//! one-character code:
//!
//! | Code | Variant                  | Family      | Estimated quantity        |
//! |------|--------------------------|-------------|---------------------------|
//! | `N`  | Nonspatial               | nonspatial  | —                         |
//! | `I`  | Image prior              | nonspatial  | — (per-location means)    |
//! | `A`  | ARD                      | nonspatial  | per-location relevance    |
//! | `m`  | MRF, Dirichlet bounds    | shrinkage   | `akmean`                  |
//! | `M`  | MRF, neighbour-weighted  | shrinkage   | `akmean`                  |
//! | `p`  | 2nd order, Dirichlet     | shrinkage   | `akmean`                  |
//! | `P`  | 2nd order, free bounds   | shrinkage   | `akmean`                  |
//! | `S`  | 2nd order, exact         | shrinkage   | `akmean`                  |
//! | `D`  | Smoothness               | evidence    | `delta`                   |
//! | `R`  | Smoothness + scale       | evidence    | `delta`, `rho`            |
//! | `F`  | Smoothness, fixed        | evidence    | — (fixed `delta`, `rho`)  |
//!
//! A single `+` repeats the preceding character to fill the parameter
//! count: `"NS+"` over four parameters expands to `"NSSS"`.
//!
//! ## Quick start
//!
//! A one-parameter model observed directly through Gaussian noise,
//! smoothed along a line of five locations:
//!
//! ```rust
//! use svb_rs::prelude::*;
//!
//! struct Direct;
//!
//! impl ForwardModel<f64> for Direct {
//!     fn num_params(&self) -> usize {
//!         1
//!     }
//!     fn initial_prior(&self) -> MvnDist<f64> {
//!         MvnDist::standard(1)
//!     }
//!     fn initial_posterior(&self) -> MvnDist<f64> {
//!         MvnDist::standard(1)
//!     }
//! }
//!
//! struct GaussianObs {
//!     data: Vec<f64>,
//!     noise_prec: f64,
//! }
//!
//! impl NoiseModel<f64> for GaussianObs {
//!     fn update_posterior(
//!         &mut self,
//!         voxel: usize,
//!         prior: &MvnDist<f64>,
//!         posterior: &mut MvnDist<f64>,
//!         _centre: &[f64],
//!         _without_prior: Option<&mut MvnDist<f64>>,
//!     ) -> Result<(), SvbError> {
//!         // Conjugate update: precisions add, means combine weighted.
//!         let p0 = prior.precisions().get(0, 0);
//!         let prec = p0 + self.noise_prec;
//!         let mean = (p0 * prior.means()[0] + self.noise_prec * self.data[voxel]) / prec;
//!         let mut m = SymMatrix::zeros(1);
//!         m.set(0, 0, prec);
//!         posterior.set_precisions(m);
//!         posterior.set_means(&[mean]);
//!         Ok(())
//!     }
//!
//!     fn calc_objective(
//!         &self,
//!         voxel: usize,
//!         _prior: &MvnDist<f64>,
//!         posterior: &MvnDist<f64>,
//!         _centre: &[f64],
//!     ) -> f64 {
//!         let r = posterior.means()[0] - self.data[voxel];
//!         -r * r
//!     }
//! }
//!
//! let coords: Vec<GridCoord> = (0..5).map(|x| [x, 0, 0]).collect();
//!
//! let mut engine = SpatialVb::new()
//!     .spatial_dims(1)
//!     .prior_spec("S")
//!     .build(&coords, &Direct)?;
//!
//! let mut noise = GaussianObs {
//!     data: vec![1.0, 1.1, 0.9, 1.0, 1.2],
//!     noise_prec: 10.0,
//! };
//! let mut conv = MaxIterations::new(4);
//!
//! let summary = engine.run(&mut noise, &mut conv)?;
//! assert_eq!(summary.iterations, 4);
//! assert!(summary.final_objective.is_finite());
//! # Result::<(), SvbError>::Ok(())
//! ```
//!
//! ## Error handling
//!
//! Setup problems (bad prior specs, mis-ordered coordinates,
//! out-of-range knobs) are configuration errors, returned from
//! `build()` and fatal. Internal-consistency faults (asymmetric
//! adjacency or derived matrices) abort the run with diagnostic
//! context. Numerical degeneracies — a singular covariance, an
//! exhausted root-finder budget — are recovered with a one-time warning
//! through the [`log`] facade and a best-effort value; large problem
//! sizes warn about O(N²) memory but never block execution.
//!
//! ## Cost model
//!
//! The distance matrix and every cached covariance matrix are O(N²)
//! memory; inversion is O(N³). The shrinkage family needs only the
//! adjacency graph and runs in O(N · neighbours) per iteration.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// ============================================================================
// Internal Modules
// ============================================================================

// Layer 1: Primitives - errors, warnings, coordinates, distributions.
mod primitives;

// Layer 2: Math - distances, symmetric matrices, root finding.
mod math;

// Layer 3: Algorithms - adjacency, covariance cache, prior variants.
mod algorithms;

// Layer 4: Engine - validation, collaborator traits, iteration loop.
mod engine;

// High-level fluent API.
mod api;

// ============================================================================
// Prelude
// ============================================================================

/// Standard prelude.
///
/// This module is intended to be wildcard-imported for convenient
/// access to the most commonly used types:
///
/// ```
/// use svb_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algorithms::covariance::CovarianceCache;
    pub use crate::algorithms::neighborhood::AdjacencyGraph;
    pub use crate::algorithms::priors::{PriorFamily, PriorType};
    pub use crate::api::SpatialVb;
    pub use crate::engine::executor::{RunSummary, SpatialPriorEngine};
    pub use crate::engine::model::{
        ConvergenceCheck, ForwardModel, MaxIterations, NoiseModel, ObjectiveChange,
    };
    pub use crate::math::distance::DistanceMetric::{
        self, Euclidean, Manhattan, NearSquaredEuclidean,
    };
    pub use crate::math::linalg::{FloatLinalg, SymMatrix};
    pub use crate::math::rootfind::{
        BisectionGuesstimator, DescendingZeroFinder, FnCrossing, Guesstimator,
        LogBisectionGuesstimator, ZeroCrossing,
    };
    pub use crate::primitives::dist::MvnDist;
    pub use crate::primitives::errors::SvbError;
    pub use crate::primitives::grid::GridCoord;
}

// ============================================================================
// Testing re-exports
// ============================================================================

/// Internal modules for development and testing.
///
/// This module re-exports internal modules for development and testing
/// purposes. It is only available with the `dev` feature enabled.
///
/// **Warning**: These are internal implementation details and may change
/// without notice. Do not use in production code.
#[cfg(feature = "dev")]
pub mod internals {
    /// Internal primitive types and utilities.
    pub mod primitives {
        pub use crate::primitives::*;
    }
    /// Internal math functions.
    pub mod math {
        pub use crate::math::*;
    }
    /// Internal core algorithms.
    pub mod algorithms {
        pub use crate::algorithms::*;
    }
    /// Internal execution engine.
    pub mod engine {
        pub use crate::engine::*;
    }
    /// Internal API.
    pub mod api {
        pub use crate::api::*;
    }
}
