//! High-level API for spatially regularized VB estimation.
//!
//! ## Purpose
//!
//! This module provides the primary user-facing entry point: a fluent
//! builder (`SpatialVb`) for configuring the spatial machinery and
//! constructing a ready-to-run [`SpatialPriorEngine`].
//!
//! ## Design notes
//!
//! * **Ergonomic**: every knob is optional with a documented default;
//!   only the pieces that differ from the defaults need to be spelled
//!   out.
//! * **Validated**: all configuration is checked when `build()` is
//!   called; errors are configuration errors and fatal.
//! * **Collaborator-driven**: the forward model fixes the parameter
//!   space at build time; the noise model and convergence policy are
//!   supplied per run.
//!
//! ## Key concepts
//!
//! * **Prior spec**: one character per parameter from the closed
//!   alphabet `N I A m M p P S D R F`, with a single `+` repeating the
//!   preceding character to fill the parameter count.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::string::ToString;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::string::String;
#[cfg(feature = "std")]
use std::vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// Internal dependencies
use crate::algorithms::priors::{parse_prior_spec, PriorFamily, PriorType};
use crate::engine::executor::{EngineConfig, SpatialPriorEngine};
use crate::engine::model::ForwardModel;
use crate::engine::validator::Validator;
use crate::math::distance::DistanceMetric;
use crate::math::linalg::FloatLinalg;
use crate::primitives::errors::SvbError;
use crate::primitives::grid::GridCoord;

// Publicly re-exported types
pub use crate::engine::executor::RunSummary;
pub use crate::engine::model::{ConvergenceCheck, ForwardModel as Model, NoiseModel};

// ============================================================================
// Builder
// ============================================================================

/// Fluent builder for the spatial VB engine.
///
/// Defaults: 3 spatial dimensions, Euclidean distances, unit voxels,
/// prior spec `"S+"`, initial smoothing scale 0.5, no rate limiting,
/// 10 extra smoothing-scale evaluations, covariance retention on, and
/// objective evaluation on. Evidence optimization defaults to on
/// exactly when an evidence-family prior (`D`/`R`) is present.
#[derive(Debug, Clone)]
pub struct SpatialVb<T> {
    spatial_dims: usize,
    distance_metric: DistanceMetric,
    voxel_dims: [T; 3],
    prior_spec: String,
    fixed_delta: Option<T>,
    fixed_rho: Option<T>,
    rate_ceiling: Option<T>,
    delta_evaluations: usize,
    delta_tolerance: Option<T>,
    update_on_first_iteration: bool,
    evidence_optimization: Option<bool>,
    evidence_posterior_update: Option<bool>,
    retain_covariance: bool,
    evaluate_objective: bool,
    image_priors: Vec<(usize, Vec<T>)>,
    locked_linearization: Option<Vec<Vec<T>>>,
}

impl<T: FloatLinalg> Default for SpatialVb<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatLinalg> SpatialVb<T> {
    /// Builder with all defaults.
    pub fn new() -> Self {
        Self {
            spatial_dims: 3,
            distance_metric: DistanceMetric::Euclidean,
            voxel_dims: [T::one(); 3],
            prior_spec: "S+".to_string(),
            fixed_delta: None,
            fixed_rho: None,
            rate_ceiling: None,
            delta_evaluations: 10,
            delta_tolerance: None,
            update_on_first_iteration: false,
            evidence_optimization: None,
            evidence_posterior_update: None,
            retain_covariance: true,
            evaluate_objective: true,
            image_priors: Vec::new(),
            locked_linearization: None,
        }
    }

    /// Spatial dimensionality (1..=3). Default: 3.
    pub fn spatial_dims(mut self, dims: usize) -> Self {
        self.spatial_dims = dims;
        self
    }

    /// Distance metric for the covariance prior. Default: Euclidean.
    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    /// Physical voxel size along each axis (mm). Default: unit voxels.
    pub fn voxel_dims(mut self, dims: [T; 3]) -> Self {
        self.voxel_dims = dims;
        self
    }

    /// Prior-type string, one character per parameter with optional `+`
    /// repetition. Default: `"S+"`.
    pub fn prior_spec(mut self, spec: &str) -> Self {
        self.prior_spec = spec.to_string();
        self
    }

    /// Fixed smoothing scale: required by `F` priors and used as the
    /// initial scale for every evidence-family search. Default: 0.5.
    pub fn fixed_delta(mut self, delta: T) -> Self {
        self.fixed_delta = Some(delta);
        self
    }

    /// Fixed log-scale factor for `F` priors. Default: 0.
    pub fn fixed_rho(mut self, rho: T) -> Self {
        self.fixed_rho = Some(rho);
        self
    }

    /// Per-iteration multiplicative growth ceiling on `akmean` and
    /// `delta` (must be > 1). Default: unlimited.
    pub fn rate_ceiling(mut self, ceiling: T) -> Self {
        self.rate_ceiling = Some(ceiling);
        self
    }

    /// Extra evaluations granted to each smoothing-scale search.
    /// Default: 10.
    pub fn delta_evaluations(mut self, n: usize) -> Self {
        self.delta_evaluations = n;
        self
    }

    /// Relative bracket tolerance for the smoothing-scale search (must
    /// be > 1; e.g. 1.01 stops at 1% bracket width). Default: 1.01.
    pub fn delta_tolerance(mut self, tol: T) -> Self {
        self.delta_tolerance = Some(tol);
        self
    }

    /// Run hyperparameter updates on the first iteration as well.
    /// Default: off.
    pub fn update_on_first_iteration(mut self, enabled: bool) -> Self {
        self.update_on_first_iteration = enabled;
        self
    }

    /// Estimate smoothing scales from the marginal evidence instead of
    /// the variational objective. Default: on when `D`/`R` present.
    pub fn evidence_optimization(mut self, enabled: bool) -> Self {
        self.evidence_optimization = Some(enabled);
        self
    }

    /// Re-estimate posteriors from the evidence marginal after each
    /// noise-model update. Default: follows `evidence_optimization`.
    pub fn evidence_posterior_update(mut self, enabled: bool) -> Self {
        self.evidence_posterior_update = Some(enabled);
        self
    }

    /// Keep covariance matrices cached across evaluations; disable to
    /// bound memory at the cost of recomputation. Default: on.
    pub fn retain_covariance(mut self, retain: bool) -> Self {
        self.retain_covariance = retain;
        self
    }

    /// Evaluate the per-location objective each iteration. Disable when
    /// the convergence policy ignores it. Default: on.
    pub fn evaluate_objective(mut self, enabled: bool) -> Self {
        self.evaluate_objective = enabled;
        self
    }

    /// Per-location prior means for an `I` parameter.
    pub fn image_prior(mut self, param: usize, means: Vec<T>) -> Self {
        self.image_priors.push((param, means));
        self
    }

    /// Fix every location's linearization centre, disabling
    /// re-centering.
    pub fn locked_linearization(mut self, centres: Vec<Vec<T>>) -> Self {
        self.locked_linearization = Some(centres);
        self
    }

    /// Validate the configuration and assemble the engine.
    pub fn build<F: ForwardModel<T>>(
        self,
        coords: &[GridCoord],
        model: &F,
    ) -> Result<SpatialPriorEngine<T>, SvbError> {
        Validator::validate_spatial_dims(self.spatial_dims)?;
        Validator::validate_rate_ceiling(self.rate_ceiling)?;
        Validator::validate_delta_evaluations(self.delta_evaluations)?;
        let delta_tolerance = self
            .delta_tolerance
            .unwrap_or_else(|| T::from(1.01).unwrap_or_else(T::one));
        Validator::validate_delta_tolerance(delta_tolerance)?;
        Validator::validate_coordinates(coords)?;

        let n_params = model.num_params();
        let prior_types = parse_prior_spec(&self.prior_spec, n_params)?;
        Validator::validate_fixed_delta(&prior_types, self.fixed_delta)?;

        let mut image_priors: Vec<Option<Vec<T>>> = vec![None; n_params];
        for (param, means) in self.image_priors {
            if param >= n_params {
                return Err(SvbError::MismatchedParams {
                    expected: n_params,
                    got: param + 1,
                });
            }
            image_priors[param] = Some(means);
        }
        Validator::validate_image_priors(&prior_types, &image_priors, coords.len())?;
        Validator::validate_locked_linearization(
            &self.locked_linearization,
            coords.len(),
            n_params,
        )?;

        let has_free_evidence = prior_types.iter().any(|t| {
            t.family() == PriorFamily::Evidence && *t != PriorType::SmoothnessFixed
        });
        let evidence_optimization = self.evidence_optimization.unwrap_or(has_free_evidence);
        let evidence_posterior_update = self
            .evidence_posterior_update
            .unwrap_or(evidence_optimization);

        let half = T::from(0.5).unwrap_or_else(T::one);
        let cfg = EngineConfig {
            spatial_dims: self.spatial_dims,
            distance_metric: self.distance_metric,
            voxel_dims: self.voxel_dims,
            prior_types,
            initial_delta: self.fixed_delta.unwrap_or(half),
            fixed_rho: self.fixed_rho.unwrap_or_else(T::zero),
            rate_ceiling: self.rate_ceiling,
            delta_evaluations: self.delta_evaluations,
            delta_tolerance,
            update_on_first_iteration: self.update_on_first_iteration,
            evidence_optimization,
            evidence_posterior_update,
            retain_covariance: self.retain_covariance,
            evaluate_objective: self.evaluate_objective,
            image_priors,
            locked_linearization: self.locked_linearization,
        };

        SpatialPriorEngine::from_parts(cfg, coords, model)
    }
}
