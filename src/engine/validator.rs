//! Input validation for spatial VB configuration.
//!
//! ## Purpose
//!
//! This module provides fail-fast validation for the configuration
//! surface and run inputs: dimensionality, prior-type strings, rate
//! limits, evaluation budgets, image-prior shapes, and coordinate
//! ordering. Every check returns `Result<(), SvbError>` and stops at
//! the first violation.
//!
//! ## Design notes
//!
//! * **Fail-Fast**: configuration errors are fatal at setup and never
//!   retried.
//! * **Efficiency**: checks are ordered from cheap to expensive; the
//!   O(N) coordinate scan runs last.
//!
//! ## Non-goals
//!
//! * This module does not correct invalid input and does not build any
//!   run state.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::algorithms::priors::PriorType;
use crate::primitives::errors::SvbError;
use crate::primitives::grid::{self, GridCoord};
use crate::warn_once;

// ============================================================================
// Validator
// ============================================================================

/// Validation utility for spatial VB configuration and inputs.
pub struct Validator;

impl Validator {
    /// Validate the spatial dimensionality.
    ///
    /// 1 and 2 are permitted but unusual enough to warrant a warning:
    /// one-dimensional runs are essentially test rigs, and
    /// two-dimensional runs do not decompose a 3-D volume into slices.
    pub fn validate_spatial_dims(dims: usize) -> Result<(), SvbError> {
        if !(1..=3).contains(&dims) {
            return Err(SvbError::InvalidSpatialDims(dims));
        }
        if dims == 1 {
            warn_once!("spatial dims = 1: expecting a test configuration");
        } else if dims == 2 {
            warn_once!("spatial dims = 2: volumes are not decomposed into slices");
        }
        Ok(())
    }

    /// Validate the rate-limit ceiling, if configured.
    pub fn validate_rate_ceiling<T: Float>(ceiling: Option<T>) -> Result<(), SvbError> {
        if let Some(c) = ceiling {
            if !(c > T::one()) {
                return Err(SvbError::InvalidRateLimit(c.to_f64().unwrap_or(f64::NAN)));
            }
        }
        Ok(())
    }

    /// Validate the smoothing-scale search budget.
    pub fn validate_delta_evaluations(n: usize) -> Result<(), SvbError> {
        if n == 0 {
            return Err(SvbError::InvalidEvaluationBudget(n));
        }
        Ok(())
    }

    /// Validate the smoothing-scale bracket tolerance.
    pub fn validate_delta_tolerance<T: Float>(tol: T) -> Result<(), SvbError> {
        if !(tol > T::one()) {
            return Err(SvbError::InvalidTolerance(tol.to_f64().unwrap_or(f64::NAN)));
        }
        Ok(())
    }

    /// A fixed-smoothness prior requires an explicit delta.
    pub fn validate_fixed_delta<T: Float>(
        types: &[PriorType],
        fixed_delta: Option<T>,
    ) -> Result<(), SvbError> {
        if types.contains(&PriorType::SmoothnessFixed) && fixed_delta.is_none() {
            return Err(SvbError::MissingFixedDelta);
        }
        Ok(())
    }

    /// Every image-prior parameter needs per-location means of the right
    /// length.
    pub fn validate_image_priors<T: Float>(
        types: &[PriorType],
        images: &[Option<Vec<T>>],
        n_voxels: usize,
    ) -> Result<(), SvbError> {
        for (k, t) in types.iter().enumerate() {
            if *t != PriorType::Image {
                continue;
            }
            let got = images
                .get(k)
                .and_then(|img| img.as_ref())
                .map(|img| img.len())
                .unwrap_or(0);
            if got != n_voxels {
                return Err(SvbError::ImagePriorLength {
                    param: k,
                    expected: n_voxels,
                    got,
                });
            }
        }
        Ok(())
    }

    /// A locked linearization must carry one centre per location, each
    /// of parameter length.
    pub fn validate_locked_linearization<T: Float>(
        locked: &Option<Vec<Vec<T>>>,
        n_voxels: usize,
        n_params: usize,
    ) -> Result<(), SvbError> {
        if let Some(centres) = locked {
            if centres.len() != n_voxels {
                return Err(SvbError::LockedLinearizationShape {
                    expected: n_voxels,
                    got: centres.len(),
                });
            }
            for c in centres {
                if c.len() != n_params {
                    return Err(SvbError::MismatchedParams {
                        expected: n_params,
                        got: c.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Coordinates must be non-empty and (z, y, x)-ordered.
    pub fn validate_coordinates(coords: &[GridCoord]) -> Result<(), SvbError> {
        if coords.is_empty() {
            return Err(SvbError::EmptyCoordinates);
        }
        if let Some(index) = grid::first_unordered(coords) {
            return Err(SvbError::UnorderedCoordinates { index });
        }
        Ok(())
    }
}
