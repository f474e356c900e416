//! Multivariate normal distribution state for one location.
//!
//! ## Purpose
//!
//! `MvnDist` is the per-location prior/posterior representation: a mean
//! vector and a symmetric precision matrix over the estimated
//! parameters. The engine rebuilds priors from it every iteration and
//! the noise-model collaborator reads and writes posteriors through it.
//!
//! ## Design notes
//!
//! * **Precision-primary**: the precision matrix is the stored form
//!   (the spatial machinery works in precisions); covariance is derived
//!   on demand through the linalg backend. The matrices involved are
//!   small (`k x k` for `k` model parameters), so re-inversion is cheap.
//!
//! ## Invariants
//!
//! * `means.len() == precisions.n()` at all times.
//!
//! ## Non-goals
//!
//! * This module does not implement distribution arithmetic beyond the
//!   precision/covariance conversions the engine needs.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// Internal dependencies
use crate::math::linalg::{FloatLinalg, SymMatrix};
use crate::primitives::errors::SvbError;

// ============================================================================
// MvnDist
// ============================================================================

/// Mean vector plus symmetric precision matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MvnDist<T> {
    means: Vec<T>,
    precisions: SymMatrix<T>,
}

impl<T: FloatLinalg> MvnDist<T> {
    /// Standard normal of dimension `k`: zero mean, identity precision.
    pub fn standard(k: usize) -> Self {
        Self {
            means: vec![T::zero(); k],
            precisions: SymMatrix::identity(k),
        }
    }

    /// Build from a mean vector and precision matrix.
    pub fn from_mean_precisions(means: Vec<T>, precisions: SymMatrix<T>) -> Result<Self, SvbError> {
        if means.len() != precisions.n() {
            return Err(SvbError::MismatchedParams {
                expected: precisions.n(),
                got: means.len(),
            });
        }
        Ok(Self { means, precisions })
    }

    /// Number of parameters.
    #[inline]
    pub fn dim(&self) -> usize {
        self.means.len()
    }

    /// Mean vector.
    #[inline]
    pub fn means(&self) -> &[T] {
        &self.means
    }

    /// Replace the mean vector.
    pub fn set_means(&mut self, means: &[T]) {
        debug_assert_eq!(means.len(), self.means.len());
        self.means.copy_from_slice(means);
    }

    /// Precision matrix.
    #[inline]
    pub fn precisions(&self) -> &SymMatrix<T> {
        &self.precisions
    }

    /// Replace the precision matrix.
    pub fn set_precisions(&mut self, precisions: SymMatrix<T>) {
        debug_assert_eq!(precisions.n(), self.means.len());
        self.precisions = precisions;
    }

    /// Store a covariance matrix (inverted on entry).
    pub fn set_covariance(&mut self, covariance: &SymMatrix<T>) -> Result<(), SvbError> {
        self.precisions = covariance.inverse().ok_or(SvbError::SingularMatrix {
            size: covariance.n(),
        })?;
        Ok(())
    }

    /// Covariance matrix (inverse of the stored precisions).
    pub fn covariance(&self) -> Result<SymMatrix<T>, SvbError> {
        self.precisions.inverse().ok_or(SvbError::SingularMatrix {
            size: self.precisions.n(),
        })
    }

    /// Marginal variance of parameter `k` (diagonal of the covariance).
    pub fn marginal_variance(&self, k: usize) -> Result<T, SvbError> {
        Ok(self.covariance()?.get(k, k))
    }
}
