//! Distance metrics and the pairwise distance matrix.
//!
//! ## Purpose
//!
//! This module provides distance computation between physical voxel
//! positions and the symmetric N x N distance matrix that the covariance
//! cache is built on. The matrix is built once per run from the
//! immutable coordinate list and never mutated afterwards.
//!
//! ## Design notes
//!
//! * **Decoupling**: Distance calculation is separated from the
//!   covariance kernel (`exp(-0.5 * d / delta)`), which lives in the
//!   covariance cache.
//! * **Memory**: The matrix is O(N^2); a one-time warning is issued for
//!   large N rather than refusing to run.
//!
//! ## Key concepts
//!
//! * **NearSquaredEuclidean**: the squared Euclidean distance raised to
//!   0.995 — close enough to the true square for smoothing purposes
//!   while keeping the covariance kernel strictly decreasing and
//!   invertible on regular grids.
//!
//! ## Invariants
//!
//! * Distances are non-negative and zero on the diagonal.
//! * The matrix is exactly symmetric by construction.
//!
//! ## Non-goals
//!
//! * This module does not choose the smoothing scale (see
//!   `algorithms::covariance`).

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::linalg::{FloatLinalg, SymMatrix};
use crate::warn_once;

/// Issue the memory warning above this many locations.
const MEMORY_WARNING_LOCATIONS: usize = 7500;

// ============================================================================
// Distance Metric Enum
// ============================================================================

/// Distance metric for pairwise voxel distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Absolute Euclidean distance.
    #[default]
    Euclidean,

    /// Almost-squared Euclidean distance: `(dx^2 + dy^2 + dz^2)^0.995`.
    NearSquaredEuclidean,

    /// Manhattan distance: `|dx| + |dy| + |dz|`.
    Manhattan,
}

impl DistanceMetric {
    /// Distance between two physical positions under this metric.
    #[inline]
    pub fn distance<T: Float>(&self, a: &[T; 3], b: &[T; 3]) -> T {
        let dx = a[0] - b[0];
        let dy = a[1] - b[1];
        let dz = a[2] - b[2];
        match self {
            DistanceMetric::Euclidean => (dx * dx + dy * dy + dz * dz).sqrt(),
            DistanceMetric::NearSquaredEuclidean => {
                let p = T::from(0.995).unwrap_or_else(T::one);
                (dx * dx + dy * dy + dz * dz).powf(p)
            }
            DistanceMetric::Manhattan => dx.abs() + dy.abs() + dz.abs(),
        }
    }
}

// ============================================================================
// Distance Matrix
// ============================================================================

/// Build the symmetric pairwise distance matrix for the given positions.
///
/// Cost warning: the result is O(N^2) memory, and the covariance cache
/// stores further matrices of the same size. Above a few thousand
/// locations a one-time warning is logged; execution is never blocked.
pub fn distance_matrix<T: FloatLinalg>(
    positions: &[[T; 3]],
    metric: DistanceMetric,
) -> SymMatrix<T> {
    let n = positions.len();

    if n > MEMORY_WARNING_LOCATIONS {
        warn_once!(
            "distance matrix for {} locations needs roughly {} GB; \
             covariance matrices of the same size will be inverted",
            n,
            2.5 * (n as f64) * (n as f64) * 8.0 / 1e9
        );
    }

    let mut m = SymMatrix::zeros(n);
    for a in 0..n {
        for b in 0..=a {
            m.set(a, b, metric.distance(&positions[a], &positions[b]));
        }
    }
    m
}
