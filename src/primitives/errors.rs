//! Error types for spatial VB configuration, consistency, and numerics.
//!
//! ## Purpose
//!
//! This module defines the crate-wide error enum (`SvbError`) used by all
//! fallible operations. Errors fall into three classes with different
//! handling contracts:
//!
//! * **Configuration errors** — invalid user input (bad prior spec,
//!   mis-ordered coordinates, out-of-range knobs). Reported at setup,
//!   fatal to the run, never retried.
//! * **Internal-consistency faults** — logic defects (asymmetric
//!   adjacency, asymmetric derived matrices). Fatal with diagnostic
//!   context; never user-triggered.
//! * **Numerical failures** — conditions that are normally recovered
//!   from with a warning and a best-effort fallback; they only surface
//!   as errors where no fallback exists.
//!
//! ## Design notes
//!
//! * **Structured**: Variants carry the offending values for diagnostics.
//! * **no_std compatible**: `std::error::Error` is feature-gated.
//!
//! ## Non-goals
//!
//! * This module does not decide recovery policy (callers do).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;

use core::fmt;

// ============================================================================
// Error Enum
// ============================================================================

/// Errors produced during spatial VB setup and execution.
#[derive(Debug, Clone, PartialEq)]
pub enum SvbError {
    /// The coordinate list is empty.
    EmptyCoordinates,

    /// Coordinates are not sorted ascending by (z, y, x).
    /// `index` is the first position whose successor is out of order.
    UnorderedCoordinates {
        /// First position whose successor is out of order.
        index: usize,
    },

    /// Spatial dimensionality outside the supported 1..=3 range.
    InvalidSpatialDims(usize),

    /// A prior-type character outside the known alphabet.
    UnknownPriorCode(char),

    /// The expanded prior-type string does not match the parameter count.
    PriorSpecLength {
        /// Number of parameters the model expects.
        expected: usize,
        /// Number of parameters the prior-type string specifies.
        got: usize,
    },

    /// More than one `+` repetition marker in a prior-type string.
    MultipleRepeatMarkers(String),

    /// Two different shrinkage-family prior types in one run.
    MixedShrinkagePriors {
        /// The first shrinkage prior code encountered.
        first: char,
        /// The conflicting second shrinkage prior code.
        second: char,
    },

    /// A fixed-smoothness prior was requested without a fixed delta value.
    MissingFixedDelta,

    /// The per-iteration precision growth ceiling must exceed 1.
    InvalidRateLimit(f64),

    /// The root-finder evaluation budget must be positive.
    InvalidEvaluationBudget(usize),

    /// The root-finder bracket tolerance must exceed 1.
    InvalidTolerance(f64),

    /// An image prior was supplied with the wrong number of voxels.
    ImagePriorLength {
        /// Index of the parameter whose image prior was supplied.
        param: usize,
        /// Number of voxels expected.
        expected: usize,
        /// Number of voxels actually supplied.
        got: usize,
    },

    /// A locked linearization was supplied with the wrong shape.
    LockedLinearizationShape {
        /// Number of centres expected.
        expected: usize,
        /// Number of centres actually supplied.
        got: usize,
    },

    /// A per-location distribution has the wrong number of parameters.
    MismatchedParams {
        /// Number of parameters expected.
        expected: usize,
        /// Number of parameters the distribution actually has.
        got: usize,
    },

    /// First-order adjacency failed to be symmetric: `neighbour` does not
    /// list `voxel` among its own neighbours. Indicates an offset/index
    /// logic defect, not bad input.
    AsymmetricAdjacency {
        /// The voxel whose neighbour relation is not reciprocated.
        voxel: usize,
        /// The neighbour that fails to list `voxel` in turn.
        neighbour: usize,
    },

    /// A derived matrix exceeded the symmetry tolerance.
    AsymmetricMatrix {
        /// Largest absolute asymmetry found between mirrored entries.
        max_error: f64,
        /// Largest absolute entry value, for scaling the error.
        max_value: f64,
    },

    /// A matrix inversion failed where no fallback value exists.
    SingularMatrix {
        /// Dimension of the square matrix that could not be inverted.
        size: usize,
    },
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for SvbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvbError::EmptyCoordinates => {
                write!(f, "coordinate list is empty")
            }
            SvbError::UnorderedCoordinates { index } => write!(
                f,
                "coordinates must be sorted ascending by (z, y, x); \
                 entries {} and {} are out of order",
                index,
                index + 1
            ),
            SvbError::InvalidSpatialDims(dims) => {
                write!(f, "spatial dimensions must be 1, 2, or 3 (got {})", dims)
            }
            SvbError::UnknownPriorCode(c) => {
                write!(f, "unknown spatial prior type '{}'", c)
            }
            SvbError::PriorSpecLength { expected, got } => write!(
                f,
                "prior-type string specifies {} parameters, but the model has {}",
                got, expected
            ),
            SvbError::MultipleRepeatMarkers(spec) => write!(
                f,
                "prior-type string '{}' has more than one '+' repeat marker",
                spec
            ),
            SvbError::MixedShrinkagePriors { first, second } => write!(
                f,
                "only one shrinkage prior type per run: found '{}' and '{}'",
                first, second
            ),
            SvbError::MissingFixedDelta => {
                write!(f, "prior type 'F' requires a fixed delta value")
            }
            SvbError::InvalidRateLimit(v) => {
                write!(f, "rate-limit ceiling must be > 1 (got {})", v)
            }
            SvbError::InvalidEvaluationBudget(n) => {
                write!(f, "evaluation budget must be positive (got {})", n)
            }
            SvbError::InvalidTolerance(v) => {
                write!(f, "bracket tolerance must be > 1 (got {})", v)
            }
            SvbError::ImagePriorLength {
                param,
                expected,
                got,
            } => write!(
                f,
                "image prior for parameter {} has {} voxels, expected {}",
                param, got, expected
            ),
            SvbError::LockedLinearizationShape { expected, got } => write!(
                f,
                "locked linearization has {} centres, expected {}",
                got, expected
            ),
            SvbError::MismatchedParams { expected, got } => write!(
                f,
                "distribution has {} parameters, expected {}",
                got, expected
            ),
            SvbError::AsymmetricAdjacency { voxel, neighbour } => write!(
                f,
                "internal: voxel {} lists neighbour {}, but the relation is \
                 not symmetric",
                voxel, neighbour
            ),
            SvbError::AsymmetricMatrix {
                max_error,
                max_value,
            } => write!(
                f,
                "internal: derived matrix not symmetric (max error {:e}, \
                 max value {:e})",
                max_error, max_value
            ),
            SvbError::SingularMatrix { size } => {
                write!(f, "{}x{} matrix inversion failed", size, size)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SvbError {}

impl SvbError {
    /// True for errors caused by invalid user configuration.
    #[inline]
    pub fn is_config(&self) -> bool {
        !self.is_internal() && !matches!(self, SvbError::SingularMatrix { .. })
    }

    /// True for internal-consistency faults (logic defects).
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SvbError::AsymmetricAdjacency { .. } | SvbError::AsymmetricMatrix { .. }
        )
    }
}
