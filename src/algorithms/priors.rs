//! Spatial prior types and second-order precision assembly.
//!
//! ## Purpose
//!
//! This module defines the closed set of per-parameter spatial prior
//! variants, parses the one-character-per-parameter configuration
//! string (including its `+` repetition shorthand), and assembles the
//! second-order precision structures that the shrinkage family needs.
//!
//! ## Design notes
//!
//! * **Closed enumeration**: the variants are a tagged enum rather than
//!   raw character codes, so every dispatch over them is exhaustive and
//!   compiler-checked; the characters survive only at the parsing
//!   boundary.
//! * **One shrinkage variant per run**: the shrinkage update shares a
//!   single `akmean` structure across parameters; mixing variants has
//!   no meaningful semantics and is rejected at setup.
//!
//! ## Key concepts
//!
//! * **Shrinkage family** — a single global scalar per parameter
//!   (`akmean`) controls how strongly neighbouring estimates pull
//!   together; estimated in closed form from the adjacency graph.
//! * **Evidence family** — smoothing scale `delta` (and optionally a
//!   log-scale `rho`) estimated per parameter through the covariance
//!   cache, or held fixed.
//!
//! ## Invariants
//!
//! * `StS` equals the square of the weighted graph Laplacian
//!   `(eps * I + L)^2`; the duplicate multiplicity of second-order
//!   neighbour lists is load-bearing here.
//!
//! ## Non-goals
//!
//! * Hyperparameter estimation itself (see `engine::hyperparams`).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::algorithms::neighborhood::AdjacencyGraph;
use crate::math::linalg::{FloatLinalg, SymMatrix};
use crate::primitives::errors::SvbError;

/// Diagonal weight that keeps the second-order Laplacian invertible and
/// isolated locations weakly pulled to zero.
pub(crate) const STS_DIAGONAL_WEIGHT: f64 = 1e-6;

// ============================================================================
// Prior Families and Types
// ============================================================================

/// Which update path a prior variant takes through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorFamily {
    /// Fixed global prior; the spatial graph is bypassed entirely.
    Nonspatial,
    /// Neighbour-coupled prior driven by a global `akmean` scalar.
    Shrinkage,
    /// Covariance-based prior driven by `delta` (and optionally `rho`).
    Evidence,
}

/// Per-parameter spatial prior variant.
///
/// The character codes are the configuration surface; everything else
/// dispatches on the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorType {
    /// `N` — fixed global prior, no spatial coupling.
    Nonspatial,
    /// `I` — fixed global precision with per-location prior means
    /// supplied as an image.
    Image,
    /// `A` — automatic relevance determination: precision re-estimated
    /// from the location's own posterior each iteration.
    Ard,
    /// `m` — first-order Markov random field with Dirichlet boundaries
    /// (boundary locations behave as if fully surrounded).
    MrfDirichlet,
    /// `M` — first-order Markov random field weighted by the actual
    /// neighbour count.
    Mrf,
    /// `p` — second-order field with Dirichlet boundary counts.
    SecondOrderDirichlet,
    /// `P` — second-order field with free boundaries.
    SecondOrder,
    /// `S` — exact second-order field via the squared weighted
    /// Laplacian.
    SecondOrderExact,
    /// `D` — covariance prior, smoothing scale estimated by evidence
    /// optimization.
    Smoothness,
    /// `R` — covariance prior, smoothing scale and log-scale factor
    /// both estimated.
    SmoothnessScaled,
    /// `F` — covariance prior with fixed smoothing scale and log-scale.
    SmoothnessFixed,
}

impl PriorType {
    /// Parse a single prior-type character.
    pub fn from_code(c: char) -> Result<Self, SvbError> {
        Ok(match c {
            'N' => PriorType::Nonspatial,
            'I' => PriorType::Image,
            'A' => PriorType::Ard,
            'm' => PriorType::MrfDirichlet,
            'M' => PriorType::Mrf,
            'p' => PriorType::SecondOrderDirichlet,
            'P' => PriorType::SecondOrder,
            'S' => PriorType::SecondOrderExact,
            'D' => PriorType::Smoothness,
            'R' => PriorType::SmoothnessScaled,
            'F' => PriorType::SmoothnessFixed,
            other => return Err(SvbError::UnknownPriorCode(other)),
        })
    }

    /// The configuration character for this variant.
    pub fn code(&self) -> char {
        match self {
            PriorType::Nonspatial => 'N',
            PriorType::Image => 'I',
            PriorType::Ard => 'A',
            PriorType::MrfDirichlet => 'm',
            PriorType::Mrf => 'M',
            PriorType::SecondOrderDirichlet => 'p',
            PriorType::SecondOrder => 'P',
            PriorType::SecondOrderExact => 'S',
            PriorType::Smoothness => 'D',
            PriorType::SmoothnessScaled => 'R',
            PriorType::SmoothnessFixed => 'F',
        }
    }

    /// Which engine path this variant takes.
    pub fn family(&self) -> PriorFamily {
        match self {
            PriorType::Nonspatial | PriorType::Image | PriorType::Ard => PriorFamily::Nonspatial,
            PriorType::MrfDirichlet
            | PriorType::Mrf
            | PriorType::SecondOrderDirichlet
            | PriorType::SecondOrder
            | PriorType::SecondOrderExact => PriorFamily::Shrinkage,
            PriorType::Smoothness | PriorType::SmoothnessScaled | PriorType::SmoothnessFixed => {
                PriorFamily::Evidence
            }
        }
    }

    /// True for variants that need the adjacency graph.
    #[inline]
    pub fn needs_graph(&self) -> bool {
        self.family() == PriorFamily::Shrinkage
    }

    /// True for variants that need the distance matrix / covariance
    /// cache.
    #[inline]
    pub fn needs_cache(&self) -> bool {
        self.family() == PriorFamily::Evidence
    }

    /// Per-location spatial precision weight for the shrinkage family:
    /// the multiplier applied to `akmean` for a location with `nn`
    /// first-order neighbours. Also the trace weight of the shrinkage
    /// hyperparameter update.
    pub fn shrinkage_precision_weight<T: Float>(&self, nn: usize, dims: usize) -> T {
        let nn_t = T::from(nn).unwrap_or_else(T::zero);
        let dims_t = T::from(dims).unwrap_or_else(T::one);
        let two = T::from(2.0).unwrap_or_else(T::one);
        let four = two * two;
        match self {
            PriorType::MrfDirichlet => dims_t * two,
            PriorType::Mrf => nn_t + T::from(1e-8).unwrap_or_else(T::epsilon),
            PriorType::SecondOrderDirichlet => four * dims_t * dims_t + nn_t,
            PriorType::SecondOrder => nn_t * nn_t + nn_t,
            PriorType::SecondOrderExact => {
                let eps = T::from(STS_DIAGONAL_WEIGHT).unwrap_or_else(T::epsilon);
                (nn_t + eps) * (nn_t + eps) + nn_t
            }
            _ => T::zero(),
        }
    }
}

// ============================================================================
// Prior-Spec Parsing
// ============================================================================

/// Parse a prior-type string into one variant per parameter.
///
/// A single `+` repeats the character before it until the string covers
/// all parameters: `"NS+"` with four parameters expands to `"NSSS"`,
/// `"NS+D"` to `"NSSD"`.
pub fn parse_prior_spec(spec: &str, n_params: usize) -> Result<Vec<PriorType>, SvbError> {
    let chars: Vec<char> = spec.chars().collect();
    let plus_positions: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, &c)| c == '+')
        .map(|(i, _)| i)
        .collect();

    let expanded: Vec<char> = match plus_positions.as_slice() {
        [] => chars,
        [pos] => {
            let pos = *pos;
            if pos == 0 {
                return Err(SvbError::UnknownPriorCode('+'));
            }
            let before = &chars[..pos - 1];
            let repeat = chars[pos - 1];
            let after = &chars[pos + 1..];
            let fixed = before.len() + after.len();
            if fixed > n_params {
                return Err(SvbError::PriorSpecLength {
                    expected: n_params,
                    got: fixed,
                });
            }
            let mut out = Vec::with_capacity(n_params);
            out.extend_from_slice(before);
            out.extend(core::iter::repeat(repeat).take(n_params - fixed));
            out.extend_from_slice(after);
            out
        }
        _ => return Err(SvbError::MultipleRepeatMarkers(String::from(spec))),
    };

    if expanded.len() != n_params {
        return Err(SvbError::PriorSpecLength {
            expected: n_params,
            got: expanded.len(),
        });
    }

    let types: Vec<PriorType> = expanded
        .into_iter()
        .map(PriorType::from_code)
        .collect::<Result<_, _>>()?;

    // Only one shrinkage variant per run.
    let mut shrinkage: Option<PriorType> = None;
    for t in &types {
        if t.family() == PriorFamily::Shrinkage {
            match shrinkage {
                None => shrinkage = Some(*t),
                Some(existing) if existing != *t => {
                    return Err(SvbError::MixedShrinkagePriors {
                        first: existing.code(),
                        second: t.code(),
                    })
                }
                _ => {}
            }
        }
    }

    Ok(types)
}

/// The single shrinkage variant used in a run, if any.
pub fn shrinkage_variant(types: &[PriorType]) -> Option<PriorType> {
    types
        .iter()
        .copied()
        .find(|t| t.family() == PriorFamily::Shrinkage)
}

// ============================================================================
// Second-Order Precision Structures
// ============================================================================

/// Exact second-order structure `StS = (eps * I + L)^2` for the `S`
/// variant, built row-by-row from the neighbour lists instead of the
/// O(N^3) matrix square.
///
/// Diagonal: `nn + (nn + eps)^2`. First-order pair `(v, w)`:
/// `-(nn_v + nn_w + 2 * eps)`. Each second-order appearance adds 1 —
/// duplicates are separate appearances and both count.
pub fn build_sts<T: FloatLinalg>(graph: &AdjacencyGraph) -> SymMatrix<T> {
    let n = graph.len();
    let eps = T::from(STS_DIAGONAL_WEIGHT).unwrap_or_else(T::epsilon);
    let two = T::from(2.0).unwrap_or_else(T::one);

    let mut sts = SymMatrix::zeros(n);
    for v in 0..n {
        let nv = T::from(graph.degree(v)).unwrap_or_else(T::zero);
        sts.set(v, v, nv + (nv + eps) * (nv + eps));

        for &w in graph.neighbours(v) {
            if v < w {
                let nw = T::from(graph.degree(w)).unwrap_or_else(T::zero);
                sts.add(v, w, -(nv + nw + two * eps));
            }
        }
        for &w in graph.neighbours2(v) {
            if v < w {
                sts.add(v, w, T::one());
            }
        }
    }
    sts
}

/// Closed-form second-order precision structure for the Dirichlet
/// (`p`) variant: diagonal `4 * dims^2 + nn`, `-2 * 2 * dims` per
/// first-order neighbour, +1 per second-order appearance.
///
/// # Errors
///
/// [`SvbError::AsymmetricMatrix`] if the assembled matrix is not
/// symmetric — possible only through an adjacency defect upstream, so
/// it is treated as an internal fault.
pub fn build_second_order_dirichlet<T: FloatLinalg>(
    graph: &AdjacencyGraph,
    dims: usize,
) -> Result<SymMatrix<T>, SvbError> {
    let n = graph.len();
    let dims_t = T::from(dims).unwrap_or_else(T::one);
    let two = T::from(2.0).unwrap_or_else(T::one);
    let four = two * two;

    let mut raw = vec![T::zero(); n * n];
    for v in 0..n {
        raw[v * n + v] = four * dims_t * dims_t;
        for &w in graph.neighbours(v) {
            raw[v * n + w] = raw[v * n + w] - two * two * dims_t;
            raw[v * n + v] = raw[v * n + v] + T::one();
        }
        for &w in graph.neighbours2(v) {
            raw[v * n + w] = raw[v * n + w] + T::one();
        }
    }

    let m = SymMatrix::from_row_major(n, raw);
    let asym = m.max_asymmetry();
    if asym > T::zero() {
        return Err(SvbError::AsymmetricMatrix {
            max_error: asym.to_f64().unwrap_or(f64::NAN),
            max_value: m.max_abs().to_f64().unwrap_or(f64::NAN),
        });
    }
    Ok(m)
}
