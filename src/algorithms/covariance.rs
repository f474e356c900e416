//! Distance-derived covariance matrix cache.
//!
//! ## Purpose
//!
//! The evidence-optimization prior family regularizes estimates with a
//! spatial covariance `C(delta)` whose entries decay with pairwise
//! distance. Evaluating the hyperparameter objective requires
//! `C(delta)`, its inverse, and a derived weighted-distance product —
//! all O(N^2) memory and O(N^3) work. This module computes them lazily
//! and memoizes them keyed by the smoothing scale `delta`, so that the
//! root-finder can revisit scales for free.
//!
//! ## Design notes
//!
//! * **Engine-owned**: the cache is an explicit value owned by the
//!   spatial engine and passed by reference, never ambient shared
//!   state; this keeps concurrent runs independent and tests
//!   deterministic.
//! * **Sorted keys**: entries are kept in a `Vec` sorted by `delta`,
//!   giving deterministic iteration and a simple range scan for
//!   [`CovarianceCache::cached_in_range`].
//! * **Retention toggle**: with retention off, every request recomputes
//!   and nothing is stored, bounding memory at the cost of repeated
//!   inversions.
//! * **Pure**: all results are functions of `delta` and the fixed
//!   distance matrix only.
//!
//! ## Invariants
//!
//! * `c(0)` is the identity for any distance matrix.
//! * `ci_codist_ci` is symmetric up to inversion noise; asymmetry beyond
//!   tolerance is a fatal internal error.
//!
//! ## Non-goals
//!
//! * This module does not choose `delta` (see `engine::hyperparams`).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::math::linalg::{FloatLinalg, SymMatrix};
use crate::primitives::errors::SvbError;
use crate::warn_once;

/// Relative tolerance for the symmetry check on the derived product.
/// Matrix inversion noise stays well below this; anything above it
/// indicates a logic or conditioning failure.
const SYMMETRY_TOLERANCE: f64 = 1e-5;

// ============================================================================
// Cache Entry
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    delta: T,
    c_inv: Option<SymMatrix<T>>,
    /// `Cinv * (C . dist) * Cinv` and `trace(Cinv * (C . dist))`.
    ci_codist_ci: Option<(SymMatrix<T>, T)>,
}

impl<T: Float> CacheEntry<T> {
    fn new(delta: T) -> Self {
        Self {
            delta,
            c_inv: None,
            ci_codist_ci: None,
        }
    }
}

// ============================================================================
// Covariance Cache
// ============================================================================

/// Lazily populated cache of `C(delta)`, `C^-1(delta)` and the derived
/// weighted-distance product, over a fixed distance matrix.
#[derive(Debug, Clone)]
pub struct CovarianceCache<T> {
    distances: SymMatrix<T>,
    retain: bool,
    entries: Vec<CacheEntry<T>>,
}

impl<T: FloatLinalg> CovarianceCache<T> {
    /// Wrap a distance matrix. `retain` controls whether computed
    /// matrices are kept for reuse or recomputed on every call.
    pub fn new(distances: SymMatrix<T>, retain: bool) -> Self {
        Self {
            distances,
            retain,
            entries: Vec::new(),
        }
    }

    /// The fixed pairwise distance matrix.
    #[inline]
    pub fn distances(&self) -> &SymMatrix<T> {
        &self.distances
    }

    /// Number of locations.
    #[inline]
    pub fn len(&self) -> usize {
        self.distances.n()
    }

    /// True for a zero-location cache (never constructed in practice).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.distances.n() == 0
    }

    /// Covariance matrix `C(delta)` with entries
    /// `exp(-0.5 * dist(a, b) / delta)`, or the identity for `delta == 0`.
    ///
    /// Cheap relative to inversion, so it is computed fresh each call.
    pub fn c(&self, delta: T) -> SymMatrix<T> {
        let n = self.distances.n();
        if delta == T::zero() {
            return SymMatrix::identity(n);
        }

        let half = T::from(-0.5).unwrap_or_else(|| -T::one());
        let mut c = SymMatrix::zeros(n);
        for a in 0..n {
            for b in 0..=a {
                c.set(a, b, (half * self.distances.get(a, b) / delta).exp());
            }
        }
        c
    }

    /// Memoized inverse of `c(delta)`.
    ///
    /// A failed inversion (singular covariance) is recoverable: a
    /// one-time warning is logged and the identity matrix is used as the
    /// best-effort value.
    pub fn c_inv(&mut self, delta: T) -> &SymMatrix<T> {
        let idx = self.entry_index(delta);
        if self.entries[idx].c_inv.is_none() {
            let inv = self.c(delta).inverse().unwrap_or_else(|| {
                warn_once!(
                    "covariance inversion failed at delta = {:?}; \
                     falling back to the identity matrix",
                    delta
                );
                SymMatrix::identity(self.distances.n())
            });
            self.entries[idx].c_inv = Some(inv);
        }
        self.entries[idx].c_inv.as_ref().unwrap()
    }

    /// Memoized `Cinv * (C . dist) * Cinv` together with
    /// `trace(Cinv * (C . dist))` — the two ingredients of the
    /// smoothing-scale derivative.
    ///
    /// # Errors
    ///
    /// [`SvbError::AsymmetricMatrix`] if the product is asymmetric
    /// beyond inversion noise; this indicates an internal defect and is
    /// not recoverable.
    pub fn ci_codist_ci(&mut self, delta: T) -> Result<(&SymMatrix<T>, T), SvbError> {
        let idx = self.entry_index(delta);
        if self.entries[idx].ci_codist_ci.is_none() {
            let codist = self.c(delta).hadamard(&self.distances);
            let ci_codist = self.c_inv(delta).mat_mul(&codist);
            let trace = ci_codist.trace();
            let mut product = ci_codist.mat_mul(self.c_inv(delta));

            let max_err = product.max_asymmetry();
            let max_val = product.max_abs();
            let tol = T::from(SYMMETRY_TOLERANCE).unwrap_or_else(T::epsilon);
            if max_err > max_val * tol {
                return Err(SvbError::AsymmetricMatrix {
                    max_error: max_err.to_f64().unwrap_or(f64::NAN),
                    max_value: max_val.to_f64().unwrap_or(f64::NAN),
                });
            }
            product.symmetrize();

            self.entries[idx].ci_codist_ci = Some((product, trace));
        }
        let (m, t) = self.entries[idx].ci_codist_ci.as_ref().unwrap();
        Ok((m, *t))
    }

    /// Reuse a cached `delta` inside the open interval `(lower, upper)`
    /// (closed when `allow_endpoints` is set), preferring the cached
    /// value closest to `guess` and, on ties, the one below it. Returns
    /// `None` when nothing cached qualifies.
    ///
    /// This is purely a search accelerator; skipping it never changes
    /// results.
    pub fn cached_in_range(&self, guess: T, lower: T, upper: T, allow_endpoints: bool) -> Option<T> {
        let inside = |d: T| {
            if allow_endpoints {
                lower <= d && d <= upper
            } else {
                lower < d && d < upper
            }
        };

        let mut best: Option<T> = None;
        for entry in &self.entries {
            let d = entry.delta;
            if !inside(d) {
                continue;
            }
            best = Some(match best {
                None => d,
                Some(b) => {
                    if d < guess || d - guess < guess - b {
                        d
                    } else {
                        b
                    }
                }
            });
        }
        best
    }

    /// Number of retained cache entries.
    #[inline]
    pub fn cached_entries(&self) -> usize {
        self.entries.len()
    }

    /// Find or create the entry for `delta`, keeping entries sorted.
    /// With retention off, the cache is cleared first so at most the
    /// working entry exists.
    fn entry_index(&mut self, delta: T) -> usize {
        if !self.retain && !(self.entries.len() == 1 && self.entries[0].delta == delta) {
            self.entries.clear();
        }
        match self
            .entries
            .binary_search_by(|e| e.delta.partial_cmp(&delta).unwrap_or(core::cmp::Ordering::Less))
        {
            Ok(idx) => idx,
            Err(idx) => {
                self.entries.insert(idx, CacheEntry::new(delta));
                idx
            }
        }
    }
}
