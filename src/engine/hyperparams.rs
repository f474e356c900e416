//! Spatial hyperparameter re-estimation.
//!
//! ## Purpose
//!
//! Each outer iteration re-estimates the global smoothing strength from
//! the current per-location posteriors: a closed-form precision
//! multiplier `akmean` for the shrinkage family, and a root-find over
//! the analytically derived objective derivative for the
//! evidence-family smoothing scale `delta` (with an optional nested
//! closed-form solve for the log-scale factor `rho`).
//!
//! ## Design notes
//!
//! * The derivative objects implement [`ZeroCrossing`]: the finder sees
//!   a plain descending function, while `pick_faster_guess` reuses
//!   smoothing scales the covariance cache has already inverted.
//! * Internal faults raised mid-evaluation (asymmetric derived
//!   matrices) cannot propagate through the scalar function interface;
//!   they are parked on the derivative object and re-raised by the
//!   driver after the search returns.
//! * Negative trace terms in the closed-form `rho` solve indicate a
//!   numerical problem upstream; the solve falls back to `rho = 0` with
//!   a one-time warning rather than poisoning the search with NaN.
//!
//! ## Invariants
//!
//! * `akmean` never drops below 1e-50 (floored with a warning).
//! * Rate limiting never reduces an allowance below 0.5.
//!
//! ## Non-goals
//!
//! * Posterior updates and prior reconstruction (see `executor`).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::algorithms::covariance::CovarianceCache;
use crate::algorithms::neighborhood::AdjacencyGraph;
use crate::algorithms::priors::PriorType;
use crate::math::linalg::{FloatLinalg, SymMatrix};
use crate::math::rootfind::{DescendingZeroFinder, LogBisectionGuesstimator, ZeroCrossing};
use crate::primitives::errors::SvbError;
use crate::warn_once;

/// Hard floor applied to `akmean` to prevent numerical collapse.
const AKMEAN_FLOOR: f64 = 1e-50;

// ============================================================================
// Rate Limiting
// ============================================================================

/// Cap a hyperparameter's per-iteration growth to `previous * ceiling`,
/// never capping below 0.5. Returns the (possibly clamped) value and
/// whether clamping occurred.
pub fn rate_limit<T: Float>(value: T, previous: T, ceiling: Option<T>) -> (T, bool) {
    let ceiling = match ceiling {
        Some(c) => c,
        None => return (value, false),
    };
    let half = T::from(0.5).unwrap_or_else(T::one);
    let allowed = T::max(previous * ceiling, half);
    if value > allowed {
        (allowed, true)
    } else {
        (value, false)
    }
}

// ============================================================================
// Shrinkage Family: akmean
// ============================================================================

/// Closed-form `akmean` update for one parameter of the shrinkage
/// family.
///
/// `wk` are the per-location posterior means of the parameter and
/// `sigmak` the per-location marginal posterior variances. The update
/// is `gk * (N/2 + q2)` with
/// `1/gk = 0.5 * tr[Sigma * S'S] + 0.5 * w'S'Sw + 1/q1`, using the
/// noninformative hyperpriors `q1 = 10`, `q2 = 1` and the
/// variant-specific neighbour weightings for the trace and roughness
/// terms.
pub fn shrinkage_akmean_update<T: Float>(
    variant: PriorType,
    graph: &AdjacencyGraph,
    dims: usize,
    wk: &[T],
    sigmak: &[T],
) -> T {
    let n = graph.len();
    debug_assert_eq!(wk.len(), n);
    debug_assert_eq!(sigmak.len(), n);

    let half = T::from(0.5).unwrap_or_else(T::one);
    let two = T::from(2.0).unwrap_or_else(T::one);
    let dims_t = T::from(dims).unwrap_or_else(T::one);

    // Trace term: tr[Sigma * S'S] via the diagonal weights.
    let mut tmp1 = T::zero();
    for v in 0..n {
        let weight: T = variant.shrinkage_precision_weight(graph.degree(v), dims);
        tmp1 = tmp1 + sigmak[v] * weight;
    }

    // Roughness term: S*w, with the variant's boundary handling.
    let diag_weight = match variant {
        PriorType::SecondOrderExact => T::from(1e-6).unwrap_or_else(T::epsilon),
        _ => T::zero(),
    };
    let mut swk: Vec<T> = wk.iter().map(|&w| diag_weight * w).collect();
    for v in 0..n {
        for &w in graph.neighbours(v) {
            swk[v] = swk[v] + wk[v] - wk[w];
        }
        if matches!(
            variant,
            PriorType::SecondOrderDirichlet | PriorType::MrfDirichlet
        ) {
            let nn = T::from(graph.degree(v)).unwrap_or_else(T::zero);
            swk[v] = swk[v] + wk[v] * (dims_t * two - nn);
        }
    }
    let tmp2 = if matches!(variant, PriorType::MrfDirichlet | PriorType::Mrf) {
        // First-order fields use w'Sw rather than |Sw|^2.
        swk.iter()
            .zip(wk.iter())
            .fold(T::zero(), |acc, (&s, &w)| acc + s * w)
    } else {
        swk.iter().fold(T::zero(), |acc, &s| acc + s * s)
    };

    let q1_inv = T::from(0.1).unwrap_or_else(T::zero);
    let q2 = T::one();
    let gk = T::one() / (half * tmp1 + half * tmp2 + q1_inv);
    let n_t = T::from(n).unwrap_or_else(T::one);

    gk * (n_t * half + q2)
}

/// Apply the floor and rate limit to a freshly updated `akmean`.
pub fn clamp_akmean<T: Float>(value: T, previous: T, ceiling: Option<T>) -> T {
    let floor = T::from(AKMEAN_FLOOR).unwrap_or_else(T::min_positive_value);
    let mut out = value;
    if out < floor {
        warn_once!("akmean collapsed below {:e}; flooring", AKMEAN_FLOOR);
        out = floor;
    }
    let (limited, clamped) = rate_limit(out, previous, ceiling);
    if clamped {
        log::debug!("rate-limiting akmean increase");
    }
    limited
}

// ============================================================================
// Evidence Family: Derivative Objects
// ============================================================================

/// Closed-form log-scale solve shared by both derivative objects:
/// `rho = -ln(tmp / N)`. A non-positive `tmp` (numerical trouble
/// upstream) falls back to zero with a one-time warning.
fn solve_rho<T: Float>(tmp: T, n: usize) -> T {
    let n_t = T::from(n).unwrap_or_else(T::one);
    if tmp > T::zero() {
        -(tmp / n_t).ln()
    } else {
        warn_once!("non-positive trace in rho solve; using rho = 0");
        T::zero()
    }
}

/// Derivative of the variational objective with respect to the
/// smoothing scale, with the prior factored into the dimensionless
/// `cov_ratio` / `mean_diff_ratio` summaries.
pub struct VariationalSmoothness<'a, T> {
    cache: &'a mut CovarianceCache<T>,
    /// Posterior variance / prior variance, per location.
    cov_ratio: &'a [T],
    /// (Posterior mean - prior mean) / sqrt(prior variance).
    mean_diff_ratio: &'a [T],
    allow_rho: bool,
    fault: Option<SvbError>,
}

impl<'a, T: FloatLinalg> VariationalSmoothness<'a, T> {
    /// Bind the derivative to a cache and the per-location summaries.
    pub fn new(
        cache: &'a mut CovarianceCache<T>,
        cov_ratio: &'a [T],
        mean_diff_ratio: &'a [T],
        allow_rho: bool,
    ) -> Self {
        Self {
            cache,
            cov_ratio,
            mean_diff_ratio,
            allow_rho,
            fault: None,
        }
    }

    /// An internal fault raised during evaluation, if any.
    pub fn take_fault(&mut self) -> Option<SvbError> {
        self.fault.take()
    }

    /// Closed-form log-scale factor at a given smoothing scale.
    pub fn optimize_rho(&mut self, delta: T) -> T {
        if !self.allow_rho {
            return T::zero();
        }
        let n = self.cache.len();
        let c_inv = self.cache.c_inv(delta);
        let tmp = c_inv.trace_diag_product(self.cov_ratio)
            + c_inv.quadratic_form(self.mean_diff_ratio);
        solve_rho(tmp, n)
    }
}

impl<'a, T: FloatLinalg> ZeroCrossing<T> for VariationalSmoothness<'a, T> {
    fn evaluate(&mut self, delta: T) -> T {
        let rho = self.optimize_rho(delta);
        let rho_scale = rho.exp();

        let (product, trace) = match self.cache.ci_codist_ci(delta) {
            Ok((m, t)) => (m, t),
            Err(e) => {
                self.fault = Some(e);
                return T::zero();
            }
        };

        let four = T::from(4.0).unwrap_or_else(T::one);
        let mut out = trace;
        out = out - rho_scale * product.trace_diag_product(self.cov_ratio);
        out = out - rho_scale * product.quadratic_form(self.mean_diff_ratio);
        out / (-four * delta * delta)
    }

    fn pick_faster_guess(&mut self, proposed: T, lower: T, upper: T) -> Option<T> {
        self.cache.cached_in_range(proposed, lower, upper, false)
    }
}

/// Derivative of the marginal-evidence objective with respect to the
/// smoothing scale, built from posteriors with the prior factored out.
pub struct EvidenceSmoothness<'a, T> {
    cache: &'a mut CovarianceCache<T>,
    /// Per-location posterior-without-prior precision of the parameter.
    prec_wp: &'a [T],
    /// Per-location posterior-without-prior mean of the parameter.
    mean_wp: &'a [T],
    prior_mean: T,
    prior_var: T,
    allow_rho: bool,
    fault: Option<SvbError>,
}

impl<'a, T: FloatLinalg> EvidenceSmoothness<'a, T> {
    /// Bind the derivative to a cache and the per-location summaries.
    pub fn new(
        cache: &'a mut CovarianceCache<T>,
        prec_wp: &'a [T],
        mean_wp: &'a [T],
        prior_mean: T,
        prior_var: T,
        allow_rho: bool,
    ) -> Self {
        Self {
            cache,
            prec_wp,
            mean_wp,
            prior_mean,
            prior_var,
            allow_rho,
            fault: None,
        }
    }

    /// An internal fault raised during evaluation, if any.
    pub fn take_fault(&mut self) -> Option<SvbError> {
        self.fault.take()
    }

    /// Marginal posterior `Sigma = (XXtr + Cinv)^-1` and `mu = Sigma * XYtr`
    /// for the given per-location moment summaries.
    fn marginal(&mut self, delta: T, xxtr: &[T], xytr: &[T]) -> (SymMatrix<T>, Vec<T>) {
        let mut sigma_inv = self.cache.c_inv(delta).clone();
        for (v, &x) in xxtr.iter().enumerate() {
            let d = sigma_inv.get(v, v);
            sigma_inv.set(v, v, d + x);
        }
        let sigma = sigma_inv.inverse().unwrap_or_else(|| {
            warn_once!("marginal precision inversion failed; using identity");
            SymMatrix::identity(xxtr.len())
        });
        let mu = sigma.mul_vec(xytr);
        (sigma, mu)
    }

    /// Closed-form log-scale factor at a given smoothing scale.
    pub fn optimize_rho(&mut self, delta: T) -> T {
        if !self.allow_rho {
            return T::zero();
        }
        let n = self.cache.len();

        let xxtr: Vec<T> = self.prec_wp.to_vec();
        let xytr: Vec<T> = self
            .prec_wp
            .iter()
            .zip(self.mean_wp.iter())
            .map(|(&p, &m)| p * (m - self.prior_mean))
            .collect();

        let (sigma, mu) = self.marginal(delta, &xxtr, &xytr);
        let c_inv = self.cache.c_inv(delta);
        let tmp = sigma.trace_product(c_inv) + c_inv.quadratic_form(&mu);
        solve_rho(tmp, n)
    }
}

impl<'a, T: FloatLinalg> ZeroCrossing<T> for EvidenceSmoothness<'a, T> {
    fn evaluate(&mut self, delta: T) -> T {
        // Moment summaries corrected for a non-unit global prior.
        let prior_prec = T::one() / self.prior_var;
        let prior_prec_sqrt = prior_prec.sqrt();
        let xxtr: Vec<T> = self.prec_wp.iter().map(|&p| p * self.prior_var).collect();
        let xytr: Vec<T> = xxtr
            .iter()
            .zip(self.mean_wp.iter())
            .map(|(&x, &m)| x * (m - self.prior_mean) * prior_prec_sqrt)
            .collect();

        let (product, trace) = match self.cache.ci_codist_ci(delta) {
            Ok((m, t)) => (m.clone(), t),
            Err(e) => {
                self.fault = Some(e);
                return T::zero();
            }
        };
        let (sigma, mu) = self.marginal(delta, &xxtr, &xytr);

        let four = T::from(4.0).unwrap_or_else(T::one);
        let mut out = trace;
        out = out - sigma.trace_product(&product);
        out = out - product.quadratic_form(&mu);
        out / (-four * delta * delta)
    }

    fn pick_faster_guess(&mut self, proposed: T, lower: T, upper: T) -> Option<T> {
        self.cache.cached_in_range(proposed, lower, upper, false)
    }
}

// ============================================================================
// Drivers
// ============================================================================

/// Search window for the variational smoothing-scale update. Below the
/// lower bound inversion becomes painfully slow; above the upper bound
/// the covariance saturates to all-ones (singular).
pub const VARIATIONAL_DELTA_RANGE: (f64, f64) = (0.2, 1e15);

/// Search window for the evidence smoothing-scale update.
pub const EVIDENCE_DELTA_RANGE: (f64, f64) = (0.05, 1e3);

/// Variational `delta` (and optional `rho`) update for one parameter.
///
/// With `allow_delta` off the guess is returned unchanged (and `rho`
/// still solved when allowed) — the path used by fixed-scale priors and
/// by rate-limit re-evaluation.
#[allow(clippy::too_many_arguments)]
pub fn optimize_smoothing_scale<T: FloatLinalg>(
    cache: &mut CovarianceCache<T>,
    cov_ratio: &[T],
    mean_diff_ratio: &[T],
    guess: T,
    allow_rho: bool,
    allow_delta: bool,
    ratio_tol: T,
    extra_evaluations: usize,
) -> Result<(T, T), SvbError> {
    let mut fcn = VariationalSmoothness::new(cache, cov_ratio, mean_diff_ratio, allow_rho);

    let delta = if allow_delta {
        let (min, max) = VARIATIONAL_DELTA_RANGE;
        let found = DescendingZeroFinder::new()
            .initial_guess(guess)
            .search_min(T::from(min).unwrap_or_else(T::epsilon))
            .search_max(T::from(max).unwrap_or_else(T::max_value))
            .ratio_tol_x(ratio_tol)
            .max_evaluations(2 + extra_evaluations)
            .guesstimator(LogBisectionGuesstimator)
            .find_zero(&mut fcn);
        if let Some(fault) = fcn.take_fault() {
            return Err(fault);
        }
        found
    } else {
        guess
    };

    let rho = fcn.optimize_rho(delta);
    Ok((delta, rho))
}

/// Evidence-optimization `delta` (and optional `rho`) update for one
/// parameter, driven by posteriors with the prior factored out.
#[allow(clippy::too_many_arguments)]
pub fn optimize_evidence<T: FloatLinalg>(
    cache: &mut CovarianceCache<T>,
    prec_wp: &[T],
    mean_wp: &[T],
    prior_mean: T,
    prior_var: T,
    guess: T,
    allow_rho: bool,
    ratio_tol: T,
    extra_evaluations: usize,
) -> Result<(T, T), SvbError> {
    let mut fcn = EvidenceSmoothness::new(cache, prec_wp, mean_wp, prior_mean, prior_var, allow_rho);

    let (min, max) = EVIDENCE_DELTA_RANGE;
    // The scale schedule settles to two evaluations per outer iteration
    // once delta stabilizes, while still crossing the whole window in
    // about seven probes when it must escape.
    let scale = guess * T::from(0.009).unwrap_or_else(T::epsilon);
    let delta = DescendingZeroFinder::new()
        .initial_guess(guess)
        .initial_scale(scale)
        .scale_growth(T::from(16.0).unwrap_or_else(T::one))
        .search_min(T::from(min).unwrap_or_else(T::epsilon))
        .search_max(T::from(max).unwrap_or_else(T::max_value))
        .ratio_tol_x(ratio_tol)
        .max_evaluations(2 + extra_evaluations)
        .guesstimator(LogBisectionGuesstimator)
        .find_zero(&mut fcn);
    if let Some(fault) = fcn.take_fault() {
        return Err(fault);
    }

    let rho = fcn.optimize_rho(delta);
    Ok((delta, rho))
}
