//! One-dimensional descending-zero root finding.
//!
//! ## Purpose
//!
//! This module finds `x` with `f(x) ~ 0` for a continuous, monotonically
//! *descending* function `f` — the shape of every
//! derivative-of-objective function produced by the spatial
//! hyperparameter updates. The search expands a bracket geometrically
//! from an initial guess, then bisects (linearly or logarithmically)
//! inside the bracket.
//!
//! ## Design notes
//!
//! * **Pluggable guesses**: the function object can propose a faster
//!   evaluation point inside the current bracket
//!   (`ZeroCrossing::pick_faster_guess`) — used to reuse smoothing
//!   scales that the covariance cache has already paid to invert. This
//!   is purely a performance optimization, never required for
//!   correctness.
//! * **Budgeted**: evaluation count is capped. Exhausting the budget is
//!   a deliberate accuracy/performance trade-off: the finder logs a
//!   one-time warning and returns the best point seen, it does not
//!   error.
//! * **Descending convention**: `f(x) > 0` means the zero lies above
//!   `x`; `f(x) < 0` means it lies below.
//!
//! ## Invariants
//!
//! * Every evaluation point lies in `[search_min, search_max]`.
//! * Once a bracket exists, it only shrinks.
//!
//! ## Non-goals
//!
//! * Multiple roots, ascending functions, derivative-based methods.

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::warn_once;

// ============================================================================
// Function Interface
// ============================================================================

/// A monotonically descending function whose zero is wanted.
pub trait ZeroCrossing<T: Float> {
    /// Evaluate the function at `x`.
    fn evaluate(&mut self, x: T) -> T;

    /// Optionally propose a cheaper evaluation point strictly inside
    /// `(lower, upper)`, given the point the finder was about to try.
    fn pick_faster_guess(&mut self, _proposed: T, _lower: T, _upper: T) -> Option<T> {
        None
    }
}

/// Adapter turning a plain closure into a [`ZeroCrossing`].
#[derive(Debug, Clone)]
pub struct FnCrossing<F>(
    /// The wrapped function.
    pub F,
);

impl<T: Float, F: FnMut(T) -> T> ZeroCrossing<T> for FnCrossing<F> {
    #[inline]
    fn evaluate(&mut self, x: T) -> T {
        (self.0)(x)
    }
}

// ============================================================================
// Bracket Splitting
// ============================================================================

/// Strategy for choosing the next evaluation point inside a bracket.
pub trait Guesstimator<T: Float> {
    /// A point strictly between `lower` and `upper`.
    fn split(&self, lower: T, upper: T) -> T;
}

/// Arithmetic midpoint splitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct BisectionGuesstimator;

impl<T: Float> Guesstimator<T> for BisectionGuesstimator {
    #[inline]
    fn split(&self, lower: T, upper: T) -> T {
        (lower + upper) / T::from(2.0).unwrap_or_else(T::one)
    }
}

/// Geometric-mean splitting for strictly positive domains; falls back to
/// the arithmetic midpoint if either endpoint is non-positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBisectionGuesstimator;

impl<T: Float> Guesstimator<T> for LogBisectionGuesstimator {
    #[inline]
    fn split(&self, lower: T, upper: T) -> T {
        if lower > T::zero() && upper > T::zero() {
            (lower * upper).sqrt()
        } else {
            BisectionGuesstimator.split(lower, upper)
        }
    }
}

// ============================================================================
// Descending Zero Finder
// ============================================================================

/// Budgeted descending-zero search over a bounded interval.
///
/// All knobs have usable defaults; typical use configures the guess, the
/// search window and the evaluation budget:
///
/// ```
/// use svb_rs::prelude::*;
///
/// let mut f = FnCrossing(|x: f64| 3.0 - x); // zero at 3
/// let root = DescendingZeroFinder::new()
///     .initial_guess(1.0)
///     .search_min(1e-3)
///     .search_max(1e3)
///     .max_evaluations(30)
///     .find_zero(&mut f);
/// assert!((root - 3.0).abs() < 0.05);
/// ```
#[derive(Debug, Clone)]
pub struct DescendingZeroFinder<T, G> {
    initial_guess: T,
    initial_scale: T,
    scale_growth: T,
    search_min: T,
    search_max: T,
    ratio_tol_x: T,
    tol_y: T,
    max_evaluations: usize,
    guesstimator: G,
}

impl<T: Float> DescendingZeroFinder<T, BisectionGuesstimator> {
    /// Finder with default knobs and arithmetic bisection.
    pub fn new() -> Self {
        Self {
            initial_guess: T::one(),
            initial_scale: T::one(),
            scale_growth: T::from(2.0).unwrap_or_else(T::one),
            search_min: T::epsilon(),
            search_max: T::from(1e15).unwrap_or_else(T::max_value),
            ratio_tol_x: T::from(1.01).unwrap_or_else(T::one),
            tol_y: T::zero(),
            max_evaluations: 20,
            guesstimator: BisectionGuesstimator,
        }
    }
}

impl<T: Float> Default for DescendingZeroFinder<T, BisectionGuesstimator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float, G: Guesstimator<T>> DescendingZeroFinder<T, G> {
    /// Starting point of the search.
    pub fn initial_guess(mut self, guess: T) -> Self {
        self.initial_guess = guess;
        self
    }

    /// First bracket-expansion step size.
    pub fn initial_scale(mut self, scale: T) -> Self {
        self.initial_scale = scale;
        self
    }

    /// Multiplier applied to the step size after each failed probe.
    pub fn scale_growth(mut self, growth: T) -> Self {
        self.scale_growth = growth;
        self
    }

    /// Lower search bound.
    pub fn search_min(mut self, min: T) -> Self {
        self.search_min = min;
        self
    }

    /// Upper search bound.
    pub fn search_max(mut self, max: T) -> Self {
        self.search_max = max;
        self
    }

    /// Relative bracket-width tolerance (e.g. 1.01 = converged when the
    /// bracket endpoints are within 1% of each other).
    pub fn ratio_tol_x(mut self, tol: T) -> Self {
        self.ratio_tol_x = tol;
        self
    }

    /// Absolute tolerance on `|f(x)|`; zero disables the check.
    pub fn tol_y(mut self, tol: T) -> Self {
        self.tol_y = tol;
        self
    }

    /// Evaluation budget; exhausting it returns a best-effort value.
    pub fn max_evaluations(mut self, n: usize) -> Self {
        self.max_evaluations = n.max(1);
        self
    }

    /// Replace the bracket-splitting strategy.
    pub fn guesstimator<G2: Guesstimator<T>>(self, g: G2) -> DescendingZeroFinder<T, G2> {
        DescendingZeroFinder {
            initial_guess: self.initial_guess,
            initial_scale: self.initial_scale,
            scale_growth: self.scale_growth,
            search_min: self.search_min,
            search_max: self.search_max,
            ratio_tol_x: self.ratio_tol_x,
            tol_y: self.tol_y,
            max_evaluations: self.max_evaluations,
            guesstimator: g,
        }
    }

    /// Bracket-width convergence test.
    #[inline]
    fn bracket_converged(&self, lower: T, upper: T) -> bool {
        if lower > T::zero() {
            upper / lower <= self.ratio_tol_x
        } else {
            upper - lower <= self.ratio_tol_x - T::one()
        }
    }

    /// Run the search.
    pub fn find_zero<F: ZeroCrossing<T>>(&self, f: &mut F) -> T {
        let min = self.search_min;
        let max = self.search_max;
        let mut evals = 0usize;

        let mut guess = self.initial_guess.max(min).min(max);
        if let Some(fast) = f.pick_faster_guess(guess, min, max) {
            if fast > min && fast < max {
                guess = fast;
            }
        }

        let mut best_x = guess;
        let mut best_fy = T::infinity();
        let eval = |f: &mut F, x: T, evals: &mut usize, best_x: &mut T, best_fy: &mut T| {
            *evals += 1;
            let y = f.evaluate(x);
            if y.abs() < *best_fy {
                *best_fy = y.abs();
                *best_x = x;
            }
            y
        };

        let fg = eval(f, guess, &mut evals, &mut best_x, &mut best_fy);

        // Expand a bracket [lower, upper] with f(lower) > 0 > f(upper).
        let (mut lower, mut upper);
        let mut scale = self.initial_scale;
        if fg > T::zero() {
            lower = guess;
            loop {
                if evals >= self.max_evaluations || lower >= max {
                    warn_once!(
                        "zero finder: no sign change up to the search bound; \
                         returning best-effort value"
                    );
                    return if lower >= max { max } else { best_x };
                }
                let x = (guess + scale).min(max);
                scale = scale * self.scale_growth;
                let y = eval(f, x, &mut evals, &mut best_x, &mut best_fy);
                if y <= T::zero() {
                    upper = x;
                    break;
                }
                lower = x;
            }
        } else {
            upper = guess;
            loop {
                if evals >= self.max_evaluations || upper <= min {
                    warn_once!(
                        "zero finder: no sign change down to the search bound; \
                         returning best-effort value"
                    );
                    return if upper <= min { min } else { best_x };
                }
                let x = (guess - scale).max(min);
                scale = scale * self.scale_growth;
                let y = eval(f, x, &mut evals, &mut best_x, &mut best_fy);
                if y > T::zero() {
                    lower = x;
                    break;
                }
                upper = x;
            }
        }

        // Shrink the bracket.
        while evals < self.max_evaluations {
            if self.bracket_converged(lower, upper) {
                return best_x;
            }
            if self.tol_y > T::zero() && best_fy <= self.tol_y {
                return best_x;
            }

            let proposed = self.guesstimator.split(lower, upper);
            let x = match f.pick_faster_guess(proposed, lower, upper) {
                Some(fast) if fast > lower && fast < upper => fast,
                _ => proposed,
            };
            if x <= lower || x >= upper {
                // Floating-point exhaustion: the bracket cannot shrink.
                return best_x;
            }

            let y = eval(f, x, &mut evals, &mut best_x, &mut best_fy);
            if y > T::zero() {
                lower = x;
            } else {
                upper = x;
            }
        }

        if !self.bracket_converged(lower, upper) {
            warn_once!("zero finder: evaluation budget exhausted before convergence");
        }
        best_x
    }
}
