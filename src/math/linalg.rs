//! Linear algebra backend abstraction for spatial VB.
//!
//! ## Purpose
//!
//! This module provides the dense symmetric matrix type used for
//! distance, covariance, and precision matrices, and a trait-based
//! abstraction over matrix inversion, standardizing on the optimized
//! nalgebra backend.
//!
//! ## Design notes
//!
//! * Inversion tries Cholesky first (the matrices are symmetric and
//!   normally positive definite), falls back to QR, then to the
//!   pseudo-inverse for ill-conditioned input.
//! * Generic over `FloatLinalg` types (f32 and f64) which delegate to
//!   nalgebra.
//! * Products, traces, and quadratic forms are plain loops over the
//!   row-major storage; only inversion crosses into nalgebra.
//!
//! ## Invariants
//!
//! * `SymMatrix` storage is row-major `n * n`; `set` and `add` keep it
//!   exactly symmetric.
//!
//! ## Non-goals
//!
//! * Sparse storage or factorizations beyond inversion.

// Feature-gated imports
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

// ============================================================================
// FloatLinalg Trait
// ============================================================================

/// Helper trait to bridge generic Float types to the nalgebra backend.
pub trait FloatLinalg: Float + core::fmt::Debug + 'static {
    /// Invert a symmetric `n x n` matrix given in row-major order.
    /// Returns `None` only if every fallback fails.
    fn invert_sym(a: &[Self], n: usize) -> Option<Vec<Self>>;
}

impl FloatLinalg for f64 {
    #[inline]
    fn invert_sym(a: &[Self], n: usize) -> Option<Vec<Self>> {
        nalgebra_backend::invert_sym_f64(a, n)
    }
}

impl FloatLinalg for f32 {
    #[inline]
    fn invert_sym(a: &[Self], n: usize) -> Option<Vec<Self>> {
        nalgebra_backend::invert_sym_f32(a, n)
    }
}

// ============================================================================
// Nalgebra Backend Implementation
// ============================================================================

/// Nalgebra-based inversion routines.
pub mod nalgebra_backend {
    use nalgebra::DMatrix;

    #[cfg(not(feature = "std"))]
    use alloc::vec::Vec;
    #[cfg(feature = "std")]
    use std::vec::Vec;

    /// Invert a symmetric matrix using f64 precision.
    ///
    /// Row-major vs column-major layout is immaterial for symmetric input.
    pub fn invert_sym_f64(a: &[f64], n: usize) -> Option<Vec<f64>> {
        let matrix = DMatrix::from_column_slice(n, n, a);

        if let Some(chol) = matrix.clone().cholesky() {
            return Some(chol.inverse().as_slice().to_vec());
        }

        let identity = DMatrix::identity(n, n);
        if let Some(inv) = matrix.clone().qr().solve(&identity) {
            return Some(inv.as_slice().to_vec());
        }

        matrix
            .pseudo_inverse(f64::EPSILON * 100.0)
            .ok()
            .map(|inv: DMatrix<f64>| inv.as_slice().to_vec())
    }

    /// Invert a symmetric matrix using f32 precision.
    pub fn invert_sym_f32(a: &[f32], n: usize) -> Option<Vec<f32>> {
        let matrix = DMatrix::from_column_slice(n, n, a);

        if let Some(chol) = matrix.clone().cholesky() {
            return Some(chol.inverse().as_slice().to_vec());
        }

        let identity = DMatrix::identity(n, n);
        if let Some(inv) = matrix.clone().qr().solve(&identity) {
            return Some(inv.as_slice().to_vec());
        }

        matrix
            .pseudo_inverse(f32::EPSILON * 100.0)
            .ok()
            .map(|inv: DMatrix<f32>| inv.as_slice().to_vec())
    }
}

// ============================================================================
// Symmetric Matrix
// ============================================================================

/// Dense symmetric matrix, row-major `n x n` storage.
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: FloatLinalg> SymMatrix<T> {
    /// Zero matrix of size `n`.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![T::zero(); n * n],
        }
    }

    /// Identity matrix of size `n`.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.data[i * n + i] = T::one();
        }
        m
    }

    /// Build from a row-major slice; the caller guarantees symmetry.
    pub fn from_row_major(n: usize, data: Vec<T>) -> Self {
        debug_assert_eq!(data.len(), n * n);
        Self { n, data }
    }

    /// Matrix size (rows == columns).
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Element access.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.n + j]
    }

    /// Set both `(i, j)` and `(j, i)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, val: T) {
        self.data[i * self.n + j] = val;
        self.data[j * self.n + i] = val;
    }

    /// Add to both `(i, j)` and `(j, i)` (the diagonal is added once).
    #[inline]
    pub fn add(&mut self, i: usize, j: usize, val: T) {
        self.data[i * self.n + j] = self.data[i * self.n + j] + val;
        if i != j {
            self.data[j * self.n + i] = self.data[j * self.n + i] + val;
        }
    }

    /// Row-major backing slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Scale every element in place.
    pub fn scale(&mut self, factor: T) {
        for v in self.data.iter_mut() {
            *v = *v * factor;
        }
    }

    /// Sum of diagonal elements.
    pub fn trace(&self) -> T {
        let mut t = T::zero();
        for i in 0..self.n {
            t = t + self.get(i, i);
        }
        t
    }

    /// Elementwise (Hadamard) product.
    pub fn hadamard(&self, other: &Self) -> Self {
        debug_assert_eq!(self.n, other.n);
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a * b)
            .collect();
        Self { n: self.n, data }
    }

    /// Full matrix product `self * other`. The result is not symmetrized;
    /// callers that need symmetry enforce it explicitly.
    pub fn mat_mul(&self, other: &Self) -> Self {
        debug_assert_eq!(self.n, other.n);
        let n = self.n;
        let mut out = vec![T::zero(); n * n];
        for i in 0..n {
            for k in 0..n {
                let a = self.data[i * n + k];
                if a == T::zero() {
                    continue;
                }
                let row = &other.data[k * n..(k + 1) * n];
                let dst = &mut out[i * n..(i + 1) * n];
                for (d, &b) in dst.iter_mut().zip(row.iter()) {
                    *d = *d + a * b;
                }
            }
        }
        Self { n, data: out }
    }

    /// `trace(self * other)` without forming the product.
    pub fn trace_product(&self, other: &Self) -> T {
        debug_assert_eq!(self.n, other.n);
        let mut t = T::zero();
        for i in 0..self.n {
            for j in 0..self.n {
                t = t + self.get(i, j) * other.get(j, i);
            }
        }
        t
    }

    /// `trace(diag(d) * self)` for a diagonal factor.
    pub fn trace_diag_product(&self, diag: &[T]) -> T {
        debug_assert_eq!(diag.len(), self.n);
        let mut t = T::zero();
        for (i, &d) in diag.iter().enumerate() {
            t = t + d * self.get(i, i);
        }
        t
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, x: &[T]) -> Vec<T> {
        debug_assert_eq!(x.len(), self.n);
        (0..self.n)
            .map(|i| {
                let mut acc = T::zero();
                for (j, &xj) in x.iter().enumerate() {
                    acc = acc + self.get(i, j) * xj;
                }
                acc
            })
            .collect()
    }

    /// Quadratic form `x' * self * x`.
    pub fn quadratic_form(&self, x: &[T]) -> T {
        let sx = self.mul_vec(x);
        x.iter()
            .zip(sx.iter())
            .fold(T::zero(), |acc, (&a, &b)| acc + a * b)
    }

    /// Largest absolute element.
    pub fn max_abs(&self) -> T {
        self.data
            .iter()
            .fold(T::zero(), |acc, &v| T::max(acc, v.abs()))
    }

    /// Largest absolute asymmetry `|a_ij - a_ji|`.
    pub fn max_asymmetry(&self) -> T {
        let mut worst = T::zero();
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                worst = T::max(worst, (self.get(i, j) - self.get(j, i)).abs());
            }
        }
        worst
    }

    /// Average each off-diagonal pair, forcing exact symmetry.
    pub fn symmetrize(&mut self) {
        let half = T::from(0.5).unwrap_or_else(T::one);
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                let avg = (self.get(i, j) + self.get(j, i)) * half;
                self.set(i, j, avg);
            }
        }
    }

    /// Inverse through the nalgebra backend.
    ///
    /// Returns `None` only when Cholesky, QR, and the pseudo-inverse all
    /// fail; callers choose their fallback (identity, last good value).
    pub fn inverse(&self) -> Option<Self> {
        T::invert_sym(&self.data, self.n).map(|data| Self { n: self.n, data })
    }
}
