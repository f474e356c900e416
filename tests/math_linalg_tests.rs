#![cfg(feature = "dev")]

use approx::assert_relative_eq;
use svb_rs::internals::math::linalg::SymMatrix;

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_identity() {
    let m = SymMatrix::<f64>::identity(3);
    for i in 0..3 {
        for j in 0..3 {
            assert_relative_eq!(m.get(i, j), if i == j { 1.0 } else { 0.0 });
        }
    }
    assert_relative_eq!(m.trace(), 3.0);
}

#[test]
fn test_set_mirrors_both_triangles() {
    let mut m = SymMatrix::<f64>::zeros(3);
    m.set(0, 2, 5.0);
    assert_relative_eq!(m.get(0, 2), 5.0);
    assert_relative_eq!(m.get(2, 0), 5.0);
    assert_eq!(m.max_asymmetry(), 0.0);
}

#[test]
fn test_add_accumulates_symmetrically() {
    let mut m = SymMatrix::<f64>::zeros(2);
    m.add(0, 1, 2.0);
    m.add(0, 1, 1.0);
    m.add(1, 1, 4.0);
    assert_relative_eq!(m.get(0, 1), 3.0);
    assert_relative_eq!(m.get(1, 0), 3.0);
    assert_relative_eq!(m.get(1, 1), 4.0);
}

// ============================================================================
// Products and Traces
// ============================================================================

#[test]
fn test_mat_mul() {
    let a = SymMatrix::from_row_major(2, vec![1.0, 2.0, 2.0, 3.0]);
    let b = SymMatrix::from_row_major(2, vec![0.0, 1.0, 1.0, 0.0]);
    let p = a.mat_mul(&b);
    assert_relative_eq!(p.get(0, 0), 2.0);
    assert_relative_eq!(p.get(0, 1), 1.0);
    assert_relative_eq!(p.get(1, 0), 3.0);
    assert_relative_eq!(p.get(1, 1), 2.0);
}

#[test]
fn test_trace_product_matches_mat_mul() {
    let a = SymMatrix::from_row_major(2, vec![1.0, 2.0, 2.0, 3.0]);
    let b = SymMatrix::from_row_major(2, vec![4.0, 0.5, 0.5, 2.0]);
    assert_relative_eq!(a.trace_product(&b), a.mat_mul(&b).trace());
}

#[test]
fn test_trace_diag_product() {
    let a = SymMatrix::from_row_major(2, vec![1.0, 2.0, 2.0, 3.0]);
    assert_relative_eq!(a.trace_diag_product(&[2.0, 10.0]), 2.0 + 30.0);
}

#[test]
fn test_hadamard() {
    let a = SymMatrix::from_row_major(2, vec![1.0, 2.0, 2.0, 3.0]);
    let b = SymMatrix::from_row_major(2, vec![2.0, 0.0, 0.0, 5.0]);
    let h = a.hadamard(&b);
    assert_relative_eq!(h.get(0, 0), 2.0);
    assert_relative_eq!(h.get(0, 1), 0.0);
    assert_relative_eq!(h.get(1, 1), 15.0);
}

#[test]
fn test_mul_vec_and_quadratic_form() {
    let a = SymMatrix::from_row_major(2, vec![2.0, 1.0, 1.0, 3.0]);
    let x = [1.0, -1.0];
    let ax = a.mul_vec(&x);
    assert_relative_eq!(ax[0], 1.0);
    assert_relative_eq!(ax[1], -2.0);
    // x' A x = 1 + 2 = 3
    assert_relative_eq!(a.quadratic_form(&x), 3.0);
}

// ============================================================================
// Symmetry Utilities
// ============================================================================

#[test]
fn test_max_asymmetry_and_symmetrize() {
    let mut m = SymMatrix::from_row_major(2, vec![1.0, 2.0, 2.5, 1.0]);
    assert_relative_eq!(m.max_asymmetry(), 0.5);
    m.symmetrize();
    assert_eq!(m.max_asymmetry(), 0.0);
    assert_relative_eq!(m.get(0, 1), 2.25);
}

// ============================================================================
// Inversion
// ============================================================================

#[test]
fn test_inverse_of_identity() {
    let m = SymMatrix::<f64>::identity(4);
    let inv = m.inverse().unwrap();
    for i in 0..4 {
        for j in 0..4 {
            assert_relative_eq!(inv.get(i, j), if i == j { 1.0 } else { 0.0 });
        }
    }
}

#[test]
fn test_inverse_of_known_spd_matrix() {
    // [[2, 1], [1, 2]] has inverse [[2, -1], [-1, 2]] / 3.
    let m = SymMatrix::from_row_major(2, vec![2.0, 1.0, 1.0, 2.0]);
    let inv = m.inverse().unwrap();
    assert_relative_eq!(inv.get(0, 0), 2.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(inv.get(0, 1), -1.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(inv.get(1, 1), 2.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn test_inverse_round_trip() {
    let m = SymMatrix::from_row_major(
        3,
        vec![4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 5.0],
    );
    let inv = m.inverse().unwrap();
    let product = m.mat_mul(&inv);
    for i in 0..3 {
        for j in 0..3 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_relative_eq!(product.get(i, j), expected, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_singular_matrix_falls_back_to_pseudo_inverse() {
    // Rank-1 matrix: Cholesky and QR fail, the pseudo-inverse does not.
    let m = SymMatrix::from_row_major(2, vec![1.0, 1.0, 1.0, 1.0]);
    let inv = m.inverse();
    assert!(inv.is_some());
}
