#![cfg(feature = "dev")]

use approx::assert_relative_eq;
use svb_rs::internals::math::distance::{distance_matrix, DistanceMetric};

// ============================================================================
// Metrics
// ============================================================================

#[test]
fn test_euclidean_distance() {
    let a = [0.0, 0.0, 0.0];
    let b = [3.0, 4.0, 0.0];
    assert_relative_eq!(DistanceMetric::Euclidean.distance(&a, &b), 5.0);
}

#[test]
fn test_euclidean_distance_3d() {
    let a = [1.0, 2.0, 3.0];
    let b = [4.0, 6.0, 8.0];
    // diffs 3, 4, 5; sqrt(50)
    assert_relative_eq!(
        DistanceMetric::Euclidean.distance(&a, &b),
        50.0f64.sqrt()
    );
}

#[test]
fn test_manhattan_distance() {
    let a = [1.0, 2.0, 0.0];
    let b = [4.0, 6.0, 1.0];
    assert_relative_eq!(DistanceMetric::Manhattan.distance(&a, &b), 8.0);
}

#[test]
fn test_near_squared_euclidean() {
    let a = [0.0, 0.0, 0.0];
    let b = [3.0, 4.0, 0.0];
    // (3^2 + 4^2)^0.995 = 25^0.995
    assert_relative_eq!(
        DistanceMetric::NearSquaredEuclidean.distance(&a, &b),
        25.0f64.powf(0.995)
    );
}

#[test]
fn test_distance_is_zero_at_same_point() {
    let p = [1.5, -2.0, 3.0];
    for metric in [
        DistanceMetric::Euclidean,
        DistanceMetric::NearSquaredEuclidean,
        DistanceMetric::Manhattan,
    ] {
        assert_relative_eq!(metric.distance(&p, &p), 0.0);
    }
}

// ============================================================================
// Distance Matrix
// ============================================================================

#[test]
fn test_matrix_symmetric_with_zero_diagonal() {
    let positions = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 2.0, 0.0],
        [1.0, 2.0, 3.0],
    ];
    let m = distance_matrix(&positions, DistanceMetric::Euclidean);

    assert_eq!(m.n(), 4);
    for i in 0..4 {
        assert_relative_eq!(m.get(i, i), 0.0);
        for j in 0..4 {
            assert_relative_eq!(m.get(i, j), m.get(j, i));
        }
    }
    assert_relative_eq!(m.get(0, 1), 1.0);
    assert_relative_eq!(m.get(0, 2), 2.0);
}
