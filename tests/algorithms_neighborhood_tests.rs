#![cfg(feature = "dev")]

use svb_rs::internals::algorithms::neighborhood::AdjacencyGraph;
use svb_rs::internals::primitives::errors::SvbError;
use svb_rs::internals::primitives::grid::GridCoord;

// ============================================================================
// Helpers
// ============================================================================

/// Coordinates of a K x K x K cube starting at `origin`, in (z, y, x)
/// order.
fn cube(k: i64, origin: i64) -> Vec<GridCoord> {
    let mut coords = Vec::new();
    for z in 0..k {
        for y in 0..k {
            for x in 0..k {
                coords.push([x + origin, y + origin, z + origin]);
            }
        }
    }
    coords
}

// ============================================================================
// Single Location
// ============================================================================

#[test]
fn test_single_voxel_has_no_neighbours() {
    let graph = AdjacencyGraph::build(&[[1, 1, 1]], 3).unwrap();
    assert_eq!(graph.len(), 1);
    assert!(graph.neighbours(0).is_empty());
    assert!(graph.neighbours2(0).is_empty());
}

#[test]
fn test_single_voxel_at_origin() {
    let graph = AdjacencyGraph::build(&[[0, 0, 0]], 3).unwrap();
    assert_eq!(graph.len(), 1);
    assert!(graph.neighbours(0).is_empty());
    assert!(graph.neighbours2(0).is_empty());
}

// ============================================================================
// Collinear Runs
// ============================================================================

#[test]
fn test_line_along_x() {
    let coords: Vec<GridCoord> = (1..=5).map(|x| [x, 1, 1]).collect();
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();

    for v in 0..5 {
        let expected = if v == 0 || v == 4 { 1 } else { 2 };
        assert_eq!(graph.degree(v), expected, "voxel {}", v);
    }
}

#[test]
fn test_line_along_y() {
    let coords: Vec<GridCoord> = (1..=5).map(|y| [1, y, 1]).collect();
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();

    for v in 0..5 {
        let expected = if v == 0 || v == 4 { 1 } else { 2 };
        assert_eq!(graph.degree(v), expected, "voxel {}", v);
    }
}

#[test]
fn test_line_along_z() {
    let coords: Vec<GridCoord> = (1..=5).map(|z| [1, 1, z]).collect();
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();

    for v in 0..5 {
        let expected = if v == 0 || v == 4 { 1 } else { 2 };
        assert_eq!(graph.degree(v), expected, "voxel {}", v);
    }
}

// ============================================================================
// Cubic Grids
// ============================================================================

fn check_cube_neighbours(k: i64, origin: i64) {
    let coords = cube(k, origin);
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();
    assert_eq!(graph.len(), (k * k * k) as usize);

    let mut v = 0usize;
    for z in 0..k {
        for y in 0..k {
            for x in 0..k {
                let mut expected: Vec<usize> = Vec::new();
                if x != 0 {
                    expected.push(v - 1);
                }
                if x != k - 1 {
                    expected.push(v + 1);
                }
                if y != 0 {
                    expected.push(v - k as usize);
                }
                if y != k - 1 {
                    expected.push(v + k as usize);
                }
                if z != 0 {
                    expected.push(v - (k * k) as usize);
                }
                if z != k - 1 {
                    expected.push(v + (k * k) as usize);
                }

                assert_eq!(graph.degree(v), expected.len(), "voxel {}", v);
                for n in graph.neighbours(v) {
                    assert!(expected.contains(n), "voxel {} neighbour {}", v, n);
                }
                v += 1;
            }
        }
    }
}

#[test]
fn test_cube_from_zero() {
    check_cube_neighbours(5, 0);
}

#[test]
fn test_cube_from_one() {
    check_cube_neighbours(5, 1);
}

#[test]
fn test_cube_interior_has_six_neighbours() {
    let coords = cube(3, 0);
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();
    // Centre of a 3x3x3 cube: index 13.
    assert_eq!(graph.degree(13), 6);
    // Corner: strictly fewer.
    assert_eq!(graph.degree(0), 3);
}

// ============================================================================
// Symmetry
// ============================================================================

#[test]
fn test_first_order_symmetry() {
    let coords = cube(4, 0);
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();
    for a in 0..graph.len() {
        for &b in graph.neighbours(a) {
            assert!(
                graph.neighbours(b).contains(&a),
                "{} -> {} not symmetric",
                a,
                b
            );
        }
    }
}

// ============================================================================
// Second-Order Lists
// ============================================================================

#[test]
fn test_second_order_keeps_duplicates() {
    // 2x2 square in-plane: opposite corners are reachable by two 2-hop
    // paths and must appear twice.
    let coords: Vec<GridCoord> = vec![[0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 0]];
    let graph = AdjacencyGraph::build(&coords, 2).unwrap();

    assert_eq!(graph.neighbours2(0), &[3, 3]);
    assert_eq!(graph.neighbours2(3), &[0, 0]);
}

#[test]
fn test_second_order_excludes_self() {
    let coords = cube(3, 0);
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();
    for v in 0..graph.len() {
        assert!(!graph.neighbours2(v).contains(&v), "voxel {}", v);
    }
}

// ============================================================================
// Irregular Clusters
// ============================================================================

#[test]
fn test_irregular_cluster_degrees() {
    // Five locations: an L-shape in one plane plus one stacked above.
    let coords: Vec<GridCoord> = vec![
        [1, 1, 1],
        [2, 1, 1],
        [1, 2, 1],
        [2, 2, 1],
        [1, 1, 2],
    ];
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();

    assert_eq!(graph.degree(0), 3);
    assert_eq!(graph.degree(1), 2);
    assert_eq!(graph.degree(2), 2);
    assert_eq!(graph.degree(3), 2);
    assert_eq!(graph.degree(4), 1);
}

// ============================================================================
// Wrap-Around
// ============================================================================

#[test]
fn test_no_wraparound_across_rows() {
    // Offsets differ by one, but the locations sit on different rows.
    let coords: Vec<GridCoord> = vec![[1, 0, 0], [0, 1, 0]];
    let graph = AdjacencyGraph::build(&coords, 2).unwrap();
    assert!(graph.neighbours(0).is_empty());
    assert!(graph.neighbours(1).is_empty());
}

#[test]
fn test_no_wraparound_across_slices() {
    // Last row of one slice vs first row of the next.
    let coords: Vec<GridCoord> = vec![[0, 1, 0], [0, 0, 1]];
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();
    assert!(graph.neighbours(0).is_empty());
    assert!(graph.neighbours(1).is_empty());
}

// ============================================================================
// Input Rejection
// ============================================================================

#[test]
fn test_unordered_coordinates_rejected() {
    let coords: Vec<GridCoord> = vec![[1, 0, 0], [0, 0, 0]];
    let err = AdjacencyGraph::build(&coords, 3).unwrap_err();
    assert_eq!(err, SvbError::UnorderedCoordinates { index: 0 });
    assert!(err.is_config());
}

#[test]
fn test_duplicate_coordinates_rejected() {
    let coords: Vec<GridCoord> = vec![[0, 0, 0], [0, 0, 0]];
    let err = AdjacencyGraph::build(&coords, 3).unwrap_err();
    assert_eq!(err, SvbError::UnorderedCoordinates { index: 0 });
}

#[test]
fn test_empty_coordinates_rejected() {
    let err = AdjacencyGraph::build(&[], 3).unwrap_err();
    assert_eq!(err, SvbError::EmptyCoordinates);
}

#[test]
fn test_bad_dimensionality_rejected() {
    let err = AdjacencyGraph::build(&[[0, 0, 0]], 0).unwrap_err();
    assert_eq!(err, SvbError::InvalidSpatialDims(0));
    let err = AdjacencyGraph::build(&[[0, 0, 0]], 4).unwrap_err();
    assert_eq!(err, SvbError::InvalidSpatialDims(4));
}

// ============================================================================
// Dimensionality Truncation
// ============================================================================

#[test]
fn test_one_dimensional_probes_ignore_y() {
    // Two rows that touch in y; with dims = 1 only x probes run.
    let coords: Vec<GridCoord> = vec![[0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 0]];
    let graph = AdjacencyGraph::build(&coords, 1).unwrap();
    assert_eq!(graph.neighbours(0), &[1]);
    assert_eq!(graph.neighbours(2), &[3]);

    let graph2 = AdjacencyGraph::build(&coords, 2).unwrap();
    assert_eq!(graph2.degree(0), 2);
}
