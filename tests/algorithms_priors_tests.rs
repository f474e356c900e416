#![cfg(feature = "dev")]

use approx::assert_relative_eq;
use svb_rs::internals::algorithms::neighborhood::AdjacencyGraph;
use svb_rs::internals::algorithms::priors::{
    build_second_order_dirichlet, build_sts, parse_prior_spec, shrinkage_variant, PriorFamily,
    PriorType,
};
use svb_rs::internals::math::linalg::SymMatrix;
use svb_rs::internals::primitives::errors::SvbError;
use svb_rs::internals::primitives::grid::GridCoord;

// ============================================================================
// Codes and Families
// ============================================================================

#[test]
fn test_code_round_trip() {
    for c in ['N', 'I', 'A', 'm', 'M', 'p', 'P', 'S', 'D', 'R', 'F'] {
        let t = PriorType::from_code(c).unwrap();
        assert_eq!(t.code(), c);
    }
}

#[test]
fn test_unknown_code_rejected() {
    let err = PriorType::from_code('Q').unwrap_err();
    assert_eq!(err, SvbError::UnknownPriorCode('Q'));
    assert!(err.is_config());
}

#[test]
fn test_families() {
    assert_eq!(
        PriorType::Nonspatial.family(),
        PriorFamily::Nonspatial
    );
    assert_eq!(PriorType::Image.family(), PriorFamily::Nonspatial);
    assert_eq!(PriorType::Ard.family(), PriorFamily::Nonspatial);
    assert_eq!(
        PriorType::SecondOrderExact.family(),
        PriorFamily::Shrinkage
    );
    assert_eq!(PriorType::Mrf.family(), PriorFamily::Shrinkage);
    assert_eq!(PriorType::Smoothness.family(), PriorFamily::Evidence);
    assert_eq!(
        PriorType::SmoothnessFixed.family(),
        PriorFamily::Evidence
    );
}

#[test]
fn test_resource_needs() {
    assert!(PriorType::SecondOrderExact.needs_graph());
    assert!(!PriorType::SecondOrderExact.needs_cache());
    assert!(PriorType::Smoothness.needs_cache());
    assert!(!PriorType::Smoothness.needs_graph());
    assert!(!PriorType::Nonspatial.needs_graph());
    assert!(!PriorType::Nonspatial.needs_cache());
}

// ============================================================================
// Spec Parsing
// ============================================================================

#[test]
fn test_parse_plain_spec() {
    let types = parse_prior_spec("NSD", 3).unwrap();
    assert_eq!(
        types,
        vec![
            PriorType::Nonspatial,
            PriorType::SecondOrderExact,
            PriorType::Smoothness
        ]
    );
}

#[test]
fn test_parse_repeat_fills_to_count() {
    let types = parse_prior_spec("S+", 4).unwrap();
    assert_eq!(types, vec![PriorType::SecondOrderExact; 4]);

    let types = parse_prior_spec("NS+", 4).unwrap();
    assert_eq!(
        types,
        vec![
            PriorType::Nonspatial,
            PriorType::SecondOrderExact,
            PriorType::SecondOrderExact,
            PriorType::SecondOrderExact
        ]
    );
}

#[test]
fn test_parse_repeat_with_suffix() {
    let types = parse_prior_spec("NS+D", 4).unwrap();
    assert_eq!(
        types,
        vec![
            PriorType::Nonspatial,
            PriorType::SecondOrderExact,
            PriorType::SecondOrderExact,
            PriorType::Smoothness
        ]
    );
}

#[test]
fn test_parse_repeat_can_expand_to_nothing() {
    let types = parse_prior_spec("NS+D", 3).unwrap();
    assert_eq!(
        types,
        vec![
            PriorType::Nonspatial,
            PriorType::SecondOrderExact,
            PriorType::Smoothness
        ]
    );
}

#[test]
fn test_parse_length_mismatch_rejected() {
    let err = parse_prior_spec("NS", 3).unwrap_err();
    assert_eq!(
        err,
        SvbError::PriorSpecLength {
            expected: 3,
            got: 2
        }
    );

    let err = parse_prior_spec("NSDR", 3).unwrap_err();
    assert_eq!(
        err,
        SvbError::PriorSpecLength {
            expected: 3,
            got: 4
        }
    );
}

#[test]
fn test_parse_multiple_repeats_rejected() {
    let err = parse_prior_spec("N+S+", 5).unwrap_err();
    assert!(matches!(err, SvbError::MultipleRepeatMarkers(_)));
}

#[test]
fn test_parse_unknown_code_rejected() {
    let err = parse_prior_spec("NXN", 3).unwrap_err();
    assert_eq!(err, SvbError::UnknownPriorCode('X'));
}

#[test]
fn test_mixed_shrinkage_rejected() {
    let err = parse_prior_spec("SP", 2).unwrap_err();
    assert_eq!(
        err,
        SvbError::MixedShrinkagePriors {
            first: 'S',
            second: 'P'
        }
    );

    // The same variant twice is fine.
    assert!(parse_prior_spec("SS", 2).is_ok());
    // A shrinkage variant next to other families is fine.
    assert!(parse_prior_spec("NSD", 3).is_ok());
}

#[test]
fn test_shrinkage_variant_lookup() {
    let types = parse_prior_spec("NSD", 3).unwrap();
    assert_eq!(shrinkage_variant(&types), Some(PriorType::SecondOrderExact));

    let types = parse_prior_spec("ND", 2).unwrap();
    assert_eq!(shrinkage_variant(&types), None);
}

// ============================================================================
// Precision Weights
// ============================================================================

#[test]
fn test_shrinkage_precision_weights() {
    let w: f64 = PriorType::MrfDirichlet.shrinkage_precision_weight(4, 3);
    assert_relative_eq!(w, 6.0);

    let w: f64 = PriorType::Mrf.shrinkage_precision_weight(4, 3);
    assert_relative_eq!(w, 4.0 + 1e-8);

    let w: f64 = PriorType::SecondOrderDirichlet.shrinkage_precision_weight(4, 3);
    assert_relative_eq!(w, 36.0 + 4.0);

    let w: f64 = PriorType::SecondOrder.shrinkage_precision_weight(4, 3);
    assert_relative_eq!(w, 16.0 + 4.0);

    let w: f64 = PriorType::SecondOrderExact.shrinkage_precision_weight(4, 3);
    assert_relative_eq!(w, (4.0 + 1e-6) * (4.0 + 1e-6) + 4.0);

    let w: f64 = PriorType::Nonspatial.shrinkage_precision_weight(4, 3);
    assert_relative_eq!(w, 0.0);
}

// ============================================================================
// StS Assembly
// ============================================================================

/// O(N^3) reference: StS = (eps * I + L)^2 with L the graph Laplacian.
fn sts_reference(graph: &AdjacencyGraph) -> SymMatrix<f64> {
    let n = graph.len();
    let mut connect = SymMatrix::zeros(n);
    for v in 0..n {
        connect.set(v, v, 1e-6);
    }
    for v in 0..n {
        for &w in graph.neighbours(v) {
            connect.set(v, w, -1.0);
            connect.set(v, v, connect.get(v, v) + 1.0);
        }
    }
    connect.mat_mul(&connect)
}

#[test]
fn test_sts_matches_squared_laplacian() {
    let coords: Vec<GridCoord> = {
        let mut c = Vec::new();
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..3 {
                    c.push([x, y, z]);
                }
            }
        }
        c
    };
    let graph = AdjacencyGraph::build(&coords, 3).unwrap();

    let sts: SymMatrix<f64> = build_sts(&graph);
    let reference = sts_reference(&graph);

    for i in 0..graph.len() {
        for j in 0..graph.len() {
            assert_relative_eq!(
                sts.get(i, j),
                reference.get(i, j),
                epsilon = 1e-9,
                max_relative = 1e-9
            );
        }
    }
}

#[test]
fn test_sts_diagonal_and_pair_values() {
    // Two locations in a line: each has one neighbour.
    let coords: Vec<GridCoord> = vec![[0, 0, 0], [1, 0, 0]];
    let graph = AdjacencyGraph::build(&coords, 1).unwrap();
    let sts: SymMatrix<f64> = build_sts(&graph);

    let eps = 1e-6;
    assert_relative_eq!(sts.get(0, 0), 1.0 + (1.0 + eps) * (1.0 + eps));
    assert_relative_eq!(sts.get(0, 1), -(1.0 + 1.0 + 2.0 * eps));
    assert_relative_eq!(sts.get(0, 1), sts.get(1, 0));
}

// ============================================================================
// Dirichlet Second-Order Assembly
// ============================================================================

#[test]
fn test_second_order_dirichlet_values() {
    let coords: Vec<GridCoord> = vec![[0, 0, 0], [1, 0, 0], [2, 0, 0]];
    let graph = AdjacencyGraph::build(&coords, 1).unwrap();
    let m = build_second_order_dirichlet::<f64>(&graph, 1).unwrap();

    // dims = 1: diagonal 4 * 1 + nn, neighbours -4, +1 per 2nd-order
    // appearance.
    assert_relative_eq!(m.get(0, 0), 4.0 + 1.0);
    assert_relative_eq!(m.get(1, 1), 4.0 + 2.0);
    assert_relative_eq!(m.get(0, 1), -4.0);
    assert_relative_eq!(m.get(0, 2), 1.0);
    assert_eq!(m.max_asymmetry(), 0.0);
}
