#![cfg(feature = "dev")]

use svb_rs::internals::primitives::errors::SvbError;

// ============================================================================
// Display
// ============================================================================

#[test]
fn test_display_carries_context() {
    let msg = SvbError::UnorderedCoordinates { index: 7 }.to_string();
    assert!(msg.contains('7') && msg.contains('8'), "{}", msg);

    let msg = SvbError::UnknownPriorCode('Q').to_string();
    assert!(msg.contains('Q'), "{}", msg);

    let msg = SvbError::PriorSpecLength {
        expected: 4,
        got: 2,
    }
    .to_string();
    assert!(msg.contains('4') && msg.contains('2'), "{}", msg);

    let msg = SvbError::AsymmetricAdjacency {
        voxel: 3,
        neighbour: 9,
    }
    .to_string();
    assert!(msg.contains('3') && msg.contains('9'), "{}", msg);
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_config_errors_classified() {
    assert!(SvbError::EmptyCoordinates.is_config());
    assert!(SvbError::UnorderedCoordinates { index: 0 }.is_config());
    assert!(SvbError::UnknownPriorCode('x').is_config());
    assert!(SvbError::MissingFixedDelta.is_config());
    assert!(SvbError::InvalidRateLimit(1.0).is_config());
}

#[test]
fn test_internal_faults_classified() {
    let e = SvbError::AsymmetricAdjacency {
        voxel: 1,
        neighbour: 2,
    };
    assert!(e.is_internal());
    assert!(!e.is_config());

    let e = SvbError::AsymmetricMatrix {
        max_error: 1.0,
        max_value: 2.0,
    };
    assert!(e.is_internal());
}

#[test]
fn test_numerical_errors_are_neither() {
    let e = SvbError::SingularMatrix { size: 4 };
    assert!(!e.is_internal());
    assert!(!e.is_config());
}

#[cfg(feature = "std")]
#[test]
fn test_implements_error_trait() {
    fn takes_error<E: std::error::Error>(_: E) {}
    takes_error(SvbError::EmptyCoordinates);
}
