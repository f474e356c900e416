//! Layer 2: Math
//!
//! # Purpose
//!
//! This layer provides pure mathematical machinery used throughout the
//! spatial engine:
//! - Distance metrics and the pairwise distance matrix
//! - Dense symmetric matrices and the linear algebra backend bridge
//! - One-dimensional descending-zero root finding
//!
//! These are reusable mathematical building blocks with no
//! algorithm-specific logic.
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine
//!   ↓
//! Layer 3: Algorithms
//!   ↓
//! Layer 2: Math ← You are here
//!   ↓
//! Layer 1: Primitives
//! ```

/// Distance metrics and the pairwise distance matrix.
pub mod distance;

/// Symmetric matrices and the nalgebra backend bridge.
pub mod linalg;

/// Descending-zero root finding.
pub mod rootfind;
