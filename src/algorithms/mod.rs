//! Layer 3: Algorithms
//!
//! # Purpose
//!
//! This layer provides the core spatial-coupling algorithms:
//! - Adjacency graph construction over grid locations
//! - The lazily memoized covariance matrix cache
//! - The closed set of spatial prior variants and their second-order
//!   precision structures
//!
//! # Architecture
//!
//! ```text
//! Layer 5: API
//!   ↓
//! Layer 4: Engine
//!   ↓
//! Layer 3: Algorithms ← You are here
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// First- and second-order neighbour lists.
pub mod neighborhood;

/// Distance-derived covariance matrix cache.
pub mod covariance;

/// Spatial prior variants and precision assembly.
pub mod priors;
