//! Grid coordinate utilities.
//!
//! ## Purpose
//!
//! This module provides the coordinate-list primitives underneath the
//! adjacency graph and the distance matrix: the (z, y, x) ordering
//! invariant, grid extents, scalar offsets, a binary search over the
//! monotone offset list, and conversion to physical positions.
//!
//! ## Key concepts
//!
//! * **Offset**: `z * (xsize * ysize) + y * xsize + x`, where each size
//!   is one more than the maximum coordinate value along that axis. For
//!   a correctly ordered list, offsets are strictly increasing, so
//!   membership queries are O(log N) binary searches.
//! * **Ordering**: Ascending in z, then y, then x. Checked via the sign
//!   of consecutive coordinate deltas.
//!
//! ## Invariants
//!
//! * Coordinates are non-negative integers.
//! * `compute_offsets` output is strictly increasing for ordered input.
//!
//! ## Non-goals
//!
//! * This module does not build neighbour lists (see
//!   `algorithms::neighborhood`).

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// External dependencies
use num_traits::Float;

/// One grid location: `[x, y, z]` integer indices.
pub type GridCoord = [i64; 3];

// ============================================================================
// Ordering
// ============================================================================

/// Check that coordinates are sorted ascending by (z, y, x).
///
/// Returns the index of the first entry whose successor is out of order,
/// or `None` if the list is correctly ordered.
///
/// The test mirrors the offset ordering without computing offsets: the
/// signed digit `sign(dx) + 10*sign(dy) + 100*sign(dz)` of each
/// consecutive difference must be positive.
pub fn first_unordered(coords: &[GridCoord]) -> Option<usize> {
    for v in 0..coords.len().saturating_sub(1) {
        let a = coords[v];
        let b = coords[v + 1];
        let d = (b[0] - a[0]).signum() + 10 * (b[1] - a[1]).signum() + 100 * (b[2] - a[2]).signum();
        if d <= 0 {
            return Some(v);
        }
    }
    None
}

// ============================================================================
// Extents and Offsets
// ============================================================================

/// Grid extents: one more than the maximum coordinate along each axis.
#[inline]
pub fn grid_extents(coords: &[GridCoord]) -> [i64; 3] {
    let mut ext = [0i64; 3];
    for c in coords {
        for (axis, e) in ext.iter_mut().enumerate() {
            if c[axis] + 1 > *e {
                *e = c[axis] + 1;
            }
        }
    }
    ext
}

/// Scalar offset of each coordinate into the bounding grid.
///
/// For a (z, y, x)-ordered list, the result is strictly increasing.
pub fn compute_offsets(coords: &[GridCoord], extents: [i64; 3]) -> Vec<i64> {
    let [xsize, ysize, _] = extents;
    coords
        .iter()
        .map(|c| c[2] * xsize * ysize + c[1] * xsize + c[0])
        .collect()
}

/// Binary search for an offset in a strictly increasing offset list.
///
/// Returns the index of the matching location, or `None` if no location
/// exists at that offset.
#[inline]
pub fn find_offset(offsets: &[i64], target: i64) -> Option<usize> {
    offsets.binary_search(&target).ok()
}

// ============================================================================
// Physical Positions
// ============================================================================

/// Convert grid coordinates to physical positions by scaling each axis
/// with the voxel dimensions (typically millimetres).
pub fn to_positions<T: Float>(coords: &[GridCoord], voxel_dims: [T; 3]) -> Vec<[T; 3]> {
    coords
        .iter()
        .map(|c| {
            [
                T::from(c[0]).unwrap_or_else(T::zero) * voxel_dims[0],
                T::from(c[1]).unwrap_or_else(T::zero) * voxel_dims[1],
                T::from(c[2]).unwrap_or_else(T::zero) * voxel_dims[2],
            ]
        })
        .collect()
}
