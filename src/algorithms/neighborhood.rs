//! Adjacency graph over grid locations.
//!
//! ## Purpose
//!
//! This module converts an ordered list of integer grid coordinates
//! into, for every location, the list of face-adjacent (first-order)
//! neighbours and the list of neighbour-of-neighbour (second-order)
//! neighbours. The shrinkage prior family reads both lists every
//! iteration.
//!
//! ## Design notes
//!
//! * **Offset binary search**: because the coordinate list is sorted by
//!   (z, y, x), scalar offsets are strictly increasing and "is there a
//!   location at offset O" is an O(log N) binary search rather than an
//!   O(N) scan.
//! * **Wrap-around**: naive offset probes can jump rows or slices (an
//!   x+1 probe from the last column of a row lands on the first column
//!   of the next row). The x and y probes are therefore additionally
//!   checked with a modulo test against the relevant axis size; z
//!   probes cannot wrap, they simply fall off the offset range.
//! * **Duplicates in second-order lists are intentional**: two distinct
//!   2-hop paths between the same pair of locations yield two entries,
//!   which makes the list equivalent to a row of the squared adjacency
//!   structure. The second-order shrinkage weighting depends on the
//!   exact multiplicity; do not deduplicate.
//!
//! ## Invariants
//!
//! * First-order adjacency is symmetric; each neighbour of `v` lists `v`
//!   exactly once. Violation is an internal-consistency fault, not a
//!   user error.
//! * Second-order lists never contain the origin location.
//!
//! ## Non-goals
//!
//! * Diagonal adjacency, periodic boundaries, distance weighting.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

// Internal dependencies
use crate::primitives::errors::SvbError;
use crate::primitives::grid::{self, GridCoord};

// ============================================================================
// Adjacency Graph
// ============================================================================

/// First- and second-order neighbour lists for every location.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyGraph {
    first: Vec<Vec<usize>>,
    second: Vec<Vec<usize>>,
}

impl AdjacencyGraph {
    /// Build the graph from (z, y, x)-ordered coordinates.
    ///
    /// `spatial_dims` limits the probe directions: 1 probes only along
    /// x, 2 adds y, 3 adds z.
    ///
    /// # Errors
    ///
    /// * [`SvbError::EmptyCoordinates`] for an empty list.
    /// * [`SvbError::UnorderedCoordinates`] if the list is not sorted —
    ///   the offset search gives wrong answers on unsorted input, so it
    ///   is rejected rather than silently producing a graph.
    /// * [`SvbError::AsymmetricAdjacency`] if first-order symmetry fails
    ///   during second-order construction (a logic fault).
    pub fn build(coords: &[GridCoord], spatial_dims: usize) -> Result<Self, SvbError> {
        if coords.is_empty() {
            return Err(SvbError::EmptyCoordinates);
        }
        if !(1..=3).contains(&spatial_dims) {
            return Err(SvbError::InvalidSpatialDims(spatial_dims));
        }
        if let Some(index) = grid::first_unordered(coords) {
            return Err(SvbError::UnorderedCoordinates { index });
        }

        let n = coords.len();
        let extents = grid::grid_extents(coords);
        let [xsize, ysize, _] = extents;
        let offsets = grid::compute_offsets(coords, extents);

        // Probe offsets for the six face-adjacent directions, in pairs
        // per axis; truncated by the configured dimensionality.
        let deltas: [i64; 6] = [
            1,
            -1,
            xsize,
            -xsize,
            xsize * ysize,
            -(xsize * ysize),
        ];
        let max_probe = spatial_dims * 2 - 1;

        let mut first: Vec<Vec<usize>> = Vec::with_capacity(n);
        for v in 0..n {
            let pos = offsets[v];
            let mut nbrs = Vec::new();
            for (probe, &delta) in deltas.iter().enumerate().take(max_probe + 1) {
                let id = match grid::find_offset(&offsets, pos + delta) {
                    Some(id) => id,
                    None => continue,
                };

                // Wrap-around rejection for the x and y probes: the probe
                // must stay within the same row (x) or slice (y).
                if probe < 4 {
                    let span = deltas[probe + 2].abs();
                    let ignore = if delta > 0 {
                        pos % span >= span - delta
                    } else {
                        pos % span < -delta
                    };
                    if ignore {
                        continue;
                    }
                }

                nbrs.push(id);
            }
            first.push(nbrs);
        }

        // Second order: every neighbour's neighbours, excluding the
        // origin itself but keeping duplicate entries. While walking, a
        // neighbour that does not list the origin exactly once exposes a
        // boundary-index bug above.
        let mut second: Vec<Vec<usize>> = Vec::with_capacity(n);
        for v in 0..n {
            let mut nbrs2 = Vec::new();
            for &n1 in &first[v] {
                let mut back_links = 0usize;
                for &n2 in &first[n1] {
                    if n2 == v {
                        back_links += 1;
                    } else {
                        nbrs2.push(n2);
                    }
                }
                if back_links != 1 {
                    return Err(SvbError::AsymmetricAdjacency {
                        voxel: v,
                        neighbour: n1,
                    });
                }
            }
            second.push(nbrs2);
        }

        Ok(Self { first, second })
    }

    /// Number of locations.
    #[inline]
    pub fn len(&self) -> usize {
        self.first.len()
    }

    /// True if the graph has no locations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// First-order neighbours of location `v`, in probe order.
    #[inline]
    pub fn neighbours(&self, v: usize) -> &[usize] {
        &self.first[v]
    }

    /// Second-order neighbours of location `v`, duplicates included.
    #[inline]
    pub fn neighbours2(&self, v: usize) -> &[usize] {
        &self.second[v]
    }

    /// Number of first-order neighbours of location `v`.
    #[inline]
    pub fn degree(&self, v: usize) -> usize {
        self.first[v].len()
    }
}
