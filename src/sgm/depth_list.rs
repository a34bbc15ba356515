//! Per-tile candidate depth list

use crate::core::Range;

/// Ordered depth hypotheses for one tile, plus the sub-range of hypotheses
/// that is geometrically valid against each neighbor camera.
///
/// Depths are monotonic along the reference viewing ray and shared read-only
/// across a tile's computation. The list is produced upstream by the
/// depth-candidate-range estimation, which is out of scope here.
#[derive(Debug, Clone)]
pub struct SgmDepthList {
    depths: Vec<f32>,
    /// Per neighbor camera index: (first depth index, depth count)
    tc_limits: Vec<(usize, usize)>,
}

impl SgmDepthList {
    /// Create a depth list from candidate depths and per-neighbor limits.
    ///
    /// `tc_limits[i]` is the `(first index, count)` sub-range of `depths` to
    /// test against the i-th neighbor camera of the tile.
    pub fn new(depths: Vec<f32>, tc_limits: Vec<(usize, usize)>) -> Self {
        Self { depths, tc_limits }
    }

    /// All candidate depths, in ray order
    pub fn depths(&self) -> &[f32] {
        &self.depths
    }

    /// Number of candidate depths
    pub fn len(&self) -> usize {
        self.depths.len()
    }

    /// Whether the list holds no candidate depths
    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    /// Number of per-neighbor sub-ranges
    pub fn tc_count(&self) -> usize {
        self.tc_limits.len()
    }

    /// Valid depth-index range for the `tci`-th neighbor camera
    pub fn tc_depth_range(&self, tci: usize) -> Range {
        let (first, count) = self.tc_limits[tci];
        Range::new(first, first + count)
    }

    /// Depth-index range covering the whole list
    pub fn full_range(&self) -> Range {
        Range::new(0, self.depths.len())
    }

    /// Whether the depths are monotonic (never reversing along the ray)
    pub fn is_monotonic(&self) -> bool {
        let increasing = self.depths.windows(2).all(|w| w[0] <= w[1]);
        let decreasing = self.depths.windows(2).all(|w| w[0] >= w[1]);
        increasing || decreasing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tc_depth_range() {
        let list = SgmDepthList::new(vec![1.0, 1.5, 2.0, 2.5], vec![(0, 4), (1, 2)]);
        assert_eq!(list.len(), 4);
        assert_eq!(list.tc_count(), 2);
        assert_eq!(list.tc_depth_range(0), Range::new(0, 4));
        assert_eq!(list.tc_depth_range(1), Range::new(1, 3));
        assert_eq!(list.full_range(), Range::new(0, 4));
    }

    #[test]
    fn test_empty_list() {
        let list = SgmDepthList::new(Vec::new(), Vec::new());
        assert!(list.is_empty());
        assert!(list.full_range().is_empty());
    }

    #[test]
    fn test_monotonic() {
        assert!(SgmDepthList::new(vec![1.0, 2.0, 2.0, 3.0], vec![]).is_monotonic());
        assert!(SgmDepthList::new(vec![3.0, 2.0, 1.0], vec![]).is_monotonic());
        assert!(!SgmDepthList::new(vec![1.0, 3.0, 2.0], vec![]).is_monotonic());
    }
}
