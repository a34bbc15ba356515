//! Basic geometric types shared across the pipeline

use std::fmt;

/// Identifier of a camera view in the multi-view setup
pub type ViewId = u32;

/// Half-open index range `[begin, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub begin: usize,
    pub end: usize,
}

impl Range {
    /// Create a new range
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// Number of indices covered by the range
    pub fn size(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    /// Whether the range covers no indices
    pub fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    /// Whether `index` falls inside the range
    pub fn contains(&self, index: usize) -> bool {
        index >= self.begin && index < self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// Rectangular region of interest in full-resolution pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roi {
    pub x: Range,
    pub y: Range,
}

impl Roi {
    /// Create an ROI from pixel bounds
    pub fn new(x_begin: usize, x_end: usize, y_begin: usize, y_end: usize) -> Self {
        Self {
            x: Range::new(x_begin, x_end),
            y: Range::new(y_begin, y_end),
        }
    }

    /// ROI width in pixels
    pub fn width(&self) -> usize {
        self.x.size()
    }

    /// ROI height in pixels
    pub fn height(&self) -> usize {
        self.y.size()
    }

    /// Whether the ROI covers no pixels
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty()
    }

    /// Downscale the ROI bounds by an integer factor.
    ///
    /// Both ends use ceiling division so the downscaled region covers every
    /// contributing full-resolution pixel and never exceeds the extent
    /// obtained by ceiling-dividing the full image size.
    pub fn downscale(&self, factor: u32) -> Roi {
        let f = factor.max(1) as usize;
        Roi {
            x: Range::new(div_ceil(self.x.begin, f), div_ceil(self.x.end, f)),
            y: Range::new(div_ceil(self.y.begin, f), div_ceil(self.y.end, f)),
        }
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={} y={}", self.x, self.y)
    }
}

/// Ceiling integer division
pub fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// One tile of a reference view to estimate, with its neighbor cameras.
///
/// Immutable and caller-owned; lives for a single pipeline invocation.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Reference camera view id
    pub rc: ViewId,
    /// Neighbor camera view ids used for photometric matching, in order
    pub sgm_tcams: Vec<ViewId>,
    /// Tile region in full-resolution pixel coordinates
    pub roi: Roi,
    /// Total number of tiles covering the reference view (artifact naming only)
    pub nb_tiles: usize,
}

/// Per-pixel result: selected metric depth and its matching similarity.
///
/// `depth < 0` marks an invalid pixel (no depth retained).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSim {
    pub depth: f32,
    pub sim: f32,
}

impl Default for DepthSim {
    fn default() -> Self {
        // invalid depth, worst similarity
        Self {
            depth: -1.0,
            sim: 1.0,
        }
    }
}

/// Dense 2D grid of (depth, similarity) pairs, the pipeline's terminal artifact
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSimMap {
    width: usize,
    height: usize,
    data: Vec<DepthSim>,
}

impl DepthSimMap {
    /// Create a map filled with invalid entries
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![DepthSim::default(); width * height],
        }
    }

    /// Map width in output pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Map height in output pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Entry at output pixel `(x, y)`
    pub fn at(&self, x: usize, y: usize) -> DepthSim {
        self.data[y * self.width + x]
    }

    /// Mutable entry at output pixel `(x, y)`
    pub fn at_mut(&mut self, x: usize, y: usize) -> &mut DepthSim {
        &mut self.data[y * self.width + x]
    }

    /// Row-major view of all entries
    pub fn as_slice(&self) -> &[DepthSim] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_size() {
        let r = Range::new(10, 25);
        assert_eq!(r.size(), 15);
        assert!(!r.is_empty());
        assert!(r.contains(10));
        assert!(!r.contains(25));
    }

    #[test]
    fn test_empty_range() {
        let r = Range::new(5, 5);
        assert!(r.is_empty());
        assert_eq!(r.size(), 0);
    }

    #[test]
    fn test_roi_downscale_exact() {
        let roi = Roi::new(0, 1024, 512, 1024);
        let down = roi.downscale(4);
        assert_eq!(down, Roi::new(0, 256, 128, 256));
    }

    #[test]
    fn test_roi_downscale_rounds_up() {
        let roi = Roi::new(0, 1022, 0, 7);
        let down = roi.downscale(4);
        assert_eq!(down.x.end, 256);
        assert_eq!(down.y.end, 2);
    }

    #[test]
    fn test_depth_sim_default_invalid() {
        let ds = DepthSim::default();
        assert!(ds.depth < 0.0);
        assert_eq!(ds.sim, 1.0);
    }

    #[test]
    fn test_depth_sim_map_indexing() {
        let mut map = DepthSimMap::new(4, 3);
        map.at_mut(2, 1).depth = 3.5;
        assert_eq!(map.at(2, 1).depth, 3.5);
        assert_eq!(map.as_slice().len(), 12);
    }
}
