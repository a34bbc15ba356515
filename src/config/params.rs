//! Parameter structures for the SGM pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

/// Axes walked by the cross-path cost filtering kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteringAxes {
    /// Aggregate along image rows
    pub x: bool,
    /// Aggregate along image columns
    pub y: bool,
}

impl Default for FilteringAxes {
    fn default() -> Self {
        Self { x: true, y: true }
    }
}

impl fmt::Display for FilteringAxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.x {
            write!(f, "X")?;
        }
        if self.y {
            write!(f, "Y")?;
        }
        if !self.x && !self.y {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// Semi-global matching parameters, immutable for an engine's lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SgmParams {
    /// Working image scale (pyramid level downscale)
    pub scale: u32,
    /// Pixel step at the working scale
    pub step_xy: u32,
    /// Maximum number of candidate depths per tile
    pub max_depths: usize,
    /// Run cross-path cost filtering before depth extraction
    pub optimize_volume: bool,
    /// Axes walked by the filtering kernel
    pub filtering_axes: FilteringAxes,
    /// Export intermediate volumes and the final depth/sim map
    pub export_intermediate_results: bool,
    /// Small-jump smoothing penalty forwarded to the filtering kernel
    pub p1: f64,
    /// Large-jump smoothing penalty weighting forwarded to the filtering kernel
    pub p2_weighting: f64,
}

impl Default for SgmParams {
    fn default() -> Self {
        Self {
            scale: 2,
            step_xy: 2,
            max_depths: 1500,
            optimize_volume: true,
            filtering_axes: FilteringAxes::default(),
            export_intermediate_results: false,
            p1: 10.0,
            p2_weighting: 100.0,
        }
    }
}

impl SgmParams {
    /// Combined downscale between full resolution and the cost volume grid
    pub fn downscale(&self) -> u32 {
        self.scale.max(1) * self.step_xy.max(1)
    }
}

/// Worst-case tile shape in full-resolution pixels.
///
/// Engine buffers are sized once from these bounds; every tile processed by
/// the engine must fit inside them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TileParams {
    /// Maximum tile width
    pub width: usize,
    /// Maximum tile height
    pub height: usize,
}

impl Default for TileParams {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgm_params_default() {
        let params = SgmParams::default();
        assert_eq!(params.scale, 2);
        assert_eq!(params.step_xy, 2);
        assert_eq!(params.downscale(), 4);
        assert!(params.optimize_volume);
        assert!(!params.export_intermediate_results);
    }

    #[test]
    fn test_downscale_clamps_zero() {
        let params = SgmParams {
            scale: 0,
            step_xy: 3,
            ..Default::default()
        };
        assert_eq!(params.downscale(), 3);
    }

    #[test]
    fn test_filtering_axes_display() {
        assert_eq!(FilteringAxes::default().to_string(), "XY");
        let only_y = FilteringAxes { x: false, y: true };
        assert_eq!(only_y.to_string(), "Y");
        let none = FilteringAxes { x: false, y: false };
        assert_eq!(none.to_string(), "none");
    }
}
