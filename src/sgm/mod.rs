//! Semi-global matching tile engine
//!
//! This module hosts the tile-resident orchestration of the SGM depth-map
//! pipeline: per-tile candidate depths ([`SgmDepthList`]), and the
//! [`SgmTileEngine`] that owns preallocated device buffers and drives the
//! ordered stage sequence (depth upload, cost-volume construction across
//! neighbor cameras, optional cross-path filtering, best-depth extraction)
//! through an external compute engine.
//!
//! Engines are cheap to reuse: buffers are sized once, at construction, to
//! the worst-case tile extent, so one engine can process many tiles without
//! reallocation and its device memory footprint is known up front.

mod depth_list;
mod engine;

#[cfg(test)]
mod additional_tests;

use thiserror::Error;

use crate::core::{Roi, ViewId};
use crate::device::AllocationError;

pub use depth_list::SgmDepthList;
pub use engine::SgmTileEngine;

/// Fatal SGM pipeline errors.
///
/// Neither kind is recoverable inside the engine: a failed tile is reported
/// with its view id and region and the caller decides whether to skip,
/// retry with different parameters, or abort the run.
#[derive(Debug, Error)]
pub enum SgmError {
    /// Invalid tile inputs (empty neighbor list, empty or oversized depth
    /// list, tile region exceeding the allocated extent)
    #[error("cannot compute SGM for view {view_id} (tile {roi}): {reason}")]
    Configuration {
        view_id: ViewId,
        roi: Roi,
        reason: String,
    },
    /// Insufficient device memory at engine construction
    #[error("SGM engine allocation failed: {0}")]
    Allocation(#[from] AllocationError),
}
