//! rustmvs: tile-resident semi-global matching for multi-view depth maps
//!
//! The crate orchestrates the SGM cost-volume pipeline for one tile of a
//! reference view at a time: candidate depths are uploaded, best and
//! second-best similarity volumes are accumulated across the neighbor
//! cameras, the volume is optionally filtered along the image axes, and the
//! minimum-cost depth per pixel is extracted into a depth/similarity map.
//!
//! The numeric kernels themselves live behind the
//! [`ComputeEngine`](device::ComputeEngine) trait and are supplied by the
//! caller; this crate owns buffer lifetimes, stage ordering and diagnostics.
//! All device buffers are allocated once, at
//! [`SgmTileEngine`](sgm::SgmTileEngine) construction, for the worst-case
//! tile extent, so the memory footprint of a run is known before the first
//! tile is processed.

pub mod config;
pub mod core;
pub mod device;
pub mod io;
pub mod sgm;
pub mod test_utils;

pub use crate::config::{ConfigError, ConfigLoader, FilteringAxes, MvsConfig, SgmParams, TileParams};
pub use crate::core::{DepthSim, DepthSimMap, DeviceCamera, Range, Roi, Tile, ViewId};
pub use crate::device::{
    AllocationError, CameraLoader, ComputeEngine, DeviceCameraCache, DeviceCameraHandle,
    DeviceStream, TSim, TSimAcc, TSIM_NO_MATCH,
};
pub use crate::io::{DiskVolumeExporter, VolumeExporter, VolumeIoError};
pub use crate::sgm::{SgmDepthList, SgmError, SgmTileEngine};
