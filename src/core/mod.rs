//! Core data structures for rustmvs

pub mod camera;
pub mod types;

pub use camera::DeviceCamera;
pub use types::{div_ceil, DepthSim, DepthSimMap, Range, Roi, Tile, ViewId};
