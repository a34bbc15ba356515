//! Device buffer lifecycle, camera cache and compute engine contract

pub mod cache;
pub mod compute;
pub mod memory;

pub use cache::{CameraLoader, DeviceCameraCache, DeviceCameraHandle};
pub use compute::{ComputeEngine, TSim, TSimAcc, TSIM_NO_MATCH};
pub use memory::{AllocationError, DeviceBuffer2D, DeviceStream, DeviceVolume, PITCH_ALIGNMENT};
