//! IO module for diagnostic artifact export

mod volume_io;

pub use volume_io::{
    artifact_basename, tile_origin, DiskVolumeExporter, VolumeExporter, VolumeIoError,
};
