//! Diagnostic export of similarity volumes and depth/sim maps
//!
//! Per tagged pipeline stage the exporter produces three artifacts: a raw
//! volume dump, a cross-section visualization and a per-pixel statistics
//! table, plus the final depth/sim map. Artifacts are named by reference
//! view id, scale, stage tag and, when more than one tile covers the view,
//! the tile origin.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::{DepthSimMap, Tile, ViewId};
use crate::device::{DeviceVolume, TSim};

/// Number of sample pixels per axis in the statistics table
const STATS_SAMPLES_PER_AXIS: usize = 3;

#[derive(Debug, Error)]
pub enum VolumeIoError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir { path: String, source: std::io::Error },
    #[error("failed to write artifact {path}: {source}")]
    Write { path: String, source: std::io::Error },
}

/// Basename for a diagnostic artifact.
///
/// `tile_origin` is appended only when present, i.e. when more than one tile
/// covers the view.
pub fn artifact_basename(
    rc: ViewId,
    kind: &str,
    scale: u32,
    tag: &str,
    tile_origin: Option<(usize, usize)>,
) -> String {
    let mut name = format!("{rc}_{kind}_scale{scale}");
    if !tag.is_empty() {
        name.push('_');
        name.push_str(tag);
    }
    if let Some((x, y)) = tile_origin {
        name.push_str(&format!("_x{x}_y{y}"));
    }
    name
}

/// Tile origin to embed in artifact names, or `None` for a single-tile view
pub fn tile_origin(tile: &Tile) -> Option<(usize, usize)> {
    (tile.nb_tiles > 1).then(|| (tile.roi.x.begin, tile.roi.y.begin))
}

/// Sink for diagnostic volume and depth/sim map artifacts.
///
/// Implementations own the artifact encoding; the engine only decides when
/// to export and with which stage tag.
pub trait VolumeExporter: Send + Sync {
    /// Export one tagged similarity volume (raw dump, cross-section, stats)
    fn export_volume(
        &self,
        volume: &DeviceVolume<TSim>,
        depths: &[f32],
        tile: &Tile,
        scale: u32,
        tag: &str,
    ) -> Result<(), VolumeIoError>;

    /// Export the final depth/sim map of a tile
    fn export_depth_sim_map(
        &self,
        map: &DepthSimMap,
        tile: &Tile,
        scale: u32,
        step_xy: u32,
    ) -> Result<(), VolumeIoError>;
}

/// File-based exporter writing raw binary dumps and CSV tables
pub struct DiskVolumeExporter {
    out_dir: PathBuf,
}

impl DiskVolumeExporter {
    /// Create an exporter rooted at `out_dir`, creating the directory
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Result<Self, VolumeIoError> {
        let out_dir = out_dir.as_ref().to_path_buf();
        fs::create_dir_all(&out_dir).map_err(|source| VolumeIoError::CreateDir {
            path: out_dir.display().to_string(),
            source,
        })?;
        Ok(Self { out_dir })
    }

    fn create(&self, file_name: &str) -> Result<(PathBuf, BufWriter<File>), VolumeIoError> {
        let path = self.out_dir.join(file_name);
        let file = File::create(&path).map_err(|source| VolumeIoError::Write {
            path: path.display().to_string(),
            source,
        })?;
        Ok((path, BufWriter::new(file)))
    }

    fn write_err(path: &Path, source: std::io::Error) -> VolumeIoError {
        VolumeIoError::Write {
            path: path.display().to_string(),
            source,
        }
    }

    /// Raw dump: little-endian u32 extent header followed by tight cells
    fn write_raw_volume(
        &self,
        volume: &DeviceVolume<TSim>,
        base: &str,
    ) -> Result<(), VolumeIoError> {
        let (w, h, d) = volume.dims();
        let (path, mut writer) = self.create(&format!("{base}.vol"))?;
        for dim in [w, h, d] {
            writer
                .write_all(&(dim as u32).to_le_bytes())
                .map_err(|e| Self::write_err(&path, e))?;
        }
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    writer
                        .write_all(&[volume.at(x, y, z)])
                        .map_err(|e| Self::write_err(&path, e))?;
                }
            }
        }
        Ok(())
    }

    /// Cross-section at the middle volume row, one CSV line per (x, z) cell
    fn write_cross_section(
        &self,
        volume: &DeviceVolume<TSim>,
        base: &str,
    ) -> Result<(), VolumeIoError> {
        let (w, h, d) = volume.dims();
        let y = h / 2;
        let (path, mut writer) = self.create(&format!("{base}_cross.csv"))?;
        writeln!(writer, "x,z,cost").map_err(|e| Self::write_err(&path, e))?;
        for z in 0..d {
            for x in 0..w {
                writeln!(writer, "{},{},{}", x, z, volume.at(x, y, z))
                    .map_err(|e| Self::write_err(&path, e))?;
            }
        }
        Ok(())
    }

    /// Per-pixel statistics at a sparse sample grid: full cost profile along
    /// the depth axis for each sampled pixel
    fn write_stats(
        &self,
        volume: &DeviceVolume<TSim>,
        depths: &[f32],
        base: &str,
    ) -> Result<(), VolumeIoError> {
        let (w, h, d) = volume.dims();
        let (path, mut writer) = self.create(&format!("{base}_stats.csv"))?;
        writeln!(writer, "x,y,z,depth,cost").map_err(|e| Self::write_err(&path, e))?;
        let n = STATS_SAMPLES_PER_AXIS;
        for sy in 0..n {
            for sx in 0..n {
                let x = (w.saturating_sub(1)) * sx / (n - 1).max(1);
                let y = (h.saturating_sub(1)) * sy / (n - 1).max(1);
                for z in 0..d.min(depths.len()) {
                    writeln!(writer, "{},{},{},{},{}", x, y, z, depths[z], volume.at(x, y, z))
                        .map_err(|e| Self::write_err(&path, e))?;
                }
            }
        }
        Ok(())
    }
}

impl VolumeExporter for DiskVolumeExporter {
    fn export_volume(
        &self,
        volume: &DeviceVolume<TSim>,
        depths: &[f32],
        tile: &Tile,
        scale: u32,
        tag: &str,
    ) -> Result<(), VolumeIoError> {
        let origin = tile_origin(tile);
        let volume_base = artifact_basename(tile.rc, "volume", scale, tag, origin);
        let stats_base = artifact_basename(tile.rc, "stats", scale, tag, origin);
        self.write_raw_volume(volume, &volume_base)?;
        self.write_cross_section(volume, &volume_base)?;
        self.write_stats(volume, depths, &stats_base)?;
        Ok(())
    }

    fn export_depth_sim_map(
        &self,
        map: &DepthSimMap,
        tile: &Tile,
        scale: u32,
        step_xy: u32,
    ) -> Result<(), VolumeIoError> {
        let base = artifact_basename(
            tile.rc,
            "depthSimMap",
            scale * step_xy.max(1),
            "sgm",
            tile_origin(tile),
        );
        let (path, mut writer) = self.create(&format!("{base}.csv"))?;
        writeln!(writer, "x,y,depth,sim").map_err(|e| Self::write_err(&path, e))?;
        for y in 0..map.height() {
            for x in 0..map.width() {
                let ds = map.at(x, y);
                writeln!(writer, "{},{},{},{}", x, y, ds.depth, ds.sim)
                    .map_err(|e| Self::write_err(&path, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Roi;
    use crate::device::DeviceStream;

    fn test_tile(nb_tiles: usize) -> Tile {
        Tile {
            rc: 12,
            sgm_tcams: vec![13, 14],
            roi: Roi::new(256, 512, 0, 128),
            nb_tiles,
        }
    }

    #[test]
    fn test_artifact_basename_single_tile() {
        let name = artifact_basename(12, "volume", 2, "beforeFiltering", None);
        assert_eq!(name, "12_volume_scale2_beforeFiltering");
    }

    #[test]
    fn test_artifact_basename_with_origin() {
        let name = artifact_basename(12, "volume", 2, "afterFiltering", Some((256, 0)));
        assert_eq!(name, "12_volume_scale2_afterFiltering_x256_y0");
    }

    #[test]
    fn test_tile_origin_rule() {
        assert_eq!(tile_origin(&test_tile(1)), None);
        assert_eq!(tile_origin(&test_tile(4)), Some((256, 0)));
    }

    #[test]
    fn test_export_volume_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DiskVolumeExporter::new(dir.path()).unwrap();

        let stream = DeviceStream::new();
        let mut volume = DeviceVolume::<TSim>::new(8, 6, 4, "test").unwrap();
        volume.fill(255, &stream);
        *volume.at_mut(2, 3, 1) = 10;

        let tile = test_tile(1);
        exporter
            .export_volume(&volume, &[1.0, 1.5, 2.0, 2.5], &tile, 2, "beforeFiltering")
            .unwrap();

        for name in [
            "12_volume_scale2_beforeFiltering.vol",
            "12_volume_scale2_beforeFiltering_cross.csv",
            "12_stats_scale2_beforeFiltering_stats.csv",
        ] {
            let path = dir.path().join(name);
            assert!(path.exists(), "missing artifact {name}");
            assert!(fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn test_export_depth_sim_map() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DiskVolumeExporter::new(dir.path()).unwrap();

        let mut map = DepthSimMap::new(4, 2);
        map.at_mut(1, 0).depth = 2.5;
        let tile = test_tile(4);
        exporter.export_depth_sim_map(&map, &tile, 2, 2).unwrap();

        let path = dir.path().join("12_depthSimMap_scale4_sgm_x256_y0.csv");
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("x,y,depth,sim"));
        assert!(content.contains("1,0,2.5,1"));
    }
}
