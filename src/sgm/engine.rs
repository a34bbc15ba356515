//! Tile-resident SGM pipeline engine

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{SgmParams, TileParams};
use crate::core::{div_ceil, DepthSim, DepthSimMap, Roi, Tile};
use crate::device::{
    ComputeEngine, DeviceBuffer2D, DeviceCameraCache, DeviceStream, DeviceVolume, TSim, TSimAcc,
    TSIM_NO_MATCH,
};
use crate::io::VolumeExporter;
use crate::sgm::{SgmDepthList, SgmError};

/// Path accumulators for the cross-path filtering kernel, allocated only
/// when filtering is enabled
struct FilterScratch {
    slice_acc_a: DeviceBuffer2D<TSimAcc>,
    slice_acc_b: DeviceBuffer2D<TSimAcc>,
    axis_acc: DeviceBuffer2D<TSimAcc>,
}

/// Tile-resident SGM engine.
///
/// Owns every device buffer the pipeline needs, sized at construction for
/// the worst-case tile extent, and drives the ordered stage sequence of
/// [`compute_tile_depth_map`](Self::compute_tile_depth_map) on a single
/// execution stream.
///
/// An engine holds no interior locking: it must be driven by one caller at
/// a time. Distinct engine instances (distinct streams) may run
/// concurrently and share the same [`DeviceCameraCache`]; the external
/// scheduler decides how many run at once, using
/// [`device_memory_consumption`](Self::device_memory_consumption) for
/// admission control.
pub struct SgmTileEngine {
    sgm_params: SgmParams,
    max_tile_width: usize,
    max_tile_height: usize,
    camera_cache: Arc<DeviceCameraCache>,
    compute: Arc<dyn ComputeEngine>,
    exporter: Option<Arc<dyn VolumeExporter>>,
    stream: DeviceStream,
    /// Host-visible staging for candidate depths
    depths_host: Vec<f32>,
    depths_dev: DeviceBuffer2D<f32>,
    depth_sim_map_dev: DeviceBuffer2D<DepthSim>,
    vol_best_sim: DeviceVolume<TSim>,
    vol_sec_best_sim: DeviceVolume<TSim>,
    filter_scratch: Option<FilterScratch>,
}

impl SgmTileEngine {
    /// Allocate an engine for tiles bounded by `tile_params`.
    ///
    /// All buffers are allocated here; any failure is fatal and no partial
    /// engine is left usable.
    pub fn new(
        sgm_params: SgmParams,
        tile_params: TileParams,
        camera_cache: Arc<DeviceCameraCache>,
        compute: Arc<dyn ComputeEngine>,
    ) -> Result<Self, SgmError> {
        let downscale = sgm_params.downscale() as usize;
        let max_tile_width = div_ceil(tile_params.width, downscale);
        let max_tile_height = div_ceil(tile_params.height, downscale);
        let max_depths = sgm_params.max_depths;

        let depths_dev = DeviceBuffer2D::new(max_depths, 1, "sgm depths")?;
        let depth_sim_map_dev =
            DeviceBuffer2D::new(max_tile_width, max_tile_height, "sgm depth/sim map")?;
        let vol_best_sim =
            DeviceVolume::new(max_tile_width, max_tile_height, max_depths, "sgm best sim")?;
        let vol_sec_best_sim = DeviceVolume::new(
            max_tile_width,
            max_tile_height,
            max_depths,
            "sgm second best sim",
        )?;

        let filter_scratch = if sgm_params.optimize_volume {
            let max_tile_side = max_tile_width.max(max_tile_height);
            Some(FilterScratch {
                slice_acc_a: DeviceBuffer2D::new(max_tile_side, max_depths, "sgm slice acc A")?,
                slice_acc_b: DeviceBuffer2D::new(max_tile_side, max_depths, "sgm slice acc B")?,
                axis_acc: DeviceBuffer2D::new(max_tile_side, 1, "sgm axis acc")?,
            })
        } else {
            None
        };

        debug!(
            "SGM engine allocated: max tile {}x{} cells, {} depths, filtering {}",
            max_tile_width,
            max_tile_height,
            max_depths,
            if sgm_params.optimize_volume { "on" } else { "off" }
        );

        Ok(Self {
            sgm_params,
            max_tile_width,
            max_tile_height,
            camera_cache,
            compute,
            exporter: None,
            stream: DeviceStream::new(),
            depths_host: Vec::with_capacity(max_depths),
            depths_dev,
            depth_sim_map_dev,
            vol_best_sim,
            vol_sec_best_sim,
            filter_scratch,
        })
    }

    /// Attach a diagnostic exporter, used when
    /// `SgmParams::export_intermediate_results` is set
    pub fn with_exporter(mut self, exporter: Arc<dyn VolumeExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Parameters this engine was built with
    pub fn sgm_params(&self) -> &SgmParams {
        &self.sgm_params
    }

    /// Maximum tile width in cost-volume cells
    pub fn max_tile_width(&self) -> usize {
        self.max_tile_width
    }

    /// Maximum tile height in cost-volume cells
    pub fn max_tile_height(&self) -> usize {
        self.max_tile_height
    }

    /// Best-cost volume (diagnostics and tests)
    pub fn best_sim_volume(&self) -> &DeviceVolume<TSim> {
        &self.vol_best_sim
    }

    /// Second-best-cost volume (diagnostics and tests)
    pub fn sec_best_sim_volume(&self) -> &DeviceVolume<TSim> {
        &self.vol_sec_best_sim
    }

    /// Allocator-padded device memory footprint in MB.
    ///
    /// Pure query: sums every buffer currently allocated by this engine,
    /// including the filter scratch only when filtering is enabled. The
    /// footprint is fixed at construction and independent of any tile's
    /// actual region size, so an external scheduler can sum it across
    /// concurrently active engines.
    pub fn device_memory_consumption(&self) -> f64 {
        let mut bytes = self.depths_dev.bytes_padded()
            + self.depth_sim_map_dev.bytes_padded()
            + self.vol_best_sim.bytes_padded()
            + self.vol_sec_best_sim.bytes_padded();
        if let Some(scratch) = &self.filter_scratch {
            bytes += scratch.slice_acc_a.bytes_padded()
                + scratch.slice_acc_b.bytes_padded()
                + scratch.axis_acc.bytes_padded();
        }
        bytes as f64 / (1024.0 * 1024.0)
    }

    /// Raw device memory footprint in MB, excluding allocator row padding
    pub fn device_memory_consumption_unpadded(&self) -> f64 {
        let mut bytes = self.depths_dev.bytes_unpadded()
            + self.depth_sim_map_dev.bytes_unpadded()
            + self.vol_best_sim.bytes_unpadded()
            + self.vol_sec_best_sim.bytes_unpadded();
        if let Some(scratch) = &self.filter_scratch {
            bytes += scratch.slice_acc_a.bytes_unpadded()
                + scratch.slice_acc_b.bytes_unpadded()
                + scratch.axis_acc.bytes_unpadded();
        }
        bytes as f64 / (1024.0 * 1024.0)
    }

    /// Compute the depth/sim map of one tile.
    ///
    /// Runs the strictly ordered stage sequence: upload depths, build the
    /// best/second-best cost volumes across every neighbor camera, fix up
    /// the single-neighbor case, optionally filter the volume, then extract
    /// the best depth per pixel. No stage is retried; any failure aborts
    /// the whole call and the tile must be treated as un-computed.
    pub fn compute_tile_depth_map(
        &mut self,
        tile: &Tile,
        depth_list: &SgmDepthList,
    ) -> Result<DepthSimMap, SgmError> {
        info!(
            "SGM depth/sim map of view {}: {} neighbor cameras, {} candidate depths, tile {}",
            tile.rc,
            tile.sgm_tcams.len(),
            depth_list.len(),
            tile.roi
        );

        self.check_tile(tile, depth_list)?;
        let downscaled_roi = tile.roi.downscale(self.sgm_params.downscale());

        self.upload_depths(depth_list);
        self.compute_similarity_volumes(tile, depth_list, &downscaled_roi);

        // With a single neighbor camera no genuine second-best cost exists;
        // downstream stages always read the second-best volume as the best
        // available signal before filtering.
        if tile.sgm_tcams.len() < 2 {
            self.vol_sec_best_sim.copy_from(&self.vol_best_sim, &self.stream);
        }

        self.export_volume(tile, depth_list, &self.vol_sec_best_sim, "beforeFiltering");

        if self.sgm_params.optimize_volume {
            self.optimize_similarity_volume(tile, depth_list, &downscaled_roi);
        } else {
            self.vol_best_sim.copy_from(&self.vol_sec_best_sim, &self.stream);
        }

        self.export_volume(tile, depth_list, &self.vol_best_sim, "afterFiltering");

        self.retrieve_best_depth(tile, depth_list, &downscaled_roi);

        let map = self.download_depth_sim_map(&downscaled_roi);
        self.export_depth_sim_map(tile, &map);

        info!("SGM depth/sim map of view {} done", tile.rc);
        Ok(map)
    }

    /// Validate tile inputs against the engine's allocated extent.
    ///
    /// Runs before any buffer is touched, so a failed tile leaves the
    /// engine state exactly as it was.
    fn check_tile(&self, tile: &Tile, depth_list: &SgmDepthList) -> Result<(), SgmError> {
        let configuration = |reason: String| SgmError::Configuration {
            view_id: tile.rc,
            roi: tile.roi,
            reason,
        };

        if tile.sgm_tcams.is_empty() || depth_list.is_empty() {
            return Err(configuration(
                "no neighbor cameras or no candidate depths".to_string(),
            ));
        }
        if depth_list.len() > self.sgm_params.max_depths {
            return Err(configuration(format!(
                "{} candidate depths exceed the allocated maximum of {}",
                depth_list.len(),
                self.sgm_params.max_depths
            )));
        }
        if depth_list.tc_count() != tile.sgm_tcams.len() {
            return Err(configuration(format!(
                "{} depth sub-ranges for {} neighbor cameras",
                depth_list.tc_count(),
                tile.sgm_tcams.len()
            )));
        }
        for tci in 0..depth_list.tc_count() {
            let range = depth_list.tc_depth_range(tci);
            if range.end > depth_list.len() {
                return Err(configuration(format!(
                    "depth sub-range {} of neighbor {} exceeds the {} candidate depths",
                    range,
                    tile.sgm_tcams[tci],
                    depth_list.len()
                )));
            }
        }

        let downscaled_roi = tile.roi.downscale(self.sgm_params.downscale());
        if downscaled_roi.is_empty() {
            return Err(configuration("empty region of interest".to_string()));
        }
        if downscaled_roi.width() > self.max_tile_width
            || downscaled_roi.height() > self.max_tile_height
        {
            return Err(configuration(format!(
                "downscaled tile {}x{} exceeds the allocated extent {}x{}",
                downscaled_roi.width(),
                downscaled_roi.height(),
                self.max_tile_width,
                self.max_tile_height
            )));
        }
        Ok(())
    }

    /// Stage 1: copy candidate depths into staging, then to the device
    fn upload_depths(&mut self, depth_list: &SgmDepthList) {
        self.depths_host.clear();
        self.depths_host.extend_from_slice(depth_list.depths());
        self.depths_dev.upload_row(0, &self.depths_host, &self.stream);
    }

    /// Stage 2: initialize both volumes to the no-match sentinel, then
    /// accumulate pairwise similarity for every neighbor camera in list
    /// order, keeping the per-cell best and second-best cost
    fn compute_similarity_volumes(
        &mut self,
        tile: &Tile,
        depth_list: &SgmDepthList,
        downscaled_roi: &Roi,
    ) {
        debug!("SGM compute similarity volumes (view {})", tile.rc);

        self.compute
            .initialize_volume(&mut self.vol_best_sim, TSIM_NO_MATCH, &self.stream);
        self.compute
            .initialize_volume(&mut self.vol_sec_best_sim, TSIM_NO_MATCH, &self.stream);

        let rc_camera = self.camera_cache.get(tile.rc, self.sgm_params.scale);

        for (tci, &tc) in tile.sgm_tcams.iter().enumerate() {
            let tc_depth_range = depth_list.tc_depth_range(tci);
            let tc_camera = self.camera_cache.get(tc, self.sgm_params.scale);

            debug!(
                "SGM similarity: rc {} tc {} ({}/{}), depths {}, roi {}",
                tile.rc,
                tc,
                tci + 1,
                tile.sgm_tcams.len(),
                tc_depth_range,
                downscaled_roi
            );

            self.compute.accumulate_similarity(
                &mut self.vol_best_sim,
                &mut self.vol_sec_best_sim,
                &self.depths_dev,
                &rc_camera,
                &tc_camera,
                &self.sgm_params,
                tc_depth_range,
                downscaled_roi,
                &self.stream,
            );
        }
    }

    /// Stage 5: cross-path aggregation of the second-best volume into the
    /// best volume, which holds the working volume from here on
    fn optimize_similarity_volume(
        &mut self,
        tile: &Tile,
        depth_list: &SgmDepthList,
        downscaled_roi: &Roi,
    ) {
        debug!(
            "SGM optimize volume (view {}, filtering axes {})",
            tile.rc, self.sgm_params.filtering_axes
        );

        let rc_camera = self.camera_cache.get(tile.rc, self.sgm_params.scale);

        // scratch is allocated whenever filtering is enabled
        if let Some(scratch) = &mut self.filter_scratch {
            self.compute.optimize_volume(
                &mut self.vol_best_sim,
                &mut scratch.slice_acc_a,
                &mut scratch.slice_acc_b,
                &mut scratch.axis_acc,
                &self.vol_sec_best_sim,
                &rc_camera,
                &self.sgm_params,
                depth_list.len(),
                downscaled_roi,
                &self.stream,
            );
        } else {
            self.vol_best_sim.copy_from(&self.vol_sec_best_sim, &self.stream);
        }
    }

    /// Stage 7: extract the minimum-cost depth per pixel into the device
    /// depth/sim map, using full-resolution reference geometry
    fn retrieve_best_depth(&mut self, tile: &Tile, depth_list: &SgmDepthList, downscaled_roi: &Roi) {
        debug!("SGM retrieve best depth (view {})", tile.rc);

        // depth-index-to-metric mapping uses the full-resolution geometry
        // even though the volume was built at the working scale
        let rc_camera = self.camera_cache.get(tile.rc, 1);

        self.compute.retrieve_best_depth(
            &mut self.depth_sim_map_dev,
            &self.depths_dev,
            &self.vol_best_sim,
            &rc_camera,
            &self.sgm_params,
            depth_list.full_range(),
            downscaled_roi,
            &self.stream,
        );
    }

    /// Copy the tile's output region out of the device depth/sim map
    fn download_depth_sim_map(&self, downscaled_roi: &Roi) -> DepthSimMap {
        let width = downscaled_roi.width();
        let height = downscaled_roi.height();
        let mut map = DepthSimMap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                *map.at_mut(x, y) = self.depth_sim_map_dev.at(x, y);
            }
        }
        map
    }

    /// Config-gated volume export; failures are logged, never fatal
    fn export_volume(
        &self,
        tile: &Tile,
        depth_list: &SgmDepthList,
        volume: &DeviceVolume<TSim>,
        tag: &str,
    ) {
        if !self.sgm_params.export_intermediate_results {
            return;
        }
        let Some(exporter) = &self.exporter else {
            warn!(
                "view {}: intermediate export requested but no exporter attached",
                tile.rc
            );
            return;
        };
        if let Err(err) = exporter.export_volume(
            volume,
            depth_list.depths(),
            tile,
            self.sgm_params.scale,
            tag,
        ) {
            warn!("view {}: failed to export '{}' volume: {}", tile.rc, tag, err);
        }
    }

    /// Config-gated depth/sim map export; failures are logged, never fatal
    fn export_depth_sim_map(&self, tile: &Tile, map: &DepthSimMap) {
        if !self.sgm_params.export_intermediate_results {
            return;
        }
        let Some(exporter) = &self.exporter else {
            return;
        };
        if let Err(err) = exporter.export_depth_sim_map(
            map,
            tile,
            self.sgm_params.scale,
            self.sgm_params.step_xy,
        ) {
            warn!("view {}: failed to export depth/sim map: {}", tile.rc, err);
        }
    }
}
