//! Shared test fixtures for the SGM pipeline
//!
//! Deterministic stand-ins for the external pieces the engine is driven
//! with: a synthetic camera loader, a stub kernel set with a known cost
//! pattern and an exporter that captures artifacts in memory. Used by the
//! unit tests and the integration tests alike.

use std::sync::{Arc, Mutex, MutexGuard};

use glam::Mat4;

use crate::config::SgmParams;
use crate::core::{DepthSim, DepthSimMap, DeviceCamera, Range, Roi, Tile, ViewId};
use crate::device::{
    CameraLoader, ComputeEngine, DeviceBuffer2D, DeviceCameraCache, DeviceStream, DeviceVolume,
    TSim, TSimAcc, TSIM_NO_MATCH,
};
use crate::io::{VolumeExporter, VolumeIoError};
use crate::sgm::SgmDepthList;

/// Camera loader producing the same synthetic pinhole rig for every view id
pub struct SyntheticCameraLoader;

impl CameraLoader for SyntheticCameraLoader {
    fn load(&self, view_id: ViewId, downscale: u32) -> DeviceCamera {
        DeviceCamera::new(
            view_id,
            downscale,
            640,
            480,
            525.0,
            525.0,
            319.5,
            239.5,
            Mat4::IDENTITY,
        )
    }
}

/// Fresh camera cache backed by the synthetic loader
pub fn synthetic_camera_cache() -> Arc<DeviceCameraCache> {
    Arc::new(DeviceCameraCache::new(Box::new(SyntheticCameraLoader)))
}

/// Stub kernel set with a configurable, deterministic cost function.
///
/// The cost function maps ROI-local `(x, y)`, depth index and neighbor view
/// id to a matching cost strictly below the no-match sentinel, so every cell
/// the stub touches counts as matched. The best/second-best reduction and
/// the minimum scan follow the same rules the real kernels implement, which
/// makes end-to-end pipeline results predictable from the cost function
/// alone.
pub struct StubComputeEngine {
    cost: Box<dyn Fn(usize, usize, usize, ViewId) -> TSim + Send + Sync>,
}

impl StubComputeEngine {
    /// Same cost everywhere; useful for tie-break tests
    pub fn constant(cost: TSim) -> Arc<Self> {
        Arc::new(Self {
            cost: Box::new(move |_, _, _, _| cost),
        })
    }

    /// Position-dependent cost with a distinct pattern per neighbor view
    pub fn gradient() -> Arc<Self> {
        Arc::new(Self {
            cost: Box::new(|x, y, z, tc| {
                ((x * 7 + y * 13 + z * 29 + tc as usize * 17) % 200) as TSim
            }),
        })
    }

    /// Cost of ROI-local `(x, y)` at depth index `z` against neighbor `tc`
    pub fn cost(&self, x: usize, y: usize, z: usize, tc: ViewId) -> TSim {
        (self.cost)(x, y, z, tc)
    }
}

impl ComputeEngine for StubComputeEngine {
    fn initialize_volume(
        &self,
        volume: &mut DeviceVolume<TSim>,
        value: TSim,
        stream: &DeviceStream,
    ) {
        volume.fill(value, stream);
    }

    fn accumulate_similarity(
        &self,
        best: &mut DeviceVolume<TSim>,
        sec_best: &mut DeviceVolume<TSim>,
        _depths: &DeviceBuffer2D<f32>,
        _rc_camera: &DeviceCamera,
        tc_camera: &DeviceCamera,
        _params: &SgmParams,
        depth_range: Range,
        roi: &Roi,
        _stream: &DeviceStream,
    ) {
        let tc = tc_camera.view_id();
        for z in depth_range.begin..depth_range.end {
            for y in 0..roi.height() {
                for x in 0..roi.width() {
                    let cost = (self.cost)(x, y, z, tc);
                    let b = best.at(x, y, z);
                    let s = sec_best.at(x, y, z);
                    if cost < b {
                        *best.at_mut(x, y, z) = cost;
                        *sec_best.at_mut(x, y, z) = b;
                    } else if cost < s {
                        *sec_best.at_mut(x, y, z) = cost;
                    }
                }
            }
        }
    }

    fn optimize_volume(
        &self,
        out: &mut DeviceVolume<TSim>,
        _slice_a: &mut DeviceBuffer2D<TSimAcc>,
        _slice_b: &mut DeviceBuffer2D<TSimAcc>,
        _axis: &mut DeviceBuffer2D<TSimAcc>,
        input: &DeviceVolume<TSim>,
        _rc_camera: &DeviceCamera,
        _params: &SgmParams,
        depth_count: usize,
        roi: &Roi,
        _stream: &DeviceStream,
    ) {
        // stand-in aggregation: halve every input cell
        for z in 0..depth_count {
            for y in 0..roi.height() {
                for x in 0..roi.width() {
                    *out.at_mut(x, y, z) = input.at(x, y, z) / 2;
                }
            }
        }
    }

    fn retrieve_best_depth(
        &self,
        out: &mut DeviceBuffer2D<DepthSim>,
        depths: &DeviceBuffer2D<f32>,
        volume: &DeviceVolume<TSim>,
        _rc_camera: &DeviceCamera,
        _params: &SgmParams,
        depth_range: Range,
        roi: &Roi,
        _stream: &DeviceStream,
    ) {
        for y in 0..roi.height() {
            for x in 0..roi.width() {
                let mut best_cost = TSIM_NO_MATCH;
                let mut best_z = None;
                for z in depth_range.begin..depth_range.end {
                    let cost = volume.at(x, y, z);
                    if cost < best_cost {
                        best_cost = cost;
                        best_z = Some(z);
                    }
                }
                *out.at_mut(x, y) = match best_z {
                    Some(z) => DepthSim {
                        depth: depths.at(z, 0),
                        sim: best_cost as f32,
                    },
                    None => DepthSim::default(),
                };
            }
        }
    }
}

/// Exporter that records artifacts in memory instead of writing files
#[derive(Default)]
pub struct CapturingExporter {
    volumes: Mutex<Vec<(String, DeviceVolume<TSim>)>>,
    maps: Mutex<Vec<DepthSimMap>>,
}

impl CapturingExporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Last volume exported under `tag`
    pub fn volume(&self, tag: &str) -> Option<DeviceVolume<TSim>> {
        lock(&self.volumes)
            .iter()
            .rev()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.clone())
    }

    /// Tags of all captured volumes, in export order
    pub fn volume_tags(&self) -> Vec<String> {
        lock(&self.volumes).iter().map(|(t, _)| t.clone()).collect()
    }

    /// All captured depth/sim maps, in export order
    pub fn maps(&self) -> Vec<DepthSimMap> {
        lock(&self.maps).clone()
    }
}

impl VolumeExporter for CapturingExporter {
    fn export_volume(
        &self,
        volume: &DeviceVolume<TSim>,
        _depths: &[f32],
        _tile: &Tile,
        _scale: u32,
        tag: &str,
    ) -> Result<(), VolumeIoError> {
        lock(&self.volumes).push((tag.to_string(), volume.clone()));
        Ok(())
    }

    fn export_depth_sim_map(
        &self,
        map: &DepthSimMap,
        _tile: &Tile,
        _scale: u32,
        _step_xy: u32,
    ) -> Result<(), VolumeIoError> {
        lock(&self.maps).push(map.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Single-coverage tile with the given neighbor cameras
pub fn tile(rc: ViewId, tcams: &[ViewId], roi: Roi) -> Tile {
    Tile {
        rc,
        sgm_tcams: tcams.to_vec(),
        roi,
        nb_tiles: 1,
    }
}

/// Evenly spaced depth list with full-range limits for `tc_count` neighbors
pub fn uniform_depth_list(depth_count: usize, tc_count: usize) -> SgmDepthList {
    let depths = (0..depth_count).map(|i| 1.0 + 0.25 * i as f32).collect();
    SgmDepthList::new(depths, vec![(0, depth_count); tc_count])
}

/// Whether two volumes have identical extents and cell contents
pub fn volumes_equal(a: &DeviceVolume<TSim>, b: &DeviceVolume<TSim>) -> bool {
    if a.dims() != b.dims() {
        return false;
    }
    let (w, h, d) = a.dims();
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                if a.at(x, y, z) != b.at(x, y, z) {
                    return false;
                }
            }
        }
    }
    true
}
