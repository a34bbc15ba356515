//! Compute engine contract for the SGM kernels
//!
//! The numeric kernels (photometric similarity, cost aggregation, best-depth
//! extraction) are not implemented in this crate; the engine drives them
//! through this trait. All operations are issued on a caller-supplied
//! [`DeviceStream`] and their results are visible in stream order.

use crate::config::SgmParams;
use crate::core::{DepthSim, DeviceCamera, Range, Roi};
use crate::device::memory::{DeviceBuffer2D, DeviceStream, DeviceVolume};

/// Cost volume cell: bounded-range matching cost
pub type TSim = u8;

/// Path accumulator cell used by the volume filtering kernels
pub type TSimAcc = u32;

/// Sentinel cost marking a cell with no photometric match
pub const TSIM_NO_MATCH: TSim = 255;

/// Stateless kernel set operating on caller-owned buffers.
///
/// Implementations must be safe to share across engine instances; all state
/// lives in the buffers passed to each call.
pub trait ComputeEngine: Send + Sync {
    /// Set every cell of `volume` to `value`
    fn initialize_volume(&self, volume: &mut DeviceVolume<TSim>, value: TSim, stream: &DeviceStream);

    /// Accumulate the similarity of one (reference, neighbor) camera pair
    /// into the best and second-best cost volumes.
    ///
    /// For each cell of the downscaled `roi` and each depth index in
    /// `depth_range`, the kernel computes the pairwise cost and keeps, per
    /// cell, the smallest cost in `best` and the second-smallest in
    /// `sec_best` across every invocation since the volumes were
    /// initialized.
    ///
    /// Contract: the per-cell reduction must be commutative in neighbor
    /// order. Callers invoke this once per neighbor camera, in list order,
    /// but no correctness property may depend on that order.
    #[allow(clippy::too_many_arguments)]
    fn accumulate_similarity(
        &self,
        best: &mut DeviceVolume<TSim>,
        sec_best: &mut DeviceVolume<TSim>,
        depths: &DeviceBuffer2D<f32>,
        rc_camera: &DeviceCamera,
        tc_camera: &DeviceCamera,
        params: &SgmParams,
        depth_range: Range,
        roi: &Roi,
        stream: &DeviceStream,
    );

    /// Cross-path cost aggregation from `input` into `out`.
    ///
    /// `slice_a`, `slice_b` and `axis` are preallocated path accumulators
    /// sized to the largest tile side; the kernel may clobber them freely.
    #[allow(clippy::too_many_arguments)]
    fn optimize_volume(
        &self,
        out: &mut DeviceVolume<TSim>,
        slice_a: &mut DeviceBuffer2D<TSimAcc>,
        slice_b: &mut DeviceBuffer2D<TSimAcc>,
        axis: &mut DeviceBuffer2D<TSimAcc>,
        input: &DeviceVolume<TSim>,
        rc_camera: &DeviceCamera,
        params: &SgmParams,
        depth_count: usize,
        roi: &Roi,
        stream: &DeviceStream,
    );

    /// Scan `volume` along the depth axis for every pixel of the downscaled
    /// `roi` and write the (metric depth, similarity) of the minimum cost
    /// into `out`, at ROI-local coordinates.
    ///
    /// Ties resolve to the lowest depth index. `rc_camera` carries the
    /// full-resolution geometry (downscale 1) used to map depth indices to
    /// metric depths.
    #[allow(clippy::too_many_arguments)]
    fn retrieve_best_depth(
        &self,
        out: &mut DeviceBuffer2D<DepthSim>,
        depths: &DeviceBuffer2D<f32>,
        volume: &DeviceVolume<TSim>,
        rc_camera: &DeviceCamera,
        params: &SgmParams,
        depth_range: Range,
        roi: &Roi,
        stream: &DeviceStream,
    );
}
