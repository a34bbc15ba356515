//! Preallocated pitched device buffers and the execution stream handle
//!
//! Buffers follow an arena discipline: they are allocated once, at engine
//! construction, to the worst-case tile extent and addressed by logical
//! (x, y, depth) coordinates afterwards. They never resize. Rows are padded
//! to a fixed pitch so padded and raw byte footprints can be reported
//! separately for admission control.

use std::collections::TryReserveError;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::core::div_ceil;

/// Row pitch alignment in bytes for all device buffers
pub const PITCH_ALIGNMENT: usize = 512;

/// Device buffer allocation failure.
///
/// Always fatal for the engine being constructed; recovery (smaller tiles,
/// fewer concurrent engines) belongs to the calling layer.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("device buffer {label}: dimensions overflow the address space")]
    Overflow { label: &'static str },
    #[error("device buffer {label}: failed to allocate {bytes} bytes: {source}")]
    Reserve {
        label: &'static str,
        bytes: usize,
        source: TryReserveError,
    },
}

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

/// Handle to an ordered execution stream.
///
/// Every buffer copy and compute-engine call takes a stream; operations
/// issued on the same stream complete in issue order. One engine instance
/// owns exactly one stream, so the pipeline stages within a tile computation
/// are strictly sequential. Cross-stream overlap is the caller's concern.
#[derive(Debug)]
pub struct DeviceStream {
    id: u64,
}

impl DeviceStream {
    /// Create a stream with a process-unique id
    pub fn new() -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Process-unique stream id
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for DeviceStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Row pitch in elements for a row of `width` elements of `T`
fn pitch_elems<T>(width: usize) -> Option<usize> {
    let size = std::mem::size_of::<T>();
    let row_bytes = width.checked_mul(size)?;
    let padded_bytes = row_bytes.checked_add(PITCH_ALIGNMENT - 1)? / PITCH_ALIGNMENT * PITCH_ALIGNMENT;
    Some(div_ceil(padded_bytes, size))
}

fn try_alloc<T: Copy + Default>(
    len: Option<usize>,
    label: &'static str,
) -> Result<Vec<T>, AllocationError> {
    let len = len.ok_or(AllocationError::Overflow { label })?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|source| AllocationError::Reserve {
            label,
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
            source,
        })?;
    data.resize(len, T::default());
    Ok(data)
}

/// Fixed-capacity 2D device buffer with padded rows
#[derive(Debug, Clone)]
pub struct DeviceBuffer2D<T: Copy + Default> {
    width: usize,
    height: usize,
    pitch: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> DeviceBuffer2D<T> {
    /// Allocate a zero-initialized buffer of `width` x `height` elements
    pub fn new(width: usize, height: usize, label: &'static str) -> Result<Self, AllocationError> {
        let pitch = pitch_elems::<T>(width).ok_or(AllocationError::Overflow { label })?;
        let data = try_alloc(pitch.checked_mul(height), label)?;
        Ok(Self {
            width,
            height,
            pitch,
            data,
        })
    }

    /// Buffer width in elements
    pub fn width(&self) -> usize {
        self.width
    }

    /// Buffer height in rows
    pub fn height(&self) -> usize {
        self.height
    }

    /// Element at `(x, y)`
    pub fn at(&self, x: usize, y: usize) -> T {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.pitch + x]
    }

    /// Mutable element at `(x, y)`
    pub fn at_mut(&mut self, x: usize, y: usize) -> &mut T {
        debug_assert!(x < self.width && y < self.height);
        &mut self.data[y * self.pitch + x]
    }

    /// The `width` leading elements of row `y`
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.pitch;
        &self.data[start..start + self.width]
    }

    /// Copy `src` into the leading elements of row `y` on `stream`
    pub fn upload_row(&mut self, y: usize, src: &[T], _stream: &DeviceStream) {
        debug_assert!(src.len() <= self.width && y < self.height);
        let start = y * self.pitch;
        self.data[start..start + src.len()].copy_from_slice(src);
    }

    /// Set every element (padding included) to `value` on `stream`
    pub fn fill(&mut self, value: T, _stream: &DeviceStream) {
        self.data.fill(value);
    }

    /// Copy the whole buffer from `other` on `stream`.
    ///
    /// Both buffers must have been allocated with identical dimensions.
    pub fn copy_from(&mut self, other: &DeviceBuffer2D<T>, _stream: &DeviceStream) {
        debug_assert!(self.width == other.width && self.height == other.height);
        self.data.copy_from_slice(&other.data);
    }

    /// Allocator-padded footprint in bytes
    pub fn bytes_padded(&self) -> usize {
        self.pitch * self.height * std::mem::size_of::<T>()
    }

    /// Raw footprint in bytes, excluding row padding
    pub fn bytes_unpadded(&self) -> usize {
        self.width * self.height * std::mem::size_of::<T>()
    }
}

/// Fixed-capacity 3D device buffer indexed by `(x, y, depth)` with padded rows
#[derive(Debug, Clone)]
pub struct DeviceVolume<T: Copy + Default> {
    width: usize,
    height: usize,
    depth: usize,
    pitch: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> DeviceVolume<T> {
    /// Allocate a zero-initialized volume of `width` x `height` x `depth` cells
    pub fn new(
        width: usize,
        height: usize,
        depth: usize,
        label: &'static str,
    ) -> Result<Self, AllocationError> {
        let pitch = pitch_elems::<T>(width).ok_or(AllocationError::Overflow { label })?;
        let data = try_alloc(
            pitch.checked_mul(height).and_then(|v| v.checked_mul(depth)),
            label,
        )?;
        Ok(Self {
            width,
            height,
            depth,
            pitch,
            data,
        })
    }

    /// Volume extent as `(width, height, depth)`
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    /// Cell at `(x, y, z)`
    pub fn at(&self, x: usize, y: usize, z: usize) -> T {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        self.data[(z * self.height + y) * self.pitch + x]
    }

    /// Mutable cell at `(x, y, z)`
    pub fn at_mut(&mut self, x: usize, y: usize, z: usize) -> &mut T {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        &mut self.data[(z * self.height + y) * self.pitch + x]
    }

    /// Set every cell (padding included) to `value` on `stream`
    pub fn fill(&mut self, value: T, _stream: &DeviceStream) {
        self.data.fill(value);
    }

    /// Copy the whole volume from `other` on `stream`.
    ///
    /// Both volumes must have been allocated with identical dimensions.
    pub fn copy_from(&mut self, other: &DeviceVolume<T>, _stream: &DeviceStream) {
        debug_assert!(self.dims() == other.dims());
        self.data.copy_from_slice(&other.data);
    }

    /// Allocator-padded footprint in bytes
    pub fn bytes_padded(&self) -> usize {
        self.pitch * self.height * self.depth * std::mem::size_of::<T>()
    }

    /// Raw footprint in bytes, excluding row padding
    pub fn bytes_unpadded(&self) -> usize {
        self.width * self.height * self.depth * std::mem::size_of::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_ids_unique() {
        let a = DeviceStream::new();
        let b = DeviceStream::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_buffer_pitch_alignment() {
        let buf = DeviceBuffer2D::<u8>::new(100, 3, "test").unwrap();
        assert_eq!(buf.bytes_padded(), 512 * 3);
        assert_eq!(buf.bytes_unpadded(), 300);
        assert!(buf.bytes_padded() >= buf.bytes_unpadded());
    }

    #[test]
    fn test_buffer_fill_and_index() {
        let stream = DeviceStream::new();
        let mut buf = DeviceBuffer2D::<f32>::new(8, 2, "test").unwrap();
        buf.fill(2.5, &stream);
        assert_eq!(buf.at(7, 1), 2.5);
        *buf.at_mut(3, 0) = 9.0;
        assert_eq!(buf.row(0)[3], 9.0);
    }

    #[test]
    fn test_buffer_upload_row() {
        let stream = DeviceStream::new();
        let mut buf = DeviceBuffer2D::<f32>::new(4, 1, "test").unwrap();
        buf.upload_row(0, &[1.0, 2.0, 3.0], &stream);
        assert_eq!(buf.row(0), &[1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_volume_index_and_copy() {
        let stream = DeviceStream::new();
        let mut a = DeviceVolume::<u8>::new(10, 4, 3, "a").unwrap();
        let mut b = DeviceVolume::<u8>::new(10, 4, 3, "b").unwrap();
        a.fill(255, &stream);
        *a.at_mut(9, 3, 2) = 42;
        b.copy_from(&a, &stream);
        assert_eq!(b.at(9, 3, 2), 42);
        assert_eq!(b.at(0, 0, 0), 255);
    }

    #[test]
    fn test_volume_bytes() {
        let vol = DeviceVolume::<u8>::new(100, 2, 3, "test").unwrap();
        assert_eq!(vol.bytes_padded(), 512 * 2 * 3);
        assert_eq!(vol.bytes_unpadded(), 600);
    }

    #[test]
    fn test_allocation_failure_reported() {
        // larger than isize::MAX, rejected by try_reserve without allocating
        let result = DeviceBuffer2D::<u8>::new(1usize << 62, 2, "huge");
        assert!(matches!(result, Err(AllocationError::Reserve { .. })));
    }

    #[test]
    fn test_allocation_overflow_reported() {
        let result = DeviceVolume::<u64>::new(1usize << 61, 1 << 30, 1 << 30, "overflow");
        assert!(matches!(result, Err(AllocationError::Overflow { .. })));
    }
}
