//! Shared cache of device-resident cameras
//!
//! One cache instance is shared by every engine in the process and injected
//! at engine construction. Entries are immutable once loaded and handed out
//! behind `Arc`, so concurrent engines can read the same camera safely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::core::{DeviceCamera, ViewId};

/// Shared, immutable handle to a cached device camera
pub type DeviceCameraHandle = Arc<DeviceCamera>;

/// Source of device camera data on a cache miss.
///
/// Calibration and image-pyramid loading live upstream of this crate; the
/// loader adapts whatever that layer provides into a [`DeviceCamera`] for
/// the requested view and downscale.
pub trait CameraLoader: Send + Sync {
    /// Produce the camera for `(view_id, downscale)`
    fn load(&self, view_id: ViewId, downscale: u32) -> DeviceCamera;
}

/// Process-wide cache mapping `(view id, downscale)` to device cameras.
///
/// `get` returns a cached handle or loads through the injected
/// [`CameraLoader`] on a miss. The cache tolerates concurrent calls from
/// independent engines; callers must not assume an entry stays cached, only
/// that the returned handle stays valid and immutable.
pub struct DeviceCameraCache {
    loader: Box<dyn CameraLoader>,
    entries: Mutex<HashMap<(ViewId, u32), DeviceCameraHandle>>,
}

impl DeviceCameraCache {
    /// Create an empty cache backed by `loader`
    pub fn new(loader: Box<dyn CameraLoader>) -> Self {
        Self {
            loader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the camera for `(view_id, downscale)`, loading it on a miss
    pub fn get(&self, view_id: ViewId, downscale: u32) -> DeviceCameraHandle {
        let key = (view_id, downscale.max(1));
        if let Some(handle) = self.lock_entries().get(&key) {
            return Arc::clone(handle);
        }
        // Load outside the lock; a racing engine may load the same camera,
        // the first insert wins and the duplicate is dropped.
        debug!("device camera cache miss: view {} downscale {}", key.0, key.1);
        let loaded = Arc::new(self.loader.load(key.0, key.1));
        let mut entries = self.lock_entries();
        Arc::clone(entries.entry(key).or_insert(loaded))
    }

    /// Number of currently cached cameras
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Whether the cache holds no cameras
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Drop all cached cameras; outstanding handles stay valid
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<(ViewId, u32), DeviceCameraHandle>> {
        // cached cameras are immutable, so a poisoned map is still consistent
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl CameraLoader for CountingLoader {
        fn load(&self, view_id: ViewId, downscale: u32) -> DeviceCamera {
            self.loads.fetch_add(1, Ordering::SeqCst);
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

    #[test]
    fn test_miss_then_hit() {
        let cache = DeviceCameraCache::new(Box::new(CountingLoader {
            loads: AtomicUsize::new(0),
        }));
        let a = cache.get(3, 2);
        let b = cache.get(3, 2);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_scales_are_distinct_entries() {
        let cache = DeviceCameraCache::new(Box::new(CountingLoader {
            loads: AtomicUsize::new(0),
        }));
        let full = cache.get(3, 1);
        let half = cache.get(3, 2);
        assert_eq!(full.downscale(), 1);
        assert_eq!(half.downscale(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_keeps_outstanding_handles_valid() {
        let cache = DeviceCameraCache::new(Box::new(CountingLoader {
            loads: AtomicUsize::new(0),
        }));
        let handle = cache.get(1, 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(handle.view_id(), 1);
    }

    #[test]
    fn test_concurrent_gets() {
        let cache = Arc::new(DeviceCameraCache::new(Box::new(CountingLoader {
            loads: AtomicUsize::new(0),
        })));
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..50u32 {
                    let cam = cache.get(i % 5, 1 + (t % 2));
                    assert_eq!(cam.view_id(), i % 5);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
    }
}
