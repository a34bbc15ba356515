//! Device-resident camera representation

use glam::{Mat3, Mat4, Vec3};

use crate::core::types::ViewId;

/// Immutable camera data prepared for one (view, downscale) pair.
///
/// Intrinsics are pre-scaled to the requested downscale so kernels can work
/// directly in downscaled pixel coordinates. Instances are owned by the
/// [`DeviceCameraCache`](crate::device::DeviceCameraCache) and shared behind
/// an `Arc`; they never change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCamera {
    view_id: ViewId,
    downscale: u32,
    width: usize,
    height: usize,
    k: Mat3,
    cam_to_world: Mat4,
}

impl DeviceCamera {
    /// Build a camera for `downscale` from full-resolution intrinsics.
    ///
    /// `fx, fy, cx, cy` and `width, height` describe the full-resolution
    /// sensor; they are divided by `downscale` here.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        view_id: ViewId,
        downscale: u32,
        width: usize,
        height: usize,
        fx: f32,
        fy: f32,
        cx: f32,
        cy: f32,
        cam_to_world: Mat4,
    ) -> Self {
        let s = downscale.max(1) as f32;
        let k = Mat3::from_cols(
            Vec3::new(fx / s, 0.0, 0.0),
            Vec3::new(0.0, fy / s, 0.0),
            Vec3::new(cx / s, cy / s, 1.0),
        );
        Self {
            view_id,
            downscale: downscale.max(1),
            width: (width as f32 / s).ceil() as usize,
            height: (height as f32 / s).ceil() as usize,
            k,
            cam_to_world,
        }
    }

    /// View id this camera was loaded for
    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    /// Downscale factor applied to the intrinsics
    pub fn downscale(&self) -> u32 {
        self.downscale
    }

    /// Image width at this downscale
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height at this downscale
    pub fn height(&self) -> usize {
        self.height
    }

    /// Intrinsic matrix at this downscale
    pub fn intrinsics(&self) -> Mat3 {
        self.k
    }

    /// Camera-to-world transform
    pub fn cam_to_world(&self) -> Mat4 {
        self.cam_to_world
    }
}
