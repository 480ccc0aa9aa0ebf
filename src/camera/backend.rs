use std::sync::Arc;

use crate::camera::error::{CameraError, Result};
use crate::camera::types::{
    FocusMode, PreviewParameters, Resolution, SceneMode, SurfaceEvent, SurfaceId,
};

/// Per-frame callback registered on a device.
///
/// Fires on the device's own callback thread. `None` models a frame the
/// platform delivered without a buffer.
pub type FrameCallback = Arc<dyn Fn(Option<&[u8]>) + Send + Sync>;

/// Listener for preview surface lifecycle events.
pub type SurfaceListener = Arc<dyn Fn(SurfaceEvent) + Send + Sync>;

/// Platform camera service: permission query and device access.
pub trait CameraBackend: Send + Sync {
    /// Whether the host has been granted camera access.
    fn has_permission(&self) -> bool;

    /// Open the default camera device.
    fn open(&self) -> Result<Box<dyn CameraDevice>>;
}

/// An opened camera device.
///
/// All methods are called from the UI-affine thread.
pub trait CameraDevice: Send {
    /// Preview sizes the device can deliver. Empty when unknown.
    fn supported_preview_sizes(&self) -> Vec<Resolution>;

    fn supported_focus_modes(&self) -> Vec<FocusMode>;

    fn supported_scene_modes(&self) -> Vec<SceneMode>;

    /// Apply a full parameter set in one call.
    fn apply_parameters(&mut self, params: &PreviewParameters) -> Result<()>;

    /// Route preview output to an attached surface.
    fn set_preview_display(&mut self, surface: SurfaceId) -> Result<()>;

    /// Register or clear the per-frame callback.
    fn set_preview_callback(&mut self, callback: Option<FrameCallback>);

    fn start_preview(&mut self) -> Result<()>;

    fn stop_preview(&mut self);

    /// Release the device. The handle must not be used afterwards.
    fn release(&mut self);
}

/// Host view hierarchy that preview surfaces are attached to.
pub trait SurfaceHost: Send + Sync {
    /// Create a preview surface and attach it to the host view.
    ///
    /// `listener` receives the surface's lifecycle events. Implementations
    /// may fire `Created` before returning.
    fn attach(&self, listener: SurfaceListener) -> Result<SurfaceId>;

    /// Detach and discard a surface. Unknown ids are ignored.
    fn detach(&self, surface: SurfaceId);
}

/// Backend used where no platform camera is wired in.
pub struct NullBackend;

impl CameraBackend for NullBackend {
    fn has_permission(&self) -> bool {
        true
    }

    fn open(&self) -> Result<Box<dyn CameraDevice>> {
        Err(CameraError::DeviceUnavailable(
            "no camera backend on this platform".to_string(),
        ))
    }
}

/// Surface host used where no view hierarchy is available.
pub struct NullSurfaceHost;

impl SurfaceHost for NullSurfaceHost {
    fn attach(&self, _listener: SurfaceListener) -> Result<SurfaceId> {
        Err(CameraError::Configuration(
            "no host view to attach a preview surface to".to_string(),
        ))
    }

    fn detach(&self, _surface: SurfaceId) {}
}
