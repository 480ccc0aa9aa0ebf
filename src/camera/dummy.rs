use std::sync::Arc;

use parking_lot::Mutex;

use crate::camera::backend::{
    CameraBackend, CameraDevice, FrameCallback, SurfaceHost, SurfaceListener,
};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{
    FocusMode, PixelFormat, PreviewParameters, Resolution, SceneMode, SurfaceEvent, SurfaceId,
};

/// Preview sizes a typical phone sensor advertises.
const DEFAULT_SIZES: &[Resolution] = &[
    Resolution::new(1920, 1080),
    Resolution::new(1280, 720),
    Resolution::new(800, 600),
    Resolution::new(640, 480),
    Resolution::new(320, 240),
];

/// Failure points that can be injected into the simulated camera.
#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    open: bool,
    apply: bool,
    display: bool,
    start: bool,
}

/// State shared between the backend and every device it hands out, so a
/// test can inspect a device after ownership moved into a session.
struct DummyShared {
    permission: bool,
    faults: Faults,
    sizes: Vec<Resolution>,
    focus_modes: Vec<FocusMode>,
    scene_modes: Vec<SceneMode>,
    applied: Vec<PreviewParameters>,
    callback: Option<FrameCallback>,
    display: Option<SurfaceId>,
    previewing: bool,
    open_count: usize,
    release_count: usize,
    start_count: usize,
}

/// A fake camera backend for running the bridge without real hardware.
///
/// Devices store applied parameters in memory and deliver frames only when
/// [`DummyBackend::emit_frame`] is called. Permission and failure points are
/// configurable.
///
/// Enable for [`crate::default_backend`] via the `DUMMY_CAMERA=1`
/// environment variable.
#[derive(Clone)]
pub struct DummyBackend {
    shared: Arc<Mutex<DummyShared>>,
}

impl DummyBackend {
    /// Create a backend with permission granted and typical phone sizes.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(DummyShared {
                permission: true,
                faults: Faults::default(),
                sizes: DEFAULT_SIZES.to_vec(),
                focus_modes: vec![FocusMode::Auto, FocusMode::ContinuousPicture],
                scene_modes: vec![SceneMode::Auto, SceneMode::Barcode],
                applied: Vec::new(),
                callback: None,
                display: None,
                previewing: false,
                open_count: 0,
                release_count: 0,
                start_count: 0,
            })),
        }
    }

    /// Whether the dummy camera is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    pub fn with_sizes(self, sizes: Vec<Resolution>) -> Self {
        self.shared.lock().sizes = sizes;
        self
    }

    pub fn with_focus_modes(self, modes: Vec<FocusMode>) -> Self {
        self.shared.lock().focus_modes = modes;
        self
    }

    pub fn with_scene_modes(self, modes: Vec<SceneMode>) -> Self {
        self.shared.lock().scene_modes = modes;
        self
    }

    pub fn set_permission(&self, granted: bool) {
        self.shared.lock().permission = granted;
    }

    pub fn fail_open(&self, fail: bool) {
        self.shared.lock().faults.open = fail;
    }

    pub fn fail_apply(&self, fail: bool) {
        self.shared.lock().faults.apply = fail;
    }

    pub fn fail_display(&self, fail: bool) {
        self.shared.lock().faults.display = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.shared.lock().faults.start = fail;
    }

    /// Every parameter set applied to any device, oldest first.
    pub fn applied_parameters(&self) -> Vec<PreviewParameters> {
        self.shared.lock().applied.clone()
    }

    pub fn is_previewing(&self) -> bool {
        self.shared.lock().previewing
    }

    pub fn has_callback(&self) -> bool {
        self.shared.lock().callback.is_some()
    }

    pub fn display(&self) -> Option<SurfaceId> {
        self.shared.lock().display
    }

    pub fn open_count(&self) -> usize {
        self.shared.lock().open_count
    }

    pub fn release_count(&self) -> usize {
        self.shared.lock().release_count
    }

    pub fn start_count(&self) -> usize {
        self.shared.lock().start_count
    }

    /// Push a frame through the registered callback, as the device thread
    /// would. Returns `false` when no callback is registered.
    pub fn emit_frame(&self, data: Option<&[u8]>) -> bool {
        // Clone out so the callback never runs under our lock
        let callback = self.shared.lock().callback.clone();
        match callback {
            Some(cb) => {
                cb(data);
                true
            }
            None => false,
        }
    }

    /// Synthesise an NV21 frame: horizontal luma gradient, neutral chroma.
    pub fn test_frame(width: u32, height: u32) -> Vec<u8> {
        let len = PixelFormat::Nv21.frame_len(width, height);
        let mut data = vec![128u8; len];
        for y in 0..height {
            for x in 0..width {
                let shade = if width > 1 { x * 255 / (width - 1) } else { 0 };
                data[(y * width + x) as usize] = shade as u8;
            }
        }
        data
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for DummyBackend {
    fn has_permission(&self) -> bool {
        self.shared.lock().permission
    }

    fn open(&self) -> Result<Box<dyn CameraDevice>> {
        let mut shared = self.shared.lock();
        if shared.faults.open {
            return Err(CameraError::DeviceUnavailable(
                "dummy camera is busy".to_string(),
            ));
        }
        shared.open_count += 1;
        Ok(Box::new(DummyDevice {
            shared: Arc::clone(&self.shared),
            released: false,
        }))
    }
}

/// Device handle handed out by [`DummyBackend`].
struct DummyDevice {
    shared: Arc<Mutex<DummyShared>>,
    released: bool,
}

impl CameraDevice for DummyDevice {
    fn supported_preview_sizes(&self) -> Vec<Resolution> {
        self.shared.lock().sizes.clone()
    }

    fn supported_focus_modes(&self) -> Vec<FocusMode> {
        self.shared.lock().focus_modes.clone()
    }

    fn supported_scene_modes(&self) -> Vec<SceneMode> {
        self.shared.lock().scene_modes.clone()
    }

    fn apply_parameters(&mut self, params: &PreviewParameters) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.faults.apply {
            return Err(CameraError::Configuration(
                "dummy camera rejected parameters".to_string(),
            ));
        }
        if !shared.sizes.is_empty() && !shared.sizes.contains(&params.size) {
            return Err(CameraError::Configuration(format!(
                "unsupported preview size {}",
                params.size
            )));
        }
        shared.applied.push(params.clone());
        Ok(())
    }

    fn set_preview_display(&mut self, surface: SurfaceId) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.faults.display {
            return Err(CameraError::Stream(
                "dummy surface is not valid".to_string(),
            ));
        }
        shared.display = Some(surface);
        Ok(())
    }

    fn set_preview_callback(&mut self, callback: Option<FrameCallback>) {
        self.shared.lock().callback = callback;
    }

    fn start_preview(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.faults.start {
            return Err(CameraError::Stream(
                "dummy preview failed to start".to_string(),
            ));
        }
        shared.previewing = true;
        shared.start_count += 1;
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.shared.lock().previewing = false;
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut shared = self.shared.lock();
        shared.previewing = false;
        shared.callback = None;
        shared.display = None;
        shared.release_count += 1;
    }
}

/// In-memory view host for the dummy camera.
///
/// By default each attached surface reports `Created` immediately, the way
/// a visible host view does once the surface is laid out.
#[derive(Clone)]
pub struct DummySurfaceHost {
    inner: Arc<Mutex<SurfaceHostState>>,
}

struct SurfaceHostState {
    next_id: u64,
    auto_create: bool,
    fail_attach: bool,
    attached: Vec<(SurfaceId, SurfaceListener)>,
    detach_count: usize,
}

impl DummySurfaceHost {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SurfaceHostState {
                next_id: 1,
                auto_create: true,
                fail_attach: false,
                attached: Vec::new(),
                detach_count: 0,
            })),
        }
    }

    /// Hold `Created` back until [`DummySurfaceHost::fire`] is called.
    pub fn manual(self) -> Self {
        self.inner.lock().auto_create = false;
        self
    }

    pub fn fail_attach(&self, fail: bool) {
        self.inner.lock().fail_attach = fail;
    }

    /// Surfaces currently attached to the host view.
    pub fn attached(&self) -> Vec<SurfaceId> {
        self.inner.lock().attached.iter().map(|(id, _)| *id).collect()
    }

    pub fn detach_count(&self) -> usize {
        self.inner.lock().detach_count
    }

    /// Deliver `event` to the listener of the most recently attached surface.
    pub fn fire(&self, event: SurfaceEvent) -> bool {
        let listener = self.inner.lock().attached.last().map(|(_, l)| Arc::clone(l));
        match listener {
            Some(l) => {
                l(event);
                true
            }
            None => false,
        }
    }

    /// Deliver `Created` for the most recently attached surface.
    pub fn create_latest(&self) -> bool {
        let latest = self.inner.lock().attached.last().map(|(id, _)| *id);
        match latest {
            Some(id) => self.fire(SurfaceEvent::Created(id)),
            None => false,
        }
    }
}

impl Default for DummySurfaceHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceHost for DummySurfaceHost {
    fn attach(&self, listener: SurfaceListener) -> Result<SurfaceId> {
        let (id, auto_create) = {
            let mut inner = self.inner.lock();
            if inner.fail_attach {
                return Err(CameraError::Configuration(
                    "host view rejected preview surface".to_string(),
                ));
            }
            let id = SurfaceId(inner.next_id);
            inner.next_id += 1;
            inner.attached.push((id, Arc::clone(&listener)));
            (id, inner.auto_create)
        };

        if auto_create {
            listener(SurfaceEvent::Created(id));
        }
        Ok(id)
    }

    fn detach(&self, surface: SurfaceId) {
        let mut inner = self.inner.lock();
        let before = inner.attached.len();
        inner.attached.retain(|(id, _)| *id != surface);
        if inner.attached.len() != before {
            inner.detach_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn params(width: u32, height: u32) -> PreviewParameters {
        PreviewParameters {
            size: Resolution::new(width, height),
            pixel_format: PixelFormat::Nv21,
            focus_mode: None,
            scene_mode: None,
        }
    }

    #[test]
    fn dummy_backend_opens_device_with_default_sizes() {
        let backend = DummyBackend::new();
        let device = backend.open().unwrap();
        assert_eq!(device.supported_preview_sizes(), DEFAULT_SIZES.to_vec());
        assert_eq!(backend.open_count(), 1);
    }

    #[test]
    fn dummy_backend_open_fault_reports_unavailable() {
        let backend = DummyBackend::new();
        backend.fail_open(true);
        assert!(matches!(
            backend.open(),
            Err(CameraError::DeviceUnavailable(_))
        ));
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn dummy_backend_permission_is_configurable() {
        let backend = DummyBackend::new();
        assert!(backend.has_permission());
        backend.set_permission(false);
        assert!(!backend.has_permission());
    }

    #[test]
    fn dummy_device_records_applied_parameters() {
        let backend = DummyBackend::new();
        let mut device = backend.open().unwrap();
        device.apply_parameters(&params(640, 480)).unwrap();
        assert_eq!(backend.applied_parameters(), vec![params(640, 480)]);
    }

    #[test]
    fn dummy_device_rejects_unsupported_size() {
        let backend = DummyBackend::new();
        let mut device = backend.open().unwrap();
        let result = device.apply_parameters(&params(123, 45));
        assert!(matches!(result, Err(CameraError::Configuration(_))));
    }

    #[test]
    fn emit_frame_without_callback_returns_false() {
        let backend = DummyBackend::new();
        assert!(!backend.emit_frame(Some(&[0u8; 4])));
    }

    #[test]
    fn emit_frame_reaches_registered_callback() {
        let backend = DummyBackend::new();
        let mut device = backend.open().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        device.set_preview_callback(Some(Arc::new(move |data: Option<&[u8]>| {
            seen_clone.fetch_add(data.map_or(0, |d| d.len()), Ordering::Relaxed);
        })));

        assert!(backend.emit_frame(Some(&[1, 2, 3])));
        assert_eq!(seen.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn release_clears_callback_and_is_counted_once() {
        let backend = DummyBackend::new();
        let mut device = backend.open().unwrap();
        device.set_preview_callback(Some(Arc::new(|_: Option<&[u8]>| {})));
        device.start_preview().unwrap();

        device.release();
        device.release();

        assert!(!backend.has_callback());
        assert!(!backend.is_previewing());
        assert_eq!(backend.release_count(), 1);
    }

    #[test]
    fn test_frame_has_nv21_length_and_gradient() {
        let frame = DummyBackend::test_frame(16, 8);
        assert_eq!(frame.len(), PixelFormat::Nv21.frame_len(16, 8));
        assert_eq!(frame[0], 0);
        assert_eq!(frame[15], 255);
        // Chroma is neutral
        assert_eq!(frame[16 * 8], 128);
    }

    #[test]
    fn surface_host_fires_created_on_attach() {
        let host = DummySurfaceHost::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let id = host
            .attach(Arc::new(move |e: SurfaceEvent| events_clone.lock().push(e)))
            .unwrap();

        assert_eq!(*events.lock(), vec![SurfaceEvent::Created(id)]);
        assert_eq!(host.attached(), vec![id]);
    }

    #[test]
    fn manual_surface_host_waits_for_fire() {
        let host = DummySurfaceHost::new().manual();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        host.attach(Arc::new(move |e: SurfaceEvent| events_clone.lock().push(e)))
            .unwrap();
        assert!(events.lock().is_empty());

        assert!(host.create_latest());
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn surface_host_detach_is_idempotent() {
        let host = DummySurfaceHost::new().manual();
        let id = host.attach(Arc::new(|_: SurfaceEvent| {})).unwrap();
        host.detach(id);
        host.detach(id);
        assert!(host.attached().is_empty());
        assert_eq!(host.detach_count(), 1);
    }

    #[test]
    fn dummy_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DummyBackend>();
        assert_send_sync::<DummySurfaceHost>();
    }
}
