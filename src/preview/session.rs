use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::capture::{DispatchTarget, FramePipeline};
use crate::camera::backend::{CameraBackend, CameraDevice, SurfaceHost, SurfaceListener};
use crate::camera::error::{CameraError, Result};
use crate::camera::selector::select_preview_size;
use crate::camera::types::{
    FocusMode, NegotiatedFormat, PixelFormat, PreviewParameters, SceneMode, SurfaceEvent,
    SurfaceId,
};
use crate::diagnostics::stats::{DiagnosticSnapshot, DiagnosticStats};
use crate::dispatch::events::{EventCallback, SessionEvent};
use crate::dispatch::sink::FrameSink;
use crate::settings::types::BridgeSettings;

const IDLE: u8 = 0;
const STARTING: u8 = 1;
const PREVIEWING: u8 = 2;

/// Lifecycle of the single capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    /// Device configured, waiting for (or between) preview surfaces.
    Starting,
    Previewing,
}

impl SessionState {
    fn from_tag(tag: u8) -> Self {
        match tag {
            STARTING => Self::Starting,
            PREVIEWING => Self::Previewing,
            _ => Self::Idle,
        }
    }
}

/// Everything owned by a running session.
struct ActiveSession {
    /// Matches the generation captured by this session's surface listener.
    generation: u64,
    device: Box<dyn CameraDevice>,
    params: PreviewParameters,
    format: NegotiatedFormat,
    pipeline: FramePipeline,
    surface: Option<SurfaceId>,
}

/// Session state machine.
///
/// `start` and `stop` must run on the UI-affine thread; surface events
/// arrive on whatever thread the host fires them from. The state tag is
/// only advanced with compare-and-swap while holding the session lock, so
/// readers on any thread see a consistent value without taking the lock.
pub struct SessionCore {
    state: AtomicU8,
    /// Source of session generations. Surface events carry the generation
    /// of the session that attached them and are only applied to a live
    /// session with the same generation.
    generation: AtomicU64,
    active: Mutex<Option<ActiveSession>>,
    last_error: Mutex<Option<CameraError>>,
    backend: Arc<dyn CameraBackend>,
    surfaces: Arc<dyn SurfaceHost>,
    sink: Arc<dyn FrameSink>,
    settings: Mutex<BridgeSettings>,
    stats: Arc<Mutex<DiagnosticStats>>,
    events: Option<EventCallback>,
}

impl SessionCore {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        surfaces: Arc<dyn SurfaceHost>,
        sink: Arc<dyn FrameSink>,
        settings: BridgeSettings,
        events: Option<EventCallback>,
    ) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
            last_error: Mutex::new(None),
            backend,
            surfaces,
            sink,
            settings: Mutex::new(settings.normalized()),
            stats: Arc::new(Mutex::new(DiagnosticStats::new())),
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_tag(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Previewing
    }

    /// Format of the active session, if any.
    pub fn negotiated_format(&self) -> Option<NegotiatedFormat> {
        self.active.lock().as_ref().map(|s| s.format)
    }

    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.stats.lock().snapshot()
    }

    pub fn settings(&self) -> BridgeSettings {
        self.settings.lock().clone()
    }

    /// Replace the settings used by the next session.
    pub fn set_settings(&self, settings: BridgeSettings) {
        *self.settings.lock() = settings.normalized();
    }

    /// Most recent session failure. Cleared when a new start begins.
    pub fn last_error(&self) -> Option<CameraError> {
        self.last_error.lock().clone()
    }

    /// Open, configure and attach a preview surface. UI thread only.
    ///
    /// A second start while a session exists is rejected. On failure every
    /// acquired resource is released and the state returns to idle.
    pub fn start(self: &Arc<Self>) -> Result<NegotiatedFormat> {
        if self
            .state
            .compare_exchange(IDLE, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(state = ?self.state(), "start ignored: a capture session is already active");
            return Err(CameraError::AlreadyActive);
        }
        self.last_error.lock().take();
        self.stats.lock().reset();

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let format = match self.open_and_configure(generation) {
            Ok(format) => format,
            Err(e) => {
                self.fail(None, e.clone());
                return Err(e);
            }
        };
        self.emit(SessionEvent::Started {
            width: format.width,
            height: format.height,
        });

        let listener = self.surface_listener(generation);
        match self.surfaces.attach(listener) {
            Ok(surface) => {
                let live = match current(&mut self.active.lock(), generation) {
                    Some(session) => {
                        session.surface = Some(surface);
                        true
                    }
                    None => false,
                };
                if live {
                    return Ok(format);
                }
                // The surface callback already failed and tore the session down
                self.surfaces.detach(surface);
                Err(self.last_error().unwrap_or_else(|| {
                    CameraError::Stream("preview stopped during start".to_string())
                }))
            }
            Err(e) => {
                let e = into_configuration(e);
                self.fail(Some(generation), e.clone());
                Err(e)
            }
        }
    }

    /// Tear down the active session, if any. UI thread only. Idempotent.
    pub fn stop(&self) -> Result<()> {
        match self.take_session(None) {
            Some(session) => {
                self.release(session);
                info!("camera stopped");
                self.emit(SessionEvent::Stopped);
            }
            None => debug!("stop requested with no active session"),
        }
        Ok(())
    }

    fn open_and_configure(&self, generation: u64) -> Result<NegotiatedFormat> {
        if !self.backend.has_permission() {
            return Err(CameraError::PermissionDenied);
        }

        let mut device = self.backend.open()?;
        let settings = self.settings();

        let candidates = device.supported_preview_sizes();
        let size = match select_preview_size(&candidates, &settings.target) {
            Some(size) => {
                debug!(%size, "using camera resolution");
                size
            }
            None => {
                warn!(
                    requested = %settings.target.resolution(),
                    "device reported no preview sizes, keeping requested size"
                );
                settings.target.resolution()
            }
        };

        let focus_mode = (settings.continuous_focus
            && device
                .supported_focus_modes()
                .contains(&FocusMode::ContinuousPicture))
        .then_some(FocusMode::ContinuousPicture);
        let scene_mode = (settings.barcode_scene
            && device.supported_scene_modes().contains(&SceneMode::Barcode))
        .then_some(SceneMode::Barcode);

        let params = PreviewParameters {
            size,
            pixel_format: PixelFormat::Nv21,
            focus_mode,
            scene_mode,
        };
        if let Err(e) = device.apply_parameters(&params) {
            device.release();
            return Err(into_configuration(e));
        }

        let format = NegotiatedFormat {
            width: size.width,
            height: size.height,
            pixel_format: params.pixel_format,
        };
        let target = DispatchTarget {
            sink: Arc::clone(&self.sink),
            receiver: settings.receiver,
            method: settings.method,
            jpeg_quality: settings.jpeg_quality,
        };
        let pipeline = match FramePipeline::start(
            format,
            settings.queue_capacity,
            settings.drop_policy,
            target,
            Arc::clone(&self.stats),
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                device.release();
                return Err(e);
            }
        };

        info!(
            width = format.width,
            height = format.height,
            ?focus_mode,
            ?scene_mode,
            "camera configured"
        );
        *self.active.lock() = Some(ActiveSession {
            generation,
            device,
            params,
            format,
            pipeline,
            surface: None,
        });
        Ok(format)
    }

    fn surface_listener(self: &Arc<Self>, generation: u64) -> SurfaceListener {
        let core: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |event| {
            if let Some(core) = core.upgrade() {
                core.on_surface_event(generation, event);
            }
        })
    }

    fn on_surface_event(&self, generation: u64, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Created(surface) => self.on_surface_created(generation, surface),
            SurfaceEvent::Changed { width, height } => {
                self.on_surface_changed(generation, width, height)
            }
            SurfaceEvent::Destroyed => self.on_surface_destroyed(generation),
        }
    }

    fn on_surface_created(&self, generation: u64, surface: SurfaceId) {
        let result = {
            let mut active = self.active.lock();
            let Some(session) = current(&mut active, generation) else {
                debug!(?surface, "ignoring surface from a previous session");
                return;
            };
            session.surface = Some(surface);
            let callback = session.pipeline.callback();
            session
                .device
                .set_preview_display(surface)
                .and_then(|()| {
                    session.device.set_preview_callback(Some(callback));
                    session.device.start_preview()
                })
                .map(|()| {
                    self.state
                        .compare_exchange(STARTING, PREVIEWING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                })
        };

        match result {
            Ok(true) => {
                info!("camera preview started");
                self.emit(SessionEvent::Previewing);
            }
            Ok(false) => {}
            Err(e) => self.fail(Some(generation), into_stream(e)),
        }
    }

    /// Restart the stream with the negotiated parameters. The surface size
    /// is deliberately not pushed to the device: frames must keep matching
    /// the buffers and encoder sized at start.
    fn on_surface_changed(&self, generation: u64, width: u32, height: u32) {
        let result = {
            let mut active = self.active.lock();
            let Some(session) = current(&mut active, generation) else {
                debug!(width, height, "ignoring surface change from a previous session");
                return;
            };
            debug!(width, height, "preview surface changed, restarting stream");
            session.device.stop_preview();
            let params = session.params.clone();
            session
                .device
                .apply_parameters(&params)
                .and_then(|()| session.device.start_preview())
        };

        if let Err(e) = result {
            self.fail(Some(generation), into_stream(e));
        }
    }

    fn on_surface_destroyed(&self, generation: u64) {
        let suspended = {
            let mut active = self.active.lock();
            let Some(session) = current(&mut active, generation) else {
                debug!("ignoring surface destroy from a previous session");
                return;
            };
            session.device.stop_preview();
            session.surface = None;
            self.state
                .compare_exchange(PREVIEWING, STARTING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        };

        if suspended {
            info!("preview surface destroyed, streaming suspended");
            self.emit(SessionEvent::Suspended);
        }
    }

    /// Log, record and report `err`, then release everything.
    ///
    /// With `Some(generation)` the failure only applies while that session
    /// is still the live one; a session already stopped is left alone.
    fn fail(&self, generation: Option<u64>, err: CameraError) {
        let session = self.take_session(generation);
        if generation.is_some() && session.is_none() {
            debug!("dropping failure from a session that already ended: {err}");
            return;
        }

        error!(target: "camera_bridge", kind = ?err.kind(), "{err}");
        *self.last_error.lock() = Some(err.clone());
        if let Some(session) = session {
            self.release(session);
        }
        self.emit(SessionEvent::failed(&err));
    }

    /// Take the live session out and return the state to idle. With
    /// `Some(generation)` nothing happens unless that session is live.
    fn take_session(&self, generation: Option<u64>) -> Option<ActiveSession> {
        let mut active = self.active.lock();
        if let Some(generation) = generation {
            current(&mut active, generation)?;
        }
        self.state.store(IDLE, Ordering::Release);
        active.take()
    }

    /// Release the device, encoder and surface of a session already taken
    /// out of the lock.
    fn release(&self, mut session: ActiveSession) {
        session.device.stop_preview();
        session.device.set_preview_callback(None);
        session.device.release();
        session.pipeline.stop();
        if let Some(surface) = session.surface {
            self.surfaces.detach(surface);
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(cb) = &self.events {
            cb(&event);
        }
    }
}

/// The live session, if it belongs to `generation`.
fn current(active: &mut Option<ActiveSession>, generation: u64) -> Option<&mut ActiveSession> {
    active.as_mut().filter(|s| s.generation == generation)
}

/// Device errors raised while configuring count as configuration failures.
fn into_configuration(err: CameraError) -> CameraError {
    match err {
        CameraError::Configuration(_) => err,
        other => CameraError::Configuration(other.to_string()),
    }
}

/// Device errors raised while streaming count as stream failures.
fn into_stream(err: CameraError) -> CameraError {
    match err {
        CameraError::Stream(_) => err,
        other => CameraError::Stream(other.to_string()),
    }
}
