use std::sync::Arc;

use tokio::sync::oneshot;

use super::session::{SessionCore, SessionState};
use crate::camera::backend::{CameraBackend, SurfaceHost};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::NegotiatedFormat;
use crate::diagnostics::stats::DiagnosticSnapshot;
use crate::dispatch::events::{EventCallback, SessionEvent};
use crate::dispatch::executor::{ThreadDispatcher, UiDispatcher};
use crate::dispatch::sink::FrameSink;
use crate::settings::types::BridgeSettings;

/// Name of the dispatcher thread spawned when the host supplies none.
pub const UI_THREAD_NAME: &str = "camera-ui";

/// Completion handle for a posted command. Await it, block on it with
/// `blocking_recv`, or drop it.
pub type Completion<T> = oneshot::Receiver<Result<T>>;

/// Host-facing control surface for the camera preview.
///
/// `start` and `stop` are posted to the UI dispatcher and return
/// immediately. `is_running` and the other queries can be called from any
/// thread.
pub struct CameraBridge {
    core: Arc<SessionCore>,
    dispatcher: Arc<dyn UiDispatcher>,
}

impl CameraBridge {
    pub fn builder(
        backend: Arc<dyn CameraBackend>,
        surfaces: Arc<dyn SurfaceHost>,
        sink: Arc<dyn FrameSink>,
    ) -> CameraBridgeBuilder {
        CameraBridgeBuilder {
            backend,
            surfaces,
            sink,
            dispatcher: None,
            settings: BridgeSettings::default(),
            on_event: None,
        }
    }

    /// Open the camera and begin streaming frames to the sink.
    pub fn start(&self) -> Completion<NegotiatedFormat> {
        let (tx, rx) = oneshot::channel();
        let core = Arc::clone(&self.core);
        self.dispatcher.post(Box::new(move || {
            let _ = tx.send(core.start());
        }));
        rx
    }

    /// Stop streaming and release the camera. Safe to call at any time.
    pub fn stop(&self) -> Completion<()> {
        let (tx, rx) = oneshot::channel();
        let core = Arc::clone(&self.core);
        self.dispatcher.post(Box::new(move || {
            let _ = tx.send(core.stop());
        }));
        rx
    }

    /// Whether frames are currently flowing.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn negotiated_format(&self) -> Option<NegotiatedFormat> {
        self.core.negotiated_format()
    }

    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.core.diagnostics()
    }

    pub fn last_error(&self) -> Option<CameraError> {
        self.core.last_error()
    }

    pub fn settings(&self) -> BridgeSettings {
        self.core.settings()
    }

    /// Replace the settings. Takes effect on the next `start`.
    pub fn update_settings(&self, settings: BridgeSettings) {
        self.core.set_settings(settings);
    }
}

impl Drop for CameraBridge {
    fn drop(&mut self) {
        let core = Arc::clone(&self.core);
        self.dispatcher.post(Box::new(move || {
            let _ = core.stop();
        }));
    }
}

/// Builder for [`CameraBridge`].
pub struct CameraBridgeBuilder {
    backend: Arc<dyn CameraBackend>,
    surfaces: Arc<dyn SurfaceHost>,
    sink: Arc<dyn FrameSink>,
    dispatcher: Option<Arc<dyn UiDispatcher>>,
    settings: BridgeSettings,
    on_event: Option<EventCallback>,
}

impl CameraBridgeBuilder {
    /// Run commands on the host's UI thread instead of a dedicated one.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn UiDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn settings(mut self, settings: BridgeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<CameraBridge> {
        let dispatcher = match self.dispatcher {
            Some(d) => d,
            None => {
                let d = ThreadDispatcher::spawn(UI_THREAD_NAME).map_err(|e| {
                    CameraError::Configuration(format!("failed to spawn ui thread: {e}"))
                })?;
                Arc::new(d)
            }
        };
        let core = Arc::new(SessionCore::new(
            self.backend,
            self.surfaces,
            self.sink,
            self.settings,
            self.on_event,
        ));
        Ok(CameraBridge { core, dispatcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::{DummyBackend, DummySurfaceHost};
    use crate::camera::error::ErrorKind;
    use crate::camera::types::{Resolution, SurfaceEvent, TargetSpec};
    use crate::dispatch::executor::{InlineDispatcher, Task};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    type Frames = mpsc::Receiver<(String, String, String)>;

    fn channel_sink() -> (Arc<dyn FrameSink>, Frames) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let sink = move |receiver: &str, method: &str, payload: &str| {
            let _ = tx
                .lock()
                .send((receiver.to_string(), method.to_string(), payload.to_string()));
        };
        (Arc::new(sink), rx)
    }

    fn inline_bridge(backend: &DummyBackend, host: &DummySurfaceHost) -> (CameraBridge, Frames) {
        let (sink, frames) = channel_sink();
        let bridge = CameraBridge::builder(Arc::new(backend.clone()), Arc::new(host.clone()), sink)
            .dispatcher(Arc::new(InlineDispatcher))
            .build()
            .unwrap();
        (bridge, frames)
    }

    /// Dispatcher that holds tasks until the test runs them.
    #[derive(Default)]
    struct QueuedDispatcher {
        tasks: Mutex<Vec<Task>>,
    }

    impl QueuedDispatcher {
        fn run_all(&self) -> usize {
            let tasks: Vec<Task> = self.tasks.lock().drain(..).collect();
            let n = tasks.len();
            for task in tasks {
                task();
            }
            n
        }
    }

    impl UiDispatcher for QueuedDispatcher {
        fn post(&self, task: Task) {
            self.tasks.lock().push(task);
        }
    }

    #[test]
    fn stop_before_start_resolves_ok() {
        let (bridge, _frames) = inline_bridge(&DummyBackend::new(), &DummySurfaceHost::new());
        assert_eq!(bridge.stop().blocking_recv().unwrap(), Ok(()));
        assert!(!bridge.is_running());
        assert_eq!(bridge.state(), SessionState::Idle);
    }

    #[test]
    fn double_stop_is_idempotent() {
        let backend = DummyBackend::new();
        let (bridge, _frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        bridge.start().blocking_recv().unwrap().unwrap();
        assert_eq!(bridge.stop().blocking_recv().unwrap(), Ok(()));
        assert_eq!(bridge.stop().blocking_recv().unwrap(), Ok(()));
        assert_eq!(backend.release_count(), 1);
        assert!(!bridge.is_running());
    }

    #[test]
    fn double_start_is_rejected() {
        let backend = DummyBackend::new();
        let (bridge, _frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        bridge.start().blocking_recv().unwrap().unwrap();
        let second = bridge.start().blocking_recv().unwrap();
        assert_eq!(second, Err(CameraError::AlreadyActive));
        assert!(bridge.is_running());
        assert_eq!(backend.open_count(), 1);
    }

    #[test]
    fn permission_denied_never_opens_device() {
        let backend = DummyBackend::new();
        backend.set_permission(false);
        let (bridge, frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        let result = bridge.start().blocking_recv().unwrap();
        assert_eq!(result, Err(CameraError::PermissionDenied));
        assert!(!bridge.is_running());
        assert_eq!(backend.open_count(), 0);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn open_failure_leaves_bridge_stopped() {
        let backend = DummyBackend::new();
        backend.fail_open(true);
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let (sink, _frames) = channel_sink();
        let bridge = CameraBridge::builder(
            Arc::new(backend.clone()),
            Arc::new(DummySurfaceHost::new()),
            sink,
        )
        .dispatcher(Arc::new(InlineDispatcher))
        .on_event(move |e: &SessionEvent| events_clone.lock().push(e.clone()))
        .build()
        .unwrap();

        let err = bridge.start().blocking_recv().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert!(!bridge.is_running());
        assert_eq!(bridge.last_error().map(|e| e.kind()), Some(ErrorKind::DeviceUnavailable));
        assert!(matches!(
            events.lock().as_slice(),
            [SessionEvent::Failed {
                kind: ErrorKind::DeviceUnavailable,
                ..
            }]
        ));
    }

    #[test]
    fn no_aspect_match_falls_back_to_closest_height() {
        let backend = DummyBackend::new().with_sizes(vec![
            Resolution::new(1920, 1080),
            Resolution::new(1280, 720),
            Resolution::new(800, 600),
            Resolution::new(640, 480),
        ]);
        let (bridge, _frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        let format = bridge.start().blocking_recv().unwrap().unwrap();
        assert_eq!(format.resolution(), Resolution::new(800, 600));
        assert_eq!(bridge.negotiated_format(), Some(format));
    }

    #[test]
    fn square_target_picks_square_size() {
        let backend = DummyBackend::new().with_sizes(vec![
            Resolution::new(1280, 720),
            Resolution::new(640, 640),
            Resolution::new(320, 320),
        ]);
        let (bridge, _frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        let format = bridge.start().blocking_recv().unwrap().unwrap();
        assert_eq!(format.resolution(), Resolution::new(640, 640));
    }

    #[test]
    fn null_frame_produces_no_message() {
        let backend = DummyBackend::new();
        let (bridge, frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        bridge.start().blocking_recv().unwrap().unwrap();
        assert!(backend.emit_frame(None));
        bridge.stop().blocking_recv().unwrap().unwrap();

        assert!(frames.try_recv().is_err());
        assert_eq!(bridge.diagnostics().frames_dispatched, 0);
    }

    #[test]
    fn valid_frame_dispatches_full_size_jpeg() {
        let backend = DummyBackend::new().with_sizes(vec![Resolution::new(64, 48)]);
        let (bridge, frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        bridge.update_settings(BridgeSettings {
            target: TargetSpec {
                width: 64,
                height: 48,
            },
            ..BridgeSettings::default()
        });
        let format = bridge.start().blocking_recv().unwrap().unwrap();
        assert!(backend.emit_frame(Some(&DummyBackend::test_frame(format.width, format.height))));

        let (receiver, method, payload) = frames.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(receiver, "WebCamController");
        assert_eq!(method, "OnCameraFrame");
        assert!(!payload.contains('\n'));

        let jpeg = STANDARD.decode(payload).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn custom_receiver_and_method_are_used() {
        let backend = DummyBackend::new();
        let (bridge, frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        bridge.update_settings(BridgeSettings {
            receiver: "Scanner".to_string(),
            method: "OnFrame".to_string(),
            ..BridgeSettings::default()
        });
        let format = bridge.start().blocking_recv().unwrap().unwrap();
        backend.emit_frame(Some(&DummyBackend::test_frame(format.width, format.height)));

        let (receiver, method, _) = frames.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!((receiver.as_str(), method.as_str()), ("Scanner", "OnFrame"));
    }

    #[test]
    fn surface_recreate_resumes_streaming() {
        let backend = DummyBackend::new();
        let host = DummySurfaceHost::new();
        let (bridge, _frames) = inline_bridge(&backend, &host);
        bridge.start().blocking_recv().unwrap().unwrap();

        host.fire(SurfaceEvent::Destroyed);
        assert!(!bridge.is_running());
        assert_eq!(bridge.state(), SessionState::Starting);

        assert!(host.create_latest());
        assert!(bridge.is_running());
    }

    #[test]
    fn commands_run_only_when_dispatcher_runs_them() {
        let backend = DummyBackend::new();
        let dispatcher = Arc::new(QueuedDispatcher::default());
        let (sink, _frames) = channel_sink();
        let bridge = CameraBridge::builder(
            Arc::new(backend.clone()),
            Arc::new(DummySurfaceHost::new()),
            sink,
        )
        .dispatcher(Arc::clone(&dispatcher) as Arc<dyn UiDispatcher>)
        .build()
        .unwrap();

        let mut started = bridge.start();
        assert!(!bridge.is_running());
        assert_eq!(backend.open_count(), 0);
        assert!(started.try_recv().is_err());

        assert_eq!(dispatcher.run_all(), 1);
        assert!(started.try_recv().unwrap().is_ok());
        assert!(bridge.is_running());

        let _ = bridge.stop();
        assert!(bridge.is_running());
        dispatcher.run_all();
        assert!(!bridge.is_running());
    }

    #[test]
    fn dropping_bridge_releases_camera() {
        let backend = DummyBackend::new();
        let (bridge, _frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        bridge.start().blocking_recv().unwrap().unwrap();
        drop(bridge);
        assert_eq!(backend.release_count(), 1);
        assert!(!backend.is_previewing());
    }

    #[test]
    fn default_dispatcher_runs_on_named_thread() {
        let backend = DummyBackend::new();
        let (sink, _frames) = channel_sink();
        let bridge = CameraBridge::builder(
            Arc::new(backend.clone()),
            Arc::new(DummySurfaceHost::new()),
            sink,
        )
        .build()
        .unwrap();

        let (tx, rx) = mpsc::channel();
        bridge.dispatcher.post(Box::new(move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some(UI_THREAD_NAME));

        let format = bridge.start().blocking_recv().unwrap().unwrap();
        assert_eq!(format.resolution(), Resolution::new(800, 600));
        assert!(bridge.is_running());
        bridge.stop().blocking_recv().unwrap().unwrap();
        assert!(!bridge.is_running());
    }

    #[tokio::test]
    async fn completion_can_be_awaited() {
        let backend = DummyBackend::new();
        let (bridge, _frames) = inline_bridge(&backend, &DummySurfaceHost::new());
        let format = bridge.start().await.unwrap().unwrap();
        assert_eq!(format.width, 800);
        bridge.stop().await.unwrap().unwrap();
    }
}
