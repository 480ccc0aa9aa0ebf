pub mod camera;
pub mod diagnostics;
pub mod dispatch;
pub mod logging;
pub mod preview;
pub mod settings;

use std::sync::Arc;

pub use camera::backend::{
    CameraBackend, CameraDevice, FrameCallback, NullBackend, NullSurfaceHost, SurfaceHost,
    SurfaceListener,
};
pub use camera::error::{CameraError, ErrorKind, Result};
pub use camera::types::{NegotiatedFormat, Resolution, SurfaceEvent, SurfaceId, TargetSpec};
pub use diagnostics::stats::DiagnosticSnapshot;
pub use dispatch::events::SessionEvent;
pub use dispatch::executor::{InlineDispatcher, ThreadDispatcher, UiDispatcher};
pub use dispatch::sink::{ChannelSink, FrameSink};
pub use preview::capture::DropPolicy;
pub use preview::commands::{CameraBridge, CameraBridgeBuilder};
pub use preview::session::SessionState;
pub use settings::store::SettingsStore;
pub use settings::types::BridgeSettings;

/// Create the camera backend and surface host for the current platform.
///
/// When `DUMMY_CAMERA=1` is set, a simulated camera is used instead.
pub fn default_backend() -> (Arc<dyn CameraBackend>, Arc<dyn SurfaceHost>) {
    if camera::dummy::DummyBackend::is_enabled() {
        tracing::info!("DUMMY_CAMERA set, using simulated camera");
        return (
            Arc::new(camera::dummy::DummyBackend::new()),
            Arc::new(camera::dummy::DummySurfaceHost::new()),
        );
    }
    (Arc::new(NullBackend), Arc::new(NullSurfaceHost))
}

/// Build a bridge on the default backend, configured from the settings file
/// at `settings_path`, with logging initialised at the configured level.
pub fn bridge_from_settings(
    settings_path: impl Into<std::path::PathBuf>,
    sink: Arc<dyn FrameSink>,
) -> Result<CameraBridge> {
    let store = SettingsStore::new(settings_path.into());
    let settings = store.get();
    logging::init(settings.log_level);

    let (backend, surfaces) = default_backend();
    CameraBridge::builder(backend, surfaces, sink)
        .settings(settings)
        .build()
}
