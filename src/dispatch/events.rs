use std::sync::Arc;

use serde::Serialize;

use crate::camera::error::{CameraError, ErrorKind};

/// Session lifecycle notifications for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    /// Device configured; waiting for the preview surface.
    Started { width: u32, height: u32 },
    /// Frames are flowing.
    Previewing,
    /// Surface went away; streaming resumes when it is recreated.
    Suspended,
    Stopped,
    Failed { kind: ErrorKind, message: String },
}

impl SessionEvent {
    pub fn failed(err: &CameraError) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// JSON form, for hosts that only take string messages.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("failed to serialise session event: {e}");
            String::new()
        })
    }
}

/// Callback receiving session events. Fires on whichever thread caused the
/// transition: the UI thread for start/stop, the surface thread otherwise.
pub type EventCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;
