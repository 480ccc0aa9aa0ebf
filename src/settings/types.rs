use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::camera::types::TargetSpec;
use crate::preview::capture::DropPolicy;

/// Script object that receives frames by default.
pub const DEFAULT_RECEIVER: &str = "WebCamController";
/// Method invoked on the receiver for each frame.
pub const DEFAULT_METHOD: &str = "OnCameraFrame";
pub const DEFAULT_JPEG_QUALITY: u8 = 80;
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Bridge configuration. Every field falls back to its default when absent
/// from the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeSettings {
    /// Preview size to negotiate towards.
    pub target: TargetSpec,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    /// Host-side receiver name for frame messages.
    pub receiver: String,
    /// Host-side method name for frame messages.
    pub method: String,
    /// Frames buffered between the camera callback and the encoder.
    pub queue_capacity: usize,
    pub drop_policy: DropPolicy,
    /// Request continuous-picture autofocus when the device supports it.
    pub continuous_focus: bool,
    /// Request barcode scene mode when the device supports it.
    pub barcode_scene: bool,
    pub log_level: LevelFilter,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            target: TargetSpec::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            receiver: DEFAULT_RECEIVER.to_string(),
            method: DEFAULT_METHOD.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drop_policy: DropPolicy::default(),
            continuous_focus: true,
            barcode_scene: true,
            log_level: LevelFilter::Info,
        }
    }
}

impl BridgeSettings {
    /// Clamp out-of-range values into something the pipeline can run with.
    pub fn normalized(mut self) -> Self {
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.queue_capacity = self.queue_capacity.max(1);
        self.target = self.target.or_default();
        self
    }
}
