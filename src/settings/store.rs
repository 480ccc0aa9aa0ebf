use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::camera::error::{CameraError, Result};
use crate::camera::types::TargetSpec;
use crate::settings::types::BridgeSettings;

/// Bridge settings persisted as JSON.
pub struct SettingsStore {
    path: PathBuf,
    data: Mutex<BridgeSettings>,
}

impl SettingsStore {
    /// Create a new store, loading from disk if the file exists.
    ///
    /// An unreadable or malformed file is logged and replaced by defaults.
    pub fn new(path: PathBuf) -> Self {
        let data = Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "using default settings: {e}");
            BridgeSettings::default()
        });
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Load settings from a JSON file, returning defaults on a missing file.
    pub fn load(path: &Path) -> Result<BridgeSettings> {
        if !path.exists() {
            return Ok(BridgeSettings::default());
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| CameraError::Settings(e.to_string()))?;
        let settings: BridgeSettings =
            serde_json::from_str(&contents).map_err(|e| CameraError::Settings(e.to_string()))?;
        Ok(settings.normalized())
    }

    /// Save current settings to disk atomically (write .tmp then rename).
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().clone();
        let json =
            serde_json::to_string_pretty(&data).map_err(|e| CameraError::Settings(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CameraError::Settings(e.to_string()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| CameraError::Settings(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| CameraError::Settings(e.to_string()))?;

        Ok(())
    }

    /// Current settings.
    pub fn get(&self) -> BridgeSettings {
        self.data.lock().clone()
    }

    /// Change the preview size negotiated by the next session.
    pub fn set_target(&self, target: TargetSpec) {
        self.data.lock().target = target.or_default();
    }

    pub fn set_jpeg_quality(&self, quality: u8) {
        self.data.lock().jpeg_quality = quality.clamp(1, 100);
    }
}
