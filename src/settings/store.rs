use std::path::Path;

use crate::camera::error::{CameraError, Result};
use crate::settings::types::TriCameraConfig;

impl TriCameraConfig {
    /// Load settings from a JSON file, returning defaults on a missing file.
    ///
    /// # Errors
    ///
    /// `CameraError::Config` when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CameraError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("{}: {e}", path.display())))
    }

    /// Save settings to disk atomically (write .tmp then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CameraError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CameraError::Config(e.to_string()))?;
        }

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| CameraError::Config(e.to_string()))?;
        std::fs::rename(&tmp_path, path).map_err(|e| CameraError::Config(e.to_string()))?;

        Ok(())
    }
}
