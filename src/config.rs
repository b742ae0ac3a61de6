use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::logging::default_log_level;
use crate::mark::DEFAULT_MIN_TEXT_EXTENT;

const MIN_TEXT_EXTENT_RANGE: (f32, f32) = (0.01, 0.5);

/// Tunables for the interaction engine, read from `config.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// How long a press must be held before a mark is placed.
    pub hold_duration_ms: u64,
    /// Pointer drift (pixels) that turns a pending hold into a no-op.
    pub hold_tolerance_px: f32,
    pub min_text_extent: f32,
    /// Point mark size change per wheel notch.
    pub point_size_step: f32,
    pub log_level: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            hold_duration_ms: 1000,
            hold_tolerance_px: 6.0,
            min_text_extent: DEFAULT_MIN_TEXT_EXTENT,
            point_size_step: 0.1,
            log_level: default_log_level().to_string(),
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config `{}`", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config `{}`", path.display()))?;
        Ok(config.sanitized())
    }

    /// Like [`EditorConfig::load`], but a missing file is `Ok(None)`.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Loads `path`, falling back to defaults when it is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config.unwrap_or_default(),
            Err(err) => {
                log::warn!("event=config_load module=config status=fallback error={err:#}");
                Self::default()
            }
        }
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_duration_ms)
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.hold_tolerance_px.is_finite() || self.hold_tolerance_px < 0.0 {
            self.hold_tolerance_px = defaults.hold_tolerance_px;
        }
        self.min_text_extent = if self.min_text_extent.is_finite() {
            self.min_text_extent
                .clamp(MIN_TEXT_EXTENT_RANGE.0, MIN_TEXT_EXTENT_RANGE.1)
        } else {
            defaults.min_text_extent
        };
        if !self.point_size_step.is_finite() || self.point_size_step <= 0.0 {
            self.point_size_step = defaults.point_size_step;
        }
        self
    }
}
