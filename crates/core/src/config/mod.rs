use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    mapping::CueSetDescriptor, record::CaptureSettings, scene::find_sketch, CueCaptureError,
    Result,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Catalog id of the sketch to run.
    pub sketch: String,
    pub render: RenderConfig,
    pub capture: CaptureSettings,
    pub cue_sets: Vec<CueSetDescriptor>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sketch: "number-2".to_string(),
            render: RenderConfig::default(),
            capture: CaptureSettings {
                prefix: "StringsNo2".to_string(),
                ..CaptureSettings::default()
            },
            cue_sets: CueSetDescriptor::strings_defaults(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        find_sketch(&self.sketch)?;
        self.render.validate()?;
        self.capture.validate()
    }
}

/// Surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Seed for every random choice a cue handler makes.
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            seed: 0,
        }
    }
}

impl RenderConfig {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CueCaptureError::InvalidInput("surface dimensions must be positive"));
        }
        Ok(())
    }
}
