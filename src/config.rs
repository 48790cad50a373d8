//! Configuration file support.
//!
//! Settings come from built-in defaults, then an optional TOML file, then
//! command-line flags. Every field is optional in the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ResizeError;
use crate::files::DEFAULT_SUFFIX;
use crate::processor::{Filter, ResizeMode, ResizeOptions, DEFAULT_QUALITY};

const TEMPLATE_WIDTH: u32 = 800;
const TEMPLATE_HEIGHT: u32 = 600;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resize: ResizeSection,
    pub output: OutputSection,
    pub batch: BatchSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub mode: ResizeMode,
    pub quality: u8,
    pub filter: Filter,
}

impl Default for ResizeSection {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            mode: ResizeMode::default(),
            quality: DEFAULT_QUALITY,
            filter: Filter::default(),
        }
    }
}

impl ResizeSection {
    /// Checks the section and turns it into options for the processor.
    pub fn to_options(&self) -> Result<ResizeOptions, ResizeError> {
        let (Some(width), Some(height)) = (self.width, self.height) else {
            return Err(ResizeError::MissingDimensions);
        };
        let options = ResizeOptions::new(width, height, self.mode)
            .with_quality(self.quality)
            .with_filter(self.filter);
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Defaults to `./resized_images` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub suffix: String,
    pub overwrite: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: None,
            suffix: DEFAULT_SUFFIX.to_string(),
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Defaults to the number of logical CPUs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    pub recursive: bool,
    pub fail_fast: bool,
}

impl BatchSection {
    pub fn worker_count(&self) -> Result<usize, ResizeError> {
        match self.workers {
            Some(0) => Err(ResizeError::InvalidWorkers),
            Some(n) => Ok(n),
            None => Ok(num_cpus::get()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `image_resizer=debug`
    pub level: String,
    /// Also append log lines to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }

    /// Starter file for `generate-config`: the defaults plus a target size,
    /// so the file works as written.
    pub fn template() -> Result<String> {
        let mut config = Self::default();
        config.resize.width = Some(TEMPLATE_WIDTH);
        config.resize.height = Some(TEMPLATE_HEIGHT);
        let text = config.to_toml()?;
        Ok(text.replacen(
            "[resize]\n",
            "[resize]\n# Target size in pixels; -W and -H override it\n",
            1,
        ))
    }
}
