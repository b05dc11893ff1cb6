// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::Path;

use crate::backend::{DevicePreference, InitOptions, ValidationOptions};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub application: ApplicationConfig,
    pub debug: DebugConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Metadata handed to the driver at instance creation
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub version: [u32; 3],
    pub engine_name: String,
    pub engine_version: [u32; 3],
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Hello Triangle".to_string(),
            version: [1, 0, 0],
            engine_name: "No Engine".to_string(),
            engine_version: [1, 0, 0],
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub layers: Vec<String>,
    pub report_severity: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: cfg!(debug_assertions),
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            report_severity: "error".to_string(),
        }
    }
}

/// GPU selection
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub preference: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            preference: "discrete".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from config.toml, falling back to defaults.
    ///
    /// Runs before the logger exists, so a read or parse failure is handed
    /// back to the caller to report once logging is up.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default("config.toml")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the debug report threshold as Vulkan severity flags
    pub fn report_severity(&self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        match self.debug.report_severity.to_lowercase().as_str() {
            "verbose" => vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            "info" => vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            "warning" => vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            "error" => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            _ => {
                log::warn!(
                    "Unknown report severity '{}', defaulting to ERROR",
                    self.debug.report_severity
                );
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
            }
        }
    }

    pub fn device_preference(&self) -> DevicePreference {
        match self.device.preference.to_lowercase().as_str() {
            "first" => DevicePreference::First,
            "discrete" => DevicePreference::Discrete,
            _ => {
                log::warn!(
                    "Unknown device preference '{}', defaulting to DISCRETE",
                    self.device.preference
                );
                DevicePreference::Discrete
            }
        }
    }

    /// Options for the bring-up sequence
    pub fn init_options(&self) -> InitOptions {
        let version = |[major, minor, patch]: [u32; 3]| vk::make_api_version(0, major, minor, patch);

        InitOptions {
            application_name: self.application.name.clone(),
            application_version: version(self.application.version),
            engine_name: self.application.engine_name.clone(),
            engine_version: version(self.application.engine_version),
            validation: self.debug.validation_layers.then(|| ValidationOptions {
                layers: self.debug.layers.clone(),
                report_severity: self.report_severity(),
            }),
            device_preference: self.device_preference(),
        }
    }
}
