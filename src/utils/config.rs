//! Application configuration module.
//!
//! Configuration is loaded from a JSON file. Library components take the
//! narrower config structs ([`GeometryConfig`], [`SessionConfig`],
//! [`PdfConfig`]) so they can be built directly in tests; [`AppConfig`]
//! groups them for the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/formsight.json";

/// Global configuration instance
static CONFIG_INSTANCE: OnceCell<AppConfig> = OnceCell::new();

/// Parameters of the geometric normalization pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Larger output dimension after scale normalization, in pixels.
    pub max_dimension: u32,

    /// Larger dimension of the working copy used for border detection.
    pub detection_dimension: u32,

    /// Minimum share of the frame a border candidate must enclose.
    pub min_border_area_fraction: f32,

    /// Corners closer than this fraction of the shorter side to the frame
    /// corners are treated as the frame itself.
    pub frame_tolerance_fraction: f32,

    /// Segments steeper than this are ignored by deskew.
    pub max_skew_degrees: f32,

    /// Median skew below this is not corrected.
    pub min_skew_degrees: f32,

    /// Fewer qualifying segments than this skip deskew.
    pub min_skew_segments: usize,

    /// If the 180 hypothesis beats 0 by less than this, recheck with text
    /// confidence.
    pub decisiveness_margin: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            detection_dimension: 1000,
            min_border_area_fraction: 0.2,
            frame_tolerance_fraction: 0.02,
            max_skew_degrees: 20.0,
            min_skew_degrees: 0.2,
            min_skew_segments: 3,
            decisiveness_margin: 0.3,
        }
    }
}

/// Session lifetime settings shared by both stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is removable, in seconds.
    pub timeout_secs: u64,

    /// Interval between background sweeps, in seconds.
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

/// PDF rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Rendering resolution in dots per inch.
    pub render_dpi: f32,

    /// Documents with more pages are rejected.
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_dpi: 300.0,
            max_pages: 50,
        }
    }
}

/// Application configuration structure.
///
/// String fields use `Box<str>` since they are set once and never modified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Maximum allowed upload size in bytes
    pub max_file_size: u64,

    /// Directory path for model files
    pub model_directory: Box<str>,

    /// Threads per inference session
    #[serde(default = "default_inference_threads")]
    pub inference_threads: usize,

    /// When set, intermediate images are written here
    #[serde(default)]
    pub debug_dump_directory: Option<Box<str>>,

    #[serde(default)]
    pub geometry: GeometryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub pdf: PdfConfig,
}

fn default_inference_threads() -> usize {
    4
}

impl AppConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration JSON file
    ///
    /// # Returns
    ///
    /// Returns the parsed `AppConfig` or a `ConfigError` if loading fails.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::from_file(DEFAULT_CONFIG_PATH)
    }

    /// Initialize the global configuration instance.
    ///
    /// Falls back to defaults when the default file does not exist; a file
    /// that exists but fails to parse is an error.
    pub fn init() -> Result<&'static Self, ConfigError> {
        CONFIG_INSTANCE.get_or_try_init(|| {
            if Path::new(DEFAULT_CONFIG_PATH).exists() {
                Self::load_default()
            } else {
                Ok(Self::default_config())
            }
        })
    }

    /// Initialize the global configuration from an explicit file.
    pub fn init_from<P: AsRef<Path>>(path: P) -> Result<&'static Self, ConfigError> {
        CONFIG_INSTANCE.get_or_try_init(|| Self::from_file(path))
    }

    /// Get the global configuration instance.
    ///
    /// If the configuration hasn't been initialized, returns default values.
    #[must_use]
    pub fn get() -> &'static Self {
        CONFIG_INSTANCE.get_or_init(Self::default)
    }

    /// Create a new configuration with default values.
    #[must_use]
    pub fn default_config() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024, // 50 MB
            model_directory: "models".into(),
            inference_threads: default_inference_threads(),
            debug_dump_directory: None,
            geometry: GeometryConfig::default(),
            session: SessionConfig::default(),
            pdf: PdfConfig::default(),
        }
    }

    /// Get the path to a model file within the model directory.
    ///
    /// # Arguments
    ///
    /// * `relative_path` - The relative path to the model file (e.g., "onnx/document_orientation.onnx")
    #[must_use]
    pub fn model_path(&self, relative_path: &str) -> PathBuf {
        Path::new(&*self.model_directory).join(relative_path)
    }

    /// Reject uploads above the configured size before decoding them.
    pub fn check_upload_size(&self, len: usize) -> Result<(), ConfigError> {
        if len as u64 > self.max_file_size {
            return Err(ConfigError::UploadTooLarge {
                size: len as u64,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}
