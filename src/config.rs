//! Configuration module.
//!
//! Handles loading, validating, and merging `crusher.toml`. Stock defaults
//! are the base layer; a `crusher.toml` in the config directory (the current
//! directory unless `--config-dir` says otherwise) overrides any subset of
//! them. Command-line flags override the `[defaults]` table in turn.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [defaults]
//! iterations = 50           # Length of the quality curve
//! extra = 1                 # Times the curve is repeated
//! color = 1.0               # Saturation factor (1.0 = unchanged)
//!
//! [output]
//! directory = "compressions" # Where synthesized output names go
//!
//! [retry]
//! max_attempts = 10         # Save attempts per step, first one included
//! initial_backoff_ms = 50   # Wait after the first failure, doubled each time
//! max_backoff_ms = 2000     # Upper bound for a single wait
//!
//! [pipeline]
//! fallback_quality = 100    # Color-pass quality when the curve is empty
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::pipeline::PipelineOptions;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the config directory.
pub const CONFIG_FILENAME: &str = "crusher.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `crusher.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrusherConfig {
    /// Fallbacks for flags not given on the command line.
    pub defaults: DefaultsConfig,
    /// Where synthesized outputs are written.
    pub output: OutputConfig,
    /// Retry policy for transient save failures.
    pub retry: RetryConfig,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
}

impl CrusherConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.iterations == 0 {
            return Err(ConfigError::Validation(
                "defaults.iterations must be at least 1".into(),
            ));
        }
        if self.defaults.extra == 0 {
            return Err(ConfigError::Validation(
                "defaults.extra must be at least 1".into(),
            ));
        }
        if !self.defaults.color.is_finite() || self.defaults.color < 0.0 {
            return Err(ConfigError::Validation(
                "defaults.color must be a finite number >= 0.0".into(),
            ));
        }
        if self.output.directory.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.directory must not be empty".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::Validation(
                "retry.max_backoff_ms must not be below retry.initial_backoff_ms".into(),
            ));
        }
        if self.pipeline.fallback_quality > 100 {
            return Err(ConfigError::Validation(
                "pipeline.fallback_quality must be 0-100".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }

    /// Pipeline options for a run with the given color settings.
    pub fn pipeline_options(&self, color_factor: f32, preprocess: bool) -> PipelineOptions {
        PipelineOptions {
            color_factor,
            preprocess,
            retry: self.retry_policy(),
            // validate() keeps this within 0-100
            fallback_quality: self.pipeline.fallback_quality.min(100) as u8,
        }
    }
}

/// Values used when the matching flag is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub iterations: u32,
    pub extra: u32,
    pub color: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            extra: 1,
            color: 1.0,
        }
    }
}

/// Output location settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory name, relative to the current directory.
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: crate::naming::DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

/// Retry settings for the save half of each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_ms: 50,
            max_backoff_ms: 2000,
        }
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// JPEG quality for the color pass when the quality curve is empty.
    pub fallback_quality: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback_quality: u32::from(crate::pipeline::DEFAULT_FALLBACK_QUALITY),
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CrusherConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `crusher.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `crusher.toml`.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CrusherConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CrusherConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `crusher.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<CrusherConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Returns a fully-commented stock `crusher.toml`.
///
/// Used by the `--gen-config` flag.
pub fn stock_config_toml() -> &'static str {
    r##"# crusher configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# crusher reads crusher.toml from the current directory, or from the
# directory given with --config-dir. Command-line flags win over [defaults].
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Defaults for flags left off the command line
# ---------------------------------------------------------------------------
[defaults]
# Number of re-encode steps in one pass of the quality curve (-i).
iterations = 50

# Number of times the whole curve is repeated (-e).
extra = 1

# Saturation factor for the color pass (-c). 0.0 = greyscale, 1.0 = unchanged.
color = 1.0

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Directory for outputs whose name is generated (no -o given).
# Created on first use, relative to the current directory.
directory = "compressions"

# ---------------------------------------------------------------------------
# Retry of transient save failures (file locked or held open elsewhere)
# ---------------------------------------------------------------------------
[retry]
# Attempts per step, the first one included.
max_attempts = 10

# Wait after the first failure in milliseconds; doubles after each failure.
initial_backoff_ms = 50

# Longest single wait in milliseconds.
max_backoff_ms = 2000

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# JPEG quality (0-100) for the color pass when the quality curve is empty.
fallback_quality = 100
"##
}
