//! Run parameters: raw CLI input and its validated form.
//!
//! [`RunRequest`] holds exactly what the user typed, with signed and wide
//! types so that nonsense like `-i -3` reaches validation instead of failing
//! inside the argument parser. [`RunRequest::validate`] turns it into an
//! immutable [`RunParameters`] or a [`ValidationError`] with a message meant
//! for the user.

use crate::codec::supported_input_extensions;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Input path does not exist: {0}")]
    InputMissing(PathBuf),
    #[error("Input path should be a file: {0}")]
    InputNotFile(PathBuf),
    #[error("Input format not supported: {ext} (expected one of: {supported})")]
    UnsupportedFormat { ext: String, supported: String },
    #[error("Iterations must be greater or equal to 1: {0}")]
    Iterations(i64),
    #[error("Extra must be greater or equal to 1: {0}")]
    Extra(i64),
    #[error("{name} must be at most {max}: {value}")]
    TooLarge {
        name: &'static str,
        max: u32,
        value: i64,
    },
    #[error("Iterations x extra must be at most {max} steps: {iterations} x {extra}")]
    TooManySteps { iterations: u32, extra: u32, max: u64 },
    #[error("Color enhancement must be greater or equal to 0.0: {0}")]
    Color(f64),
}

/// Upper bound on `iterations * extra`, the number of re-encode steps and
/// the length of the quality curve held in memory.
pub const MAX_TOTAL_STEPS: u64 = 100_000;

/// Unvalidated run request, straight from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub iterations: i64,
    pub extra: i64,
    pub color: f64,
    pub reverse: bool,
    pub preprocess: bool,
}

/// Validated, immutable parameters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Length of the base quality curve, at least 1.
    pub iterations: u32,
    /// Times the base curve is repeated, at least 1.
    pub extra: u32,
    /// Saturation factor, finite and non-negative. `1.0` = unchanged.
    pub color: f32,
    pub reverse: bool,
    pub preprocess: bool,
}

impl RunRequest {
    /// Check every field, input path first, and build the run parameters.
    pub fn validate(self) -> Result<RunParameters, ValidationError> {
        validate_input_path(&self.input)?;
        let iterations = validate_count(self.iterations, "Iterations", ValidationError::Iterations)?;
        let extra = validate_count(self.extra, "Extra", ValidationError::Extra)?;
        if u64::from(iterations) * u64::from(extra) > MAX_TOTAL_STEPS {
            return Err(ValidationError::TooManySteps {
                iterations,
                extra,
                max: MAX_TOTAL_STEPS,
            });
        }
        let color = validate_color(self.color)?;

        Ok(RunParameters {
            input: self.input,
            output: self.output,
            iterations,
            extra,
            color,
            reverse: self.reverse,
            preprocess: self.preprocess,
        })
    }
}

/// The input must be an existing regular file with a decodable extension.
pub fn validate_input_path(path: &Path) -> Result<(), ValidationError> {
    if !path.exists() {
        return Err(ValidationError::InputMissing(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ValidationError::InputNotFile(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let supported = supported_input_extensions();
    if !supported.contains(&ext.as_str()) {
        return Err(ValidationError::UnsupportedFormat {
            ext: if ext.is_empty() { "(none)".into() } else { ext },
            supported: supported.join(", "),
        });
    }
    Ok(())
}

fn validate_count(
    value: i64,
    name: &'static str,
    too_small: fn(i64) -> ValidationError,
) -> Result<u32, ValidationError> {
    if value < 1 {
        return Err(too_small(value));
    }
    u32::try_from(value).map_err(|_| ValidationError::TooLarge {
        name,
        max: u32::MAX,
        value,
    })
}

/// Non-negative and finite. NaN is not finite, so it is rejected too.
pub fn validate_color(color: f64) -> Result<f32, ValidationError> {
    if !color.is_finite() || color < 0.0 {
        return Err(ValidationError::Color(color));
    }
    Ok(color as f32)
}
