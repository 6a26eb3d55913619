//! Output file naming and the working directory.
//!
//! When no output path is given, the name records how the image was made:
//!
//! ```text
//! <stem>_i<iterations>_e<extra>[_rev][_pre][_c<color>].jpg
//! ```
//!
//! - `photo.png`, 50 iterations → `photo_i50_e1.jpg`
//! - `photo.png`, 3 iterations, 2 extra, reverse → `photo_i3_e2_rev.jpg`
//! - `cat.webp`, 10 iterations, preprocess, color 2 → `cat_i10_e1_pre_c2.0.jpg`
//!
//! The extension is always `.jpg`: every run ends in a JPEG encode no matter
//! what the input format was. Synthesized names land in a working directory
//! (`compressions/` by default) that is created on first use.

use crate::params::RunParameters;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

/// Default name of the directory synthesized outputs are written to.
pub const DEFAULT_OUTPUT_DIR: &str = "compressions";

/// Format a color factor for a file name, always with a decimal point.
///
/// `2.0` → `"2.0"`, `0.5` → `"0.5"`, `1.25` → `"1.25"`.
pub fn format_color(color: f32) -> String {
    if color.fract() == 0.0 {
        format!("{color:.1}")
    } else {
        format!("{color}")
    }
}

/// Build the file name used when the user gives no output path.
pub fn default_output_name(params: &RunParameters) -> String {
    let stem = params
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let mut name = format!("{}_i{}_e{}", stem, params.iterations, params.extra);
    if params.reverse {
        name.push_str("_rev");
    }
    if params.preprocess {
        name.push_str("_pre");
    }
    if params.color != 1.0 {
        name.push_str("_c");
        name.push_str(&format_color(params.color));
    }
    name.push_str(".jpg");
    name
}

/// Make sure the working directory exists and return its path.
///
/// If `base` already is a directory called `dir_name` (the command was run
/// from inside it), `base` is used as-is instead of nesting another one.
pub fn prepare_output_dir(base: &Path, dir_name: &str) -> io::Result<PathBuf> {
    if base.file_name() == Some(OsStr::new(dir_name)) {
        return Ok(base.to_path_buf());
    }
    let dir = base.join(dir_name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// The user's output path, or a synthesized one inside the working directory.
pub fn resolve_output_path(
    params: &RunParameters,
    base: &Path,
    dir_name: &str,
) -> io::Result<PathBuf> {
    match &params.output {
        Some(path) => Ok(path.clone()),
        None => Ok(prepare_output_dir(base, dir_name)?.join(default_output_name(params))),
    }
}

/// Whether the path carries a JPEG extension (`.jpg` / `.jpeg`, any case).
pub fn has_jpeg_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}
