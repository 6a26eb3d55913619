//! # Crusher
//!
//! A glitch-art tool that destroys images on purpose. It decodes an image,
//! saves it as JPEG, decodes the result, saves it again, and keeps going along
//! a programmed curve of quality values. Every pass compounds the artifacts of
//! the previous one, so the output is far more damaged than a single save at
//! the lowest quality would ever be.
//!
//! # Architecture: One Buffer, Many Passes
//!
//! ```text
//! RunRequest ─▶ params::validate ─▶ RunParameters
//!                                       │
//!                 quality::QualitySequence (100 66 33 …)
//!                                       │
//! input bytes ─▶ pipeline: decode ─▶ [color] ─▶ encode q ─▶ decode ─▶ … ─▶ output bytes
//! ```
//!
//! A run owns exactly one in-memory buffer holding a complete encoded image.
//! Each step reads it, re-encodes, and replaces it. Nothing touches the
//! destination file until the final step succeeded, so an interrupted run
//! never leaves a half-crushed file behind.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`quality`] | Quality curve generation: evenly spaced, optionally reversed, repeated |
//! | [`pipeline`] | The re-encode loop and the one-shot color pass |
//! | [`codec`] | The [`codec::Codec`] seam and its pure-Rust `image` implementation |
//! | [`retry`] | Bounded retry with backoff for transient save failures |
//! | [`params`] | Raw request validation into immutable run parameters |
//! | [`naming`] | Synthesized output names and the working directory |
//! | [`confirm`] | Overwrite confirmation as an injected strategy |
//! | [`config`] | `crusher.toml` loading, validation, and merging over stock defaults |
//! | [`crush`] | One complete run: validate, confirm, crush, write |
//! | [`output`] | CLI output formatting for plans, progress, and outcomes |
//!
//! # Design Decisions
//!
//! ## Evenly Spaced Curve
//!
//! The quality curve is `100 - (100 / n) * i` with integer arithmetic. It is
//! predictable, always starts at 100 (or 0 when reversed), and every step
//! degrades the image by the same amount. `extra` repeats the whole curve so a
//! long run revisits high qualities instead of flattening out at zero.
//!
//! ## The Color Pass Is a Step
//!
//! Saturation is changed exactly once, and that pass also performs one of the
//! saves. Preprocessing colors the image at the first quality, so later steps
//! crush the recolored pixels; postprocessing colors it at the last quality,
//! so the final file shows the shift undamaged by further passes.
//!
//! ## Codec Behind a Trait
//!
//! The pipeline only knows the [`codec::Codec`] trait. Production uses the
//! pure-Rust `image` crate, with no system libraries to install. Tests plug in
//! a recording mock that makes step order and quality values directly
//! assertable without decoding a single pixel.
//!
//! ## No Prompting in the Core
//!
//! Overwrite confirmation goes through [`confirm::Confirm`]. The library never
//! reads stdin; the CLI decides whether to ask the terminal or assume yes.

pub mod codec;
pub mod config;
pub mod confirm;
pub mod crush;
pub mod naming;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod quality;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_helpers;
