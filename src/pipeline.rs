//! The iterative re-encode pipeline.
//!
//! One run owns a single in-memory buffer holding a complete encoded image.
//! Every step decodes that buffer, re-encodes it as JPEG at the step's
//! quality and replaces the buffer contents with the result, so each step
//! starts from the previous step's artifacts:
//!
//! ```text
//! input bytes ─▶ decode ─▶ [color] ─▶ encode q[0] ─▶ decode ─▶ encode q[1] ─▶ …
//! ```
//!
//! ## Color pass placement
//!
//! The saturation change is applied exactly once and always doubles as one of
//! the encode steps, so a run performs one encode per quality value:
//!
//! - **preprocess**: color pass at `q[0]`, then plain steps over `q[1..]`.
//! - **postprocess** (default): plain steps over `q[..n-1]`, then the color
//!   pass at `q[n-1]`, which makes it the step that leaves the final file.
//!
//! An empty sequence skips compression. The color pass still runs, at
//! [`PipelineOptions::fallback_quality`], when the factor is not `1.0`;
//! otherwise the buffer comes back untouched.
//!
//! ## Failures
//!
//! Decode errors abort the run. Encode (save) errors are retried per
//! [`RetryPolicy`] when transient. A failed step never modifies the buffer.

use crate::codec::{Codec, CodecError};
use crate::retry::{RetryError, RetryPolicy, retry_transient};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Step {step}: could not decode image: {source}")]
    Decode {
        step: usize,
        #[source]
        source: CodecError,
    },
    #[error("Step {step} (quality {quality}): could not save image: {source}")]
    Save {
        step: usize,
        quality: u8,
        #[source]
        source: CodecError,
    },
    #[error("Step {step} (quality {quality}): gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        step: usize,
        quality: u8,
        attempts: u32,
        #[source]
        source: CodecError,
    },
}

/// Quality used for the color pass when there is no sequence to take it from.
pub const DEFAULT_FALLBACK_QUALITY: u8 = 100;

/// Everything about a run except the image and the quality curve.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Saturation factor. `1.0` leaves colors alone.
    pub color_factor: f32,
    /// Apply the color pass before the compression loop instead of after.
    pub preprocess: bool,
    pub retry: RetryPolicy,
    pub fallback_quality: u8,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            color_factor: 1.0,
            preprocess: false,
            retry: RetryPolicy::default(),
            fallback_quality: DEFAULT_FALLBACK_QUALITY,
        }
    }
}

/// What a finished step did to the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepKind {
    Compress,
    Color { factor: f32 },
}

/// Progress reported while a run is going.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A step finished and the buffer now holds its output.
    StepFinished {
        index: usize,
        total: usize,
        quality: u8,
        kind: StepKind,
        bytes: usize,
    },
    /// A save failed transiently and will be attempted again after `wait`.
    RetryScheduled {
        index: usize,
        attempt: u32,
        wait: Duration,
        error: String,
    },
    /// Writing the finished image to disk failed transiently.
    WriteRetryScheduled {
        path: PathBuf,
        attempt: u32,
        wait: Duration,
        error: String,
    },
}

/// Number of encode steps a run over `len` qualities performs.
pub fn planned_steps(len: usize, options: &PipelineOptions) -> usize {
    if len == 0 {
        usize::from(options.color_factor != 1.0)
    } else {
        len
    }
}

/// Drives the codec over a buffer, one step at a time.
pub struct Pipeline<'a, C: Codec> {
    codec: &'a C,
    options: PipelineOptions,
    events: Option<Sender<PipelineEvent>>,
    total: usize,
    done: usize,
}

impl<'a, C: Codec> Pipeline<'a, C> {
    pub fn new(codec: &'a C, options: PipelineOptions) -> Self {
        Self {
            codec,
            options,
            events: None,
            total: 0,
            done: 0,
        }
    }

    /// Report progress on `tx`. Send failures are ignored.
    pub fn with_events(mut self, tx: Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Steps completed so far.
    pub fn steps_done(&self) -> usize {
        self.done
    }

    /// Run the whole sequence, color pass included, over `buffer`.
    pub fn run(&mut self, buffer: &mut Vec<u8>, qualities: &[u8]) -> Result<(), PipelineError> {
        self.total = self.done + planned_steps(qualities.len(), &self.options);
        let factor = self.options.color_factor;
        let fallback = self.options.fallback_quality;

        match (self.options.preprocess, qualities) {
            (_, []) => {
                if factor != 1.0 {
                    self.change_color(buffer, factor, fallback)?;
                }
            }
            (true, [first, rest @ ..]) => {
                self.change_color(buffer, factor, *first)?;
                self.compress(buffer, rest)?;
            }
            (false, [init @ .., last]) => {
                self.compress(buffer, init)?;
                self.change_color(buffer, factor, *last)?;
            }
        }
        Ok(())
    }

    /// The compression loop: one plain re-encode per quality, in order.
    pub fn compress(&mut self, buffer: &mut Vec<u8>, qualities: &[u8]) -> Result<(), PipelineError> {
        for &quality in qualities {
            self.step(buffer, quality, StepKind::Compress)?;
        }
        Ok(())
    }

    /// The one-shot color pass, saved at `quality`.
    pub fn change_color(
        &mut self,
        buffer: &mut Vec<u8>,
        factor: f32,
        quality: u8,
    ) -> Result<(), PipelineError> {
        self.step(buffer, quality, StepKind::Color { factor })
    }

    fn step(&mut self, buffer: &mut Vec<u8>, quality: u8, kind: StepKind) -> Result<(), PipelineError> {
        let index = self.done + 1;
        let total = self.total.max(index);
        let codec = self.codec;
        let events = self.events.as_ref();

        let image = codec
            .decode(buffer)
            .map_err(|source| PipelineError::Decode { step: index, source })?;
        let image = match kind {
            StepKind::Color { factor } => codec.enhance_color(image, factor),
            StepKind::Compress => image,
        };

        let mut encoded = Vec::with_capacity(buffer.len());
        retry_transient(
            &self.options.retry,
            || {
                encoded.clear();
                codec.encode_jpeg(&image, quality, &mut encoded)
            },
            |attempt, error, wait| {
                if let Some(tx) = events {
                    let _ = tx.send(PipelineEvent::RetryScheduled {
                        index,
                        attempt,
                        wait,
                        error: error.to_string(),
                    });
                }
            },
        )
        .map_err(|e| match e {
            RetryError::Exhausted { attempts, source } => PipelineError::RetriesExhausted {
                step: index,
                quality,
                attempts,
                source,
            },
            RetryError::Fatal(source) => PipelineError::Save {
                step: index,
                quality,
                source,
            },
        })?;

        buffer.clear();
        buffer.append(&mut encoded);
        self.done = index;

        tracing::debug!(step = index, total, quality, bytes = buffer.len(), ?kind, "step finished");
        if let Some(tx) = events {
            let _ = tx.send(PipelineEvent::StepFinished {
                index,
                total,
                quality,
                kind,
                bytes: buffer.len(),
            });
        }
        Ok(())
    }
}

/// Run a whole pipeline over `image_bytes` and return the final bytes.
pub fn run<C: Codec>(
    codec: &C,
    image_bytes: Vec<u8>,
    qualities: &[u8],
    options: PipelineOptions,
) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = image_bytes;
    Pipeline::new(codec, options).run(&mut buffer, qualities)?;
    Ok(buffer)
}
