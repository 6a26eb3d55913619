//! One complete run, from raw request to written file.
//!
//! ```text
//! RunRequest ─▶ validate ─▶ resolve output ─▶ confirm overwrite?
//!            ─▶ read input ─▶ pipeline over the quality curve ─▶ write once
//! ```
//!
//! The destination is only written after the last step succeeded. A locked
//! destination is retried with the same policy as the re-encode steps.
//! Declining the overwrite prompt is not an error: the run returns
//! [`Outcome::Declined`] and the existing file stays as it was.

use crate::codec::{Codec, CodecError};
use crate::config::{ConfigError, CrusherConfig};
use crate::confirm::Confirm;
use crate::naming::{self, DEFAULT_OUTPUT_DIR};
use crate::params::{RunRequest, ValidationError};
use crate::pipeline::{
    DEFAULT_FALLBACK_QUALITY, Pipeline, PipelineError, PipelineEvent, PipelineOptions,
};
use crate::quality::QualitySequence;
use crate::retry::{RetryError, RetryPolicy, retry_transient};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrushError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Could not read input {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not decode input {path}: {source}")]
    DecodeInput {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
    #[error("Could not write output {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not write output {path}, gave up after {attempts} attempts: {source}")]
    WriteRetriesExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything a run needs besides the request itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CrushSettings {
    /// Directory the working directory is created in (normally the cwd).
    pub base_dir: PathBuf,
    /// Name of the working directory for synthesized outputs.
    pub output_dir: String,
    pub retry: RetryPolicy,
    pub fallback_quality: u8,
}

impl CrushSettings {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            retry: RetryPolicy::default(),
            fallback_quality: DEFAULT_FALLBACK_QUALITY,
        }
    }

    /// Build settings from a loaded config, rooted at `base_dir`.
    pub fn from_config(config: &CrusherConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            output_dir: config.output.directory.clone(),
            retry: config.retry_policy(),
            // validate() keeps this within 0-100
            fallback_quality: config.pipeline.fallback_quality.min(100) as u8,
        }
    }

    fn pipeline_options(&self, color_factor: f32, preprocess: bool) -> PipelineOptions {
        PipelineOptions {
            color_factor,
            preprocess,
            retry: self.retry,
            fallback_quality: self.fallback_quality,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The output existed and the user chose to keep it.
    Declined { path: PathBuf },
    /// The output was written.
    Written {
        path: PathBuf,
        bytes: usize,
        steps: usize,
    },
}

/// Validate `request`, run the pipeline and write the result.
pub fn crush<C: Codec>(
    codec: &C,
    request: RunRequest,
    settings: &CrushSettings,
    confirm: &mut impl Confirm,
    events: Option<Sender<PipelineEvent>>,
) -> Result<Outcome, CrushError> {
    let params = request.validate()?;
    let output = naming::resolve_output_path(&params, &settings.base_dir, &settings.output_dir)?;

    if !naming::has_jpeg_extension(&output) {
        tracing::warn!(path = %output.display(), "output is always JPEG data regardless of its extension");
    }

    if output.exists() {
        let question = format!("{} already exists. Overwrite?", output.display());
        if !confirm.confirm(&question) {
            tracing::debug!(path = %output.display(), "overwrite declined");
            return Ok(Outcome::Declined { path: output });
        }
    }

    let mut buffer = fs::read(&params.input).map_err(|source| CrushError::ReadInput {
        path: params.input.clone(),
        source,
    })?;

    let qualities = QualitySequence::new(params.iterations, params.extra, params.reverse);
    tracing::debug!(
        input = %params.input.display(),
        output = %output.display(),
        steps = qualities.len(),
        "starting run"
    );

    let mut pipeline = Pipeline::new(codec, settings.pipeline_options(params.color, params.preprocess));
    if let Some(tx) = events.clone() {
        pipeline = pipeline.with_events(tx);
    }
    pipeline
        .run(&mut buffer, qualities.as_slice())
        .map_err(|e| match e {
            // Only the first step decodes the input itself
            PipelineError::Decode { step: 1, source } => CrushError::DecodeInput {
                path: params.input.clone(),
                source,
            },
            other => CrushError::Pipeline(other),
        })?;
    let steps = pipeline.steps_done();

    save_output(&output, &buffer, &settings.retry, events.as_ref(), write_file)?;
    Ok(Outcome::Written {
        path: output,
        bytes: buffer.len(),
        steps,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

/// Write the finished image with `write`, retrying transient failures.
///
/// `bytes` is only borrowed, so a failed attempt never costs the work that
/// produced it.
fn save_output(
    path: &Path,
    bytes: &[u8],
    policy: &RetryPolicy,
    events: Option<&Sender<PipelineEvent>>,
    mut write: impl FnMut(&Path, &[u8]) -> io::Result<()>,
) -> Result<(), CrushError> {
    retry_transient(
        policy,
        || write(path, bytes),
        |attempt, error, wait| {
            if let Some(tx) = events {
                let _ = tx.send(PipelineEvent::WriteRetryScheduled {
                    path: path.to_path_buf(),
                    attempt,
                    wait,
                    error: error.to_string(),
                });
            }
        },
    )
    .map_err(|e| match e {
        RetryError::Exhausted { attempts, source } => CrushError::WriteRetriesExhausted {
            path: path.to_path_buf(),
            attempts,
            source,
        },
        RetryError::Fatal(source) => CrushError::WriteOutput {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::backend::tests::MockCodec;
    use crate::confirm::AssumeYes;
    use std::sync::mpsc;
    use tempfile::TempDir;

    /// Answers every question with a fixed reply and remembers what was asked.
    struct Scripted {
        answer: bool,
        asked: Vec<String>,
    }

    impl Confirm for Scripted {
        fn confirm(&mut self, question: &str) -> bool {
            self.asked.push(question.to_string());
            self.answer
        }
    }

    fn setup() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("photo.png");
        fs::write(&input, "src").unwrap();
        (tmp, input)
    }

    fn request(input: PathBuf, output: Option<PathBuf>) -> RunRequest {
        RunRequest {
            input,
            output,
            iterations: 3,
            extra: 1,
            color: 1.0,
            reverse: false,
            preprocess: false,
        }
    }

    fn settings(tmp: &TempDir) -> CrushSettings {
        CrushSettings {
            retry: RetryPolicy::immediate(3),
            ..CrushSettings::new(tmp.path())
        }
    }

    #[test]
    fn writes_synthesized_output_into_working_dir() {
        let (tmp, input) = setup();
        let outcome = crush(
            &MockCodec::new(),
            request(input, None),
            &settings(&tmp),
            &mut AssumeYes,
            None,
        )
        .unwrap();

        let expected = tmp.path().join("compressions").join("photo_i3_e1.jpg");
        assert_eq!(
            outcome,
            Outcome::Written {
                path: expected.clone(),
                bytes: "src|q100|q66|c1|q33".len(),
                steps: 3,
            }
        );
        assert_eq!(fs::read_to_string(expected).unwrap(), "src|q100|q66|c1|q33");
    }

    #[test]
    fn explicit_output_creates_parent_dirs() {
        let (tmp, input) = setup();
        let output = tmp.path().join("a").join("b").join("out.jpg");
        crush(
            &MockCodec::new(),
            request(input, Some(output.clone())),
            &settings(&tmp),
            &mut AssumeYes,
            None,
        )
        .unwrap();
        assert!(output.is_file());
        assert!(!tmp.path().join("compressions").exists());
    }

    #[test]
    fn declined_overwrite_leaves_file_alone() {
        let (tmp, input) = setup();
        let output = tmp.path().join("out.jpg");
        fs::write(&output, "keep me").unwrap();
        let codec = MockCodec::new();
        let mut confirm = Scripted {
            answer: false,
            asked: Vec::new(),
        };

        let outcome = crush(
            &codec,
            request(input, Some(output.clone())),
            &settings(&tmp),
            &mut confirm,
            None,
        )
        .unwrap();

        assert_eq!(outcome, Outcome::Declined { path: output.clone() });
        assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");
        assert_eq!(confirm.asked.len(), 1);
        assert!(confirm.asked[0].contains("out.jpg"));
        assert!(codec.get_operations().is_empty());
    }

    #[test]
    fn accepted_overwrite_replaces_file() {
        let (tmp, input) = setup();
        let output = tmp.path().join("out.jpg");
        fs::write(&output, "old").unwrap();
        let mut confirm = Scripted {
            answer: true,
            asked: Vec::new(),
        };

        crush(
            &MockCodec::new(),
            request(input, Some(output.clone())),
            &settings(&tmp),
            &mut confirm,
            None,
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "src|q100|q66|c1|q33");
    }

    #[test]
    fn no_question_when_output_is_new() {
        let (tmp, input) = setup();
        let mut confirm = Scripted {
            answer: false,
            asked: Vec::new(),
        };
        let outcome = crush(
            &MockCodec::new(),
            request(input, Some(tmp.path().join("new.jpg"))),
            &settings(&tmp),
            &mut confirm,
            None,
        )
        .unwrap();
        assert!(matches!(outcome, Outcome::Written { .. }));
        assert!(confirm.asked.is_empty());
    }

    #[test]
    fn invalid_request_fails_before_anything_happens() {
        let (tmp, input) = setup();
        let err = crush(
            &MockCodec::new(),
            RunRequest {
                iterations: 0,
                ..request(input, None)
            },
            &settings(&tmp),
            &mut AssumeYes,
            None,
        )
        .unwrap_err();

        assert!(matches!(err, CrushError::Validation(ValidationError::Iterations(0))));
        assert!(!tmp.path().join("compressions").exists());
    }

    #[test]
    fn failed_pipeline_writes_nothing() {
        let (tmp, input) = setup();
        fs::write(&input, [0xffu8, 0xfe]).unwrap();
        let output = tmp.path().join("out.jpg");

        let err = crush(
            &MockCodec::new(),
            request(input.clone(), Some(output.clone())),
            &settings(&tmp),
            &mut AssumeYes,
            None,
        )
        .unwrap_err();

        assert!(matches!(err, CrushError::DecodeInput { ref path, .. } if *path == input));
        assert!(err.to_string().contains("photo.png"));
        assert!(!output.exists());
    }

    #[test]
    fn encode_failures_stay_pipeline_errors() {
        let (tmp, input) = setup();
        let codec = MockCodec::failing_encodes(vec![io::ErrorKind::PermissionDenied; 5]);

        let err = crush(
            &codec,
            request(input, Some(tmp.path().join("out.jpg"))),
            &settings(&tmp),
            &mut AssumeYes,
            None,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CrushError::Pipeline(PipelineError::RetriesExhausted { step: 1, attempts: 3, .. })
        ));
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Writer that fails with `kinds` in order, then records the write.
    fn flaky_writer(
        kinds: Vec<io::ErrorKind>,
        written: &mut Vec<(PathBuf, Vec<u8>)>,
    ) -> impl FnMut(&Path, &[u8]) -> io::Result<()> + '_ {
        let mut kinds = kinds.into_iter();
        move |path, bytes| match kinds.next() {
            Some(kind) => Err(io::Error::new(kind, "locked")),
            None => {
                written.push((path.to_path_buf(), bytes.to_vec()));
                Ok(())
            }
        }
    }

    #[test]
    fn save_retries_locked_destination_until_it_clears() {
        let (tx, rx) = mpsc::channel();
        let mut written = Vec::new();
        let path = Path::new("out.jpg");

        save_output(
            path,
            b"crushed",
            &RetryPolicy::immediate(5),
            Some(&tx),
            flaky_writer(
                vec![io::ErrorKind::PermissionDenied, io::ErrorKind::ResourceBusy],
                &mut written,
            ),
        )
        .unwrap();
        drop(tx);

        assert_eq!(written, vec![(path.to_path_buf(), b"crushed".to_vec())]);
        let attempts: Vec<_> = rx
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::WriteRetryScheduled { attempt, .. } => Some(attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[test]
    fn save_gives_up_after_max_attempts() {
        let mut written = Vec::new();
        let err = save_output(
            Path::new("out.jpg"),
            b"crushed",
            &RetryPolicy::immediate(3),
            None,
            flaky_writer(vec![io::ErrorKind::PermissionDenied; 3], &mut written),
        )
        .unwrap_err();

        assert!(matches!(err, CrushError::WriteRetriesExhausted { attempts: 3, .. }));
        assert!(err.to_string().contains("out.jpg"));
        assert!(written.is_empty());
    }

    #[test]
    fn save_does_not_retry_hard_failures() {
        let mut written = Vec::new();
        let err = save_output(
            Path::new("missing/out.jpg"),
            b"crushed",
            &RetryPolicy::immediate(5),
            None,
            flaky_writer(vec![io::ErrorKind::NotFound], &mut written),
        )
        .unwrap_err();

        assert!(matches!(err, CrushError::WriteOutput { .. }));
        assert!(written.is_empty());
    }

    #[test]
    fn settings_follow_config() {
        let mut config = CrusherConfig::default();
        config.output.directory = "crushed".into();
        config.pipeline.fallback_quality = 70;
        config.retry.max_attempts = 2;

        let settings = CrushSettings::from_config(&config, "/work");
        assert_eq!(settings.base_dir, PathBuf::from("/work"));
        assert_eq!(settings.output_dir, "crushed");
        assert_eq!(settings.fallback_quality, 70);
        assert_eq!(settings.retry.max_attempts, 2);
    }

    #[test]
    fn events_are_forwarded() {
        let (tmp, input) = setup();
        let (tx, rx) = mpsc::channel();
        crush(
            &MockCodec::new(),
            request(input, None),
            &settings(&tmp),
            &mut AssumeYes,
            Some(tx),
        )
        .unwrap();

        let finished = rx
            .iter()
            .filter(|e| matches!(e, PipelineEvent::StepFinished { .. }))
            .count();
        assert_eq!(finished, 3);
    }
}
