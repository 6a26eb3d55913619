//! Codec trait and shared error type.
//!
//! The [`Codec`] trait defines the three capabilities the pipeline needs:
//! decode an encoded buffer, scale its color saturation, and encode it back
//! to JPEG at a given quality. Decode and encode are split so the pipeline can
//! retry the encode (save) half of a step without decoding again.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec). Tests use the recording
//! `MockCodec`.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl CodecError {
    /// Whether the failure is a resource being held or locked elsewhere.
    ///
    /// Only these are worth retrying; a decode or encode error on the data
    /// itself fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            CodecError::Io(e) => crate::retry::is_transient_kind(e.kind()),
            _ => false,
        }
    }
}

/// Trait for image codecs.
///
/// `Image` is whatever decoded representation the codec works on. Every
/// encode produces a complete JPEG, regardless of the input format.
pub trait Codec {
    type Image;

    /// Decode a complete encoded image held in memory.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, CodecError>;

    /// Scale color saturation: `0.0` is greyscale, `1.0` leaves it unchanged.
    fn enhance_color(&self, image: Self::Image, factor: f32) -> Self::Image;

    /// Encode as JPEG at `quality`, appending to `out`.
    fn encode_jpeg(
        &self,
        image: &Self::Image,
        quality: u8,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock codec that records operations instead of touching pixels.
    ///
    /// Images are plain strings. Encoding appends `|q<quality>` and color
    /// enhancement appends `|c<factor>`, so the final buffer spells out the
    /// whole chain of steps applied to it.
    #[derive(Default)]
    pub struct MockCodec {
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Errors handed out by the next encode calls, front first.
        pub encode_failures: Mutex<VecDeque<io::ErrorKind>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode,
        EnhanceColor { factor: f32 },
        Encode { quality: u8 },
    }

    impl MockCodec {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_encodes(kinds: Vec<io::ErrorKind>) -> Self {
            Self {
                operations: Mutex::new(Vec::new()),
                encode_failures: Mutex::new(kinds.into()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Qualities of the encodes that succeeded, in order.
        pub fn encoded_qualities(&self) -> Vec<u8> {
            self.get_operations()
                .iter()
                .filter_map(|op| match op {
                    RecordedOp::Encode { quality } => Some(*quality),
                    _ => None,
                })
                .collect()
        }
    }

    impl Codec for MockCodec {
        type Image = String;

        fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
            self.operations.lock().unwrap().push(RecordedOp::Decode);
            String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Decode(e.to_string()))
        }

        fn enhance_color(&self, image: String, factor: f32) -> String {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::EnhanceColor { factor });
            format!("{image}|c{factor}")
        }

        fn encode_jpeg(
            &self,
            image: &String,
            quality: u8,
            out: &mut Vec<u8>,
        ) -> Result<(), CodecError> {
            if let Some(kind) = self.encode_failures.lock().unwrap().pop_front() {
                return Err(CodecError::Io(io::Error::new(kind, "mock encode failure")));
            }
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Encode { quality });
            out.extend_from_slice(format!("{image}|q{quality}").as_bytes());
            Ok(())
        }
    }

    #[test]
    fn mock_records_encode_chain() {
        let codec = MockCodec::new();
        let image = codec.decode(b"src").unwrap();
        let image = codec.enhance_color(image, 0.5);
        let mut out = Vec::new();
        codec.encode_jpeg(&image, 70, &mut out).unwrap();

        assert_eq!(out, b"src|c0.5|q70");
        assert_eq!(
            codec.get_operations(),
            vec![
                RecordedOp::Decode,
                RecordedOp::EnhanceColor { factor: 0.5 },
                RecordedOp::Encode { quality: 70 },
            ]
        );
    }

    #[test]
    fn mock_hands_out_queued_failures() {
        let codec = MockCodec::failing_encodes(vec![io::ErrorKind::PermissionDenied]);
        let mut out = Vec::new();

        let err = codec.encode_jpeg(&"src".to_string(), 50, &mut out).unwrap_err();
        assert!(err.is_transient());
        assert!(out.is_empty());

        codec.encode_jpeg(&"src".to_string(), 50, &mut out).unwrap();
        assert_eq!(codec.encoded_qualities(), vec![50]);
    }

    #[test]
    fn permission_and_busy_errors_are_transient() {
        for kind in [
            io::ErrorKind::PermissionDenied,
            io::ErrorKind::WouldBlock,
            io::ErrorKind::ResourceBusy,
        ] {
            assert!(CodecError::Io(io::Error::new(kind, "locked")).is_transient());
        }
    }

    #[test]
    fn data_errors_are_not_transient() {
        assert!(!CodecError::Decode("bad header".into()).is_transient());
        assert!(!CodecError::Encode("too large".into()).is_transient());
        assert!(!CodecError::Io(io::Error::new(io::ErrorKind::NotFound, "gone")).is_transient());
    }
}
