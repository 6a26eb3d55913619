//! Quality curves for the re-encode loop.
//!
//! A run re-encodes the image once per entry of a [`QualitySequence`]. The
//! base curve is evenly spaced by integer division, so the step size depends
//! only on the iteration count and the reverse curve is the exact mirror of
//! the forward one:
//!
//! ```text
//! iterations = 4    forward  [100, 75, 50, 25]
//!                   reverse  [0, 25, 50, 75]
//! iterations = 3    forward  [100, 66, 33]
//!                   reverse  [0, 33, 66]
//! ```
//!
//! `extra` repeats the whole curve back to back (`[100, 50]` twice is
//! `[100, 50, 100, 50]`). Later passes at high quality do not undo the damage
//! of earlier low-quality passes, so every repeat compounds the effect.

/// Highest JPEG quality the curves start from (forward) or head to (reverse).
pub const MAX_QUALITY: u8 = 100;

/// Evenly spaced quality targets, one per iteration.
///
/// `delta = 100 / iterations`; forward yields `100 - delta * i`, reverse
/// yields `delta * i`. Zero iterations gives an empty curve. Past 100
/// iterations the step is zero and the curve is flat.
pub fn generate_quality_sequence(iterations: u32, reverse: bool) -> Vec<u8> {
    if iterations == 0 {
        return Vec::new();
    }
    let delta = u32::from(MAX_QUALITY) / iterations;
    (0..iterations)
        .map(|i| {
            // delta * i <= 100 for every i < iterations
            let step = (delta * i) as u8;
            if reverse { step } else { MAX_QUALITY - step }
        })
        .collect()
}

/// Concatenate `base` with itself `extra` times, order preserved.
pub fn repeat_sequence(base: &[u8], extra: u32) -> Vec<u8> {
    base.repeat(extra as usize)
}

/// The full, immutable list of quality targets for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySequence(Vec<u8>);

impl QualitySequence {
    pub fn new(iterations: u32, extra: u32, reverse: bool) -> Self {
        let base = generate_quality_sequence(iterations, reverse);
        Self(repeat_sequence(&base, extra))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<u8> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<u8> {
        self.0.last().copied()
    }
}

impl From<Vec<u8>> for QualitySequence {
    fn from(qualities: Vec<u8>) -> Self {
        Self(qualities)
    }
}

impl AsRef<[u8]> for QualitySequence {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
