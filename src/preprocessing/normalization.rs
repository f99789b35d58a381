//! Peak normalization of the target signal
//!
//! Scales the signal so its maximum absolute sample is 1.0. The solver and
//! the event extractor both assume this reference range; running it twice is
//! harmless (the second pass is a no-op up to float rounding).

use crate::error::TranscriptionError;

/// Numerical stability epsilon for divisions
const EPSILON: f32 = 1e-10;

/// Peak-normalize `samples` in place to a maximum absolute value of 1.0.
///
/// Returns the peak that was measured before scaling.
///
/// # Errors
///
/// Returns `TranscriptionError::InvalidInput` if the signal is empty or
/// entirely silent (peak below the stability epsilon); a silent target has
/// no meaningful decomposition.
pub fn normalize_peak(samples: &mut [f32]) -> Result<f32, TranscriptionError> {
    if samples.is_empty() {
        return Err(TranscriptionError::InvalidInput(
            "cannot normalize an empty signal".to_string(),
        ));
    }

    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));

    if peak < EPSILON {
        return Err(TranscriptionError::InvalidInput(
            "signal is silent, nothing to transcribe".to_string(),
        ));
    }

    let gain = 1.0 / peak;
    for s in samples.iter_mut() {
        *s *= gain;
    }

    log::debug!("peak normalization: peak {:.6}, gain {:.6}", peak, gain);

    Ok(peak)
}
