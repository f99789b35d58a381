//! Pitch permutation of base atoms
//!
//! The NNLS path treats pitch as a fixed, discretized dimension of the
//! dictionary: each base atom is expanded into a set of pitch-shifted
//! variants before any solving. Shifting resamples by the playback-rate
//! ratio with linear interpolation, matching how the host environment plays
//! a sample at a non-unit pitch.

use rayon::prelude::*;

use super::{Atom, TemplateLibrary};
use crate::error::TranscriptionError;

fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start * (1.0 - t) + end * t
}

/// Evenly spaced values from `a` to `b` inclusive, `r >= 2` points.
pub fn interpolated_range(a: f32, b: f32, r: usize) -> Vec<f32> {
    assert!(r >= 2);

    let step = (b - a) / (r - 1) as f32;
    (0..r).map(|i| a + i as f32 * step).collect()
}

/// Resample `samples` for playback at `pitch` times the recorded rate.
///
/// A pitch of 2.0 halves the duration (one octave up); 0.5 doubles it.
/// Gaps are filled by linear interpolation.
pub fn adjust_pitch(samples: &[f32], pitch: f32) -> Vec<f32> {
    let new_length = (samples.len() as f32 / pitch) as usize;

    let mut scaled = Vec::with_capacity(new_length);

    for i in 0..new_length {
        let original_index = i as f32 * pitch;

        let lower_index = original_index.floor() as usize;
        let upper_index = (original_index.ceil() as usize).min(samples.len() - 1);

        if lower_index != upper_index {
            let t = original_index - lower_index as f32;
            scaled.push(lerp(samples[lower_index], samples[upper_index], t));
        } else {
            scaled.push(samples[lower_index]);
        }
    }

    scaled
}

/// Expand every atom of `library` into `steps` pitch variants across
/// `[lo, hi]`.
///
/// Variant order is (atom order, then ascending pitch), so the expanded
/// library ordering is deterministic.
///
/// # Errors
///
/// Returns `TranscriptionError::LibraryError` if a shifted variant ends up
/// with no samples (atom shorter than the highest pitch ratio allows).
pub fn permute_with_pitch(
    library: &TemplateLibrary,
    steps: usize,
    lo: f32,
    hi: f32,
) -> Result<TemplateLibrary, TranscriptionError> {
    let ratios = interpolated_range(lo, hi, steps);

    let variants: Vec<Atom> = library
        .atoms()
        .par_iter()
        .flat_map_iter(|atom| {
            let ratios = &ratios;
            ratios.iter().map(move |&ratio| Atom {
                instrument: atom.instrument.clone(),
                pitch: atom.pitch * ratio,
                samples: adjust_pitch(&atom.samples, ratio),
            })
        })
        .collect();

    log::debug!(
        "pitch permutation: {} base atoms -> {} variants ({} steps in [{:.2}, {:.2}])",
        library.len(),
        variants.len(),
        steps,
        lo,
        hi
    );

    TemplateLibrary::new(variants)
}
