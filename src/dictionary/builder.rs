//! Dictionary construction
//!
//! Enumerates every admissible (atom, offset) placement on the frame grid
//! and, optionally, prunes placements by a coarse FFT cross-correlation
//! pre-filter. Pruning only removes candidates: a pruned placement behaves
//! exactly as if the solver had assigned it weight zero.

use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::{BasisVector, Dictionary};
use crate::config::TranscriptionConfig;
use crate::error::TranscriptionError;
use crate::library::TemplateLibrary;

/// Numerical stability epsilon for correlation normalization
const EPSILON: f64 = 1e-12;

/// Build the dictionary of basis vectors for `target`.
///
/// For every atom and every offset on the frame grid such that the atom's
/// support fits within the signal, one basis vector is produced, ordered by
/// (atom index, ascending offset). With `config.prune_correlation` set,
/// placements whose normalized correlation against the target falls below
/// the threshold are dropped.
///
/// # Errors
///
/// Returns `TranscriptionError::InvalidInput` for a zero frame grid, and
/// `TranscriptionError::EmptyDictionary` when no placement fits (every atom
/// longer than the signal, or everything pruned).
pub fn build_dictionary<'a>(
    library: &'a TemplateLibrary,
    target: &[f32],
    config: &TranscriptionConfig,
) -> Result<Dictionary<'a>, TranscriptionError> {
    if config.frame_grid == 0 {
        return Err(TranscriptionError::InvalidInput(
            "frame grid spacing must be > 0".to_string(),
        ));
    }

    let signal_len = target.len();

    let keep = match config.prune_correlation {
        Some(threshold) => Some(correlation_mask(library, target, config.frame_grid, threshold)),
        None => None,
    };

    let mut entries = Vec::new();
    for (atom_index, atom) in library.atoms().iter().enumerate() {
        if atom.len() > signal_len {
            log::trace!(
                "atom `{}` ({} samples) longer than signal ({}), skipped",
                atom.instrument,
                atom.len(),
                signal_len
            );
            continue;
        }

        let mut offset = 0;
        let mut grid_index = 0;
        while offset + atom.len() <= signal_len {
            let keep_placement = match &keep {
                Some(mask) => mask[atom_index][grid_index],
                None => true,
            };
            if keep_placement {
                entries.push(BasisVector {
                    atom: atom_index,
                    offset,
                });
            }
            offset += config.frame_grid;
            grid_index += 1;
        }
    }

    if entries.is_empty() {
        return Err(TranscriptionError::EmptyDictionary(format!(
            "no atom placement fits a signal of {} samples (grid {}, {} atoms{})",
            signal_len,
            config.frame_grid,
            library.len(),
            if config.prune_correlation.is_some() {
                ", after correlation pruning"
            } else {
                ""
            }
        )));
    }

    log::debug!(
        "dictionary: {} placements over {} atoms, grid {} samples",
        entries.len(),
        library.len(),
        config.frame_grid
    );

    Ok(Dictionary::new(library, entries, signal_len))
}

/// Per-atom, per-grid-point keep mask from normalized cross-correlation.
///
/// Correlation of each atom against the target at every lag is computed in
/// one FFT pass per atom; the mask samples it at grid offsets and compares
/// `|corr| / (||atom|| * ||target window||)` against the threshold
/// (inclusive: a placement exactly at the threshold is kept).
fn correlation_mask(
    library: &TemplateLibrary,
    target: &[f32],
    frame_grid: usize,
    threshold: f32,
) -> Vec<Vec<bool>> {
    let signal_len = target.len();
    let max_atom_len = library
        .atoms()
        .iter()
        .map(|a| a.len())
        .max()
        .unwrap_or(0)
        .min(signal_len);
    let fft_len = (signal_len + max_atom_len).next_power_of_two();

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    // FFT of the target, computed once and shared read-only across workers.
    let mut target_spectrum: Vec<Complex<f32>> = target
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_len)
        .collect();
    forward.process(&mut target_spectrum);

    // Prefix sums of y^2 for O(1) window energies.
    let mut energy_prefix = vec![0.0f64; signal_len + 1];
    for (i, &s) in target.iter().enumerate() {
        energy_prefix[i + 1] = energy_prefix[i] + (s as f64) * (s as f64);
    }

    library
        .atoms()
        .par_iter()
        .map(|atom| {
            let atom_len = atom.len();
            if atom_len > signal_len {
                return Vec::new();
            }

            let atom_norm: f64 = atom
                .samples
                .iter()
                .map(|&s| (s as f64) * (s as f64))
                .sum::<f64>()
                .sqrt();

            // corr[off] = sum_j atom[j] * y[off + j] = IFFT(conj(A) .* Y)
            let mut spectrum: Vec<Complex<f32>> = atom
                .samples
                .iter()
                .map(|&s| Complex::new(s, 0.0))
                .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
                .take(fft_len)
                .collect();
            forward.process(&mut spectrum);
            for (a, y) in spectrum.iter_mut().zip(&target_spectrum) {
                *a = a.conj() * y;
            }
            inverse.process(&mut spectrum);
            let scale = 1.0 / fft_len as f64;

            let num_offsets = (signal_len - atom_len) / frame_grid + 1;
            (0..num_offsets)
                .map(|grid_index| {
                    let offset = grid_index * frame_grid;
                    let corr = spectrum[offset].re as f64 * scale;
                    let window_energy =
                        energy_prefix[offset + atom_len] - energy_prefix[offset];
                    let denom = atom_norm * window_energy.sqrt();
                    if denom < EPSILON {
                        // Silent window or silent atom: nothing to match.
                        false
                    } else {
                        (corr.abs() / denom) as f32 >= threshold
                    }
                })
                .collect()
        })
        .collect()
}
