//! # palette-dsp
//!
//! Transcribes an arbitrary mono recording into a schedule of in-game
//! sound-effect triggers that, played back with a fixed palette of sound
//! assets, approximates the original as closely as possible.
//!
//! The hard part is signal decomposition: expressing the waveform as a
//! non-negative weighted combination of a large dictionary of short, fixed
//! templates (instruments at discretized pitches, placed on a frame grid),
//! then collapsing weights and timings into a discrete, playable event list.
//!
//! ## Quick start
//!
//! ```no_run
//! use palette_dsp::{transcribe_audio, TranscriptionConfig};
//! use palette_dsp::library::{AtomProvider, LocalCacheProvider};
//!
//! let library = LocalCacheProvider::new("./atoms").load()?;
//! let samples: Vec<f32> = vec![]; // mono, canonical rate
//!
//! let transcription = transcribe_audio(&samples, &library, &TranscriptionConfig::default())?;
//! println!(
//!     "{} events in {} batches",
//!     transcription.metadata.num_events,
//!     transcription.schedule.batches.len()
//! );
//! # Ok::<(), palette_dsp::TranscriptionError>(())
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! Input -> Normalization -> Dictionary -> Global NNLS -> Events -> Schedule
//!                                                                  (-> Render)
//! ```
//!
//! The whole input is processed in one batch; there is no streaming path.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dictionary;
pub mod error;
pub mod events;
pub mod library;
pub mod preprocessing;
pub mod render;
pub mod result;
pub mod schedule;
pub mod solver;

// Re-export main types
pub use config::{TranscriptionConfig, CANONICAL_SAMPLE_RATE, SAMPLES_PER_TICK, TICKS_PER_SECOND};
pub use error::TranscriptionError;
pub use result::{Transcription, TranscriptionMetadata};
pub use solver::{DecompositionStrategy, SolveReport, StepPolicy};

use solver::pgd::PgdNnls;

/// Transcribe a mono recording into a playback schedule.
///
/// Runs the full pipeline: peak normalization, dictionary construction over
/// `library`, the global NNLS solve, event extraction/quantization, and
/// schedule assembly. The schedule is returned in memory; use
/// [`schedule::writer::write_schedule`] to emit the batch files and
/// [`render::render_schedule`] for an audio-domain reconstruction.
///
/// # Arguments
///
/// * `samples` - Mono samples at the canonical rate ([`CANONICAL_SAMPLE_RATE`])
/// * `library` - The read-only template palette, already pitch-expanded if
///   pitch variants are wanted (see [`library::pitch::permute_with_pitch`])
/// * `config` - Pipeline tunables
///
/// # Determinism
///
/// Identical samples, library, and configuration produce an identical
/// schedule across runs.
///
/// # Errors
///
/// Returns `TranscriptionError` if the input is empty or silent, no atom
/// placement fits the signal, the solver diverges into non-finite values, or
/// any stage receives inconsistent data. Solver truncation at the iteration
/// cap is not an error; it is reported in the metadata.
pub fn transcribe_audio(
    samples: &[f32],
    library: &library::TemplateLibrary,
    config: &TranscriptionConfig,
) -> Result<Transcription, TranscriptionError> {
    use std::time::Instant;
    let start_time = Instant::now();

    log::debug!(
        "starting transcription: {} samples, {} atoms",
        samples.len(),
        library.len()
    );

    if samples.is_empty() {
        return Err(TranscriptionError::InvalidInput(
            "empty input signal".to_string(),
        ));
    }

    // 1. Normalize the target to the solver's reference range.
    let mut target = samples.to_vec();
    preprocessing::normalization::normalize_peak(&mut target)?;

    // 2. Build the dictionary of atom placements.
    let dictionary = dictionary::builder::build_dictionary(library, &target, config)?;

    // 3. Global NNLS solve.
    let strategy = PgdNnls {
        max_iterations: config.max_iterations,
        convergence_threshold: config.convergence_threshold,
        step_policy: config.step_policy,
        warm_start: config.warm_start,
    };
    let solution = strategy.solve(&target, &dictionary)?;
    if !solution.report.converged {
        log::debug!(
            "solver hit the iteration cap ({}); schedule uses the truncated weights",
            solution.report.iterations
        );
    }

    // 4. Normalize weights once to [0, 1] so quantization sees the reference
    //    range. The extractor never renormalizes.
    let mut weights = solution.weights;
    let max_weight = weights.iter().fold(0.0f32, |acc, &w| acc.max(w));
    if max_weight > 0.0 {
        for w in weights.iter_mut() {
            *w /= max_weight;
        }
    }

    // 5. Extract and quantize events.
    let events = events::extract_events(&weights, &dictionary, SAMPLES_PER_TICK, config)?;

    // 6. Assemble the batch chain over the full recording duration.
    let total_ticks = (target.len() as u64).div_ceil(SAMPLES_PER_TICK as u64);
    let schedule = schedule::emit_schedule(
        events,
        total_ticks,
        config.window_ticks,
        TICKS_PER_SECOND,
        config.volume_levels,
    )?;

    let processing_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;
    log::info!(
        "transcribed {:.2}s of audio into {} events across {} batches in {:.0} ms",
        target.len() as f32 / CANONICAL_SAMPLE_RATE as f32,
        schedule.num_events(),
        schedule.batches.len(),
        processing_time_ms
    );

    Ok(Transcription {
        metadata: TranscriptionMetadata {
            duration_seconds: target.len() as f32 / CANONICAL_SAMPLE_RATE as f32,
            sample_rate: CANONICAL_SAMPLE_RATE,
            processing_time_ms,
            num_atoms: library.len(),
            num_placements: dictionary.len(),
            num_events: schedule.num_events(),
            solver: solution.report,
        },
        schedule,
    })
}
