//! Reconstruction rendering
//!
//! Re-synthesizes a waveform from the schedule by additively overlaying each
//! event's atom at its tick offset, scaled by its quantized volume. Used for
//! offline quality inspection only; a failed event is reported and skipped,
//! never fatal, and schedule correctness is unaffected.

use serde::{Deserialize, Serialize};

use crate::config::SAMPLES_PER_TICK;
use crate::error::TranscriptionError;
use crate::library::TemplateLibrary;
use crate::schedule::Schedule;

/// Outcome of one rendering pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    /// Events overlaid into the output
    pub events_rendered: usize,
    /// Events skipped (atom missing or identity mismatch)
    pub events_skipped: usize,
}

/// Render `schedule` back into a waveform.
///
/// The output is at least `min_len` samples (the original target length) and
/// grows to fit trailing atoms. Samples are accumulated additively and
/// clamped to [-1.0, 1.0] on overflow; there is no other normalization.
///
/// # Errors
///
/// Returns `TranscriptionError::RenderError` only when nothing at all could
/// be rendered from a non-empty schedule; individual missing atoms are
/// logged and counted in the report.
pub fn render_schedule(
    schedule: &Schedule,
    library: &TemplateLibrary,
    min_len: usize,
) -> Result<(Vec<f32>, RenderReport), TranscriptionError> {
    let samples_per_tick = (library_tick_len(schedule)).unwrap_or(SAMPLES_PER_TICK);

    let mut out = vec![0.0f32; min_len];
    let mut rendered = 0usize;
    let mut skipped = 0usize;

    for batch in &schedule.batches {
        for event in &batch.events {
            let atom = match library.atom(event.atom) {
                Some(atom)
                    if atom.instrument == event.instrument
                        && (atom.pitch - event.pitch).abs() < 1e-6 =>
                {
                    atom
                }
                Some(atom) => {
                    log::warn!(
                        "event references atom {} but identity differs (`{}` {:.3} vs `{}` {:.3}), skipping",
                        event.atom,
                        event.instrument,
                        event.pitch,
                        atom.instrument,
                        atom.pitch
                    );
                    skipped += 1;
                    continue;
                }
                None => {
                    log::warn!(
                        "event references atom {} outside the library ({} atoms), skipping",
                        event.atom,
                        library.len()
                    );
                    skipped += 1;
                    continue;
                }
            };

            let offset = event.start_tick as usize * samples_per_tick;
            let amplitude = event.volume as f32 / schedule.volume_levels as f32;

            let end = offset + atom.len();
            if end > out.len() {
                out.resize(end, 0.0);
            }
            for (o, &s) in out[offset..end].iter_mut().zip(&atom.samples) {
                *o = (*o + amplitude * s).clamp(-1.0, 1.0);
            }
            rendered += 1;
        }
    }

    if rendered == 0 && skipped > 0 {
        return Err(TranscriptionError::RenderError(format!(
            "no event could be rendered ({} skipped)",
            skipped
        )));
    }

    log::debug!(
        "rendered {} events ({} skipped) into {} samples",
        rendered,
        skipped,
        out.len()
    );

    Ok((
        out,
        RenderReport {
            events_rendered: rendered,
            events_skipped: skipped,
        },
    ))
}

// The schedule's tick rate fixes the per-tick sample count at the canonical
// rate; kept as a helper so a non-default tick rate renders correctly.
fn library_tick_len(schedule: &Schedule) -> Option<usize> {
    if schedule.tick_rate == 0 {
        return None;
    }
    Some((crate::config::CANONICAL_SAMPLE_RATE / schedule.tick_rate) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaybackEvent;
    use crate::library::Atom;
    use crate::schedule::emit_schedule;

    fn library() -> TemplateLibrary {
        TemplateLibrary::new(vec![Atom {
            instrument: "harp".to_string(),
            pitch: 1.0,
            samples: vec![0.5; 1200],
        }])
        .unwrap()
    }

    fn event(atom: usize, volume: u32, start_tick: u64) -> PlaybackEvent {
        PlaybackEvent {
            atom,
            instrument: "harp".to_string(),
            pitch: 1.0,
            volume,
            start_tick,
        }
    }

    #[test]
    fn test_events_overlay_at_tick_offsets() {
        let library = library();
        let schedule = emit_schedule(vec![event(0, 100, 1)], 2, 1, 20, 100).unwrap();

        let (out, report) = render_schedule(&schedule, &library, 4800).unwrap();
        assert_eq!(report.events_rendered, 1);
        assert_eq!(report.events_skipped, 0);
        assert_eq!(out.len(), 4800);
        assert_eq!(out[0], 0.0);
        assert!((out[2400] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_volume_scales_amplitude() {
        let library = library();
        let schedule = emit_schedule(vec![event(0, 40, 0)], 1, 1, 20, 100).unwrap();
        let (out, _) = render_schedule(&schedule, &library, 2400).unwrap();
        assert!((out[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_trailing_atom_extends_output() {
        let library = library();
        let schedule = emit_schedule(vec![event(0, 100, 1)], 2, 1, 20, 100).unwrap();
        // min_len shorter than tick offset + atom length
        let (out, _) = render_schedule(&schedule, &library, 2400).unwrap();
        assert_eq!(out.len(), 2400 + 1200);
    }

    #[test]
    fn test_overlap_clamps_to_valid_range() {
        let library = library();
        let events = vec![event(0, 100, 0), event(0, 100, 0), event(0, 100, 0)];
        let schedule = emit_schedule(events, 1, 1, 20, 100).unwrap();
        let (out, _) = render_schedule(&schedule, &library, 2400).unwrap();
        assert!(out.iter().all(|&s| (-1.0..=1.0).contains(&s)));
        assert!((out[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_atom_is_skipped_not_fatal() {
        let library = library();
        let events = vec![event(0, 100, 0), event(7, 100, 0)];
        let schedule = emit_schedule(events, 1, 1, 20, 100).unwrap();
        let (_, report) = render_schedule(&schedule, &library, 2400).unwrap();
        assert_eq!(report.events_rendered, 1);
        assert_eq!(report.events_skipped, 1);
    }

    #[test]
    fn test_all_events_unrenderable_is_an_error() {
        let library = library();
        let schedule = emit_schedule(vec![event(7, 100, 0)], 1, 1, 20, 100).unwrap();
        assert!(render_schedule(&schedule, &library, 2400).is_err());
    }
}
