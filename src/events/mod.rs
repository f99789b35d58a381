//! Event extraction and quantization
//!
//! Collapses the solver's dense weight vector into a sparse set of discrete
//! playback events. Weights are expected in the normalized [0, 1] reference
//! range (the pipeline normalizes once after solving; the extractor itself
//! never renormalizes, which keeps re-extraction of its own output stable).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::TranscriptionConfig;
use crate::dictionary::Dictionary;
use crate::error::TranscriptionError;

/// One discrete playback trigger.
///
/// Immutable once emitted. `volume` is a quantized level in
/// `0..=volume_levels`; the playback amplitude is `volume / volume_levels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    /// Library index of the atom to trigger
    pub atom: usize,
    /// Instrument identifier, as the host environment names it
    pub instrument: String,
    /// Playback-rate ratio
    pub pitch: f32,
    /// Quantized volume level
    pub volume: u32,
    /// Start time in host ticks
    pub start_tick: u64,
}

/// Extract playback events from a solved weight vector.
///
/// - Weights below `config.significance_threshold` are discarded
///   (inclusive rule: a weight exactly at the threshold survives).
/// - Placements of the same atom quantizing to the same start tick merge by
///   summing weights before volume mapping.
/// - The merged weight maps to `round(w * volume_levels)`, clamped to
///   `[0, volume_levels]`; overflow clamps, never wraps. Events rounding to
///   level 0 are dropped.
/// - With `config.max_events_per_tick` set, only the loudest events per tick
///   survive; ties keep the earlier dictionary entry.
///
/// Output is ordered by (start tick, dictionary order) and each surviving
/// event has a unique (atom, start tick) key.
///
/// # Errors
///
/// Returns `TranscriptionError::NumericalError` on non-finite or negative
/// weights, and `InvalidInput` on a weight/dictionary length mismatch.
pub fn extract_events(
    weights: &[f32],
    dictionary: &Dictionary<'_>,
    samples_per_tick: usize,
    config: &TranscriptionConfig,
) -> Result<Vec<PlaybackEvent>, TranscriptionError> {
    if weights.len() != dictionary.len() {
        return Err(TranscriptionError::InvalidInput(format!(
            "weight vector length {} does not match dictionary size {}",
            weights.len(),
            dictionary.len()
        )));
    }
    if samples_per_tick == 0 {
        return Err(TranscriptionError::InvalidInput(
            "samples per tick must be > 0".to_string(),
        ));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(TranscriptionError::NumericalError(format!(
            "weight vector contains invalid value {}",
            w
        )));
    }

    // Merge by (start tick, atom): BTreeMap gives the (tick, dictionary
    // order) output ordering for free and deterministically.
    let mut merged: BTreeMap<(u64, usize), (f64, usize)> = BTreeMap::new();
    for (k, (entry, &w)) in dictionary.entries().iter().zip(weights).enumerate() {
        if w < config.significance_threshold {
            continue;
        }
        let start_tick = (entry.offset / samples_per_tick) as u64;
        let slot = merged.entry((start_tick, entry.atom)).or_insert((0.0, k));
        slot.0 += w as f64;
    }

    let mut events: Vec<(usize, PlaybackEvent)> = Vec::with_capacity(merged.len());
    for ((start_tick, atom_index), (weight_sum, dict_index)) in merged {
        let atom = dictionary.library().atom(atom_index).ok_or_else(|| {
            TranscriptionError::ProcessingError(format!(
                "dictionary references atom {} outside the library",
                atom_index
            ))
        })?;

        let levels = config.volume_levels as f64;
        let volume = (weight_sum * levels).round().clamp(0.0, levels) as u32;
        if volume == 0 {
            continue;
        }

        events.push((
            dict_index,
            PlaybackEvent {
                atom: atom_index,
                instrument: atom.instrument.clone(),
                pitch: atom.pitch,
                volume,
                start_tick,
            },
        ));
    }

    if let Some(cap) = config.max_events_per_tick {
        events = cap_per_tick(events, cap);
    }

    let events: Vec<PlaybackEvent> = events.into_iter().map(|(_, e)| e).collect();

    log::debug!(
        "extracted {} events from {} weights (threshold {}, {} volume levels)",
        events.len(),
        weights.len(),
        config.significance_threshold,
        config.volume_levels
    );

    Ok(events)
}

/// Keep only the `cap` loudest events per tick.
///
/// Ties keep the event whose dictionary index is smaller, so capping is as
/// deterministic as the rest of the pipeline.
fn cap_per_tick(
    events: Vec<(usize, PlaybackEvent)>,
    cap: usize,
) -> Vec<(usize, PlaybackEvent)> {
    let mut out = Vec::with_capacity(events.len());
    let mut tick_group: Vec<(usize, PlaybackEvent)> = Vec::new();

    let flush = |group: &mut Vec<(usize, PlaybackEvent)>, out: &mut Vec<(usize, PlaybackEvent)>| {
        if group.len() > cap {
            group.sort_by(|a, b| b.1.volume.cmp(&a.1.volume).then(a.0.cmp(&b.0)));
            group.truncate(cap);
            // Restore (tick, dictionary order).
            group.sort_by_key(|(dict_index, _)| *dict_index);
        }
        out.append(group);
    };

    for event in events {
        if let Some(last) = tick_group.last() {
            if last.1.start_tick != event.1.start_tick {
                flush(&mut tick_group, &mut out);
            }
        }
        tick_group.push(event);
    }
    flush(&mut tick_group, &mut out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::builder::build_dictionary;
    use crate::library::{Atom, TemplateLibrary};

    fn atom(instrument: &str, len: usize) -> Atom {
        Atom {
            instrument: instrument.to_string(),
            pitch: 1.0,
            samples: vec![0.5; len],
        }
    }

    fn config() -> TranscriptionConfig {
        TranscriptionConfig {
            frame_grid: 4,
            significance_threshold: 0.1,
            volume_levels: 100,
            max_events_per_tick: None,
            ..TranscriptionConfig::default()
        }
    }

    /// Library with one 4-sample atom, 16-sample signal, grid 4: columns at
    /// offsets 0, 4, 8, 12.
    fn setup() -> (TemplateLibrary, Vec<f32>) {
        let library = TemplateLibrary::new(vec![atom("harp", 4), atom("bass", 4)]).unwrap();
        (library, vec![0.1f32; 16])
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (library, target) = setup();
        let dictionary = build_dictionary(&library, &target, &config()).unwrap();

        // Weight exactly at the threshold survives; just below does not.
        let mut weights = vec![0.0f32; dictionary.len()];
        weights[0] = 0.1;
        weights[1] = 0.0999;
        let events = extract_events(&weights, &dictionary, 8, &config()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].volume, 10);
        assert_eq!(events[0].start_tick, 0);
    }

    #[test]
    fn test_volume_clamps_never_wraps() {
        let (library, target) = setup();
        let dictionary = build_dictionary(&library, &target, &config()).unwrap();

        let mut weights = vec![0.0f32; dictionary.len()];
        weights[0] = 3.5; // far above the reference range
        let events = extract_events(&weights, &dictionary, 8, &config()).unwrap();
        assert_eq!(events[0].volume, 100);
    }

    #[test]
    fn test_same_tick_same_atom_merges() {
        let (library, target) = setup();
        let dictionary = build_dictionary(&library, &target, &config()).unwrap();

        // Offsets 0 and 4 both land in tick 0 at 8 samples/tick: one event
        // with the summed weight.
        let mut weights = vec![0.0f32; dictionary.len()];
        weights[0] = 0.2;
        weights[1] = 0.3;
        let events = extract_events(&weights, &dictionary, 8, &config()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].volume, 50);
    }

    #[test]
    fn test_unique_key_after_merge() {
        let (library, target) = setup();
        let dictionary = build_dictionary(&library, &target, &config()).unwrap();

        let weights = vec![0.5f32; dictionary.len()];
        let events = extract_events(&weights, &dictionary, 4, &config()).unwrap();

        let mut keys: Vec<(usize, u64)> =
            events.iter().map(|e| (e.atom, e.start_tick)).collect();
        let before = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let (library, target) = setup();
        let dictionary = build_dictionary(&library, &target, &config()).unwrap();

        let weights = vec![0.37f32, 0.0, 0.82, 0.0, 0.0, 0.51, 0.0, 0.12];
        let events = extract_events(&weights, &dictionary, 4, &config()).unwrap();

        // Re-feed the quantized volumes as a fresh weight assignment.
        let mut requantized = vec![0.0f32; dictionary.len()];
        for event in &events {
            let k = dictionary
                .entries()
                .iter()
                .position(|e| {
                    e.atom == event.atom && (e.offset / 4) as u64 == event.start_tick
                })
                .unwrap();
            requantized[k] = event.volume as f32 / 100.0;
        }
        let second = extract_events(&requantized, &dictionary, 4, &config()).unwrap();
        assert_eq!(events, second);
    }

    #[test]
    fn test_per_tick_cap_keeps_loudest() {
        let (library, target) = setup();
        let mut config = config();
        config.max_events_per_tick = Some(1);
        let dictionary = build_dictionary(&library, &target, &config).unwrap();

        // Tick 0 (16 samples/tick) sees both atoms; the louder bass wins.
        let mut weights = vec![0.0f32; dictionary.len()];
        let harp_k = dictionary
            .entries()
            .iter()
            .position(|e| e.atom == 0 && e.offset == 0)
            .unwrap();
        let bass_k = dictionary
            .entries()
            .iter()
            .position(|e| e.atom == 1 && e.offset == 0)
            .unwrap();
        weights[harp_k] = 0.3;
        weights[bass_k] = 0.9;

        let events = extract_events(&weights, &dictionary, 16, &config).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].instrument, "bass");
    }

    #[test]
    fn test_negative_weight_is_numerical_error() {
        let (library, target) = setup();
        let dictionary = build_dictionary(&library, &target, &config()).unwrap();

        let mut weights = vec![0.0f32; dictionary.len()];
        weights[2] = -0.5;
        let result = extract_events(&weights, &dictionary, 8, &config());
        assert!(matches!(
            result,
            Err(TranscriptionError::NumericalError(_))
        ));
    }
}
