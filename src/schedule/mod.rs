//! Schedule assembly
//!
//! Partitions the extracted events into ordered batches, one per output
//! unit, each batch forward-linked to the next so playback chains
//! automatically. Batch windows are contiguous, non-overlapping, and
//! collectively span the full recording; empty batches are emitted so the
//! chain never skips time.

pub mod writer;

use serde::{Deserialize, Serialize};

use crate::error::TranscriptionError;
use crate::events::PlaybackEvent;

/// One output unit: the events firing in one tick window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Zero-based output index; also the emitted file name
    pub index: usize,
    /// First tick covered by this batch's window
    pub start_tick: u64,
    /// Window length in ticks
    pub window_ticks: u64,
    /// Events whose start tick falls inside the window, in (tick,
    /// dictionary) order
    pub events: Vec<PlaybackEvent>,
    /// Index of the next batch; `None` for the final batch
    pub next: Option<usize>,
}

/// The ordered chain of batches for one transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Batches in playback order
    pub batches: Vec<Batch>,
    /// Window length shared by every batch
    pub window_ticks: u64,
    /// Host tick rate in ticks per second
    pub tick_rate: u32,
    /// Volume level count events were quantized against; playback amplitude
    /// is `event.volume / volume_levels`
    pub volume_levels: u32,
}

impl Schedule {
    /// Total ticks covered by the chain.
    pub fn total_ticks(&self) -> u64 {
        self.batches.len() as u64 * self.window_ticks
    }

    /// Total number of events across all batches.
    pub fn num_events(&self) -> usize {
        self.batches.iter().map(|b| b.events.len()).sum()
    }
}

/// Partition `events` into a forward-linked batch chain.
///
/// `total_ticks` is the recording duration in ticks (rounded up); windows of
/// `window_ticks` are laid out contiguously from tick 0 until the whole
/// duration is covered. Output depends only on event start ticks: no
/// randomness, no hidden state.
///
/// # Errors
///
/// Returns `TranscriptionError::InvalidInput` for a zero window or zero
/// duration, or `ProcessingError` if an event starts past the recording.
pub fn emit_schedule(
    events: Vec<PlaybackEvent>,
    total_ticks: u64,
    window_ticks: u64,
    tick_rate: u32,
    volume_levels: u32,
) -> Result<Schedule, TranscriptionError> {
    if window_ticks == 0 {
        return Err(TranscriptionError::InvalidInput(
            "batch window must be at least one tick".to_string(),
        ));
    }
    if total_ticks == 0 {
        return Err(TranscriptionError::InvalidInput(
            "schedule would cover zero ticks".to_string(),
        ));
    }

    let num_batches = total_ticks.div_ceil(window_ticks) as usize;
    let mut batches: Vec<Batch> = (0..num_batches)
        .map(|index| Batch {
            index,
            start_tick: index as u64 * window_ticks,
            window_ticks,
            events: Vec::new(),
            next: if index + 1 < num_batches {
                Some(index + 1)
            } else {
                None
            },
        })
        .collect();

    for event in events {
        let batch_index = (event.start_tick / window_ticks) as usize;
        let batch = batches.get_mut(batch_index).ok_or_else(|| {
            TranscriptionError::ProcessingError(format!(
                "event at tick {} falls outside the {}-tick recording",
                event.start_tick, total_ticks
            ))
        })?;
        batch.events.push(event);
    }

    log::debug!(
        "schedule: {} batches of {} tick(s), {} events",
        batches.len(),
        window_ticks,
        batches.iter().map(|b| b.events.len()).sum::<usize>()
    );

    Ok(Schedule {
        batches,
        window_ticks,
        tick_rate,
        volume_levels,
    })
}
