//! Schedule file emission
//!
//! Writes one command file per batch, named by its zero-based index. Each
//! file stops the previous window's sounds, fires the batch's triggers, and
//! (except for the final batch) schedules the next-indexed file after the
//! window delay. The command syntax targets the host environment's function
//! files; the semantic content (which sounds, at what volume, in what
//! order and timing) is fully carried by the [`Schedule`] itself.

use std::fs;
use std::path::Path;

use super::Schedule;
use crate::error::TranscriptionError;

/// Namespace prefix used in the forward-link `schedule` command.
const FUNCTION_NAMESPACE: &str = "audio:_";

/// Render one batch's command file body.
fn batch_body(schedule: &Schedule, index: usize) -> String {
    let batch = &schedule.batches[index];
    let mut body = String::new();

    body.push_str("stopsound @a[tag=!nomusic] record\n");

    for event in &batch.events {
        // Host volume is the fraction of full scale; pitch is the
        // playback-rate ratio carried by the atom.
        let volume = event.volume as f32 / schedule.volume_levels as f32;
        body.push_str(&format!(
            "playsound {} record @a 0 -60 0 {:.5} {:.5}\n",
            event.instrument, volume, event.pitch
        ));
    }

    if let Some(next) = batch.next {
        body.push_str(&format!(
            "schedule function {}/{} {}t append\n",
            FUNCTION_NAMESPACE, next, batch.window_ticks
        ));
    }

    body
}

/// Write the whole chain to `dir`, one `<index>.mcfunction` per batch.
///
/// # Errors
///
/// Returns `TranscriptionError::OutputError` if the directory cannot be
/// created or a file cannot be written.
pub fn write_schedule(schedule: &Schedule, dir: &Path) -> Result<(), TranscriptionError> {
    fs::create_dir_all(dir).map_err(|e| {
        TranscriptionError::OutputError(format!(
            "cannot create output directory `{}`: {}",
            dir.display(),
            e
        ))
    })?;

    for batch in &schedule.batches {
        let path = dir.join(format!("{}.mcfunction", batch.index));
        fs::write(&path, batch_body(schedule, batch.index)).map_err(|e| {
            TranscriptionError::OutputError(format!(
                "failed to write `{}`: {}",
                path.display(),
                e
            ))
        })?;
    }

    log::info!(
        "wrote {} batch files to `{}`",
        schedule.batches.len(),
        dir.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaybackEvent;
    use crate::schedule::emit_schedule;

    fn sample_schedule() -> Schedule {
        let events = vec![
            PlaybackEvent {
                atom: 0,
                instrument: "note.harp".to_string(),
                pitch: 1.0,
                volume: 80,
                start_tick: 0,
            },
            PlaybackEvent {
                atom: 1,
                instrument: "note.bass".to_string(),
                pitch: 0.5,
                volume: 40,
                start_tick: 1,
            },
        ];
        emit_schedule(events, 2, 1, 20, 100).unwrap()
    }

    #[test]
    fn test_body_contains_triggers_and_forward_link() {
        let schedule = sample_schedule();
        let body = batch_body(&schedule, 0);
        assert!(body.contains("playsound note.harp record @a 0 -60 0 0.80000 1.00000"));
        assert!(body.contains("schedule function audio:_/1 1t append"));
    }

    #[test]
    fn test_final_batch_has_no_forward_link() {
        let schedule = sample_schedule();
        let body = batch_body(&schedule, 1);
        assert!(body.contains("playsound note.bass"));
        assert!(!body.contains("schedule function"));
    }

    #[test]
    fn test_files_written_per_batch() {
        let schedule = sample_schedule();
        let dir = tempfile::tempdir().unwrap();
        write_schedule(&schedule, dir.path()).unwrap();

        assert!(dir.path().join("0.mcfunction").exists());
        assert!(dir.path().join("1.mcfunction").exists());
        assert!(!dir.path().join("2.mcfunction").exists());
    }
}
