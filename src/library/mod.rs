//! Template library: the fixed palette of reference waveforms
//!
//! Atoms are short sound templates tagged by (instrument, pitch), all at the
//! canonical sample rate. The library is read-only input to the pipeline;
//! provisioning (local cache scan, remote fetch) happens once at startup
//! through an [`AtomProvider`] before any solving begins.

pub mod pitch;

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CANONICAL_SAMPLE_RATE;
use crate::error::TranscriptionError;

/// A single reference waveform, tagged by instrument and pitch.
///
/// Immutable after load. `pitch` is a playback-rate ratio: 1.0 plays the
/// sample as recorded, 2.0 one octave up.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Instrument identifier (e.g. a resource location understood by the host)
    pub instrument: String,
    /// Playback-rate ratio relative to the recorded sample
    pub pitch: f32,
    /// Mono samples at the canonical rate, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
}

impl Atom {
    /// Duration of the atom in samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the atom carries no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The full set of atoms considered for one transcription.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    atoms: Vec<Atom>,
}

impl TemplateLibrary {
    /// Build a library from a set of atoms.
    ///
    /// # Errors
    ///
    /// Returns `TranscriptionError::LibraryError` if the set is empty or any
    /// atom carries no samples.
    pub fn new(atoms: Vec<Atom>) -> Result<Self, TranscriptionError> {
        if atoms.is_empty() {
            return Err(TranscriptionError::LibraryError(
                "template library has no atoms".to_string(),
            ));
        }
        if let Some(atom) = atoms.iter().find(|a| a.is_empty()) {
            return Err(TranscriptionError::LibraryError(format!(
                "atom `{}` (pitch {:.3}) has no samples",
                atom.instrument, atom.pitch
            )));
        }
        Ok(Self { atoms })
    }

    /// All atoms, in a fixed order that the dictionary indexes into.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the library is empty (never true for a constructed library).
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Atom by library index.
    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }
}

/// Capability to load a template library, acquired once at startup.
///
/// The core only ever sees the resulting [`TemplateLibrary`]; where the
/// atoms come from (local cache, remote fetch) is the provider's business.
pub trait AtomProvider {
    /// Load the full library, or fail the setup phase.
    ///
    /// Providers must never return a partial library: a missing or corrupt
    /// asset is a setup error, not a smaller palette.
    fn load(&self) -> Result<TemplateLibrary, TranscriptionError>;
}

/// Loads atoms from a directory of mono WAV files at the canonical rate.
///
/// Each `.wav` file becomes one base atom (pitch 1.0) whose instrument id is
/// the file stem. Files at the wrong rate or with more than one channel fail
/// the whole load.
#[derive(Debug, Clone)]
pub struct LocalCacheProvider {
    dir: PathBuf,
}

impl LocalCacheProvider {
    /// Provider over the given cache directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn load_wav(path: &Path) -> Result<Vec<f32>, TranscriptionError> {
        let mut reader = hound::WavReader::open(path).map_err(|e| {
            TranscriptionError::LibraryError(format!("failed to open `{}`: {}", path.display(), e))
        })?;
        let spec = reader.spec();

        if spec.channels != 1 {
            return Err(TranscriptionError::LibraryError(format!(
                "atom `{}` has {} channels, expected mono",
                path.display(),
                spec.channels
            )));
        }
        if spec.sample_rate != CANONICAL_SAMPLE_RATE {
            return Err(TranscriptionError::LibraryError(format!(
                "atom `{}` is at {} Hz, expected the canonical {} Hz",
                path.display(),
                spec.sample_rate,
                CANONICAL_SAMPLE_RATE
            )));
        }

        let samples: Result<Vec<f32>, _> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect(),
            hound::SampleFormat::Int => {
                let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / max_value))
                    .collect()
            }
        };

        samples.map_err(|e| {
            TranscriptionError::LibraryError(format!("failed to decode `{}`: {}", path.display(), e))
        })
    }
}

impl AtomProvider for LocalCacheProvider {
    fn load(&self) -> Result<TemplateLibrary, TranscriptionError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            TranscriptionError::LibraryError(format!(
                "cannot read asset cache `{}`: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "wav"))
            .collect();
        // Directory iteration order is filesystem-dependent; sort for a
        // stable atom ordering.
        paths.sort();

        let mut atoms = Vec::with_capacity(paths.len());
        for path in &paths {
            let samples = Self::load_wav(path)?;
            let instrument = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            log::debug!("loaded atom `{}` ({} samples)", instrument, samples.len());
            atoms.push(Atom {
                instrument,
                pitch: 1.0,
                samples,
            });
        }

        log::info!("loaded {} atoms from `{}`", atoms.len(), self.dir.display());
        TemplateLibrary::new(atoms)
    }
}
