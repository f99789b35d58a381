//! Transcription result types

use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;
use crate::solver::SolveReport;

/// Durable output of one transcription run.
#[derive(Debug, Clone)]
pub struct Transcription {
    /// The forward-linked batch chain, ready for file emission
    pub schedule: Schedule,
    /// Run diagnostics
    pub metadata: TranscriptionMetadata,
}

/// Diagnostics describing one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionMetadata {
    /// Input duration in seconds at the canonical rate
    pub duration_seconds: f32,
    /// Sample rate the pipeline ran at
    pub sample_rate: u32,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: f32,
    /// Atoms in the (pitch-expanded) template library
    pub num_atoms: usize,
    /// Basis vectors considered by the solver
    pub num_placements: usize,
    /// Events surviving extraction and quantization
    pub num_events: usize,
    /// Solver convergence diagnostics
    pub solver: SolveReport,
}
