//! Configuration parameters for the transcription pipeline

use crate::solver::StepPolicy;

/// Canonical processing sample rate in Hz.
///
/// All atoms and the target signal must be at this rate before the core
/// pipeline runs; resampling is the caller's responsibility.
pub const CANONICAL_SAMPLE_RATE: u32 = 48_000;

/// Host environment tick rate (ticks per second).
pub const TICKS_PER_SECOND: u32 = 20;

/// Samples covered by one host tick at the canonical rate.
pub const SAMPLES_PER_TICK: usize = (CANONICAL_SAMPLE_RATE / TICKS_PER_SECOND) as usize;

/// Transcription configuration parameters
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    // Dictionary
    /// Placement grid spacing in samples (default: one tick, 2400)
    ///
    /// A basis vector is considered at every multiple of this spacing where
    /// the atom still fits inside the target signal.
    pub frame_grid: usize,

    /// Correlation pre-filter threshold in [0, 1] (default: None = keep all)
    ///
    /// When set, placements whose normalized cross-correlation with the
    /// target falls below this value are pruned before solving. Pruning only
    /// removes candidates; it never alters the solve over survivors.
    pub prune_correlation: Option<f32>,

    // Solver
    /// Maximum PGD iterations (default: 256)
    pub max_iterations: usize,

    /// Relative objective-change threshold for convergence (default: 1e-6)
    pub convergence_threshold: f64,

    /// Gradient step-size policy (default: Lipschitz)
    pub step_policy: StepPolicy,

    /// Initialize weights from a correlation heuristic instead of zero
    /// (default: false)
    pub warm_start: bool,

    // Event extraction
    /// Minimum normalized weight for an event to survive (default: 1e-3)
    ///
    /// Inclusive: a weight exactly at the threshold is retained.
    pub significance_threshold: f32,

    /// Number of discrete volume levels (default: 100)
    ///
    /// A normalized weight maps to `round(w * volume_levels)`, clamped to
    /// `[0, volume_levels]`.
    pub volume_levels: u32,

    /// Cap on simultaneous events per tick, loudest first (default: Some(64))
    pub max_events_per_tick: Option<usize>,

    // Schedule
    /// Batch window length in ticks (default: 1)
    pub window_ticks: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            frame_grid: SAMPLES_PER_TICK,
            prune_correlation: None,
            max_iterations: 256,
            convergence_threshold: 1e-6,
            step_policy: StepPolicy::Lipschitz,
            warm_start: false,
            significance_threshold: 1e-3,
            volume_levels: 100,
            max_events_per_tick: Some(64),
            window_ticks: 1,
        }
    }
}
