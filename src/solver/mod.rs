//! Decomposition strategies
//!
//! A strategy turns (target, dictionary) into a non-negative weight per
//! basis vector. Projected-gradient NNLS is the one concrete strategy today;
//! the trait seam exists so a future joint pitch/volume solve can be swapped
//! in without touching the dictionary, event, or schedule types.

pub mod pgd;

use serde::{Deserialize, Serialize};

use crate::dictionary::Dictionary;
use crate::error::TranscriptionError;

/// Gradient step-size policy for iterative strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepPolicy {
    /// Fixed step size per iteration
    Fixed(f32),
    /// `1 / lambda_max(D^T D)`, estimated by power iteration on the mat-vec
    /// operators. The largest step with a monotonic-descent guarantee
    Lipschitz,
}

/// Outcome diagnostics of one solve.
///
/// Truncation (iteration cap hit before the convergence threshold) is a
/// valid outcome, not an error; it degrades accuracy only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    /// Whether the relative objective change fell below the threshold
    pub converged: bool,
    /// Iterations actually run
    pub iterations: usize,
    /// `||D*0 - y||^2 = ||y||^2` (or the warm-start objective)
    pub initial_objective: f64,
    /// Objective at the returned weights
    pub final_objective: f64,
}

/// Weights plus diagnostics.
#[derive(Debug, Clone)]
pub struct Solution {
    /// One non-negative weight per dictionary column
    pub weights: Vec<f32>,
    /// Convergence diagnostics
    pub report: SolveReport,
}

/// Capability to decompose a target signal over a dictionary.
pub trait DecompositionStrategy {
    /// Solve for non-negative weights approximating `target` over
    /// `dictionary`.
    ///
    /// Implementations must be deterministic for identical inputs and must
    /// fail with `TranscriptionError::NumericalError` rather than return
    /// non-finite weights.
    fn solve(
        &self,
        target: &[f32],
        dictionary: &Dictionary<'_>,
    ) -> Result<Solution, TranscriptionError>;
}
