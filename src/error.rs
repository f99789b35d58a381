//! Error types for the transcription pipeline

use std::fmt;

/// Errors that can occur while transcribing a recording
#[derive(Debug, Clone)]
pub enum TranscriptionError {
    /// Invalid input parameters (empty signal, zero sample rate, stereo input)
    InvalidInput(String),

    /// Template library could not be loaded or is inconsistent
    LibraryError(String),

    /// No basis vector fits the target signal
    EmptyDictionary(String),

    /// Processing error during decomposition
    ProcessingError(String),

    /// Numerical error (non-finite weights, divergent step)
    NumericalError(String),

    /// Reconstruction rendering error
    RenderError(String),

    /// Failure writing schedule or audio output
    OutputError(String),
}

impl fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptionError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            TranscriptionError::LibraryError(msg) => write!(f, "Library error: {}", msg),
            TranscriptionError::EmptyDictionary(msg) => write!(f, "Empty dictionary: {}", msg),
            TranscriptionError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            TranscriptionError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            TranscriptionError::RenderError(msg) => write!(f, "Render error: {}", msg),
            TranscriptionError::OutputError(msg) => write!(f, "Output error: {}", msg),
        }
    }
}

impl std::error::Error for TranscriptionError {}
