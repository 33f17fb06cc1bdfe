//! Error types for the time-structure engines

use thiserror::Error;

/// Result type for time-structure computations
pub type Result<T> = std::result::Result<T, TimeStructureError>;

/// Errors raised by the time-structure engines.
///
/// Empty bins and empty evaluation windows are not errors; they resolve to
/// `0` and `NaN` respectively.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeStructureError {
    /// A required quantity (frev, fmax, beta) is missing and cannot be derived
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Zero-width time range passed to binning
    #[error("degenerate time range [{t_min}, {t_max}]")]
    DegenerateRange { t_min: f64, t_max: f64 },

    /// Unsupported variability metric
    #[error("unknown metric '{0}' (expected 'cv' or 'duty')")]
    UnknownMetric(String),

    /// No finite samples to derive a range from
    #[error("no finite {0} to analyse")]
    EmptyInput(&'static str),

    /// Index-aligned arrays of different length
    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Particle field not provided by the data source
    #[error("particle data has no '{0}' field")]
    MissingField(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("FFT failed: {0}")]
    Fft(String),
}
