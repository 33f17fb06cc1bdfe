//! Time-structure analysis of particle arrival times.
//!
//! Irregular arrival timestamps are binned into regular series, from which
//! histograms, spectra, delay distributions and spill variability metrics
//! are derived. All engines are pure functions over plain slices.

pub mod binning;
pub mod config;
pub mod error;
pub mod io;
pub mod metrics;
pub mod signal;
pub mod timebase;

pub use binning::{bin, resolve_bins, time_histogram, BinSpec, HistogramOptions, TimeRange};
pub use error::{Result, TimeStructureError};
pub use metrics::intervals::{intervals, IntervalOptions};
pub use metrics::spectrum::{spectrum, Scaling, SpectrumOptions};
pub use metrics::variability::{variability, Metric, VariabilityOptions};
pub use signal::*;
pub use timebase::{arrival_time, ReferenceFrame, C0};
