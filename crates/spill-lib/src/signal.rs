use serde::{Deserialize, Serialize};

/// Regularly binned time series derived from irregular timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedSeries {
    /// Start time of the first bin (seconds)
    pub t_min: f64,
    /// Bin width (seconds)
    pub dt: f64,
    /// Per-bin count, or per-bin mean of the associated values
    pub values: Vec<f64>,
}

impl BinnedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn t_max(&self) -> f64 {
        self.t_min + self.values.len() as f64 * self.dt
    }
    /// Bin edges, one more than the number of bins.
    pub fn edges(&self) -> Vec<f64> {
        (0..=self.values.len())
            .map(|i| self.t_min + i as f64 * self.dt)
            .collect()
    }
}

/// What a time histogram reports per bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistogramKind {
    /// Particles per bin
    #[default]
    Counts,
    /// Particles per second
    Rate,
    /// Running total of particles
    Cumulative,
}

/// Histogram of arrival times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeHistogram {
    pub edges: Vec<f64>,
    pub values: Vec<f64>,
    pub bin_time: f64,
    pub kind: HistogramKind,
    pub relative: bool,
}

/// One-sided spectrum without the DC term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
    /// Effective sampling interval of the binned series (seconds)
    pub dt: f64,
    /// Number of samples transformed (power of two)
    pub n: usize,
    pub fmax: f64,
    pub scaling: crate::metrics::spectrum::Scaling,
    /// Frequencies are fractions of the revolution frequency
    pub relative: bool,
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
    /// Frequency and magnitude of the largest component.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.frequencies
            .iter()
            .zip(&self.magnitudes)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(f, m)| (*f, *m))
    }
}

/// Histogram of delays between consecutive arrivals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalHistogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub bin_time: f64,
}

/// Variability metric per evaluation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariabilitySeries {
    /// Window edges, one more than the number of windows
    pub edges: Vec<f64>,
    pub values: Vec<f64>,
    /// Poisson-limited reference for the same mean count
    pub poisson: Vec<f64>,
    pub metric: crate::metrics::variability::Metric,
    pub counting_dt: f64,
    pub fine_bins_per_window: usize,
}
