use crate::binning::{bin, finite_extent};
use crate::error::{Result, TimeStructureError};
use crate::signal::Spectrum;
use log::debug;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Normalization of the spectrum magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    /// `2/n * |FFT|`, the amplitude of a sinusoidal component in input units
    #[default]
    Amplitude,
    /// `|FFT|^2` in arbitrary units
    #[serde(alias = "pds")]
    Power,
}

impl FromStr for Scaling {
    type Err = TimeStructureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "amplitude" => Ok(Scaling::Amplitude),
            "power" | "pds" => Ok(Scaling::Power),
            other => Err(TimeStructureError::InvalidArgument(format!(
                "unknown scaling '{other}' (expected 'amplitude' or 'power')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumOptions {
    /// Highest frequency of interest (Hz); defaults to half the revolution frequency
    pub fmax: Option<f64>,
    /// Revolution frequency (Hz)
    pub frev: Option<f64>,
    pub scaling: Scaling,
    /// Report frequencies as fractions of `frev`
    pub relative: bool,
}

/// Explicit `fmax`, or one sample per revolution when only `frev` is known.
pub fn resolve_fmax(fmax: Option<f64>, frev: Option<f64>) -> Result<f64> {
    let fmax = match (fmax, frev) {
        (Some(fmax), _) => fmax,
        (None, Some(frev)) => frev / 2.0,
        (None, None) => {
            return Err(TimeStructureError::Configuration(
                "spectrum requires fmax or a revolution frequency".into(),
            ))
        }
    };
    if !(fmax.is_finite() && fmax > 0.0) {
        return Err(TimeStructureError::InvalidArgument(format!(
            "fmax must be positive, got {fmax}"
        )));
    }
    Ok(fmax)
}

/// One-sided spectrum of the arrival times, or of `what` averaged per time bin.
///
/// The series is sampled at the Nyquist interval `1 / (2 fmax)` with the
/// sample count rounded up to the next power of two. The DC term is dropped.
pub fn spectrum(times: &[f64], what: Option<&[f64]>, opts: &SpectrumOptions) -> Result<Spectrum> {
    let fmax = resolve_fmax(opts.fmax, opts.frev)?;
    let frev = match (opts.relative, opts.frev) {
        (true, None) => {
            return Err(TimeStructureError::Configuration(
                "relative frequencies require a revolution frequency".into(),
            ))
        }
        (_, frev) => frev,
    };

    let (t_min, t_max) = finite_extent(times)?;
    let nyquist_dt = 1.0 / (2.0 * fmax);
    let n_raw = ((t_max - t_min) / nyquist_dt).ceil();
    if !n_raw.is_finite() || n_raw > (usize::MAX / 2) as f64 {
        return Err(TimeStructureError::InvalidArgument(format!(
            "{n_raw} samples needed to resolve {fmax} Hz"
        )));
    }
    let n = (n_raw as usize).max(2).next_power_of_two();
    let series = bin(times, n, what, None)?;
    debug!(
        "spectrum of {} samples at dt = {:e} s (fmax {} Hz)",
        n, series.dt, fmax
    );

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut buffer = series.values;
    let mut output = r2c.make_output_vec();
    r2c.process(&mut buffer, &mut output)
        .map_err(|e| TimeStructureError::Fft(e.to_string()))?;

    let df = 1.0 / (n as f64 * series.dt);
    let unit = match (opts.relative, frev) {
        (true, Some(frev)) => frev,
        _ => 1.0,
    };
    let frequencies = (1..output.len()).map(|k| k as f64 * df / unit).collect();
    let magnitudes = output[1..]
        .iter()
        .map(|c| match opts.scaling {
            Scaling::Amplitude => 2.0 / n as f64 * c.norm(),
            Scaling::Power => c.norm_sqr(),
        })
        .collect();

    Ok(Spectrum {
        dt: series.dt,
        n,
        fmax,
        scaling: opts.scaling,
        relative: opts.relative,
        frequencies,
        magnitudes,
    })
}

/// Spans of the first `n` harmonics of `v ± dv/2`.
///
/// With `inverse` the spans are `k / (v ± dv/2)`, which maps frequency
/// harmonics into the time domain and vice versa.
pub fn harmonics(v: f64, dv: f64, n: usize, inverse: bool) -> Vec<(f64, f64)> {
    let (lo, hi) = (v - dv / 2.0, v + dv / 2.0);
    (1..=n)
        .map(|k| {
            let k = k as f64;
            if inverse {
                (k / hi, k / lo)
            } else {
                (k * lo, k * hi)
            }
        })
        .collect()
}
