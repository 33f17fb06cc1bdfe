//! Spill quality from short-timescale fluctuations of the arrival rate.
//!
//! Arrivals are counted in fine bins, which are grouped into coarser
//! evaluation windows. Per window the chosen metric is computed from the
//! fine-bin counts `N`, together with its value for purely random (Poisson)
//! arrivals at the same mean rate:
//!
//! | metric | value | Poisson limit |
//! |--------|-------|---------------|
//! | `cv`   | `std(N) / mean(N)` | `1 / sqrt(mean(N))` |
//! | `duty` | `mean(N)^2 / mean(N^2)` | `1 / (1 + 1 / mean(N))` |

use crate::binning::{bin, resolve_bins, BinSpec, TimeRange};
use crate::error::{Result, TimeStructureError};
use crate::signal::VariabilitySeries;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_COUNTING_BINS: usize = 100 * 100;
pub const DEFAULT_EVALUATE_BINS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Coefficient of variation
    #[default]
    Cv,
    /// Spill duty factor
    Duty,
}

impl FromStr for Metric {
    type Err = TimeStructureError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cv" => Ok(Metric::Cv),
            "duty" => Ok(Metric::Duty),
            other => Err(TimeStructureError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cv => write!(f, "cv"),
            Metric::Duty => write!(f, "duty"),
        }
    }
}

impl Metric {
    /// Metric value and Poisson limit for one window of counts.
    ///
    /// Both are `NaN` when the window is empty.
    pub fn evaluate(&self, counts: &[f64]) -> (f64, f64) {
        let n = counts.len() as f64;
        let mean = counts.iter().sum::<f64>() / n;
        if !(mean > 0.0) {
            return (f64::NAN, f64::NAN);
        }
        match self {
            Metric::Cv => {
                let var = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
                (var.sqrt() / mean, 1.0 / mean.sqrt())
            }
            Metric::Duty => {
                let mean_sq = counts.iter().map(|c| c * c).sum::<f64>() / n;
                (mean * mean / mean_sq, 1.0 / (1.0 + 1.0 / mean))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariabilityOptions {
    /// Fine bins in which arrivals are counted
    pub counting: BinSpec,
    /// Evaluation windows, as a window width or a number of windows
    pub evaluate: BinSpec,
    pub metric: Metric,
    pub range: Option<TimeRange>,
}

impl Default for VariabilityOptions {
    fn default() -> Self {
        Self {
            counting: BinSpec::Count(DEFAULT_COUNTING_BINS),
            evaluate: BinSpec::Count(DEFAULT_EVALUATE_BINS),
            metric: Metric::Cv,
            range: None,
        }
    }
}

/// Variability metric per evaluation window.
///
/// Fine bins left over after grouping into whole windows are dropped.
pub fn variability(times: &[f64], opts: &VariabilityOptions) -> Result<VariabilitySeries> {
    let fine = resolve_bins(times, opts.counting, opts.range)?;
    let counts = bin(times, fine.n, None, Some(fine.range()))?;

    let group = match opts.evaluate {
        BinSpec::Count(0) => 0,
        BinSpec::Count(windows) => fine.n / windows,
        BinSpec::Width(w) if w.is_finite() && w > 0.0 => {
            // tolerate rounding in the width ratio, e.g. 0.3 / 0.1
            (w / fine.dt * (1.0 + 1e-9)).floor() as usize
        }
        BinSpec::Width(_) => 0,
    };
    if group == 0 {
        return Err(TimeStructureError::InvalidArgument(format!(
            "evaluation windows must span at least one of the {} counting bins",
            fine.n
        )));
    }
    let windows = fine.n / group;
    debug!(
        "{} windows of {} counting bins of {:e} s",
        windows, group, fine.dt
    );

    let (values, poisson): (Vec<f64>, Vec<f64>) = counts
        .values
        .chunks_exact(group)
        .map(|window| opts.metric.evaluate(window))
        .unzip();
    let edges = (0..=windows)
        .map(|i| fine.t_min + (i * group) as f64 * fine.dt)
        .collect();
    Ok(VariabilitySeries {
        edges,
        values,
        poisson,
        metric: opts.metric,
        counting_dt: fine.dt,
        fine_bins_per_window: group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    fn uniform_times() -> Vec<f64> {
        (0..=100_000).map(|i| i as f64 / 10_000.0).collect()
    }

    #[test]
    fn unknown_metric_is_rejected() {
        assert_eq!(
            "rms".parse::<Metric>().unwrap_err(),
            TimeStructureError::UnknownMetric("rms".into())
        );
        assert_eq!("duty".parse::<Metric>().unwrap(), Metric::Duty);
    }

    #[test]
    fn constant_rate_has_low_cv() {
        let opts = VariabilityOptions {
            counting: BinSpec::Count(1000),
            evaluate: BinSpec::Count(10),
            ..Default::default()
        };
        let series = variability(&uniform_times(), &opts).unwrap();
        assert_eq!(series.values.len(), 10);
        assert_eq!(series.edges.len(), 11);
        assert_eq!(series.fine_bins_per_window, 100);
        for (cv, poisson) in series.values.iter().zip(&series.poisson) {
            assert!(*cv >= 0.0 && *cv < 0.05, "cv {cv}");
            assert_close(*poisson, 0.1, 1e-3);
        }
    }

    #[test]
    fn constant_rate_has_unit_duty_factor() {
        let opts = VariabilityOptions {
            counting: BinSpec::Count(1000),
            evaluate: BinSpec::Count(10),
            metric: Metric::Duty,
            range: None,
        };
        let series = variability(&uniform_times(), &opts).unwrap();
        for (f, poisson) in series.values.iter().zip(&series.poisson) {
            assert!(*f > 0.99 && *f <= 1.0, "duty {f}");
            assert_close(*poisson, 100.0 / 101.0, 1e-3);
        }
    }

    #[test]
    fn bunched_arrivals_stay_within_duty_bounds() {
        // bursts of 50 arrivals every 0.1 s
        let times: Vec<f64> = (0..100)
            .flat_map(|burst| (0..50).map(move |k| burst as f64 * 0.1 + k as f64 * 1e-5))
            .collect();
        let opts = VariabilityOptions {
            counting: BinSpec::Width(0.01),
            evaluate: BinSpec::Width(0.5),
            metric: Metric::Duty,
            range: None,
        };
        let series = variability(&times, &opts).unwrap();
        assert_eq!(series.fine_bins_per_window, 50);
        for f in series.values.iter().filter(|f| !f.is_nan()) {
            assert!((0.0..=1.0).contains(f), "duty {f}");
            assert!(*f < 0.2);
        }
        let cv = variability(
            &times,
            &VariabilityOptions {
                metric: Metric::Cv,
                ..opts
            },
        )
        .unwrap();
        assert!(cv.values.iter().filter(|v| !v.is_nan()).all(|v| *v >= 0.0));
    }

    #[test]
    fn empty_windows_are_nan() {
        let times = [0.0, 0.1, 0.2, 9.8, 9.9, 10.0];
        let opts = VariabilityOptions {
            counting: BinSpec::Count(100),
            evaluate: BinSpec::Count(10),
            ..Default::default()
        };
        let series = variability(&times, &opts).unwrap();
        assert!(!series.values[0].is_nan());
        assert!(series.values[5].is_nan());
        assert!(series.poisson[5].is_nan());
        assert!(!series.values[9].is_nan());
    }

    #[test]
    fn remainder_bins_are_dropped() {
        let times: Vec<f64> = (0..=100).map(|i| i as f64 * 0.1).collect();
        let opts = VariabilityOptions {
            counting: BinSpec::Count(10),
            evaluate: BinSpec::Count(3),
            ..Default::default()
        };
        let series = variability(&times, &opts).unwrap();
        assert_eq!(series.values.len(), 3);
        assert_eq!(series.edges.len(), 4);
        assert_close(*series.edges.last().unwrap(), 9.0, 1e-9);
    }

    #[test]
    fn windows_smaller_than_counting_bins_are_rejected() {
        let opts = VariabilityOptions {
            counting: BinSpec::Count(10),
            evaluate: BinSpec::Count(20),
            ..Default::default()
        };
        assert!(matches!(
            variability(&[0.0, 1.0], &opts),
            Err(TimeStructureError::InvalidArgument(_))
        ));
    }
}
