//! Binning of irregular arrival times into regular time series.

use crate::error::{Result, TimeStructureError};
use crate::signal::{BinnedSeries, HistogramKind, TimeHistogram};
use log::debug;
use serde::{Deserialize, Serialize};

/// Default number of bins when neither width nor count is given.
pub const DEFAULT_BIN_COUNT: usize = 100;

/// Largest number of bins a single call may allocate.
pub const MAX_BINS: usize = 1 << 27;

/// Time window limiting which timestamps are binned.
///
/// A missing end defaults to the extreme of the data on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Fill missing ends from the finite extremes of `times`.
    pub fn resolve(&self, times: &[f64]) -> Result<(f64, f64)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok((start, end)),
            (start, end) => {
                let (lo, hi) = finite_extent(times)?;
                Ok((start.unwrap_or(lo), end.unwrap_or(hi)))
            }
        }
    }
}

/// Bin width or bin count; the other is derived from the time range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinSpec {
    Width(f64),
    Count(usize),
}

impl Default for BinSpec {
    fn default() -> Self {
        BinSpec::Count(DEFAULT_BIN_COUNT)
    }
}

impl BinSpec {
    /// Build from mutually exclusive width/count options.
    pub fn from_options(width: Option<f64>, count: Option<usize>, default_count: usize) -> Result<Self> {
        match (width, count) {
            (Some(_), Some(_)) => Err(TimeStructureError::InvalidArgument(
                "bin width and bin count are mutually exclusive".into(),
            )),
            (Some(w), None) => Ok(BinSpec::Width(w)),
            (None, Some(n)) => Ok(BinSpec::Count(n)),
            (None, None) => Ok(BinSpec::Count(default_count)),
        }
    }
}

/// Consistent `(t_min, dt, n)` triple; `t_max` is the end of the last bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBins {
    pub t_min: f64,
    pub t_max: f64,
    pub dt: f64,
    pub n: usize,
}

impl ResolvedBins {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.t_min, self.t_max)
    }
}

/// Resolve a bin specification over the (optionally restricted) time range.
///
/// A width is kept exact: the bin count is rounded up and the range is
/// extended to `t_min + n * width`, so no data is dropped at the tail.
/// A count divides the range evenly.
pub fn resolve_bins(times: &[f64], spec: BinSpec, range: Option<TimeRange>) -> Result<ResolvedBins> {
    let (lo, hi) = range.unwrap_or_default().resolve(times)?;
    check_range(lo, hi)?;
    let resolved = match spec {
        BinSpec::Width(w) => {
            if !(w.is_finite() && w > 0.0) {
                return Err(TimeStructureError::InvalidArgument(format!(
                    "bin width must be positive, got {w}"
                )));
            }
            let n = bin_count_for_width(hi - lo, w)?;
            ResolvedBins {
                t_min: lo,
                t_max: lo + n as f64 * w,
                dt: w,
                n,
            }
        }
        BinSpec::Count(n) => {
            check_bin_count(n)?;
            ResolvedBins {
                t_min: lo,
                t_max: hi,
                dt: (hi - lo) / n as f64,
                n,
            }
        }
    };
    debug!(
        "resolved {} bins of {:e} s over [{}, {}]",
        resolved.n, resolved.dt, resolved.t_min, resolved.t_max
    );
    Ok(resolved)
}

/// Bin `times` into `n` equal-width bins.
///
/// Without `what` each bin holds the number of timestamps in
/// `[t_min + i*dt, t_min + (i+1)*dt)`; the last bin is closed on the right.
/// With `what` each bin holds the mean of the associated values, or `0` for
/// empty bins. Timestamps outside an explicit `range` are dropped.
pub fn bin(
    times: &[f64],
    n: usize,
    what: Option<&[f64]>,
    range: Option<TimeRange>,
) -> Result<BinnedSeries> {
    check_bin_count(n)?;
    if let Some(what) = what {
        if what.len() != times.len() {
            return Err(TimeStructureError::LengthMismatch {
                what: "associated values",
                expected: times.len(),
                actual: what.len(),
            });
        }
    }
    let (t_min, t_max) = range.unwrap_or_default().resolve(times)?;
    check_range(t_min, t_max)?;
    let dt = (t_max - t_min) / n as f64;

    let mut counts = vec![0usize; n];
    let mut sums = what.map(|_| vec![0.0f64; n]);
    for (i, &t) in times.iter().enumerate() {
        if !(t >= t_min && t <= t_max) {
            continue;
        }
        let idx = (((t - t_min) / dt).floor() as usize).min(n - 1);
        counts[idx] += 1;
        if let (Some(sums), Some(what)) = (sums.as_mut(), what) {
            sums[idx] += what[i];
        }
    }

    let values = match sums {
        None => counts.iter().map(|&c| c as f64).collect(),
        Some(sums) => sums
            .into_iter()
            .zip(&counts)
            .map(|(sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect(),
    };
    Ok(BinnedSeries { t_min, dt, values })
}

/// Options for [`time_histogram`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramOptions {
    pub bins: BinSpec,
    pub range: Option<TimeRange>,
    pub kind: HistogramKind,
    /// Normalize to the total number of timestamps
    pub relative: bool,
}

/// Histogram of arrival times as counts, rate or cumulative counts.
pub fn time_histogram(times: &[f64], opts: &HistogramOptions) -> Result<TimeHistogram> {
    let resolved = resolve_bins(times, opts.bins, opts.range)?;
    let series = bin(times, resolved.n, None, Some(resolved.range()))?;
    let mut scale = 1.0;
    if opts.kind == HistogramKind::Rate {
        scale /= resolved.dt;
    }
    if opts.relative {
        scale /= times.len() as f64;
    }
    let mut values: Vec<f64> = series.values.iter().map(|c| c * scale).collect();
    if opts.kind == HistogramKind::Cumulative {
        let mut acc = 0.0;
        for v in values.iter_mut() {
            acc += *v;
            *v = acc;
        }
    }
    Ok(TimeHistogram {
        edges: series.edges(),
        values,
        bin_time: resolved.dt,
        kind: opts.kind,
        relative: opts.relative,
    })
}

/// Smallest and largest finite timestamp.
pub fn finite_extent(times: &[f64]) -> Result<(f64, f64)> {
    times
        .iter()
        .copied()
        .filter(|t| t.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, t| match acc {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
        .ok_or(TimeStructureError::EmptyInput("timestamps"))
}

/// Number of bins of width `width` needed to cover `span`, at least one.
pub(crate) fn bin_count_for_width(span: f64, width: f64) -> Result<usize> {
    let n = (span / width).ceil();
    if !(n.is_finite() && n <= MAX_BINS as f64) {
        return Err(TimeStructureError::InvalidArgument(format!(
            "bin width {width:e} s over {span:e} s needs more than {MAX_BINS} bins"
        )));
    }
    Ok((n as usize).max(1))
}

fn check_bin_count(n: usize) -> Result<()> {
    if n == 0 {
        return Err(TimeStructureError::InvalidArgument(
            "bin count must be at least 1".into(),
        ));
    }
    if n > MAX_BINS {
        return Err(TimeStructureError::InvalidArgument(format!(
            "{n} bins exceed the limit of {MAX_BINS}"
        )));
    }
    Ok(())
}

fn check_range(t_min: f64, t_max: f64) -> Result<()> {
    if !(t_max > t_min) || !(t_max - t_min).is_finite() {
        return Err(TimeStructureError::DegenerateRange { t_min, t_max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    #[test]
    fn counts_split_at_midpoint() {
        let times = [0.1, 0.15, 0.9, 1.0, 1.95];
        let series = bin(&times, 2, None, None).unwrap();
        assert_close(series.t_min, 0.1, 1e-12);
        assert_close(series.dt, 0.925, 1e-12);
        // boundary at 1.025
        assert_eq!(series.values, vec![4.0, 1.0]);
        assert_eq!(series.values.iter().sum::<f64>(), 5.0);
    }

    #[test]
    fn every_timestamp_is_counted_without_range() {
        let times: Vec<f64> = (0..997).map(|i| ((i * 7919) % 1000) as f64 * 1e-3).collect();
        for n in [1, 2, 3, 17, 100, 1024] {
            let series = bin(&times, n, None, None).unwrap();
            assert_eq!(series.len(), n);
            assert_eq!(series.values.iter().sum::<f64>(), times.len() as f64);
        }
    }

    #[test]
    fn last_timestamp_lands_in_last_bin() {
        let series = bin(&[0.0, 1.0, 2.0, 3.0, 4.0], 4, None, None).unwrap();
        assert_eq!(series.values, vec![1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn explicit_range_drops_outside_points() {
        let times = [-1.0, 0.0, 0.5, 1.0, 1.5, 2.0];
        let series = bin(&times, 2, None, Some(TimeRange::new(0.0, 1.0))).unwrap();
        assert_eq!(series.values, vec![1.0, 2.0]);
    }

    #[test]
    fn partial_range_keeps_data_extreme() {
        let times = [0.0, 1.0, 2.0, 3.0];
        let range = TimeRange {
            start: Some(1.0),
            end: None,
        };
        let series = bin(&times, 2, None, Some(range)).unwrap();
        assert_close(series.t_min, 1.0, 1e-12);
        assert_eq!(series.values, vec![1.0, 2.0]);
    }

    #[test]
    fn averages_associated_values_with_zero_fill() {
        let times = [0.0, 0.1, 0.2, 3.9, 4.0];
        let what = [1.0, 2.0, 3.0, 10.0, 20.0];
        let series = bin(&times, 4, Some(&what), None).unwrap();
        assert_eq!(series.values, vec![2.0, 0.0, 0.0, 15.0]);
        assert!(series.values.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn identical_timestamps_are_degenerate() {
        let err = bin(&[2.0, 2.0, 2.0], 10, None, None).unwrap_err();
        assert_eq!(
            err,
            TimeStructureError::DegenerateRange {
                t_min: 2.0,
                t_max: 2.0
            }
        );
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            bin(&[0.0, 1.0], 0, None, None),
            Err(TimeStructureError::InvalidArgument(_))
        ));
        assert!(matches!(
            bin(&[0.0, 1.0], 2, Some(&[1.0]), None),
            Err(TimeStructureError::LengthMismatch { .. })
        ));
        assert_eq!(
            bin(&[], 2, None, None).unwrap_err(),
            TimeStructureError::EmptyInput("timestamps")
        );
    }

    #[test]
    fn binning_is_deterministic() {
        let times: Vec<f64> = (0..500).map(|i| (i as f64 * 0.37).sin()).collect();
        let a = bin(&times, 64, Some(&times), None).unwrap();
        let b = bin(&times, 64, Some(&times), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn width_spec_extends_range_to_whole_bins() {
        let resolved = resolve_bins(&[0.0, 1.0], BinSpec::Width(0.3), None).unwrap();
        assert_eq!(resolved.n, 4);
        assert_close(resolved.t_max, 1.2, 1e-12);
        assert_close(resolved.dt, 0.3, 1e-15);
    }

    #[test]
    fn tiny_width_is_rejected_instead_of_allocating() {
        let opts = HistogramOptions {
            bins: BinSpec::Width(1e-300),
            ..Default::default()
        };
        assert!(matches!(
            time_histogram(&[0.0, 1.0], &opts),
            Err(TimeStructureError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_bins(&[0.0, 1.0], BinSpec::Count(MAX_BINS + 1), None),
            Err(TimeStructureError::InvalidArgument(_))
        ));
        assert!(bin(&[0.0, 1.0], usize::MAX, None, None).is_err());
    }

    #[test]
    fn count_spec_divides_range() {
        let resolved = resolve_bins(&[0.0, 1.0], BinSpec::Count(4), None).unwrap();
        assert_eq!(resolved.t_max, 1.0);
        assert_close(resolved.dt, 0.25, 1e-15);
    }

    #[test]
    fn bin_spec_options_are_exclusive() {
        assert!(BinSpec::from_options(Some(1.0), Some(3), 100).is_err());
        assert_eq!(
            BinSpec::from_options(None, None, 100).unwrap(),
            BinSpec::Count(100)
        );
    }

    #[test]
    fn histogram_rate_and_relative() {
        let times = [0.0, 0.1, 0.2, 0.3, 1.0];
        let opts = HistogramOptions {
            bins: BinSpec::Width(0.5),
            kind: HistogramKind::Rate,
            ..Default::default()
        };
        let hist = time_histogram(&times, &opts).unwrap();
        assert_eq!(hist.edges.len(), 3);
        assert_close(hist.values[0], 8.0, 1e-12);
        assert_close(hist.values[1], 2.0, 1e-12);

        let opts = HistogramOptions {
            bins: BinSpec::Count(2),
            kind: HistogramKind::Cumulative,
            relative: true,
            ..Default::default()
        };
        let hist = time_histogram(&times, &opts).unwrap();
        assert_close(hist.values[0], 0.8, 1e-12);
        assert_close(*hist.values.last().unwrap(), 1.0, 1e-12);
    }
}
