use crate::binning::{bin_count_for_width, MAX_BINS};
use crate::error::{Result, TimeStructureError};
use crate::signal::IntervalHistogram;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INTERVAL_BINS: usize = 100;

/// Binning of the delay histogram. Width and count resolve each other via `tmax`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalOptions {
    /// Largest delay of interest (s); defaults to the largest observed delay
    pub tmax: Option<f64>,
    pub bin_time: Option<f64>,
    pub bin_count: Option<usize>,
}

/// Delays between consecutive arrivals in time order.
pub fn delays(times: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = times.iter().copied().filter(|t| t.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.windows(2).map(|w| w[1] - w[0]).collect()
}

fn resolve_interval_bins(opts: &IntervalOptions, delays: &[f64]) -> Result<(f64, usize)> {
    let tmax = || -> Result<f64> {
        opts.tmax
            .or_else(|| delays.iter().copied().reduce(f64::max))
            .ok_or_else(|| {
                TimeStructureError::Configuration(
                    "interval histogram needs tmax or at least two arrivals".into(),
                )
            })
    };
    let (bin_time, bin_count) = match (opts.bin_time, opts.bin_count) {
        (Some(w), Some(c)) => (w, c),
        (Some(w), None) => (w, bin_count_for_width(tmax()?, w)?),
        (None, Some(c)) => (tmax()? / c as f64, c),
        (None, None) => (tmax()? / DEFAULT_INTERVAL_BINS as f64, DEFAULT_INTERVAL_BINS),
    };
    if bin_count == 0 || bin_count > MAX_BINS || !(bin_time.is_finite() && bin_time > 0.0) {
        return Err(TimeStructureError::InvalidArgument(format!(
            "interval bins must be positive, got {bin_count} bins of {bin_time} s"
        )));
    }
    Ok((bin_time, bin_count))
}

/// Histogram of delays between consecutive arrivals over `[0, bin_count * bin_time]`.
///
/// Bin `i` holds delays in `(i * bin_time, (i + 1) * bin_time]`; coincident
/// arrivals (zero delay) count towards the first bin. Longer delays are
/// excluded.
///
/// This differs from left-closed histogramming for delays that are exact
/// multiples of `bin_time`, as with turn-quantized arrivals: a delay of one
/// bin width shares bin 0 with zero delays, and every exact multiple `k`
/// lands in bin `k - 1`. Delays `[0, 1, 1]` with unit bins give `[3, 0, ..]`
/// where left-closed bins would give `[1, 2, ..]`.
pub fn intervals(times: &[f64], opts: &IntervalOptions) -> Result<IntervalHistogram> {
    let delays = delays(times);
    let (bin_time, bin_count) = resolve_interval_bins(opts, &delays)?;
    let t_hi = bin_count as f64 * bin_time;
    debug!("interval histogram of {bin_count} bins of {bin_time:e} s");

    let mut counts = vec![0usize; bin_count];
    for &d in &delays {
        if !(0.0..=t_hi).contains(&d) {
            continue;
        }
        let idx = if d == 0.0 {
            0
        } else {
            ((d / bin_time).ceil() as usize).saturating_sub(1)
        };
        counts[idx.min(bin_count - 1)] += 1;
    }
    let edges = (0..=bin_count).map(|i| i as f64 * bin_time).collect();
    Ok(IntervalHistogram {
        edges,
        counts,
        bin_time,
    })
}
