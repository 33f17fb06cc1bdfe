use crate::binning::{BinSpec, HistogramOptions, TimeRange, DEFAULT_BIN_COUNT};
use crate::error::Result as EngineResult;
use crate::metrics::intervals::IntervalOptions;
use crate::metrics::spectrum::{Scaling, SpectrumOptions};
use crate::metrics::variability::{
    Metric, VariabilityOptions, DEFAULT_COUNTING_BINS, DEFAULT_EVALUATE_BINS,
};
use crate::signal::HistogramKind;
use crate::timebase::ReferenceFrame;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Analysis defaults loaded from a TOML file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub reference: ReferenceFrame,
    #[serde(default)]
    pub histogram: HistogramSection,
    #[serde(default)]
    pub spectrum: SpectrumSection,
    #[serde(default)]
    pub intervals: IntervalOptions,
    #[serde(default)]
    pub variability: VariabilitySection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSection {
    #[serde(default)]
    pub bin_time: Option<f64>,
    #[serde(default)]
    pub bin_count: Option<usize>,
    #[serde(default)]
    pub kind: Option<HistogramKind>,
    #[serde(default)]
    pub relative: Option<bool>,
    #[serde(default)]
    pub range: Option<TimeRange>,
}

impl HistogramSection {
    pub fn options(&self) -> EngineResult<HistogramOptions> {
        Ok(HistogramOptions {
            bins: BinSpec::from_options(self.bin_time, self.bin_count, DEFAULT_BIN_COUNT)?,
            range: self.range,
            kind: self.kind.unwrap_or_default(),
            relative: self.relative.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSection {
    #[serde(default)]
    pub fmax: Option<f64>,
    #[serde(default)]
    pub scaling: Option<Scaling>,
    #[serde(default)]
    pub relative: Option<bool>,
}

impl SpectrumSection {
    pub fn options(&self, frev: Option<f64>) -> SpectrumOptions {
        SpectrumOptions {
            fmax: self.fmax,
            frev,
            scaling: self.scaling.unwrap_or_default(),
            relative: self.relative.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariabilitySection {
    #[serde(default)]
    pub counting_dt: Option<f64>,
    #[serde(default)]
    pub counting_bins: Option<usize>,
    #[serde(default)]
    pub evaluate_dt: Option<f64>,
    #[serde(default)]
    pub evaluate_bins: Option<usize>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub range: Option<TimeRange>,
}

impl VariabilitySection {
    pub fn options(&self) -> EngineResult<VariabilityOptions> {
        let metric = match self.metric.as_deref() {
            Some(name) => name.parse::<Metric>()?,
            None => Metric::default(),
        };
        Ok(VariabilityOptions {
            counting: BinSpec::from_options(
                self.counting_dt,
                self.counting_bins,
                DEFAULT_COUNTING_BINS,
            )?,
            evaluate: BinSpec::from_options(
                self.evaluate_dt,
                self.evaluate_bins,
                DEFAULT_EVALUATE_BINS,
            )?,
            metric,
            range: self.range,
        })
    }
}

pub fn parse_config(text: &str) -> Result<AnalysisConfig> {
    toml::from_str(text).context("parsing analysis config")
}

pub fn read_config(path: &Path) -> Result<AnalysisConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("in {}", path.display()))
}
