use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;
use spill_lib::{
    binning::{bin, time_histogram, TimeRange},
    config::{read_config, AnalysisConfig},
    io::{
        particles::{masked_field, read_particles_csv, ParticleSource, ParticleTable},
        text as text_io,
    },
    metrics::{
        intervals::{intervals, IntervalOptions},
        spectrum::{spectrum, Scaling},
        variability::variability,
    },
    signal::HistogramKind,
    timebase::{apply_mask, ReferenceFrame},
};
use spill_sim::{read_design, simulate_spill, write_bundle};
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "spill",
    version,
    about = "Spill time-structure analysis of particle arrival times"
)]
struct Cli {
    /// TOML file with analysis defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Newline-delimited arrival times in seconds (stdin if neither input is given)
    #[arg(long, conflicts_with = "particles")]
    input: Option<PathBuf>,
    /// Particle table CSV with at_turn and zeta columns
    #[arg(long)]
    particles: Option<PathBuf>,
    #[arg(long)]
    beta: Option<f64>,
    #[arg(long)]
    frev: Option<f64>,
    #[arg(long)]
    circumference: Option<f64>,
    /// First particle index to analyse
    #[arg(long)]
    mask_from: Option<usize>,
    /// One past the last particle index to analyse
    #[arg(long)]
    mask_to: Option<usize>,
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long)]
    range_min: Option<f64>,
    #[arg(long)]
    range_max: Option<f64>,
}

impl RangeArgs {
    fn range(&self) -> Option<TimeRange> {
        if self.range_min.is_none() && self.range_max.is_none() {
            return None;
        }
        Some(TimeRange {
            start: self.range_min,
            end: self.range_max,
        })
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Counts,
    Rate,
    Cumulative,
}

impl From<KindArg> for HistogramKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Counts => HistogramKind::Counts,
            KindArg::Rate => HistogramKind::Rate,
            KindArg::Cumulative => HistogramKind::Cumulative,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ScalingArg {
    Amplitude,
    #[value(alias = "pds")]
    Power,
}

impl From<ScalingArg> for Scaling {
    fn from(scaling: ScalingArg) -> Self {
        match scaling {
            ScalingArg::Amplitude => Scaling::Amplitude,
            ScalingArg::Power => Scaling::Power,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute particle arrival times from a particle table
    ArrivalTimes {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Bin arrival times into equal-width bins (counts, or mean of --what)
    Bin {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value_t = 100)]
        bins: usize,
        /// Particle column to average per bin
        #[arg(long, requires = "particles")]
        what: Option<String>,
    },
    /// Histogram of arrival times
    Hist {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, conflicts_with = "bin_count")]
        bin_time: Option<f64>,
        #[arg(long)]
        bin_count: Option<usize>,
        #[arg(long)]
        kind: Option<KindArg>,
        /// Normalize to the total particle count
        #[arg(long)]
        relative: bool,
    },
    /// Spectrum of the arrival-time structure
    Fft {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        fmax: Option<f64>,
        /// Particle column to average per time bin before the transform
        #[arg(long, requires = "particles")]
        what: Option<String>,
        #[arg(long)]
        scaling: Option<ScalingArg>,
        /// Report frequencies relative to the revolution frequency
        #[arg(long)]
        relative: bool,
    },
    /// Histogram of delays between consecutive particles
    Intervals {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        tmax: Option<f64>,
        #[arg(long)]
        bin_time: Option<f64>,
        #[arg(long)]
        bin_count: Option<usize>,
    },
    /// Spill variability (cv or duty factor) per evaluation window
    Variability {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, conflicts_with = "counting_bins")]
        counting_dt: Option<f64>,
        #[arg(long)]
        counting_bins: Option<usize>,
        #[arg(long, conflicts_with = "evaluate_bins")]
        evaluate_dt: Option<f64>,
        #[arg(long)]
        evaluate_bins: Option<usize>,
        /// cv or duty
        #[arg(long)]
        metric: Option<String>,
    },
    /// Generate a synthetic spill from a TOML design
    Simulate {
        #[arg(long)]
        design: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None => AnalysisConfig::default(),
    };
    match cli.command {
        Commands::ArrivalTimes { input } => cmd_arrival_times(&config, &input)?,
        Commands::Bin { input, bins, what } => cmd_bin(&config, &input, bins, what.as_deref())?,
        Commands::Hist {
            input,
            range,
            bin_time,
            bin_count,
            kind,
            relative,
        } => cmd_hist(
            &config,
            &input,
            range.range(),
            bin_time,
            bin_count,
            kind,
            relative,
        )?,
        Commands::Fft {
            input,
            fmax,
            what,
            scaling,
            relative,
        } => cmd_fft(&config, &input, fmax, what.as_deref(), scaling, relative)?,
        Commands::Intervals {
            input,
            tmax,
            bin_time,
            bin_count,
        } => cmd_intervals(&config, &input, tmax, bin_time, bin_count)?,
        Commands::Variability {
            input,
            range,
            counting_dt,
            counting_bins,
            evaluate_dt,
            evaluate_bins,
            metric,
        } => cmd_variability(
            &config,
            &input,
            range.range(),
            (counting_dt, counting_bins),
            (evaluate_dt, evaluate_bins),
            metric,
        )?,
        Commands::Simulate { design, out } => cmd_simulate(&design, &out)?,
    }
    Ok(())
}

/// Arrival times plus the particle table they were derived from, if any.
struct Loaded {
    times: Vec<f64>,
    table: Option<ParticleTable>,
    mask: Option<Vec<usize>>,
}

impl Loaded {
    fn what(&self, name: Option<&str>) -> Result<Option<Vec<f64>>> {
        match (name, &self.table) {
            (Some(name), Some(table)) => Ok(Some(masked_field(table, name, self.mask.as_deref())?)),
            (Some(name), None) => anyhow::bail!("--what {name} requires --particles"),
            (None, _) => Ok(None),
        }
    }
}

fn reference_frame(config: &AnalysisConfig, input: &InputArgs) -> ReferenceFrame {
    ReferenceFrame {
        beta: input.beta.or(config.reference.beta),
        frev: input.frev.or(config.reference.frev),
        circumference: input.circumference.or(config.reference.circumference),
    }
}

fn build_mask(input: &InputArgs, len: usize) -> Option<Vec<usize>> {
    if input.mask_from.is_none() && input.mask_to.is_none() {
        return None;
    }
    let to = input.mask_to.unwrap_or(len).min(len);
    Some((input.mask_from.unwrap_or(0)..to).collect())
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_times(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_times(&buf)
        }
    }
}

fn load(config: &AnalysisConfig, input: &InputArgs) -> Result<Loaded> {
    if let Some(path) = input.particles.as_deref() {
        let table = read_particles_csv(path)?;
        info!("loaded {} particles from {}", table.len(), path.display());
        let mask = build_mask(input, table.len());
        let times = reference_frame(config, input)
            .arrival_times(&table, mask.as_deref())
            .with_context(|| format!("arrival times for {}", path.display()))?;
        return Ok(Loaded {
            times,
            table: Some(table),
            mask,
        });
    }
    let samples = read_samples(input.input.as_deref())?;
    let mask = build_mask(input, samples.len());
    let times = match mask.as_deref() {
        Some(mask) => apply_mask(&samples, mask)?,
        None => samples,
    };
    Ok(Loaded {
        times,
        table: None,
        mask,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn cmd_arrival_times(config: &AnalysisConfig, input: &InputArgs) -> Result<()> {
    let loaded = load(config, input)?;
    print_json(&loaded.times)
}

fn cmd_bin(config: &AnalysisConfig, input: &InputArgs, bins: usize, what: Option<&str>) -> Result<()> {
    let loaded = load(config, input)?;
    let what = loaded.what(what)?;
    let series = bin(&loaded.times, bins, what.as_deref(), None)?;
    print_json(&series)
}

fn cmd_hist(
    config: &AnalysisConfig,
    input: &InputArgs,
    range: Option<TimeRange>,
    bin_time: Option<f64>,
    bin_count: Option<usize>,
    kind: Option<KindArg>,
    relative: bool,
) -> Result<()> {
    let mut section = config.histogram.clone();
    if bin_time.is_some() || bin_count.is_some() {
        section.bin_time = bin_time;
        section.bin_count = bin_count;
    }
    if let Some(kind) = kind {
        section.kind = Some(kind.into());
    }
    if relative {
        section.relative = Some(true);
    }
    section.range = range.or(section.range);
    let opts = section.options()?;
    let loaded = load(config, input)?;
    let hist = time_histogram(&loaded.times, &opts)?;
    info!("histogram of {} bins of {:e} s", hist.values.len(), hist.bin_time);
    print_json(&hist)
}

fn cmd_fft(
    config: &AnalysisConfig,
    input: &InputArgs,
    fmax: Option<f64>,
    what: Option<&str>,
    scaling: Option<ScalingArg>,
    relative: bool,
) -> Result<()> {
    let mut section = config.spectrum.clone();
    section.fmax = fmax.or(section.fmax);
    if let Some(scaling) = scaling {
        section.scaling = Some(scaling.into());
    }
    if relative {
        section.relative = Some(true);
    }
    let loaded = load(config, input)?;
    let frev = reference_frame(config, input).frev(
        loaded
            .table
            .as_ref()
            .and_then(|table| table.field("beta0")),
    )?;
    let opts = section.options(frev);
    let what = loaded.what(what)?;
    let spec = spectrum(&loaded.times, what.as_deref(), &opts)?;
    info!("spectrum of {} samples up to {} Hz", spec.n, spec.fmax);
    print_json(&spec)
}

fn cmd_intervals(
    config: &AnalysisConfig,
    input: &InputArgs,
    tmax: Option<f64>,
    bin_time: Option<f64>,
    bin_count: Option<usize>,
) -> Result<()> {
    let mut opts: IntervalOptions = config.intervals;
    opts.tmax = tmax.or(opts.tmax);
    if bin_time.is_some() || bin_count.is_some() {
        opts.bin_time = bin_time;
        opts.bin_count = bin_count;
    }
    let loaded = load(config, input)?;
    let hist = intervals(&loaded.times, &opts)?;
    print_json(&hist)
}

fn cmd_variability(
    config: &AnalysisConfig,
    input: &InputArgs,
    range: Option<TimeRange>,
    counting: (Option<f64>, Option<usize>),
    evaluate: (Option<f64>, Option<usize>),
    metric: Option<String>,
) -> Result<()> {
    let mut section = config.variability.clone();
    if counting.0.is_some() || counting.1.is_some() {
        (section.counting_dt, section.counting_bins) = counting;
    }
    if evaluate.0.is_some() || evaluate.1.is_some() {
        (section.evaluate_dt, section.evaluate_bins) = evaluate;
    }
    section.metric = metric.or(section.metric);
    section.range = range.or(section.range);
    let opts = section.options()?;
    let loaded = load(config, input)?;
    let series = variability(&loaded.times, &opts)?;
    info!(
        "{} over {} windows of {} counting bins",
        series.metric,
        series.values.len(),
        series.fine_bins_per_window
    );
    print_json(&series)
}

fn cmd_simulate(design: &Path, out: &Path) -> Result<()> {
    let design = read_design(design)?;
    let bundle = simulate_spill(&design)?;
    write_bundle(out, &bundle)?;
    info!("wrote spill bundle to {}", out.display());
    print_json(&bundle.manifest)
}
