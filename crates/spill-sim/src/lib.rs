use anyhow::{bail, Context, Result};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use spill_lib::io::particles::{write_particles_csv, ParticleTable};
use spill_lib::timebase::C0;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SpillDesign {
    pub name: String,
    pub particles: usize,
    pub duration_s: f64,
    pub frev: f64,
    pub beta: f64,
    #[serde(default)]
    pub ripple: Option<RippleSpec>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Sinusoidal modulation of the extraction rate.
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct RippleSpec {
    pub frequency_hz: f64,
    /// Relative modulation depth in `[0, 1]`
    pub amplitude: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpillManifest {
    pub name: String,
    pub particles: usize,
    pub duration_s: f64,
    pub frev: f64,
    pub beta: f64,
    pub turns: u64,
    pub seed: Option<u64>,
    pub ripple_hz: Option<f64>,
    pub ripple_amplitude: Option<f64>,
    pub generated_unix: f64,
}

pub struct SpillBundle {
    pub table: ParticleTable,
    /// Arrival times the table encodes, in ascending order
    pub times: Vec<f64>,
    pub manifest: SpillManifest,
}

pub fn read_design(path: &Path) -> Result<SpillDesign> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read design {}", path.display()))?;
    let design: SpillDesign =
        toml::from_str(&contents).with_context(|| format!("parsing design {}", path.display()))?;
    Ok(design)
}

fn validate(design: &SpillDesign) -> Result<()> {
    if design.particles == 0 {
        bail!("design {} has no particles", design.name);
    }
    if !(design.duration_s > 0.0 && design.frev > 0.0) {
        bail!("duration_s and frev must be positive");
    }
    if !(design.beta > 0.0 && design.beta <= 1.0) {
        bail!("beta must be in (0, 1], got {}", design.beta);
    }
    if let Some(ripple) = design.ripple {
        if !(0.0..=1.0).contains(&ripple.amplitude) {
            bail!("ripple amplitude must be in [0, 1], got {}", ripple.amplitude);
        }
    }
    Ok(())
}

/// Draw arrival times for the design and encode them as `at_turn`/`zeta`.
pub fn simulate_spill(design: &SpillDesign) -> Result<SpillBundle> {
    validate(design)?;
    let mut rng = StdRng::seed_from_u64(design.seed.unwrap_or(0));
    let (ripple_hz, depth) = design
        .ripple
        .map(|r| (r.frequency_hz, r.amplitude))
        .unwrap_or((0.0, 0.0));

    let mut times = Vec::with_capacity(design.particles);
    while times.len() < design.particles {
        let t = rng.gen_range(0.0..design.duration_s);
        let rate = 1.0 + depth * (2.0 * PI * ripple_hz * t).sin();
        if rng.gen::<f64>() * (1.0 + depth) < rate {
            times.push(t);
        }
    }
    times.sort_by(|a, b| a.total_cmp(b));

    let mut turns = Vec::with_capacity(times.len());
    let mut zetas = Vec::with_capacity(times.len());
    for &t in &times {
        let turn = (t * design.frev).floor();
        let within_turn = t - turn / design.frev;
        turns.push(turn);
        zetas.push(-within_turn * design.beta * C0);
    }
    let last_turn = turns.last().copied().unwrap_or(0.0) as u64;
    let table = ParticleTable::new()
        .with_column("at_turn", turns)?
        .with_column("zeta", zetas)?;
    info!(
        "simulated {} particles over {} turns for {}",
        times.len(),
        last_turn + 1,
        design.name
    );

    let generated_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64())
        .unwrap_or(0.0);
    let manifest = SpillManifest {
        name: design.name.clone(),
        particles: times.len(),
        duration_s: design.duration_s,
        frev: design.frev,
        beta: design.beta,
        turns: last_turn + 1,
        seed: design.seed,
        ripple_hz: design.ripple.map(|r| r.frequency_hz),
        ripple_amplitude: design.ripple.map(|r| r.amplitude),
        generated_unix,
    };
    Ok(SpillBundle {
        table,
        times,
        manifest,
    })
}

/// Write `particles.csv` and `spill.json` into `dir`.
pub fn write_bundle(dir: &Path, bundle: &SpillBundle) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write_particles_csv(&dir.join("particles.csv"), &bundle.table)?;
    write_manifest(&dir.join("spill.json"), &bundle.manifest)
}

pub fn write_manifest(path: &Path, manifest: &SpillManifest) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, manifest)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<SpillManifest> {
    let file =
        fs::File::open(path).with_context(|| format!("opening manifest {}", path.display()))?;
    let manifest = serde_json::from_reader::<_, SpillManifest>(file)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(manifest)
}
