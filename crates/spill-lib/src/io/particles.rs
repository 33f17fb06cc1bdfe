use crate::error::{Result as EngineResult, TimeStructureError};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::path::Path;

/// Access to per-particle fields as flat numeric arrays.
pub trait ParticleSource {
    /// Number of particles.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The named field, one value per particle, or `None` if absent.
    fn field(&self, name: &str) -> Option<&[f64]>;
}

/// Fetch a field and select the masked indices (all particles without a mask).
pub fn masked_field<S: ParticleSource + ?Sized>(
    source: &S,
    name: &str,
    mask: Option<&[usize]>,
) -> EngineResult<Vec<f64>> {
    let values = source
        .field(name)
        .ok_or_else(|| TimeStructureError::MissingField(name.to_string()))?;
    match mask {
        Some(mask) => crate::timebase::apply_mask(values, mask),
        None => Ok(values.to_vec()),
    }
}

/// Column-oriented particle table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleTable {
    columns: Vec<(String, Vec<f64>)>,
    len: usize,
}

impl ParticleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column. All columns must have the same length.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> EngineResult<()> {
        let name = name.into();
        if !self.columns.is_empty() && values.len() != self.len {
            return Err(TimeStructureError::LengthMismatch {
                what: "particle column",
                expected: self.len,
                actual: values.len(),
            });
        }
        self.len = values.len();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name, values)),
        }
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> EngineResult<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

impl ParticleSource for ParticleTable {
    fn len(&self) -> usize {
        self.len
    }

    fn field(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }
}

/// Read a particle table from CSV with a header row; every column must be numeric.
pub fn read_particles_csv(path: &Path) -> Result<ParticleTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening particles {}", path.display()))?;
    let headers = reader.headers().context("reading header")?.clone();
    let mut data: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading particle row {}", row + 1))?;
        for (col, values) in data.iter_mut().enumerate() {
            values.push(parse_cell(&record, &headers, col, row)?);
        }
    }
    let mut table = ParticleTable::new();
    for (name, values) in headers.iter().zip(data) {
        table.insert_column(name, values)?;
    }
    Ok(table)
}

fn parse_cell(record: &StringRecord, headers: &StringRecord, col: usize, row: usize) -> Result<f64> {
    let name = headers.get(col).unwrap_or("?");
    let raw = record
        .get(col)
        .ok_or_else(|| anyhow::anyhow!("row {} is missing column {}", row + 1, name))?;
    raw.parse::<f64>()
        .with_context(|| format!("row {} column {} is not f64: {}", row + 1, name, raw))
}

/// Write a particle table as CSV with a header row.
pub fn write_particles_csv(path: &Path, table: &ParticleTable) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(table.column_names())?;
    for row in 0..table.len() {
        writer.write_record(table.columns.iter().map(|(_, values)| values[row].to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
