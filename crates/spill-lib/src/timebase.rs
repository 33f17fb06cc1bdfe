//! Particle arrival times from longitudinal coordinates.
//!
//! The arrival time of a particle is `at_turn / frev - zeta / beta / c0`.
//! A positive `zeta` means the particle is ahead of the reference particle
//! and therefore arrives earlier.

use crate::error::{Result, TimeStructureError};
use crate::io::particles::{masked_field, ParticleSource};
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Speed of light in m/s
pub const C0: f64 = 299_792_458.0;

/// Compute the arrival time of each particle.
///
/// `frev` is only required when some particle has a nonzero turn index.
pub fn arrival_time<T>(turn: &[T], zeta: &[f64], beta: f64, frev: Option<f64>) -> Result<Vec<f64>>
where
    T: ToPrimitive + Zero + Copy,
{
    if turn.len() != zeta.len() {
        return Err(TimeStructureError::LengthMismatch {
            what: "turn",
            expected: zeta.len(),
            actual: turn.len(),
        });
    }
    if !(beta.is_finite() && beta > 0.0) {
        return Err(TimeStructureError::InvalidArgument(format!(
            "beta must be positive, got {beta}"
        )));
    }
    let frev = match frev {
        Some(f) if !(f.is_finite() && f > 0.0) => {
            return Err(TimeStructureError::InvalidArgument(format!(
                "frev must be positive, got {f}"
            )))
        }
        Some(f) => Some(f),
        None if turn.iter().any(|t| !t.is_zero()) => {
            return Err(TimeStructureError::Configuration(
                "arrival time requires frev when turn>0 for circular lines".into(),
            ))
        }
        None => None,
    };

    let mut times = Vec::with_capacity(zeta.len());
    for (t, z) in turn.iter().zip(zeta) {
        let mut time = -z / beta / C0;
        if let Some(frev) = frev {
            let t = t.to_f64().ok_or_else(|| {
                TimeStructureError::InvalidArgument("turn index is not representable as f64".into())
            })?;
            time += t / frev;
        }
        times.push(time);
    }
    Ok(times)
}

/// Reference particle parameters, each optional and derivable from the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    /// Relativistic beta
    pub beta: Option<f64>,
    /// Revolution frequency (Hz) for circular lines
    pub frev: Option<f64>,
    /// Path length of a circular line (m)
    pub circumference: Option<f64>,
}

impl ReferenceFrame {
    /// Resolve beta from the frame, falling back to a per-particle `beta0`.
    pub fn beta(&self, beta0: Option<&[f64]>) -> Result<f64> {
        if let Some(beta) = self.beta {
            return Ok(beta);
        }
        if let (Some(frev), Some(circumference)) = (self.frev, self.circumference) {
            return Ok(frev * circumference / C0);
        }
        match beta0 {
            Some(values) if !values.is_empty() => constant_beta0(values),
            _ => Err(TimeStructureError::Configuration(
                "arrival time requires beta: pass beta, beta0 or both frev and circumference".into(),
            )),
        }
    }

    /// Resolve the revolution frequency, if the line is circular.
    pub fn frev(&self, beta0: Option<&[f64]>) -> Result<Option<f64>> {
        if let Some(frev) = self.frev {
            return Ok(Some(frev));
        }
        match self.circumference {
            Some(circumference) => Ok(Some(self.beta(beta0)? * C0 / circumference)),
            None => Ok(None),
        }
    }

    /// Arrival times of the (masked) particles of `source`.
    ///
    /// Reads the `at_turn` and `zeta` fields, and `beta0` when present.
    pub fn arrival_times<S: ParticleSource + ?Sized>(
        &self,
        source: &S,
        mask: Option<&[usize]>,
    ) -> Result<Vec<f64>> {
        let turn = masked_field(source, "at_turn", mask)?;
        let zeta = masked_field(source, "zeta", mask)?;
        let beta0 = source.field("beta0");
        let beta = self.beta(beta0)?;
        let frev = if turn.iter().any(|t| *t != 0.0) {
            self.frev(beta0)?
        } else {
            None
        };
        arrival_time(&turn, &zeta, beta, frev)
    }
}

fn constant_beta0(values: &[f64]) -> Result<f64> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let close = values
        .iter()
        .all(|b| (b - mean).abs() <= 1e-8 + 1e-5 * mean.abs());
    if !close {
        return Err(TimeStructureError::Configuration(
            "particle beta0 is not constant; specify beta explicitly".into(),
        ));
    }
    Ok(mean)
}

/// Wrap `zeta` into `[-C/2, C/2)` of the machine circumference.
pub fn wrap_zeta(zeta: &[f64], circumference: f64) -> Vec<f64> {
    let half = circumference / 2.0;
    zeta.iter()
        .map(|z| (z + half).rem_euclid(circumference) - half)
        .collect()
}

/// Select `values` at the given indices.
pub fn apply_mask(values: &[f64], mask: &[usize]) -> Result<Vec<f64>> {
    mask.iter()
        .map(|&i| {
            values.get(i).copied().ok_or_else(|| {
                TimeStructureError::InvalidArgument(format!(
                    "mask index {i} out of range for {} particles",
                    values.len()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::particles::ParticleTable;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    #[test]
    fn zeta_ahead_arrives_earlier() {
        let times = arrival_time(&[0i64, 0], &[1.0, -1.0], 0.5, None).unwrap();
        assert_close(times[0], -1.0 / 0.5 / C0, 1e-20);
        assert!(times[0] < 0.0 && times[1] > 0.0);
    }

    #[test]
    fn turns_add_revolution_periods() {
        let times = arrival_time(&[0.0, 2.0, 5.0], &[0.0, 0.0, 0.0], 1.0, Some(1e6)).unwrap();
        assert_close(times[1], 2e-6, 1e-18);
        assert_close(times[2], 5e-6, 1e-18);
    }

    #[test]
    fn nonzero_turn_without_frev_is_configuration_error() {
        let err = arrival_time(&[0u32, 1], &[0.0, 0.0], 1.0, None).unwrap_err();
        assert!(matches!(err, TimeStructureError::Configuration(_)));
        assert!(err.to_string().contains("requires frev"));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = arrival_time(&[0u32], &[0.0, 0.0], 1.0, None).unwrap_err();
        assert!(matches!(err, TimeStructureError::LengthMismatch { .. }));
    }

    #[test]
    fn beta_derived_from_frev_and_circumference() {
        let frame = ReferenceFrame {
            beta: None,
            frev: Some(1e6),
            circumference: Some(100.0),
        };
        assert_close(frame.beta(None).unwrap(), 1e8 / C0, 1e-12);
    }

    #[test]
    fn frev_derived_from_beta_and_circumference() {
        let frame = ReferenceFrame {
            beta: Some(0.5),
            frev: None,
            circumference: Some(C0),
        };
        assert_close(frame.frev(None).unwrap().unwrap(), 0.5, 1e-12);
        assert_eq!(ReferenceFrame::default().frev(None).unwrap(), None);
    }

    #[test]
    fn beta0_must_be_constant() {
        let frame = ReferenceFrame::default();
        assert_close(frame.beta(Some(&[0.3, 0.3, 0.3][..])).unwrap(), 0.3, 1e-12);
        let err = frame.beta(Some(&[0.3, 0.4][..])).unwrap_err();
        assert!(matches!(err, TimeStructureError::Configuration(_)));
        assert!(frame.beta(None).is_err());
    }

    #[test]
    fn arrival_times_from_particle_table() {
        let table = ParticleTable::new()
            .with_column("at_turn", vec![0.0, 1.0, 3.0])
            .unwrap()
            .with_column("zeta", vec![0.0, 0.0, -C0 * 1e-7])
            .unwrap();
        let frame = ReferenceFrame {
            beta: Some(1.0),
            frev: Some(1e6),
            circumference: None,
        };
        let times = frame.arrival_times(&table, Some(&[2, 1][..])).unwrap();
        assert_close(times[0], 3e-6 + 1e-7, 1e-15);
        assert_close(times[1], 1e-6, 1e-15);
    }

    #[test]
    fn wraps_zeta_at_circumference() {
        let wrapped = wrap_zeta(&[0.0, 60.0, -60.0, 250.0], 200.0);
        assert_close(wrapped[0], 0.0, 1e-12);
        assert_close(wrapped[1], 60.0, 1e-12);
        assert_close(wrapped[2], -60.0, 1e-12);
        assert_close(wrapped[3], 50.0, 1e-12);
    }

    #[test]
    fn mask_out_of_range_is_rejected() {
        assert!(apply_mask(&[1.0, 2.0], &[2]).is_err());
        assert_eq!(apply_mask(&[1.0, 2.0], &[1, 1]).unwrap(), vec![2.0, 2.0]);
    }
}
