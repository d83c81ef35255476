// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AcousticError, Result};

/// Minimum number of time steps a run accepts.
pub const MIN_TIME_STEPS: usize = 10;

/// Which body wave the source excites and the picker measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveType {
    /// Compressional wave.
    #[serde(rename = "P-Wave", alias = "P", alias = "p")]
    P,
    /// Shear wave.
    #[serde(rename = "S-Wave", alias = "S", alias = "s")]
    S,
}

impl fmt::Display for WaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveType::P => write!(f, "P-Wave"),
            WaveType::S => write!(f, "S-Wave"),
        }
    }
}

/// Dimensionality of the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dimensionality {
    /// Homogeneous line along the test axis.
    #[default]
    #[serde(rename = "1d")]
    One,
    /// Full voxelized velocity model.
    #[serde(rename = "3d")]
    Three,
}

/// Requested compute backend. `Parallel` falls back to `Serial` when allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Rayon thread pool.
    #[default]
    Parallel,
    /// Single-threaded reference backend.
    Serial,
}

/// Results of an earlier tri-axial compression test on the same sample.
///
/// Moduli are in GPa, pressures in MPa.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TriaxialResult {
    /// Young's modulus (GPa).
    pub young_modulus: Option<f64>,
    /// Poisson ratio.
    pub poisson_ratio: Option<f64>,
    /// Breaking (peak) pressure (MPa).
    pub breaking_pressure: Option<f64>,
    /// Confining pressure the test ran at (MPa).
    pub confining_pressure: Option<f64>,
}

impl TriaxialResult {
    /// Build from the collaborator's key/value map.
    ///
    /// Recognised keys are `YoungModulus`, `PoissonRatio`, `BreakingPressure` and
    /// `ConfiningPressure`; others are ignored. Non-finite values are rejected.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self> {
        let get = |key: &str| -> Result<Option<f64>> {
            match map.get(key) {
                Some(v) if !v.is_finite() => Err(AcousticError::InvalidConfig(format!(
                    "tri-axial value {} is not finite: {}",
                    key, v
                ))),
                Some(v) => Ok(Some(*v)),
                None => Ok(None),
            }
        };
        Ok(TriaxialResult {
            young_modulus: get("YoungModulus")?,
            poisson_ratio: get("PoissonRatio")?,
            breaking_pressure: get("BreakingPressure")?,
            confining_pressure: get("ConfiningPressure")?,
        })
    }

    /// Young's modulus and Poisson ratio, when both are present and usable.
    pub fn elastic_pair(&self) -> Option<(f64, f64)> {
        match (self.young_modulus, self.poisson_ratio) {
            (Some(e), Some(nu)) if e > 0.0 => Some((e, nu)),
            _ => None,
        }
    }

    /// Breaking pressure when present and positive.
    pub fn breaking_pressure(&self) -> Option<f64> {
        self.breaking_pressure.filter(|p| *p > 0.0)
    }

    /// Confining pressure of the test when present and not negative.
    pub fn confining_pressure(&self) -> Option<f64> {
        self.confining_pressure.filter(|p| *p >= 0.0)
    }
}

/// Rock sample material as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Free-form name; matched against the rock table by substring.
    pub name: String,
    /// Bulk density (kg/m³).
    pub density: f64,
}

impl Material {
    /// Create a material record.
    pub fn new(name: impl Into<String>, density: f64) -> Self {
        Material {
            name: name.into(),
            density,
        }
    }
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Confining pressure (MPa).
    pub confining_pressure: f64,
    /// Wave type excited by the source.
    pub wave_type: WaveType,
    /// Number of time steps.
    pub time_steps: usize,
    /// Source dominant frequency (kHz).
    pub frequency_khz: f64,
    /// Source amplitude.
    pub amplitude: f64,
    /// Source energy (J); echoed into results and diagnostics.
    pub energy: f64,
    /// Propagation direction; the dominant component selects the grid axis.
    pub test_axis: [f64; 3],
    /// Stretch the step count to cover slow arrivals.
    pub extended_time: bool,
    /// Integrator dimensionality.
    pub dimensionality: Dimensionality,
    /// Steps per progress batch.
    pub batch_size: usize,
    /// Steps between archived displacement snapshots.
    pub snapshot_interval: usize,
    /// Compute backend preference.
    pub backend: BackendPreference,
    /// Worker threads for the parallel backend (defaults to all cores).
    pub threads: Option<usize>,
    /// Fall back to the serial backend if the parallel one cannot start.
    pub allow_cpu_fallback: bool,
    /// Prior tri-axial test results for this sample.
    pub triaxial: Option<TriaxialResult>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            confining_pressure: 0.0,
            wave_type: WaveType::P,
            time_steps: 1000,
            frequency_khz: 500.0,
            amplitude: 1.0,
            energy: 1.0,
            test_axis: [1.0, 0.0, 0.0],
            extended_time: false,
            dimensionality: Dimensionality::One,
            batch_size: 25,
            snapshot_interval: 10,
            backend: BackendPreference::Parallel,
            threads: None,
            allow_cpu_fallback: true,
            triaxial: None,
        }
    }
}

impl SimulationConfig {
    /// Check scalar inputs. Performs no allocation.
    pub fn validate(&self) -> Result<()> {
        if !self.frequency_khz.is_finite() || self.frequency_khz <= 0.0 {
            return Err(AcousticError::InvalidFrequency(self.frequency_khz));
        }
        if self.time_steps < MIN_TIME_STEPS {
            return Err(AcousticError::TooFewTimeSteps {
                got: self.time_steps,
                min: MIN_TIME_STEPS,
            });
        }
        if !self.amplitude.is_finite() || self.amplitude <= 0.0 {
            return Err(AcousticError::InvalidAmplitude(self.amplitude));
        }
        let axis = self.test_axis;
        if axis.iter().any(|c| !c.is_finite()) || axis.iter().all(|c| *c == 0.0) {
            return Err(AcousticError::InvalidTestAxis(axis));
        }
        if !self.confining_pressure.is_finite() {
            return Err(AcousticError::InvalidConfig(format!(
                "confining pressure is not finite: {}",
                self.confining_pressure
            )));
        }
        if !(20..=50).contains(&self.batch_size) {
            return Err(AcousticError::InvalidConfig(format!(
                "batch size {} outside 20..=50",
                self.batch_size
            )));
        }
        if !(5..=10).contains(&self.snapshot_interval) {
            return Err(AcousticError::InvalidConfig(format!(
                "snapshot interval {} outside 5..=10",
                self.snapshot_interval
            )));
        }
        if self.threads == Some(0) {
            return Err(AcousticError::InvalidConfig(
                "thread count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Source frequency in Hz.
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_khz * 1000.0
    }

    /// Confining pressure for the run (MPa).
    ///
    /// An explicit non-zero setting wins; otherwise the tri-axial test's
    /// confining pressure is used when it has one.
    pub fn effective_confining_pressure(&self) -> f64 {
        if self.confining_pressure != 0.0 {
            return self.confining_pressure;
        }
        self.triaxial
            .as_ref()
            .and_then(TriaxialResult::confining_pressure)
            .unwrap_or(0.0)
    }

    /// Grid axis (0, 1 or 2) of the dominant test-axis component.
    pub fn axis_index(&self) -> usize {
        let a = self.test_axis;
        let mut best = 0;
        for d in 1..3 {
            if a[d].abs() > a[best].abs() {
                best = d;
            }
        }
        best
    }
}
