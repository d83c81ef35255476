// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Dimensionality, WaveType};
use crate::material::ElasticProperties;
use crate::model::ModelSummary;

/// Displacement along the source-receiver line at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Completed step count when the snapshot was taken.
    pub step: usize,
    /// Simulation time (s).
    pub time: f64,
    /// Displacement per cell along the test axis.
    pub displacement: Vec<f64>,
}

/// A value in the flat key/value view of a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    /// A scalar quantity.
    Number(f64),
    /// A label.
    Text(String),
    /// A sampled series.
    Series(Vec<f64>),
}

/// Everything a completed run reports. Created once and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    /// Wave excited by the run.
    pub wave_type: WaveType,
    /// Integrator used.
    pub dimensionality: Dimensionality,
    /// Backend that ran the kernels.
    pub backend: String,
    /// Reported compressional velocity (m/s).
    pub p_wave_velocity: f64,
    /// Reported shear velocity (m/s).
    pub s_wave_velocity: f64,
    /// `p_wave_velocity / s_wave_velocity`.
    pub vp_vs_ratio: f64,
    /// P arrival time (s).
    pub p_arrival_time: f64,
    /// S arrival time (s).
    pub s_arrival_time: f64,
    /// True when this run's own wave was picked from the trace.
    pub arrival_measured: bool,
    /// Material properties used for the run.
    pub properties: ElasticProperties,
    /// Largest absolute receiver displacement.
    pub max_displacement: f64,
    /// Source-receiver distance (m).
    pub distance: f64,
    /// Grid cells per axis.
    pub grid_shape: [usize; 3],
    /// Grid spacing (m).
    pub grid_spacing: f64,
    /// Time step (s).
    pub dt: f64,
    /// Steps actually simulated.
    pub time_steps: usize,
    /// Source frequency (kHz).
    pub frequency_khz: f64,
    /// Source amplitude.
    pub amplitude: f64,
    /// Source energy, echoed from the configuration.
    pub energy: f64,
    /// Confining pressure (MPa).
    pub confining_pressure: f64,
    /// Voxelized model coverage, for 3D runs.
    pub model: Option<ModelSummary>,
    /// Receiver displacement per step.
    pub trace: Vec<f64>,
    /// Simulation time per trace sample (s).
    pub times: Vec<f64>,
    /// Archived displacement lines.
    pub snapshots: Vec<Snapshot>,
    /// Wall-clock time spent in the run.
    pub duration: Duration,
}

impl SimulationResult {
    /// Reported velocity for `wave` (m/s).
    pub fn velocity(&self, wave: WaveType) -> f64 {
        match wave {
            WaveType::P => self.p_wave_velocity,
            WaveType::S => self.s_wave_velocity,
        }
    }

    /// Reported arrival time for `wave` (s).
    pub fn arrival_time(&self, wave: WaveType) -> f64 {
        match wave {
            WaveType::P => self.p_arrival_time,
            WaveType::S => self.s_arrival_time,
        }
    }

    /// Flat key/value view for callers that store results as named values.
    pub fn to_map(&self) -> BTreeMap<String, ResultValue> {
        use ResultValue::{Number, Series, Text};

        let p = &self.properties;
        let entries = [
            ("WaveType", Text(self.wave_type.to_string())),
            ("RockType", Text(p.rock_type.to_string())),
            ("Backend", Text(self.backend.clone())),
            ("PWaveVelocity", Number(self.p_wave_velocity)),
            ("SWaveVelocity", Number(self.s_wave_velocity)),
            ("VpVsRatio", Number(self.vp_vs_ratio)),
            ("PWaveArrivalTime", Number(self.p_arrival_time)),
            ("SWaveArrivalTime", Number(self.s_arrival_time)),
            ("TheoreticalVp", Number(p.vp)),
            ("TheoreticalVs", Number(p.vs)),
            ("YoungModulus", Number(p.young_modulus)),
            ("PoissonRatio", Number(p.poisson_ratio)),
            ("BulkModulus", Number(p.bulk_modulus)),
            ("ShearModulus", Number(p.shear_modulus)),
            ("Attenuation", Number(p.attenuation)),
            ("Density", Number(p.density)),
            ("MaxDisplacement", Number(self.max_displacement)),
            ("Distance", Number(self.distance)),
            ("GridSpacing", Number(self.grid_spacing)),
            ("TimeStep", Number(self.dt)),
            ("TimeSteps", Number(self.time_steps as f64)),
            ("Frequency", Number(self.frequency_khz)),
            ("Amplitude", Number(self.amplitude)),
            ("Energy", Number(self.energy)),
            ("ConfiningPressure", Number(self.confining_pressure)),
            ("SimulationTime", Number(self.duration.as_secs_f64())),
            ("Displacement", Series(self.trace.clone())),
            ("Time", Series(self.times.clone())),
        ];
        let mut map: BTreeMap<String, ResultValue> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        if let Some(m) = &self.model {
            map.insert("RockCells".to_string(), Number(m.rock_cells as f64));
            map.insert("RockVelocity".to_string(), Number(m.mean_rock_velocity));
            map.insert("RockDensity".to_string(), Number(m.mean_rock_density));
        }
        map
    }

    /// Snapshot closest to simulation time `t`.
    pub fn snapshot_at(&self, t: f64) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .min_by(|a, b| (a.time - t).abs().total_cmp(&(b.time - t).abs()))
    }
}
