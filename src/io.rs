// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Material, SimulationConfig, TriaxialResult};
use crate::error::Result;
use crate::mesh::Mesh;
use crate::result::SimulationResult;

/// A complete run description read from JSON.
///
/// `triaxial` takes the key/value form produced by a tri-axial test
/// (`YoungModulus`, `PoissonRatio`, `BreakingPressure`, `ConfiningPressure`) and
/// overrides `config.triaxial` when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    /// Sample material.
    pub material: Material,
    /// Sample geometry in metres.
    pub mesh: Mesh,
    /// Run configuration. Missing fields take their defaults.
    #[serde(default)]
    pub config: SimulationConfig,
    /// Tri-axial results as a named-value map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triaxial: Option<HashMap<String, f64>>,
}

impl JobFile {
    /// Parse a job from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a job from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Split into run inputs, folding the tri-axial map into the config.
    pub fn into_parts(self) -> Result<(Material, Mesh, SimulationConfig)> {
        let mut config = self.config;
        if let Some(map) = &self.triaxial {
            config.triaxial = Some(TriaxialResult::from_map(map)?);
        }
        Ok((self.material, self.mesh, config))
    }
}

/// Write the plain-text diagnostic dump: echoed parameters, measured values and
/// the receiver trace as `time displacement` rows.
pub fn write_diagnostics<W: Write>(
    w: &mut W,
    material: &Material,
    result: &SimulationResult,
) -> Result<()> {
    let p = &result.properties;
    writeln!(w, "# acoustic-fdtd diagnostic dump")?;
    writeln!(
        w,
        "# material: {} (density {} kg/m^3, rock type {})",
        material.name, material.density, p.rock_type
    )?;
    writeln!(w, "# wave type: {}", result.wave_type)?;
    writeln!(w, "# frequency: {} kHz", result.frequency_khz)?;
    writeln!(w, "# amplitude: {}", result.amplitude)?;
    writeln!(w, "# energy: {}", result.energy)?;
    writeln!(w, "# confining pressure: {} MPa", result.confining_pressure)?;
    writeln!(
        w,
        "# grid: {}x{}x{} spacing {:.6e} m, distance {:.6e} m",
        result.grid_shape[0],
        result.grid_shape[1],
        result.grid_shape[2],
        result.grid_spacing,
        result.distance
    )?;
    writeln!(w, "# dt: {:.6e} s, steps: {}", result.dt, result.time_steps)?;
    writeln!(w, "# backend: {}", result.backend)?;
    if let Some(m) = &result.model {
        writeln!(
            w,
            "# model: {} of {} cells rock, mean velocity {:.2} m/s, mean density {:.2} kg/m^3",
            m.rock_cells, m.total_cells, m.mean_rock_velocity, m.mean_rock_density
        )?;
    }
    writeln!(w, "# theoretical: Vp {:.2} m/s, Vs {:.2} m/s", p.vp, p.vs)?;
    writeln!(
        w,
        "# reported: Vp {:.2} m/s, Vs {:.2} m/s, Vp/Vs {:.4}",
        result.p_wave_velocity, result.s_wave_velocity, result.vp_vs_ratio
    )?;
    writeln!(
        w,
        "# arrivals: P {:.6e} s, S {:.6e} s ({})",
        result.p_arrival_time,
        result.s_arrival_time,
        if result.arrival_measured { "picked" } else { "fallback" }
    )?;
    writeln!(w, "# max displacement: {:.6e}", result.max_displacement)?;
    writeln!(w, "# time_s displacement")?;
    for (t, u) in result.times.iter().zip(&result.trace) {
        writeln!(w, "{:.9e} {:.9e}", t, u)?;
    }
    Ok(())
}

/// Write the diagnostic dump to a file.
pub fn save_diagnostics(path: &Path, material: &Material, result: &SimulationResult) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);
    write_diagnostics(&mut w, material, result)?;
    w.flush()?;
    Ok(())
}

/// Write the result's key/value map as pretty JSON.
pub fn save_result_json(path: &Path, result: &SimulationResult) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, &result.to_map())?;
    w.flush()?;
    Ok(())
}
