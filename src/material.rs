// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Rock-type lookup and elastic property estimation.

use serde::Serialize;

use crate::config::{TriaxialResult, WaveType};
use crate::error::{AcousticError, Result};

const GPA: f64 = 1.0e9;

const YOUNG_DENSITY_EXPONENT: f64 = 1.3;
const POISSON_DENSITY_EXPONENT: f64 = 0.1;
const BULK_DENSITY_EXPONENT: f64 = 1.2;
const SHEAR_DENSITY_EXPONENT: f64 = 1.4;

/// Velocity boost per MPa of confining pressure.
const PRESSURE_SENSITIVITY: f64 = 0.002;

const POISSON_RANGE: (f64, f64) = (0.05, 0.45);
const VP_RANGE: (f64, f64) = (1500.0, 8000.0);
const VS_RANGE: (f64, f64) = (600.0, 4500.0);

/// Base elastic properties of a rock type at its reference density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RockType {
    /// Lookup key.
    pub name: &'static str,
    /// Young's modulus (GPa).
    pub young_modulus: f64,
    /// Poisson ratio.
    pub poisson_ratio: f64,
    /// Bulk modulus (GPa).
    pub bulk_modulus: f64,
    /// Shear modulus (GPa).
    pub shear_modulus: f64,
    /// Loss factor 1/Q.
    pub attenuation: f64,
    /// Density the moduli were measured at (kg/m³).
    pub reference_density: f64,
}

const fn rock(
    name: &'static str,
    young_modulus: f64,
    poisson_ratio: f64,
    bulk_modulus: f64,
    shear_modulus: f64,
    attenuation: f64,
    reference_density: f64,
) -> RockType {
    RockType {
        name,
        young_modulus,
        poisson_ratio,
        bulk_modulus,
        shear_modulus,
        attenuation,
        reference_density,
    }
}

/// Fixed rock table. The last entry is the fallback.
pub const ROCK_TYPES: [RockType; 10] = [
    rock("sandstone", 20.0, 0.25, 13.33, 8.0, 0.02, 2400.0),
    rock("limestone", 50.0, 0.28, 37.88, 19.53, 0.01, 2600.0),
    rock("granite", 60.0, 0.25, 40.0, 24.0, 0.005, 2650.0),
    rock("shale", 15.0, 0.30, 12.5, 5.77, 0.03, 2400.0),
    rock("basalt", 70.0, 0.26, 48.6, 27.8, 0.006, 2900.0),
    rock("dolomite", 70.0, 0.29, 55.6, 27.1, 0.008, 2850.0),
    rock("marble", 55.0, 0.27, 39.9, 21.65, 0.007, 2700.0),
    rock("quartzite", 80.0, 0.17, 40.4, 34.2, 0.004, 2650.0),
    rock("coal", 4.0, 0.35, 4.44, 1.48, 0.05, 1400.0),
    rock("default", 30.0, 0.25, 20.0, 12.0, 0.015, 2500.0),
];

/// Find the rock type whose key occurs in `name` (case-insensitive).
pub fn lookup_rock_type(name: &str) -> &'static RockType {
    let lower = name.to_lowercase();
    let last = ROCK_TYPES.len() - 1;
    ROCK_TYPES[..last]
        .iter()
        .find(|r| lower.contains(r.name))
        .unwrap_or(&ROCK_TYPES[last])
}

/// Elastic properties and theoretical velocities for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElasticProperties {
    /// Matched rock-table key.
    pub rock_type: &'static str,
    /// Density (kg/m³).
    pub density: f64,
    /// Young's modulus (GPa).
    pub young_modulus: f64,
    /// Poisson ratio.
    pub poisson_ratio: f64,
    /// Bulk modulus (GPa).
    pub bulk_modulus: f64,
    /// Shear modulus (GPa).
    pub shear_modulus: f64,
    /// Loss factor 1/Q.
    pub attenuation: f64,
    /// Theoretical compressional velocity (m/s).
    pub vp: f64,
    /// Theoretical shear velocity (m/s).
    pub vs: f64,
}

impl ElasticProperties {
    /// Theoretical velocity of the given wave type.
    pub fn velocity(&self, wave: WaveType) -> f64 {
        match wave {
            WaveType::P => self.vp,
            WaveType::S => self.vs,
        }
    }

    /// Theoretical Vp/Vs.
    pub fn vp_vs_ratio(&self) -> f64 {
        self.vp / self.vs
    }
}

/// Estimate elastic properties of a sample.
///
/// Moduli come from the rock table scaled by density, or from a prior tri-axial
/// test when it supplies both Young's modulus and Poisson ratio. Velocities are
/// boosted by confining pressure and clamped to physical ranges.
///
/// # Errors
/// Returns [`AcousticError::InvalidDensity`] when density is not positive and finite.
pub fn estimate(
    name: &str,
    density: f64,
    confining_pressure: f64,
    triaxial: Option<&TriaxialResult>,
) -> Result<ElasticProperties> {
    if !density.is_finite() || density <= 0.0 {
        return Err(AcousticError::InvalidDensity(density));
    }

    let base = lookup_rock_type(name);

    let (young, poisson, bulk, shear) = match triaxial.and_then(TriaxialResult::elastic_pair) {
        Some((e, nu)) => {
            let nu = nu.clamp(POISSON_RANGE.0, POISSON_RANGE.1);
            let k = e / (3.0 * (1.0 - 2.0 * nu));
            let g = e / (2.0 * (1.0 + nu));
            (e, nu, k, g)
        }
        None => {
            let ratio = density / base.reference_density;
            let e = base.young_modulus * ratio.powf(YOUNG_DENSITY_EXPONENT);
            let nu = (base.poisson_ratio * ratio.powf(POISSON_DENSITY_EXPONENT))
                .clamp(POISSON_RANGE.0, POISSON_RANGE.1);
            let k = base.bulk_modulus * ratio.powf(BULK_DENSITY_EXPONENT);
            let g = base.shear_modulus * ratio.powf(SHEAR_DENSITY_EXPONENT);
            (e, nu, k, g)
        }
    };

    let boost = 1.0 + PRESSURE_SENSITIVITY * confining_pressure;
    let vp = (((bulk + 4.0 * shear / 3.0) * GPA / density).sqrt() * boost)
        .clamp(VP_RANGE.0, VP_RANGE.1);
    let vs = ((shear * GPA / density).sqrt() * boost).clamp(VS_RANGE.0, VS_RANGE.1);

    log::debug!(
        "material '{}' -> {}: E={:.2} GPa nu={:.3} K={:.2} GPa G={:.2} GPa vp={:.0} vs={:.0}",
        name,
        base.name,
        young,
        poisson,
        bulk,
        shear,
        vp,
        vs
    );

    Ok(ElasticProperties {
        rock_type: base.name,
        density,
        young_modulus: young,
        poisson_ratio: poisson,
        bulk_modulus: bulk,
        shear_modulus: shear,
        attenuation: base.attenuation,
        vp,
        vs,
    })
}
