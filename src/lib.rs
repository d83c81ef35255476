// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Synthetic ultrasonic velocity measurement of digitized rock samples.
//!
//! A Ricker source pulse is injected into a finite-difference time-domain (FDTD)
//! grid built from the sample mesh and its estimated elastic properties. A
//! receiver on the opposite side records the wavefield, and an energy-threshold
//! picker turns the recording into P- and S-wave arrival times and velocities.
//! Kernels run data-parallel over cells on a rayon thread pool.

#![warn(missing_docs)]

/// Run configuration, material input and tri-axial results.
pub mod config;
/// Compute backends for per-cell kernels.
pub mod device;
/// Error types for the library.
pub mod error;
/// Grid planning from mesh bounds and wavelength.
pub mod grid;
/// JSON job files, diagnostic dumps and result export.
pub mod io;
/// Per-cell FDTD update kernels.
pub mod kernels;
/// Rock-type table and elastic property estimation.
pub mod material;
/// Triangle meshes describing the sample geometry.
pub mod mesh;
/// Voxelized velocity and density models.
pub mod model;
/// Arrival-time picking.
pub mod picker;
/// Immutable run results.
pub mod result;
/// Measurements shared between runs on one sample.
pub mod session;
/// Run driver, status lifecycle, cancellation and events.
pub mod simulation;
/// FDTD integrators.
pub mod solver;
/// Source wavelets.
pub mod wavelet;

pub use crate::config::{Dimensionality, Material, SimulationConfig, TriaxialResult, WaveType};
pub use crate::error::{AcousticError, Result};
pub use crate::mesh::{Mesh, Triangle};
pub use crate::result::SimulationResult;
pub use crate::session::SampleSession;
pub use crate::simulation::{
    CancellationToken, RunHandle, Simulation, SimulationEvent, Status, StatusHandle,
};
