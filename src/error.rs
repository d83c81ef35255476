// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

use crate::simulation::Status;

/// Errors that can occur during simulation setup, stepping, or I/O.
#[derive(Debug)]
pub enum AcousticError {
    /// Material density is not positive and finite.
    InvalidDensity(f64),
    /// The sample mesh has no triangles.
    EmptyMesh,
    /// Source frequency is not positive and finite.
    InvalidFrequency(f64),
    /// Not enough time steps to record an arrival.
    TooFewTimeSteps {
        /// The step count provided.
        got: usize,
        /// The minimum accepted step count.
        min: usize,
    },
    /// Source amplitude is not positive and finite.
    InvalidAmplitude(f64),
    /// Test axis vector is zero or not finite.
    InvalidTestAxis([f64; 3]),
    /// Grid spacing came out non-positive or non-finite.
    InvalidGridSpacing(f64),
    /// A configuration value is out of range or malformed.
    InvalidConfig(String),
    /// No compute backend could be created.
    BackendUnavailable(String),
    /// A status transition was refused by the lifecycle state machine.
    InvalidTransition {
        /// Status at the time of the request.
        from: Status,
        /// Requested status.
        to: Status,
    },
    /// The wavefield diverged during stepping.
    NonFiniteField {
        /// Step at which a non-finite value was observed.
        step: usize,
    },
    /// The run was cancelled by the caller.
    Cancelled {
        /// Number of completed steps when cancellation was observed.
        step: usize,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// JSON (de)serialization failed.
    Json(serde_json::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl AcousticError {
    /// True for errors raised by input validation, before any grid allocation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AcousticError::InvalidDensity(_)
                | AcousticError::EmptyMesh
                | AcousticError::InvalidFrequency(_)
                | AcousticError::TooFewTimeSteps { .. }
                | AcousticError::InvalidAmplitude(_)
                | AcousticError::InvalidTestAxis(_)
                | AcousticError::InvalidConfig(_)
        )
    }
}

impl fmt::Display for AcousticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcousticError::InvalidDensity(rho) => {
                write!(f, "invalid density: {} (must be positive and finite)", rho)
            }
            AcousticError::EmptyMesh => write!(f, "mesh contains no triangles"),
            AcousticError::InvalidFrequency(khz) => {
                write!(
                    f,
                    "invalid frequency: {} kHz (must be positive and finite)",
                    khz
                )
            }
            AcousticError::TooFewTimeSteps { got, min } => {
                write!(f, "too few time steps: {} (need at least {})", got, min)
            }
            AcousticError::InvalidAmplitude(a) => {
                write!(f, "invalid amplitude: {} (must be positive and finite)", a)
            }
            AcousticError::InvalidTestAxis(axis) => {
                write!(f, "invalid test axis {:?}: must be a finite non-zero vector", axis)
            }
            AcousticError::InvalidGridSpacing(h) => {
                write!(
                    f,
                    "invalid grid spacing: {} (must be positive and finite)",
                    h
                )
            }
            AcousticError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            AcousticError::BackendUnavailable(msg) => {
                write!(f, "no compute backend available: {}", msg)
            }
            AcousticError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {:?} -> {:?}", from, to)
            }
            AcousticError::NonFiniteField { step } => {
                write!(f, "wavefield became non-finite at step {}", step)
            }
            AcousticError::Cancelled { step } => {
                write!(f, "simulation cancelled after {} steps", step)
            }
            AcousticError::IoError(e) => write!(f, "I/O error: {}", e),
            AcousticError::Json(e) => write!(f, "JSON error: {}", e),
            AcousticError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AcousticError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AcousticError::IoError(e) => Some(e),
            AcousticError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AcousticError {
    fn from(e: std::io::Error) -> Self {
        AcousticError::IoError(e)
    }
}

impl From<serde_json::Error> for AcousticError {
    fn from(e: serde_json::Error) -> Self {
        AcousticError::Json(e)
    }
}

/// Convenience type alias for Results with AcousticError.
pub type Result<T> = std::result::Result<T, AcousticError>;
