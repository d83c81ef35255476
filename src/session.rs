// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use crate::config::WaveType;

/// A velocity and arrival time measured by an earlier run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorMeasurement {
    /// Measured velocity (m/s).
    pub velocity: f64,
    /// Picked arrival time (s).
    pub arrival_time: f64,
}

/// Measurements carried between runs on the same sample.
///
/// A P-wave run records its pick here so a later S-wave run can anchor its
/// search window on the measured P arrival and report a measured Vp/Vs ratio.
/// A run reads the session once when it is constructed and writes it only
/// after completing successfully.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSession {
    p_wave: Option<PriorMeasurement>,
    s_wave: Option<PriorMeasurement>,
}

impl SampleSession {
    /// An empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last measurement for `wave`, if any.
    pub fn prior(&self, wave: WaveType) -> Option<PriorMeasurement> {
        match wave {
            WaveType::P => self.p_wave,
            WaveType::S => self.s_wave,
        }
    }

    /// Store a measurement for `wave`, replacing any earlier one.
    pub fn record(&mut self, wave: WaveType, measurement: PriorMeasurement) {
        let slot = match wave {
            WaveType::P => &mut self.p_wave,
            WaveType::S => &mut self.s_wave,
        };
        *slot = Some(measurement);
    }

    /// Forget all measurements.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when no measurement has been recorded.
    pub fn is_empty(&self) -> bool {
        self.p_wave.is_none() && self.s_wave.is_none()
    }
}
