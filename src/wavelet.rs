// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::f64::consts::PI;

/// Wavelet duration in periods of the dominant frequency.
const DURATION_PERIODS: f64 = 2.4;

/// A sampled Ricker source pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceWavelet {
    samples: Vec<f64>,
    peak: f64,
}

impl SourceWavelet {
    /// Sample a Ricker wavelet `(1 - 2π²f²t²) exp(-π²f²t²)` scaled by `amplitude`.
    ///
    /// `t` is measured from the array midpoint, so the pulse is symmetric and
    /// peaks in the middle of the returned samples.
    pub fn ricker(dt: f64, frequency_khz: f64, len: usize, amplitude: f64) -> Self {
        let f = frequency_khz * 1000.0;
        let pi2f2 = PI * PI * f * f;
        let mid = len.saturating_sub(1) as f64 / 2.0;
        let samples: Vec<f64> = (0..len)
            .map(|i| {
                let t = (i as f64 - mid) * dt;
                let arg = pi2f2 * t * t;
                amplitude * (1.0 - 2.0 * arg) * (-arg).exp()
            })
            .collect();
        let peak = samples.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        SourceWavelet { samples, peak }
    }

    /// A wavelet of `len` zeros.
    pub fn silent(len: usize) -> Self {
        SourceWavelet {
            samples: vec![0.0; len],
            peak: 0.0,
        }
    }

    /// Sample count covering the pulse at this step size, capped at `max_len`.
    pub fn natural_len(dt: f64, frequency_khz: f64, max_len: usize) -> usize {
        let f = frequency_khz * 1000.0;
        let n = (DURATION_PERIODS / (f * dt)).ceil();
        if n.is_finite() {
            (n as usize).clamp(2, max_len.max(2))
        } else {
            max_len.max(2)
        }
    }

    /// Sample at step `n`, zero past the end.
    pub fn at(&self, n: usize) -> f64 {
        self.samples.get(n).copied().unwrap_or(0.0)
    }

    /// All samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Peak absolute amplitude.
    pub fn peak(&self) -> f64 {
        self.peak
    }
}
