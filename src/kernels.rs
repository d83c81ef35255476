// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::device::CellKernel;

/// Velocity half of the 1D leapfrog update.
///
/// For interior cells: `a = c²∇²u − damping·v`, `v' = (v + a·dt)·(1 − ramp)`.
/// The outermost `shell` cells on each end are written as zero.
pub struct LineVelocityKernel<'a> {
    /// Displacement at the current step.
    pub u: &'a [f64],
    /// Particle velocity at the current step.
    pub v: &'a [f64],
    /// Squared wave speed (m²/s²).
    pub c2: f64,
    /// Viscous damping coefficient (1/s).
    pub damping: f64,
    /// Time step (s).
    pub dt: f64,
    /// `1 / h²`.
    pub inv_h2: f64,
    /// Absorbing profile per cell, if any.
    pub ramp: Option<&'a [f64]>,
    /// Cells forced to zero at each end.
    pub shell: usize,
}

impl CellKernel for LineVelocityKernel<'_> {
    fn eval_range(&self, offset: usize, out: &mut [f64]) {
        let n = self.u.len();
        for (o, i) in out.iter_mut().zip(offset..) {
            if i < self.shell || i + self.shell >= n {
                *o = 0.0;
                continue;
            }
            let lap = (self.u[i - 1] - 2.0 * self.u[i] + self.u[i + 1]) * self.inv_h2;
            let a = self.c2 * lap - self.damping * self.v[i];
            let v_new = self.v[i] + a * self.dt;
            *o = match self.ramp {
                Some(r) => v_new * (1.0 - r[i]),
                None => v_new,
            };
        }
    }
}

/// Displacement half of the 1D leapfrog update: `u' = (u + v'·dt)·(1 − ramp)`.
pub struct LineDisplacementKernel<'a> {
    /// Displacement at the current step.
    pub u: &'a [f64],
    /// Particle velocity already advanced to the next step.
    pub v_next: &'a [f64],
    /// Time step (s).
    pub dt: f64,
    /// Absorbing profile per cell, if any.
    pub ramp: Option<&'a [f64]>,
    /// Cells forced to zero at each end.
    pub shell: usize,
}

impl CellKernel for LineDisplacementKernel<'_> {
    fn eval_range(&self, offset: usize, out: &mut [f64]) {
        let n = self.u.len();
        for (o, i) in out.iter_mut().zip(offset..) {
            if i < self.shell || i + self.shell >= n {
                *o = 0.0;
                continue;
            }
            let u_new = self.u[i] + self.v_next[i] * self.dt;
            *o = match self.ramp {
                Some(r) => u_new * (1.0 - r[i]),
                None => u_new,
            };
        }
    }
}

/// Second-order 3D update with a 6-neighbour Laplacian.
///
/// `next = 2c − p + courant²·(Σneighbours − 6c) − loss·(c − p)` where
/// `courant² = (v·dt/h)²·mode` per cell and `loss = attenuation·dt`. Cells within
/// `shell` of any face are written as zero.
pub struct IsotropicKernel<'a> {
    /// Field at the current step.
    pub current: &'a [f64],
    /// Field at the previous step.
    pub previous: &'a [f64],
    /// Squared Courant number per cell, including the mode coefficient.
    pub courant2: &'a [f64],
    /// Attenuation times time step (dimensionless).
    pub loss: f64,
    /// Cells per axis.
    pub shape: [usize; 3],
    /// Row-major strides.
    pub strides: [usize; 3],
    /// Boundary shell thickness in cells.
    pub shell: usize,
}

impl IsotropicKernel<'_> {
    #[inline]
    fn in_shell(&self, flat: usize) -> bool {
        let i = flat / self.strides[0];
        let rem = flat % self.strides[0];
        let j = rem / self.strides[1];
        let k = rem % self.strides[1];
        let s = self.shell;
        i < s
            || j < s
            || k < s
            || i + s >= self.shape[0]
            || j + s >= self.shape[1]
            || k + s >= self.shape[2]
    }
}

impl CellKernel for IsotropicKernel<'_> {
    fn eval_range(&self, offset: usize, out: &mut [f64]) {
        let [sx, sy, _] = self.strides;
        let c = self.current;
        let p = self.previous;
        for (o, idx) in out.iter_mut().zip(offset..) {
            if self.in_shell(idx) {
                *o = 0.0;
                continue;
            }
            let center = c[idx];
            let neighbours =
                c[idx - sx] + c[idx + sx] + c[idx - sy] + c[idx + sy] + c[idx - 1] + c[idx + 1];
            let lap = neighbours - 6.0 * center;
            let delta = center - p[idx];
            *o = 2.0 * center - p[idx] + self.courant2[idx] * lap - self.loss * delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_velocity_zeroes_shell() {
        let u = vec![1.0; 8];
        let v = vec![1.0; 8];
        let k = LineVelocityKernel {
            u: &u,
            v: &v,
            c2: 1.0,
            damping: 0.0,
            dt: 0.1,
            inv_h2: 1.0,
            ramp: None,
            shell: 2,
        };
        let mut out = vec![9.0; 8];
        k.eval_range(0, &mut out);
        assert_eq!(out, vec![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn line_velocity_laplacian() {
        // u = i^2 has second difference 2
        let u: Vec<f64> = (0..6).map(|i| (i * i) as f64).collect();
        let v = vec![0.0; 6];
        let k = LineVelocityKernel {
            u: &u,
            v: &v,
            c2: 4.0,
            damping: 0.0,
            dt: 0.5,
            inv_h2: 1.0,
            ramp: None,
            shell: 1,
        };
        let mut out = vec![0.0; 6];
        k.eval_range(0, &mut out);
        for &val in &out[1..5] {
            assert!((val - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn line_velocity_applies_ramp_and_offset() {
        let u = vec![0.0; 6];
        let v = vec![2.0; 6];
        let ramp = vec![0.5; 6];
        let k = LineVelocityKernel {
            u: &u,
            v: &v,
            c2: 1.0,
            damping: 0.0,
            dt: 1.0,
            inv_h2: 1.0,
            ramp: Some(&ramp),
            shell: 1,
        };
        let mut out = vec![0.0; 3];
        k.eval_range(3, &mut out);
        assert_eq!(out, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn line_displacement_integrates_velocity() {
        let u = vec![1.0; 5];
        let v_next = vec![3.0; 5];
        let k = LineDisplacementKernel {
            u: &u,
            v_next: &v_next,
            dt: 0.5,
            ramp: None,
            shell: 1,
        };
        let mut out = vec![0.0; 5];
        k.eval_range(0, &mut out);
        assert_eq!(out, vec![0.0, 2.5, 2.5, 2.5, 0.0]);
    }

    #[test]
    fn isotropic_constant_field_stays_constant_inside() {
        let shape = [6, 6, 6];
        let strides = [36, 6, 1];
        let n = 216;
        let current = vec![1.0; n];
        let previous = vec![1.0; n];
        let courant2 = vec![0.2; n];
        let k = IsotropicKernel {
            current: &current,
            previous: &previous,
            courant2: &courant2,
            loss: 0.1,
            shape,
            strides,
            shell: 2,
        };
        let mut out = vec![0.0; n];
        k.eval_range(0, &mut out);
        for (idx, val) in out.iter().enumerate() {
            let i = idx / 36;
            let j = (idx % 36) / 6;
            let kk = idx % 6;
            let interior = (2..4).contains(&i) && (2..4).contains(&j) && (2..4).contains(&kk);
            if interior {
                assert!((val - 1.0).abs() < 1e-12, "idx {} = {}", idx, val);
            } else {
                assert_eq!(*val, 0.0);
            }
        }
    }
}
