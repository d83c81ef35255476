// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Explicit FDTD integrators.
//!
//! Each integrator owns its field buffers and advances them one step per call to
//! [`WaveIntegrator::step`], issuing one kernel dispatch per buffer it updates.
//! Host-side access (source injection, receiver reads) happens only between
//! steps, after the device has been synchronized.

use crate::config::WaveType;
use crate::device::ComputeDevice;
use crate::error::{AcousticError, Result};
use crate::grid::SimulationGrid;
use crate::kernels::{IsotropicKernel, LineDisplacementKernel, LineVelocityKernel};
use crate::model::VelocityModel;

/// `dt = h / (k · v_max)` factors per variant.
const CFL_LINE_P: f64 = 1.2;
const CFL_LINE_S: f64 = 1.5;
const CFL_ISOTROPIC_P: f64 = 2.1;
const CFL_ISOTROPIC_S: f64 = 1.8;

/// Width of the absorbing ramp at each end of the P-wave line.
const RAMP_CELLS: usize = 10;
/// Damping applied at the outermost ramp cell.
const RAMP_STRENGTH: f64 = 0.1;

const LINE_P_SHELL: usize = 2;
const LINE_S_SHELL: usize = 1;
const ISOTROPIC_SHELL: usize = 2;

/// A ring of `N` equally sized field buffers addressed by a rotating head.
///
/// [`FieldRing::advance`] writes the next step into the oldest slot and makes it
/// the head, so no buffer is ever copied. With `N = 2` the slot being written is
/// the previous step, which the update must not read.
pub struct FieldRing<const N: usize> {
    slots: [Box<[f64]>; N],
    head: usize,
}

impl<const N: usize> FieldRing<N> {
    /// `N` zeroed buffers of `len` cells.
    pub fn new(len: usize) -> Self {
        assert!(N >= 2, "FieldRing needs at least two slots");
        FieldRing {
            slots: std::array::from_fn(|_| vec![0.0; len].into_boxed_slice()),
            head: 0,
        }
    }

    /// Field at the current step.
    pub fn current(&self) -> &[f64] {
        &self.slots[self.head]
    }

    /// Mutable field at the current step, for host-side injection.
    pub fn current_mut(&mut self) -> &mut [f64] {
        &mut self.slots[self.head]
    }

    /// Field one step back.
    pub fn previous(&self) -> &[f64] {
        &self.slots[(self.head + N - 1) % N]
    }

    /// Compute the next step into the oldest slot and rotate.
    pub fn advance<F>(&mut self, update: F)
    where
        F: FnOnce(&Self, &mut [f64]),
    {
        let next = (self.head + 1) % N;
        let mut buf = std::mem::take(&mut self.slots[next]);
        update(self, &mut buf);
        self.slots[next] = buf;
        self.head = next;
    }
}

/// Common interface of the three FDTD variants.
pub trait WaveIntegrator: Send {
    /// Variant name.
    fn name(&self) -> &'static str;

    /// Time step (s).
    fn dt(&self) -> f64;

    /// Number of cells in the field.
    fn num_cells(&self) -> usize;

    /// Flat index of the source cell.
    fn source_cell(&self) -> usize;

    /// Flat index of the receiver cell.
    fn receiver_cell(&self) -> usize;

    /// True if `cell` is held at zero by the boundary condition.
    fn is_boundary(&self, cell: usize) -> bool;

    /// Add `amount` to the source cell of the current field.
    fn inject(&mut self, amount: f64);

    /// Advance one step.
    fn step(&mut self, device: &dyn ComputeDevice);

    /// Current displacement field.
    fn field(&self) -> &[f64];

    /// Displacement along the source-receiver line.
    fn axis_line(&self) -> Vec<f64>;

    /// Displacement at the receiver.
    fn sample(&self) -> f64 {
        self.field()[self.receiver_cell()]
    }
}

/// Which 1D variant a [`LineIntegrator`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Compressional,
    Shear,
}

/// Homogeneous 1D line integrator along the test axis.
pub struct LineIntegrator {
    kind: LineKind,
    u: FieldRing<2>,
    v: FieldRing<2>,
    ramp: Option<Box<[f64]>>,
    c2: f64,
    damping: f64,
    dt: f64,
    inv_h2: f64,
    source: usize,
    receiver: usize,
}

impl LineIntegrator {
    /// 1D P-wave line with absorbing ramps and a 2-cell zero boundary.
    ///
    /// # Errors
    /// Returns an error if velocity or spacing are not positive, or the cell
    /// indices fall outside the line.
    pub fn compressional(
        len: usize,
        spacing: f64,
        velocity: f64,
        damping: f64,
        source: usize,
        receiver: usize,
    ) -> Result<Self> {
        Self::new(
            LineKind::Compressional,
            len,
            spacing,
            velocity,
            damping,
            source,
            receiver,
        )
    }

    /// 1D S-wave line with a 1-cell zero boundary and no ramp.
    ///
    /// # Errors
    /// Same conditions as [`LineIntegrator::compressional`].
    pub fn shear(
        len: usize,
        spacing: f64,
        velocity: f64,
        damping: f64,
        source: usize,
        receiver: usize,
    ) -> Result<Self> {
        Self::new(
            LineKind::Shear,
            len,
            spacing,
            velocity,
            damping,
            source,
            receiver,
        )
    }

    /// Line along the test axis of `grid` for the given wave type.
    ///
    /// # Errors
    /// Same conditions as [`LineIntegrator::compressional`].
    pub fn for_grid(
        grid: &SimulationGrid,
        wave: WaveType,
        velocity: f64,
        damping: f64,
    ) -> Result<Self> {
        let axis = grid.axis();
        let kind = match wave {
            WaveType::P => LineKind::Compressional,
            WaveType::S => LineKind::Shear,
        };
        Self::new(
            kind,
            grid.line_length(),
            grid.spacing(),
            velocity,
            damping,
            grid.source()[axis],
            grid.receiver()[axis],
        )
    }

    fn new(
        kind: LineKind,
        len: usize,
        spacing: f64,
        velocity: f64,
        damping: f64,
        source: usize,
        receiver: usize,
    ) -> Result<Self> {
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(AcousticError::InvalidGridSpacing(spacing));
        }
        if !velocity.is_finite() || velocity <= 0.0 {
            return Err(AcousticError::InvalidConfig(format!(
                "line velocity must be positive and finite, got {}",
                velocity
            )));
        }
        if source >= len || receiver >= len {
            return Err(AcousticError::InvalidConfig(format!(
                "source {} / receiver {} outside line of {} cells",
                source, receiver, len
            )));
        }

        let (k, ramp) = match kind {
            LineKind::Compressional => (CFL_LINE_P, Some(absorbing_ramp(len))),
            LineKind::Shear => (CFL_LINE_S, None),
        };
        Ok(LineIntegrator {
            kind,
            u: FieldRing::new(len),
            v: FieldRing::new(len),
            ramp,
            c2: velocity * velocity,
            damping: damping.max(0.0),
            dt: spacing / (k * velocity),
            inv_h2: 1.0 / (spacing * spacing),
            source,
            receiver,
        })
    }

    fn shell(&self) -> usize {
        match self.kind {
            LineKind::Compressional => LINE_P_SHELL,
            LineKind::Shear => LINE_S_SHELL,
        }
    }
}

/// Linear damping ramp over the first and last [`RAMP_CELLS`] cells.
fn absorbing_ramp(len: usize) -> Box<[f64]> {
    (0..len)
        .map(|i| {
            let from_edge = i.min(len - 1 - i);
            if from_edge < RAMP_CELLS {
                RAMP_STRENGTH * (RAMP_CELLS - from_edge) as f64 / RAMP_CELLS as f64
            } else {
                0.0
            }
        })
        .collect()
}

impl WaveIntegrator for LineIntegrator {
    fn name(&self) -> &'static str {
        match self.kind {
            LineKind::Compressional => "line-p",
            LineKind::Shear => "line-s",
        }
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn num_cells(&self) -> usize {
        self.u.current().len()
    }

    fn source_cell(&self) -> usize {
        self.source
    }

    fn receiver_cell(&self) -> usize {
        self.receiver
    }

    fn is_boundary(&self, cell: usize) -> bool {
        let s = self.shell();
        cell < s || cell + s >= self.num_cells()
    }

    fn inject(&mut self, amount: f64) {
        let src = self.source;
        self.u.current_mut()[src] += amount;
    }

    fn step(&mut self, device: &dyn ComputeDevice) {
        let shell = self.shell();
        let ramp = self.ramp.as_deref();
        let (c2, damping, dt, inv_h2) = (self.c2, self.damping, self.dt, self.inv_h2);

        let u = &self.u;
        self.v.advance(|v, out| {
            let kernel = LineVelocityKernel {
                u: u.current(),
                v: v.current(),
                c2,
                damping,
                dt,
                inv_h2,
                ramp,
                shell,
            };
            device.dispatch(&kernel, out);
        });
        device.synchronize();

        let v = &self.v;
        self.u.advance(|u, out| {
            let kernel = LineDisplacementKernel {
                u: u.current(),
                v_next: v.current(),
                dt,
                ramp,
                shell,
            };
            device.dispatch(&kernel, out);
        });
        device.synchronize();
    }

    fn field(&self) -> &[f64] {
        self.u.current()
    }

    fn axis_line(&self) -> Vec<f64> {
        self.u.current().to_vec()
    }
}

/// 3D second-order integrator over a heterogeneous velocity model.
pub struct IsotropicIntegrator {
    field: FieldRing<3>,
    courant2: Box<[f64]>,
    loss: f64,
    dt: f64,
    shape: [usize; 3],
    strides: [usize; 3],
    source: usize,
    receiver: usize,
    line: Vec<usize>,
}

impl IsotropicIntegrator {
    /// Build from a grid and its velocity model.
    ///
    /// The model holds compressional velocities. In S mode every cell's squared
    /// velocity is scaled by `(vs/vp)²` via `shear_ratio`. `attenuation` is the
    /// viscous loss rate (1/s).
    ///
    /// # Errors
    /// Returns an error if the model is empty of positive velocities or
    /// `shear_ratio` is not positive in S mode.
    pub fn new(
        grid: &SimulationGrid,
        model: &VelocityModel,
        wave: WaveType,
        shear_ratio: f64,
        attenuation: f64,
    ) -> Result<Self> {
        let mode = match wave {
            WaveType::P => 1.0,
            WaveType::S => {
                if !shear_ratio.is_finite() || shear_ratio <= 0.0 {
                    return Err(AcousticError::InvalidConfig(format!(
                        "shear ratio must be positive and finite, got {}",
                        shear_ratio
                    )));
                }
                shear_ratio * shear_ratio
            }
        };
        let k = match wave {
            WaveType::P => CFL_ISOTROPIC_P,
            WaveType::S => CFL_ISOTROPIC_S,
        };

        let v_max = model.max_velocity() * mode.sqrt();
        if !v_max.is_finite() || v_max <= 0.0 {
            return Err(AcousticError::InvalidConfig(
                "velocity model has no positive velocity".to_string(),
            ));
        }
        let h = grid.spacing();
        let dt = h / (k * v_max);
        let scale = dt * dt / (h * h) * mode;
        let courant2: Box<[f64]> = model.velocity().iter().map(|v| v * v * scale).collect();

        Ok(IsotropicIntegrator {
            field: FieldRing::new(grid.num_cells()),
            courant2,
            loss: attenuation.max(0.0) * dt,
            dt,
            shape: grid.shape(),
            strides: grid.strides(),
            source: grid.index(grid.source()),
            receiver: grid.index(grid.receiver()),
            line: grid.axis_line().collect(),
        })
    }
}

impl WaveIntegrator for IsotropicIntegrator {
    fn name(&self) -> &'static str {
        "isotropic-3d"
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn num_cells(&self) -> usize {
        self.courant2.len()
    }

    fn source_cell(&self) -> usize {
        self.source
    }

    fn receiver_cell(&self) -> usize {
        self.receiver
    }

    fn is_boundary(&self, cell: usize) -> bool {
        let i = cell / self.strides[0];
        let rem = cell % self.strides[0];
        let idx = [i, rem / self.strides[1], rem % self.strides[1]];
        let s = ISOTROPIC_SHELL;
        (0..3).any(|d| idx[d] < s || idx[d] + s >= self.shape[d])
    }

    fn inject(&mut self, amount: f64) {
        let src = self.source;
        self.field.current_mut()[src] += amount;
    }

    fn step(&mut self, device: &dyn ComputeDevice) {
        let courant2 = &self.courant2;
        let (loss, shape, strides) = (self.loss, self.shape, self.strides);
        self.field.advance(|ring, out| {
            let kernel = IsotropicKernel {
                current: ring.current(),
                previous: ring.previous(),
                courant2,
                loss,
                shape,
                strides,
                shell: ISOTROPIC_SHELL,
            };
            device.dispatch(&kernel, out);
        });
        device.synchronize();
    }

    fn field(&self) -> &[f64] {
        self.field.current()
    }

    fn axis_line(&self) -> Vec<f64> {
        let f = self.field.current();
        self.line.iter().map(|&i| f[i]).collect()
    }
}
