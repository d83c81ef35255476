// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{AcousticError, Result};
use crate::mesh::Aabb;

/// Smallest axis length any grid may have. Leaves room for the 2-cell shell.
const MIN_SHAPE: usize = 5;

/// Sizing limits for [`plan`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLimits {
    /// Minimum cells per axis (even).
    pub min_dim: usize,
    /// Maximum cells per axis (even).
    pub max_dim: usize,
    /// Maximum total cell count.
    pub max_cells: usize,
    /// Target grid points per dominant wavelength.
    pub points_per_wavelength: f64,
    /// Fractional padding added on each side of the mesh bounds.
    pub padding: f64,
}

impl Default for GridLimits {
    fn default() -> Self {
        GridLimits {
            min_dim: 8,
            max_dim: 128,
            max_cells: 8_388_608,
            points_per_wavelength: 12.0,
            padding: 0.05,
        }
    }
}

impl GridLimits {
    fn validate(&self) -> Result<()> {
        let ok = self.min_dim >= 8
            && self.min_dim % 2 == 0
            && self.max_dim % 2 == 0
            && self.min_dim <= self.max_dim
            && self.min_dim.pow(3) <= self.max_cells
            && self.points_per_wavelength > 0.0
            && self.padding >= 0.0;
        if ok {
            Ok(())
        } else {
            Err(AcousticError::InvalidConfig(format!(
                "inconsistent grid limits: {:?}",
                self
            )))
        }
    }
}

/// A uniform 3D simulation grid with source and receiver placement.
///
/// Cells are stored row-major (last axis fastest). Cell `[i, j, k]` sits at
/// `origin + [i, j, k] * spacing`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationGrid {
    shape: [usize; 3],
    strides: [usize; 3],
    spacing: f64,
    initial_spacing: f64,
    origin: [f64; 3],
    axis: usize,
    source: [usize; 3],
    receiver: [usize; 3],
    sample_length: f64,
}

impl SimulationGrid {
    /// Create a grid with the source at 25% and the receiver at 75% along `axis`,
    /// centred on the other two axes.
    ///
    /// # Errors
    /// Returns an error if spacing is not positive and finite, `axis > 2`, or any
    /// axis has fewer than 5 cells.
    pub fn new(shape: [usize; 3], spacing: f64, axis: usize) -> Result<Self> {
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(AcousticError::InvalidGridSpacing(spacing));
        }
        if axis > 2 {
            return Err(AcousticError::InvalidConfig(format!(
                "grid axis {} out of range",
                axis
            )));
        }
        if let Some(size) = shape.iter().find(|&&n| n < MIN_SHAPE) {
            return Err(AcousticError::InvalidConfig(format!(
                "grid shape {:?} has an axis of {} cells (need at least {})",
                shape, size, MIN_SHAPE
            )));
        }

        let strides = [shape[1] * shape[2], shape[2], 1];
        let mut source = [shape[0] / 2, shape[1] / 2, shape[2] / 2];
        let mut receiver = source;
        source[axis] = shape[axis] / 4;
        receiver[axis] = 3 * shape[axis] / 4;

        Ok(SimulationGrid {
            shape,
            strides,
            spacing,
            initial_spacing: spacing,
            origin: [0.0; 3],
            axis,
            source,
            receiver,
            sample_length: (shape[axis] - 1) as f64 * spacing,
        })
    }

    /// Set the physical position of cell `[0, 0, 0]` (builder method).
    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    /// Cells per axis.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Row-major strides.
    pub fn strides(&self) -> [usize; 3] {
        self.strides
    }

    /// Cell edge length (m).
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Spacing derived from the wavelength before any clamping.
    pub fn initial_spacing(&self) -> f64 {
        self.initial_spacing
    }

    /// Physical position of cell `[0, 0, 0]`.
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Test axis index (0, 1 or 2).
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Source cell.
    pub fn source(&self) -> [usize; 3] {
        self.source
    }

    /// Receiver cell.
    pub fn receiver(&self) -> [usize; 3] {
        self.receiver
    }

    /// Sample length along the test axis (m).
    pub fn sample_length(&self) -> f64 {
        self.sample_length
    }

    /// Total number of cells.
    pub fn num_cells(&self) -> usize {
        self.shape.iter().product()
    }

    /// Cells along the test axis.
    pub fn line_length(&self) -> usize {
        self.shape[self.axis]
    }

    /// Source-receiver separation (m).
    pub fn source_receiver_distance(&self) -> f64 {
        (self.receiver[self.axis] - self.source[self.axis]) as f64 * self.spacing
    }

    /// Convert a 3D index to a flat index.
    pub fn index(&self, idx: [usize; 3]) -> usize {
        idx[0] * self.strides[0] + idx[1] * self.strides[1] + idx[2]
    }

    /// Convert a flat index to a 3D index.
    pub fn coords(&self, flat: usize) -> [usize; 3] {
        let i = flat / self.strides[0];
        let rem = flat % self.strides[0];
        [i, rem / self.strides[1], rem % self.strides[1]]
    }

    /// Physical position of a cell.
    pub fn position(&self, idx: [usize; 3]) -> [f64; 3] {
        [
            self.origin[0] + idx[0] as f64 * self.spacing,
            self.origin[1] + idx[1] as f64 * self.spacing,
            self.origin[2] + idx[2] as f64 * self.spacing,
        ]
    }

    /// Flat indices of the line through source and receiver along the test axis.
    pub fn axis_line(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.line_length()).map(move |n| {
            let mut idx = self.source;
            idx[self.axis] = n;
            self.index(idx)
        })
    }
}

/// Plan a grid for a sample.
///
/// The spacing starts at `min(vp, vs) / frequency / points_per_wavelength`. An axis
/// that would need more than `max_dim` cells raises the spacing so it still covers
/// its extent, and if the total cell count then exceeds `max_cells` the spacing is
/// scaled by the cube root of the overflow. Spacing never decreases from its
/// initial value.
///
/// # Errors
/// Returns an error if a velocity or the frequency is not positive and finite, the
/// test axis is degenerate, or the limits are inconsistent.
pub fn plan(
    bounds: &Aabb,
    test_axis: [f64; 3],
    vp: f64,
    vs: f64,
    frequency_hz: f64,
    limits: &GridLimits,
) -> Result<SimulationGrid> {
    limits.validate()?;
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(AcousticError::InvalidFrequency(frequency_hz / 1000.0));
    }
    for v in [vp, vs] {
        if !v.is_finite() || v <= 0.0 {
            return Err(AcousticError::InvalidConfig(format!(
                "velocity must be positive and finite, got {}",
                v
            )));
        }
    }
    if test_axis.iter().any(|c| !c.is_finite()) || test_axis.iter().all(|c| *c == 0.0) {
        return Err(AcousticError::InvalidTestAxis(test_axis));
    }
    let mut axis = 0;
    for d in 1..3 {
        if test_axis[d].abs() > test_axis[axis].abs() {
            axis = d;
        }
    }

    let size = bounds.size();
    let extent = size.map(|s| s * (1.0 + 2.0 * limits.padding));
    let origin = [
        bounds.min[0] - limits.padding * size[0],
        bounds.min[1] - limits.padding * size[1],
        bounds.min[2] - limits.padding * size[2],
    ];

    let wavelength = vp.min(vs) / frequency_hz;
    let initial_spacing = wavelength / limits.points_per_wavelength;
    if !initial_spacing.is_finite() || initial_spacing <= 0.0 {
        return Err(AcousticError::InvalidGridSpacing(initial_spacing));
    }

    let mut spacing = initial_spacing;
    for &e in &extent {
        if (e / spacing).ceil() > limits.max_dim as f64 {
            spacing = spacing.max(e / limits.max_dim as f64);
        }
    }
    let mut dims = extent.map(|e| {
        let n = (e / spacing).ceil().max(0.0) as usize;
        n.clamp(limits.min_dim, limits.max_dim)
    });

    let cells: usize = dims.iter().product();
    if cells > limits.max_cells {
        let factor = (cells as f64 / limits.max_cells as f64).cbrt();
        spacing *= factor;
        dims = dims.map(|n| ((n as f64 / factor).floor() as usize).max(limits.min_dim));
        log::info!(
            "grid budget exceeded ({} cells > {}); spacing scaled by {:.3}",
            cells,
            limits.max_cells,
            factor
        );
    }

    for n in dims.iter_mut() {
        if *n % 2 == 1 {
            *n = if *n < limits.max_dim { *n + 1 } else { *n - 1 };
        }
    }
    while dims.iter().product::<usize>() > limits.max_cells {
        let (largest, _) = dims
            .iter()
            .enumerate()
            .max_by_key(|(_, n)| **n)
            .unwrap_or((0, &0));
        if dims[largest] <= limits.min_dim {
            break;
        }
        dims[largest] -= 2;
    }
    for d in 0..3 {
        spacing = spacing.max(extent[d] / dims[d] as f64);
    }

    let mut grid = SimulationGrid::new(dims, spacing, axis)?.with_origin(origin);
    grid.initial_spacing = initial_spacing;
    grid.sample_length = size[axis];

    log::info!(
        "planned grid {}x{}x{} spacing={:.3e} m (initial {:.3e} m) axis={} distance={:.4} m",
        dims[0],
        dims[1],
        dims[2],
        spacing,
        initial_spacing,
        axis,
        grid.source_receiver_distance()
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(edge: f64) -> Aabb {
        Aabb {
            min: [0.0; 3],
            max: [edge; 3],
        }
    }

    #[test]
    fn flat_nd_roundtrip() {
        let grid = SimulationGrid::new([6, 7, 8], 1.0, 0).unwrap();
        for flat in 0..grid.num_cells() {
            let nd = grid.coords(flat);
            assert_eq!(grid.index(nd), flat, "flat={} nd={:?}", flat, nd);
        }
    }

    #[test]
    fn source_receiver_placement() {
        let grid = SimulationGrid::new([16, 8, 12], 0.5, 0).unwrap();
        assert_eq!(grid.source(), [4, 4, 6]);
        assert_eq!(grid.receiver(), [12, 4, 6]);
        assert_eq!(grid.source_receiver_distance(), 4.0);

        let grid = SimulationGrid::new([16, 8, 12], 0.5, 2).unwrap();
        assert_eq!(grid.source(), [8, 4, 3]);
        assert_eq!(grid.receiver(), [8, 4, 9]);
    }

    #[test]
    fn axis_line_follows_test_axis() {
        let grid = SimulationGrid::new([6, 8, 10], 1.0, 1).unwrap();
        let line: Vec<usize> = grid.axis_line().collect();
        assert_eq!(line.len(), 8);
        for (n, flat) in line.iter().enumerate() {
            assert_eq!(grid.coords(*flat), [3, n, 5]);
        }
    }

    #[test]
    fn invalid_grid_spacing() {
        assert!(matches!(
            SimulationGrid::new([8, 8, 8], 0.0, 0),
            Err(AcousticError::InvalidGridSpacing(_))
        ));
    }

    #[test]
    fn invalid_grid_shape() {
        assert!(matches!(
            SimulationGrid::new([8, 4, 8], 1.0, 0),
            Err(AcousticError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unclamped_spacing_matches_wavelength() {
        // 3000 m/s at 100 kHz: wavelength 30 mm, spacing 2.5 mm, 10 mm cube -> few cells
        let grid = plan(&cube(0.01), [1.0, 0.0, 0.0], 4000.0, 3000.0, 1.0e5, &GridLimits::default())
            .unwrap();
        let wavelength = 3000.0 / 1.0e5;
        assert!((grid.spacing() * 12.0 - wavelength).abs() < 1e-12);
        assert_eq!(grid.shape(), [8, 8, 8]);
    }

    #[test]
    fn clamped_axis_raises_spacing() {
        let grid = plan(&cube(0.1), [0.0, 0.0, 1.0], 4000.0, 2000.0, 1.0e6, &GridLimits::default())
            .unwrap();
        assert_eq!(grid.shape(), [128, 128, 128]);
        assert!(grid.spacing() > grid.initial_spacing());
        assert!(grid.spacing() * 128.0 >= 0.1 * 1.1 - 1e-12);
        assert_eq!(grid.axis(), 2);
        assert!((grid.sample_length() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn budget_scaling_with_tight_limits() {
        let limits = GridLimits {
            max_cells: 20_000,
            ..Default::default()
        };
        let grid = plan(&cube(0.05), [1.0, 0.0, 0.0], 4000.0, 2500.0, 5.0e5, &limits).unwrap();
        let shape = grid.shape();
        assert!(shape.iter().product::<usize>() <= 20_000);
        assert!(shape.iter().all(|n| n % 2 == 0 && *n >= 8));
        assert!(grid.spacing() >= grid.initial_spacing());
    }

    #[test]
    fn invariants_hold_across_inputs() {
        let limits = GridLimits::default();
        let sizes = [
            [0.001, 0.001, 0.001],
            [0.05, 0.05, 0.0],
            [0.2, 0.01, 0.03],
            [1.0, 1.0, 1.0],
            [0.013, 0.027, 0.041],
        ];
        for size in sizes {
            for freq in [1.0e3, 5.0e4, 2.5e5, 1.0e6, 5.0e6] {
                for (vp, vs) in [(1500.0, 600.0), (5200.0, 3000.0), (8000.0, 4500.0)] {
                    let bounds = Aabb {
                        min: [-0.5, 0.1, 2.0],
                        max: [-0.5 + size[0], 0.1 + size[1], 2.0 + size[2]],
                    };
                    let grid = plan(&bounds, [0.0, 1.0, 0.0], vp, vs, freq, &limits).unwrap();
                    let shape = grid.shape();
                    for n in shape {
                        assert!(n % 2 == 0 && (8..=128).contains(&n), "{:?}", shape);
                    }
                    assert!(grid.num_cells() <= 8_388_608);
                    assert!(grid.spacing() >= grid.initial_spacing());
                    let wavelength = vp.min(vs) / freq;
                    assert!((grid.initial_spacing() * 12.0 - wavelength).abs() < 1e-9 * wavelength.max(1.0));
                }
            }
        }
    }

    #[test]
    fn rejects_degenerate_axis() {
        assert!(matches!(
            plan(&cube(0.01), [0.0; 3], 4000.0, 2000.0, 1.0e5, &GridLimits::default()),
            Err(AcousticError::InvalidTestAxis(_))
        ));
    }
}
