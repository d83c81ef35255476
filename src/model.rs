// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Per-cell velocity and density models built from the sample mesh.
//!
//! Cells are classified as rock when they lie within 1.5 cell spacings of a mesh
//! vertex. This is a proxy for point-in-solid containment: large triangles only
//! mark the neighbourhood of their corners, and cells near concave regions can be
//! misclassified.

use ndarray::Array3;
use serde::Serialize;

use crate::grid::SimulationGrid;
use crate::mesh::Mesh;

/// Speed of sound in air (m/s).
pub const AIR_VELOCITY: f64 = 343.0;
/// Density of air (kg/m³).
pub const AIR_DENSITY: f64 = 1.2;

/// Marking radius around each vertex, in cell spacings.
const VERTEX_RADIUS: f64 = 1.5;

/// Fraction of breaking pressure where micro-cracking starts to soften the rock.
const CRACK_ONSET: f64 = 0.8;
/// Velocity gain at full stress in the stiffening regime.
const STRESS_STIFFENING: f64 = 0.1;
/// Velocity loss per unit of stress ratio past crack onset.
const CRACK_SOFTENING: f64 = 1.0;

/// Velocity multiplier for a cell loaded to `stress_ratio` of breaking pressure.
///
/// Rises with the square root of the ratio up to crack onset, then falls linearly.
/// Continuous at the onset.
pub fn stress_velocity_multiplier(stress_ratio: f64) -> f64 {
    let r = stress_ratio.max(0.0);
    if r < CRACK_ONSET {
        1.0 + STRESS_STIFFENING * r.sqrt()
    } else {
        1.0 + STRESS_STIFFENING * CRACK_ONSET.sqrt() - CRACK_SOFTENING * (r - CRACK_ONSET)
    }
}

/// Rock coverage and mean rock properties of a voxelized model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSummary {
    /// Cells classified as rock.
    pub rock_cells: usize,
    /// All cells in the model.
    pub total_cells: usize,
    /// Mean velocity over rock cells (m/s), zero without rock.
    pub mean_rock_velocity: f64,
    /// Mean density over rock cells (kg/m³), zero without rock.
    pub mean_rock_density: f64,
}

/// Velocity and density per grid cell.
#[derive(Debug, Clone)]
pub struct VelocityModel {
    velocity: Array3<f64>,
    density: Array3<f64>,
    rock: Array3<bool>,
}

impl VelocityModel {
    /// Uniform model with every cell set to the given values and marked as rock.
    pub fn homogeneous(grid: &SimulationGrid, velocity: f64, density: f64) -> Self {
        let shape = grid.shape();
        let dim = (shape[0], shape[1], shape[2]);
        VelocityModel {
            velocity: Array3::from_elem(dim, velocity),
            density: Array3::from_elem(dim, density),
            rock: Array3::from_elem(dim, true),
        }
    }

    /// Voxelize `mesh` onto `grid`.
    ///
    /// Every cell starts as air. Cells within 1.5 spacings of any triangle vertex
    /// take the rock velocity and density. With a breaking pressure, rock cells are
    /// then scaled by [`stress_velocity_multiplier`] using a stress that decays
    /// from the grid centre outward.
    pub fn build(
        grid: &SimulationGrid,
        mesh: &Mesh,
        velocity: f64,
        density: f64,
        breaking_pressure: Option<f64>,
    ) -> Self {
        let shape = grid.shape();
        let dim = (shape[0], shape[1], shape[2]);
        let mut model = VelocityModel {
            velocity: Array3::from_elem(dim, AIR_VELOCITY),
            density: Array3::from_elem(dim, AIR_DENSITY),
            rock: Array3::from_elem(dim, false),
        };

        let h = grid.spacing();
        let origin = grid.origin();
        let radius = VERTEX_RADIUS * h;
        let radius_sq = radius * radius;

        for vertex in mesh.triangles.iter().flat_map(|t| t.vertices.iter()) {
            let mut lo = [0usize; 3];
            let mut hi = [0usize; 3];
            let mut outside = false;
            for d in 0..3 {
                let c = (vertex[d] - origin[d]) / h;
                let first = (c - VERTEX_RADIUS).ceil().max(0.0);
                let last = (c + VERTEX_RADIUS).floor().min((shape[d] - 1) as f64);
                if first > last {
                    outside = true;
                    break;
                }
                lo[d] = first as usize;
                hi[d] = last as usize;
            }
            if outside {
                continue;
            }
            for i in lo[0]..=hi[0] {
                for j in lo[1]..=hi[1] {
                    for k in lo[2]..=hi[2] {
                        let p = grid.position([i, j, k]);
                        let dist_sq = (p[0] - vertex[0]).powi(2)
                            + (p[1] - vertex[1]).powi(2)
                            + (p[2] - vertex[2]).powi(2);
                        if dist_sq <= radius_sq {
                            model.velocity[[i, j, k]] = velocity;
                            model.density[[i, j, k]] = density;
                            model.rock[[i, j, k]] = true;
                        }
                    }
                }
            }
        }

        if let Some(bp) = breaking_pressure.filter(|p| *p > 0.0) {
            model.apply_stress(grid, bp);
        }

        log::debug!(
            "velocity model: {} of {} cells marked as rock",
            model.rock_cells(),
            grid.num_cells()
        );
        model
    }

    fn apply_stress(&mut self, grid: &SimulationGrid, breaking_pressure: f64) {
        let shape = grid.shape();
        let center = shape.map(|n| (n - 1) as f64 / 2.0);
        let half_diagonal = (center[0].powi(2) + center[1].powi(2) + center[2].powi(2)).sqrt();

        for ((idx, v), &is_rock) in self.velocity.indexed_iter_mut().zip(self.rock.iter()) {
            if !is_rock {
                continue;
            }
            let (i, j, k) = idx;
            let dist = ((i as f64 - center[0]).powi(2)
                + (j as f64 - center[1]).powi(2)
                + (k as f64 - center[2]).powi(2))
            .sqrt();
            let normalized = (dist / half_diagonal).min(1.0);
            let stress_factor = 1.0 - 0.5 * normalized;
            let local_stress = breaking_pressure * stress_factor;
            *v *= stress_velocity_multiplier(local_stress / breaking_pressure);
        }
    }

    /// Velocity per cell (m/s).
    pub fn velocity(&self) -> &Array3<f64> {
        &self.velocity
    }

    /// Number of cells classified as rock.
    pub fn rock_cells(&self) -> usize {
        self.rock.iter().filter(|r| **r).count()
    }

    /// Rock coverage and mean rock velocity and density.
    pub fn summary(&self) -> ModelSummary {
        let mut rock_cells = 0;
        let mut velocity = 0.0;
        let mut density = 0.0;
        for ((&is_rock, &v), &rho) in self.rock.iter().zip(&self.velocity).zip(&self.density) {
            if is_rock {
                rock_cells += 1;
                velocity += v;
                density += rho;
            }
        }
        let mean = |sum: f64| {
            if rock_cells == 0 {
                0.0
            } else {
                sum / rock_cells as f64
            }
        };
        ModelSummary {
            rock_cells,
            total_cells: self.rock.len(),
            mean_rock_velocity: mean(velocity),
            mean_rock_density: mean(density),
        }
    }

    /// Largest velocity in the model.
    pub fn max_velocity(&self) -> f64 {
        self.velocity.iter().copied().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangle;

    fn grid() -> SimulationGrid {
        SimulationGrid::new([16, 16, 16], 1.0, 0).unwrap()
    }

    #[test]
    fn empty_neighbourhood_is_air() {
        let g = grid();
        let mesh = Mesh::new(vec![Triangle::new(
            [100.0, 100.0, 100.0],
            [101.0, 100.0, 100.0],
            [100.0, 101.0, 100.0],
        )]);
        let model = VelocityModel::build(&g, &mesh, 3000.0, 2500.0, None);
        assert_eq!(model.rock_cells(), 0);
        assert!(model.velocity().iter().all(|v| *v == AIR_VELOCITY));
        assert!(model.density.iter().all(|r| *r == AIR_DENSITY));
        let summary = model.summary();
        assert_eq!(summary.rock_cells, 0);
        assert_eq!(summary.total_cells, 16 * 16 * 16);
        assert_eq!(summary.mean_rock_density, 0.0);
    }

    #[test]
    fn marks_cells_near_vertices_only() {
        let g = grid();
        let mesh = Mesh::new(vec![Triangle::new(
            [2.0, 2.0, 2.0],
            [12.0, 2.0, 2.0],
            [2.0, 12.0, 2.0],
        )]);
        let model = VelocityModel::build(&g, &mesh, 3000.0, 2500.0, None);
        // vertex cell and its face neighbours lie within 1.5 spacings
        assert_eq!(model.velocity()[[2, 2, 2]], 3000.0);
        assert_eq!(model.velocity()[[3, 2, 2]], 3000.0);
        assert_eq!(model.velocity()[[3, 3, 2]], 3000.0);
        // (1,1,1) away: sqrt(3) > 1.5
        assert_eq!(model.velocity()[[3, 3, 3]], AIR_VELOCITY);
        // triangle interior is not filled
        assert_eq!(model.velocity()[[5, 5, 2]], AIR_VELOCITY);
        assert_eq!(model.density[[12, 2, 2]], 2500.0);
        // 19 cells per vertex (centre, 6 faces, 12 edges)
        assert_eq!(model.rock_cells(), 3 * 19);
        let summary = model.summary();
        assert_eq!(summary.rock_cells, 3 * 19);
        assert_eq!(summary.mean_rock_velocity, 3000.0);
        assert_eq!(summary.mean_rock_density, 2500.0);
    }

    #[test]
    fn vertices_on_grid_edge_are_clipped() {
        let g = grid();
        let mesh = Mesh::new(vec![Triangle::new(
            [0.0, 0.0, 0.0],
            [15.0, 15.0, 15.0],
            [-5.0, 0.0, 0.0],
        )]);
        let model = VelocityModel::build(&g, &mesh, 3000.0, 2500.0, None);
        assert_eq!(model.velocity()[[0, 0, 0]], 3000.0);
        assert_eq!(model.velocity()[[15, 15, 15]], 3000.0);
    }

    #[test]
    fn stress_multiplier_shape() {
        assert_eq!(stress_velocity_multiplier(0.0), 1.0);
        assert!(stress_velocity_multiplier(0.5) > stress_velocity_multiplier(0.2));
        assert!(stress_velocity_multiplier(0.79) > 1.0);
        assert!(stress_velocity_multiplier(1.0) < stress_velocity_multiplier(0.8));
        let below = stress_velocity_multiplier(0.8 - 1e-9);
        let at = stress_velocity_multiplier(0.8);
        assert!((below - at).abs() < 1e-6);
    }

    #[test]
    fn stress_softens_centre_and_stiffens_edges() {
        let g = grid();
        let model = VelocityModel::build(
            &g,
            &Mesh::new(vec![
                Triangle::new([7.5, 7.5, 7.5], [7.5, 7.5, 7.5], [7.5, 7.5, 7.5]),
                Triangle::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
            ]),
            3000.0,
            2500.0,
            Some(100.0),
        );
        // centre cells carry near-breaking stress (ratio ~1): softened
        assert!(model.velocity()[[7, 7, 7]] < 3000.0);
        // corner carries half the breaking stress: stiffened
        assert!(model.velocity()[[0, 0, 0]] > 3000.0);
        // air is untouched
        assert_eq!(model.velocity()[[0, 15, 0]], AIR_VELOCITY);
    }

    #[test]
    fn homogeneous_max_velocity() {
        let model = VelocityModel::homogeneous(&grid(), 2500.0, 2000.0);
        assert_eq!(model.max_velocity(), 2500.0);
        assert_eq!(model.rock_cells(), 16 * 16 * 16);
    }
}
