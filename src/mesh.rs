// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use crate::error::{AcousticError, Result};

/// A triangle with vertices in physical units (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// The three vertices.
    pub vertices: [[f64; 3]; 3],
}

impl Triangle {
    /// Create a triangle from three vertices.
    pub fn new(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Self {
        Triangle {
            vertices: [a, b, c],
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

impl Aabb {
    /// Edge lengths along each axis.
    pub fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Box centre.
    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }
}

/// Ordered triangle soup describing the sample surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Triangles in physical units.
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Wrap a triangle list.
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Mesh { triangles }
    }

    /// Flat rectangle in the z = 0 plane made of two triangles.
    pub fn rectangle(width: f64, height: f64) -> Self {
        let a = [0.0, 0.0, 0.0];
        let b = [width, 0.0, 0.0];
        let c = [width, height, 0.0];
        let d = [0.0, height, 0.0];
        Mesh::new(vec![Triangle::new(a, b, c), Triangle::new(a, c, d)])
    }

    /// Closed box with a corner at the origin, two triangles per face.
    pub fn cuboid(size: [f64; 3]) -> Self {
        let [x, y, z] = size;
        let p = [
            [0.0, 0.0, 0.0],
            [x, 0.0, 0.0],
            [x, y, 0.0],
            [0.0, y, 0.0],
            [0.0, 0.0, z],
            [x, 0.0, z],
            [x, y, z],
            [0.0, y, z],
        ];
        let faces: [[usize; 4]; 6] = [
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 1, 5, 4],
            [2, 3, 7, 6],
            [1, 2, 6, 5],
            [0, 4, 7, 3],
        ];
        let mut triangles = Vec::with_capacity(12);
        for [a, b, c, d] in faces {
            triangles.push(Triangle::new(p[a], p[b], p[c]));
            triangles.push(Triangle::new(p[a], p[c], p[d]));
        }
        Mesh::new(triangles)
    }

    /// Number of triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// True if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Reject empty meshes and non-finite vertices.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AcousticError::EmptyMesh);
        }
        for (index, tri) in self.triangles.iter().enumerate() {
            if tri.vertices.iter().flatten().any(|c| !c.is_finite()) {
                return Err(AcousticError::InvalidConfig(format!(
                    "triangle {} has a non-finite vertex",
                    index
                )));
            }
        }
        Ok(())
    }

    /// Bounding box over all vertices, or an error for an empty mesh.
    pub fn bounds(&self) -> Result<Aabb> {
        if self.is_empty() {
            return Err(AcousticError::EmptyMesh);
        }
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for v in self.triangles.iter().flat_map(|t| t.vertices.iter()) {
            for d in 0..3 {
                min[d] = min[d].min(v[d]);
                max[d] = max[d].max(v[d]);
            }
        }
        Ok(Aabb { min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_bounds() {
        let mesh = Mesh::rectangle(0.05, 0.02);
        assert_eq!(mesh.len(), 2);
        let b = mesh.bounds().unwrap();
        assert_eq!(b.min, [0.0, 0.0, 0.0]);
        assert_eq!(b.max, [0.05, 0.02, 0.0]);
        assert_eq!(b.center(), [0.025, 0.01, 0.0]);
    }

    #[test]
    fn cuboid_has_twelve_triangles() {
        let mesh = Mesh::cuboid([1.0, 2.0, 3.0]);
        assert_eq!(mesh.len(), 12);
        assert_eq!(mesh.bounds().unwrap().size(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let mesh = Mesh::default();
        assert!(matches!(mesh.validate(), Err(AcousticError::EmptyMesh)));
        assert!(matches!(mesh.bounds(), Err(AcousticError::EmptyMesh)));
    }

    #[test]
    fn non_finite_vertex_is_rejected() {
        let mesh = Mesh::new(vec![Triangle::new(
            [0.0, 0.0, 0.0],
            [f64::NAN, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        )]);
        assert!(matches!(
            mesh.validate(),
            Err(AcousticError::InvalidConfig(_))
        ));
    }
}
