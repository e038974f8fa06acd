// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ground surfaces and planes
//!
//! The ground surface is supplied by the caller. Queries outside the data
//! extent return `None`, which consumers treat as a missing sample rather than
//! a zero elevation.

use crate::error::{Error, Result};
use crate::point::Point3D;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Queryable elevation function over (x, y)
pub trait GroundSurface: Send + Sync {
    /// Ground elevation at `(x, y)`, or `None` when there is no data
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64>;
}

impl<T: GroundSurface + ?Sized> GroundSurface for &T {
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        (**self).elevation_at(x, y)
    }
}

impl<T: GroundSurface + ?Sized> GroundSurface for Box<T> {
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        (**self).elevation_at(x, y)
    }
}

/// Constant-elevation ground
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlatSurface {
    pub elevation: f64,
}

impl FlatSurface {
    pub fn new(elevation: f64) -> Self {
        Self { elevation }
    }
}

impl GroundSurface for FlatSurface {
    fn elevation_at(&self, _x: f64, _y: f64) -> Option<f64> {
        Some(self.elevation)
    }
}

/// Sloped planar ground: `z = z0 + gx * (x - x0) + gy * (y - y0)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaneSurface {
    pub origin: Point3D,
    /// Rise per unit run along x
    pub grade_x: f64,
    /// Rise per unit run along y
    pub grade_y: f64,
}

impl GroundSurface for PlaneSurface {
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        Some(
            self.origin.z + self.grade_x * (x - self.origin.x) + self.grade_y * (y - self.origin.y),
        )
    }
}

/// Regular elevation grid with bilinear interpolation.
///
/// `elevations` is row-major (`row * columns + col`), rows along y. NaN
/// cells mark holes in the survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GridSpec", into = "GridSpec")]
pub struct GridSurface {
    origin_x: f64,
    origin_y: f64,
    spacing: f64,
    columns: usize,
    rows: usize,
    elevations: Vec<f64>,
}

impl GridSurface {
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        spacing: f64,
        columns: usize,
        rows: usize,
        elevations: Vec<f64>,
    ) -> Result<Self> {
        if spacing <= 0.0 || !spacing.is_finite() {
            return Err(Error::InvalidGrid(format!("spacing must be positive, got {}", spacing)));
        }
        if columns < 2 || rows < 2 {
            return Err(Error::InvalidGrid(format!(
                "need at least 2x2 samples, got {}x{}",
                columns, rows
            )));
        }
        if elevations.len() != columns * rows {
            return Err(Error::InvalidGrid(format!(
                "expected {} elevations, got {}",
                columns * rows,
                elevations.len()
            )));
        }
        Ok(Self {
            origin_x,
            origin_y,
            spacing,
            columns,
            rows,
            elevations,
        })
    }

    fn at(&self, col: usize, row: usize) -> f64 {
        self.elevations[row * self.columns + col]
    }
}

#[derive(Serialize, Deserialize)]
struct GridSpec {
    origin_x: f64,
    origin_y: f64,
    spacing: f64,
    columns: usize,
    rows: usize,
    elevations: Vec<f64>,
}

impl TryFrom<GridSpec> for GridSurface {
    type Error = Error;

    fn try_from(g: GridSpec) -> Result<Self> {
        Self::new(g.origin_x, g.origin_y, g.spacing, g.columns, g.rows, g.elevations)
    }
}

impl From<GridSurface> for GridSpec {
    fn from(g: GridSurface) -> Self {
        Self {
            origin_x: g.origin_x,
            origin_y: g.origin_y,
            spacing: g.spacing,
            columns: g.columns,
            rows: g.rows,
            elevations: g.elevations,
        }
    }
}

impl GroundSurface for GridSurface {
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        let fx = (x - self.origin_x) / self.spacing;
        let fy = (y - self.origin_y) / self.spacing;
        let max_x = (self.columns - 1) as f64;
        let max_y = (self.rows - 1) as f64;
        if !(0.0..=max_x).contains(&fx) || !(0.0..=max_y).contains(&fy) {
            return None;
        }

        // Clamp so the far edge interpolates within the last cell
        let c0 = (fx.floor() as usize).min(self.columns - 2);
        let r0 = (fy.floor() as usize).min(self.rows - 2);
        let tx = fx - c0 as f64;
        let ty = fy - r0 as f64;

        let z00 = self.at(c0, r0);
        let z10 = self.at(c0 + 1, r0);
        let z01 = self.at(c0, r0 + 1);
        let z11 = self.at(c0 + 1, r0 + 1);
        if [z00, z10, z01, z11].iter().any(|z| !z.is_finite()) {
            return None;
        }

        let bottom = z00 + (z10 - z00) * tx;
        let top = z01 + (z11 - z01) * tx;
        Some(bottom + (top - bottom) * ty)
    }
}

/// Infinite plane through `origin` with unit `normal`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: Point3D,
    pub normal: Point3D,
}

impl Plane {
    pub fn new(origin: Point3D, normal: Vector3<f64>) -> Result<Self> {
        let len = normal.norm();
        if len < 1e-12 || !len.is_finite() {
            return Err(Error::DegenerateNormal);
        }
        Ok(Self {
            origin,
            normal: Point3D::from_vector(&(normal / len)),
        })
    }

    pub fn normal_vector(&self) -> Vector3<f64> {
        self.normal.to_vector()
    }

    pub fn signed_distance(&self, p: &Point3D) -> f64 {
        self.origin.vector_to(p).dot(&self.normal_vector())
    }

    /// Orthogonal projection of `p` onto the plane
    pub fn project(&self, p: &Point3D) -> Point3D {
        let d = self.signed_distance(p);
        p.offset(&(-d * self.normal_vector()))
    }

    /// In-plane orthonormal basis `(u, v)`
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>) {
        let n = self.normal_vector();
        // Pick the world axis least aligned with the normal
        let helper = if n.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = n.cross(&helper).normalize();
        let v = n.cross(&u);
        (u, v)
    }

    /// Regular grid of points on the plane centered at `origin`.
    ///
    /// `half_u`/`half_v` are half-extents along the in-plane basis.
    pub fn sample_grid(&self, half_u: f64, half_v: f64, steps: usize) -> Vec<Point3D> {
        match steps {
            0 => return Vec::new(),
            1 => return vec![self.origin],
            _ => {}
        }
        let (u, v) = self.basis();
        let denom = (steps - 1) as f64;
        let mut points = Vec::with_capacity(steps * steps);
        for i in 0..steps {
            for j in 0..steps {
                let a = -half_u + 2.0 * half_u * i as f64 / denom;
                let b = -half_v + 2.0 * half_v * j as f64 / denom;
                points.push(self.origin.offset(&(u * a + v * b)));
            }
        }
        points
    }
}
