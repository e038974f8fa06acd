// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Proximity clustering of scan points
//!
//! Two points share a cluster when a chain of neighbours, each within
//! `radius` of the next, connects them. Neighbour lookup goes through a
//! uniform hash grid with cell size equal to the radius, so only the 3x3x3
//! block around a point has to be searched.

use pipescan_geometry::Point3D;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// A hash grid over point indices
#[derive(Debug)]
pub struct PointGrid<'a> {
    points: &'a [Point3D],
    cell_size: f64,
    grid: FxHashMap<(i64, i64, i64), Vec<usize>>,
}

impl<'a> PointGrid<'a> {
    /// Index all points with the given cell size (must be positive)
    pub fn new(points: &'a [Point3D], cell_size: f64) -> Self {
        let mut grid: FxHashMap<(i64, i64, i64), Vec<usize>> = FxHashMap::default();
        for (i, p) in points.iter().enumerate() {
            grid.entry(cell_coords(p, cell_size)).or_default().push(i);
        }
        Self {
            points,
            cell_size,
            grid,
        }
    }

    /// All point indices within `radius` of `p` (radius <= cell size)
    pub fn neighbours(&self, p: &Point3D, radius: f64) -> Vec<usize> {
        let (cx, cy, cz) = cell_coords(p, self.cell_size);
        let radius_sq = radius * radius;
        let mut result = Vec::new();

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(indices) = self.grid.get(&(cx + dx, cy + dy, cz + dz)) {
                        result.extend(
                            indices
                                .iter()
                                .copied()
                                .filter(|&i| self.points[i].distance_sq(p) <= radius_sq),
                        );
                    }
                }
            }
        }

        result
    }
}

fn cell_coords(p: &Point3D, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Flood-fill clustering.
///
/// Returns clusters as sorted point-index lists, ordered by their lowest
/// index. Clusters smaller than `min_points` are dropped. Non-finite points
/// never join a cluster.
pub fn cluster_points(points: &[Point3D], radius: f64, min_points: usize) -> Vec<Vec<usize>> {
    if points.is_empty() || !(radius > 0.0) {
        return Vec::new();
    }

    let grid = PointGrid::new(points, radius);
    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        if !points[start].is_finite() {
            continue;
        }

        let mut cluster = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            cluster.push(idx);
            for neighbour in grid.neighbours(&points[idx], radius) {
                if !visited[neighbour] {
                    visited[neighbour] = true;
                    queue.push_back(neighbour);
                }
            }
        }

        if cluster.len() >= min_points.max(1) {
            cluster.sort_unstable();
            clusters.push(cluster);
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_of_points(start_x: f64, y: f64, count: usize, step: f64) -> Vec<Point3D> {
        (0..count)
            .map(|i| Point3D::new(start_x + i as f64 * step, y, 0.0))
            .collect()
    }

    #[test]
    fn test_chain_connects_distant_points() {
        // Endpoints are 9.9 apart but linked through 0.1 steps
        let points = line_of_points(0.0, 0.0, 100, 0.1);
        let clusters = cluster_points(&points, 0.15, 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 100);
    }

    #[test]
    fn test_separate_groups_and_noise() {
        let mut points = line_of_points(0.0, 0.0, 30, 0.1);
        points.extend(line_of_points(0.0, 5.0, 30, 0.1));
        points.push(Point3D::new(50.0, 50.0, 50.0));

        let clusters = cluster_points(&points, 0.15, 5);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0][0], 0);
        assert_eq!(clusters[1][0], 30);
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_points(&[], 0.5, 1).is_empty());
    }

    #[test]
    fn test_grid_neighbours() {
        let points = vec![
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(0.3, 0.0, 0.0),
            Point3D::new(0.9, 0.0, 0.0),
        ];
        let grid = PointGrid::new(&points, 0.5);
        let mut near = grid.neighbours(&points[0], 0.5);
        near.sort_unstable();
        assert_eq!(near, vec![0, 1]);
    }
}
