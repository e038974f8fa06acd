// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run connectivity graph
//!
//! Nodes are run endpoints, merged when they lie within tolerance (spatial
//! hash, 3x3x3 neighbourhood search). Edges are runs. Keys come from
//! `slotmap`, so runs and endpoints reference each other by index rather
//! than by pointer.

use crate::sink::RunHandle;
use pipescan_core::ElementId;
use pipescan_geometry::Point3D;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::collections::VecDeque;

new_key_type! {
    /// Key for a network node (shared run endpoint)
    pub struct NodeKey;

    /// Key for a network edge (one materialized run)
    pub struct RunKey;
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub position: Point3D,
    pub runs: SmallVec<[RunKey; 4]>,
}

#[derive(Debug, Clone)]
pub struct RunData {
    pub element_id: ElementId,
    pub handle: RunHandle,
    pub start: NodeKey,
    pub end: NodeKey,
}

/// Endpoint graph of materialized runs
#[derive(Debug)]
pub struct NetworkGraph {
    nodes: SlotMap<NodeKey, NodeData>,
    runs: SlotMap<RunKey, RunData>,
    tolerance: f64,
    grid: FxHashMap<(i64, i64, i64), Vec<NodeKey>>,
}

impl NetworkGraph {
    /// `tolerance` must be positive; it is also the hash cell size
    pub fn new(tolerance: f64) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            runs: SlotMap::with_key(),
            tolerance,
            grid: FxHashMap::default(),
        }
    }

    fn cell_coords(&self, p: &Point3D) -> (i64, i64, i64) {
        (
            (p.x / self.tolerance).floor() as i64,
            (p.y / self.tolerance).floor() as i64,
            (p.z / self.tolerance).floor() as i64,
        )
    }

    /// Nearest existing node within tolerance
    pub fn find_node_near(&self, p: &Point3D) -> Option<NodeKey> {
        let (cx, cy, cz) = self.cell_coords(p);
        let tol_sq = self.tolerance * self.tolerance;
        let mut best: Option<(f64, NodeKey)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(keys) = self.grid.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &key in keys {
                        let Some(node) = self.nodes.get(key) else {
                            continue;
                        };
                        let d = node.position.distance_sq(p);
                        if d <= tol_sq && best.map_or(true, |(bd, _)| d < bd) {
                            best = Some((d, key));
                        }
                    }
                }
            }
        }
        best.map(|(_, key)| key)
    }

    /// Returns an existing node within tolerance, or creates one
    pub fn find_or_add_node(&mut self, p: Point3D) -> NodeKey {
        if let Some(key) = self.find_node_near(&p) {
            return key;
        }
        let cell = self.cell_coords(&p);
        let key = self.nodes.insert(NodeData {
            position: p,
            runs: SmallVec::new(),
        });
        self.grid.entry(cell).or_default().push(key);
        key
    }

    pub fn add_run(
        &mut self,
        element_id: ElementId,
        handle: RunHandle,
        start: Point3D,
        end: Point3D,
    ) -> RunKey {
        let start = self.find_or_add_node(start);
        let end = self.find_or_add_node(end);
        let key = self.runs.insert(RunData {
            element_id,
            handle,
            start,
            end,
        });
        if let Some(node) = self.nodes.get_mut(start) {
            node.runs.push(key);
        }
        if end != start {
            if let Some(node) = self.nodes.get_mut(end) {
                node.runs.push(key);
            }
        }
        key
    }

    pub fn node(&self, key: NodeKey) -> Option<&NodeData> {
        self.nodes.get(key)
    }

    pub fn run(&self, key: RunKey) -> Option<&RunData> {
        self.runs.get(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Nodes shared by two or more runs, in insertion order
    pub fn junctions(&self) -> impl Iterator<Item = (NodeKey, &NodeData)> + '_ {
        self.nodes.iter().filter(|(_, n)| n.runs.len() >= 2)
    }

    /// Runs grouped into connected networks, in insertion order
    pub fn connected_components(&self) -> Vec<Vec<RunKey>> {
        let mut visited: FxHashSet<RunKey> = FxHashSet::default();
        let mut components = Vec::new();

        for (start, _) in self.runs.iter() {
            if !visited.insert(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            queue.push_back(start);

            while let Some(run_key) = queue.pop_front() {
                component.push(run_key);
                let Some(run) = self.runs.get(run_key) else {
                    continue;
                };
                for node_key in [run.start, run.end] {
                    let Some(node) = self.nodes.get(node_key) else {
                        continue;
                    };
                    for &next in &node.runs {
                        if visited.insert(next) {
                            queue.push_back(next);
                        }
                    }
                }
            }
            components.push(component);
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Point3D {
        Point3D::new(x, y, 0.0)
    }

    #[test]
    fn endpoints_merge_within_tolerance() {
        let mut graph = NetworkGraph::new(0.5);
        graph.add_run(ElementId(1), RunHandle(1), pt(0.0, 0.0), pt(10.0, 0.0));
        graph.add_run(ElementId(2), RunHandle(2), pt(10.2, 0.1), pt(10.0, 10.0));
        graph.add_run(ElementId(3), RunHandle(3), pt(50.0, 0.0), pt(60.0, 0.0));

        assert_eq!(graph.node_count(), 5);
        let junctions: Vec<_> = graph.junctions().collect();
        assert_eq!(junctions.len(), 1);
        assert_eq!(junctions[0].1.runs.len(), 2);

        let components = graph.connected_components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].len(), 2);
    }
}
