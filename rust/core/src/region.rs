// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point cloud regions: the input unit of work.

use pipescan_geometry::{Aabb, Point3D};
use serde::{Deserialize, Serialize};

/// Named, bounded set of scan points. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudRegion {
    pub id: String,
    pub points: Vec<Point3D>,
}

impl PointCloudRegion {
    pub fn new(id: impl Into<String>, points: Vec<Point3D>) -> Self {
        Self {
            id: id.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.points)
    }
}
