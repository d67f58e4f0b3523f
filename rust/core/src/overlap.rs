// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detected overlap records.

use serde::{Deserialize, Serialize};

/// One detected clash between two objects.
///
/// Created by the detection engine during a run, persisted by the overlap
/// store, immutable thereafter except for bulk deletion by query id.
/// `overlap_tris == 0` is a valid "touching / within tolerance but no
/// triangle overlap" result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapRecord {
    /// Store-assigned overlap identifier.
    pub overlap_id: i64,
    /// Identifier of the owning query.
    pub query_id: i64,
    /// Tolerance the detection ran with.
    pub tolerance: f64,
    /// Number of overlapping triangles.
    pub overlap_tris: u32,
    /// First clashing time. Equals `end_time` for static runs.
    pub start_time: f64,
    /// Last clashing time. Equals `start_time` for static runs.
    pub end_time: f64,
    /// Number of clashing frames (1 for static runs).
    pub num_records: u32,
    pub object_a_path: String,
    pub object_b_path: String,
    /// Minimum separation distance for clearance (tolerance > 0) clashes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Per-frame detail of a dynamic overlap, used by the bake path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub time: f64,
    pub overlap_tris: u32,
}
