// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Baking overlaps into inspectable layers.
//!
//! Baking materializes detected overlap geometry into a mesh layer and a
//! material layer so results can be reviewed without the live detection
//! engine. The orchestrator drives the choreography (session sublayers,
//! scoped edit-target switch); the engine only computes the layer content
//! and writes the two files.

use crate::error::{Error, Result};
use clash_lite_core::{FrameRecord, OverlapRecord};
use clash_lite_scene::{Aabb, Stage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the baked layers should be written.
#[derive(Debug, Clone)]
pub struct BakeTargets {
    pub mesh_layer_path: PathBuf,
    pub material_layer_path: PathBuf,
}

impl BakeTargets {
    /// Targets must carry real paths before baking starts.
    pub fn validate(&self) -> Result<()> {
        if self.mesh_layer_path.as_os_str().is_empty()
            || self.material_layer_path.as_os_str().is_empty()
        {
            return Err(Error::BakeNotConfigured);
        }
        Ok(())
    }
}

/// One baked overlap region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedBox {
    pub name: String,
    pub region: Aabb,
    /// Per-frame detail for dynamic overlaps.
    #[serde(default)]
    pub frames: Vec<FrameRecord>,
    pub material: String,
}

/// One baked material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedMaterial {
    pub name: String,
    pub color: [f32; 4],
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MeshLayerDoc {
    meshes: Vec<BakedBox>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MaterialLayerDoc {
    materials: Vec<BakedMaterial>,
}

/// In-memory result of a bake, saved as two independent layer files.
#[derive(Debug, Default)]
pub struct BakedLayers {
    pub meshes: Vec<BakedBox>,
    pub materials: Vec<BakedMaterial>,
}

impl BakedLayers {
    pub fn save_mesh_layer(&self, path: &Path) -> Result<()> {
        let doc = MeshLayerDoc {
            meshes: self.meshes.clone(),
        };
        write_layer(path, &doc)
    }

    pub fn save_material_layer(&self, path: &Path) -> Result<()> {
        let doc = MaterialLayerDoc {
            materials: self.materials.clone(),
        };
        write_layer(path, &doc)
    }
}

fn write_layer<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(doc).expect("layer doc serializes");
    fs::write(path, bytes).map_err(|source| Error::BakeWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Contract of a bake engine.
pub trait BakeEngine {
    /// Compute baked layer content for the given persisted overlaps.
    ///
    /// May fail on missing configuration; the caller restores its edit
    /// target before letting the error propagate.
    fn bake(
        &mut self,
        stage: &Stage,
        overlaps: &[(OverlapRecord, Vec<FrameRecord>)],
        targets: &BakeTargets,
    ) -> Result<BakedLayers>;
}

/// Reference bake engine: one box mesh per overlap region, one shared
/// highlight material.
#[derive(Debug, Default)]
pub struct BoxBakeEngine;

/// Highlight color for baked clash regions (red-orange, translucent).
const CLASH_MATERIAL_COLOR: [f32; 4] = [1.0, 0.42, 0.29, 0.4];
const CLASH_MATERIAL_NAME: &str = "ClashHighlight";

impl BakeEngine for BoxBakeEngine {
    fn bake(
        &mut self,
        stage: &Stage,
        overlaps: &[(OverlapRecord, Vec<FrameRecord>)],
        targets: &BakeTargets,
    ) -> Result<BakedLayers> {
        targets.validate()?;

        let find_aabb = |path: &str, t: f64| -> Option<Aabb> {
            stage
                .root
                .prims
                .iter()
                .find(|p| p.path == path)
                .map(|p| p.aabb_at(t))
        };

        let mut layers = BakedLayers::default();
        for (record, frames) in overlaps {
            // Region at the first clashing time; for static overlaps the
            // time is irrelevant.
            let t = record.start_time;
            let region = match (
                find_aabb(&record.object_a_path, t),
                find_aabb(&record.object_b_path, t),
            ) {
                (Some(a), Some(b)) => a
                    .intersection(&b)
                    // Proximity-only overlaps have no box intersection;
                    // bake the tolerance-inflated contact region instead.
                    .or_else(|| a.inflate(record.tolerance).intersection(&b)),
                _ => None,
            };
            let Some(region) = region else {
                tracing::warn!(
                    overlap_id = record.overlap_id,
                    object_a = %record.object_a_path,
                    object_b = %record.object_b_path,
                    "Skipping bake for overlap with unresolvable region"
                );
                continue;
            };
            layers.meshes.push(BakedBox {
                name: format!("Overlap_{}", record.overlap_id),
                region,
                frames: frames.clone(),
                material: CLASH_MATERIAL_NAME.to_string(),
            });
        }
        if !layers.meshes.is_empty() {
            layers.materials.push(BakedMaterial {
                name: CLASH_MATERIAL_NAME.to_string(),
                color: CLASH_MATERIAL_COLOR,
            });
        }
        tracing::debug!(
            baked = layers.meshes.len(),
            skipped = overlaps.len() - layers.meshes.len(),
            "Bake computed"
        );
        Ok(layers)
    }
}
