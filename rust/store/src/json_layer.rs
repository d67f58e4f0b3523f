// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON layer store.
//!
//! Persists queries and overlap rows in a single JSON layer file placed
//! next to the stage: `<stage-stem>.clashdata.json`. The stage path is
//! resolved through the stage cache at open time.

use crate::error::{Error, Result};
use crate::OverlapStore;
use clash_lite_core::{ClashQuery, FrameRecord, OverlapRecord};
use clash_lite_scene::{StageCache, StageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of layer files produced by this store.
pub const LAYER_SUFFIX: &str = "clashdata.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct LayerData {
    next_query_id: i64,
    next_overlap_id: i64,
    queries: Vec<ClashQuery>,
    overlaps: Vec<OverlapRecord>,
    #[serde(default)]
    frames: BTreeMap<i64, Vec<FrameRecord>>,
}

#[derive(Debug)]
struct OpenLayer {
    path: PathBuf,
    data: LayerData,
    created_new: bool,
    dirty: bool,
}

/// Reference [`OverlapStore`] backed by one JSON layer file per stage.
#[derive(Debug, Default)]
pub struct JsonLayerStore {
    open: Option<OpenLayer>,
}

impl JsonLayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer file path for a given stage path.
    pub fn layer_path_for(stage_path: &Path) -> PathBuf {
        let stem = stage_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stage".into());
        stage_path.with_file_name(format!("{stem}.{LAYER_SUFFIX}"))
    }

    fn layer(&self) -> Result<&OpenLayer> {
        self.open.as_ref().ok_or(Error::NotOpen)
    }

    fn layer_mut(&mut self) -> Result<&mut OpenLayer> {
        self.open.as_mut().ok_or(Error::NotOpen)
    }
}

impl OverlapStore for JsonLayerStore {
    fn open(&mut self, stage_id: StageId, create_if_missing: bool) -> Result<()> {
        let stage_path = StageCache::resolve(stage_id).ok_or(Error::UnknownStage(stage_id))?;
        let path = Self::layer_path_for(&stage_path);

        let (data, created_new) = if path.exists() {
            let bytes = fs::read(&path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            let data = serde_json::from_slice(&bytes).map_err(|source| Error::Corrupt {
                path: path.clone(),
                source,
            })?;
            (data, false)
        } else if create_if_missing {
            (
                LayerData {
                    next_query_id: 1,
                    next_overlap_id: 1,
                    ..LayerData::default()
                },
                true,
            )
        } else {
            return Err(Error::MissingLayer(path));
        };

        tracing::debug!(
            layer = %path.display(),
            created_new,
            queries = data.queries.len(),
            overlaps = data.overlaps.len(),
            "Opened clash data layer"
        );
        self.open = Some(OpenLayer {
            path,
            data,
            created_new,
            dirty: false,
        });
        Ok(())
    }

    fn created_new_layer(&self) -> bool {
        self.open.as_ref().is_some_and(|l| l.created_new)
    }

    fn layer_path(&self) -> Option<&Path> {
        self.open.as_ref().map(|l| l.path.as_path())
    }

    fn insert_query(&mut self, query: &ClashQuery) -> Result<i64> {
        let layer = self.layer_mut()?;
        let id = layer.data.next_query_id;
        layer.data.next_query_id += 1;
        layer
            .data
            .queries
            .push(query.clone().with_identifier(id));
        layer.dirty = true;
        Ok(id)
    }

    fn insert_overlap(&mut self, record: &OverlapRecord, frames: &[FrameRecord]) -> Result<i64> {
        let layer = self.layer_mut()?;
        let id = layer.data.next_overlap_id;
        layer.data.next_overlap_id += 1;
        let mut record = record.clone();
        record.overlap_id = id;
        layer.data.overlaps.push(record);
        if !frames.is_empty() {
            layer.data.frames.insert(id, frames.to_vec());
        }
        layer.dirty = true;
        Ok(id)
    }

    fn find_all_overlaps_by_query(
        &mut self,
        query_id: i64,
        _include_frames: bool,
    ) -> Result<BTreeMap<i64, OverlapRecord>> {
        let layer = self.layer()?;
        Ok(layer
            .data
            .overlaps
            .iter()
            .filter(|o| o.query_id == query_id)
            .map(|o| (o.overlap_id, o.clone()))
            .collect())
    }

    fn frames_for_overlap(&mut self, overlap_id: i64) -> Result<Vec<FrameRecord>> {
        let layer = self.layer()?;
        Ok(layer.data.frames.get(&overlap_id).cloned().unwrap_or_default())
    }

    fn remove_all_overlaps_by_query(&mut self, query_id: i64) -> Result<usize> {
        let layer = self.layer_mut()?;
        let before = layer.data.overlaps.len();
        let removed_ids: Vec<i64> = layer
            .data
            .overlaps
            .iter()
            .filter(|o| o.query_id == query_id)
            .map(|o| o.overlap_id)
            .collect();
        layer.data.overlaps.retain(|o| o.query_id != query_id);
        for id in &removed_ids {
            layer.data.frames.remove(id);
        }
        let removed = before - layer.data.overlaps.len();
        if removed > 0 {
            layer.dirty = true;
        }
        Ok(removed)
    }

    fn remove_query_by_id(&mut self, query_id: i64) -> Result<usize> {
        let layer = self.layer_mut()?;
        let before = layer.data.queries.len();
        layer.data.queries.retain(|q| q.identifier() != query_id);
        let removed = before - layer.data.queries.len();
        if removed > 0 {
            layer.dirty = true;
        }
        Ok(removed)
    }

    fn save(&mut self) -> Result<()> {
        let layer = self.layer_mut()?;
        let bytes = serde_json::to_vec_pretty(&layer.data).expect("layer data serializes");
        fs::write(&layer.path, bytes).map_err(|source| Error::Io {
            path: layer.path.clone(),
            source,
        })?;
        layer.dirty = false;
        tracing::debug!(layer = %layer.path.display(), "Saved clash data layer");
        Ok(())
    }

    fn saved(&mut self) {
        if let Some(layer) = self.open.as_mut() {
            // The owning stage was saved; the layer reference is now
            // durable, so the layer no longer counts as brand new.
            layer.created_new = false;
        }
    }

    fn close(&mut self) {
        if let Some(layer) = self.open.as_ref() {
            if layer.dirty {
                tracing::warn!(
                    layer = %layer.path.display(),
                    "Closing clash data layer with unsaved rows"
                );
            }
        }
    }

    fn destroy(&mut self) {
        self.open = None;
    }
}
