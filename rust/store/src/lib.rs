// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Clash-Lite Store
//!
//! Persistence of detection queries and overlap records.
//!
//! [`OverlapStore`] is the contract the orchestrator and the detection
//! engine program against; [`JsonLayerStore`] is the bundled reference
//! backend, keeping one JSON *layer* file per stage. Production backends
//! (SQL-based) plug in behind the same trait.
//!
//! A store is bound to an open document through the stage cache id, never
//! through a direct stage reference. Identifiers are assigned by the
//! store, exactly once, at insert time.

pub mod error;
pub mod json_layer;

pub use error::{Error, Result};
pub use json_layer::JsonLayerStore;

use clash_lite_core::{ClashQuery, FrameRecord, OverlapRecord};
use clash_lite_scene::StageId;
use std::collections::BTreeMap;
use std::path::Path;

/// Persistence contract for detection queries and their overlap rows.
///
/// Call order: `open` first; row operations while open; `save` to flush;
/// `saved` to acknowledge an external save of the owning document;
/// `close` then `destroy` to end the session. `destroy` drops in-memory
/// state only; it never touches disk.
pub trait OverlapStore {
    /// Bind the store to the document registered under `stage_id`.
    ///
    /// With `create_if_missing`, a missing persistence layer is created
    /// fresh (reported by [`OverlapStore::created_new_layer`]); otherwise
    /// a missing layer is an error.
    fn open(&mut self, stage_id: StageId, create_if_missing: bool) -> Result<()>;

    /// Whether `open` created a brand-new layer instead of reusing one.
    fn created_new_layer(&self) -> bool;

    /// Path of the backing layer file.
    fn layer_path(&self) -> Option<&Path>;

    /// Persist a query, assigning and returning its identifier (>= 1).
    fn insert_query(&mut self, query: &ClashQuery) -> Result<i64>;

    /// Persist one overlap, assigning and returning its identifier.
    /// Frame detail is kept for dynamic overlaps and consumed by baking.
    fn insert_overlap(&mut self, record: &OverlapRecord, frames: &[FrameRecord]) -> Result<i64>;

    /// All overlaps owned by a query, keyed by overlap id.
    fn find_all_overlaps_by_query(
        &mut self,
        query_id: i64,
        include_frames: bool,
    ) -> Result<BTreeMap<i64, OverlapRecord>>;

    /// Frame detail for one overlap. Empty for static overlaps.
    fn frames_for_overlap(&mut self, overlap_id: i64) -> Result<Vec<FrameRecord>>;

    /// Delete all overlaps owned by a query. Returns rows removed.
    fn remove_all_overlaps_by_query(&mut self, query_id: i64) -> Result<usize>;

    /// Delete a query row. Returns rows removed (0 or 1).
    fn remove_query_by_id(&mut self, query_id: i64) -> Result<usize>;

    /// Flush pending rows to the backing layer.
    fn save(&mut self) -> Result<()>;

    /// Acknowledge that the owning document was saved.
    fn saved(&mut self);

    /// End the session.
    fn close(&mut self);

    /// Drop in-memory state. Disk is untouched.
    fn destroy(&mut self);
}
