// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Full run / clean_up lifecycle against real files on disk.

use clash_lite_core::{ClashQuery, ClashSettings, FrameRecord, OverlapRecord};
use clash_lite_job::{
    ClashJob, EngineConfigRecovery, JobError, JobParams, JobState, ProgressPhase,
};
use clash_lite_scene::{Stage, StageId};
use clash_lite_store::{JsonLayerStore, OverlapStore};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn write_stage(dir: &Path, doc: serde_json::Value) -> PathBuf {
    let path = dir.join("model.stage.json");
    fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
    path
}

fn intersecting_cubes() -> serde_json::Value {
    serde_json::json!({
        "name": "model",
        "prims": [
            { "path": "/World/A", "aabb": { "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0] } },
            { "path": "/World/B", "aabb": { "min": [0.5, 0.0, 0.0], "max": [1.5, 1.0, 1.0] } }
        ],
        "sublayers": []
    })
}

fn disjoint_cubes() -> serde_json::Value {
    serde_json::json!({
        "name": "model",
        "prims": [
            { "path": "/World/A", "aabb": { "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0] } },
            { "path": "/World/B", "aabb": { "min": [5.0, 0.0, 0.0], "max": [6.0, 1.0, 1.0] } }
        ],
        "sublayers": []
    })
}

fn layer_path_of(stage_path: &Path) -> PathBuf {
    JsonLayerStore::layer_path_for(stage_path)
}

fn layer_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn run_then_clean_up_removes_every_side_effect() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());
    let html = dir.path().join("report.html");
    let json = dir.path().join("report.json");

    let params = JobParams::new(&stage_path)
        .scope("/World/A", "/World/B")
        .named("Walls vs ducts", "nightly check")
        .export_html(&html)
        .export_json(&json);
    let mut job = ClashJob::configure(params).unwrap();
    let report = job.run().unwrap();

    assert_eq!(report.overlap_count, 1);
    assert!(report.export_error.is_none());
    assert_eq!(job.state(), JobState::Closed);
    assert!(job.query().is_persisted());

    let layer = layer_path_of(&stage_path);
    assert!(layer.exists());
    assert!(html.exists());
    assert!(json.exists());

    // The stage references the layer relative to its own directory.
    let stage = Stage::open(&stage_path).unwrap();
    assert!(stage.has_sublayer("model.stage.clashdata.json"));

    let undo = job.clean_up();
    assert!(undo.success);
    assert_eq!(job.state(), JobState::CleanedUp);
    assert!(!job.query().is_persisted());
    // Fresh layer: deleted wholesale, reference included. The export
    // files and the layer were all actually removed.
    assert!(!layer.exists());
    assert!(!html.exists());
    assert!(!json.exists());
    assert_eq!(undo.files_deleted.len(), 3);

    let stage = Stage::open(&stage_path).unwrap();
    assert!(!stage.has_sublayer("model.stage.clashdata.json"));
}

#[test]
fn reused_layer_gets_targeted_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());

    let mut first = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .named("first", ""),
    )
    .unwrap();
    first.run().unwrap();

    let mut second = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .named("second", ""),
    )
    .unwrap();
    second.run().unwrap();

    let layer = layer_path_of(&stage_path);
    let doc = layer_json(&layer);
    assert_eq!(doc["queries"].as_array().unwrap().len(), 2);
    assert_eq!(doc["overlaps"].as_array().unwrap().len(), 2);

    // Undoing the second run must not disturb the first run's rows.
    let undo = second.clean_up();
    assert!(undo.success);
    assert_eq!(undo.overlaps_removed, 1);
    assert_eq!(undo.queries_removed, 1);
    assert!(!second.query().is_persisted());

    assert!(layer.exists());
    let doc = layer_json(&layer);
    assert_eq!(doc["queries"].as_array().unwrap().len(), 1);
    assert_eq!(doc["queries"][0]["name"], "first");
    assert_eq!(doc["overlaps"].as_array().unwrap().len(), 1);
    assert!(first.query().is_persisted());
}

#[test]
fn zero_overlaps_is_a_valid_result() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), disjoint_cubes());
    let json = dir.path().join("report.json");

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .export_json(&json),
    )
    .unwrap();
    let report = job.run().unwrap();

    assert_eq!(report.overlap_count, 0);
    assert!(report.export_error.is_none());
    // Export is still written: an empty row set renders as an empty
    // array, not as a failure.
    let rows: serde_json::Value = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[test]
fn exported_json_carries_one_object_per_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());
    let json = dir.path().join("report.json");

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .export_json(&json),
    )
    .unwrap();
    let report = job.run().unwrap();

    let rows: serde_json::Value = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), report.overlap_count);
    assert_eq!(rows[0]["Object A"], "/World/A");
    assert_eq!(rows[0]["Object B"], "/World/B");
    // Both unit-ish cubes have 12 triangles; a hard clash sums them.
    assert_eq!(rows[0]["Overlapping Tris"], "24");
    // Static zero-tolerance run: no Min Distance or Comment columns.
    assert!(rows[0].get("Min Distance").is_none());
    assert!(rows[0].get("Comment").is_none());
}

#[test]
fn duplicate_search_export_includes_comment_column() {
    let dir = tempfile::tempdir().unwrap();
    let doc = serde_json::json!({
        "prims": [
            { "path": "/World/A", "aabb": { "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0] } },
            { "path": "/World/B", "aabb": { "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0] } }
        ]
    });
    let stage_path = write_stage(dir.path(), doc);
    let json = dir.path().join("report.json");

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World", "/World")
            .settings(ClashSettings {
                // Dynamic flag set but overridden by duplicate search.
                dynamic: true,
                start_time: 0.0,
                end_time: 10.0,
                duplicate_search: true,
                ..ClashSettings::default()
            })
            .export_json(&json),
    )
    .unwrap();
    let report = job.run().unwrap();

    assert_eq!(report.overlap_count, 1);
    let rows: serde_json::Value = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
    assert_eq!(rows[0]["Comment"], "duplicate");
}

#[test]
fn progress_events_reach_the_sink() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());

    let events = Rc::new(RefCell::new(Vec::new()));
    let collected = Rc::clone(&events);
    let mut job = ClashJob::configure(
        JobParams::new(&stage_path).scope("/World/A", "/World/B"),
    )
    .unwrap()
    .with_progress_sink(move |event| collected.borrow_mut().push(event));
    job.run().unwrap();

    let events = events.borrow();
    assert!(events.iter().any(|e| e.phase == ProgressPhase::Pipeline));
    let saving: Vec<_> = events
        .iter()
        .filter(|e| e.phase == ProgressPhase::Saving)
        .collect();
    assert!(!saving.is_empty());
    assert_eq!(saving.last().unwrap().percent, 100);
}

#[test]
fn missing_stage_file_fails_before_any_side_effect() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = dir.path().join("missing.stage.json");
    let mut job = ClashJob::configure(
        JobParams::new(&stage_path).scope("/World/A", "/World/B"),
    )
    .unwrap();
    assert!(matches!(job.run(), Err(JobError::Open(_))));
    assert!(!layer_path_of(&stage_path).exists());
}

#[test]
fn empty_stage_path_is_rejected() {
    let mut job = ClashJob::configure(JobParams::new("").scope("/World/A", "/World/B")).unwrap();
    assert!(matches!(job.run(), Err(JobError::EmptyStagePath)));
}

#[test]
fn invalid_scope_fails_at_configure_time() {
    let err = ClashJob::configure(JobParams::new("model.stage.json").scope("  ", "/World/B"))
        .err()
        .unwrap();
    assert!(matches!(err, JobError::InvalidScope(_)));
}

#[test]
fn invalid_settings_fail_at_configure_time() {
    let err = ClashJob::configure(
        JobParams::new("model.stage.json")
            .scope("/World/A", "/World/B")
            .settings(ClashSettings {
                tolerance: -1.0,
                ..ClashSettings::default()
            }),
    )
    .err()
    .unwrap();
    assert!(matches!(err, JobError::InvalidSettings(_)));
}

#[test]
fn engine_config_failure_leaves_query_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path).scope("/Nowhere", "/World/B"),
    )
    .unwrap();
    assert!(matches!(job.run(), Err(JobError::EngineConfig(_))));

    // Default recovery: the persisted query is left behind for an
    // explicit cleanup pass.
    assert!(job.query().is_persisted());
    let layer = layer_path_of(&stage_path);
    assert!(layer.exists());
    let doc = layer_json(&layer);
    assert_eq!(doc["queries"].as_array().unwrap().len(), 1);

    // The failed run created that layer, so cleanup deletes it
    // wholesale rather than leaving an empty file behind.
    let undo = job.clean_up();
    assert!(undo.success);
    assert!(!layer.exists());
    assert!(!job.query().is_persisted());
}

#[test]
fn engine_config_leftover_on_reused_layer_gets_row_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());

    let mut first = ClashJob::configure(
        JobParams::new(&stage_path).scope("/World/A", "/World/B"),
    )
    .unwrap();
    first.run().unwrap();

    let mut second = ClashJob::configure(
        JobParams::new(&stage_path).scope("/Nowhere", "/World/B"),
    )
    .unwrap();
    assert!(matches!(second.run(), Err(JobError::EngineConfig(_))));
    assert!(second.query().is_persisted());

    let layer = layer_path_of(&stage_path);
    assert_eq!(layer_json(&layer)["queries"].as_array().unwrap().len(), 2);

    // The layer predates the failed run: only its own query row goes.
    let undo = second.clean_up();
    assert!(undo.success);
    assert_eq!(undo.queries_removed, 1);
    assert_eq!(undo.overlaps_removed, 0);
    assert!(layer.exists());
    let doc = layer_json(&layer);
    assert_eq!(doc["queries"].as_array().unwrap().len(), 1);
    assert_eq!(doc["overlaps"].as_array().unwrap().len(), 1);
}

#[test]
fn cleanup_by_identifier_without_a_prior_run() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path).scope("/World/A", "/World/B"),
    )
    .unwrap();
    job.run().unwrap();
    let query_id = job.query().identifier();

    // A fresh job instance, as a separate process would build it.
    let mut cleaner = ClashJob::for_persisted_query(&stage_path, query_id);
    let undo = cleaner.clean_up();
    assert!(undo.success);
    assert_eq!(undo.overlaps_removed, 1);
    assert_eq!(undo.queries_removed, 1);
    assert!(!cleaner.query().is_persisted());

    // The layer itself stays: this instance did not create it.
    let layer = layer_path_of(&stage_path);
    assert!(layer.exists());
    assert_eq!(layer_json(&layer)["queries"].as_array().unwrap().len(), 0);
}

#[test]
fn engine_config_failure_can_unwind_the_query() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/Nowhere", "/World/B")
            .recovery(EngineConfigRecovery::UnwindQuery),
    )
    .unwrap();
    assert!(matches!(job.run(), Err(JobError::EngineConfig(_))));

    assert!(!job.query().is_persisted());
    // The layer was never saved: unwinding a fresh layer leaves no file.
    assert!(!layer_path_of(&stage_path).exists());
}

#[test]
fn cleanup_reports_failure_for_missing_export_file() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());
    let html = dir.path().join("report.html");
    let json = dir.path().join("report.json");

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .export_html(&html)
            .export_json(&json),
    )
    .unwrap();
    job.run().unwrap();

    // Someone removed an export behind the job's back.
    fs::remove_file(&json).unwrap();

    let undo = job.clean_up();
    assert!(!undo.success);
    // The remaining artifacts were still deleted.
    assert!(!html.exists());
    assert!(!layer_path_of(&stage_path).exists());
    assert!(undo.files_deleted.iter().any(|p| p == &html));
}

#[test]
fn bake_writes_mesh_and_material_layers() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());
    let mesh = dir.path().join("baked_meshes.json");
    let material = dir.path().join("baked_materials.json");

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .bake(clash_lite_job::BakeTargets {
                mesh_layer_path: mesh.clone(),
                material_layer_path: material.clone(),
            }),
    )
    .unwrap();
    job.run().unwrap();

    assert!(mesh.exists());
    assert!(material.exists());
    let meshes: serde_json::Value = serde_json::from_slice(&fs::read(&mesh).unwrap()).unwrap();
    assert_eq!(meshes["meshes"].as_array().unwrap().len(), 1);

    // The baked layers never leak into the saved stage: they were only
    // ever session sublayers.
    let stage = Stage::open(&stage_path).unwrap();
    assert_eq!(stage.root.sublayers.len(), 1);

    let undo = job.clean_up();
    assert!(undo.success);
    assert!(!mesh.exists());
    assert!(!material.exists());
}

#[test]
fn bake_failure_fails_the_run_but_keeps_results() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            // Empty targets are rejected by the bake engine.
            .bake(clash_lite_job::BakeTargets {
                mesh_layer_path: PathBuf::new(),
                material_layer_path: PathBuf::new(),
            }),
    )
    .unwrap();
    assert!(matches!(job.run(), Err(JobError::Bake(_))));
    // Detection results were saved before the bake; they are left in
    // place for explicit cleanup.
    assert!(job.query().is_persisted());
    let layer = layer_path_of(&stage_path);
    assert!(layer.exists());
    assert_eq!(layer_json(&layer)["overlaps"].as_array().unwrap().len(), 1);
}

/// Store wrapper that drops one row from every fetch, simulating a
/// backend whose read-back disagrees with the engine's count.
struct ShortReadStore {
    inner: JsonLayerStore,
}

impl OverlapStore for ShortReadStore {
    fn open(&mut self, stage_id: StageId, create_if_missing: bool) -> clash_lite_store::Result<()> {
        self.inner.open(stage_id, create_if_missing)
    }

    fn created_new_layer(&self) -> bool {
        self.inner.created_new_layer()
    }

    fn layer_path(&self) -> Option<&Path> {
        self.inner.layer_path()
    }

    fn insert_query(&mut self, query: &ClashQuery) -> clash_lite_store::Result<i64> {
        self.inner.insert_query(query)
    }

    fn insert_overlap(
        &mut self,
        record: &OverlapRecord,
        frames: &[FrameRecord],
    ) -> clash_lite_store::Result<i64> {
        self.inner.insert_overlap(record, frames)
    }

    fn find_all_overlaps_by_query(
        &mut self,
        query_id: i64,
        include_frames: bool,
    ) -> clash_lite_store::Result<BTreeMap<i64, OverlapRecord>> {
        let mut found = self
            .inner
            .find_all_overlaps_by_query(query_id, include_frames)?;
        if let Some(&first) = found.keys().next() {
            found.remove(&first);
        }
        Ok(found)
    }

    fn frames_for_overlap(&mut self, overlap_id: i64) -> clash_lite_store::Result<Vec<FrameRecord>> {
        self.inner.frames_for_overlap(overlap_id)
    }

    fn remove_all_overlaps_by_query(&mut self, query_id: i64) -> clash_lite_store::Result<usize> {
        self.inner.remove_all_overlaps_by_query(query_id)
    }

    fn remove_query_by_id(&mut self, query_id: i64) -> clash_lite_store::Result<usize> {
        self.inner.remove_query_by_id(query_id)
    }

    fn save(&mut self) -> clash_lite_store::Result<()> {
        self.inner.save()
    }

    fn saved(&mut self) {
        self.inner.saved()
    }

    fn close(&mut self) {
        self.inner.close()
    }

    fn destroy(&mut self) {
        self.inner.destroy()
    }
}

#[test]
fn count_mismatch_on_export_is_a_warning_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());
    let json = dir.path().join("report.json");

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .export_json(&json),
    )
    .unwrap()
    .with_store_factory(|| {
        Box::new(ShortReadStore {
            inner: JsonLayerStore::new(),
        })
    });
    let report = job.run().unwrap();

    // Engine found one overlap, the store read back zero: the run still
    // succeeds and exports what the store returned.
    assert_eq!(report.overlap_count, 1);
    assert!(report.export_error.is_none());
    let rows: serde_json::Value = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[test]
fn export_write_failure_is_reported_but_results_survive() {
    let dir = tempfile::tempdir().unwrap();
    let stage_path = write_stage(dir.path(), intersecting_cubes());
    // Target inside a directory that does not exist.
    let json = dir.path().join("nope").join("report.json");

    let mut job = ClashJob::configure(
        JobParams::new(&stage_path)
            .scope("/World/A", "/World/B")
            .export_json(&json),
    )
    .unwrap();
    let report = job.run().unwrap();

    assert_eq!(report.overlap_count, 1);
    assert!(report.export_error.is_some());
    assert!(!json.exists());
    // The detection results themselves were saved regardless.
    assert!(layer_path_of(&stage_path).exists());
    assert_eq!(job.state(), JobState::Closed);
}
