// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The clash job orchestrator.

use crate::error::{JobError, Result};
use crate::outcome::{CleanupReport, JobOutcome, JobState, RunReport};
use crate::params::{EngineConfigRecovery, JobParams, ProgressEvent, ProgressPhase};
use clash_lite_core::{ClashQuery, ClashSettings, ProgressThrottle, ScopeSelector};
use clash_lite_engine::{
    BakeEngine, BakeTargets, BoxBakeEngine, BoxClashEngine, DetectionEngine,
};
use clash_lite_export::{export_to_html, export_to_json, ExportColumnDef};
use clash_lite_scene::{relative_to, EditTargetGuard, Stage, StageCache};
use clash_lite_store::{JsonLayerStore, OverlapStore};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

type StoreFactory = Box<dyn Fn() -> Box<dyn OverlapStore>>;
type ProgressSink = Box<dyn FnMut(ProgressEvent)>;

/// One clash detection job over one stage document.
///
/// Construction ([`ClashJob::configure`]) only builds the query value;
/// storage is untouched until [`ClashJob::run`]. A job instance is
/// single-use in spirit: `run` once, then optionally `clean_up` to undo
/// exactly the side effects that run produced.
pub struct ClashJob {
    stage_path: PathBuf,
    html_path: Option<PathBuf>,
    json_path: Option<PathBuf>,
    bake: Option<BakeTargets>,
    recovery: EngineConfigRecovery,
    query: ClashQuery,
    engine: Box<dyn DetectionEngine>,
    bake_engine: Box<dyn BakeEngine>,
    store_factory: StoreFactory,
    progress_sink: ProgressSink,
    outcome: JobOutcome,
    state: JobState,
}

impl ClashJob {
    /// Build a job from parameters. Fails only on malformed input; no
    /// storage or file system access happens here.
    pub fn configure(params: JobParams) -> Result<Self> {
        let scope_a = ScopeSelector::parse(&params.scope_a).map_err(JobError::InvalidScope)?;
        let scope_b = ScopeSelector::parse(&params.scope_b).map_err(JobError::InvalidScope)?;
        let settings = params
            .settings
            .clone()
            .validated()
            .map_err(JobError::InvalidSettings)?;

        let query = ClashQuery::new(
            params.query_name.clone(),
            params.comment.clone(),
            scope_a,
            scope_b,
            settings,
        );

        Ok(Self::assemble(params, query))
    }

    /// Build a job addressing a query persisted by an earlier run, for
    /// calling [`ClashJob::clean_up`] in a fresh process. Cleanup
    /// addresses rows by identifier alone, so no scope is taken.
    pub fn for_persisted_query(stage_path: impl Into<PathBuf>, query_id: i64) -> Self {
        let query = ClashQuery::new(
            String::new(),
            String::new(),
            ScopeSelector::Collection(String::new()),
            ScopeSelector::Collection(String::new()),
            ClashSettings::default(),
        )
        .with_identifier(query_id);
        let stage_path: PathBuf = stage_path.into();
        Self::assemble(JobParams::new(stage_path), query)
    }

    fn assemble(params: JobParams, query: ClashQuery) -> Self {
        Self {
            stage_path: params.stage_path,
            html_path: params.html_path,
            json_path: params.json_path,
            bake: params.bake,
            recovery: params.recovery,
            query,
            engine: Box::new(BoxClashEngine::new()),
            bake_engine: Box::new(BoxBakeEngine),
            store_factory: Box::new(|| Box::new(JsonLayerStore::new())),
            progress_sink: Box::new(|event: ProgressEvent| {
                tracing::info!(phase = ?event.phase, percent = event.percent, "Progress");
            }),
            outcome: JobOutcome::default(),
            state: JobState::Idle,
        }
    }

    /// Replace the detection engine.
    pub fn with_engine(mut self, engine: Box<dyn DetectionEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the bake engine.
    pub fn with_bake_engine(mut self, engine: Box<dyn BakeEngine>) -> Self {
        self.bake_engine = engine;
        self
    }

    /// Replace the overlap store backend.
    pub fn with_store_factory(
        mut self,
        factory: impl Fn() -> Box<dyn OverlapStore> + 'static,
    ) -> Self {
        self.store_factory = Box::new(factory);
        self
    }

    /// Receive throttled progress events instead of the default log sink.
    pub fn with_progress_sink(mut self, sink: impl FnMut(ProgressEvent) + 'static) -> Self {
        self.progress_sink = Box::new(sink);
        self
    }

    pub fn query(&self) -> &ClashQuery {
        &self.query
    }

    pub fn outcome(&self) -> &JobOutcome {
        &self.outcome
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Perform the detection run.
    ///
    /// On success the stage and the overlap store are saved and closed,
    /// exports (if configured) are written, and the outcome needed for
    /// [`ClashJob::clean_up`] is recorded. The stage-cache registration
    /// is released on every exit path.
    pub fn run(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        if self.stage_path.as_os_str().is_empty() {
            return Err(JobError::EmptyStagePath);
        }

        tracing::info!(stage = %self.stage_path.display(), "Opening stage");
        let mut stage = Stage::open(&self.stage_path).map_err(JobError::Open)?;
        self.state = JobState::SceneOpened;

        // Registration token: dropped (and the cache entry erased) on
        // every exit path below, early returns included.
        let token = StageCache::insert(&self.stage_path);

        let mut store = (self.store_factory)();
        store.open(token.id(), true).map_err(JobError::StoreOpen)?;

        tracing::info!(name = %self.query.name, "Creating new query");
        let query_id = store.insert_query(&self.query).map_err(JobError::Persist)?;
        if query_id < 1 {
            return Err(JobError::QueryPersist(query_id));
        }
        self.query = self.query.clone().with_identifier(query_id);
        self.state = JobState::QueryPersisted;

        // Captured before any save: gates whole-layer vs targeted undo.
        let new_layer = store.created_new_layer();

        tracing::info!("Setting up clash detection engine");
        let configured = self
            .engine
            .set_scope(
                &stage,
                &self.query.scope_a,
                &self.query.scope_b,
                self.query.settings.duplicate_search,
            )
            .and_then(|()| self.engine.set_settings(&self.query.settings, &stage));
        if let Err(e) = configured {
            match self.recovery {
                EngineConfigRecovery::LeavePersisted => {
                    tracing::warn!(
                        query_id,
                        "Engine configuration failed; persisted query left for explicit cleanup"
                    );
                    match store.save() {
                        Ok(()) => {
                            // The save writes the layer; a fresh one is
                            // this run's creation and belongs to the
                            // undo set.
                            if new_layer {
                                self.outcome.created_layer =
                                    store.layer_path().map(|p| p.to_path_buf());
                            }
                        }
                        Err(persist) => {
                            tracing::error!(error = %persist, "Failed to save leftover query");
                        }
                    }
                }
                EngineConfigRecovery::UnwindQuery => {
                    tracing::warn!(query_id, "Engine configuration failed; unwinding query");
                    // A freshly-created layer has never touched disk;
                    // skipping the save avoids leaving an empty layer file.
                    let unwound = store.remove_query_by_id(query_id).and_then(|_| {
                        if new_layer {
                            Ok(())
                        } else {
                            store.save()
                        }
                    });
                    if unwound.is_ok() {
                        self.query = self.query.clone().with_cleared_identifier();
                    } else {
                        tracing::error!(query_id, "Failed to unwind persisted query");
                    }
                }
            }
            store.close();
            store.destroy();
            return Err(JobError::EngineConfig(e));
        }

        // Pipeline execution with throttled progress.
        self.state = JobState::Detecting;
        tracing::info!("Running clash detection engine");
        let num_steps = self.engine.create_pipeline();
        let mut throttle = ProgressThrottle::new();
        for index in 0..num_steps {
            let step = self.engine.pipeline_step_data(index);
            if step.finished {
                break;
            }
            self.engine.run_pipeline_step(index);
            if throttle.update(step.progress) {
                (self.progress_sink)(ProgressEvent {
                    phase: ProgressPhase::Pipeline,
                    percent: throttle.percent(),
                });
            }
        }

        let overlap_count = self.engine.overlap_count();
        tracing::info!(overlaps = overlap_count, "Fetching overlaps");
        let mut save_throttle = ProgressThrottle::new();
        for step in self.engine.fetch_and_save_overlaps(store.as_mut(), &self.query) {
            let percent = step.map_err(JobError::Persist)?;
            if save_throttle.update_percent(percent) {
                (self.progress_sink)(ProgressEvent {
                    phase: ProgressPhase::Saving,
                    percent,
                });
            }
        }
        // Results hit disk before any later phase can fail, so a bake or
        // export failure never loses them.
        store.save().map_err(JobError::Persist)?;
        self.state = JobState::ResultsSaved;

        if let Some(targets) = self.bake.clone() {
            self.run_bake(&mut stage, store.as_mut(), &targets)?;
        }

        tracing::info!(stage = %self.stage_path.display(), "Saving stage");
        // Portability: the stage must reference the layer relative to its
        // own directory, not by absolute path.
        if let Some(layer_path) = store.layer_path() {
            let absolute = layer_path.to_string_lossy().into_owned();
            let relative = relative_to(layer_path, stage.dir())
                .to_string_lossy()
                .into_owned();
            if stage.has_sublayer(&absolute) {
                stage.rewrite_sublayer(&absolute, &relative);
            } else {
                stage.add_sublayer(&relative);
            }
        }
        stage.save().map_err(JobError::StageSave)?;
        store.saved();

        if new_layer {
            self.outcome.created_layer = store.layer_path().map(|p| p.to_path_buf());
        }

        let mut export_error = None;
        if self.html_path.is_some() || self.json_path.is_some() {
            match self.export(store.as_mut(), overlap_count) {
                Ok(()) => self.state = JobState::Exported,
                Err(e) => {
                    tracing::error!(error = %e, "Export failed; detection results remain persisted");
                    export_error = Some(e.to_string());
                }
            }
        }

        tracing::info!(
            stage = %self.stage_path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Closing stage"
        );
        store.close();
        store.destroy();
        drop(token);
        self.state = JobState::Closed;

        Ok(RunReport {
            overlap_count,
            export_error,
        })
    }

    /// Bake persisted overlaps into mesh and material layers.
    ///
    /// The two layers are temporarily inserted into the session sublayer
    /// list and populated under a scoped edit-target switch; the previous
    /// edit target is restored on all exit paths, bake failures included,
    /// before the session layers are removed and the two files are saved
    /// independently.
    fn run_bake(
        &mut self,
        stage: &mut Stage,
        store: &mut dyn OverlapStore,
        targets: &BakeTargets,
    ) -> Result<()> {
        tracing::info!(
            mesh_layer = %targets.mesh_layer_path.display(),
            material_layer = %targets.material_layer_path.display(),
            "Baking overlap geometry"
        );

        // Recompute bake inputs from the just-persisted overlaps, with
        // per-frame detail for dynamic clashes.
        let overlaps = store
            .find_all_overlaps_by_query(self.query.identifier(), true)
            .map_err(JobError::Persist)?;
        let mut inputs = Vec::with_capacity(overlaps.len());
        for (overlap_id, record) in overlaps {
            let frames = store
                .frames_for_overlap(overlap_id)
                .map_err(JobError::Persist)?;
            inputs.push((record, frames));
        }

        let mesh_ref = targets.mesh_layer_path.to_string_lossy().into_owned();
        let material_ref = targets.material_layer_path.to_string_lossy().into_owned();
        stage.insert_session_sublayer(&mesh_ref);
        stage.insert_session_sublayer(&material_ref);

        let baked = {
            let guard = EditTargetGuard::switch(stage, mesh_ref.clone());
            self.bake_engine.bake(&guard, &inputs, targets)
            // guard drop restores the previous edit target, also when
            // the bake returned an error
        };

        stage.remove_session_sublayer(&mesh_ref);
        stage.remove_session_sublayer(&material_ref);

        let baked = baked.map_err(JobError::Bake)?;
        baked
            .save_mesh_layer(&targets.mesh_layer_path)
            .map_err(JobError::Bake)?;
        self.outcome
            .baked_layers
            .push(targets.mesh_layer_path.clone());
        baked
            .save_material_layer(&targets.material_layer_path)
            .map_err(JobError::Bake)?;
        self.outcome
            .baked_layers
            .push(targets.material_layer_path.clone());
        Ok(())
    }

    /// Export persisted overlaps to the configured targets.
    fn export(&mut self, store: &mut dyn OverlapStore, reported_count: usize) -> Result<()> {
        let overlaps = store
            .find_all_overlaps_by_query(self.query.identifier(), false)
            .map_err(|e| JobError::Export(e.to_string()))?;
        if overlaps.len() != reported_count {
            tracing::warn!(
                fetched = overlaps.len(),
                reported = reported_count,
                "Overlap count mismatch between engine and store (serialization consistency)"
            );
        }

        let with_min_distance = self.query.settings.tolerance > 0.0;
        let with_comment = self.query.settings.duplicate_search;
        let mut columns = vec![
            ExportColumnDef::new(0, "Clash ID"),
            ExportColumnDef::numeric(1, "Tolerance"),
            ExportColumnDef::numeric(2, "Overlapping Tris"),
            ExportColumnDef::numeric(3, "Clash Start"),
            ExportColumnDef::numeric(4, "Clash End"),
            ExportColumnDef::numeric(5, "Clashing Frames"),
            ExportColumnDef::new(6, "Object A"),
            ExportColumnDef::new(7, "Object B"),
        ];
        if with_min_distance {
            columns.push(ExportColumnDef::numeric(8, "Min Distance"));
        }
        if with_comment {
            columns.push(ExportColumnDef::new(9, "Comment"));
        }

        let rows: Vec<Vec<String>> = overlaps
            .values()
            .map(|o| {
                let mut row = vec![
                    o.overlap_id.to_string(),
                    format!("{:.3}", o.tolerance),
                    o.overlap_tris.to_string(),
                    format!("{:.3}", o.start_time),
                    format!("{:.3}", o.end_time),
                    o.num_records.to_string(),
                    o.object_a_path.clone(),
                    o.object_b_path.clone(),
                ];
                if with_min_distance {
                    row.push(
                        o.min_distance
                            .map(|d| format!("{:.3}", d))
                            .unwrap_or_default(),
                    );
                }
                // Column indices 8/9 are fixed; pad when only the comment
                // column is active.
                if with_comment {
                    if !with_min_distance {
                        row.push(String::new());
                    }
                    row.push(o.comment.clone().unwrap_or_default());
                }
                row
            })
            .collect();
        let stage_name = self.stage_path.to_string_lossy().into_owned();

        if let Some(path) = self.html_path.clone() {
            tracing::info!(path = %path.display(), "Exporting to HTML");
            let bytes = export_to_html("Clash Detection Results", &stage_name, &columns, &rows);
            if bytes.is_empty() {
                return Err(JobError::Export("HTML render produced no bytes".into()));
            }
            fs::write(&path, &bytes).map_err(|e| {
                JobError::Export(format!("failed writing HTML file '{}': {e}", path.display()))
            })?;
            self.outcome.exported.push(path);
        }

        if let Some(path) = self.json_path.clone() {
            tracing::info!(path = %path.display(), "Exporting to JSON");
            let bytes = export_to_json(&columns, &rows);
            if bytes.is_empty() {
                return Err(JobError::Export("JSON render produced no bytes".into()));
            }
            fs::write(&path, &bytes).map_err(|e| {
                JobError::Export(format!("failed writing JSON file '{}': {e}", path.display()))
            })?;
            self.outcome.exported.push(path);
        }

        Ok(())
    }

    /// Undo the side effects recorded by `run`.
    ///
    /// Best-effort throughout: every deletion is attempted, failures are
    /// aggregated into the report's `success` flag and never raised. A
    /// freshly-created persistence layer is deleted wholesale (including
    /// the stage's sublayer reference); a reused layer gets targeted row
    /// deletion and the in-memory query identifier is cleared.
    pub fn clean_up(&mut self) -> CleanupReport {
        let mut report = CleanupReport {
            success: true,
            ..CleanupReport::default()
        };

        let artifacts: Vec<PathBuf> = self
            .outcome
            .exported
            .drain(..)
            .chain(self.outcome.baked_layers.drain(..))
            .collect();
        for path in artifacts {
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Exported file deleted");
                    report.files_deleted.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete artifact");
                    report.success = false;
                }
            }
        }

        if let Some(layer) = self.outcome.created_layer.take() {
            // This run created the layer: deleting it wholesale is the
            // cheapest sufficient undo.
            match fs::remove_file(&layer) {
                Ok(()) => {
                    tracing::info!(layer = %layer.display(), "Created layer deleted");
                    report.files_deleted.push(layer.clone());
                }
                Err(e) => {
                    tracing::warn!(layer = %layer.display(), error = %e, "Failed to delete created layer");
                    report.success = false;
                }
            }
            if let Err(e) = self.remove_layer_reference(&layer) {
                tracing::warn!(error = %e, "Failed to drop stage reference to deleted layer");
                report.success = false;
            }
            self.query = self.query.clone().with_cleared_identifier();
        } else if self.query.is_persisted() {
            if let Err(e) = self.clean_overlaps_and_query(&mut report) {
                tracing::warn!(error = %e, "Targeted cleanup failed");
                report.success = false;
            }
        }

        self.state = JobState::CleanedUp;
        report
    }

    /// Drop the stage's sublayer reference to `layer` and save.
    fn remove_layer_reference(&self, layer: &std::path::Path) -> Result<()> {
        let mut stage = Stage::open(&self.stage_path).map_err(JobError::Open)?;
        let absolute = layer.to_string_lossy().into_owned();
        let relative = relative_to(layer, stage.dir()).to_string_lossy().into_owned();
        let removed = stage.remove_sublayer(&relative) || stage.remove_sublayer(&absolute);
        if removed {
            stage.save().map_err(JobError::StageSave)?;
        }
        Ok(())
    }

    /// Targeted undo against a reused layer: delete only this query's
    /// rows, then the query row itself, and clear the in-memory query
    /// identifier by replacing the value.
    fn clean_overlaps_and_query(&mut self, report: &mut CleanupReport) -> Result<()> {
        if self.stage_path.as_os_str().is_empty() {
            return Err(JobError::EmptyStagePath);
        }
        tracing::info!(stage = %self.stage_path.display(), "Opening stage");
        let stage = Stage::open(&self.stage_path).map_err(JobError::Open)?;
        let token = StageCache::insert(&self.stage_path);

        let mut store = (self.store_factory)();
        // Cleanup must never create the layer it is about to empty.
        store.open(token.id(), false).map_err(JobError::StoreOpen)?;

        let query_id = self.query.identifier();
        report.overlaps_removed = store
            .remove_all_overlaps_by_query(query_id)
            .map_err(JobError::Persist)?;
        tracing::info!(removed = report.overlaps_removed, "Clash records removed");
        report.queries_removed = store
            .remove_query_by_id(query_id)
            .map_err(JobError::Persist)?;
        tracing::info!(removed = report.queries_removed, "Clash queries removed");
        self.query = self.query.clone().with_cleared_identifier();

        store.save().map_err(JobError::Persist)?;
        stage.save().map_err(JobError::StageSave)?;
        store.saved();
        store.close();
        store.destroy();
        Ok(())
    }
}
