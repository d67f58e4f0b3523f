// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Clash-Lite Engine
//!
//! Detection and bake engine contracts, plus box (AABB) reference
//! implementations.
//!
//! The production narrow-phase algorithm is out of scope here: the
//! orchestrator programs against [`DetectionEngine`] and [`BakeEngine`],
//! and [`BoxClashEngine`] / [`BoxBakeEngine`] provide a broad-phase
//! bounding-box rendition of the same contract, enough to run the full
//! job lifecycle against real stage documents.
//!
//! ## Pipeline model
//!
//! A configured engine builds an ordered pipeline of steps
//! ([`DetectionEngine::create_pipeline`] returns the nominal count). Each
//! step reports fractional progress and a terminal `finished` flag that
//! permits early exit before the nominal count is exhausted. After the
//! pipeline, results are streamed into an [`OverlapStore`] by a finite,
//! non-restartable iterator yielding save progress.

pub mod bake;
pub mod box_engine;
pub mod error;

pub use bake::{BakeEngine, BakeTargets, BakedLayers, BoxBakeEngine};
pub use box_engine::BoxClashEngine;
pub use error::{Error, Result};

use clash_lite_core::{ClashQuery, ClashSettings, ScopeSelector};
use clash_lite_scene::Stage;
use clash_lite_store::OverlapStore;

/// Progress of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStepData {
    /// Fractional progress in `[0, 1]` at this step.
    pub progress: f64,
    /// Terminal flag: the pipeline has no more work before the nominal
    /// step count is exhausted.
    pub finished: bool,
}

/// Contract of a clash detection engine.
///
/// Configuration order is scope, then settings, then pipeline. Scope and
/// settings are independently fallible; either failure leaves the engine
/// unconfigured for the failed part.
pub trait DetectionEngine {
    /// Configure the two object sets to test against each other.
    /// `duplicate_mode` switches scope construction to coincident-mesh
    /// search, overriding any dynamic settings.
    fn set_scope(
        &mut self,
        stage: &Stage,
        scope_a: &ScopeSelector,
        scope_b: &ScopeSelector,
        duplicate_mode: bool,
    ) -> Result<()>;

    /// Configure detection settings.
    fn set_settings(&mut self, settings: &ClashSettings, stage: &Stage) -> Result<()>;

    /// Build the execution pipeline and return the nominal step count.
    /// The engine derives the count from scope size and settings.
    fn create_pipeline(&mut self) -> usize;

    /// Progress data for step `index`.
    fn pipeline_step_data(&self, index: usize) -> PipelineStepData;

    /// Execute step `index`. Steps must run in order.
    fn run_pipeline_step(&mut self, index: usize);

    /// Number of overlaps found by the completed pipeline.
    fn overlap_count(&self) -> usize;

    /// Stream the found overlaps into `store` under `query`'s identity.
    ///
    /// Returns a finite, non-restartable iterator: each `next` persists a
    /// batch and yields the cumulative save percentage. The engine's
    /// result buffer is drained by the iterator.
    fn fetch_and_save_overlaps<'a>(
        &'a mut self,
        store: &'a mut dyn OverlapStore,
        query: &ClashQuery,
    ) -> Box<dyn Iterator<Item = clash_lite_store::Result<u8>> + 'a>;
}
