// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Job configuration.

use clash_lite_core::ClashSettings;
use clash_lite_engine::BakeTargets;
use std::path::{Path, PathBuf};

/// What to do with the already-persisted query when engine configuration
/// (scope or settings) is rejected after persistence.
///
/// Leaving the query behind defers recovery to an explicit cleanup pass;
/// unwinding removes it immediately. Both are useful, so the choice is
/// per-job configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineConfigRecovery {
    /// Leave the persisted query in place for explicit cleanup (default).
    #[default]
    LeavePersisted,
    /// Remove the just-persisted query before failing the run.
    UnwindQuery,
}

/// Which progress stream an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Pipeline step execution.
    Pipeline,
    /// Overlaps fetched-and-saved into the store.
    Saving,
}

/// One throttled progress notification.
///
/// Events are fire-and-forget: sinks must not block and cannot influence
/// control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub percent: u8,
}

/// Input to [`crate::ClashJob::configure`].
#[derive(Debug, Clone)]
pub struct JobParams {
    /// Full path of the stage to process.
    pub stage_path: PathBuf,
    /// Scope selector for object set A (absolute path or collection name).
    pub scope_a: String,
    /// Scope selector for object set B.
    pub scope_b: String,
    pub settings: ClashSettings,
    /// HTML export target, if any.
    pub html_path: Option<PathBuf>,
    /// JSON export target, if any.
    pub json_path: Option<PathBuf>,
    /// Bake targets; baking is skipped when absent.
    pub bake: Option<BakeTargets>,
    pub query_name: String,
    pub comment: String,
    pub recovery: EngineConfigRecovery,
}

impl JobParams {
    pub fn new(stage_path: impl AsRef<Path>) -> Self {
        Self {
            stage_path: stage_path.as_ref().to_path_buf(),
            scope_a: String::new(),
            scope_b: String::new(),
            settings: ClashSettings::default(),
            html_path: None,
            json_path: None,
            bake: None,
            query_name: String::new(),
            comment: String::new(),
            recovery: EngineConfigRecovery::default(),
        }
    }

    pub fn scope(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.scope_a = a.into();
        self.scope_b = b.into();
        self
    }

    pub fn settings(mut self, settings: ClashSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn export_html(mut self, path: impl AsRef<Path>) -> Self {
        self.html_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn export_json(mut self, path: impl AsRef<Path>) -> Self {
        self.json_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn bake(mut self, targets: BakeTargets) -> Self {
        self.bake = Some(targets);
        self
    }

    pub fn named(mut self, name: impl Into<String>, comment: impl Into<String>) -> Self {
        self.query_name = name.into();
        self.comment = comment.into();
        self
    }

    pub fn recovery(mut self, recovery: EngineConfigRecovery) -> Self {
        self.recovery = recovery;
        self
    }
}
