// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Job state and outcomes.

use std::path::PathBuf;

/// Lifecycle state of a job instance, tracked for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    SceneOpened,
    QueryPersisted,
    Detecting,
    ResultsSaved,
    Exported,
    Closed,
    CleanedUp,
}

/// Side effects recorded during `run`, consumed by `clean_up`.
///
/// Process-local and transient: it lists exactly the artifacts the run
/// created so the undo deletes exactly that set.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    /// Persistence layer created by this run (absent when an existing
    /// layer was reused).
    pub created_layer: Option<PathBuf>,
    /// Export files actually written.
    pub exported: Vec<PathBuf>,
    /// Baked layer files actually written.
    pub baked_layers: Vec<PathBuf>,
}

/// Result of a successful `run`.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Overlaps found by the engine. Zero is a valid "no clash" result.
    pub overlap_count: usize,
    /// Export-phase failure, if any. Detection results are persisted
    /// regardless.
    pub export_error: Option<String>,
}

/// Result of `clean_up`. Best-effort: individual failures are recorded
/// in the aggregate flag, never raised.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub success: bool,
    /// Files actually deleted.
    pub files_deleted: Vec<PathBuf>,
    /// Overlap rows removed by targeted cleanup.
    pub overlaps_removed: usize,
    /// Query rows removed by targeted cleanup.
    pub queries_removed: usize,
}
