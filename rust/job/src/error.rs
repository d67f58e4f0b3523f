// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Job error taxonomy.
//!
//! Errors surface as results at the job boundary; nothing escapes `run`
//! as a panic. Consistency mismatches between the engine-reported and
//! store-fetched overlap counts are warnings, not errors.

use thiserror::Error;

/// Result type for job operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors raised by the clash job orchestrator
#[derive(Error, Debug)]
pub enum JobError {
    /// Fatal precondition, nothing was touched.
    #[error("Stage path is empty")]
    EmptyStagePath,

    /// Malformed configure input.
    #[error("Invalid scope: {0}")]
    InvalidScope(#[source] clash_lite_core::Error),

    /// Malformed configure input.
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[source] clash_lite_core::Error),

    /// The stage document could not be opened.
    #[error("Failed to open stage: {0}")]
    Open(#[source] clash_lite_scene::Error),

    /// The overlap store could not be opened.
    #[error("Failed to open clash data store: {0}")]
    StoreOpen(#[source] clash_lite_store::Error),

    /// The store accepted the query but returned no usable identifier.
    #[error("Failed to persist clash query: store returned id {0}")]
    QueryPersist(i64),

    /// A store write failed. The job fails but already-persisted state is
    /// left in place for explicit cleanup.
    #[error("Failed to persist detection results: {0}")]
    Persist(#[source] clash_lite_store::Error),

    /// Saving the stage document failed.
    #[error("Failed to save stage: {0}")]
    StageSave(#[source] clash_lite_scene::Error),

    /// Scope or settings were rejected by the engine. Whether the
    /// already-persisted query is unwound depends on the configured
    /// recovery strategy.
    #[error("Engine configuration rejected: {0}")]
    EngineConfig(#[source] clash_lite_engine::Error),

    /// The bake step failed after edit-target restoration.
    #[error("Bake failed: {0}")]
    Bake(#[source] clash_lite_engine::Error),

    /// Export render or write failure. Fails the export phase only;
    /// detection results remain persisted.
    #[error("Export failed: {0}")]
    Export(String),
}
