// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Clash-Lite Job
//!
//! Orchestrates the full lifecycle of one clash detection job over a
//! stage document:
//!
//! 1. open the stage and register it in the process-wide stage cache
//! 2. open (or create) the overlap store and persist the query
//! 3. configure and run the detection engine's step pipeline
//! 4. stream the found overlaps into the store
//! 5. optionally bake overlap geometry into mesh/material layers
//! 6. save store and stage, rewriting the layer reference to a relative
//!    path for portability
//! 7. optionally export the results to HTML and/or JSON
//!
//! [`ClashJob::clean_up`] is the exact inverse, driven by the outcome
//! recorded during the run: exported artifacts are deleted, a
//! freshly-created persistence layer is deleted wholesale, a reused layer
//! gets targeted row deletion.
//!
//! The detection engine and the overlap store are collaborators behind
//! traits; the job owns only the sequencing, the stage-cache
//! registration (released on every exit path), and the undo bookkeeping.
//!
//! ```rust,no_run
//! use clash_lite_job::{ClashJob, JobParams};
//!
//! let params = JobParams::new("model.stage.json")
//!     .scope("/World/Walls", "/World/Ducts")
//!     .export_json("clashes.json");
//! let mut job = ClashJob::configure(params).unwrap();
//! let report = job.run().unwrap();
//! println!("{} overlaps", report.overlap_count);
//! let undo = job.clean_up();
//! assert!(undo.success);
//! ```

pub mod error;
pub mod job;
pub mod outcome;
pub mod params;

pub use error::{JobError, Result};
pub use job::ClashJob;
pub use outcome::{CleanupReport, JobOutcome, JobState, RunReport};
pub use params::{EngineConfigRecovery, JobParams, ProgressEvent, ProgressPhase};

pub use clash_lite_engine::BakeTargets;
