// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Clash-Lite Scene
//!
//! Stage documents and the process-wide stage cache.
//!
//! A *stage* is a JSON scene document: a root layer holding prims (each
//! with an axis-aligned bounding box and optional time-sampled transform
//! track), named collections, and sublayer references. Session-only state
//! (session sublayers, the edit target) lives next to the root layer but
//! is never persisted.
//!
//! The [`StageCache`] registers opened stages under generated ids so
//! external collaborators can address a document without holding a
//! reference to it. Registration is only reachable through a
//! [`StageCacheToken`], which erases the entry on drop, so the owning job
//! releases its registration on every exit path by construction.

pub mod aabb;
pub mod cache;
pub mod error;
pub mod paths;
pub mod stage;

pub use aabb::Aabb;
pub use cache::{StageCache, StageCacheToken, StageId};
pub use error::{Error, Result};
pub use paths::relative_to;
pub use stage::{EditTargetGuard, FrameSample, Prim, Stage};
