// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Clash-Lite Core
//!
//! Data model shared by every clash-lite crate:
//!
//! - **Queries**: [`ClashQuery`] value objects describing one detection
//!   request (scope, settings, name/comment, store-assigned identifier)
//! - **Settings**: [`ClashSettings`], a typed and once-validated settings
//!   struct (tolerance, static/dynamic, time window, duplicate search)
//! - **Overlaps**: [`OverlapRecord`] / [`FrameRecord`], the immutable
//!   results produced by a detection engine and persisted by a store
//! - **Progress**: [`ProgressThrottle`], a coalescing progress reporter
//!   that suppresses redundant identical-percent notifications
//!
//! ## Quick Start
//!
//! ```rust
//! use clash_lite_core::{ClashQuery, ClashSettings, ScopeSelector};
//!
//! let settings = ClashSettings {
//!     tolerance: 0.01,
//!     ..ClashSettings::default()
//! }
//! .validated()
//! .unwrap();
//!
//! let query = ClashQuery::new(
//!     "walls-vs-ducts",
//!     "weekly coordination check",
//!     ScopeSelector::parse("/World/Walls").unwrap(),
//!     ScopeSelector::parse("ducts").unwrap(),
//!     settings,
//! );
//! assert!(!query.is_persisted());
//! ```

pub mod error;
pub mod overlap;
pub mod progress;
pub mod query;
pub mod settings;

pub use error::{Error, Result};
pub use overlap::{FrameRecord, OverlapRecord};
pub use progress::ProgressThrottle;
pub use query::{ClashQuery, ScopeSelector};
pub use settings::ClashSettings;

/// Identifier value meaning "never persisted".
pub const UNPERSISTED_ID: i64 = 0;
