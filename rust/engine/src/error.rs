// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running an engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Scope selector '{0}' matches no prims")]
    EmptyScopeSelection(String),

    #[error("Settings rejected: {0}")]
    InvalidSettings(#[from] clash_lite_core::Error),

    #[error("Bake target paths are not configured")]
    BakeNotConfigured,

    #[error("Failed writing baked layer '{path}': {source}")]
    BakeWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
