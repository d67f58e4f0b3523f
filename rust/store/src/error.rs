// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use clash_lite_scene::StageId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by overlap stores
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store is not open")]
    NotOpen,

    #[error("No stage registered under id {0:?}")]
    UnknownStage(StageId),

    #[error("Persistence layer '{0}' does not exist")]
    MissingLayer(PathBuf),

    #[error("Layer '{path}' is unreadable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Layer '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
