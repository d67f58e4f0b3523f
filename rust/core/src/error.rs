// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for core model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or validating model values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Tolerance must be >= 0, got {0}")]
    NegativeTolerance(f64),

    #[error("Dynamic time window is inverted: start {start} > end {end}")]
    InvertedTimeWindow { start: f64, end: f64 },

    #[error("Time value is not finite")]
    NonFiniteTime,

    #[error("Scope selector is empty")]
    EmptyScope,

    #[error("Scope selector names the stage root")]
    RootScope,
}
