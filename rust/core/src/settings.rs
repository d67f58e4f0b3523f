// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed detection settings.
//!
//! One struct with named fields instead of a stringly-keyed map. Validation
//! happens once, at construction time, via [`ClashSettings::validated`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Settings for a single detection run.
///
/// Precedence rule: when `duplicate_search` is set it overrides `dynamic`
/// scope construction regardless of the `dynamic` flag. The time window is
/// only meaningful when the run is effectively dynamic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClashSettings {
    /// Log engine info and perf details while running.
    pub logging: bool,
    /// Overlap tolerance distance. Zero detects hard clashes (exact
    /// touching), positive values detect clearance/proximity clashes.
    pub tolerance: f64,
    /// Sweep the check across a time range instead of a single instant.
    pub dynamic: bool,
    /// Start of the time window in seconds. Ignored unless dynamic.
    pub start_time: f64,
    /// End of the time window in seconds. Ignored unless dynamic.
    pub end_time: f64,
    /// Detect fully coincident meshes with identical transforms.
    /// Overrides dynamic mode when set.
    pub duplicate_search: bool,
}

impl Default for ClashSettings {
    fn default() -> Self {
        Self {
            logging: false,
            tolerance: 0.0,
            dynamic: false,
            start_time: 0.0,
            end_time: 0.0,
            duplicate_search: false,
        }
    }
}

impl ClashSettings {
    /// Validate the settings, consuming and returning them on success.
    ///
    /// Rejects negative or non-finite tolerances and, for dynamic runs,
    /// inverted or non-finite time windows. Static runs never fail on the
    /// time window since it is ignored.
    pub fn validated(self) -> Result<Self> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::NegativeTolerance(self.tolerance));
        }
        if self.effective_dynamic() {
            if !self.start_time.is_finite() || !self.end_time.is_finite() {
                return Err(Error::NonFiniteTime);
            }
            if self.start_time > self.end_time {
                return Err(Error::InvertedTimeWindow {
                    start: self.start_time,
                    end: self.end_time,
                });
            }
        }
        Ok(self)
    }

    /// Whether scope construction should actually sweep over time.
    ///
    /// Duplicate search takes precedence over the dynamic flag.
    pub fn effective_dynamic(&self) -> bool {
        self.dynamic && !self.duplicate_search
    }

    /// The active time window, or `None` for static / duplicate runs.
    pub fn time_window(&self) -> Option<(f64, f64)> {
        self.effective_dynamic()
            .then_some((self.start_time, self.end_time))
    }
}
