// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coalescing progress reporting.
//!
//! Pipeline steps can be numerous and cheap; forwarding every fractional
//! progress value would flood the caller with redundant notifications.
//! [`ProgressThrottle`] only signals when the integer percent advances by
//! at least the configured granularity.

/// Throttles a monotonically advancing progress stream.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_reported: i32,
    granularity: u32,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressThrottle {
    /// Throttle with the default 1% granularity.
    pub fn new() -> Self {
        Self::with_granularity(1)
    }

    /// Throttle reporting every `granularity` percent. A granularity of 0
    /// is treated as 1.
    pub fn with_granularity(granularity: u32) -> Self {
        Self {
            last_reported: i32::MIN,
            granularity: granularity.max(1),
        }
    }

    /// Feed a fractional progress value in `[0, 1]`.
    ///
    /// Returns `true` when the caller should emit an update. Out-of-range
    /// values are clamped; regressions are ignored.
    pub fn update(&mut self, fraction: f64) -> bool {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.update_percent((fraction * 100.0).round() as u8)
    }

    /// Feed an already-quantized percent value.
    ///
    /// The first value always passes; afterwards a value passes when it
    /// advanced by at least the granularity, or reached 100.
    pub fn update_percent(&mut self, percent: u8) -> bool {
        let percent = percent.min(100) as i32;
        if percent <= self.last_reported {
            return false;
        }
        let advanced = percent.saturating_sub(self.last_reported) >= self.granularity as i32;
        if !advanced && percent != 100 {
            return false;
        }
        self.last_reported = percent;
        true
    }

    /// Last percent that passed the throttle.
    pub fn percent(&self) -> u8 {
        self.last_reported.max(0) as u8
    }
}
