// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash query value objects.

use crate::error::{Error, Result};
use crate::settings::ClashSettings;
use crate::UNPERSISTED_ID;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects one side of a detection scope: either an absolute prim path
/// (subtree) or a named collection defined on the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeSelector {
    /// Absolute stage path, e.g. `/World/Walls`. Matches the prim and its
    /// whole subtree.
    PrimPath(String),
    /// Named grouping defined by the stage document.
    Collection(String),
}

impl ScopeSelector {
    /// Parse a selector from user input. A leading `/` means an absolute
    /// prim path, anything else names a collection.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyScope);
        }
        if trimmed.starts_with('/') {
            let path = trimmed.trim_end_matches('/');
            // A bare `/` would subtree-match every prim on the stage.
            if path.is_empty() {
                return Err(Error::RootScope);
            }
            Ok(ScopeSelector::PrimPath(path.to_string()))
        } else {
            Ok(ScopeSelector::Collection(trimmed.to_string()))
        }
    }
}

impl fmt::Display for ScopeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSelector::PrimPath(p) => write!(f, "{}", p),
            ScopeSelector::Collection(c) => write!(f, "collection:{}", c),
        }
    }
}

/// One detection request.
///
/// The identifier is assigned exactly once, by the overlap store, at
/// persistence time. A query with identifier [`UNPERSISTED_ID`] has never
/// been saved. The identifier is never mutated in place: persistence and
/// cleanup both produce a new value via [`ClashQuery::with_identifier`] /
/// [`ClashQuery::with_cleared_identifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClashQuery {
    identifier: i64,
    pub name: String,
    pub comment: String,
    pub scope_a: ScopeSelector,
    pub scope_b: ScopeSelector,
    pub settings: ClashSettings,
}

impl ClashQuery {
    /// Build a fresh, unpersisted query.
    pub fn new(
        name: impl Into<String>,
        comment: impl Into<String>,
        scope_a: ScopeSelector,
        scope_b: ScopeSelector,
        settings: ClashSettings,
    ) -> Self {
        Self {
            identifier: UNPERSISTED_ID,
            name: name.into(),
            comment: comment.into(),
            scope_a,
            scope_b,
            settings,
        }
    }

    /// Store-assigned identifier, or [`UNPERSISTED_ID`] if never saved.
    pub fn identifier(&self) -> i64 {
        self.identifier
    }

    pub fn is_persisted(&self) -> bool {
        self.identifier != UNPERSISTED_ID
    }

    /// The same query carrying a store-assigned identifier.
    pub fn with_identifier(self, identifier: i64) -> Self {
        Self { identifier, ..self }
    }

    /// The same query with its persisted identity cleared, for use after
    /// its rows have been deleted from the store.
    pub fn with_cleared_identifier(self) -> Self {
        Self {
            identifier: UNPERSISTED_ID,
            ..self
        }
    }
}
