// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process-wide stage registry.
//!
//! Collaborators (the overlap store in particular) address an open
//! document by a generated [`StageId`] rather than by holding a reference
//! to it. Entries are only created through [`StageCache::insert`], which
//! hands back a [`StageCacheToken`]; dropping the token erases the entry.
//!
//! Ids are generated per insert call: two jobs opening the same path get
//! two independent registrations. Concurrent runs against the same
//! physical document are not deduplicated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Generated identifier of a cached stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(pub u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static Mutex<HashMap<StageId, PathBuf>> {
    static REGISTRY: OnceLock<Mutex<HashMap<StageId, PathBuf>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The process-wide stage cache.
pub struct StageCache;

impl StageCache {
    /// Register a stage path under a fresh id.
    pub fn insert(path: impl AsRef<Path>) -> StageCacheToken {
        let id = StageId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        let path = path.as_ref().to_path_buf();
        registry()
            .lock()
            .expect("stage cache poisoned")
            .insert(id, path.clone());
        tracing::debug!(id = id.0, path = %path.display(), "Registered stage");
        StageCacheToken { id }
    }

    /// Resolve a registered id back to the stage path.
    pub fn resolve(id: StageId) -> Option<PathBuf> {
        registry()
            .lock()
            .expect("stage cache poisoned")
            .get(&id)
            .cloned()
    }

    fn erase(id: StageId) {
        if registry()
            .lock()
            .expect("stage cache poisoned")
            .remove(&id)
            .is_some()
        {
            tracing::debug!(id = id.0, "Erased stage registration");
        }
    }
}

/// Owning handle for one stage registration.
///
/// The registration lives exactly as long as the token: dropping it (on
/// success, failure, or unwind) erases the cache entry.
#[derive(Debug)]
pub struct StageCacheToken {
    id: StageId,
}

impl StageCacheToken {
    pub fn id(&self) -> StageId {
        self.id
    }
}

impl Drop for StageCacheToken {
    fn drop(&mut self) {
        StageCache::erase(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_drop_erases_entry() {
        let id;
        {
            let token = StageCache::insert("/tmp/scene.stage.json");
            id = token.id();
            assert_eq!(
                StageCache::resolve(id),
                Some(PathBuf::from("/tmp/scene.stage.json"))
            );
        }
        assert_eq!(StageCache::resolve(id), None);
    }

    #[test]
    fn same_path_gets_independent_registrations() {
        let a = StageCache::insert("/tmp/shared.stage.json");
        let b = StageCache::insert("/tmp/shared.stage.json");
        assert_ne!(a.id(), b.id());
        drop(a);
        // Dropping one registration leaves the other intact.
        assert!(StageCache::resolve(b.id()).is_some());
    }
}
