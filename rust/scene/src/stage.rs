// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage documents.
//!
//! A stage is a JSON file describing a scene: prims with bounding boxes
//! and optional time-sampled transform tracks, named collections, and
//! sublayer references. Session state (session sublayers, edit target) is
//! held in memory only and never written back.

use crate::aabb::Aabb;
use crate::error::{Error, Result};
use clash_lite_core::ScopeSelector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// One transform sample of a prim's animation track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub time: f64,
    pub translation: [f64; 3],
}

fn default_triangle_count() -> u32 {
    12
}

/// A scene object: path, bounds, and an optional animation track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prim {
    /// Absolute path, e.g. `/World/Walls/W1`.
    pub path: String,
    /// Local-space bounds. For animated prims this is the untranslated
    /// box; [`Prim::aabb_at`] applies the track.
    pub aabb: Aabb,
    /// Triangle count of the underlying mesh. Boxes default to 12.
    #[serde(default = "default_triangle_count")]
    pub triangle_count: u32,
    /// Time-sampled translations. Empty for static prims.
    #[serde(default)]
    pub frames: Vec<FrameSample>,
}

impl Prim {
    /// Bounds at time `t`: the nearest sample at or before `t`, falling
    /// back to the first sample, or the static box for untracked prims.
    pub fn aabb_at(&self, t: f64) -> Aabb {
        if self.frames.is_empty() {
            return self.aabb;
        }
        let mut chosen = &self.frames[0];
        for frame in &self.frames {
            if frame.time <= t {
                chosen = frame;
            } else {
                break;
            }
        }
        self.aabb.translated(chosen.translation)
    }

    /// Times at which this prim's transform is sampled.
    pub fn sample_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.frames.iter().map(|f| f.time)
    }
}

/// Persisted content of the root layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootLayer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prims: Vec<Prim>,
    /// Named groupings of prim paths.
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<String>>,
    /// Referenced sublayer paths, relative to the stage directory or
    /// absolute.
    #[serde(default)]
    pub sublayers: Vec<String>,
}

/// An opened stage document.
#[derive(Debug)]
pub struct Stage {
    path: PathBuf,
    pub root: RootLayer,
    /// Session-only sublayers, never persisted.
    session_sublayers: Vec<String>,
    /// Current edit target (a layer path), session-only.
    edit_target: Option<String>,
}

impl Stage {
    /// Open a stage document from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let root: RootLayer =
            serde_json::from_slice(&bytes).map_err(|source| Error::Malformed {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), prims = root.prims.len(), "Opened stage");
        Ok(Self {
            path,
            root,
            session_sublayers: Vec::new(),
            edit_target: None,
        })
    }

    /// Write the root layer back to disk. Session state is not saved.
    pub fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.root).expect("root layer serializes");
        fs::write(&self.path, bytes).map_err(|source| Error::Save {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "Saved stage");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the stage file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Resolve a scope selector to the prims it covers. A prim path
    /// selects the prim itself plus its subtree; a collection selects its
    /// member paths (subtrees included).
    pub fn select(&self, selector: &ScopeSelector) -> Vec<&Prim> {
        match selector {
            ScopeSelector::PrimPath(prefix) => self
                .root
                .prims
                .iter()
                .filter(|p| path_in_subtree(&p.path, prefix))
                .collect(),
            ScopeSelector::Collection(name) => {
                let Some(members) = self.root.collections.get(name) else {
                    return Vec::new();
                };
                self.root
                    .prims
                    .iter()
                    .filter(|p| members.iter().any(|m| path_in_subtree(&p.path, m)))
                    .collect()
            }
        }
    }

    // Sublayer bookkeeping ---------------------------------------------

    pub fn has_sublayer(&self, reference: &str) -> bool {
        self.root.sublayers.iter().any(|s| s == reference)
    }

    /// Append a sublayer reference if not already present.
    pub fn add_sublayer(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        if !self.has_sublayer(&reference) {
            self.root.sublayers.push(reference);
        }
    }

    /// Remove a sublayer reference. Returns whether it was present.
    pub fn remove_sublayer(&mut self, reference: &str) -> bool {
        let before = self.root.sublayers.len();
        self.root.sublayers.retain(|s| s != reference);
        self.root.sublayers.len() != before
    }

    /// Replace one sublayer reference with another, preserving position.
    pub fn rewrite_sublayer(&mut self, from: &str, to: impl Into<String>) -> bool {
        if let Some(slot) = self.root.sublayers.iter_mut().find(|s| *s == from) {
            *slot = to.into();
            true
        } else {
            false
        }
    }

    // Session state ----------------------------------------------------

    pub fn insert_session_sublayer(&mut self, reference: impl Into<String>) {
        self.session_sublayers.push(reference.into());
    }

    pub fn remove_session_sublayer(&mut self, reference: &str) -> bool {
        let before = self.session_sublayers.len();
        self.session_sublayers.retain(|s| s != reference);
        self.session_sublayers.len() != before
    }

    pub fn session_sublayers(&self) -> &[String] {
        &self.session_sublayers
    }

    pub fn edit_target(&self) -> Option<&str> {
        self.edit_target.as_deref()
    }

    pub fn set_edit_target(&mut self, target: Option<String>) {
        self.edit_target = target;
    }
}

fn path_in_subtree(path: &str, prefix: &str) -> bool {
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

/// Scoped edit-target switch.
///
/// Switches the stage's edit target on construction and restores the
/// previous target when dropped, including on unwinds. Dereferences to the
/// stage so the populate phase can edit through the guard.
pub struct EditTargetGuard<'a> {
    stage: &'a mut Stage,
    previous: Option<String>,
}

impl<'a> EditTargetGuard<'a> {
    pub fn switch(stage: &'a mut Stage, target: impl Into<String>) -> Self {
        let previous = stage.edit_target.take();
        stage.edit_target = Some(target.into());
        Self { stage, previous }
    }
}

impl Deref for EditTargetGuard<'_> {
    type Target = Stage;

    fn deref(&self) -> &Stage {
        self.stage
    }
}

impl DerefMut for EditTargetGuard<'_> {
    fn deref_mut(&mut self) -> &mut Stage {
        self.stage
    }
}

impl Drop for EditTargetGuard<'_> {
    fn drop(&mut self) {
        self.stage.edit_target = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_stage() -> (tempfile::TempDir, Stage) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.stage.json");
        let doc = serde_json::json!({
            "name": "scene",
            "prims": [
                { "path": "/World/A", "aabb": { "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0] } },
                { "path": "/World/A/Child", "aabb": { "min": [0.0, 0.0, 0.0], "max": [0.5, 0.5, 0.5] } },
                { "path": "/World/B", "aabb": { "min": [3.0, 0.0, 0.0], "max": [4.0, 1.0, 1.0] } }
            ],
            "collections": { "movers": ["/World/B"] },
            "sublayers": []
        });
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(serde_json::to_string_pretty(&doc).unwrap().as_bytes())
            .unwrap();
        let stage = Stage::open(&path).unwrap();
        (dir, stage)
    }

    #[test]
    fn select_by_path_includes_subtree() {
        let (_dir, stage) = sample_stage();
        let sel = ScopeSelector::PrimPath("/World/A".into());
        let prims = stage.select(&sel);
        assert_eq!(prims.len(), 2);
        // No accidental prefix match: /World/AB must not match /World/A.
        assert!(!path_in_subtree("/World/AB", "/World/A"));
    }

    #[test]
    fn select_by_collection() {
        let (_dir, stage) = sample_stage();
        let sel = ScopeSelector::Collection("movers".into());
        let prims = stage.select(&sel);
        assert_eq!(prims.len(), 1);
        assert_eq!(prims[0].path, "/World/B");

        let missing = ScopeSelector::Collection("nope".into());
        assert!(stage.select(&missing).is_empty());
    }

    #[test]
    fn save_roundtrip_excludes_session_state() {
        let (_dir, mut stage) = sample_stage();
        stage.add_sublayer("overlaps.clashdata.json");
        stage.insert_session_sublayer("baked_meshes.json");
        stage.save().unwrap();

        let reopened = Stage::open(stage.path()).unwrap();
        assert!(reopened.has_sublayer("overlaps.clashdata.json"));
        assert!(reopened.session_sublayers().is_empty());
    }

    #[test]
    fn edit_target_guard_restores_on_drop() {
        let (_dir, mut stage) = sample_stage();
        stage.set_edit_target(Some("root".into()));
        {
            let guard = EditTargetGuard::switch(&mut stage, "baked_meshes.json");
            assert_eq!(guard.edit_target(), Some("baked_meshes.json"));
        }
        assert_eq!(stage.edit_target(), Some("root"));
    }

    #[test]
    fn edit_target_guard_restores_on_panic() {
        let (_dir, mut stage) = sample_stage();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = EditTargetGuard::switch(&mut stage, "baked_meshes.json");
            panic!("bake blew up");
        }));
        assert!(result.is_err());
        assert_eq!(stage.edit_target(), None);
    }

    #[test]
    fn animated_prim_sampling() {
        let prim = Prim {
            path: "/World/M".into(),
            aabb: Aabb::unit_cube([0.0, 0.0, 0.0]),
            triangle_count: 12,
            frames: vec![
                FrameSample { time: 0.0, translation: [0.0, 0.0, 0.0] },
                FrameSample { time: 1.0, translation: [2.0, 0.0, 0.0] },
            ],
        };
        assert_eq!(prim.aabb_at(0.0).min, [0.0, 0.0, 0.0]);
        assert_eq!(prim.aabb_at(0.5).min, [0.0, 0.0, 0.0]);
        assert_eq!(prim.aabb_at(1.0).min, [2.0, 0.0, 0.0]);
        assert_eq!(prim.aabb_at(5.0).min, [2.0, 0.0, 0.0]);
    }
}
