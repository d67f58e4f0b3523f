// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Box (AABB) reference detection engine.
//!
//! Broad-phase only: a pair clashes when the tolerance-inflated bounding
//! boxes intersect. `overlap_tris` is the summed triangle count of both
//! prims for a true box intersection and 0 for clearance-only proximity
//! hits. Dynamic runs sample the union of both prims' frame times inside
//! the configured window; duplicate-search compares bounds and frame
//! tracks for exact coincidence and overrides dynamic sampling.

use crate::error::{Error, Result};
use crate::{DetectionEngine, PipelineStepData};
use clash_lite_core::{ClashQuery, ClashSettings, FrameRecord, OverlapRecord, ScopeSelector};
use clash_lite_scene::{Aabb, FrameSample, Stage};
use clash_lite_store::OverlapStore;

/// Candidate pairs tested per pipeline step.
const PAIRS_PER_STEP: usize = 64;
/// Overlaps persisted per fetch-and-save batch.
const SAVE_BATCH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
struct PrimSnapshot {
    path: String,
    aabb: Aabb,
    triangle_count: u32,
    frames: Vec<FrameSample>,
}

impl PrimSnapshot {
    fn aabb_at(&self, t: f64) -> Aabb {
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
}

#[derive(Debug)]
struct Scope {
    a: Vec<PrimSnapshot>,
    b: Vec<PrimSnapshot>,
    duplicate_mode: bool,
}

#[derive(Debug)]
struct Pipeline {
    /// Candidate pair indices into (scope.a, scope.b), chunked per step.
    chunks: Vec<Vec<(usize, usize)>>,
    /// Nominal step count announced to the caller; may exceed the actual
    /// chunk count, in which case `finished` fires early.
    nominal_steps: usize,
}

#[derive(Debug, Clone)]
struct Detected {
    record: OverlapRecord,
    frames: Vec<FrameRecord>,
}

/// Reference [`DetectionEngine`] over prim bounding boxes.
#[derive(Debug, Default)]
pub struct BoxClashEngine {
    scope: Option<Scope>,
    settings: Option<ClashSettings>,
    pipeline: Option<Pipeline>,
    found: Vec<Detected>,
}

impl BoxClashEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn verbose(&self) -> bool {
        self.settings.as_ref().is_some_and(|s| s.logging)
    }

    fn test_pair(&self, a: &PrimSnapshot, b: &PrimSnapshot) -> Option<Detected> {
        let settings = self.settings.as_ref()?;
        let scope = self.scope.as_ref()?;
        let tolerance = settings.tolerance;

        if scope.duplicate_mode {
            // Coincident meshes: identical bounds and identical tracks.
            if a.aabb == b.aabb && a.frames == b.frames {
                return Some(Detected {
                    record: OverlapRecord {
                        overlap_id: 0,
                        query_id: 0,
                        tolerance,
                        overlap_tris: a.triangle_count,
                        start_time: 0.0,
                        end_time: 0.0,
                        num_records: 1,
                        object_a_path: a.path.clone(),
                        object_b_path: b.path.clone(),
                        min_distance: None,
                        comment: Some("duplicate".into()),
                    },
                    frames: Vec::new(),
                });
            }
            return None;
        }

        if let Some((start, end)) = settings.time_window() {
            self.test_pair_dynamic(a, b, tolerance, start, end)
        } else {
            self.test_pair_static(a, b, tolerance)
        }
    }

    fn test_pair_static(&self, a: &PrimSnapshot, b: &PrimSnapshot, tolerance: f64) -> Option<Detected> {
        let box_a = a.aabb;
        let box_b = b.aabb;
        if !box_a.inflate(tolerance).intersects(&box_b) {
            return None;
        }
        let hard = box_a.intersects(&box_b);
        let distance = box_a.distance_to(&box_b);
        Some(Detected {
            record: OverlapRecord {
                overlap_id: 0,
                query_id: 0,
                tolerance,
                overlap_tris: if hard { a.triangle_count + b.triangle_count } else { 0 },
                start_time: 0.0,
                end_time: 0.0,
                num_records: 1,
                object_a_path: a.path.clone(),
                object_b_path: b.path.clone(),
                min_distance: (!hard).then_some(distance),
                comment: None,
            },
            frames: Vec::new(),
        })
    }

    fn test_pair_dynamic(
        &self,
        a: &PrimSnapshot,
        b: &PrimSnapshot,
        tolerance: f64,
        start: f64,
        end: f64,
    ) -> Option<Detected> {
        let mut times: Vec<f64> = a
            .frames
            .iter()
            .chain(b.frames.iter())
            .map(|f| f.time)
            .filter(|t| (start..=end).contains(t))
            .collect();
        if times.is_empty() {
            // No samples inside the window: check the window start.
            times.push(start);
        }
        times.sort_by(|x, y| x.total_cmp(y));
        times.dedup();

        let mut hits: Vec<FrameRecord> = Vec::new();
        let mut min_distance = f64::INFINITY;
        let mut any_hard = false;
        for &t in &times {
            let box_a = a.aabb_at(t);
            let box_b = b.aabb_at(t);
            if !box_a.inflate(tolerance).intersects(&box_b) {
                continue;
            }
            let hard = box_a.intersects(&box_b);
            any_hard |= hard;
            min_distance = min_distance.min(box_a.distance_to(&box_b));
            hits.push(FrameRecord {
                time: t,
                overlap_tris: if hard { a.triangle_count + b.triangle_count } else { 0 },
            });
        }
        if hits.is_empty() {
            return None;
        }

        let overlap_tris = hits.iter().map(|f| f.overlap_tris).max().unwrap_or(0);
        Some(Detected {
            record: OverlapRecord {
                overlap_id: 0,
                query_id: 0,
                tolerance,
                overlap_tris,
                start_time: hits.first().map(|f| f.time).unwrap_or(start),
                end_time: hits.last().map(|f| f.time).unwrap_or(end),
                num_records: hits.len() as u32,
                object_a_path: a.path.clone(),
                object_b_path: b.path.clone(),
                min_distance: (!any_hard).then_some(min_distance),
                comment: None,
            },
            frames: hits,
        })
    }
}

impl DetectionEngine for BoxClashEngine {
    fn set_scope(
        &mut self,
        stage: &Stage,
        scope_a: &ScopeSelector,
        scope_b: &ScopeSelector,
        duplicate_mode: bool,
    ) -> Result<()> {
        let snapshot = |selector: &ScopeSelector| -> Result<Vec<PrimSnapshot>> {
            let prims = stage.select(selector);
            if prims.is_empty() {
                return Err(Error::EmptyScopeSelection(selector.to_string()));
            }
            Ok(prims
                .into_iter()
                .map(|p| PrimSnapshot {
                    path: p.path.clone(),
                    aabb: p.aabb,
                    triangle_count: p.triangle_count,
                    frames: p.frames.clone(),
                })
                .collect())
        };

        let a = snapshot(scope_a)?;
        let b = snapshot(scope_b)?;
        tracing::debug!(
            scope_a = %scope_a,
            scope_b = %scope_b,
            prims_a = a.len(),
            prims_b = b.len(),
            duplicate_mode,
            "Scope configured"
        );
        self.scope = Some(Scope { a, b, duplicate_mode });
        self.pipeline = None;
        Ok(())
    }

    fn set_settings(&mut self, settings: &ClashSettings, _stage: &Stage) -> Result<()> {
        let settings = settings.clone().validated()?;
        self.settings = Some(settings);
        self.pipeline = None;
        Ok(())
    }

    fn create_pipeline(&mut self) -> usize {
        let Some(scope) = self.scope.as_ref() else {
            return 0;
        };
        if self.settings.is_none() {
            return 0;
        }

        // Candidate pairs: full cross product minus self-pairs, unordered
        // pairs deduplicated when the scopes overlap.
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut seen: std::collections::HashSet<(String, String)> = std::collections::HashSet::new();
        for (i, a) in scope.a.iter().enumerate() {
            for (j, b) in scope.b.iter().enumerate() {
                if a.path == b.path {
                    continue;
                }
                let key = if a.path <= b.path {
                    (a.path.clone(), b.path.clone())
                } else {
                    (b.path.clone(), a.path.clone())
                };
                if seen.insert(key) {
                    pairs.push((i, j));
                }
            }
        }

        // Nominal count is derived from raw scope size; dedup can make
        // the actual work shorter, which the finished flag reports.
        let nominal = (scope.a.len() * scope.b.len()).div_ceil(PAIRS_PER_STEP).max(1);
        let chunks: Vec<Vec<(usize, usize)>> = pairs
            .chunks(PAIRS_PER_STEP)
            .map(|c| c.to_vec())
            .collect();

        if self.verbose() {
            tracing::info!(
                candidate_pairs = chunks.iter().map(|c| c.len()).sum::<usize>(),
                steps = nominal,
                "Pipeline created"
            );
        }
        self.found.clear();
        self.pipeline = Some(Pipeline {
            chunks,
            nominal_steps: nominal,
        });
        nominal
    }

    fn pipeline_step_data(&self, index: usize) -> PipelineStepData {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return PipelineStepData {
                progress: 0.0,
                finished: true,
            };
        };
        PipelineStepData {
            progress: index as f64 / pipeline.nominal_steps.max(1) as f64,
            finished: index >= pipeline.chunks.len(),
        }
    }

    fn run_pipeline_step(&mut self, index: usize) {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return;
        };
        let Some(chunk) = pipeline.chunks.get(index) else {
            return;
        };
        let chunk = chunk.clone();
        let scope = self.scope.as_ref().expect("scope set before pipeline");
        let mut step_hits = 0usize;
        let mut detected = Vec::new();
        for (i, j) in chunk {
            if let Some(hit) = self.test_pair(&scope.a[i], &scope.b[j]) {
                step_hits += 1;
                detected.push(hit);
            }
        }
        if self.verbose() && step_hits > 0 {
            tracing::info!(step = index, hits = step_hits, "Pipeline step complete");
        }
        self.found.extend(detected);
    }

    fn overlap_count(&self) -> usize {
        self.found.len()
    }

    fn fetch_and_save_overlaps<'a>(
        &'a mut self,
        store: &'a mut dyn OverlapStore,
        query: &ClashQuery,
    ) -> Box<dyn Iterator<Item = clash_lite_store::Result<u8>> + 'a> {
        let total = self.found.len();
        let pending = std::mem::take(&mut self.found);
        Box::new(FetchAndSave {
            store,
            pending: pending.into_iter(),
            total,
            inserted: 0,
            query_id: query.identifier(),
        })
    }
}

/// Finite fetch-and-save stream. Draining: the engine's result buffer is
/// consumed, so the stream is not restartable.
struct FetchAndSave<'a> {
    store: &'a mut dyn OverlapStore,
    pending: std::vec::IntoIter<Detected>,
    total: usize,
    inserted: usize,
    query_id: i64,
}

impl Iterator for FetchAndSave<'_> {
    type Item = clash_lite_store::Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.inserted >= self.total {
            return None;
        }
        for _ in 0..SAVE_BATCH {
            let Some(detected) = self.pending.next() else {
                break;
            };
            let mut record = detected.record;
            record.query_id = self.query_id;
            if let Err(e) = self.store.insert_overlap(&record, &detected.frames) {
                // Poison the stream: skip remaining work.
                self.inserted = self.total;
                return Some(Err(e));
            }
            self.inserted += 1;
        }
        Some(Ok(((self.inserted * 100) / self.total.max(1)) as u8))
    }
}
