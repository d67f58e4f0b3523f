// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in stage units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Unit cube with its minimum corner at `origin`.
    pub fn unit_cube(origin: [f64; 3]) -> Self {
        Self {
            min: origin,
            max: [origin[0] + 1.0, origin[1] + 1.0, origin[2] + 1.0],
        }
    }

    /// Grow the box by `amount` on every side. Negative amounts shrink.
    pub fn inflate(&self, amount: f64) -> Self {
        Self {
            min: [
                self.min[0] - amount,
                self.min[1] - amount,
                self.min[2] - amount,
            ],
            max: [
                self.max[0] + amount,
                self.max[1] + amount,
                self.max[2] + amount,
            ],
        }
    }

    /// Box translated by `offset`.
    pub fn translated(&self, offset: [f64; 3]) -> Self {
        Self {
            min: [
                self.min[0] + offset[0],
                self.min[1] + offset[1],
                self.min[2] + offset[2],
            ],
            max: [
                self.max[0] + offset[0],
                self.max[1] + offset[1],
                self.max[2] + offset[2],
            ],
        }
    }

    /// Closed-interval intersection test: shared faces count as touching.
    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }

    /// Intersection of two boxes, if any.
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let min = [
            self.min[0].max(other.min[0]),
            self.min[1].max(other.min[1]),
            self.min[2].max(other.min[2]),
        ];
        let max = [
            self.max[0].min(other.max[0]),
            self.max[1].min(other.max[1]),
            self.max[2].min(other.max[2]),
        ];
        (0..3)
            .all(|i| min[i] <= max[i])
            .then_some(Aabb { min, max })
    }

    /// Minimum separation distance between two boxes. Zero when they
    /// intersect or touch.
    pub fn distance_to(&self, other: &Aabb) -> f64 {
        let mut sq = 0.0;
        for i in 0..3 {
            let gap = (other.min[i] - self.max[i]).max(self.min[i] - other.max[i]).max(0.0);
            sq += gap * gap;
        }
        sq.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersecting_unit_cubes() {
        let a = Aabb::unit_cube([0.0, 0.0, 0.0]);
        let b = Aabb::unit_cube([0.5, 0.5, 0.5]);
        assert!(a.intersects(&b));
        assert_eq!(a.distance_to(&b), 0.0);
    }

    #[test]
    fn touching_faces_count_as_intersecting() {
        let a = Aabb::unit_cube([0.0, 0.0, 0.0]);
        let b = Aabb::unit_cube([1.0, 0.0, 0.0]);
        assert!(a.intersects(&b));
    }

    #[test]
    fn separation_distance() {
        let a = Aabb::unit_cube([0.0, 0.0, 0.0]);
        let b = Aabb::unit_cube([3.0, 0.0, 0.0]);
        assert!(!a.intersects(&b));
        assert!((a.distance_to(&b) - 2.0).abs() < 1e-12);
        // Inflating by the gap closes it.
        assert!(a.inflate(2.0).intersects(&b));
    }

    #[test]
    fn intersection_volume() {
        let a = Aabb::unit_cube([0.0, 0.0, 0.0]);
        let b = Aabb::unit_cube([0.5, 0.0, 0.0]);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i.min, [0.5, 0.0, 0.0]);
        assert_eq!(i.max, [1.0, 1.0, 1.0]);

        let far = Aabb::unit_cube([5.0, 5.0, 5.0]);
        assert!(a.intersection(&far).is_none());
    }
}
