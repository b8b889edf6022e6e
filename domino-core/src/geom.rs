// This file is part of domino.
// Copyright (C) 2026 Domino Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::fixed::Q16_16;

/// A point in Q16.16 space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: Q16_16,
    pub y: Q16_16,
    pub z: Q16_16,
}

impl Point {
    pub const ZERO: Point = Point {
        x: Q16_16::ZERO,
        y: Q16_16::ZERO,
        z: Q16_16::ZERO,
    };

    pub fn new(x: Q16_16, y: Q16_16, z: Q16_16) -> Point {
        Point { x, y, z }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x.add(other.x), self.y.add(other.y), self.z.add(other.z))
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x.sub(other.x), self.y.sub(other.y), self.z.sub(other.z))
    }
}

/// An axis-aligned bounding box with `min.{x,y,z} <= max.{x,y,z}`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    pub fn new(min: Point, max: Point) -> Aabb {
        Aabb { min, max }
    }

    pub fn extent(&self) -> Point {
        self.max.sub(self.min)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.min.x.add(self.max.x).div(Q16_16::from_int(2)),
            self.min.y.add(self.max.y).div(Q16_16::from_int(2)),
            self.min.z.add(self.max.z).div(Q16_16::from_int(2)),
        )
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// L1 distance from the box to `p`, zero if `p` is inside. Each axis
    /// contributes the signed-clamped distance outside `[min, max]` on that
    /// axis; the sum saturates to `Q16_16::MAX`.
    pub fn distance_l1(&self, p: &Point) -> Q16_16 {
        let axis = |v: Q16_16, lo: Q16_16, hi: Q16_16| -> Q16_16 {
            if v < lo {
                lo.sub(v)
            } else if v > hi {
                v.sub(hi)
            } else {
                Q16_16::ZERO
            }
        };
        axis(p.x, self.min.x, self.max.x)
            .add(axis(p.y, self.min.y, self.max.y))
            .add(axis(p.z, self.min.z, self.max.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: i32, y: i32, z: i32) -> Point {
        Point::new(Q16_16::from_int(x), Q16_16::from_int(y), Q16_16::from_int(z))
    }

    #[test]
    fn contains_is_inclusive_of_bounds() {
        let aabb = Aabb::new(pt(-1, -1, -1), pt(1, 1, 1));
        assert!(aabb.contains(&pt(1, 1, 1)));
        assert!(aabb.contains(&pt(-1, -1, -1)));
        assert!(!aabb.contains(&pt(2, 0, 0)));
    }

    #[test]
    fn distance_l1_zero_when_inside() {
        let aabb = Aabb::new(pt(-1, -1, -1), pt(1, 1, 1));
        assert_eq!(aabb.distance_l1(&pt(0, 0, 0)), Q16_16::ZERO);
    }

    #[test]
    fn distance_l1_sums_outside_axes() {
        let aabb = Aabb::new(pt(0, 0, 0), pt(1, 1, 1));
        assert_eq!(aabb.distance_l1(&pt(3, 2, 0)), Q16_16::from_int(3));
    }
}
