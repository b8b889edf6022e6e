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

//! The flat, capacity-bounded, insertion-sorted table of shard assignments
//! a mapping run produces.

use domino_core::{Aabb, Resolution};

pub const STREAMING_ALLOWED: u32 = 1 << 0;
pub const SIMULATION_ALLOWED: u32 = 1 << 1;
pub const WHOLE_DOMAIN: u32 = 1 << 2;

/// One tile's worth of shard ownership.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShardAssignment {
    pub domain_id: u64,
    pub tile_id: u64,
    pub resolution: Resolution,
    pub bounds: Aabb,
    pub shard_id: u32,
    pub flags: u32,
}

pub(crate) fn resolution_rank(resolution: Resolution) -> u32 {
    match resolution {
        Resolution::Full => 0,
        Resolution::Medium => 1,
        Resolution::Coarse => 2,
        Resolution::Analytic => 3,
        Resolution::Refused => 4,
    }
}

fn assignment_before(a: &ShardAssignment, b: &ShardAssignment) -> bool {
    if a.domain_id != b.domain_id {
        return a.domain_id < b.domain_id;
    }
    let ra = resolution_rank(a.resolution);
    let rb = resolution_rank(b.resolution);
    if ra != rb {
        return ra < rb;
    }
    a.tile_id < b.tile_id
}

/// A bounded, insertion-sorted index of `(domain_id, resolution, tile_id)`
/// shard assignments. Deliberately a plain `Vec` with a sorted-insert
/// helper and a linear `find_shard` scan rather than a `BTreeMap`: table
/// sizes are bounded and total order must match `(domain_id, resolution,
/// tile_id)` exactly, which this shape guarantees without extra
/// bookkeeping.
#[derive(Clone, PartialEq, Debug)]
pub struct ShardDomainIndex {
    assignments: Vec<ShardAssignment>,
    capacity: u32,
    overflow: bool,
    uncertain: bool,
}

impl ShardDomainIndex {
    pub fn new(capacity: u32) -> ShardDomainIndex {
        ShardDomainIndex {
            assignments: Vec::with_capacity(capacity as usize),
            capacity,
            overflow: false,
            uncertain: false,
        }
    }

    pub fn clear(&mut self) {
        self.assignments.clear();
        self.overflow = false;
        self.uncertain = false;
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignments(&self) -> &[ShardAssignment] {
        &self.assignments
    }

    pub fn overflow(&self) -> bool {
        self.overflow
    }

    pub fn uncertain(&self) -> bool {
        self.uncertain
    }

    pub(crate) fn set_uncertain(&mut self) {
        self.uncertain = true;
    }

    /// Inserts `assignment` keeping total order by `(domain_id, resolution,
    /// tile_id)` ascending. Returns `false` (and sets `overflow`) if the
    /// index is already at capacity.
    pub fn add(&mut self, assignment: ShardAssignment) -> bool {
        if self.assignments.len() >= self.capacity as usize {
            self.overflow = true;
            return false;
        }
        let insert_at = self
            .assignments
            .iter()
            .position(|existing| !assignment_before(existing, &assignment))
            .unwrap_or(self.assignments.len());
        self.assignments.insert(insert_at, assignment);
        true
    }

    /// Linear scan for the shard owning `(domain_id, tile_id)`.
    pub fn find_shard(&self, domain_id: u64, tile_id: u64) -> Option<u32> {
        self.assignments
            .iter()
            .find(|a| a.domain_id == domain_id && a.tile_id == tile_id)
            .map(|a| a.shard_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domino_core::Point;

    fn assignment(domain_id: u64, resolution: Resolution, tile_id: u64) -> ShardAssignment {
        ShardAssignment {
            domain_id,
            tile_id,
            resolution,
            bounds: Aabb::new(Point::ZERO, Point::ZERO),
            shard_id: 1,
            flags: 0,
        }
    }

    #[test]
    fn add_keeps_ascending_order_by_key() {
        let mut index = ShardDomainIndex::new(8);
        index.add(assignment(2, Resolution::Coarse, 5));
        index.add(assignment(1, Resolution::Coarse, 9));
        index.add(assignment(1, Resolution::Full, 3));
        index.add(assignment(1, Resolution::Full, 1));
        let keys: Vec<(u64, u32, u64)> = index
            .assignments()
            .iter()
            .map(|a| (a.domain_id, resolution_rank(a.resolution), a.tile_id))
            .collect();
        assert_eq!(
            keys,
            vec![(1, 0, 1), (1, 0, 3), (1, 2, 9), (2, 2, 5)]
        );
    }

    #[test]
    fn add_past_capacity_sets_overflow() {
        let mut index = ShardDomainIndex::new(1);
        assert!(index.add(assignment(1, Resolution::Full, 1)));
        assert!(!index.add(assignment(1, Resolution::Full, 2)));
        assert!(index.overflow());
    }

    #[test]
    fn find_shard_scans_for_exact_key() {
        let mut index = ShardDomainIndex::new(4);
        index.add(assignment(1, Resolution::Coarse, 7));
        assert_eq!(index.find_shard(1, 7), Some(1));
        assert_eq!(index.find_shard(1, 8), None);
        assert_eq!(index.find_shard(2, 7), None);
    }

    #[test]
    fn clear_resets_flags_but_keeps_capacity() {
        let mut index = ShardDomainIndex::new(2);
        index.add(assignment(1, Resolution::Full, 1));
        index.set_uncertain();
        index.clear();
        assert!(index.is_empty());
        assert!(!index.uncertain());
        assert_eq!(index.capacity(), 2);
    }
}
