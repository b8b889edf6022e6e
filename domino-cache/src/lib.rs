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

//! A bounded, deterministic tile cache.
//!
//! This is deliberately a hand-rolled slot array rather than a wrapper
//! around an off-the-shelf LRU crate: eviction picks the first invalid
//! slot, else the entry with minimum `last_used` tie-broken by minimum
//! `insert_order`, and `insert_order` survives invalidation. That contract
//! is more specific than a plain recency list exposes.

use domino_tile::{Tile, TileResolution};

#[derive(Clone, Debug)]
struct Entry {
    domain_id: u64,
    tile_id: u64,
    resolution: TileResolution,
    authoring_version: u32,
    last_used: u64,
    insert_order: u64,
    valid: bool,
    tile: Tile,
}

impl Entry {
    fn vacant() -> Entry {
        Entry {
            domain_id: 0,
            tile_id: 0,
            resolution: TileResolution::Full,
            authoring_version: 0,
            last_used: 0,
            insert_order: 0,
            valid: false,
            tile: Tile::empty(),
        }
    }

    fn matches(&self, domain_id: u64, tile_id: u64, resolution: TileResolution, authoring_version: u32) -> bool {
        self.valid
            && self.domain_id == domain_id
            && self.tile_id == tile_id
            && self.resolution == resolution
            && self.authoring_version == authoring_version
    }
}

/// Capacity-bounded cache of built tiles. Grows only via [`TileCache::reserve`].
#[derive(Debug)]
pub struct TileCache {
    entries: Vec<Entry>,
    count: usize,
    use_counter: u64,
    next_insert_order: u64,
}

impl TileCache {
    /// Creates a cache with `capacity` pre-initialized, invalid slots.
    pub fn new(capacity: usize) -> TileCache {
        let mut cache = TileCache {
            entries: Vec::new(),
            count: 0,
            use_counter: 0,
            next_insert_order: 0,
        };
        cache.reserve(capacity);
        cache
    }

    /// Grows the backing slot array to at least `capacity`, never shrinking
    /// and never implicitly growing on any other call.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.entries.len() {
            return;
        }
        tracing::debug!(capacity, "reserving tile cache capacity");
        self.entries.resize_with(capacity, Entry::vacant);
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn find_index(&self, domain_id: u64, tile_id: u64, resolution: TileResolution, authoring_version: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.matches(domain_id, tile_id, resolution, authoring_version))
    }

    /// Non-mutating lookup; never changes LRU state.
    pub fn peek(&self, domain_id: u64, tile_id: u64, resolution: TileResolution, authoring_version: u32) -> Option<&Tile> {
        self.find_index(domain_id, tile_id, resolution, authoring_version)
            .map(|i| &self.entries[i].tile)
    }

    /// On hit, stamps the entry's `last_used` from the cache's monotonic
    /// counter. On miss, returns nothing.
    pub fn get(&mut self, domain_id: u64, tile_id: u64, resolution: TileResolution, authoring_version: u32) -> Option<&Tile> {
        let idx = self.find_index(domain_id, tile_id, resolution, authoring_version)?;
        self.use_counter += 1;
        self.entries[idx].last_used = self.use_counter;
        Some(&self.entries[idx].tile)
    }

    fn select_eviction_slot(&self) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let mut best: Option<usize> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.valid {
                return Some(i);
            }
            best = match best {
                None => Some(i),
                Some(b) => {
                    let b_entry = &self.entries[b];
                    if entry.last_used < b_entry.last_used
                        || (entry.last_used == b_entry.last_used && entry.insert_order < b_entry.insert_order)
                    {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    /// Finds an existing matching entry or selects an eviction slot, then
    /// moves `tile` into the slot, leaving `tile` empty. Returns a reference
    /// to the now-resident tile, or `None` on a zero-capacity cache.
    pub fn put(&mut self, domain_id: u64, tile: &mut Tile) -> Option<&Tile> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self
            .find_index(domain_id, tile.tile_id, tile.resolution, tile.authoring_version)
            .or_else(|| self.select_eviction_slot())?;

        let entry = &mut self.entries[idx];
        if !entry.valid {
            self.count += 1;
            entry.insert_order = self.next_insert_order;
            self.next_insert_order += 1;
        }

        entry.domain_id = domain_id;
        entry.tile_id = tile.tile_id;
        entry.resolution = tile.resolution;
        entry.authoring_version = tile.authoring_version;
        entry.tile = std::mem::replace(tile, Tile::empty());
        entry.valid = true;

        self.use_counter += 1;
        entry.last_used = self.use_counter;

        Some(&entry.tile)
    }

    /// Invalidates every entry for `domain_id`, freeing its sample storage.
    /// `insert_order` on the remaining entries is untouched.
    pub fn invalidate_domain(&mut self, domain_id: u64) {
        let mut removed = 0u32;
        for entry in &mut self.entries {
            if entry.valid && entry.domain_id == domain_id {
                entry.valid = false;
                entry.tile = Tile::empty();
                removed += 1;
            }
        }
        self.count = self.count.saturating_sub(removed as usize);
        tracing::debug!(domain_id, removed, "invalidated tile cache entries by domain");
    }

    /// Invalidates every entry with `authoring_version`.
    pub fn invalidate_version(&mut self, authoring_version: u32) {
        let mut removed = 0u32;
        for entry in &mut self.entries {
            if entry.valid && entry.authoring_version == authoring_version {
                entry.valid = false;
                entry.tile = Tile::empty();
                removed += 1;
            }
        }
        self.count = self.count.saturating_sub(removed as usize);
        tracing::debug!(authoring_version, removed, "invalidated tile cache entries by version");
    }

    /// Invalidates every entry in the cache.
    pub fn invalidate_all(&mut self) {
        let removed = self.count as u32;
        for entry in &mut self.entries {
            if entry.valid {
                entry.valid = false;
                entry.tile = Tile::empty();
            }
        }
        self.count = 0;
        tracing::debug!(removed, "invalidated all tile cache entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domino_core::{Aabb, Q16_16};
    use rand::seq::SliceRandom;

    fn tile(id: u64, res: TileResolution, version: u32) -> Tile {
        Tile {
            tile_id: id,
            resolution: res,
            sample_dim: 1,
            bounds: Aabb::default(),
            authoring_version: version,
            samples: vec![Q16_16::ZERO],
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut cache = TileCache::new(2);
        let mut t = tile(1, TileResolution::Full, 0);
        cache.put(10, &mut t);
        assert!(t.is_empty(), "put must move the tile out of the caller's value");
        assert!(cache.get(10, 1, TileResolution::Full, 0).is_some());
    }

    #[test]
    fn eviction_picks_min_last_used_then_min_insert_order() {
        let mut cache = TileCache::new(2);
        let mut a = tile(1, TileResolution::Full, 0);
        let mut b = tile(2, TileResolution::Full, 0);
        cache.put(10, &mut a);
        cache.put(10, &mut b);
        // touch `a` so `b` becomes the least-recently-used entry
        cache.get(10, 1, TileResolution::Full, 0);

        let mut c = tile(3, TileResolution::Full, 0);
        cache.put(10, &mut c);

        assert!(cache.peek(10, 2, TileResolution::Full, 0).is_none(), "b should have been evicted");
        assert!(cache.peek(10, 1, TileResolution::Full, 0).is_some());
        assert!(cache.peek(10, 3, TileResolution::Full, 0).is_some());
    }

    #[test]
    fn peek_does_not_affect_eviction_order() {
        let mut cache = TileCache::new(2);
        let mut a = tile(1, TileResolution::Full, 0);
        let mut b = tile(2, TileResolution::Full, 0);
        cache.put(10, &mut a);
        cache.put(10, &mut b);

        // many peeks of `a`; since peek never updates last_used, `a` is still
        // the least-recently-used entry and should be evicted next.
        for _ in 0..5 {
            cache.peek(10, 1, TileResolution::Full, 0);
        }
        let mut c = tile(3, TileResolution::Full, 0);
        cache.put(10, &mut c);
        assert!(cache.peek(10, 1, TileResolution::Full, 0).is_none());
    }

    #[test]
    fn invalidate_domain_preserves_insert_order_for_remaining_entries() {
        let mut cache = TileCache::new(3);
        let mut a = tile(1, TileResolution::Full, 0);
        let mut b = tile(2, TileResolution::Full, 0);
        let mut c = tile(3, TileResolution::Full, 0);
        cache.put(10, &mut a);
        cache.put(20, &mut b);
        cache.put(10, &mut c);

        cache.invalidate_domain(10);
        assert_eq!(cache.len(), 1);
        assert!(cache.peek(20, 2, TileResolution::Full, 0).is_some());
    }

    #[test]
    fn put_on_zero_capacity_cache_returns_none() {
        let mut cache = TileCache::new(0);
        let mut t = tile(1, TileResolution::Full, 0);
        assert!(cache.put(10, &mut t).is_none());
    }

    #[test]
    fn reserve_never_shrinks() {
        let mut cache = TileCache::new(4);
        cache.reserve(2);
        assert_eq!(cache.capacity(), 4);
        cache.reserve(8);
        assert_eq!(cache.capacity(), 8);
    }

    #[test]
    fn shuffled_access_order_is_consistent_with_residency() {
        let mut cache = TileCache::new(16);
        let mut ids: Vec<u64> = (0..16).collect();
        let mut rng = rand::thread_rng();
        ids.shuffle(&mut rng);
        for &id in &ids {
            let mut t = tile(id, TileResolution::Full, 0);
            cache.put(1, &mut t);
        }
        for &id in &ids {
            assert!(cache.peek(1, id, TileResolution::Full, 0).is_some());
        }
    }
}
