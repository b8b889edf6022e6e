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

//! Deterministic domain-driven shard mapping: partitions each volume's
//! source bounds into tiles and assigns a shard to every tile the volume
//! actually contains.

use domino_core::hash::{mix_u64, FNV_OFFSET_BASIS};
use domino_core::{Aabb, Budget, DominoError, Point, Q16_16, Resolution, Result};
use domino_query::{contains, ArchivalState, Volume};
use tracing::{info_span, warn};

use crate::index::{resolution_rank, ShardAssignment, ShardDomainIndex};
use crate::index::{SIMULATION_ALLOWED, STREAMING_ALLOWED, WHOLE_DOMAIN};

pub const ALLOW_SPLIT: u32 = 1 << 0;
pub const ALLOW_STREAMING: u32 = 1 << 1;
pub const ALLOW_SIMULATION: u32 = 1 << 2;

/// Knobs for one mapping run.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionParams {
    pub shard_count: u32,
    pub allow_split: bool,
    pub resolution: Resolution,
    pub max_tiles_per_domain: u32,
    pub budget_units: u32,
    pub global_seed: u64,
}

impl Default for PartitionParams {
    fn default() -> PartitionParams {
        PartitionParams {
            shard_count: 1,
            allow_split: true,
            resolution: Resolution::Coarse,
            max_tiles_per_domain: 1024,
            budget_units: 0,
            global_seed: 0,
        }
    }
}

/// One volume to be partitioned, paired with its per-input flags
/// (`ALLOW_SPLIT` / `ALLOW_STREAMING` / `ALLOW_SIMULATION`).
pub struct ShardInput<'a> {
    pub domain_id: u64,
    pub volume: &'a mut Volume,
    pub flags: u32,
}

fn shard_hash_mix(mut hash: u64, value: u64) -> u64 {
    for i in 0..8u32 {
        hash = mix_u64(hash, (value >> (i * 8)) & 0xFF);
    }
    hash
}

fn shard_pick(seed: u64, domain_id: u64, tile_id: u64, shard_count: u32) -> u32 {
    if shard_count == 0 {
        return 0;
    }
    let mut hash = FNV_OFFSET_BASIS;
    hash = shard_hash_mix(hash, seed);
    hash = shard_hash_mix(hash, domain_id);
    hash = shard_hash_mix(hash, tile_id);
    (hash % shard_count as u64) as u32 + 1
}

fn floor_div_q16_16(numer: i64, denom: Q16_16) -> i32 {
    let d = denom.0 as i64;
    if d == 0 {
        return 0;
    }
    if numer >= 0 {
        return (numer / d) as i32;
    }
    let mut q = (-numer) / d;
    if (-numer) % d != 0 {
        q += 1;
    }
    (-q) as i32
}

fn mul_i32_q16_16(a: i32, b: Q16_16) -> Q16_16 {
    let v = a as i64 * b.0 as i64;
    Q16_16(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

fn make_tile_bounds(bounds: &Aabb, tile_size: Q16_16, tx: i32, ty: i32, tz: i32) -> Aabb {
    let mut minp = Point::new(
        bounds.min.x.add(mul_i32_q16_16(tx, tile_size)),
        bounds.min.y.add(mul_i32_q16_16(ty, tile_size)),
        bounds.min.z.add(mul_i32_q16_16(tz, tile_size)),
    );
    let mut maxp = Point::new(
        minp.x.add(tile_size),
        minp.y.add(tile_size),
        minp.z.add(tile_size),
    );
    if maxp.x > bounds.max.x {
        maxp.x = bounds.max.x;
    }
    if maxp.y > bounds.max.y {
        maxp.y = bounds.max.y;
    }
    if maxp.z > bounds.max.z {
        maxp.z = bounds.max.z;
    }
    if minp.x < bounds.min.x {
        minp.x = bounds.min.x;
    }
    if minp.y < bounds.min.y {
        minp.y = bounds.min.y;
    }
    if minp.z < bounds.min.z {
        minp.z = bounds.min.z;
    }
    Aabb::new(minp, maxp)
}

fn mid_q16_16(a: Q16_16, b: Q16_16) -> Q16_16 {
    let diff = b.0 as i64 - a.0 as i64;
    let mid = a.0 as i64 + diff / 2;
    Q16_16(mid.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

fn bounds_valid(bounds: &Aabb) -> bool {
    bounds.min.x <= bounds.max.x && bounds.min.y <= bounds.max.y && bounds.min.z <= bounds.max.z
}

fn state_allows_activity(volume: &Volume) -> bool {
    volume.is_active() && volume.archival_state == ArchivalState::Live
}

/// Whether streaming may be offered for `input`: the caller asked for it,
/// the volume is active, and its archival state is `Live`.
pub fn shard_streaming_allowed(input: &ShardInput) -> bool {
    (input.flags & ALLOW_STREAMING) != 0 && state_allows_activity(input.volume)
}

fn shard_simulation_allowed(input: &ShardInput) -> bool {
    (input.flags & ALLOW_SIMULATION) != 0 && state_allows_activity(input.volume)
}

/// Partitions every input's source bounds into tiles at `params.resolution`
/// and assigns a shard to each tile the volume actually contains, writing
/// the result into `out_index` (cleared first). Bad bounds, an inactive
/// volume, or a ladder refusal other than `Budget` flips `out_index`'s
/// `uncertain` bit and moves on to the next tile or input rather than
/// failing the run; an index at capacity aborts the whole run with
/// [`DominoError::TableFull`], matching the "insert failure stops the
/// mapper" contract of the source this is grounded on.
pub fn shard_map(
    inputs: &mut [ShardInput],
    params: &PartitionParams,
    out_index: &mut ShardDomainIndex,
) -> Result<()> {
    if params.shard_count == 0 {
        return Err(DominoError::NonPositivePolicyField {
            field: "shard_count",
            value: 0,
        });
    }

    out_index.clear();
    let span = info_span!("shard_map", inputs = inputs.len(), shard_count = params.shard_count);
    let _enter = span.enter();

    let resolution = if resolution_rank(params.resolution) >= resolution_rank(Resolution::Refused)
    {
        Resolution::Coarse
    } else {
        params.resolution
    };

    for input in inputs.iter_mut() {
        let bounds = input.volume.source.bounds();
        if !bounds_valid(&bounds) {
            out_index.set_uncertain();
            continue;
        }
        if !input.volume.is_active() {
            continue;
        }

        let tile_size = input.volume.policy.tile_size;
        if tile_size.0 <= 0 {
            out_index.set_uncertain();
            continue;
        }

        let tx_max = floor_div_q16_16(bounds.max.x.0 as i64 - bounds.min.x.0 as i64, tile_size);
        let ty_max = floor_div_q16_16(bounds.max.y.0 as i64 - bounds.min.y.0 as i64, tile_size);
        let tz_max = floor_div_q16_16(bounds.max.z.0 as i64 - bounds.min.z.0 as i64, tile_size);
        if tx_max < 0 || ty_max < 0 || tz_max < 0 {
            out_index.set_uncertain();
            continue;
        }

        let mut budget = if params.budget_units > 0 {
            Budget::new(params.budget_units)
        } else {
            Budget::new(u32::MAX)
        };

        let allow_split = params.allow_split && (input.flags & ALLOW_SPLIT) != 0;
        let domain_shard = shard_pick(params.global_seed, input.domain_id, 0, params.shard_count);
        let stream_allowed = shard_streaming_allowed(input);
        let sim_allowed = shard_simulation_allowed(input);

        let mut tile_count = 0u32;
        let mut budget_exhausted = false;
        'tiles: for tz in 0..=tz_max {
            for ty in 0..=ty_max {
                for tx in 0..=tx_max {
                    if params.max_tiles_per_domain > 0 && tile_count >= params.max_tiles_per_domain
                    {
                        out_index.set_uncertain();
                        budget_exhausted = true;
                        break 'tiles;
                    }
                    tile_count += 1;

                    let tile_bounds = make_tile_bounds(&bounds, tile_size, tx, ty, tz);
                    let center = Point::new(
                        mid_q16_16(tile_bounds.min.x, tile_bounds.max.x),
                        mid_q16_16(tile_bounds.min.y, tile_bounds.max.y),
                        mid_q16_16(tile_bounds.min.z, tile_bounds.max.z),
                    );

                    let (inside, meta) = contains(input.volume, &center, &mut budget, None);
                    if !meta.is_ok() {
                        out_index.set_uncertain();
                        if meta.refusal_reason == domino_core::RefusalReason::Budget {
                            budget_exhausted = true;
                            break 'tiles;
                        }
                        continue;
                    }
                    if meta.confidence != domino_core::Confidence::Exact {
                        out_index.set_uncertain();
                        continue;
                    }
                    if !inside {
                        continue;
                    }

                    let tile_id =
                        domino_tile::tile_id_from_coord(tx, ty, tz, resolution as u32);
                    let shard_id = if allow_split {
                        shard_pick(params.global_seed, input.domain_id, tile_id, params.shard_count)
                    } else {
                        domain_shard
                    };

                    let mut flags = 0u32;
                    if stream_allowed {
                        flags |= STREAMING_ALLOWED;
                    }
                    if sim_allowed {
                        flags |= SIMULATION_ALLOWED;
                    }
                    if !allow_split {
                        flags |= WHOLE_DOMAIN;
                    }

                    let assignment = ShardAssignment {
                        domain_id: input.domain_id,
                        tile_id,
                        resolution,
                        bounds: tile_bounds,
                        shard_id,
                        flags,
                    };
                    if !out_index.add(assignment) {
                        warn!(domain_id = input.domain_id, "shard index overflow");
                        return Err(DominoError::TableFull {
                            table: "shard_domain_index",
                            capacity: out_index.capacity() as usize,
                        });
                    }
                }
            }
        }
        let _ = budget_exhausted;
    }

    if out_index.uncertain() || out_index.overflow() {
        warn!(
            uncertain = out_index.uncertain(),
            overflow = out_index.overflow(),
            "shard mapping run completed with degraded confidence"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domino_core::{Point, Q16_16};
    use domino_query::{ExistenceState, Volume};
    use domino_tile::SdfSource;

    struct BallSource {
        bounds: Aabb,
        radius: Q16_16,
    }

    impl SdfSource for BallSource {
        fn eval(&self, point: &Point) -> Q16_16 {
            let dx = point.x.abs();
            let dy = point.y.abs();
            let dz = point.z.abs();
            dx.add(dy).add(dz).sub(self.radius)
        }
        fn bounds(&self) -> Aabb {
            self.bounds
        }
    }

    fn ball_volume(radius: i32) -> Volume {
        let bounds = Aabb::new(
            Point::new(Q16_16::from_int(-8), Q16_16::from_int(-8), Q16_16::from_int(-8)),
            Point::new(Q16_16::from_int(8), Q16_16::from_int(8), Q16_16::from_int(8)),
        );
        let mut v = Volume::new(1, Box::new(BallSource { bounds, radius: Q16_16::from_int(radius) }));
        v.policy.tile_size = Q16_16::from_int(4);
        v.set_state(ExistenceState::Realized, ArchivalState::Live);
        v
    }

    #[test]
    fn shard_count_zero_is_a_contract_violation() {
        let mut v = ball_volume(4);
        let mut inputs = [ShardInput { domain_id: 1, volume: &mut v, flags: ALLOW_SPLIT }];
        let params = PartitionParams { shard_count: 0, ..Default::default() };
        let mut index = ShardDomainIndex::new(4096);
        assert!(shard_map(&mut inputs, &params, &mut index).is_err());
    }

    #[test]
    fn deterministic_across_repeated_runs() {
        let mut v1 = ball_volume(4);
        let mut inputs1 = [ShardInput { domain_id: 7, volume: &mut v1, flags: ALLOW_SPLIT | ALLOW_STREAMING }];
        let params = PartitionParams { shard_count: 3, global_seed: 42, ..Default::default() };
        let mut index1 = ShardDomainIndex::new(4096);
        shard_map(&mut inputs1, &params, &mut index1).unwrap();

        let mut v2 = ball_volume(4);
        let mut inputs2 = [ShardInput { domain_id: 7, volume: &mut v2, flags: ALLOW_SPLIT | ALLOW_STREAMING }];
        let mut index2 = ShardDomainIndex::new(4096);
        shard_map(&mut inputs2, &params, &mut index2).unwrap();

        assert_eq!(index1.assignments(), index2.assignments());
        assert!(!index1.assignments().is_empty());
    }

    #[test]
    fn whole_domain_assigns_a_single_shard_to_every_tile() {
        let mut v = ball_volume(4);
        let mut inputs = [ShardInput { domain_id: 1, volume: &mut v, flags: 0 }];
        let params = PartitionParams { shard_count: 5, allow_split: false, global_seed: 1, ..Default::default() };
        let mut index = ShardDomainIndex::new(4096);
        shard_map(&mut inputs, &params, &mut index).unwrap();
        assert!(!index.assignments().is_empty());
        let first_shard = index.assignments()[0].shard_id;
        for a in index.assignments() {
            assert_eq!(a.shard_id, first_shard);
            assert_ne!(a.flags & WHOLE_DOMAIN, 0);
        }
    }

    #[test]
    fn non_spatial_existence_state_is_skipped_without_uncertainty() {
        let mut v = ball_volume(4);
        v.set_state(ExistenceState::Declared, ArchivalState::Live);
        let mut inputs = [ShardInput { domain_id: 1, volume: &mut v, flags: ALLOW_SPLIT }];
        let params = PartitionParams { shard_count: 2, ..Default::default() };
        let mut index = ShardDomainIndex::new(4096);
        shard_map(&mut inputs, &params, &mut index).unwrap();
        assert!(index.is_empty());
        assert!(!index.uncertain());
    }

    #[test]
    fn max_tiles_per_domain_flips_uncertain_and_stops_early() {
        let mut v = ball_volume(8);
        let mut inputs = [ShardInput { domain_id: 1, volume: &mut v, flags: ALLOW_SPLIT }];
        let params = PartitionParams { shard_count: 2, max_tiles_per_domain: 1, ..Default::default() };
        let mut index = ShardDomainIndex::new(4096);
        shard_map(&mut inputs, &params, &mut index).unwrap();
        assert!(index.uncertain());
    }
}
