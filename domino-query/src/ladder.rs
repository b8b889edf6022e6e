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

//! The cost ladder: `contains`, `distance`, `closest_point`, and
//! `ray_intersect`, each built on the shared `eval_distance` fallthrough.

use domino_cache::TileCache;
use domino_core::{Aabb, Budget, Confidence, Point, Q16_16, QueryMeta, RefusalReason, Resolution};
use domino_tile::{
    aabb_contains, aabb_distance_l1, build_tile, sample_nearest, tile_id_from_coord, SdfSource,
    Tile, TileDescriptor, TileResolution,
};

use crate::volume::Volume;

struct EvalResult {
    sample_point: Point,
    distance: Q16_16,
    meta: QueryMeta,
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

fn tile_resolution_to_res(r: TileResolution) -> Resolution {
    match r {
        TileResolution::Full => Resolution::Full,
        TileResolution::Medium => Resolution::Medium,
        TileResolution::Coarse => Resolution::Coarse,
        TileResolution::Analytic => Resolution::Analytic,
    }
}

fn build_tile_desc(volume: &Volume, point: &Point, resolution: TileResolution) -> Option<TileDescriptor> {
    let tile_size = volume.policy.tile_size;
    if tile_size.0 <= 0 {
        return None;
    }
    let sample_dim = volume.policy.sample_dim_for(resolution);
    if sample_dim == 0 {
        return None;
    }
    let source_bounds = volume.source.bounds();

    let tx = floor_div_q16_16(point.x.0 as i64 - source_bounds.min.x.0 as i64, tile_size);
    let ty = floor_div_q16_16(point.y.0 as i64 - source_bounds.min.y.0 as i64, tile_size);
    let tz = floor_div_q16_16(point.z.0 as i64 - source_bounds.min.z.0 as i64, tile_size);

    let bounds = make_tile_bounds(&source_bounds, tile_size, tx, ty, tz);
    let resolution_idx = match resolution {
        TileResolution::Full => 0,
        TileResolution::Medium => 1,
        TileResolution::Coarse => 2,
        TileResolution::Analytic => 3,
    };
    Some(TileDescriptor {
        tile_id: tile_id_from_coord(tx, ty, tz, resolution_idx),
        resolution,
        sample_dim,
        bounds,
        authoring_version: volume.authoring_version,
    })
}

fn local_slot_index(resolution: TileResolution) -> usize {
    match resolution {
        TileResolution::Full => 0,
        TileResolution::Medium => 1,
        _ => 2,
    }
}

/// Looks up (and, if `allow_build`, builds) a tile in the volume's local
/// 3-slot micro-cache. Used only when no shared cache is attached.
fn local_tile_get<'a>(volume: &'a mut Volume, desc: &TileDescriptor, allow_build: bool) -> Option<&'a Tile> {
    let idx = local_slot_index(desc.resolution);
    let fresh = matches!(
        &volume.local_tiles[idx],
        Some(t) if t.tile_id == desc.tile_id
            && t.authoring_version == desc.authoring_version
            && t.sample_dim == desc.sample_dim
    );
    if fresh {
        return volume.local_tiles[idx].as_ref();
    }
    if !allow_build {
        return None;
    }
    let built = build_tile(desc, volume.source.as_ref())?;
    volume.local_tiles[idx] = Some(built);
    volume.local_tiles[idx].as_ref()
}

fn tile_cached(volume: &mut Volume, desc: &TileDescriptor, cache: Option<&TileCache>) -> bool {
    if let Some(cache) = cache {
        return cache
            .peek(volume.domain_id, desc.tile_id, desc.resolution, desc.authoring_version)
            .is_some();
    }
    local_tile_get(volume, desc, false).is_some()
}

fn tile_get<'a>(
    volume: &'a mut Volume,
    desc: &TileDescriptor,
    allow_build: bool,
    cache: Option<&'a mut TileCache>,
) -> Option<&'a Tile> {
    if let Some(cache) = cache {
        if cache
            .get(volume.domain_id, desc.tile_id, desc.resolution, desc.authoring_version)
            .is_some()
        {
            return cache.peek(volume.domain_id, desc.tile_id, desc.resolution, desc.authoring_version);
        }
        if !allow_build {
            return None;
        }
        let mut built = build_tile(desc, volume.source.as_ref())?;
        cache.put(volume.domain_id, &mut built)
    } else {
        local_tile_get(volume, desc, allow_build)
    }
}

fn point_l1_distance(a: &Point, b: &Point) -> Q16_16 {
    let dx = a.x.sub(b.x).abs();
    let dy = a.y.sub(b.y).abs();
    let dz = a.z.sub(b.z).abs();
    dx.add(dy).add(dz)
}

/// The shared fallthrough every ladder operation is built on: inactive
/// domain or missing source refuse outright; outside-bounds points get a
/// cheap lower-bound answer for free; otherwise Full, then Medium, then
/// Coarse, then Analytic are tried in order, debiting the budget before
/// each build, and the first rung that both the policy allows and the
/// budget affords wins. Exhausting every allowed rung refuses with
/// `Budget`.
fn eval_distance(volume: &mut Volume, point: &Point, budget: &mut Budget, mut cache: Option<&mut TileCache>) -> EvalResult {
    if !volume.is_active() {
        return EvalResult {
            sample_point: Point::ZERO,
            distance: Q16_16::ZERO,
            meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
        };
    }

    let source_bounds = volume.source.bounds();

    if !aabb_contains(&source_bounds, point) {
        let distance = aabb_distance_l1(&source_bounds, point);
        return EvalResult {
            sample_point: *point,
            distance,
            meta: QueryMeta::ok(Resolution::Coarse, Confidence::LowerBound, 0, budget.used_units(), budget.max_units()),
        };
    }

    if volume.policy.allows(TileResolution::Full) {
        let cost = volume.policy.cost_full;
        if budget.consume(cost) {
            let distance = volume.source.eval(point);
            return EvalResult {
                sample_point: *point,
                distance,
                meta: QueryMeta::ok(Resolution::Full, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
            };
        }
    }

    for (resolution, tile_resolution, build_cost) in [
        (Resolution::Medium, TileResolution::Medium, volume.policy.tile_build_cost_medium),
        (Resolution::Coarse, TileResolution::Coarse, volume.policy.tile_build_cost_coarse),
    ] {
        if !volume.policy.allows(tile_resolution) {
            continue;
        }
        let Some(desc) = build_tile_desc(volume, point, tile_resolution) else {
            continue;
        };
        let mut cost = match tile_resolution {
            TileResolution::Medium => volume.policy.cost_medium,
            _ => volume.policy.cost_coarse,
        };
        if !tile_cached(volume, &desc, cache.as_deref()) {
            cost += build_cost;
        }
        if !budget.consume(cost) {
            continue;
        }
        let tile = match tile_get(volume, &desc, true, cache.as_deref_mut()) {
            Some(t) => t,
            None => {
                return EvalResult {
                    sample_point: Point::ZERO,
                    distance: Q16_16::ZERO,
                    meta: QueryMeta::refused(RefusalReason::Internal, budget.used_units(), budget.max_units()),
                };
            }
        };
        let (sample, sample_point) = sample_nearest(tile, point);
        let l1 = point_l1_distance(point, &sample_point);
        return EvalResult {
            sample_point,
            distance: sample.sub(l1),
            meta: QueryMeta::ok(resolution, Confidence::LowerBound, cost, budget.used_units(), budget.max_units()),
        };
    }

    if volume.policy.allows(TileResolution::Analytic) {
        if !volume.source.has_analytic() {
            return EvalResult {
                sample_point: Point::ZERO,
                distance: Q16_16::ZERO,
                meta: QueryMeta::refused(RefusalReason::NoAnalytic, budget.used_units(), budget.max_units()),
            };
        }
        let cost = volume.policy.cost_analytic;
        if budget.consume(cost) {
            let distance = volume.source.analytic_eval(point);
            return EvalResult {
                sample_point: *point,
                distance,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
            };
        }
    }

    EvalResult {
        sample_point: Point::ZERO,
        distance: Q16_16::ZERO,
        meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
    }
}

/// Whether `point` lies inside the volume. Requires an exact answer: a
/// lower-bound rung (Medium/Coarse) or any refusal both yield `false`,
/// never a guess.
pub fn contains(volume: &mut Volume, point: &Point, budget: &mut Budget, cache: Option<&mut TileCache>) -> (bool, QueryMeta) {
    let eval = eval_distance(volume, point, budget, cache);
    if !eval.meta.is_ok() || eval.meta.confidence != Confidence::Exact {
        return (false, eval.meta);
    }
    (eval.distance <= Q16_16::ZERO, eval.meta)
}

pub fn distance(volume: &mut Volume, point: &Point, budget: &mut Budget, cache: Option<&mut TileCache>) -> (Q16_16, QueryMeta) {
    let eval = eval_distance(volume, point, budget, cache);
    (eval.distance, eval.meta)
}

pub fn closest_point(volume: &mut Volume, point: &Point, budget: &mut Budget, cache: Option<&mut TileCache>) -> (Point, Q16_16, QueryMeta) {
    let eval = eval_distance(volume, point, budget, cache);
    (eval.sample_point, eval.distance, eval.meta)
}

/// A ray to march against a volume's surface.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ray {
    pub origin: Point,
    pub direction: Point,
    pub max_distance: Q16_16,
}

fn ray_point(ray: &Ray, t: Q16_16) -> Point {
    Point::new(
        ray.origin.x.add(ray.direction.x.mul(t)),
        ray.origin.y.add(ray.direction.y.mul(t)),
        ray.origin.z.add(ray.direction.z.mul(t)),
    )
}

/// Marches `ray` in `policy.ray_step` increments, bounded by
/// `policy.max_ray_steps` and `ray.max_distance` (a non-positive distance
/// defaults to `1`). Stops with a hit on the first `Exact` rung reporting
/// `distance <= 0`, stops without a hit on the first refusal, and reports
/// no hit with the last `Ok` meta if every step is exhausted.
pub fn ray_intersect(volume: &mut Volume, ray: &Ray, budget: &mut Budget, mut cache: Option<&mut TileCache>) -> (bool, Point, Q16_16, QueryMeta) {
    let max_distance = if ray.max_distance.0 <= 0 {
        Q16_16::from_int(1)
    } else {
        ray.max_distance
    };
    let step = if volume.policy.ray_step.0 <= 0 {
        Q16_16::from_int(1)
    } else {
        volume.policy.ray_step
    };

    let mut t = Q16_16::ZERO;
    let mut last_meta = QueryMeta::refused(RefusalReason::Internal, budget.used_units(), budget.max_units());

    for _ in 0..volume.policy.max_ray_steps {
        if t > max_distance {
            break;
        }
        let p = ray_point(ray, t);
        let eval = eval_distance(volume, &p, budget, cache.as_deref_mut());
        last_meta = eval.meta;
        if !last_meta.is_ok() {
            return (false, Point::ZERO, Q16_16::ZERO, last_meta);
        }
        if last_meta.confidence == Confidence::Exact && eval.distance <= Q16_16::ZERO {
            return (true, p, t, last_meta);
        }
        t = t.add(step);
    }

    (false, Point::ZERO, Q16_16::ZERO, last_meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domino_core::Aabb;

    struct PlaneSource {
        bounds: Aabb,
    }

    impl SdfSource for PlaneSource {
        fn eval(&self, point: &Point) -> Q16_16 {
            point.z
        }
        fn bounds(&self) -> Aabb {
            self.bounds
        }
    }

    fn unit_bounds() -> Aabb {
        Aabb::new(
            Point::new(Q16_16::from_int(-10), Q16_16::from_int(-10), Q16_16::from_int(-10)),
            Point::new(Q16_16::from_int(10), Q16_16::from_int(10), Q16_16::from_int(10)),
        )
    }

    fn active_volume() -> Volume {
        let mut v = Volume::new(1, Box::new(PlaneSource { bounds: unit_bounds() }));
        v.set_state(
            crate::volume::ExistenceState::Realized,
            crate::volume::ArchivalState::Live,
        );
        v
    }

    #[test]
    fn contains_full_resolution_is_exact() {
        let mut v = active_volume();
        let mut budget = Budget::new(1000);
        let (inside, meta) = contains(&mut v, &Point::new(Q16_16::ZERO, Q16_16::ZERO, Q16_16::from_int(-1)), &mut budget, None);
        assert!(inside);
        assert_eq!(meta.resolution, Resolution::Full);
        assert_eq!(meta.confidence, Confidence::Exact);
    }

    #[test]
    fn distance_outside_bounds_is_lower_bound_and_free() {
        let mut v = active_volume();
        let mut budget = Budget::new(1000);
        let far = Point::new(Q16_16::from_int(100), Q16_16::ZERO, Q16_16::ZERO);
        let (d, meta) = distance(&mut v, &far, &mut budget, None);
        assert_eq!(d, Q16_16::from_int(90));
        assert_eq!(meta.cost_units, 0);
        assert_eq!(budget.used_units(), 0);
    }

    #[test]
    fn budget_degrades_down_the_ladder() {
        let mut v = active_volume();
        // Enough for Medium (cost_medium=40 + tile_build_cost_medium=30) but
        // not for Full (cost_full=100).
        let mut budget = Budget::new(70);
        let (_, meta) = distance(&mut v, &Point::ZERO, &mut budget, None);
        assert_eq!(meta.resolution, Resolution::Medium);
        assert_eq!(meta.confidence, Confidence::LowerBound);
    }

    #[test]
    fn exhausted_budget_refuses() {
        let mut v = active_volume();
        let mut budget = Budget::new(0);
        let (_, meta) = distance(&mut v, &Point::ZERO, &mut budget, None);
        assert!(!meta.is_ok());
        assert_eq!(meta.refusal_reason, RefusalReason::Budget);
    }

    #[test]
    fn inactive_domain_refuses_before_touching_budget() {
        let mut v = Volume::new(1, Box::new(PlaneSource { bounds: unit_bounds() }));
        let mut budget = Budget::new(1000);
        let (_, meta) = distance(&mut v, &Point::ZERO, &mut budget, None);
        assert_eq!(meta.refusal_reason, RefusalReason::DomainInactive);
        assert_eq!(budget.used_units(), 0);
    }

    #[test]
    fn second_query_reuses_local_tile_without_build_cost() {
        let mut v = active_volume();
        v.policy.max_resolution = TileResolution::Medium;
        let mut budget = Budget::new(1000);
        let p = Point::ZERO;
        let (_, meta1) = distance(&mut v, &p, &mut budget, None);
        let used_after_first = budget.used_units();
        let (_, meta2) = distance(&mut v, &p, &mut budget, None);
        assert_eq!(meta1.resolution, Resolution::Medium);
        assert_eq!(meta2.resolution, Resolution::Medium);
        // second lookup should not pay the tile build cost again
        assert!(budget.used_units() - used_after_first < v.policy.tile_build_cost_medium + v.policy.cost_medium);
    }

    #[test]
    fn ray_intersect_hits_the_plane() {
        let mut v = active_volume();
        let mut budget = Budget::new(100_000);
        let ray = Ray {
            origin: Point::new(Q16_16::ZERO, Q16_16::ZERO, Q16_16::from_int(-5)),
            direction: Point::new(Q16_16::ZERO, Q16_16::ZERO, Q16_16::from_int(1)),
            max_distance: Q16_16::from_int(10),
        };
        let (hit, point, t, meta) = ray_intersect(&mut v, &ray, &mut budget, None);
        assert!(hit);
        assert_eq!(point.z, Q16_16::ZERO);
        assert_eq!(t, Q16_16::from_int(5));
        assert!(meta.is_ok());
    }

    #[test]
    fn ray_intersect_misses_when_direction_points_away() {
        let mut v = active_volume();
        let mut budget = Budget::new(100_000);
        let ray = Ray {
            origin: Point::new(Q16_16::ZERO, Q16_16::ZERO, Q16_16::from_int(5)),
            direction: Point::new(Q16_16::ZERO, Q16_16::ZERO, Q16_16::from_int(1)),
            max_distance: Q16_16::from_int(3),
        };
        let (hit, _, _, meta) = ray_intersect(&mut v, &ray, &mut budget, None);
        assert!(!hit);
        assert!(meta.is_ok());
    }
}
