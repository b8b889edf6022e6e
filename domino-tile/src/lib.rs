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

//! Tile descriptors, tile build/sample, and the SDF source capability.

use domino_core::hash::{mix_u32, FNV_OFFSET_BASIS};
use domino_core::{Aabb, Point, Q16_16};

/// The rung of the cost ladder a tile descriptor was built for. Distinct
/// from [`domino_core::Resolution`], which additionally carries `Refused`
/// as a query outcome rather than a tile kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TileResolution {
    Full,
    Medium,
    Coarse,
    Analytic,
}

/// An opaque SDF evaluator. Implementations MUST be pure functions of
/// `(self, point)` — the determinism contract depends on it.
pub trait SdfSource {
    fn eval(&self, point: &Point) -> Q16_16;

    fn has_analytic(&self) -> bool {
        false
    }

    fn analytic_eval(&self, point: &Point) -> Q16_16 {
        let _ = point;
        Q16_16::ZERO
    }

    fn bounds(&self) -> Aabb;
}

/// Describes a tile to be built or looked up, without owning samples.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileDescriptor {
    pub tile_id: u64,
    pub resolution: TileResolution,
    pub sample_dim: u32,
    pub bounds: Aabb,
    pub authoring_version: u32,
}

/// A built tile: a descriptor plus its flat `sample_dim^3` sample grid,
/// laid out `z*dim*dim + y*dim + x`.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tile {
    pub tile_id: u64,
    pub resolution: TileResolution,
    pub sample_dim: u32,
    pub bounds: Aabb,
    pub authoring_version: u32,
    pub samples: Vec<Q16_16>,
}

impl Tile {
    /// An empty, unbuilt tile (`sample_dim == 0`).
    pub fn empty() -> Tile {
        Tile {
            tile_id: 0,
            resolution: TileResolution::Full,
            sample_dim: 0,
            bounds: Aabb::default(),
            authoring_version: 0,
            samples: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_dim == 0
    }
}

/// FNV-1a over the four tile-coordinate words, in `(tx, ty, tz, resolution)`
/// order. Signed coordinates are reinterpreted as unsigned two's-complement
/// bits before mixing.
pub fn tile_id_from_coord(tx: i32, ty: i32, tz: i32, resolution: u32) -> u64 {
    let h = FNV_OFFSET_BASIS;
    let h = mix_u32(h, tx as u32);
    let h = mix_u32(h, ty as u32);
    let h = mix_u32(h, tz as u32);
    mix_u32(h, resolution)
}

fn step_from_extent(extent: Q16_16, sample_dim: u32) -> Q16_16 {
    if sample_dim <= 1 {
        return Q16_16::ZERO;
    }
    Q16_16((extent.0 as i64 / (sample_dim as i64 - 1)) as i32)
}

/// Builds `desc.sample_dim^3` samples by evaluating `source.eval` at grid
/// positions; the last index on each axis snaps exactly to the AABB max so
/// extrema are represented without rounding. Fails if `sample_dim == 0` or
/// the source cannot be evaluated.
pub fn build_tile<S: SdfSource + ?Sized>(desc: &TileDescriptor, source: &S) -> Option<Tile> {
    let dim = desc.sample_dim;
    if dim == 0 {
        return None;
    }

    let step_x = step_from_extent(desc.bounds.max.x.sub(desc.bounds.min.x), dim);
    let step_y = step_from_extent(desc.bounds.max.y.sub(desc.bounds.min.y), dim);
    let step_z = step_from_extent(desc.bounds.max.z.sub(desc.bounds.min.z), dim);

    let dim_u = dim as usize;
    let mut samples = vec![Q16_16::ZERO; dim_u * dim_u * dim_u];

    for k in 0..dim {
        let pz = if k == dim - 1 {
            desc.bounds.max.z
        } else {
            desc.bounds.min.z.add(Q16_16((step_z.0 as i64 * k as i64) as i32))
        };
        for j in 0..dim {
            let py = if j == dim - 1 {
                desc.bounds.max.y
            } else {
                desc.bounds.min.y.add(Q16_16((step_y.0 as i64 * j as i64) as i32))
            };
            for i in 0..dim {
                let px = if i == dim - 1 {
                    desc.bounds.max.x
                } else {
                    desc.bounds.min.x.add(Q16_16((step_x.0 as i64 * i as i64) as i32))
                };
                let idx = (k as usize * dim_u * dim_u) + (j as usize * dim_u) + i as usize;
                samples[idx] = source.eval(&Point::new(px, py, pz));
            }
        }
    }

    Some(Tile {
        tile_id: desc.tile_id,
        resolution: desc.resolution,
        sample_dim: dim,
        bounds: desc.bounds,
        authoring_version: desc.authoring_version,
        samples,
    })
}

fn sample_index_from_coord(coord: Q16_16, minv: Q16_16, maxv: Q16_16, step: Q16_16, dim: u32) -> u32 {
    if dim <= 1 || step.0 <= 0 {
        return 0;
    }
    if coord <= minv {
        return 0;
    }
    if coord >= maxv {
        return dim - 1;
    }
    let rel = coord.0 as i64 - minv.0 as i64;
    let mut idx = rel / step.0 as i64;
    let rem = rel - idx * step.0 as i64;
    if rem * 2 >= step.0 as i64 && (idx + 1) < dim as i64 {
        idx += 1;
    }
    if idx < 0 {
        return 0;
    }
    if idx as u32 >= dim {
        return dim - 1;
    }
    idx as u32
}

/// Clamps `point` into the tile's AABB, finds the nearest grid index per
/// axis (floor division with round-half-up tie-break), and returns the
/// stored sample plus the exact grid-point position. An empty tile yields
/// zero and a zeroed point.
pub fn sample_nearest(tile: &Tile, point: &Point) -> (Q16_16, Point) {
    if tile.sample_dim == 0 {
        return (Q16_16::ZERO, Point::ZERO);
    }

    let px = point.x.clamp(tile.bounds.min.x, tile.bounds.max.x);
    let py = point.y.clamp(tile.bounds.min.y, tile.bounds.max.y);
    let pz = point.z.clamp(tile.bounds.min.z, tile.bounds.max.z);

    let dim = tile.sample_dim;
    let step_x = step_from_extent(tile.bounds.max.x.sub(tile.bounds.min.x), dim);
    let step_y = step_from_extent(tile.bounds.max.y.sub(tile.bounds.min.y), dim);
    let step_z = step_from_extent(tile.bounds.max.z.sub(tile.bounds.min.z), dim);

    let ix = sample_index_from_coord(px, tile.bounds.min.x, tile.bounds.max.x, step_x, dim);
    let iy = sample_index_from_coord(py, tile.bounds.min.y, tile.bounds.max.y, step_y, dim);
    let iz = sample_index_from_coord(pz, tile.bounds.min.z, tile.bounds.max.z, step_z, dim);

    let axis_pos = |i: u32, minv: Q16_16, maxv: Q16_16, step: Q16_16| -> Q16_16 {
        if i == dim - 1 {
            maxv
        } else {
            minv.add(Q16_16((step.0 as i64 * i as i64) as i32))
        }
    };
    let sx = axis_pos(ix, tile.bounds.min.x, tile.bounds.max.x, step_x);
    let sy = axis_pos(iy, tile.bounds.min.y, tile.bounds.max.y, step_y);
    let sz = axis_pos(iz, tile.bounds.min.z, tile.bounds.max.z, step_z);

    let dim_u = dim as usize;
    let idx = (iz as usize * dim_u * dim_u) + (iy as usize * dim_u) + ix as usize;
    (tile.samples[idx], Point::new(sx, sy, sz))
}

pub fn aabb_contains(aabb: &Aabb, point: &Point) -> bool {
    aabb.contains(point)
}

pub fn aabb_distance_l1(aabb: &Aabb, point: &Point) -> Q16_16 {
    aabb.distance_l1(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstSource(Aabb, Q16_16);
    impl SdfSource for ConstSource {
        fn eval(&self, _point: &Point) -> Q16_16 {
            self.1
        }
        fn bounds(&self) -> Aabb {
            self.0
        }
    }

    fn aabb(lo: i32, hi: i32) -> Aabb {
        Aabb::new(
            Point::new(Q16_16::from_int(lo), Q16_16::from_int(lo), Q16_16::from_int(lo)),
            Point::new(Q16_16::from_int(hi), Q16_16::from_int(hi), Q16_16::from_int(hi)),
        )
    }

    #[test]
    fn tile_id_is_stable_across_calls() {
        assert_eq!(tile_id_from_coord(1, 2, 3, 0), tile_id_from_coord(1, 2, 3, 0));
    }

    #[test]
    fn tile_id_distinguishes_resolution() {
        assert_ne!(tile_id_from_coord(1, 2, 3, 0), tile_id_from_coord(1, 2, 3, 1));
    }

    #[test]
    fn build_tile_snaps_last_index_to_max_exactly() {
        let source = ConstSource(aabb(0, 4), Q16_16::from_int(7));
        let desc = TileDescriptor {
            tile_id: 1,
            resolution: TileResolution::Medium,
            sample_dim: 4,
            bounds: aabb(0, 4),
            authoring_version: 0,
        };
        let tile = build_tile(&desc, &source).unwrap();
        assert_eq!(tile.samples.len(), 64);
        let (s, p) = sample_nearest(&tile, &Point::new(Q16_16::from_int(4), Q16_16::from_int(4), Q16_16::from_int(4)));
        assert_eq!(s, Q16_16::from_int(7));
        assert_eq!(p, Point::new(Q16_16::from_int(4), Q16_16::from_int(4), Q16_16::from_int(4)));
    }

    #[test]
    fn build_tile_fails_on_zero_sample_dim() {
        let source = ConstSource(aabb(0, 4), Q16_16::ZERO);
        let desc = TileDescriptor {
            tile_id: 1,
            resolution: TileResolution::Coarse,
            sample_dim: 0,
            bounds: aabb(0, 4),
            authoring_version: 0,
        };
        assert!(build_tile(&desc, &source).is_none());
    }

    #[test]
    fn sample_nearest_on_empty_tile_yields_zero() {
        let tile = Tile::empty();
        let (s, p) = sample_nearest(&tile, &Point::new(Q16_16::from_int(1), Q16_16::ZERO, Q16_16::ZERO));
        assert_eq!(s, Q16_16::ZERO);
        assert_eq!(p, Point::ZERO);
    }

    #[test]
    fn aabb_distance_l1_saturates_at_max() {
        let a = Aabb::new(Point::ZERO, Point::ZERO);
        let far = Point::new(Q16_16::MAX, Q16_16::MAX, Q16_16::MAX);
        assert_eq!(aabb_distance_l1(&a, &far), Q16_16::MAX);
    }
}
