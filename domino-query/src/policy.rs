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

use domino_core::Q16_16;
use domino_tile::TileResolution;

/// Immutable-during-a-query configuration for a volume's cost ladder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Policy {
    pub tile_size: Q16_16,
    pub max_resolution: TileResolution,
    pub sample_dim_full: u32,
    pub sample_dim_medium: u32,
    pub sample_dim_coarse: u32,
    pub cost_full: u32,
    pub cost_medium: u32,
    pub cost_coarse: u32,
    pub cost_analytic: u32,
    pub tile_build_cost_full: u32,
    pub tile_build_cost_medium: u32,
    pub tile_build_cost_coarse: u32,
    pub ray_step: Q16_16,
    pub max_ray_steps: u32,
}

impl Default for Policy {
    fn default() -> Policy {
        Policy {
            tile_size: Q16_16::from_int(64),
            max_resolution: TileResolution::Full,
            sample_dim_full: 8,
            sample_dim_medium: 4,
            sample_dim_coarse: 2,
            cost_full: 100,
            cost_medium: 40,
            cost_coarse: 10,
            cost_analytic: 5,
            tile_build_cost_full: 80,
            tile_build_cost_medium: 30,
            tile_build_cost_coarse: 10,
            ray_step: Q16_16::from_int(1),
            max_ray_steps: 64,
        }
    }
}

impl Policy {
    pub(crate) fn sample_dim_for(&self, resolution: TileResolution) -> u32 {
        match resolution {
            TileResolution::Full => self.sample_dim_full,
            TileResolution::Medium => self.sample_dim_medium,
            TileResolution::Coarse => self.sample_dim_coarse,
            TileResolution::Analytic => 0,
        }
    }

    /// Whether `resolution` is permitted under this policy's cap: `Full`
    /// allows everything, `Medium` forbids `Full`, `Coarse` forbids
    /// `Full`+`Medium`, `Analytic` permits only `Analytic`.
    pub(crate) fn allows(&self, resolution: TileResolution) -> bool {
        use TileResolution::*;
        match self.max_resolution {
            Full => true,
            Medium => resolution != Full,
            Coarse => matches!(resolution, Coarse | Analytic),
            Analytic => matches!(resolution, Analytic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_constants() {
        let p = Policy::default();
        assert_eq!(p.tile_size, Q16_16::from_int(64));
        assert_eq!(p.max_resolution, TileResolution::Full);
        assert_eq!((p.sample_dim_full, p.sample_dim_medium, p.sample_dim_coarse), (8, 4, 2));
        assert_eq!(
            (p.cost_full, p.cost_medium, p.cost_coarse, p.cost_analytic),
            (100, 40, 10, 5)
        );
        assert_eq!(
            (p.tile_build_cost_full, p.tile_build_cost_medium, p.tile_build_cost_coarse),
            (80, 30, 10)
        );
        assert_eq!(p.ray_step, Q16_16::from_int(1));
        assert_eq!(p.max_ray_steps, 64);
    }

    #[test]
    fn medium_cap_forbids_full_only() {
        let mut p = Policy::default();
        p.max_resolution = TileResolution::Medium;
        assert!(!p.allows(TileResolution::Full));
        assert!(p.allows(TileResolution::Medium));
        assert!(p.allows(TileResolution::Coarse));
        assert!(p.allows(TileResolution::Analytic));
    }

    #[test]
    fn analytic_cap_permits_only_analytic() {
        let mut p = Policy::default();
        p.max_resolution = TileResolution::Analytic;
        assert!(!p.allows(TileResolution::Full));
        assert!(!p.allows(TileResolution::Medium));
        assert!(!p.allows(TileResolution::Coarse));
        assert!(p.allows(TileResolution::Analytic));
    }
}
