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

//! Non-authoritative streaming hints: which volumes are worth refining or
//! collapsing soon. Never consulted by the query ladder itself.

use domino_core::{Aabb, Budget};

use crate::volume::{ArchivalState, ExistenceState, Volume};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HintKind {
    RefineSoon,
    CollapseOk,
}

/// One non-authoritative suggestion for a streaming/LOD layer. `tile_id`
/// is always zero and `resolution` always `Analytic`: hints are
/// domain-scoped, not tile-scoped.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamingHint {
    pub domain_id: u64,
    pub bounds: Aabb,
    pub kind: HintKind,
    pub priority: u32,
    pub advisory: bool,
}

fn hint_active(volume: &Volume) -> bool {
    if matches!(
        volume.existence_state,
        ExistenceState::Nonexistent | ExistenceState::Declared | ExistenceState::Archived
    ) {
        return false;
    }
    volume.archival_state == ArchivalState::Live
}

/// Emits at most one hint per volume, in input order, debiting one budget
/// unit each. Unlike the query ladder, exhausting the budget stops hint
/// emission entirely rather than degrading — once a unit cannot be
/// afforded no further volumes are considered, even ones that would not
/// have produced a hint.
pub fn streaming_hints(volumes: &[Volume], budget: &mut Budget) -> Vec<StreamingHint> {
    let mut hints = Vec::new();
    for volume in volumes {
        if !hint_active(volume) {
            continue;
        }

        let (kind, priority) = match volume.existence_state {
            ExistenceState::Refinable => (HintKind::RefineSoon, 100),
            ExistenceState::Realized => (HintKind::CollapseOk, 10),
            _ => continue,
        };

        if !budget.consume(1) {
            break;
        }

        hints.push(StreamingHint {
            domain_id: volume.domain_id,
            bounds: volume.source.bounds(),
            kind,
            priority,
            advisory: true,
        });
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use domino_core::{Budget, Point, Q16_16};
    use domino_tile::SdfSource;

    struct ZeroSource;
    impl SdfSource for ZeroSource {
        fn eval(&self, _point: &Point) -> Q16_16 {
            Q16_16::ZERO
        }
        fn bounds(&self) -> Aabb {
            Aabb::default()
        }
    }

    fn volume_in(domain_id: u64, existence: ExistenceState) -> Volume {
        let mut v = Volume::new(domain_id, Box::new(ZeroSource));
        v.set_state(existence, ArchivalState::Live);
        v
    }

    #[test]
    fn emits_refine_and_collapse_hints_in_order() {
        let volumes = vec![
            volume_in(1, ExistenceState::Refinable),
            volume_in(2, ExistenceState::Realized),
            volume_in(3, ExistenceState::Latent),
        ];
        let mut budget = Budget::new(10);
        let hints = streaming_hints(&volumes, &mut budget);
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].domain_id, 1);
        assert_eq!(hints[0].kind, HintKind::RefineSoon);
        assert_eq!(hints[0].priority, 100);
        assert_eq!(hints[1].domain_id, 2);
        assert_eq!(hints[1].kind, HintKind::CollapseOk);
        assert_eq!(hints[1].priority, 10);
    }

    #[test]
    fn frozen_archival_state_suppresses_hints() {
        let mut v = volume_in(1, ExistenceState::Refinable);
        v.set_state(ExistenceState::Refinable, ArchivalState::Frozen);
        let mut budget = Budget::new(10);
        assert!(streaming_hints(&[v], &mut budget).is_empty());
    }

    #[test]
    fn budget_exhaustion_stops_rather_than_skips() {
        let volumes = vec![
            volume_in(1, ExistenceState::Refinable),
            volume_in(2, ExistenceState::Refinable),
            volume_in(3, ExistenceState::Refinable),
        ];
        let mut budget = Budget::new(1);
        let hints = streaming_hints(&volumes, &mut budget);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].domain_id, 1);
    }
}
