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

use crate::policy::Policy;
use domino_tile::{SdfSource, Tile};

/// Ordered existence lifecycle of an authored domain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExistenceState {
    Nonexistent,
    Declared,
    Latent,
    Refinable,
    Realized,
    Archived,
}

/// Independent archival lifecycle of an authored domain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchivalState {
    Live,
    Frozen,
    Archived,
    Forked,
}

/// Binds an SDF source, a policy, and lifecycle state for one authored
/// domain. Does not own a cache: per the concurrency model (the caller
/// owns exclusion for a cache's duration), callers pass a
/// `&mut domino_cache::TileCache` explicitly to each query instead of the
/// volume holding a reference to one — this sidesteps the aliasing a
/// stored back-reference would otherwise force onto every query call.
pub struct Volume {
    pub domain_id: u64,
    pub authoring_version: u32,
    pub existence_state: ExistenceState,
    pub archival_state: ArchivalState,
    pub source: Box<dyn SdfSource>,
    pub policy: Policy,
    pub(crate) local_tiles: [Option<Tile>; 3],
}

impl Volume {
    pub fn new(domain_id: u64, source: Box<dyn SdfSource>) -> Volume {
        Volume {
            domain_id,
            authoring_version: 0,
            existence_state: ExistenceState::Nonexistent,
            archival_state: ArchivalState::Live,
            source,
            policy: Policy::default(),
            local_tiles: [None, None, None],
        }
    }

    /// A volume answers queries iff its existence state has progressed past
    /// `Declared`.
    pub fn is_active(&self) -> bool {
        !matches!(
            self.existence_state,
            ExistenceState::Nonexistent | ExistenceState::Declared
        )
    }

    fn clear_local_tiles(&mut self) {
        self.local_tiles = [None, None, None];
    }

    pub fn set_source(&mut self, source: Box<dyn SdfSource>) {
        self.source = source;
        self.clear_local_tiles();
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
        self.clear_local_tiles();
    }

    pub fn set_state(&mut self, existence_state: ExistenceState, archival_state: ArchivalState) {
        if self.existence_state != existence_state || self.archival_state != archival_state {
            self.existence_state = existence_state;
            self.archival_state = archival_state;
            self.clear_local_tiles();
        }
    }

    pub fn set_authoring_version(&mut self, version: u32) {
        if self.authoring_version != version {
            self.authoring_version = version;
            self.clear_local_tiles();
        }
    }
}
