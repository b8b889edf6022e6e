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

//! Facade over the domino domain engine: fixed-point arithmetic and
//! hashing, the tile model and cache, the budgeted volume query ladder,
//! structural field resolvers, and the shard mapper, behind one crate for
//! downstream embedders that don't need to depend on each piece
//! individually.
//!
//! Each module here simply re-exports its namesake crate's public surface;
//! this crate adds no behavior of its own. Embedders who only need one
//! piece (say, just the tile cache) are better served depending on that
//! crate directly.

pub mod cache {
    pub use domino_cache::*;
}

pub mod core {
    pub use domino_core::*;
}

pub mod fields {
    pub use domino_fields::*;
}

pub mod query {
    pub use domino_query::*;
}

pub mod shard {
    pub use domino_shard::*;
}

pub mod tile {
    pub use domino_tile::*;
}

pub use domino_core::{Budget, Confidence, DominoError, QueryMeta, RefusalReason, Resolution, Result, Status};
pub use domino_query::{ArchivalState, ExistenceState, Policy, Volume};
