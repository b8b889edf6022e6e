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

//! Volumes, policies, and the budgeted cost-ladder query engine.

mod hints;
mod ladder;
mod policy;
mod volume;

pub use domino_core::{Budget, Confidence, QueryMeta, RefusalReason, Resolution};

pub use hints::{streaming_hints, HintKind, StreamingHint};
pub use ladder::{closest_point, contains, distance, ray_intersect, Ray};
pub use policy::Policy;
pub use volume::{ArchivalState, ExistenceState, Volume};
