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

//! Structural field resolvers: region-scoped, collapsible record sets with
//! idempotent event resolution. [`institution`] models a governing body's
//! entities and enforcement; [`standard`] models a published standard's
//! versions and adoption. Both share their lifecycle and policy types from
//! [`common`], but are otherwise independent and not re-exported under a
//! single namespace, since their per-kind constants (e.g. `RESOLVE_PARTIAL`)
//! collide by name.

pub mod common;
pub mod institution;
pub mod standard;

pub use common::{ArchivalState, ExistenceState, FieldPolicy, ACTION_BINS, HIST_BINS};
