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

//! Shared contract types for the domino domain engine core: fixed-point
//! arithmetic, hashing, geometry, budgets, query metadata, and errors.
//!
//! Every other `domino-*` crate depends on this one and nothing above it in
//! the workspace.

pub mod budget;
pub mod error;
pub mod fixed;
pub mod geom;
pub mod hash;
pub mod meta;
pub mod token;

pub use budget::Budget;
pub use error::{DominoError, Result};
pub use fixed::{Q16_16, Q48_16};
pub use geom::{Aabb, Point};
pub use meta::{Confidence, QueryMeta, RefusalReason, Resolution, Status};
pub use token::{AuthorityToken, TokenKind, MUTATION_EPISTEMIC, MUTATION_TRANSACTIONAL, MUTATION_TRANSFORMATIVE};
