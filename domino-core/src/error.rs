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

//! Contract-violation and allocation-failure errors.
//!
//! Refusals (budget exhaustion, inactive domain, ...) are not errors: they
//! are ordinary data carried in [`crate::meta::QueryMeta`]. `DominoError` is
//! reserved for programming errors and allocation failures, per the
//! distinction the engine draws between the two.

use std::fmt;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DominoError {
    /// A `tile_size` or `ray_step` field was not strictly positive.
    NonPositivePolicyField { field: &'static str, value: i32 },
    /// A `sample_dim` of zero was supplied where a built tile was required.
    ZeroSampleDim,
    /// A capacity-bounded table (entities, rules, capsules, ...) was already
    /// at capacity when an insert was attempted.
    TableFull { table: &'static str, capacity: usize },
    /// A region was already collapsed when `collapse_region` was called, or
    /// was not collapsed when `expand_region` was called.
    RegionCollapseState { region_id: u32, collapsed: bool },
    /// Tile sample storage could not be allocated.
    AllocationFailure { what: &'static str },
}

impl fmt::Display for DominoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DominoError::NonPositivePolicyField { field, value } => {
                write!(f, "policy field `{field}` must be positive, got {value}")
            }
            DominoError::ZeroSampleDim => {
                write!(f, "sample_dim must be nonzero to build a tile")
            }
            DominoError::TableFull { table, capacity } => {
                write!(f, "table `{table}` is at capacity ({capacity})")
            }
            DominoError::RegionCollapseState {
                region_id,
                collapsed,
            } => {
                if *collapsed {
                    write!(f, "region {region_id} is already collapsed")
                } else {
                    write!(f, "region {region_id} is not collapsed")
                }
            }
            DominoError::AllocationFailure { what } => {
                write!(f, "allocation failure building {what}")
            }
        }
    }
}

impl std::error::Error for DominoError {}

pub type Result<T> = std::result::Result<T, DominoError>;
