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

//! Lifecycle and policy types shared by the institution and standard
//! resolvers. Mirrors `domino_query::{ExistenceState, ArchivalState}`
//! structurally; duplicated here rather than depended on, since this crate
//! sits beside `domino-query` rather than above it and has no use for its
//! SDF-oriented `Policy`.

use domino_core::{Q16_16, RefusalReason};

pub const HIST_BINS: usize = 4;
pub const ACTION_BINS: usize = 4;

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

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchivalState {
    Live,
    Frozen,
    Archived,
    Forked,
}

pub(crate) fn domain_is_active(existence: ExistenceState) -> bool {
    !matches!(existence, ExistenceState::Nonexistent | ExistenceState::Declared)
}

/// Cost knobs a structural resolver debits against; the narrow slice of
/// `domino_query::Policy` that applies outside the SDF ladder.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldPolicy {
    pub cost_full: u32,
    pub cost_medium: u32,
    pub cost_coarse: u32,
    pub cost_analytic: u32,
}

impl Default for FieldPolicy {
    fn default() -> FieldPolicy {
        FieldPolicy {
            cost_full: 100,
            cost_medium: 40,
            cost_coarse: 10,
            cost_analytic: 5,
        }
    }
}

/// `cost_units == 0` is treated as "unconfigured"; every query debits at
/// least one unit.
pub(crate) fn budget_cost(cost_units: u32) -> u32 {
    if cost_units == 0 {
        1
    } else {
        cost_units
    }
}

pub(crate) fn clamp_ratio(value: Q16_16) -> Q16_16 {
    value.clamp(Q16_16::ZERO, Q16_16::ONE)
}

pub(crate) fn ratio_from_counts(count: u32, total: u32) -> Q16_16 {
    if total == 0 {
        return Q16_16::ZERO;
    }
    Q16_16((((count as u64) << 16) / total as u64) as i32)
}

pub(crate) fn hist_bin(ratio: Q16_16) -> usize {
    let clamped = clamp_ratio(ratio);
    let scaled = ((clamped.0 as i64) * (HIST_BINS as i64 - 1)) >> 16;
    (scaled as usize).min(HIST_BINS - 1)
}

/// Both structural domains refuse a missing single-record lookup with the
/// generic `NoSource` reason rather than a more specific "X missing" one,
/// even though the originating headers define distinct missing-kind enum
/// values. That specificity is simply never used on the lookup path; this
/// preserves the observed behavior rather than "fixing" it.
pub(crate) const MISSING_RECORD: RefusalReason = RefusalReason::NoSource;
