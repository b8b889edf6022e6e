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

/// Whether a query completed or was refused at the outer call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    Ok,
    Refused,
}

/// The rung of the cost ladder a query was ultimately answered at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    Full,
    Medium,
    Coarse,
    Analytic,
    Refused,
}

/// How trustworthy an answer is: an exact evaluation, a conservative lower
/// bound, or unknown (used before any rung has produced an answer).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Confidence {
    Exact,
    LowerBound,
    Unknown,
}

/// Stable, branchable reasons a query was refused. `None` is the non-refusal
/// sentinel carried by a successful `QueryMeta`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefusalReason {
    None,
    Budget,
    DomainInactive,
    NoSource,
    NoAnalytic,
    Policy,
    Internal,
}

impl Default for RefusalReason {
    fn default() -> RefusalReason {
        RefusalReason::None
    }
}

/// Metadata accompanying every query result: what rung answered it, how
/// confident the answer is, and the budget state after the call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryMeta {
    pub status: Status,
    pub resolution: Resolution,
    pub confidence: Confidence,
    pub refusal_reason: RefusalReason,
    pub cost_units: u32,
    pub budget_used: u32,
    pub budget_max: u32,
}

impl QueryMeta {
    pub fn refused(reason: RefusalReason, budget_used: u32, budget_max: u32) -> QueryMeta {
        QueryMeta {
            status: Status::Refused,
            resolution: Resolution::Refused,
            confidence: Confidence::Unknown,
            refusal_reason: reason,
            cost_units: 0,
            budget_used,
            budget_max,
        }
    }

    pub fn ok(
        resolution: Resolution,
        confidence: Confidence,
        cost_units: u32,
        budget_used: u32,
        budget_max: u32,
    ) -> QueryMeta {
        QueryMeta {
            status: Status::Ok,
            resolution,
            confidence,
            refusal_reason: RefusalReason::None,
            cost_units,
            budget_used,
            budget_max,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok)
    }
}
