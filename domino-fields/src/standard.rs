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

//! Standards, versions, adoption scopes, and the toolchain graph that
//! enforces them: a second region-scoped structural resolver, resolved and
//! collapsible the same way as [`crate::institution`].

use domino_core::{Budget, Confidence, QueryMeta, RefusalReason, Resolution, Q16_16, Q48_16};

use crate::common::{
    budget_cost, clamp_ratio, domain_is_active, hist_bin, ratio_from_counts, ArchivalState,
    FieldPolicy, HIST_BINS, MISSING_RECORD,
};

pub const MAX_DEFINITIONS: usize = 128;
pub const MAX_VERSIONS: usize = 128;
pub const MAX_SCOPES: usize = 128;
pub const MAX_EVENTS: usize = 128;
pub const MAX_TOOLS: usize = 128;
pub const MAX_EDGES: usize = 128;
pub const MAX_GRAPHS: usize = 64;
pub const MAX_CAPSULES: usize = 64;

pub const EVENT_BINS: usize = 5;

pub use crate::common::ExistenceState;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessType {
    Unset,
    Propose,
    Adopt,
    Audit,
    Enforce,
    Revoke,
}

impl ProcessType {
    fn event_bin(self) -> usize {
        match self {
            ProcessType::Propose => 0,
            ProcessType::Adopt => 1,
            ProcessType::Audit => 2,
            ProcessType::Enforce => 3,
            ProcessType::Revoke => 4,
            ProcessType::Unset => 0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VersionStatus {
    Draft,
    Active,
    Superseded,
    Revoked,
}

/// `COLLAPSED` is the only flag a query ever observes in practice, matching
/// [`crate::institution`]'s convention of reserving a bit for shape parity
/// rather than wiring up per-kind flags nothing ever sets.
pub const DEFINITION_COLLAPSED: u32 = 1 << 1;
pub const VERSION_COLLAPSED: u32 = 1 << 1;
pub const SCOPE_COLLAPSED: u32 = 1 << 1;
pub const EVENT_COLLAPSED: u32 = 1 << 1;
pub const TOOL_COLLAPSED: u32 = 1 << 1;
pub const EDGE_COLLAPSED: u32 = 1 << 1;
pub const GRAPH_COLLAPSED: u32 = 1 << 1;

pub const SCOPE_ADOPTED: u32 = 1 << 0;
pub const SCOPE_NONCOMPLIANT: u32 = 1 << 1;
pub const SCOPE_LOCKED_IN: u32 = 1 << 2;
pub const SCOPE_REVOKED: u32 = 1 << 3;

pub const RESOLVE_PARTIAL: u32 = 1 << 0;
pub const RESOLVE_EVENTS_APPLIED: u32 = 1 << 1;
pub const RESOLVE_REVOCATION: u32 = 1 << 2;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Definition {
    pub definition_id: u32,
    pub region_id: u32,
    pub process_type: ProcessType,
    pub owner_tool_id: u32,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub version_id: u32,
    pub definition_id: u32,
    pub status: VersionStatus,
    pub revision: u32,
    pub compatibility_score: Q16_16,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scope {
    pub scope_id: u32,
    pub version_id: u32,
    pub region_id: u32,
    pub adoption_rate: Q16_16,
    pub compliance_rate: Q16_16,
    pub lock_in_rate: Q16_16,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub event_id: u32,
    pub scope_id: u32,
    pub process_type: ProcessType,
    pub event_tick: u64,
    pub delta_adoption: Q16_16,
    pub delta_compliance: Q16_16,
    pub delta_lock_in: Q16_16,
    pub applied: bool,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tool {
    pub tool_id: u32,
    pub region_id: u32,
    pub kind: u32,
    pub maturity: Q16_16,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub edge_id: u32,
    pub from_tool_id: u32,
    pub to_tool_id: u32,
    pub graph_id: u32,
    pub compatibility_score: Q16_16,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Graph {
    pub graph_id: u32,
    pub region_id: u32,
    pub edge_count: u32,
    pub node_count: u32,
    pub flags: u32,
}

macro_rules! sample_struct {
    ($name:ident, $record:ty) => {
        #[derive(Clone, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            pub record: Option<$record>,
            pub region_id: u32,
            pub flags: u32,
            pub meta: QueryMeta,
        }
    };
}

sample_struct!(DefinitionSample, Definition);
sample_struct!(VersionSample, Version);
sample_struct!(ScopeSample, Scope);
sample_struct!(EventSample, Event);
sample_struct!(ToolSample, Tool);
sample_struct!(EdgeSample, Edge);
sample_struct!(GraphSample, Graph);

#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionAverages {
    pub adoption_avg: Q48_16,
    pub compliance_avg: Q48_16,
    pub lock_in_avg: Q48_16,
    pub compatibility_avg: Q48_16,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionSample {
    pub region_id: u32,
    pub definition_count: u32,
    pub version_count: u32,
    pub scope_count: u32,
    pub event_count: u32,
    pub tool_count: u32,
    pub edge_count: u32,
    pub graph_count: u32,
    pub averages: RegionAverages,
    pub event_type_tally: [u32; EVENT_BINS],
    pub flags: u32,
    pub meta: QueryMeta,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolveResult {
    pub ok: bool,
    pub refusal_reason: RefusalReason,
    pub flags: u32,
    pub definition_count: u32,
    pub version_count: u32,
    pub scope_count: u32,
    pub event_count: u32,
    pub event_applied_count: u32,
    pub tool_count: u32,
    pub edge_count: u32,
    pub graph_count: u32,
    pub averages: RegionAverages,
    pub event_type_tally: [u32; EVENT_BINS],
}

/// A region-summary snapshot taken at `collapse_region` time.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroCapsule {
    pub capsule_id: u64,
    pub region_id: u32,
    pub definition_count: u32,
    pub version_count: u32,
    pub scope_count: u32,
    pub averages: RegionAverages,
    pub compliance_hist: [Q16_16; HIST_BINS],
    pub event_type_tally: [u32; EVENT_BINS],
}

fn truncate_cap<T>(mut v: Vec<T>, cap: usize) -> Vec<T> {
    v.truncate(cap);
    v
}

/// Clamped adjustment of a `0..1` rate by a signed delta: `rate.add(delta)`
/// then re-clamped, matching the source's `update_rate` helper.
fn apply_delta(rate: Q16_16, delta: Q16_16) -> Q16_16 {
    clamp_ratio(rate.add(delta))
}

pub struct StandardDomain {
    pub policy: FieldPolicy,
    pub existence_state: ExistenceState,
    pub archival_state: ArchivalState,
    pub authoring_version: u32,
    definitions: Vec<Definition>,
    versions: Vec<Version>,
    scopes: Vec<Scope>,
    events: Vec<Event>,
    tools: Vec<Tool>,
    edges: Vec<Edge>,
    graphs: Vec<Graph>,
    capsules: Vec<MacroCapsule>,
}

impl StandardDomain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        definitions: Vec<Definition>,
        versions: Vec<Version>,
        scopes: Vec<Scope>,
        events: Vec<Event>,
        tools: Vec<Tool>,
        edges: Vec<Edge>,
        graphs: Vec<Graph>,
    ) -> StandardDomain {
        StandardDomain {
            policy: FieldPolicy::default(),
            existence_state: ExistenceState::Realized,
            archival_state: ArchivalState::Live,
            authoring_version: 1,
            definitions: truncate_cap(definitions, MAX_DEFINITIONS),
            versions: truncate_cap(versions, MAX_VERSIONS),
            scopes: truncate_cap(scopes, MAX_SCOPES),
            events: truncate_cap(events, MAX_EVENTS),
            tools: truncate_cap(tools, MAX_TOOLS),
            edges: truncate_cap(edges, MAX_EDGES),
            graphs: truncate_cap(graphs, MAX_GRAPHS),
            capsules: Vec::new(),
        }
    }

    pub fn set_state(&mut self, existence_state: ExistenceState, archival_state: ArchivalState) {
        self.existence_state = existence_state;
        self.archival_state = archival_state;
    }

    pub fn set_policy(&mut self, policy: FieldPolicy) {
        self.policy = policy;
    }

    fn is_active(&self) -> bool {
        domain_is_active(self.existence_state)
    }

    fn region_collapsed(&self, region_id: u32) -> bool {
        region_id != 0 && self.capsules.iter().any(|c| c.region_id == region_id)
    }

    fn find_capsule(&self, region_id: u32) -> Option<&MacroCapsule> {
        self.capsules.iter().find(|c| c.region_id == region_id)
    }

    fn definition_region(&self, definition_id: u32) -> u32 {
        self.definitions
            .iter()
            .find(|d| d.definition_id == definition_id)
            .map(|d| d.region_id)
            .unwrap_or(0)
    }

    fn version_region(&self, version_id: u32) -> u32 {
        self.versions
            .iter()
            .find(|v| v.version_id == version_id)
            .map(|v| self.definition_region(v.definition_id))
            .unwrap_or(0)
    }

    fn scope_region(&self, scope_id: u32) -> u32 {
        self.scopes
            .iter()
            .find(|s| s.scope_id == scope_id)
            .map(|s| s.region_id)
            .unwrap_or(0)
    }

    fn graph_region(&self, graph_id: u32) -> u32 {
        self.graphs
            .iter()
            .find(|g| g.graph_id == graph_id)
            .map(|g| g.region_id)
            .unwrap_or(0)
    }

    pub fn definition_query(&self, definition_id: u32, budget: &mut Budget) -> DefinitionSample {
        if !self.is_active() {
            return DefinitionSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return DefinitionSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }
        let Some(definition) = self.definitions.iter().find(|d| d.definition_id == definition_id) else {
            return DefinitionSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(definition.region_id) {
            return DefinitionSample {
                record: None,
                region_id: definition.region_id,
                flags: DEFINITION_COLLAPSED,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost, budget.used_units(), budget.max_units()),
            };
        }
        DefinitionSample {
            region_id: definition.region_id,
            flags: definition.flags,
            record: Some(definition.clone()),
            meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
        }
    }

    pub fn version_query(&self, version_id: u32, budget: &mut Budget) -> VersionSample {
        if !self.is_active() {
            return VersionSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return VersionSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }
        let Some(version) = self.versions.iter().find(|v| v.version_id == version_id) else {
            return VersionSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        let region_id = self.definition_region(version.definition_id);
        if self.region_collapsed(region_id) {
            return VersionSample {
                record: None,
                region_id,
                flags: VERSION_COLLAPSED,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost, budget.used_units(), budget.max_units()),
            };
        }
        VersionSample {
            region_id,
            flags: version.flags,
            record: Some(version.clone()),
            meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
        }
    }

    pub fn scope_query(&self, scope_id: u32, budget: &mut Budget) -> ScopeSample {
        if !self.is_active() {
            return ScopeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return ScopeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }
        let Some(scope) = self.scopes.iter().find(|s| s.scope_id == scope_id) else {
            return ScopeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(scope.region_id) {
            return ScopeSample {
                record: None,
                region_id: scope.region_id,
                flags: SCOPE_COLLAPSED,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost, budget.used_units(), budget.max_units()),
            };
        }
        ScopeSample {
            region_id: scope.region_id,
            flags: scope.flags,
            record: Some(scope.clone()),
            meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
        }
    }

    pub fn event_query(&self, event_id: u32, budget: &mut Budget) -> EventSample {
        if !self.is_active() {
            return EventSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return EventSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }
        let Some(event) = self.events.iter().find(|e| e.event_id == event_id) else {
            return EventSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        let region_id = self.scope_region(event.scope_id);
        if self.region_collapsed(region_id) {
            return EventSample {
                record: None,
                region_id,
                flags: EVENT_COLLAPSED,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost, budget.used_units(), budget.max_units()),
            };
        }
        EventSample {
            region_id,
            flags: 0,
            record: Some(event.clone()),
            meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
        }
    }

    pub fn tool_query(&self, tool_id: u32, budget: &mut Budget) -> ToolSample {
        if !self.is_active() {
            return ToolSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return ToolSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }
        let Some(tool) = self.tools.iter().find(|t| t.tool_id == tool_id) else {
            return ToolSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(tool.region_id) {
            return ToolSample {
                record: None,
                region_id: tool.region_id,
                flags: TOOL_COLLAPSED,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost, budget.used_units(), budget.max_units()),
            };
        }
        ToolSample {
            region_id: tool.region_id,
            flags: tool.flags,
            record: Some(tool.clone()),
            meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
        }
    }

    pub fn edge_query(&self, edge_id: u32, budget: &mut Budget) -> EdgeSample {
        if !self.is_active() {
            return EdgeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return EdgeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }
        let Some(edge) = self.edges.iter().find(|e| e.edge_id == edge_id) else {
            return EdgeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        let region_id = self.graph_region(edge.graph_id);
        if self.region_collapsed(region_id) {
            return EdgeSample {
                record: None,
                region_id,
                flags: EDGE_COLLAPSED,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost, budget.used_units(), budget.max_units()),
            };
        }
        EdgeSample {
            region_id,
            flags: edge.flags,
            record: Some(edge.clone()),
            meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
        }
    }

    pub fn graph_query(&self, graph_id: u32, budget: &mut Budget) -> GraphSample {
        if !self.is_active() {
            return GraphSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return GraphSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }
        let Some(graph) = self.graphs.iter().find(|g| g.graph_id == graph_id) else {
            return GraphSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(graph.region_id) {
            return GraphSample {
                record: None,
                region_id: graph.region_id,
                flags: GRAPH_COLLAPSED,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost, budget.used_units(), budget.max_units()),
            };
        }
        GraphSample {
            region_id: graph.region_id,
            flags: graph.flags,
            record: Some(graph.clone()),
            meta: QueryMeta::ok(Resolution::Analytic, Confidence::Exact, cost, budget.used_units(), budget.max_units()),
        }
    }

    /// `region_id == 0` scans every region. Definitions, versions and scopes
    /// cost `cost_medium`; events, tools, edges and graphs cost
    /// `cost_coarse`, mirroring [`crate::institution::InstitutionDomain::region_query`]'s
    /// membership/activity split.
    pub fn region_query(&self, region_id: u32, budget: &mut Budget) -> RegionSample {
        if !self.is_active() {
            return RegionSample {
                region_id,
                definition_count: 0,
                version_count: 0,
                scope_count: 0,
                event_count: 0,
                tool_count: 0,
                edge_count: 0,
                graph_count: 0,
                averages: RegionAverages::default(),
                event_type_tally: [0; EVENT_BINS],
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::DomainInactive, budget.used_units(), budget.max_units()),
            };
        }
        let cost_base = budget_cost(self.policy.cost_analytic);
        if !budget.consume(cost_base) {
            return RegionSample {
                region_id,
                definition_count: 0,
                version_count: 0,
                scope_count: 0,
                event_count: 0,
                tool_count: 0,
                edge_count: 0,
                graph_count: 0,
                averages: RegionAverages::default(),
                event_type_tally: [0; EVENT_BINS],
                flags: 0,
                meta: QueryMeta::refused(RefusalReason::Budget, budget.used_units(), budget.max_units()),
            };
        }

        if region_id != 0 && self.region_collapsed(region_id) {
            let capsule = self.find_capsule(region_id);
            let (counts, averages, tally) = match capsule {
                Some(c) => ((c.definition_count, c.version_count, c.scope_count), c.averages, c.event_type_tally),
                None => ((0, 0, 0), RegionAverages::default(), [0; EVENT_BINS]),
            };
            return RegionSample {
                region_id,
                definition_count: counts.0,
                version_count: counts.1,
                scope_count: counts.2,
                event_count: 0,
                tool_count: 0,
                edge_count: 0,
                graph_count: 0,
                averages,
                event_type_tally: tally,
                flags: RESOLVE_PARTIAL,
                meta: QueryMeta::ok(Resolution::Analytic, Confidence::Unknown, cost_base, budget.used_units(), budget.max_units()),
            };
        }

        let cost_definition = budget_cost(self.policy.cost_medium);
        let cost_version = budget_cost(self.policy.cost_medium);
        let cost_scope = budget_cost(self.policy.cost_medium);
        let cost_event = budget_cost(self.policy.cost_coarse);
        let cost_tool = budget_cost(self.policy.cost_coarse);
        let cost_edge = budget_cost(self.policy.cost_coarse);
        let cost_graph = budget_cost(self.policy.cost_coarse);

        let mut flags = 0u32;
        let mut definition_count = 0u32;
        let mut version_count = 0u32;
        let mut scope_count = 0u32;
        let mut event_count = 0u32;
        let mut tool_count = 0u32;
        let mut edge_count = 0u32;
        let mut graph_count = 0u32;
        let mut event_type_tally = [0u32; EVENT_BINS];
        let mut adoption_total = Q48_16::ZERO;
        let mut compliance_total = Q48_16::ZERO;

        for definition in &self.definitions {
            if region_id != 0 && definition.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(definition.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_definition) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            definition_count += 1;
        }

        for version in &self.versions {
            let region = self.definition_region(version.definition_id);
            if region_id != 0 && region != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(region) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_version) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            version_count += 1;
        }

        for scope in &self.scopes {
            if region_id != 0 && scope.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(scope.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_scope) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            adoption_total = adoption_total.add(Q48_16::from_q16_16(scope.adoption_rate));
            compliance_total = compliance_total.add(Q48_16::from_q16_16(scope.compliance_rate));
            scope_count += 1;
        }

        for event in &self.events {
            let region = self.scope_region(event.scope_id);
            if region_id != 0 && region != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(region) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_event) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            event_count += 1;
            event_type_tally[event.process_type.event_bin()] += 1;
        }

        for tool in &self.tools {
            if region_id != 0 && tool.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(tool.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_tool) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            tool_count += 1;
        }

        for edge in &self.edges {
            let region = self.graph_region(edge.graph_id);
            if region_id != 0 && region != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(region) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_edge) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            edge_count += 1;
        }

        for graph in &self.graphs {
            if region_id != 0 && graph.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(graph.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_graph) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            graph_count += 1;
        }

        let mut averages = RegionAverages::default();
        if scope_count > 0 {
            let count = Q48_16::from_int(scope_count as i64);
            averages.adoption_avg = adoption_total.div(count);
            averages.compliance_avg = compliance_total.div(count);
        }

        RegionSample {
            region_id,
            definition_count,
            version_count,
            scope_count,
            event_count,
            tool_count,
            edge_count,
            graph_count,
            averages,
            event_type_tally,
            flags,
            meta: QueryMeta::ok(
                Resolution::Analytic,
                if flags != 0 { Confidence::Unknown } else { Confidence::Exact },
                cost_base,
                budget.used_units(),
                budget.max_units(),
            ),
        }
    }

    /// Applies each `scope_id`-addressed event at most once, keyed off its
    /// `applied` bit, in the same idempotence contract as
    /// [`crate::institution::InstitutionDomain::resolve`]. Event
    /// application mirrors the authored engine's per-`process_type` switch:
    /// `PROPOSE` flips a `Draft` version to `Active` and nudges adoption;
    /// `ADOPT` nudges adoption; `AUDIT` nudges compliance; `ENFORCE` nudges
    /// compliance and lock-in; `REVOKE` zeroes all three rates, revokes both
    /// the scope and its version, and raises `RESOLVE_REVOCATION`. Walks
    /// definitions, versions, scopes, events, tools, edges and graphs in
    /// turn, each against its own budget cost; versions and edges also feed
    /// `compatibility_avg`. After the event walk every in-region scope —
    /// not just ones an applied event touched this tick — has its
    /// `ADOPTED`/`NONCOMPLIANT`/`LOCKED_IN`/`REVOKED` flags recomputed from
    /// its current rates.
    pub fn resolve(&mut self, region_id: u32, tick: u64, tick_delta: u64, budget: &mut Budget) -> ResolveResult {
        let _ = if tick_delta == 0 { 1 } else { tick_delta };

        if !self.is_active() {
            return ResolveResult {
                ok: false,
                refusal_reason: RefusalReason::DomainInactive,
                ..ResolveResult::default()
            };
        }
        let cost_base = budget_cost(self.policy.cost_analytic);
        if !budget.consume(cost_base) {
            return ResolveResult {
                ok: false,
                refusal_reason: RefusalReason::Budget,
                ..ResolveResult::default()
            };
        }

        if region_id != 0 && self.region_collapsed(region_id) {
            let capsule = self.find_capsule(region_id);
            let mut result = ResolveResult {
                ok: true,
                flags: RESOLVE_PARTIAL,
                ..ResolveResult::default()
            };
            if let Some(c) = capsule {
                result.definition_count = c.definition_count;
                result.version_count = c.version_count;
                result.scope_count = c.scope_count;
                result.averages = c.averages;
                result.event_type_tally = c.event_type_tally;
            }
            return result;
        }

        let cost_definition = budget_cost(self.policy.cost_medium);
        let cost_version = budget_cost(self.policy.cost_medium);
        let cost_scope = budget_cost(self.policy.cost_medium);
        let cost_event = budget_cost(self.policy.cost_coarse);
        let cost_tool = budget_cost(self.policy.cost_coarse);
        let cost_edge = budget_cost(self.policy.cost_coarse);
        let cost_graph = budget_cost(self.policy.cost_coarse);

        let mut flags = 0u32;
        let mut refusal_reason = RefusalReason::None;
        let mut result = ResolveResult::default();

        for definition in &self.definitions {
            if region_id != 0 && definition.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(definition.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_definition) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.definition_count += 1;
        }

        let mut compatibility_total = Q48_16::ZERO;
        let mut compat_seen = 0u32;
        for version in &self.versions {
            let region = self.definition_region(version.definition_id);
            if region_id != 0 && region != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(region) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_version) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            compatibility_total = compatibility_total.add(Q48_16::from_q16_16(version.compatibility_score));
            compat_seen += 1;
            result.version_count += 1;
        }

        let collapsed_regions: Vec<u32> = self.capsules.iter().map(|c| c.region_id).collect();
        let mut adoption_total = Q48_16::ZERO;
        let mut compliance_total = Q48_16::ZERO;
        let mut lock_in_total = Q48_16::ZERO;
        for scope in &self.scopes {
            if region_id != 0 && scope.region_id != region_id {
                continue;
            }
            if region_id == 0 && collapsed_regions.contains(&scope.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_scope) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            adoption_total = adoption_total.add(Q48_16::from_q16_16(scope.adoption_rate));
            compliance_total = compliance_total.add(Q48_16::from_q16_16(scope.compliance_rate));
            lock_in_total = lock_in_total.add(Q48_16::from_q16_16(scope.lock_in_rate));
            result.scope_count += 1;
        }

        let version_ids: Vec<u32> = self.versions.iter().map(|v| v.version_id).collect();
        for event in &mut self.events {
            let region = self
                .scopes
                .iter()
                .find(|s| s.scope_id == event.scope_id)
                .map(|s| s.region_id)
                .unwrap_or(0);
            if region_id != 0 && region != region_id {
                continue;
            }
            if region_id == 0 && collapsed_regions.contains(&region) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_event) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.event_count += 1;

            if event.applied {
                continue;
            }
            if event.event_tick > tick {
                continue;
            }
            let Some(scope) = self.scopes.iter_mut().find(|s| s.scope_id == event.scope_id) else {
                continue;
            };
            let version_id = scope.version_id;

            match event.process_type {
                ProcessType::Propose => {
                    if version_ids.contains(&version_id) {
                        if let Some(version) =
                            self.versions.iter_mut().find(|v| v.version_id == version_id)
                        {
                            if version.status == VersionStatus::Draft {
                                version.status = VersionStatus::Active;
                            }
                        }
                    }
                    let scope = self.scopes.iter_mut().find(|s| s.scope_id == event.scope_id).unwrap();
                    scope.adoption_rate = apply_delta(scope.adoption_rate, event.delta_adoption);
                }
                ProcessType::Adopt => {
                    let scope = self.scopes.iter_mut().find(|s| s.scope_id == event.scope_id).unwrap();
                    scope.adoption_rate = apply_delta(scope.adoption_rate, event.delta_adoption);
                }
                ProcessType::Audit => {
                    let scope = self.scopes.iter_mut().find(|s| s.scope_id == event.scope_id).unwrap();
                    scope.compliance_rate = apply_delta(scope.compliance_rate, event.delta_compliance);
                }
                ProcessType::Enforce => {
                    let scope = self.scopes.iter_mut().find(|s| s.scope_id == event.scope_id).unwrap();
                    scope.compliance_rate = apply_delta(scope.compliance_rate, event.delta_compliance);
                    scope.lock_in_rate = apply_delta(scope.lock_in_rate, event.delta_lock_in);
                }
                ProcessType::Revoke => {
                    if let Some(version) =
                        self.versions.iter_mut().find(|v| v.version_id == version_id)
                    {
                        version.status = VersionStatus::Revoked;
                    }
                    let scope = self.scopes.iter_mut().find(|s| s.scope_id == event.scope_id).unwrap();
                    scope.adoption_rate = Q16_16::ZERO;
                    scope.compliance_rate = Q16_16::ZERO;
                    scope.lock_in_rate = Q16_16::ZERO;
                    scope.flags |= SCOPE_REVOKED;
                    flags |= RESOLVE_REVOCATION;
                }
                ProcessType::Unset => {}
            }

            let version_status = self
                .versions
                .iter()
                .find(|v| v.version_id == version_id)
                .map(|v| v.status);
            if let Some(scope) = self.scopes.iter_mut().find(|s| s.scope_id == event.scope_id) {
                update_scope_flags(scope, version_status);
            }

            event.applied = true;
            event_type_tally_bump(&mut result.event_type_tally, event.process_type);
            result.event_applied_count += 1;
        }

        for tool in &self.tools {
            if region_id != 0 && tool.region_id != region_id {
                continue;
            }
            if region_id == 0 && collapsed_regions.contains(&tool.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_tool) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.tool_count += 1;
        }

        for edge in &self.edges {
            let region = self.graph_region(edge.graph_id);
            if region_id != 0 && region != region_id {
                continue;
            }
            if region_id == 0 && collapsed_regions.contains(&region) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_edge) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            compatibility_total = compatibility_total.add(Q48_16::from_q16_16(edge.compatibility_score));
            compat_seen += 1;
            result.edge_count += 1;
        }

        for graph in &self.graphs {
            if region_id != 0 && graph.region_id != region_id {
                continue;
            }
            if region_id == 0 && collapsed_regions.contains(&graph.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_graph) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.graph_count += 1;
        }

        for scope in &mut self.scopes {
            if region_id != 0 && scope.region_id != region_id {
                continue;
            }
            if region_id == 0 && collapsed_regions.contains(&scope.region_id) {
                continue;
            }
            let version_status = self
                .versions
                .iter()
                .find(|v| v.version_id == scope.version_id)
                .map(|v| v.status);
            update_scope_flags(scope, version_status);
        }

        result.ok = true;
        result.refusal_reason = refusal_reason;
        if result.event_applied_count > 0 {
            flags |= RESOLVE_EVENTS_APPLIED;
        }
        result.flags = flags;

        if result.scope_count > 0 {
            let count = Q48_16::from_int(result.scope_count as i64);
            result.averages.adoption_avg = adoption_total.div(count);
            result.averages.compliance_avg = compliance_total.div(count);
            result.averages.lock_in_avg = lock_in_total.div(count);
        }
        if compat_seen > 0 {
            let count = Q48_16::from_int(compat_seen as i64);
            result.averages.compatibility_avg = compatibility_total.div(count);
        }
        result
    }

    /// Aggregates the region into a capsule and appends it; fails silently
    /// (returns `false`) if already collapsed or the capsule list is full.
    pub fn collapse_region(&mut self, region_id: u32) -> bool {
        if region_id == 0 || self.region_collapsed(region_id) {
            return false;
        }
        if self.capsules.len() >= MAX_CAPSULES {
            return false;
        }

        let mut capsule = MacroCapsule {
            capsule_id: region_id as u64,
            region_id,
            definition_count: self
                .definitions
                .iter()
                .filter(|d| d.region_id == region_id)
                .count() as u32,
            version_count: self
                .versions
                .iter()
                .filter(|v| self.definition_region(v.definition_id) == region_id)
                .count() as u32,
            scope_count: 0,
            averages: RegionAverages::default(),
            compliance_hist: [Q16_16::ZERO; HIST_BINS],
            event_type_tally: [0; EVENT_BINS],
        };

        let mut adoption_total = Q48_16::ZERO;
        let mut compliance_total = Q48_16::ZERO;
        let mut compliance_bins = [0u32; HIST_BINS];
        for scope in self.scopes.iter().filter(|s| s.region_id == region_id) {
            capsule.scope_count += 1;
            adoption_total = adoption_total.add(Q48_16::from_q16_16(scope.adoption_rate));
            compliance_total = compliance_total.add(Q48_16::from_q16_16(scope.compliance_rate));
            compliance_bins[hist_bin(scope.compliance_rate)] += 1;
        }
        for event in self.events.iter() {
            if self.scope_region(event.scope_id) == region_id {
                capsule.event_type_tally[event.process_type.event_bin()] += 1;
            }
        }

        if capsule.scope_count > 0 {
            let count = Q48_16::from_int(capsule.scope_count as i64);
            capsule.averages.adoption_avg = adoption_total.div(count);
            capsule.averages.compliance_avg = compliance_total.div(count);
        }
        for bin in 0..HIST_BINS {
            capsule.compliance_hist[bin] = ratio_from_counts(compliance_bins[bin], capsule.scope_count);
        }

        self.capsules.push(capsule);
        true
    }

    /// Removes a region's capsule, restoring live queries. Capsule order is
    /// not part of the contract: this swap-removes.
    pub fn expand_region(&mut self, region_id: u32) -> bool {
        if region_id == 0 {
            return false;
        }
        if let Some(index) = self.capsules.iter().position(|c| c.region_id == region_id) {
            self.capsules.swap_remove(index);
            true
        } else {
            false
        }
    }

    pub fn capsule_count(&self) -> usize {
        self.capsules.len()
    }

    pub fn capsule_at(&self, index: usize) -> Option<&MacroCapsule> {
        self.capsules.get(index)
    }
}

fn event_type_tally_bump(tally: &mut [u32; EVENT_BINS], process_type: ProcessType) {
    tally[process_type.event_bin()] += 1;
}

/// Recomputes a scope's lifecycle flags from its current rates, mirroring
/// the source's `update_scope_flags`: a revoked version forces `REVOKED`
/// and nothing else; otherwise `ADOPTED` follows a positive adoption rate,
/// `NONCOMPLIANT` follows compliance trailing adoption, and `LOCKED_IN`
/// follows a positive lock-in rate.
fn update_scope_flags(scope: &mut Scope, version_status: Option<VersionStatus>) {
    scope.flags &= !(SCOPE_ADOPTED | SCOPE_NONCOMPLIANT | SCOPE_LOCKED_IN | SCOPE_REVOKED);
    if version_status == Some(VersionStatus::Revoked) {
        scope.flags |= SCOPE_REVOKED;
        return;
    }
    if scope.adoption_rate > Q16_16::ZERO {
        scope.flags |= SCOPE_ADOPTED;
    }
    if scope.compliance_rate < scope.adoption_rate {
        scope.flags |= SCOPE_NONCOMPLIANT;
    }
    if scope.lock_in_rate > Q16_16::ZERO {
        scope.flags |= SCOPE_LOCKED_IN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: u32, region: u32) -> Definition {
        Definition {
            definition_id: id,
            region_id: region,
            process_type: ProcessType::Propose,
            owner_tool_id: 0,
            flags: 0,
        }
    }

    fn version(id: u32, definition_id: u32, status: VersionStatus) -> Version {
        Version {
            version_id: id,
            definition_id,
            status,
            revision: 1,
            compatibility_score: Q16_16::ZERO,
            flags: 0,
        }
    }

    fn scope(id: u32, version_id: u32, region: u32, adoption: i32, compliance: i32) -> Scope {
        Scope {
            scope_id: id,
            version_id,
            region_id: region,
            adoption_rate: Q16_16(adoption),
            compliance_rate: Q16_16(compliance),
            lock_in_rate: Q16_16::ZERO,
            flags: 0,
        }
    }

    fn event(id: u32, scope_id: u32, process_type: ProcessType, tick: u64, delta_adoption: i32) -> Event {
        Event {
            event_id: id,
            scope_id,
            process_type,
            event_tick: tick,
            delta_adoption: Q16_16(delta_adoption),
            delta_compliance: Q16_16::ZERO,
            delta_lock_in: Q16_16::ZERO,
            applied: false,
        }
    }

    #[test]
    fn definition_query_missing_refuses_with_generic_no_source() {
        let domain = StandardDomain::new(vec![definition(1, 1)], vec![], vec![], vec![], vec![], vec![], vec![]);
        let mut budget = Budget::new(100);
        let sample = domain.definition_query(99, &mut budget);
        assert_eq!(sample.meta.refusal_reason, RefusalReason::NoSource);
    }

    #[test]
    fn version_query_derives_region_through_definition() {
        let domain = StandardDomain::new(
            vec![definition(1, 7)],
            vec![version(10, 1, VersionStatus::Draft)],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let mut budget = Budget::new(100);
        let sample = domain.version_query(10, &mut budget);
        assert_eq!(sample.region_id, 7);
        assert_eq!(sample.meta.confidence, Confidence::Exact);
    }

    #[test]
    fn resolve_applies_adopt_event_idempotently_with_clamp() {
        let mut domain = StandardDomain::new(
            vec![definition(1, 7)],
            vec![version(10, 1, VersionStatus::Active)],
            vec![scope(100, 10, 7, Q16_16::from_double(0.9).0, 0)],
            vec![event(1, 100, ProcessType::Adopt, 5, Q16_16::from_double(0.25).0)],
            vec![],
            vec![],
            vec![],
        );
        let mut budget = Budget::new(1000);
        let first = domain.resolve(7, 10, 1, &mut budget);
        assert_eq!(first.event_applied_count, 1);
        let sample = domain.scope_query(100, &mut Budget::new(1000));
        assert_eq!(sample.record.unwrap().adoption_rate, Q16_16::ONE);

        let second = domain.resolve(7, 10, 1, &mut budget);
        assert_eq!(second.event_applied_count, 0, "already-applied events must not re-apply");
    }

    #[test]
    fn resolve_does_not_apply_future_events() {
        let mut domain = StandardDomain::new(
            vec![definition(1, 7)],
            vec![version(10, 1, VersionStatus::Active)],
            vec![scope(100, 10, 7, 0, 0)],
            vec![event(1, 100, ProcessType::Adopt, 100, Q16_16::from_double(0.25).0)],
            vec![],
            vec![],
            vec![],
        );
        let mut budget = Budget::new(1000);
        let result = domain.resolve(7, 20, 1, &mut budget);
        assert_eq!(result.event_applied_count, 0);
    }

    #[test]
    fn revoke_event_zeroes_rates_and_revokes_version() {
        let mut domain = StandardDomain::new(
            vec![definition(1, 7)],
            vec![version(10, 1, VersionStatus::Active)],
            vec![scope(100, 10, 7, Q16_16::from_double(0.5).0, Q16_16::from_double(0.5).0)],
            vec![event(1, 100, ProcessType::Revoke, 1, 0)],
            vec![],
            vec![],
            vec![],
        );
        let mut budget = Budget::new(1000);
        let result = domain.resolve(7, 5, 1, &mut budget);
        assert_eq!(result.flags & RESOLVE_REVOCATION, RESOLVE_REVOCATION);
        let sample = domain.scope_query(100, &mut Budget::new(1000));
        let record = sample.record.unwrap();
        assert_eq!(record.adoption_rate, Q16_16::ZERO);
        assert_eq!(record.flags & SCOPE_REVOKED, SCOPE_REVOKED);
        let version_sample = domain.version_query(10, &mut Budget::new(1000));
        assert_eq!(version_sample.record.unwrap().status, VersionStatus::Revoked);
    }

    #[test]
    fn resolve_updates_flags_on_scopes_untouched_by_any_event() {
        let mut domain = StandardDomain::new(
            vec![definition(1, 7)],
            vec![version(10, 1, VersionStatus::Active)],
            vec![scope(100, 10, 7, Q16_16::from_double(0.5).0, Q16_16::from_double(0.1).0)],
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let mut budget = Budget::new(1000);
        domain.resolve(7, 1, 1, &mut budget);
        let sample = domain.scope_query(100, &mut Budget::new(1000));
        let record = sample.record.unwrap();
        assert_eq!(record.flags & SCOPE_ADOPTED, SCOPE_ADOPTED);
        assert_eq!(record.flags & SCOPE_NONCOMPLIANT, SCOPE_NONCOMPLIANT);
    }

    #[test]
    fn resolve_walks_tools_edges_and_graphs_and_averages_compatibility() {
        let mut domain = StandardDomain::new(
            vec![definition(1, 7)],
            vec![version(10, 1, VersionStatus::Active)],
            vec![],
            vec![],
            vec![Tool { tool_id: 1, region_id: 7, kind: 0, maturity: Q16_16::ZERO, flags: 0 }],
            vec![Edge {
                edge_id: 1,
                from_tool_id: 1,
                to_tool_id: 1,
                graph_id: 50,
                compatibility_score: Q16_16::from_double(0.5),
                flags: 0,
            }],
            vec![Graph { graph_id: 50, region_id: 7, edge_count: 1, node_count: 1, flags: 0 }],
        );
        let mut budget = Budget::new(1000);
        let result = domain.resolve(7, 1, 1, &mut budget);
        assert_eq!(result.tool_count, 1);
        assert_eq!(result.edge_count, 1);
        assert_eq!(result.graph_count, 1);
    }

    #[test]
    fn resolve_sets_partial_and_budget_refusal_when_tool_budget_runs_out() {
        let mut domain = StandardDomain::new(
            vec![],
            vec![],
            vec![],
            vec![],
            vec![Tool { tool_id: 1, region_id: 7, kind: 0, maturity: Q16_16::ZERO, flags: 0 }],
            vec![],
            vec![],
        );
        let mut budget = Budget::new(5);
        let result = domain.resolve(7, 1, 1, &mut budget);
        assert!(result.ok);
        assert_eq!(result.flags & RESOLVE_PARTIAL, RESOLVE_PARTIAL);
        assert_eq!(result.refusal_reason, RefusalReason::Budget);
        assert_eq!(result.tool_count, 0);
    }

    #[test]
    fn collapse_then_query_is_unknown_confidence_and_expand_restores_exact() {
        let mut domain = StandardDomain::new(
            vec![definition(1, 7)],
            vec![],
            vec![scope(100, 0, 7, Q16_16::from_double(0.5).0, Q16_16::from_double(0.5).0)],
            vec![],
            vec![],
            vec![],
            vec![],
        );
        assert!(domain.collapse_region(7));
        let mut budget = Budget::new(1000);
        let collapsed = domain.scope_query(100, &mut budget);
        assert_eq!(collapsed.flags, SCOPE_COLLAPSED);
        assert_eq!(collapsed.meta.confidence, Confidence::Unknown);

        assert!(domain.expand_region(7));
        let restored = domain.scope_query(100, &mut budget);
        assert_eq!(restored.meta.confidence, Confidence::Exact);
    }

    #[test]
    fn collapse_is_not_reentrant() {
        let mut domain = StandardDomain::new(vec![definition(1, 7)], vec![], vec![], vec![], vec![], vec![], vec![]);
        assert!(domain.collapse_region(7));
        assert!(!domain.collapse_region(7));
        assert_eq!(domain.capsule_count(), 1);
    }
}
