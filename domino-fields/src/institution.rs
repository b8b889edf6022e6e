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

//! Institutions, scopes, capabilities, rules and enforcement events:
//! governance structure laid over a region, resolved and collapsible the
//! same way as [`crate::standard`].

use domino_core::{Budget, Confidence, QueryMeta, RefusalReason, Resolution, Q16_16, Q48_16};

use crate::common::{
    budget_cost, clamp_ratio, domain_is_active, hist_bin, ratio_from_counts, ArchivalState,
    FieldPolicy, ACTION_BINS, HIST_BINS, MISSING_RECORD,
};

pub const MAX_ENTITIES: usize = 128;
pub const MAX_SCOPES: usize = 64;
pub const MAX_CAPABILITIES: usize = 128;
pub const MAX_RULES: usize = 128;
pub const MAX_ENFORCEMENTS: usize = 128;
pub const MAX_CAPSULES: usize = 64;

pub use crate::common::ExistenceState;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleAction {
    Unset,
    Allow,
    Forbid,
    Conditional,
    License,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EnforcementAction {
    Unset,
    Permit,
    Deny,
    Penalize,
    License,
}

impl EnforcementAction {
    fn action_bin(self) -> usize {
        match self {
            EnforcementAction::Permit => 0,
            EnforcementAction::Deny => 1,
            EnforcementAction::Penalize => 2,
            EnforcementAction::License => 3,
            EnforcementAction::Unset => 0,
        }
    }
}

/// `COLLAPSED` is the only flag a query ever observes in practice: nothing
/// sets `entity`/`scope` flags during authoring, so the bit stays reserved
/// for shape parity with the sample types.
pub const ENTITY_COLLAPSED: u32 = 1 << 1;
pub const SCOPE_COLLAPSED: u32 = 1 << 1;
pub const CAPABILITY_COLLAPSED: u32 = 1 << 1;
pub const CAPABILITY_LICENSE_REQUIRED: u32 = 1 << 2;
pub const RULE_COLLAPSED: u32 = 1 << 1;
pub const RULE_CONDITIONAL: u32 = 1 << 2;
pub const RULE_LICENSE_REQUIRED: u32 = 1 << 3;
pub const ENFORCEMENT_APPLIED: u32 = 1 << 1;
/// Reserved: the source header defines this bit but `dom_institution_apply_enforcement`
/// never sets it — an enforcement with an unresolvable `rule_id` is still applied.
pub const ENFORCEMENT_FAILED: u32 = 1 << 2;
pub const RESOLVE_PARTIAL: u32 = 1 << 0;
pub const RESOLVE_EVENTS_APPLIED: u32 = 1 << 1;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entity {
    pub entity_id: u32,
    pub scope_id: u32,
    pub authority_types: Vec<u32>,
    pub enforcement_capacity: Q48_16,
    pub resource_budget: Q48_16,
    pub legitimacy_level: Q16_16,
    pub legitimacy_ref_id: u32,
    pub knowledge_base_id: u32,
    pub provenance_id: u32,
    pub region_id: u32,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scope {
    pub scope_id: u32,
    pub spatial_domain_id: u32,
    pub subject_domain_ids: Vec<u32>,
    pub overlap_policy_id: u32,
    pub provenance_id: u32,
    pub region_id: u32,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capability {
    pub capability_id: u32,
    pub entity_id: u32,
    pub scope_id: u32,
    pub authority_type_id: u32,
    pub process_family_id: u32,
    pub capacity_limit: Q48_16,
    pub license_required_id: u32,
    pub provenance_id: u32,
    pub region_id: u32,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rule {
    pub rule_id: u32,
    pub entity_id: u32,
    pub scope_id: u32,
    pub process_family_id: u32,
    pub subject_domain_id: u32,
    pub authority_type_id: u32,
    pub action: RuleAction,
    pub license_required_id: u32,
    pub provenance_id: u32,
    pub region_id: u32,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Enforcement {
    pub enforcement_id: u32,
    pub entity_id: u32,
    pub rule_id: u32,
    pub process_family_id: u32,
    pub agent_id: u32,
    pub action: EnforcementAction,
    pub event_tick: u64,
    pub provenance_id: u32,
    pub region_id: u32,
    pub flags: u32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntitySample {
    pub record: Option<Entity>,
    pub region_id: u32,
    pub flags: u32,
    pub meta: QueryMeta,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScopeSample {
    pub record: Option<Scope>,
    pub region_id: u32,
    pub flags: u32,
    pub meta: QueryMeta,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapabilitySample {
    pub record: Option<Capability>,
    pub region_id: u32,
    pub flags: u32,
    pub meta: QueryMeta,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleSample {
    pub record: Option<Rule>,
    pub region_id: u32,
    pub flags: u32,
    pub meta: QueryMeta,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnforcementSample {
    pub record: Option<Enforcement>,
    pub region_id: u32,
    pub flags: u32,
    pub meta: QueryMeta,
}

#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionAverages {
    pub enforcement_capacity_avg: Q48_16,
    pub resource_budget_avg: Q48_16,
    pub legitimacy_avg: Q16_16,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionSample {
    pub region_id: u32,
    pub entity_count: u32,
    pub scope_count: u32,
    pub capability_count: u32,
    pub rule_count: u32,
    pub enforcement_count: u32,
    pub averages: RegionAverages,
    pub enforcement_action_counts: [u32; ACTION_BINS],
    pub flags: u32,
    pub meta: QueryMeta,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolveResult {
    pub ok: bool,
    pub refusal_reason: RefusalReason,
    pub flags: u32,
    pub entity_count: u32,
    pub scope_count: u32,
    pub capability_count: u32,
    pub rule_count: u32,
    pub enforcement_count: u32,
    pub enforcement_applied_count: u32,
    pub averages: RegionAverages,
    pub enforcement_action_counts: [u32; ACTION_BINS],
}

/// A region-summary snapshot taken at `collapse_region` time. `rng_cursor`
/// from the originating header is omitted: nothing ever writes it there
/// either, so carrying it forward would just be a dead field with a
/// misleading name.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroCapsule {
    pub capsule_id: u64,
    pub region_id: u32,
    pub entity_count: u32,
    pub scope_count: u32,
    pub capability_count: u32,
    pub rule_count: u32,
    pub enforcement_count: u32,
    pub averages: RegionAverages,
    pub legitimacy_hist: [Q16_16; HIST_BINS],
    pub enforcement_action_counts: [u32; ACTION_BINS],
}

fn truncate_cap<T>(mut v: Vec<T>, cap: usize) -> Vec<T> {
    v.truncate(cap);
    v
}

pub struct InstitutionDomain {
    pub policy: FieldPolicy,
    pub existence_state: ExistenceState,
    pub archival_state: ArchivalState,
    pub authoring_version: u32,
    entities: Vec<Entity>,
    scopes: Vec<Scope>,
    capabilities: Vec<Capability>,
    rules: Vec<Rule>,
    enforcements: Vec<Enforcement>,
    capsules: Vec<MacroCapsule>,
}

impl InstitutionDomain {
    pub fn new(
        entities: Vec<Entity>,
        scopes: Vec<Scope>,
        capabilities: Vec<Capability>,
        rules: Vec<Rule>,
        enforcements: Vec<Enforcement>,
    ) -> InstitutionDomain {
        InstitutionDomain {
            policy: FieldPolicy::default(),
            existence_state: ExistenceState::Realized,
            archival_state: ArchivalState::Live,
            authoring_version: 1,
            entities: truncate_cap(entities, MAX_ENTITIES),
            scopes: truncate_cap(scopes, MAX_SCOPES),
            capabilities: truncate_cap(capabilities, MAX_CAPABILITIES),
            rules: truncate_cap(rules, MAX_RULES),
            enforcements: truncate_cap(enforcements, MAX_ENFORCEMENTS),
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

    pub fn entity_query(&self, entity_id: u32, budget: &mut Budget) -> EntitySample {
        if !self.is_active() {
            return EntitySample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::DomainInactive,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return EntitySample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::Budget,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let Some(entity) = self.entities.iter().find(|e| e.entity_id == entity_id) else {
            return EntitySample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(entity.region_id) {
            return EntitySample {
                record: None,
                region_id: entity.region_id,
                flags: ENTITY_COLLAPSED,
                meta: QueryMeta::ok(
                    Resolution::Analytic,
                    Confidence::Unknown,
                    cost,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        EntitySample {
            region_id: entity.region_id,
            flags: entity.flags,
            record: Some(entity.clone()),
            meta: QueryMeta::ok(
                Resolution::Analytic,
                Confidence::Exact,
                cost,
                budget.used_units(),
                budget.max_units(),
            ),
        }
    }

    pub fn scope_query(&self, scope_id: u32, budget: &mut Budget) -> ScopeSample {
        if !self.is_active() {
            return ScopeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::DomainInactive,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return ScopeSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::Budget,
                    budget.used_units(),
                    budget.max_units(),
                ),
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
                meta: QueryMeta::ok(
                    Resolution::Analytic,
                    Confidence::Unknown,
                    cost,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        ScopeSample {
            region_id: scope.region_id,
            flags: scope.flags,
            record: Some(scope.clone()),
            meta: QueryMeta::ok(
                Resolution::Analytic,
                Confidence::Exact,
                cost,
                budget.used_units(),
                budget.max_units(),
            ),
        }
    }

    pub fn capability_query(&self, capability_id: u32, budget: &mut Budget) -> CapabilitySample {
        if !self.is_active() {
            return CapabilitySample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::DomainInactive,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return CapabilitySample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::Budget,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let Some(capability) = self.capabilities.iter().find(|c| c.capability_id == capability_id)
        else {
            return CapabilitySample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(capability.region_id) {
            return CapabilitySample {
                record: None,
                region_id: capability.region_id,
                flags: CAPABILITY_COLLAPSED,
                meta: QueryMeta::ok(
                    Resolution::Analytic,
                    Confidence::Unknown,
                    cost,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        CapabilitySample {
            region_id: capability.region_id,
            flags: capability.flags,
            record: Some(capability.clone()),
            meta: QueryMeta::ok(
                Resolution::Analytic,
                Confidence::Exact,
                cost,
                budget.used_units(),
                budget.max_units(),
            ),
        }
    }

    pub fn rule_query(&self, rule_id: u32, budget: &mut Budget) -> RuleSample {
        if !self.is_active() {
            return RuleSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::DomainInactive,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return RuleSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::Budget,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let Some(rule) = self.rules.iter().find(|r| r.rule_id == rule_id) else {
            return RuleSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(rule.region_id) {
            return RuleSample {
                record: None,
                region_id: rule.region_id,
                flags: RULE_COLLAPSED,
                meta: QueryMeta::ok(
                    Resolution::Analytic,
                    Confidence::Unknown,
                    cost,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        RuleSample {
            region_id: rule.region_id,
            flags: rule.flags,
            record: Some(rule.clone()),
            meta: QueryMeta::ok(
                Resolution::Analytic,
                Confidence::Exact,
                cost,
                budget.used_units(),
                budget.max_units(),
            ),
        }
    }

    pub fn enforcement_query(&self, enforcement_id: u32, budget: &mut Budget) -> EnforcementSample {
        if !self.is_active() {
            return EnforcementSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::DomainInactive,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let cost = budget_cost(self.policy.cost_full);
        if !budget.consume(cost) {
            return EnforcementSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::Budget,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let Some(enforcement) =
            self.enforcements.iter().find(|e| e.enforcement_id == enforcement_id)
        else {
            return EnforcementSample {
                record: None,
                region_id: 0,
                flags: 0,
                meta: QueryMeta::refused(MISSING_RECORD, budget.used_units(), budget.max_units()),
            };
        };
        if self.region_collapsed(enforcement.region_id) {
            return EnforcementSample {
                record: None,
                region_id: enforcement.region_id,
                flags: 0, // collapsed has no dedicated bit; mirrors source
                meta: QueryMeta::ok(
                    Resolution::Analytic,
                    Confidence::Unknown,
                    cost,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        EnforcementSample {
            region_id: enforcement.region_id,
            flags: enforcement.flags,
            record: Some(enforcement.clone()),
            meta: QueryMeta::ok(
                Resolution::Analytic,
                Confidence::Exact,
                cost,
                budget.used_units(),
                budget.max_units(),
            ),
        }
    }

    /// `region_id == 0` scans every region. Per-kind costs mirror the
    /// source's medium/coarse split: entities and scopes cost `cost_medium`,
    /// capabilities/rules/enforcements cost `cost_coarse`.
    pub fn region_query(&self, region_id: u32, budget: &mut Budget) -> RegionSample {
        if !self.is_active() {
            return RegionSample {
                region_id,
                entity_count: 0,
                scope_count: 0,
                capability_count: 0,
                rule_count: 0,
                enforcement_count: 0,
                averages: RegionAverages::default(),
                enforcement_action_counts: [0; ACTION_BINS],
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::DomainInactive,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }
        let cost_base = budget_cost(self.policy.cost_analytic);
        if !budget.consume(cost_base) {
            return RegionSample {
                region_id,
                entity_count: 0,
                scope_count: 0,
                capability_count: 0,
                rule_count: 0,
                enforcement_count: 0,
                averages: RegionAverages::default(),
                enforcement_action_counts: [0; ACTION_BINS],
                flags: 0,
                meta: QueryMeta::refused(
                    RefusalReason::Budget,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }

        if region_id != 0 && self.region_collapsed(region_id) {
            let capsule = self.find_capsule(region_id);
            let (counts, averages, actions) = match capsule {
                Some(c) => (
                    (
                        c.entity_count,
                        c.scope_count,
                        c.capability_count,
                        c.rule_count,
                        c.enforcement_count,
                    ),
                    c.averages,
                    c.enforcement_action_counts,
                ),
                None => ((0, 0, 0, 0, 0), RegionAverages::default(), [0; ACTION_BINS]),
            };
            return RegionSample {
                region_id,
                entity_count: counts.0,
                scope_count: counts.1,
                capability_count: counts.2,
                rule_count: counts.3,
                enforcement_count: counts.4,
                averages,
                enforcement_action_counts: actions,
                flags: RESOLVE_PARTIAL,
                meta: QueryMeta::ok(
                    Resolution::Analytic,
                    Confidence::Unknown,
                    cost_base,
                    budget.used_units(),
                    budget.max_units(),
                ),
            };
        }

        let cost_entity = budget_cost(self.policy.cost_medium);
        let cost_scope = budget_cost(self.policy.cost_medium);
        let cost_capability = budget_cost(self.policy.cost_coarse);
        let cost_rule = budget_cost(self.policy.cost_coarse);
        let cost_enforcement = budget_cost(self.policy.cost_coarse);

        let mut flags = 0u32;
        let mut entity_count = 0u32;
        let mut scope_count = 0u32;
        let mut capability_count = 0u32;
        let mut rule_count = 0u32;
        let mut enforcement_count = 0u32;
        let mut enforcement_action_counts = [0u32; ACTION_BINS];
        let mut enforcement_capacity_total = Q48_16::ZERO;
        let mut resource_budget_total = Q48_16::ZERO;
        let mut legitimacy_sum: i64 = 0;

        for entity in &self.entities {
            if region_id != 0 && entity.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(entity.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_entity) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            enforcement_capacity_total = enforcement_capacity_total.add(entity.enforcement_capacity);
            resource_budget_total = resource_budget_total.add(entity.resource_budget);
            legitimacy_sum += entity.legitimacy_level.0 as i64;
            entity_count += 1;
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
            scope_count += 1;
        }

        for capability in &self.capabilities {
            if region_id != 0 && capability.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(capability.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_capability) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            capability_count += 1;
        }

        for rule in &self.rules {
            if region_id != 0 && rule.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(rule.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_rule) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            rule_count += 1;
        }

        for enforcement in &self.enforcements {
            if region_id != 0 && enforcement.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(enforcement.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_enforcement) {
                flags |= RESOLVE_PARTIAL;
                break;
            }
            enforcement_count += 1;
            enforcement_action_counts[enforcement.action.action_bin()] += 1;
        }

        let mut averages = RegionAverages::default();
        if entity_count > 0 {
            averages.enforcement_capacity_avg =
                enforcement_capacity_total.div(Q48_16::from_int(entity_count as i64));
            averages.resource_budget_avg =
                resource_budget_total.div(Q48_16::from_int(entity_count as i64));
            averages.legitimacy_avg =
                clamp_ratio(Q16_16((legitimacy_sum / entity_count as i64) as i32));
        }

        RegionSample {
            region_id,
            entity_count,
            scope_count,
            capability_count,
            rule_count,
            enforcement_count,
            averages,
            enforcement_action_counts,
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

    /// Applies each eligible enforcement event exactly once: the `APPLIED`
    /// bit guards re-execution across calls, and an event whose
    /// `event_tick` is still in the future is left untouched. `tick_delta`
    /// is accepted for signature parity with the originating engine but is
    /// not consulted beyond normalizing a zero to one.
    pub fn resolve(&mut self, region_id: u32, tick: u64, tick_delta: u64, budget: &mut Budget) -> ResolveResult {
        let _ = if tick_delta == 0 { 1 } else { tick_delta };

        if !domain_is_active(self.existence_state) {
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
                result.entity_count = c.entity_count;
                result.scope_count = c.scope_count;
                result.capability_count = c.capability_count;
                result.rule_count = c.rule_count;
                result.enforcement_count = c.enforcement_count;
                result.averages = c.averages;
                result.enforcement_action_counts = c.enforcement_action_counts;
            }
            return result;
        }

        let cost_entity = budget_cost(self.policy.cost_medium);
        let cost_scope = budget_cost(self.policy.cost_medium);
        let cost_capability = budget_cost(self.policy.cost_coarse);
        let cost_rule = budget_cost(self.policy.cost_coarse);
        let cost_enforcement = budget_cost(self.policy.cost_coarse);

        let mut flags = 0u32;
        let mut refusal_reason = RefusalReason::None;
        let mut result = ResolveResult::default();
        let mut enforcement_capacity_total = Q48_16::ZERO;
        let mut resource_budget_total = Q48_16::ZERO;
        let mut legitimacy_sum: i64 = 0;

        for entity in &self.entities {
            if region_id != 0 && entity.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(entity.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_entity) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            enforcement_capacity_total = enforcement_capacity_total.add(entity.enforcement_capacity);
            resource_budget_total = resource_budget_total.add(entity.resource_budget);
            legitimacy_sum += entity.legitimacy_level.0 as i64;
            result.entity_count += 1;
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
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.scope_count += 1;
        }

        for capability in &self.capabilities {
            if region_id != 0 && capability.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(capability.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_capability) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.capability_count += 1;
        }

        for rule in &self.rules {
            if region_id != 0 && rule.region_id != region_id {
                continue;
            }
            if region_id == 0 && self.region_collapsed(rule.region_id) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_rule) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.rule_count += 1;
        }

        let collapsed_regions: Vec<u32> = self.capsules.iter().map(|c| c.region_id).collect();
        for enforcement in &mut self.enforcements {
            let region = enforcement.region_id;
            if region_id != 0 && region != region_id {
                continue;
            }
            if region_id == 0 && collapsed_regions.contains(&region) {
                flags |= RESOLVE_PARTIAL;
                continue;
            }
            if !budget.consume(cost_enforcement) {
                flags |= RESOLVE_PARTIAL;
                if refusal_reason == RefusalReason::None {
                    refusal_reason = RefusalReason::Budget;
                }
                break;
            }
            result.enforcement_count += 1;

            if enforcement.flags & ENFORCEMENT_APPLIED != 0 {
                continue;
            }
            if enforcement.event_tick > tick {
                continue;
            }
            enforcement.flags |= ENFORCEMENT_APPLIED;
            result.enforcement_applied_count += 1;
            result.enforcement_action_counts[enforcement.action.action_bin()] += 1;
        }

        result.ok = true;
        result.refusal_reason = refusal_reason;
        if result.enforcement_applied_count > 0 {
            flags |= RESOLVE_EVENTS_APPLIED;
        }
        result.flags = flags;

        if result.entity_count > 0 {
            result.averages.enforcement_capacity_avg =
                enforcement_capacity_total.div(Q48_16::from_int(result.entity_count as i64));
            result.averages.resource_budget_avg =
                resource_budget_total.div(Q48_16::from_int(result.entity_count as i64));
            result.averages.legitimacy_avg =
                clamp_ratio(Q16_16((legitimacy_sum / result.entity_count as i64) as i32));
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
            entity_count: 0,
            scope_count: 0,
            capability_count: 0,
            rule_count: 0,
            enforcement_count: 0,
            averages: RegionAverages::default(),
            legitimacy_hist: [Q16_16::ZERO; HIST_BINS],
            enforcement_action_counts: [0; ACTION_BINS],
        };

        let mut enforcement_capacity_total = Q48_16::ZERO;
        let mut resource_budget_total = Q48_16::ZERO;
        let mut legitimacy_sum: i64 = 0;
        let mut legitimacy_bins = [0u32; HIST_BINS];

        for entity in self.entities.iter().filter(|e| e.region_id == region_id) {
            capsule.entity_count += 1;
            enforcement_capacity_total = enforcement_capacity_total.add(entity.enforcement_capacity);
            resource_budget_total = resource_budget_total.add(entity.resource_budget);
            legitimacy_sum += entity.legitimacy_level.0 as i64;
            legitimacy_bins[hist_bin(entity.legitimacy_level)] += 1;
        }
        capsule.scope_count =
            self.scopes.iter().filter(|s| s.region_id == region_id).count() as u32;
        capsule.capability_count =
            self.capabilities.iter().filter(|c| c.region_id == region_id).count() as u32;
        capsule.rule_count = self.rules.iter().filter(|r| r.region_id == region_id).count() as u32;
        for enforcement in self.enforcements.iter().filter(|e| e.region_id == region_id) {
            capsule.enforcement_count += 1;
            capsule.enforcement_action_counts[enforcement.action.action_bin()] += 1;
        }

        if capsule.entity_count > 0 {
            let count = Q48_16::from_int(capsule.entity_count as i64);
            capsule.averages.enforcement_capacity_avg = enforcement_capacity_total.div(count);
            capsule.averages.resource_budget_avg = resource_budget_total.div(count);
            capsule.averages.legitimacy_avg =
                clamp_ratio(Q16_16((legitimacy_sum / capsule.entity_count as i64) as i32));
        }
        for bin in 0..HIST_BINS {
            capsule.legitimacy_hist[bin] = ratio_from_counts(legitimacy_bins[bin], capsule.entity_count);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u32, region: u32, legitimacy: i32) -> Entity {
        Entity {
            entity_id: id,
            scope_id: 0,
            authority_types: Vec::new(),
            enforcement_capacity: Q48_16::from_int(10),
            resource_budget: Q48_16::from_int(20),
            legitimacy_level: Q16_16(legitimacy),
            legitimacy_ref_id: 0,
            knowledge_base_id: 0,
            provenance_id: 0,
            region_id: region,
            flags: 0,
        }
    }

    fn enforcement(id: u32, rule_id: u32, region: u32, tick: u64, action: EnforcementAction) -> Enforcement {
        Enforcement {
            enforcement_id: id,
            entity_id: 0,
            rule_id,
            process_family_id: 0,
            agent_id: 0,
            action,
            event_tick: tick,
            provenance_id: 0,
            region_id: region,
            flags: 0,
        }
    }

    fn rule(id: u32, region: u32) -> Rule {
        Rule {
            rule_id: id,
            entity_id: 0,
            scope_id: 0,
            process_family_id: 0,
            subject_domain_id: 0,
            authority_type_id: 0,
            action: RuleAction::Allow,
            license_required_id: 0,
            provenance_id: 0,
            region_id: region,
            flags: 0,
        }
    }

    #[test]
    fn entity_query_missing_refuses_with_generic_no_source() {
        let domain = InstitutionDomain::new(vec![entity(1, 1, 0)], vec![], vec![], vec![], vec![]);
        let mut budget = Budget::new(100);
        let sample = domain.entity_query(99, &mut budget);
        assert_eq!(sample.meta.refusal_reason, RefusalReason::NoSource);
    }

    #[test]
    fn entity_query_hit_is_exact() {
        let domain = InstitutionDomain::new(vec![entity(1, 1, 100)], vec![], vec![], vec![], vec![]);
        let mut budget = Budget::new(100);
        let sample = domain.entity_query(1, &mut budget);
        assert!(sample.meta.is_ok());
        assert_eq!(sample.meta.confidence, Confidence::Exact);
        assert_eq!(sample.record.unwrap().legitimacy_level, Q16_16(100));
    }

    #[test]
    fn region_query_averages_legitimacy_by_raw_division() {
        let domain = InstitutionDomain::new(
            vec![entity(1, 7, 30000), entity(2, 7, 10000)],
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let mut budget = Budget::new(1000);
        let sample = domain.region_query(7, &mut budget);
        assert_eq!(sample.entity_count, 2);
        assert_eq!(sample.averages.legitimacy_avg, Q16_16(20000));
    }

    #[test]
    fn resolve_applies_enforcement_idempotently() {
        let mut domain = InstitutionDomain::new(
            vec![entity(1, 7, 0)],
            vec![],
            vec![],
            vec![rule(5, 7)],
            vec![enforcement(1, 5, 7, 10, EnforcementAction::Deny)],
        );
        let mut budget = Budget::new(1000);
        let first = domain.resolve(7, 20, 1, &mut budget);
        assert_eq!(first.enforcement_applied_count, 1);
        assert_eq!(first.enforcement_action_counts[1], 1);

        let second = domain.resolve(7, 20, 1, &mut budget);
        assert_eq!(second.enforcement_applied_count, 0, "already-applied events must not re-apply");
    }

    #[test]
    fn resolve_does_not_apply_future_events() {
        let mut domain = InstitutionDomain::new(
            vec![entity(1, 7, 0)],
            vec![],
            vec![],
            vec![rule(5, 7)],
            vec![enforcement(1, 5, 7, 100, EnforcementAction::Deny)],
        );
        let mut budget = Budget::new(1000);
        let result = domain.resolve(7, 20, 1, &mut budget);
        assert_eq!(result.enforcement_applied_count, 0);
    }

    #[test]
    fn collapse_then_query_is_unknown_confidence_and_expand_restores_exact() {
        let mut domain = InstitutionDomain::new(vec![entity(1, 7, 100)], vec![], vec![], vec![], vec![]);
        assert!(domain.collapse_region(7));
        let mut budget = Budget::new(1000);
        let collapsed = domain.entity_query(1, &mut budget);
        assert_eq!(collapsed.flags, ENTITY_COLLAPSED);
        assert_eq!(collapsed.meta.confidence, Confidence::Unknown);

        assert!(domain.expand_region(7));
        let restored = domain.entity_query(1, &mut budget);
        assert_eq!(restored.meta.confidence, Confidence::Exact);
    }

    #[test]
    fn collapse_is_not_reentrant() {
        let mut domain = InstitutionDomain::new(vec![entity(1, 7, 0)], vec![], vec![], vec![], vec![]);
        assert!(domain.collapse_region(7));
        assert!(!domain.collapse_region(7));
        assert_eq!(domain.capsule_count(), 1);
    }
}
