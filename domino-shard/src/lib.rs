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

//! Deterministic domain-driven shard mapping and partitioning.

mod index;
mod mapper;

pub use index::{ShardAssignment, ShardDomainIndex, SIMULATION_ALLOWED, STREAMING_ALLOWED, WHOLE_DOMAIN};
pub use mapper::{
    shard_map, shard_streaming_allowed, PartitionParams, ShardInput, ALLOW_SIMULATION,
    ALLOW_SPLIT, ALLOW_STREAMING,
};
