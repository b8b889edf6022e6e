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

//! Authority tokens: opaque, read-only capability handles the core
//! consumes but never mints or validates. A three-bit mutation-class set
//! does not earn a `bitflags` dependency; plain `u8` constants and a
//! couple of accessor methods are enough.

/// Whether a token's holder may only read, or may also mutate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    ReadOnly,
    Mutating,
}

pub const MUTATION_TRANSFORMATIVE: u8 = 1 << 0;
pub const MUTATION_TRANSACTIONAL: u8 = 1 << 1;
pub const MUTATION_EPISTEMIC: u8 = 1 << 2;

/// `(jurisdiction, domain, mutation-class mask, audit-identity)`. Carried
/// by read-only reference; the core never constructs or checks one — an
/// embedder's authorization layer does.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuthorityToken {
    pub jurisdiction_id: u64,
    pub domain_id: u64,
    pub kind: TokenKind,
    pub mutation_mask: u8,
    pub audit_identity: u64,
}

impl AuthorityToken {
    pub fn new(
        jurisdiction_id: u64,
        domain_id: u64,
        kind: TokenKind,
        mutation_mask: u8,
        audit_identity: u64,
    ) -> AuthorityToken {
        AuthorityToken {
            jurisdiction_id,
            domain_id,
            kind,
            mutation_mask,
            audit_identity,
        }
    }

    /// A read-only token permits nothing; a mutating token permits `class`
    /// iff its bit is set in the mask.
    pub fn permits(&self, class: u8) -> bool {
        matches!(self.kind, TokenKind::Mutating) && (self.mutation_mask & class) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_token_permits_nothing() {
        let token = AuthorityToken::new(1, 2, TokenKind::ReadOnly, MUTATION_TRANSFORMATIVE, 9);
        assert!(!token.permits(MUTATION_TRANSFORMATIVE));
    }

    #[test]
    fn mutating_token_checks_mask_bits() {
        let token = AuthorityToken::new(
            1,
            2,
            TokenKind::Mutating,
            MUTATION_TRANSACTIONAL | MUTATION_EPISTEMIC,
            9,
        );
        assert!(token.permits(MUTATION_TRANSACTIONAL));
        assert!(token.permits(MUTATION_EPISTEMIC));
        assert!(!token.permits(MUTATION_TRANSFORMATIVE));
    }
}
