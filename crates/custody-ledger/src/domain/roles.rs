//! # Role Registry
//!
//! Maps each identity to exactly one role. Only the registry owner, fixed at
//! construction, may grant roles.
//!
//! Besides the identity → role table, the registry keeps:
//! - a role → identities index, updated on every grant, so the owner can list
//!   assignments without replaying anything
//! - the append-only grant log, for callers that still want to replay grants
//!   from genesis

use super::entities::{RoleAssignment, RoleGrant};
use super::value_objects::{Identity, Role, RoleCode, Timestamp};
use crate::errors::{LedgerError, UnauthorizedReason};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Owner-administered identity → role table.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    owner: Identity,
    roles: HashMap<Identity, Role>,
    members: BTreeMap<Role, BTreeSet<Identity>>,
    grants: Vec<RoleGrant>,
}

impl RoleRegistry {
    /// Create an empty registry administered by `owner`.
    #[must_use]
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            roles: HashMap::new(),
            members: BTreeMap::new(),
            grants: Vec::new(),
        }
    }

    /// The fixed administrator identity.
    #[must_use]
    pub fn owner(&self) -> Identity {
        self.owner
    }

    /// Role of `identity`; `Role::None` when never granted.
    #[must_use]
    pub fn role_of(&self, identity: &Identity) -> Role {
        self.roles.get(identity).copied().unwrap_or_default()
    }

    /// Validate a grant without applying it.
    ///
    /// # Errors
    /// - `Unauthorized` if `caller` is not the registry owner
    /// - `InvalidRole` if `role_code` is outside the enumeration
    pub fn check_grant(&self, caller: &Identity, role_code: RoleCode) -> Result<Role, LedgerError> {
        if *caller != self.owner {
            return Err(LedgerError::Unauthorized {
                reason: UnauthorizedReason::NotRegistryOwner { caller: *caller },
            });
        }
        Role::from_code(role_code).ok_or(LedgerError::InvalidRole(role_code))
    }

    /// Grant `role_code` to `identity`, overwriting any previous role.
    ///
    /// Granting `Role::None` revokes: the identity leaves every role set.
    pub fn grant(
        &mut self,
        caller: &Identity,
        identity: Identity,
        role_code: RoleCode,
        now: Timestamp,
    ) -> Result<RoleGrant, LedgerError> {
        let role = self.check_grant(caller, role_code)?;
        Ok(self.apply_grant(identity, role, now))
    }

    /// Apply an already-authorized grant. Used by `grant` and by snapshot
    /// restore, which replays a log that was authorized when first written.
    pub(crate) fn apply_grant(&mut self, identity: Identity, role: Role, now: Timestamp) -> RoleGrant {
        let previous = self.roles.insert(identity, role).unwrap_or_default();
        if previous != Role::None {
            if let Some(set) = self.members.get_mut(&previous) {
                set.remove(&identity);
                if set.is_empty() {
                    self.members.remove(&previous);
                }
            }
        }
        if role == Role::None {
            self.roles.remove(&identity);
        } else {
            self.members.entry(role).or_default().insert(identity);
        }

        let grant = RoleGrant {
            sequence: self.grants.len() as u64,
            identity,
            role,
            granted_at: now,
        };
        self.grants.push(grant.clone());
        grant
    }

    /// Identities currently holding `role`, in identity order.
    #[must_use]
    pub fn members_of(&self, role: Role) -> Vec<Identity> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every identity with a role other than `None`, grouped by role.
    #[must_use]
    pub fn assignments(&self) -> Vec<RoleAssignment> {
        self.members
            .iter()
            .flat_map(|(role, set)| {
                set.iter().map(move |identity| RoleAssignment {
                    identity: *identity,
                    role: *role,
                })
            })
            .collect()
    }

    /// The grant log from genesis, oldest first.
    #[must_use]
    pub fn grants(&self) -> &[RoleGrant] {
        &self.grants
    }
}
