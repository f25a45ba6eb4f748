//! Resolved permissions of one object and the actors asking about them.

use serde::{Deserialize, Serialize};

use super::code::{Capability, PermissionCode, Scope};

/// A group an object is reachable through.
///
/// `object_reference_id` always names the protected object, even when the
/// membership row (`relation_reference_id`) is a different row. `permission`
/// is the relation permission of that membership, not the object's own code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermission {
    pub group_reference_id: String,
    pub object_reference_id: String,
    pub relation_reference_id: String,
    pub permission: PermissionCode,
}

/// The identity attached to a request.
///
/// An empty reference id is the anonymous guest. Group memberships are
/// resolved once when the actor is authenticated and do not change for the
/// rest of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub reference_id: String,
    pub groups: Vec<GroupPermission>,
}

impl Actor {
    /// The anonymous actor.
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn new(reference_id: impl Into<String>, groups: Vec<GroupPermission>) -> Self {
        Self {
            reference_id: reference_id.into(),
            groups,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.reference_id.is_empty()
    }
}

/// The owner, groups and permission code of one object, resolved for a single
/// authorization question.
///
/// Capability checks are additive: a capability is granted if the owner scope,
/// any shared group's group scope, or the guest scope grants it. Nothing
/// revokes a grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionInstance {
    pub owner_reference_id: Option<String>,
    pub groups: Vec<GroupPermission>,
    pub permission: PermissionCode,
}

impl PermissionInstance {
    /// The instance every failed lookup resolves to. It grants nothing.
    pub fn denied() -> Self {
        Self::default()
    }

    pub fn new(
        owner_reference_id: Option<String>,
        groups: Vec<GroupPermission>,
        permission: PermissionCode,
    ) -> Self {
        Self {
            owner_reference_id: owner_reference_id.filter(|o| !o.is_empty()),
            groups,
            permission,
        }
    }

    /// Checks `capability` for an actor, owner scope first, then shared
    /// groups, then guest.
    pub fn check(
        &self,
        actor_reference_id: &str,
        actor_groups: &[GroupPermission],
        capability: Capability,
    ) -> bool {
        if !actor_reference_id.is_empty()
            && self.owner_reference_id.as_deref() == Some(actor_reference_id)
            && self.permission.has(Scope::Owner, capability)
        {
            return true;
        }

        let via_group = actor_groups
            .iter()
            .filter(|g| !g.group_reference_id.is_empty())
            .any(|actor_group| {
                self.groups.iter().any(|object_group| {
                    object_group.group_reference_id == actor_group.group_reference_id
                        && object_group.permission.has(Scope::Group, capability)
                })
            });
        if via_group {
            return true;
        }

        self.permission.has(Scope::Guest, capability)
    }

    /// [`check`](Self::check) for an [`Actor`].
    pub fn allows(&self, actor: &Actor, capability: Capability) -> bool {
        self.check(&actor.reference_id, &actor.groups, capability)
    }

    /// True when `actor` is the recorded owner. Guests never own anything.
    pub fn is_owned_by(&self, actor: &Actor) -> bool {
        !actor.is_guest() && self.owner_reference_id.as_deref() == Some(actor.reference_id.as_str())
    }

    pub fn can_peek(&self, actor_reference_id: &str, actor_groups: &[GroupPermission]) -> bool {
        self.check(actor_reference_id, actor_groups, Capability::PEEK)
    }

    pub fn can_read(&self, actor_reference_id: &str, actor_groups: &[GroupPermission]) -> bool {
        self.check(actor_reference_id, actor_groups, Capability::READ)
    }

    pub fn can_create(&self, actor_reference_id: &str, actor_groups: &[GroupPermission]) -> bool {
        self.check(actor_reference_id, actor_groups, Capability::CREATE)
    }

    pub fn can_update(&self, actor_reference_id: &str, actor_groups: &[GroupPermission]) -> bool {
        self.check(actor_reference_id, actor_groups, Capability::UPDATE)
    }

    pub fn can_delete(&self, actor_reference_id: &str, actor_groups: &[GroupPermission]) -> bool {
        self.check(actor_reference_id, actor_groups, Capability::DELETE)
    }

    pub fn can_execute(&self, actor_reference_id: &str, actor_groups: &[GroupPermission]) -> bool {
        self.check(actor_reference_id, actor_groups, Capability::EXECUTE)
    }
}
