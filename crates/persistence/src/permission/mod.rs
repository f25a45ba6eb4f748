//! Row-level, group-based permission model.
//!
//! - [`PermissionCode`] - packed owner/group/guest capability bitmask
//! - [`PermissionInstance`] - one object's owner, groups and code, with the
//!   capability predicates
//! - [`PermissionResolver`] - builds a [`PermissionInstance`] for a row
//!
//! A capability is granted when the requesting actor owns the object and the
//! owner scope allows it, or shares a group with the object and that
//! membership's group scope allows it, or when the guest scope allows it.

mod code;
mod instance;
mod resolver;

pub use code::{Capability, PermissionCode, Scope};
pub use instance::{Actor, GroupPermission, PermissionInstance};
pub use resolver::PermissionResolver;
