//! The packed permission bitmask.
//!
//! A [`PermissionCode`] holds three independent 6-bit capability fields, one
//! per [`Scope`]:
//!
//! | Bits | Scope |
//! |------|-------|
//! | 0-5 | Guest |
//! | 6-11 | Group |
//! | 12-17 | Owner |
//!
//! Within each field the capabilities occupy the same positions:
//!
//! | Bit | Capability |
//! |-----|------------|
//! | 0 | peek |
//! | 1 | read |
//! | 2 | create |
//! | 3 | update |
//! | 4 | delete |
//! | 5 | execute |
//!
//! Bits above 17 and negative stored values are inert: they decode to a code
//! without the undefined bits rather than producing an error.
//!
//! # Examples
//!
//! ```
//! use tabula_persistence::permission::{Capability, PermissionCode, Scope};
//!
//! let code = PermissionCode::new(
//!     Capability::NONE,
//!     Capability::PEEK | Capability::READ,
//!     Capability::ALL,
//! );
//! assert!(code.has(Scope::Group, Capability::READ));
//! assert!(!code.has(Scope::Guest, Capability::PEEK));
//! assert_eq!(PermissionCode::from_i64(code.to_i64()), code);
//! ```

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Width of one scope field in bits.
const SCOPE_WIDTH: u32 = 6;

/// Mask covering all three scope fields.
const CODE_MASK: u32 = (1 << (SCOPE_WIDTH * 3)) - 1;

/// A set of capabilities held at a single scope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(u8);

/// Capability name mappings, in bit order.
const CAPABILITY_NAMES: &[(&str, Capability)] = &[
    ("peek", Capability::PEEK),
    ("read", Capability::READ),
    ("create", Capability::CREATE),
    ("update", Capability::UPDATE),
    ("delete", Capability::DELETE),
    ("execute", Capability::EXECUTE),
];

impl Capability {
    pub const NONE: Self = Self(0);
    pub const PEEK: Self = Self(1);
    pub const READ: Self = Self(1 << 1);
    pub const CREATE: Self = Self(1 << 2);
    pub const UPDATE: Self = Self(1 << 3);
    pub const DELETE: Self = Self(1 << 4);
    pub const EXECUTE: Self = Self(1 << 5);
    pub const ALL: Self = Self((1 << SCOPE_WIDTH) - 1);

    /// Builds a capability set, discarding bits outside the defined set.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if no capability is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every capability in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the lowercase names of the capabilities in this set.
    pub fn names(self) -> Vec<&'static str> {
        CAPABILITY_NAMES
            .iter()
            .filter(|(_, cap)| self.contains(*cap))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Parses a comma or pipe separated list of capability names.
    ///
    /// Unknown names are ignored, matching the treatment of undefined bits.
    pub fn from_names(names: &str) -> Self {
        names
            .split([',', '|'])
            .map(|n| n.trim().to_ascii_lowercase())
            .filter_map(|n| {
                CAPABILITY_NAMES
                    .iter()
                    .find(|(name, _)| *name == n)
                    .map(|(_, cap)| *cap)
            })
            .fold(Self::NONE, Self::union)
    }
}

impl BitOr for Capability {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Capability {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", self.names().join("|"))
    }
}

/// To whom a capability is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The actor that owns the object.
    Owner,
    /// Actors sharing a group with the object.
    Group,
    /// Everyone, including anonymous actors.
    Guest,
}

impl Scope {
    const fn shift(self) -> u32 {
        match self {
            Scope::Guest => 0,
            Scope::Group => SCOPE_WIDTH,
            Scope::Owner => SCOPE_WIDTH * 2,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Owner => write!(f, "owner"),
            Scope::Group => write!(f, "group"),
            Scope::Guest => write!(f, "guest"),
        }
    }
}

/// Capabilities for all three scopes packed into one integer.
///
/// Stored as the `permission` column of every governed table and of every
/// group membership row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct PermissionCode(u32);

impl PermissionCode {
    /// No capability at any scope.
    pub const NONE: Self = Self(0);

    /// Every capability at every scope.
    pub const ALLOW_ALL: Self = Self::new(Capability::ALL, Capability::ALL, Capability::ALL);

    /// Applied to new rows of tables that configure nothing else.
    pub const DEFAULT_ROW: Self = Self::new(
        Capability::NONE,
        Capability::PEEK.union(Capability::READ).union(Capability::EXECUTE),
        Capability::ALL,
    );

    /// Applied to usergroup rows and to the memberships synthesized for them.
    pub const DEFAULT_GROUP: Self = Self::new(
        Capability::NONE,
        Capability::PEEK.union(Capability::READ).union(Capability::EXECUTE),
        Capability::ALL,
    );

    /// Applied to sites without an explicit permission: publicly executable.
    pub const DEFAULT_SITE: Self = Self::new(
        Capability::PEEK.union(Capability::EXECUTE),
        Capability::PEEK.union(Capability::READ).union(Capability::EXECUTE),
        Capability::ALL,
    );

    /// Applied to the world metadata rows describing tables.
    pub const DEFAULT_TABLE: Self = Self::new(
        Capability::PEEK.union(Capability::READ),
        Capability::PEEK.union(Capability::READ).union(Capability::CREATE),
        Capability::ALL,
    );

    /// Packs guest, group and owner capabilities into one code.
    pub const fn new(guest: Capability, group: Capability, owner: Capability) -> Self {
        Self(
            (guest.0 as u32) << Scope::Guest.shift()
                | (group.0 as u32) << Scope::Group.shift()
                | (owner.0 as u32) << Scope::Owner.shift(),
        )
    }

    /// Returns the capabilities held at `scope`.
    pub const fn scope(self, scope: Scope) -> Capability {
        Capability::from_bits_truncate((self.0 >> scope.shift()) as u8)
    }

    /// Returns true if `scope` holds every capability in `capability`.
    ///
    /// Asking for [`Capability::NONE`] is never granted.
    pub const fn has(self, scope: Scope, capability: Capability) -> bool {
        !capability.is_empty() && self.scope(scope).contains(capability)
    }

    /// Returns a copy with `capability` added at `scope`.
    pub const fn with(self, scope: Scope, capability: Capability) -> Self {
        Self(self.0 | (capability.0 as u32) << scope.shift())
    }

    /// Bitwise union of two codes.
    pub const fn combine(a: Self, b: Self) -> Self {
        Self(a.0 | b.0)
    }

    /// Decodes a stored integer. Negative values decode to [`PermissionCode::NONE`]
    /// and bits outside the three scope fields are dropped.
    pub const fn from_i64(value: i64) -> Self {
        if value < 0 {
            return Self::NONE;
        }
        Self((value & CODE_MASK as i64) as u32)
    }

    /// Encodes the code for storage.
    pub const fn to_i64(self) -> i64 {
        self.0 as i64
    }

    /// Decodes a stored JSON value.
    ///
    /// Integers, floats (truncated toward zero) and numeric strings are
    /// accepted. Returns `None` for anything else, which callers treat as a
    /// malformed permission value.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::from_i64(i))
                } else if let Some(u) = n.as_u64() {
                    // Larger than i64::MAX; only the undefined high bits differ.
                    Some(Self((u & CODE_MASK as u64) as u32))
                } else {
                    n.as_f64().and_then(Self::from_f64)
                }
            }
            serde_json::Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .map(Self::from_i64)
                    .or_else(|| s.parse::<f64>().ok().and_then(Self::from_f64))
            }
            _ => None,
        }
    }

    fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self::from_i64(value.trunc() as i64))
    }
}

impl From<i64> for PermissionCode {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<PermissionCode> for i64 {
    fn from(code: PermissionCode) -> Self {
        code.to_i64()
    }
}

impl BitOr for PermissionCode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::combine(self, rhs)
    }
}

impl fmt::Debug for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionCode")
            .field("guest", &self.scope(Scope::Guest))
            .field("group", &self.scope(Scope::Group))
            .field("owner", &self.scope(Scope::Owner))
            .finish()
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_layout() {
        let code = PermissionCode::new(Capability::PEEK, Capability::READ, Capability::DELETE);
        assert_eq!(code.to_i64(), 1 | (2 << 6) | (16 << 12));
        assert_eq!(code.scope(Scope::Guest), Capability::PEEK);
        assert_eq!(code.scope(Scope::Group), Capability::READ);
        assert_eq!(code.scope(Scope::Owner), Capability::DELETE);
    }

    #[test]
    fn test_scopes_are_independent() {
        let code = PermissionCode::new(Capability::NONE, Capability::NONE, Capability::ALL);
        assert!(code.has(Scope::Owner, Capability::READ));
        assert!(!code.has(Scope::Group, Capability::READ));
        assert!(!code.has(Scope::Guest, Capability::READ));
    }

    #[test]
    fn test_has_requires_every_bit() {
        let code = PermissionCode::NONE.with(Scope::Group, Capability::READ);
        assert!(code.has(Scope::Group, Capability::READ));
        assert!(!code.has(Scope::Group, Capability::READ | Capability::UPDATE));
        assert!(!code.has(Scope::Group, Capability::NONE));
    }

    #[test]
    fn test_combine_is_union() {
        let a = PermissionCode::NONE.with(Scope::Guest, Capability::PEEK);
        let b = PermissionCode::NONE.with(Scope::Owner, Capability::UPDATE);
        let c = PermissionCode::combine(a, b);
        assert!(c.has(Scope::Guest, Capability::PEEK));
        assert!(c.has(Scope::Owner, Capability::UPDATE));
        assert_eq!(a | b, c);
    }

    #[test]
    fn test_negative_decodes_to_none() {
        assert_eq!(PermissionCode::from_i64(-1), PermissionCode::NONE);
        assert_eq!(PermissionCode::from_i64(i64::MIN), PermissionCode::NONE);
    }

    #[test]
    fn test_undefined_bits_are_inert() {
        let code = PermissionCode::from_i64((1 << 40) | (1 << 18) | 2);
        assert_eq!(code, PermissionCode::NONE.with(Scope::Guest, Capability::READ));
        assert_eq!(Capability::from_bits_truncate(0xff), Capability::ALL);
    }

    #[test]
    fn test_from_value_variants() {
        let expected = PermissionCode::from_i64(4097);
        assert_eq!(PermissionCode::from_value(&json!(4097)), Some(expected));
        assert_eq!(PermissionCode::from_value(&json!(4097.0)), Some(expected));
        assert_eq!(PermissionCode::from_value(&json!("4097")), Some(expected));
        assert_eq!(PermissionCode::from_value(&json!(" 4097.9 ")), Some(expected));
        assert_eq!(PermissionCode::from_value(&json!(-5)), Some(PermissionCode::NONE));
    }

    #[test]
    fn test_from_value_malformed() {
        assert_eq!(PermissionCode::from_value(&json!("all")), None);
        assert_eq!(PermissionCode::from_value(&json!(true)), None);
        assert_eq!(PermissionCode::from_value(&json!(null)), None);
        assert_eq!(PermissionCode::from_value(&json!({"owner": 1})), None);
    }

    #[test]
    fn test_serde_as_integer() {
        let code = PermissionCode::new(Capability::PEEK, Capability::NONE, Capability::READ);
        let value = serde_json::to_value(code).unwrap();
        assert_eq!(value, json!(code.to_i64()));
        let back: PermissionCode = serde_json::from_value(value).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn test_capability_names() {
        let caps = Capability::from_names("read, Update|bogus");
        assert_eq!(caps, Capability::READ | Capability::UPDATE);
        assert_eq!(caps.names(), vec!["read", "update"]);
        assert_eq!(Capability::NONE.to_string(), "none");
    }

    #[test]
    fn test_default_row_denies_guests() {
        let code = PermissionCode::DEFAULT_ROW;
        assert!(!code.has(Scope::Guest, Capability::PEEK));
        assert!(code.has(Scope::Group, Capability::READ));
        assert!(code.has(Scope::Owner, Capability::DELETE));
    }
}
