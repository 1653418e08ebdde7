//! Tag classes and filtering.
//!
//! A tag written at a location is Local there, an Ancestor tag of every
//! location below it and a Descendant tag of every location above it.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::util::Name;

/// Prefix of the tag synthesized for locations carrying an object.
pub const OBJECT_TYPE_TAG_PREFIX: &str = "ObjectType:";

/// Bit set selecting tag classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TagFilter(u8);

impl TagFilter {
    pub const DESCENDANT: Self = Self(1);
    pub const LOCAL: Self = Self(2);
    pub const ANCESTOR: Self = Self(4);
    pub const EVERY: Self = Self(7);

    /// Build from raw bits; unknown bits are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 7)
    }

    #[inline]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TagFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TagFilter {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::DESCENDANT) {
            parts.push("DESCENDANT");
        }
        if self.contains(Self::LOCAL) {
            parts.push("LOCAL");
        }
        if self.contains(Self::ANCESTOR) {
            parts.push("ANCESTOR");
        }
        write!(f, "TagFilter({})", parts.join(" | "))
    }
}

/// `ObjectType:<TypeName>` tag for an object type.
pub fn object_type_tag(type_name: &str) -> Name {
    Name::from(format!("{OBJECT_TYPE_TAG_PREFIX}{type_name}"))
}

/// Tag set with stable ordering.
pub type TagSet = BTreeSet<Name>;
