//! File attribute bits.

use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

/// File attribute bits, laid out like the Windows `FILE_ATTRIBUTE_*` flags.
///
/// Snapshots and operations carry these verbatim so a script built on one
/// host can be inspected or executed on another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(pub u32);

impl Attributes {
    pub const NONE: Self = Self(0);
    pub const READONLY: Self = Self(0x0001);
    pub const HIDDEN: Self = Self(0x0002);
    pub const SYSTEM: Self = Self(0x0004);
    pub const DIRECTORY: Self = Self(0x0010);
    pub const ARCHIVE: Self = Self(0x0020);
    pub const REPARSE_POINT: Self = Self(0x0400);
    pub const COMPRESSED: Self = Self(0x0800);
    pub const ENCRYPTED: Self = Self(0x4000);

    /// Create attributes from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check if any bit of `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Hidden or system.
    pub const fn is_protected(self) -> bool {
        self.intersects(Self(Self::HIDDEN.0 | Self::SYSTEM.0))
    }

    pub const fn is_reparse_point(self) -> bool {
        self.contains(Self::REPARSE_POINT)
    }

    /// Return a copy with `other` cleared.
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Return a copy with `other` set.
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Attributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Attributes {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Attributes {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl std::fmt::Display for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const LETTERS: [(Attributes, char); 8] = [
            (Attributes::READONLY, 'R'),
            (Attributes::HIDDEN, 'H'),
            (Attributes::SYSTEM, 'S'),
            (Attributes::DIRECTORY, 'D'),
            (Attributes::ARCHIVE, 'A'),
            (Attributes::REPARSE_POINT, 'L'),
            (Attributes::COMPRESSED, 'C'),
            (Attributes::ENCRYPTED, 'E'),
        ];

        for (flag, letter) in LETTERS {
            if self.contains(flag) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected() {
        assert!(Attributes::HIDDEN.is_protected());
        assert!((Attributes::SYSTEM | Attributes::ARCHIVE).is_protected());
        assert!(!Attributes::READONLY.is_protected());
    }

    #[test]
    fn test_without_clears_only_requested_bits() {
        let attrs = Attributes::READONLY | Attributes::ARCHIVE;
        assert_eq!(attrs.without(Attributes::READONLY), Attributes::ARCHIVE);
        assert_eq!(attrs & !Attributes::READONLY, Attributes::ARCHIVE);
    }

    #[test]
    fn test_display_letters() {
        let attrs = Attributes::READONLY | Attributes::HIDDEN | Attributes::ARCHIVE;
        assert_eq!(attrs.to_string(), "RHA");
        assert_eq!(Attributes::NONE.to_string(), "");
    }
}
