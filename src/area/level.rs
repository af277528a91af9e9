/// Administrative level definitions
///
/// This module defines the five depths of the division hierarchy and the
/// identifier bit-field each of them owns.
use std::fmt;

/// Represents one administrative depth of the division tree
///
/// Levels are ordered by depth: a child is always deeper than its parent,
/// though not always by exactly one level (some cities list towns directly),
/// and `Village` is always a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AreaLevel {
    /// 省级: provinces, autonomous regions and municipalities
    Province = 1,

    /// 地级: prefecture-level cities
    City = 2,

    /// 县级: counties and districts
    County = 3,

    /// 乡级: towns, townships and sub-districts
    Town = 4,

    /// 村级: villages and neighbourhood committees
    Village = 5,
}

impl AreaLevel {
    /// Returns the numeric level (1 for Province through 5 for Village)
    pub fn depth(&self) -> u8 {
        *self as u8
    }

    /// Returns the lowest bit of this level's identifier field
    pub fn bit_offset(&self) -> u32 {
        match self {
            Self::Province => 48,
            Self::City => 36,
            Self::County => 24,
            Self::Town => 12,
            Self::Village => 0,
        }
    }

    /// Returns the width of this level's identifier field in bits
    pub fn bit_width(&self) -> u32 {
        match self {
            Self::Province => 16,
            _ => 12,
        }
    }

    /// The multiplier applied to `sibling_index + 1` for this level
    pub fn base_value(&self) -> u64 {
        1u64 << self.bit_offset()
    }

    /// The largest `sibling_index + 1` that fits in this level's field
    pub fn capacity(&self) -> u64 {
        (1u64 << self.bit_width()) - 1
    }

    /// Returns the level one step deeper, or None for Village
    pub fn child(&self) -> Option<Self> {
        match self {
            Self::Province => Some(Self::City),
            Self::City => Some(Self::County),
            Self::County => Some(Self::Town),
            Self::Town => Some(Self::Village),
            Self::Village => None,
        }
    }

    /// Returns the level one step shallower, or None for Province
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::Province => None,
            Self::City => Some(Self::Province),
            Self::County => Some(Self::City),
            Self::Town => Some(Self::County),
            Self::Village => Some(Self::Town),
        }
    }

    /// Parses a level from its numeric depth
    pub fn from_depth(depth: u8) -> Option<Self> {
        match depth {
            1 => Some(Self::Province),
            2 => Some(Self::City),
            3 => Some(Self::County),
            4 => Some(Self::Town),
            5 => Some(Self::Village),
            _ => None,
        }
    }

    /// Returns all levels from the root down
    pub fn all() -> [Self; 5] {
        [
            Self::Province,
            Self::City,
            Self::County,
            Self::Town,
            Self::Village,
        ]
    }
}

impl fmt::Display for AreaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Province => "province",
            Self::City => "city",
            Self::County => "county",
            Self::Town => "town",
            Self::Village => "village",
        };
        f.pad(s)
    }
}
