//! Bit-packed area identifiers
//!
//! Every level owns a disjoint slice of a `u64`, filled from the most
//! significant end as depth increases:
//!
//! | Level    | Bits  | Max siblings per page |
//! |----------|-------|-----------------------|
//! | Province | 48–63 | 65535                 |
//! | City     | 36–47 | 4095                  |
//! | County   | 24–35 | 4095                  |
//! | Town     | 12–23 | 4095                  |
//! | Village  | 0–11  | 4095                  |
//!
//! A node's id is `base_value(level) * (sibling_index + 1) + parent_id`, so a
//! child id can be computed from its page position and its parent's id alone.
//! These ids are what the database stores, so the layout must not change.

use crate::area::AreaLevel;
use crate::AreaError;
use std::fmt;

/// A composite identifier for one node of the division tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AreaId(u64);

impl AreaId {
    /// Wraps a raw identifier value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Computes the identifier of the `sibling_index`-th row of a `level` page
    ///
    /// `parent` is `None` for provinces.
    ///
    /// # Errors
    ///
    /// * `IdOverflow` - `sibling_index + 1` does not fit in the level's field;
    ///   encoding it would carry into the parent's bits
    /// * `IdParentOverlap` - the parent already uses bits at or below this
    ///   level's field, so it cannot be a parent of a `level` node
    pub fn encode(
        level: AreaLevel,
        sibling_index: usize,
        parent: Option<AreaId>,
    ) -> Result<AreaId, AreaError> {
        let ordinal = sibling_index as u64 + 1;
        if ordinal > level.capacity() {
            return Err(AreaError::IdOverflow {
                level,
                index: sibling_index,
                capacity: level.capacity(),
            });
        }

        let parent_id = parent.map(|p| p.0).unwrap_or(0);
        if parent_id & low_mask(level) != 0 {
            return Err(AreaError::IdParentOverlap { level, parent_id });
        }

        Ok(AreaId(level.base_value() * ordinal + parent_id))
    }

    /// Returns the raw field value (`sibling_index + 1`, or 0) for `level`
    pub fn segment(&self, level: AreaLevel) -> u64 {
        (self.0 >> level.bit_offset()) & level.capacity()
    }

    /// Returns the sibling index this id was encoded with at `level`
    pub fn sibling_index(&self, level: AreaLevel) -> Option<usize> {
        match self.segment(level) {
            0 => None,
            ordinal => Some((ordinal - 1) as usize),
        }
    }

    /// Returns the deepest level with a populated field
    pub fn level(&self) -> Option<AreaLevel> {
        AreaLevel::all()
            .into_iter()
            .rev()
            .find(|level| self.segment(*level) != 0)
    }

    /// Returns the id of the parent node, or None for provinces
    pub fn parent(&self) -> Option<AreaId> {
        let level = self.level()?;
        level.parent()?;
        Some(AreaId(self.0 & !(level.capacity() << level.bit_offset())))
    }

    /// Returns every ancestor id, root first, excluding self
    pub fn ancestors(&self) -> Vec<AreaId> {
        let mut chain = Vec::with_capacity(4);
        let mut current = self.parent();
        while let Some(id) = current {
            chain.push(id);
            current = id.parent();
        }
        chain.reverse();
        chain
    }

    /// Splits the id into `(level, sibling_index)` pairs, root first
    pub fn path(&self) -> Vec<(AreaLevel, usize)> {
        AreaLevel::all()
            .into_iter()
            .filter_map(|level| self.sibling_index(level).map(|index| (level, index)))
            .collect()
    }
}

/// Mask of the level's own field and every finer field below it
fn low_mask(level: AreaLevel) -> u64 {
    let top = level.bit_offset() + level.bit_width();
    if top >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << top) - 1
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AreaId> for u64 {
    fn from(id: AreaId) -> u64 {
        id.0
    }
}
