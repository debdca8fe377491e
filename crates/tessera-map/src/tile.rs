//! Tile value type.

use serde::{Deserialize, Serialize};

/// A single tile. Type id 0 means the tile is empty space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Tile definition id (0 = empty)
    pub type_id: u16,
    /// Per-tile flags
    pub flags: u8,
    /// Visual variant
    pub variant: u8,
}

impl Tile {
    /// Empty space.
    pub const EMPTY: Self = Self::new(0);

    /// Creates a tile of the given type with no flags or variant.
    #[must_use]
    pub const fn new(type_id: u16) -> Self {
        Self {
            type_id,
            flags: 0,
            variant: 0,
        }
    }

    /// Creates a tile with every field set.
    #[must_use]
    pub const fn with_details(type_id: u16, flags: u8, variant: u8) -> Self {
        Self {
            type_id,
            flags,
            variant,
        }
    }

    /// Whether this tile is empty space.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.type_id == 0
    }
}
