//! Coordinate types for grid tiles, chunks, and chunk-local positions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Tile coordinate in grid space (not chunk-local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// X index in grid space
    pub x: i32,
    /// Y index in grid space
    pub y: i32,
}

impl TileCoord {
    /// The grid origin tile.
    pub const ZERO: Self = Self::new(0, 0);

    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to the coordinate of the chunk containing this tile.
    #[must_use]
    pub const fn to_chunk_coord(self, chunk_size: u16) -> ChunkCoord {
        let size = chunk_size as i32;
        ChunkCoord {
            x: self.x.div_euclid(size),
            y: self.y.div_euclid(size),
        }
    }

    /// Converts to the local coordinate within its chunk.
    #[must_use]
    pub const fn to_local_coord(self, chunk_size: u16) -> LocalCoord {
        let size = chunk_size as i32;
        LocalCoord {
            x: self.x.rem_euclid(size) as u16,
            y: self.y.rem_euclid(size) as u16,
        }
    }

    /// Returns the tile one step away in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl Add for TileCoord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for TileCoord {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Chunk coordinate (identifies a chunk within a grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Y coordinate in chunk space
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to the grid tile at the chunk's origin (bottom-left corner).
    #[must_use]
    pub const fn tile_origin(self, chunk_size: u16) -> TileCoord {
        TileCoord {
            x: self.x * chunk_size as i32,
            y: self.y * chunk_size as i32,
        }
    }

    /// Returns the adjacent chunk in `direction`.
    #[must_use]
    pub const fn neighbor(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Local coordinate within a chunk (0 to chunk_size-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalCoord {
    /// X coordinate within chunk
    pub x: u16,
    /// Y coordinate within chunk
    pub y: u16,
}

impl LocalCoord {
    /// Creates a new local coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Converts to linear index for array access.
    #[must_use]
    pub const fn to_index(self, chunk_size: u16) -> usize {
        (self.y as usize) * (chunk_size as usize) + (self.x as usize)
    }

    /// Creates from linear index.
    #[must_use]
    pub const fn from_index(index: usize, chunk_size: u16) -> Self {
        let size = chunk_size as usize;
        Self {
            x: (index % size) as u16,
            y: (index / size) as u16,
        }
    }

    /// Converts to a grid tile coordinate given the owning chunk.
    #[must_use]
    pub const fn to_tile(self, chunk: ChunkCoord, chunk_size: u16) -> TileCoord {
        let origin = chunk.tile_origin(chunk_size);
        TileCoord {
            x: origin.x + self.x as i32,
            y: origin.y + self.y as i32,
        }
    }

    /// Returns the neighbor in `direction` if it stays inside the chunk.
    #[must_use]
    pub fn step(self, direction: Direction, chunk_size: u16) -> Option<Self> {
        let (dx, dy) = direction.offset();
        let x = i32::from(self.x) + dx;
        let y = i32::from(self.y) + dy;
        let size = i32::from(chunk_size);
        if x < 0 || y < 0 || x >= size || y >= size {
            return None;
        }
        Some(Self::new(x as u16, y as u16))
    }
}

/// One of the four grid directions. +Y is north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// -Y
    South,
    /// +X
    East,
    /// +Y
    North,
    /// -X
    West,
}

impl Direction {
    /// The fixed order used by flood fills.
    pub const CARDINALS: [Self; 4] = [Self::South, Self::East, Self::North, Self::West];

    /// Returns the `(dx, dy)` step for this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::South => (0, -1),
            Self::East => (1, 0),
            Self::North => (0, 1),
            Self::West => (-1, 0),
        }
    }
}
