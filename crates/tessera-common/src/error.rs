//! Error types for Tessera.

use thiserror::Error;

use crate::coords::TileCoord;
use crate::ids::{EntityId, MapId};

/// Top-level error type for Tessera operations.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Map/grid/entity errors
    #[error("Map error: {0}")]
    Map(#[from] MapError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map, grid, and entity errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// Map does not exist
    #[error("Map {0} not found")]
    MapNotFound(MapId),

    /// Entity does not exist
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// Entity exists but carries no grid
    #[error("Entity {0} is not a grid")]
    NotAGrid(EntityId),

    /// Two grids were expected to share a map
    #[error("Grids {a} and {b} are on different maps")]
    MismatchedMaps {
        /// First grid
        a: EntityId,
        /// Second grid
        b: EntityId,
    },

    /// Entities can only be anchored to filled tiles
    #[error("Tile {tile} on grid {grid} is empty")]
    EmptyTile {
        /// Grid entity
        grid: EntityId,
        /// Tile on the grid
        tile: TileCoord,
    },

    /// An operation needing two distinct grids got the same one twice
    #[error("Grid {0} cannot be merged with itself")]
    SameGrid(EntityId),

    /// Rotations must be finite
    #[error("Rotation {0} is not a finite angle")]
    NonFiniteRotation(String),
}

/// Result type alias for map operations.
pub type MapResult<T> = Result<T, MapError>;

/// Result type alias for Tessera operations.
pub type TesseraResult<T> = Result<T, TesseraError>;
