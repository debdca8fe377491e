//! # Tessera Map
//!
//! The map model the physics layer works against.
//!
//! This crate handles:
//! - Tiles and fixed-size chunks with a snap grid of anchored entities
//! - Grids made of chunks, with batched tile writes
//! - Chunk collision partitioning
//! - The entity transform hierarchy and physics bodies
//! - Spatial lookup of entities on a tile

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod chunk;
pub mod grid;
pub mod lookup;
pub mod partition;
pub mod tile;
pub mod transform;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::chunk::*;
    pub use crate::grid::*;
    pub use crate::lookup::*;
    pub use crate::partition::*;
    pub use crate::tile::*;
    pub use crate::transform::*;
    pub use crate::world::*;
}

pub use prelude::*;
