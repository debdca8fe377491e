//! # Tessera Physics
//!
//! Grid fixtures: keeps a connectivity graph of chunk tiles for every grid
//! and splits a grid into several when a tile change disconnects it.
//!
//! This crate handles:
//! - Per-chunk node generation and cross-chunk stitching
//! - Split detection over the nodes a change touched
//! - Moving split-off pieces, with their entities, onto new grids
//! - Grid events and a debug feed of the node graph
//! - Merging one grid into another

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod connectivity;
pub mod debug;
pub mod events;
mod merge;
pub mod node;
mod split;
pub mod system;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::connectivity::*;
    pub use crate::debug::*;
    pub use crate::events::*;
    pub use crate::node::*;
    pub use crate::system::*;
}

pub use prelude::*;
