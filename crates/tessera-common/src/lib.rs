//! # Tessera Common
//!
//! Common types shared by every Tessera crate:
//! - Coordinate types (tile, chunk, local)
//! - ID types (EntityId, MapId, SessionId)
//! - Float and integer boxes
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod bounds;
pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bounds::*;
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use glam::Vec2;
pub use prelude::*;
