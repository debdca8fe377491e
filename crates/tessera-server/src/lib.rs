//! # Tessera Server
//!
//! Headless host for Tessera grids: configuration, the admin console, and a
//! server loop that feeds console lines into the grid fixture system.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod console;
pub mod server;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::console::*;
    pub use crate::server::*;
}

pub use prelude::*;
