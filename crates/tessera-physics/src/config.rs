//! Grid splitting settings.

use serde::{Deserialize, Serialize};

/// Settings for the grid fixture system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Whether disconnected grids are split apart.
    pub split_allowed: bool,
    /// Capacity of the grid event queue.
    pub event_capacity: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            split_allowed: true,
            event_capacity: 1024,
        }
    }
}
