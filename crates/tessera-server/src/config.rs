//! Server configuration.
//!
//! Loaded from and saved to a TOML file. Missing keys take their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tessera_common::{SessionId, TesseraError, TesseraResult};
use tessera_map::{DEFAULT_CHUNK_SIZE, DEFAULT_TILE_SIZE};
use tessera_physics::SplitConfig;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "tessera.toml";

/// Server configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // === Grid Settings ===
    /// Chunk edge length in tiles for new grids
    pub chunk_size: u16,
    /// Tile edge length in world units for new grids
    pub tile_size: u16,

    // === Splitting ===
    /// Split grids that come apart
    pub split_allowed: bool,
    /// Grid event queue capacity
    pub event_capacity: usize,

    // === Debug Settings ===
    /// Sessions allowed to watch the node debug feed
    pub debug_admins: Vec<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let split = SplitConfig::default();
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tile_size: DEFAULT_TILE_SIZE,
            split_allowed: split.split_allowed,
            event_capacity: split.event_capacity,
            debug_admins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a specific path, falling back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let mut contents = String::new();
        if let Err(e) = fs::File::open(path).and_then(|mut file| file.read_to_string(&mut contents)) {
            warn!("Failed to read config file: {e}");
            return Self::default();
        }

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> TesseraResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| TesseraError::Config(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.chunk_size = self.chunk_size.clamp(2, 256);
        self.tile_size = self.tile_size.clamp(1, 16);
        self.event_capacity = self.event_capacity.clamp(16, 65536);
    }

    /// Settings for the grid fixture system.
    #[must_use]
    pub fn split_config(&self) -> SplitConfig {
        SplitConfig {
            split_allowed: self.split_allowed,
            event_capacity: self.event_capacity,
        }
    }

    /// Whether a session may use admin commands. The local console always may.
    #[must_use]
    pub fn is_admin(&self, session: SessionId) -> bool {
        session == SessionId::SERVER || self.debug_admins.contains(&session.raw())
    }
}
