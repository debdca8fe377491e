//! Server state and command execution.

use tessera_common::{EntityId, MapId, MapResult, SessionId, TileCoord};
use tessera_map::{MapWorld, Tile};
use tessera_physics::{ChunkSplitDebugMessage, GridEvent, GridFixtureSystem, SplitOutcome};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::console::{help_lines, parse_command, requires_admin, Command, CommandError};

/// One map, its grids, and the fixture system that keeps them split.
pub struct Server {
    config: ServerConfig,
    world: MapWorld,
    system: GridFixtureSystem,
    map: MapId,
}

impl Server {
    /// Creates a server with one empty map.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let mut world = MapWorld::new();
        let map = world.create_map();
        let system = GridFixtureSystem::new(config.split_config());
        info!("Server ready, map {}", map.raw());
        Self {
            config,
            world,
            system,
            map,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The world.
    #[must_use]
    pub const fn world(&self) -> &MapWorld {
        &self.world
    }

    /// The fixture system.
    #[must_use]
    pub const fn system(&self) -> &GridFixtureSystem {
        &self.system
    }

    /// Creates a grid filled with a `width` by `height` block of tiles. The
    /// block is 4-connected, so no split happens.
    pub fn spawn_block_grid(&mut self, width: i32, height: i32, type_id: u16) -> MapResult<EntityId> {
        let grid = self.system.create_grid(
            &mut self.world,
            self.map,
            self.config.chunk_size,
            self.config.tile_size,
        )?;
        let tiles: Vec<_> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (TileCoord::new(x, y), Tile::new(type_id))))
            .collect();
        self.system.set_tiles(&mut self.world, grid, &tiles)?;
        Ok(grid)
    }

    /// Parses and runs one console line for a session.
    pub fn execute(&mut self, session: SessionId, line: &str) -> Result<Vec<String>, CommandError> {
        let command = parse_command(line)?;
        let is_admin = self.config.is_admin(session);
        if requires_admin(&command) && !is_admin {
            warn!("Session {} may not run '{}'", session.raw(), command.name());
            return Ok(Vec::new());
        }

        match command {
            Command::Help => Ok(help_lines(is_admin)),
            Command::SplitGrids(allowed) => {
                self.system.set_split_allowed(allowed);
                Ok(vec![format!("Grid splitting {}", if allowed { "on" } else { "off" })])
            },
            Command::ShowGridNodes => {
                let line = if self.system.debug().is_subscribed(session) {
                    self.system.unsubscribe_debug(session);
                    "Grid node debug off"
                } else {
                    self.system.subscribe_debug(&self.world, session);
                    "Grid node debug on"
                };
                Ok(vec![line.to_string()])
            },
            Command::MergeGrids {
                grid_a,
                grid_b,
                offset,
                angle,
            } => {
                let outcome = self
                    .system
                    .merge_grids(&mut self.world, grid_a, grid_b, offset, angle)?;
                let mut lines = vec![format!("Merged {grid_b} into {grid_a}")];
                lines.extend(describe_outcome(grid_a, &outcome));
                Ok(lines)
            },
            Command::ListGrids => Ok(self.list_grids()),
            Command::SetTile { grid, tile, type_id } => {
                let outcome = self
                    .system
                    .set_tile(&mut self.world, grid, tile, Tile::new(type_id))?;
                let mut lines = vec![format!("Grid {grid} tile {tile} = {type_id}")];
                lines.extend(describe_outcome(grid, &outcome));
                Ok(lines)
            },
        }
    }

    fn list_grids(&self) -> Vec<String> {
        self.world
            .grids()
            .into_iter()
            .filter_map(|grid| {
                let data = self.world.grid(grid).ok()?;
                let nodes = self
                    .system
                    .connectivity(grid)
                    .map_or(0, tessera_physics::GridConnectivity::node_count);
                Some(format!(
                    "Grid {grid}: {} tiles, {} chunks, {nodes} nodes",
                    data.filled_tiles(),
                    data.chunk_count()
                ))
            })
            .collect()
    }

    /// Takes the grid events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        self.system.events().drain()
    }

    /// Takes the debug messages queued for `session`.
    pub fn drain_debug(&mut self, session: SessionId) -> Vec<ChunkSplitDebugMessage> {
        self.system.debug_mut().drain_for(session)
    }

    /// Drops session state for a client that left.
    pub fn disconnect(&mut self, session: SessionId) {
        self.system.on_session_disconnected(session);
        info!("Session {} disconnected", session.raw());
    }
}

fn describe_outcome(grid: EntityId, outcome: &SplitOutcome) -> Vec<String> {
    match outcome {
        SplitOutcome::Split { new_grids } => {
            let ids: Vec<String> = new_grids.iter().map(ToString::to_string).collect();
            vec![format!("Grid {grid} split into new grids {}", ids.join(", "))]
        },
        SplitOutcome::Disabled => vec!["Splitting is off".to_string()],
        _ => Vec::new(),
    }
}
