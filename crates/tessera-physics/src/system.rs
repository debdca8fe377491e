//! The grid fixture system.
//!
//! Owns the connectivity index of every grid and reacts to chunk changes by
//! regenerating nodes and, when a grid has come apart, splitting it. Every
//! tile write that should be split-checked goes through [`GridFixtureSystem::set_tiles`].

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tessera_common::{Box2i, ChunkCoord, EntityId, LocalCoord, MapId, MapResult, SessionId, TileCoord};
use tessera_map::{default_sundry_filter, ChunkChangeSet, EntityFilter, MapChunk, MapWorld, Tile};
use tracing::{debug, info, trace};

use crate::config::SplitConfig;
use crate::connectivity::{DirtyNodes, GridConnectivity, SplitComponent};
use crate::debug::{ChunkSplitDebugMessage, SplitDebugBroadcast};
use crate::events::{EventBus, GridEvent, GridEventHandler};
use crate::node::NodeId;

/// What a split check concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitOutcome {
    /// No tile changed, so nothing was checked.
    Unchanged,
    /// Splitting is turned off.
    Disabled,
    /// A split is already running; nested checks are skipped.
    InProgress,
    /// The grid opted out of splitting.
    NotSplittable,
    /// The grid is still one piece.
    Connected,
    /// The grid was split; the created grids, smallest piece first.
    Split {
        /// Created grids
        new_grids: Vec<EntityId>,
    },
}

impl SplitOutcome {
    /// Grids created by this check.
    #[must_use]
    pub fn new_grids(&self) -> &[EntityId] {
        match self {
            Self::Split { new_grids } => new_grids,
            _ => &[],
        }
    }
}

/// Keeps grid connectivity current and splits disconnected grids.
pub struct GridFixtureSystem {
    config: SplitConfig,
    /// Connectivity index per grid entity
    nodes: AHashMap<EntityId, GridConnectivity>,
    /// Set for the whole of a check-and-split
    is_splitting: bool,
    /// Checks skipped because a split was already running
    #[cfg(test)]
    nested_skips: usize,
    sundry_filter: EntityFilter,
    handlers: Vec<Box<dyn GridEventHandler>>,
    events: EventBus,
    debug: SplitDebugBroadcast,
}

impl Default for GridFixtureSystem {
    fn default() -> Self {
        Self::new(SplitConfig::default())
    }
}

impl std::fmt::Debug for GridFixtureSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridFixtureSystem")
            .field("config", &self.config)
            .field("grids", &self.nodes.len())
            .field("is_splitting", &self.is_splitting)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl GridFixtureSystem {
    /// Creates a system with the given settings.
    #[must_use]
    pub fn new(config: SplitConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            nodes: AHashMap::new(),
            is_splitting: false,
            #[cfg(test)]
            nested_skips: 0,
            sundry_filter: default_sundry_filter,
            handlers: Vec::new(),
            events,
            debug: SplitDebugBroadcast::new(),
        }
    }

    /// Current settings.
    #[must_use]
    pub const fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Whether splitting is enabled.
    #[must_use]
    pub const fn split_allowed(&self) -> bool {
        self.config.split_allowed
    }

    /// Turns splitting on or off.
    pub fn set_split_allowed(&mut self, allowed: bool) {
        if self.config.split_allowed != allowed {
            info!("Grid splitting {}", if allowed { "enabled" } else { "disabled" });
        }
        self.config.split_allowed = allowed;
    }

    /// Whether a check-and-split is running.
    #[must_use]
    pub const fn is_splitting(&self) -> bool {
        self.is_splitting
    }

    /// Replaces the filter that picks which free entities follow a split-off
    /// piece.
    pub fn set_sundry_filter(&mut self, filter: EntityFilter) {
        self.sundry_filter = filter;
    }

    pub(crate) fn sundry_filter(&self) -> EntityFilter {
        self.sundry_filter
    }

    /// Registers a synchronous event handler.
    pub fn add_handler(&mut self, handler: Box<dyn GridEventHandler>) {
        self.handlers.push(handler);
    }

    /// Queue of raised events.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Debug subscribers and their pending messages.
    #[must_use]
    pub const fn debug(&self) -> &SplitDebugBroadcast {
        &self.debug
    }

    /// Mutable access to the debug feed, for draining.
    pub fn debug_mut(&mut self) -> &mut SplitDebugBroadcast {
        &mut self.debug
    }

    pub(crate) fn raise(&mut self, world: &MapWorld, event: GridEvent) {
        for handler in &mut self.handlers {
            handler.handle(&event, world);
        }
        self.events.publish(event);
    }

    // Connectivity index

    /// Creates an empty index for a grid if it has none.
    pub fn ensure_grid(&mut self, grid: EntityId, chunk_size: u16) {
        self.nodes
            .entry(grid)
            .or_insert_with(|| GridConnectivity::new(chunk_size));
    }

    /// Drops a grid's index.
    pub fn remove_grid(&mut self, grid: EntityId) -> bool {
        self.nodes.remove(&grid).is_some()
    }

    /// Whether a grid has an index.
    #[must_use]
    pub fn has_grid(&self, grid: EntityId) -> bool {
        self.nodes.contains_key(&grid)
    }

    /// Index of a grid, if registered.
    #[must_use]
    pub fn connectivity(&self, grid: EntityId) -> Option<&GridConnectivity> {
        self.nodes.get(&grid)
    }

    pub(crate) fn connectivity_mut(&mut self, grid: EntityId) -> Option<&mut GridConnectivity> {
        self.nodes.get_mut(&grid)
    }

    fn index(&self, grid: EntityId) -> &GridConnectivity {
        match self.nodes.get(&grid) {
            Some(index) => index,
            None => panic!("grid {grid} has no connectivity index"),
        }
    }

    fn index_mut(&mut self, grid: EntityId) -> &mut GridConnectivity {
        match self.nodes.get_mut(&grid) {
            Some(index) => index,
            None => panic!("grid {grid} has no connectivity index"),
        }
    }

    /// Rebuilds one chunk's nodes.
    pub fn regenerate_chunk(&mut self, grid: EntityId, chunk: &MapChunk) -> DirtyNodes {
        let index = self.index_mut(grid);
        let dirty = index.regenerate_chunk(chunk);
        debug_assert!(index.check_symmetry(), "asymmetric links on grid {grid}");
        dirty
    }

    /// Discards one chunk's nodes.
    pub fn remove_chunk(&mut self, grid: EntityId, chunk: ChunkCoord) -> DirtyNodes {
        self.index_mut(grid).remove_chunk(chunk)
    }

    /// Finds the node of a chunk containing a local tile.
    #[must_use]
    pub fn find_node_containing(&self, grid: EntityId, chunk: ChunkCoord, local: LocalCoord) -> Option<NodeId> {
        self.index(grid).find_node_containing(chunk, local)
    }

    // Notifications

    /// Registers a grid and builds nodes for the chunks it already has.
    pub fn on_grid_initialize(&mut self, world: &MapWorld, grid: EntityId) -> MapResult<()> {
        let data = world.grid(grid)?;
        self.ensure_grid(grid, data.chunk_size());
        for chunk in data.chunks() {
            self.regenerate_chunk(grid, chunk);
        }
        debug!("Grid {grid} initialized with {} chunks", data.chunk_count());
        Ok(())
    }

    /// Forgets a removed grid.
    pub fn on_grid_removed(&mut self, grid: EntityId) {
        if self.remove_grid(grid) {
            debug!("Grid {grid} removed");
        }
    }

    /// A single chunk's tiles changed.
    pub fn on_chunk_tiles_changed(
        &mut self,
        world: &mut MapWorld,
        grid: EntityId,
        chunk: ChunkCoord,
        rectangles: &[Box2i],
    ) -> MapResult<SplitOutcome> {
        trace!("Grid {grid} chunk {chunk}: {} fixtures", rectangles.len());
        let dirty = self.refresh_chunk(world, grid, chunk)?;
        self.check_splits(world, grid, dirty)
    }

    /// A batch of chunks changed; one split check covers them all.
    pub fn on_many_chunks_changed(
        &mut self,
        world: &mut MapWorld,
        grid: EntityId,
        changes: &ChunkChangeSet,
    ) -> MapResult<SplitOutcome> {
        let dirty = self.apply_changes(world, grid, changes)?;
        self.check_splits(world, grid, dirty)
    }

    /// Brings the index up to date with a change set without checking for
    /// splits.
    pub(crate) fn apply_changes(
        &mut self,
        world: &MapWorld,
        grid: EntityId,
        changes: &ChunkChangeSet,
    ) -> MapResult<DirtyNodes> {
        let mut dirty = DirtyNodes::new();
        for &chunk in &changes.removed {
            let removed = self.remove_chunk(grid, chunk);
            dirty.extend(removed.iter());
        }
        for &chunk in changes.changed.keys() {
            let refreshed = self.refresh_chunk(world, grid, chunk)?;
            dirty.extend(refreshed.iter());
        }
        if changes.grid_emptied {
            self.raise(world, GridEvent::EmptyGrid { grid });
        }
        Ok(dirty)
    }

    fn refresh_chunk(&mut self, world: &MapWorld, grid: EntityId, chunk: ChunkCoord) -> MapResult<DirtyNodes> {
        let dirty = match world.grid(grid)?.chunk(chunk) {
            Some(data) if data.filled_tiles() > 0 => self.regenerate_chunk(grid, data),
            _ => self.remove_chunk(grid, chunk),
        };
        Ok(dirty)
    }

    // World mutation

    /// Creates a grid on a map and registers it.
    pub fn create_grid(
        &mut self,
        world: &mut MapWorld,
        map: MapId,
        chunk_size: u16,
        tile_size: u16,
    ) -> MapResult<EntityId> {
        let grid = world.create_grid(map, chunk_size, tile_size)?;
        self.on_grid_initialize(world, grid)?;
        Ok(grid)
    }

    /// Deletes a grid entity and everything under it.
    pub fn delete_grid(&mut self, world: &mut MapWorld, grid: EntityId) -> MapResult<()> {
        world.grid(grid)?;
        for deleted in world.delete_entity(grid)? {
            self.on_grid_removed(deleted);
        }
        Ok(())
    }

    /// Sets one tile and checks the grid for a split.
    pub fn set_tile(
        &mut self,
        world: &mut MapWorld,
        grid: EntityId,
        tile: TileCoord,
        value: Tile,
    ) -> MapResult<SplitOutcome> {
        let changes = world.set_tiles(grid, &[(tile, value)])?;
        if changes.is_empty() {
            return Ok(SplitOutcome::Unchanged);
        }
        match (changes.changed.iter().next(), changes.removed.first()) {
            (Some((&chunk, rectangles)), None) if changes.changed.len() == 1 && !changes.grid_emptied => {
                self.on_chunk_tiles_changed(world, grid, chunk, rectangles)
            },
            _ => self.on_many_chunks_changed(world, grid, &changes),
        }
    }

    /// Sets many tiles in one batch and checks the grid once.
    pub fn set_tiles(
        &mut self,
        world: &mut MapWorld,
        grid: EntityId,
        tiles: &[(TileCoord, Tile)],
    ) -> MapResult<SplitOutcome> {
        let changes = world.set_tiles(grid, tiles)?;
        if changes.is_empty() {
            return Ok(SplitOutcome::Unchanged);
        }
        self.on_many_chunks_changed(world, grid, &changes)
    }

    // Split detection

    /// Decides whether the nodes in `dirty` still form one piece and splits
    /// the grid if they do not.
    pub fn check_splits(
        &mut self,
        world: &mut MapWorld,
        grid: EntityId,
        dirty: DirtyNodes,
    ) -> MapResult<SplitOutcome> {
        if !self.config.split_allowed {
            trace!("Split check on {grid} skipped: splitting disabled");
            return Ok(SplitOutcome::Disabled);
        }
        if self.is_splitting {
            trace!("Split check on {grid} skipped: split in progress");
            #[cfg(test)]
            {
                self.nested_skips += 1;
            }
            return Ok(SplitOutcome::InProgress);
        }
        if !world.grid(grid)?.can_split {
            trace!("Split check on {grid} skipped: grid cannot split");
            return Ok(SplitOutcome::NotSplittable);
        }

        self.is_splitting = true;
        let outcome = self.detect_and_split(world, grid, dirty);
        self.is_splitting = false;

        let outcome = outcome?;
        self.broadcast_grid(world, grid);
        for &new_grid in outcome.new_grids() {
            self.broadcast_grid(world, new_grid);
        }
        Ok(outcome)
    }

    fn detect_and_split(
        &mut self,
        world: &mut MapWorld,
        grid: EntityId,
        dirty: DirtyNodes,
    ) -> MapResult<SplitOutcome> {
        let mut components: Vec<SplitComponent> = self.index(grid).find_components(dirty);
        if components.len() <= 1 {
            return Ok(SplitOutcome::Connected);
        }
        components.sort_by_key(SplitComponent::tile_count);
        let new_grids = self.split_grid(world, grid, &components)?;
        Ok(SplitOutcome::Split { new_grids })
    }

    // Debug feed

    /// Subscribes a session to the node debug feed and queues the current
    /// state of every grid for it.
    pub fn subscribe_debug(&mut self, world: &MapWorld, session: SessionId) -> bool {
        if !self.debug.subscribe(session) {
            return false;
        }
        for grid in world.grids() {
            if let Some(message) = self.debug_message(world, grid) {
                self.debug.send_to(session, message);
            }
        }
        debug!("Session {} subscribed to grid node debug", session.raw());
        true
    }

    /// Removes a session from the debug feed.
    pub fn unsubscribe_debug(&mut self, session: SessionId) -> bool {
        let removed = self.debug.unsubscribe(session);
        if removed {
            debug!("Session {} unsubscribed from grid node debug", session.raw());
        }
        removed
    }

    /// Drops everything tied to a disconnected session.
    pub fn on_session_disconnected(&mut self, session: SessionId) {
        self.unsubscribe_debug(session);
    }

    /// Builds the debug snapshot of one grid.
    #[must_use]
    pub fn debug_message(&self, world: &MapWorld, grid: EntityId) -> Option<ChunkSplitDebugMessage> {
        let index = self.nodes.get(&grid)?;
        let tile_size = f32::from(world.grid(grid).ok()?.tile_size());
        Some(ChunkSplitDebugMessage::from_index(grid, index, tile_size))
    }

    /// Sends one grid's snapshot to every subscriber.
    pub fn broadcast_grid(&mut self, world: &MapWorld, grid: EntityId) {
        if !self.debug.has_subscribers() {
            return;
        }
        if let Some(message) = self.debug_message(world, grid) {
            self.debug.broadcast(&message);
        }
    }
}
