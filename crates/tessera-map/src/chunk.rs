//! Chunk data: tiles, snap grid, and cached collision.

use ahash::AHashMap;
use tessera_common::{Box2i, ChunkCoord, EntityId, LocalCoord};

use crate::tile::Tile;

/// A square block of `chunk_size × chunk_size` tiles within a grid.
#[derive(Debug, Clone)]
pub struct MapChunk {
    /// Chunk coordinate within the grid
    indices: ChunkCoord,
    /// Width and height in tiles
    chunk_size: u16,
    /// Tile data, row-major
    tiles: Vec<Tile>,
    /// Entities anchored to each local tile
    snap_grid: AHashMap<LocalCoord, Vec<EntityId>>,
    /// Number of non-empty tiles
    filled_tiles: u32,
    /// Collision rectangles in chunk-local tile units
    fixtures: Vec<Box2i>,
    /// Bounds of the filled tiles in chunk-local tile units
    cached_bounds: Box2i,
}

impl MapChunk {
    /// Creates a new empty chunk.
    #[must_use]
    pub fn new(indices: ChunkCoord, chunk_size: u16) -> Self {
        let tile_count = usize::from(chunk_size) * usize::from(chunk_size);
        Self {
            indices,
            chunk_size,
            tiles: vec![Tile::EMPTY; tile_count],
            snap_grid: AHashMap::new(),
            filled_tiles: 0,
            fixtures: Vec::new(),
            cached_bounds: Box2i::default(),
        }
    }

    /// Returns the chunk coordinate.
    #[must_use]
    pub const fn indices(&self) -> ChunkCoord {
        self.indices
    }

    /// Returns the chunk size.
    #[must_use]
    pub const fn chunk_size(&self) -> u16 {
        self.chunk_size
    }

    /// Returns the number of filled tiles.
    #[must_use]
    pub const fn filled_tiles(&self) -> u32 {
        self.filled_tiles
    }

    /// Gets the tile at a local coordinate. Out of range reads as empty.
    #[must_use]
    pub fn get_tile(&self, local: LocalCoord) -> Tile {
        if local.x >= self.chunk_size || local.y >= self.chunk_size {
            return Tile::EMPTY;
        }
        self.tiles[local.to_index(self.chunk_size)]
    }

    /// Sets a tile. Returns whether anything changed.
    pub fn set_tile(&mut self, local: LocalCoord, tile: Tile) -> bool {
        if local.x >= self.chunk_size || local.y >= self.chunk_size {
            return false;
        }
        let slot = &mut self.tiles[local.to_index(self.chunk_size)];
        if *slot == tile {
            return false;
        }

        match (slot.is_empty(), tile.is_empty()) {
            (true, false) => self.filled_tiles += 1,
            (false, true) => self.filled_tiles -= 1,
            _ => {},
        }
        *slot = tile;
        true
    }

    /// Returns all tiles, row-major.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Iterates the filled tiles with their local coordinates.
    pub fn filled(&self) -> impl Iterator<Item = (LocalCoord, Tile)> + '_ {
        let size = self.chunk_size;
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| !tile.is_empty())
            .map(move |(i, tile)| (LocalCoord::from_index(i, size), *tile))
    }

    /// Entities anchored at a local tile.
    #[must_use]
    pub fn anchored(&self, local: LocalCoord) -> &[EntityId] {
        self.snap_grid.get(&local).map_or(&[], Vec::as_slice)
    }

    /// Anchors an entity to a local tile.
    pub fn add_anchored(&mut self, local: LocalCoord, entity: EntityId) {
        let cell = self.snap_grid.entry(local).or_default();
        if !cell.contains(&entity) {
            cell.push(entity);
        }
    }

    /// Removes an entity from a local tile's snap cell. Returns whether it was there.
    pub fn remove_anchored(&mut self, local: LocalCoord, entity: EntityId) -> bool {
        let Some(cell) = self.snap_grid.get_mut(&local) else {
            return false;
        };
        let before = cell.len();
        cell.retain(|e| *e != entity);
        let removed = cell.len() != before;
        if cell.is_empty() {
            self.snap_grid.remove(&local);
        }
        removed
    }

    /// Whether any entity is anchored in this chunk.
    #[must_use]
    pub fn has_anchored(&self) -> bool {
        !self.snap_grid.is_empty()
    }

    /// Collision rectangles from the last regeneration.
    #[must_use]
    pub fn fixtures(&self) -> &[Box2i] {
        &self.fixtures
    }

    /// Bounds of the filled tiles from the last regeneration.
    #[must_use]
    pub const fn cached_bounds(&self) -> Box2i {
        self.cached_bounds
    }

    pub(crate) fn set_collision(&mut self, bounds: Box2i, fixtures: Vec<Box2i>) {
        self.cached_bounds = bounds;
        self.fixtures = fixtures;
    }
}
