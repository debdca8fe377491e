//! Map grids: a set of chunks plus per-grid metadata.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use glam::Vec2;
use tessera_common::{Box2, Box2i, ChunkCoord, EntityId, TileCoord};

use crate::chunk::MapChunk;
use crate::partition::partition_chunk;
use crate::tile::Tile;

/// Default chunk size in tiles.
pub const DEFAULT_CHUNK_SIZE: u16 = 16;

/// Default tile size in world units.
pub const DEFAULT_TILE_SIZE: u16 = 1;

/// Result of regenerating collision for a batch of chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkChangeSet {
    /// Chunks that still hold tiles, with their new collision rectangles
    pub changed: BTreeMap<ChunkCoord, Vec<Box2i>>,
    /// Chunks that became empty and were removed from the grid
    pub removed: Vec<ChunkCoord>,
    /// Whether the grid has no chunks left
    pub grid_emptied: bool,
}

impl ChunkChangeSet {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    /// Number of chunks touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changed.len() + self.removed.len()
    }
}

/// A grid of tiles split into chunks.
#[derive(Debug, Clone)]
pub struct MapGrid {
    /// Chunk width and height in tiles
    chunk_size: u16,
    /// Tile width and height in world units
    tile_size: u16,
    /// Chunks keyed by chunk coordinate
    chunks: AHashMap<ChunkCoord, MapChunk>,
    /// Union of chunk bounds in grid tile units
    local_aabb: Box2i,
    /// Number of collision regeneration passes run so far
    collision_passes: u64,
    /// Whether this grid may be split when it becomes disconnected
    pub can_split: bool,
}

impl MapGrid {
    /// Creates a new empty grid.
    #[must_use]
    pub fn new(chunk_size: u16, tile_size: u16) -> Self {
        Self {
            chunk_size,
            tile_size,
            chunks: AHashMap::new(),
            local_aabb: Box2i::default(),
            collision_passes: 0,
            can_split: true,
        }
    }

    /// Returns the chunk size.
    #[must_use]
    pub const fn chunk_size(&self) -> u16 {
        self.chunk_size
    }

    /// Returns the tile size.
    #[must_use]
    pub const fn tile_size(&self) -> u16 {
        self.tile_size
    }

    /// Returns the local bounds of all filled tiles.
    #[must_use]
    pub const fn local_aabb(&self) -> Box2i {
        self.local_aabb
    }

    /// Number of collision regeneration passes run on this grid.
    #[must_use]
    pub const fn collision_passes(&self) -> u64 {
        self.collision_passes
    }

    /// Gets a chunk by coordinate.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&MapChunk> {
        self.chunks.get(&coord)
    }

    pub(crate) fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut MapChunk> {
        self.chunks.get_mut(&coord)
    }

    /// Iterates all chunks in arbitrary order.
    pub fn chunks(&self) -> impl Iterator<Item = &MapChunk> {
        self.chunks.values()
    }

    /// Chunk coordinates in sorted order.
    #[must_use]
    pub fn chunk_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<_> = self.chunks.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    /// Returns the number of chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total number of filled tiles.
    #[must_use]
    pub fn filled_tiles(&self) -> u32 {
        self.chunks.values().map(MapChunk::filled_tiles).sum()
    }

    /// Gets the tile at a grid coordinate. Missing chunks read as empty.
    #[must_use]
    pub fn get_tile(&self, tile: TileCoord) -> Tile {
        self.chunks
            .get(&tile.to_chunk_coord(self.chunk_size))
            .map_or(Tile::EMPTY, |chunk| chunk.get_tile(tile.to_local_coord(self.chunk_size)))
    }

    /// Every filled tile, sorted by coordinate.
    #[must_use]
    pub fn all_tiles(&self) -> Vec<(TileCoord, Tile)> {
        let mut tiles: Vec<_> = self
            .chunks
            .values()
            .flat_map(|chunk| {
                chunk
                    .filled()
                    .map(|(local, tile)| (local.to_tile(chunk.indices(), self.chunk_size), tile))
            })
            .collect();
        tiles.sort_unstable_by_key(|(coord, _)| *coord);
        tiles
    }

    /// Writes a tile without regenerating collision. Returns the modified chunk.
    pub(crate) fn write_tile(&mut self, tile: TileCoord, value: Tile) -> Option<ChunkCoord> {
        let coord = tile.to_chunk_coord(self.chunk_size);
        let local = tile.to_local_coord(self.chunk_size);
        let chunk = if value.is_empty() {
            self.chunks.get_mut(&coord)?
        } else {
            let size = self.chunk_size;
            self.chunks
                .entry(coord)
                .or_insert_with(|| MapChunk::new(coord, size))
        };
        chunk.set_tile(local, value).then_some(coord)
    }

    /// Entities anchored at a grid tile.
    #[must_use]
    pub fn anchored_at(&self, tile: TileCoord) -> &[EntityId] {
        self.chunks
            .get(&tile.to_chunk_coord(self.chunk_size))
            .map_or(&[], |chunk| chunk.anchored(tile.to_local_coord(self.chunk_size)))
    }

    /// Bounds of a tile in grid-local space.
    #[must_use]
    pub fn tile_local_bounds(&self, tile: TileCoord) -> Box2 {
        let size = f32::from(self.tile_size);
        let min = Vec2::new(tile.x as f32, tile.y as f32) * size;
        Box2::new(min, min + Vec2::splat(size))
    }

    /// Centre of a tile in grid-local space.
    #[must_use]
    pub fn tile_center(&self, tile: TileCoord) -> Vec2 {
        self.tile_local_bounds(tile).center()
    }

    /// Tile containing a grid-local position.
    #[must_use]
    pub fn local_to_tile(&self, local: Vec2) -> TileCoord {
        let size = f32::from(self.tile_size);
        TileCoord::new((local.x / size).floor() as i32, (local.y / size).floor() as i32)
    }

    /// Regenerates collision for the given chunks in one pass, removing chunks
    /// that no longer hold any tiles.
    pub(crate) fn regenerate_collision(&mut self, coords: &BTreeSet<ChunkCoord>) -> ChunkChangeSet {
        let mut changes = ChunkChangeSet::default();
        if coords.is_empty() {
            return changes;
        }
        self.collision_passes += 1;

        for &coord in coords {
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                continue;
            };
            let (bounds, rectangles) = partition_chunk(chunk);
            chunk.set_collision(bounds, rectangles.clone());

            if chunk.filled_tiles() > 0 {
                changes.changed.insert(coord, rectangles);
            } else {
                self.chunks.remove(&coord);
                changes.removed.push(coord);
            }
        }

        let size = i32::from(self.chunk_size);
        self.local_aabb = self.chunks.values().fold(Box2i::default(), |acc, chunk| {
            let origin = chunk.indices();
            acc.union(&chunk.cached_bounds().translated(origin.x * size, origin.y * size))
        });
        changes.grid_emptied = self.chunks.is_empty() && !changes.removed.is_empty();
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_tile_creates_and_regenerate_removes_chunks() {
        let mut grid = MapGrid::new(4, 1);
        let tile = TileCoord::new(5, -1);
        let coord = grid.write_tile(tile, Tile::new(2));
        assert_eq!(coord, Some(ChunkCoord::new(1, -1)));
        assert_eq!(grid.get_tile(tile), Tile::new(2));

        grid.write_tile(tile, Tile::EMPTY);
        let changes = grid.regenerate_collision(&BTreeSet::from([ChunkCoord::new(1, -1)]));
        assert_eq!(changes.removed, vec![ChunkCoord::new(1, -1)]);
        assert!(changes.grid_emptied);
        assert_eq!(grid.chunk_count(), 0);
    }

    #[test]
    fn test_clearing_missing_chunk_is_noop() {
        let mut grid = MapGrid::new(4, 1);
        assert_eq!(grid.write_tile(TileCoord::new(0, 0), Tile::EMPTY), None);
        assert_eq!(grid.chunk_count(), 0);
    }

    #[test]
    fn test_local_aabb_spans_chunks() {
        let mut grid = MapGrid::new(4, 1);
        grid.write_tile(TileCoord::new(0, 0), Tile::new(1));
        grid.write_tile(TileCoord::new(6, 2), Tile::new(1));
        grid.regenerate_collision(&BTreeSet::from([ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)]));
        assert_eq!(grid.local_aabb(), Box2i::new(0, 0, 7, 3));
        assert_eq!(grid.collision_passes(), 1);
    }

    #[test]
    fn test_tile_bounds_and_lookup() {
        let grid = MapGrid::new(16, 2);
        let bounds = grid.tile_local_bounds(TileCoord::new(1, -1));
        assert_eq!(bounds, Box2::new(Vec2::new(2.0, -2.0), Vec2::new(4.0, 0.0)));
        assert_eq!(grid.local_to_tile(Vec2::new(3.9, -0.1)), TileCoord::new(1, -1));
    }
}
