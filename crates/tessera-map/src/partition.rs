//! Partitions a chunk's filled tiles into collision rectangles.
//!
//! Each row is scanned for runs of filled tiles. A run that spans exactly the
//! same columns as an open rectangle from the row below extends that
//! rectangle upward; any other run opens a new one.

use tessera_common::{Box2i, LocalCoord};

use crate::chunk::MapChunk;

/// Computes the filled-tile bounds and collision rectangles of a chunk, both
/// in chunk-local tile units.
#[must_use]
pub fn partition_chunk(chunk: &MapChunk) -> (Box2i, Vec<Box2i>) {
    let size = chunk.chunk_size();
    let mut done: Vec<Box2i> = Vec::new();
    let mut open: Vec<Box2i> = Vec::new();

    for y in 0..size {
        let mut next_open = Vec::with_capacity(open.len());
        let mut x = 0;
        while x < size {
            if chunk.get_tile(LocalCoord::new(x, y)).is_empty() {
                x += 1;
                continue;
            }
            let start = x;
            while x < size && !chunk.get_tile(LocalCoord::new(x, y)).is_empty() {
                x += 1;
            }

            let (min_x, max_x) = (i32::from(start), i32::from(x));
            let row = i32::from(y);
            if let Some(pos) = open
                .iter()
                .position(|r| r.min_x == min_x && r.max_x == max_x && r.max_y == row)
            {
                let mut rect = open.swap_remove(pos);
                rect.max_y = row + 1;
                next_open.push(rect);
            } else {
                next_open.push(Box2i::new(min_x, row, max_x, row + 1));
            }
        }
        done.append(&mut open);
        open = next_open;
    }
    done.append(&mut open);

    let bounds = done.iter().fold(Box2i::default(), |acc, r| acc.union(r));
    (bounds, done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Tile;
    use tessera_common::ChunkCoord;

    fn chunk_with(size: u16, filled: &[(u16, u16)]) -> MapChunk {
        let mut chunk = MapChunk::new(ChunkCoord::new(0, 0), size);
        for &(x, y) in filled {
            chunk.set_tile(LocalCoord::new(x, y), Tile::new(1));
        }
        chunk
    }

    #[test]
    fn test_empty_chunk_has_no_rectangles() {
        let (bounds, rects) = partition_chunk(&MapChunk::new(ChunkCoord::new(0, 0), 4));
        assert!(bounds.is_empty());
        assert!(rects.is_empty());
    }

    #[test]
    fn test_full_chunk_is_one_rectangle() {
        let filled: Vec<_> = (0..4).flat_map(|y| (0..4).map(move |x| (x, y))).collect();
        let (bounds, rects) = partition_chunk(&chunk_with(4, &filled));
        assert_eq!(rects, vec![Box2i::new(0, 0, 4, 4)]);
        assert_eq!(bounds, Box2i::new(0, 0, 4, 4));
    }

    #[test]
    fn test_rectangles_cover_every_filled_tile_once() {
        // An L shape plus a detached tile.
        let filled = [(0, 0), (1, 0), (2, 0), (0, 1), (0, 2), (3, 3)];
        let (bounds, rects) = partition_chunk(&chunk_with(4, &filled));

        let area: i32 = rects.iter().map(Box2i::area).sum();
        assert_eq!(area, filled.len() as i32);
        assert_eq!(bounds, Box2i::new(0, 0, 4, 4));
    }
}
