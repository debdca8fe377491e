//! Merging one grid into another.

use ahash::AHashSet;
use glam::Vec2;
use tessera_common::{rotate, EntityId, MapError, MapResult, TileCoord};
use tessera_map::MapWorld;
use tracing::info;

use crate::system::{GridFixtureSystem, SplitOutcome};

impl GridFixtureSystem {
    /// Copies every tile and entity of `grid_b` onto `grid_a`, then deletes
    /// `grid_b`.
    ///
    /// B's tiles are rotated about B's origin by `rotation_degrees` and then
    /// shifted by `offset` tiles. Anchored entities stay anchored to their
    /// moved tile. The merged grid is split-checked once everything has moved.
    pub fn merge_grids(
        &mut self,
        world: &mut MapWorld,
        grid_a: EntityId,
        grid_b: EntityId,
        offset: TileCoord,
        rotation_degrees: f32,
    ) -> MapResult<SplitOutcome> {
        if grid_a == grid_b {
            return Err(MapError::SameGrid(grid_a));
        }
        if !rotation_degrees.is_finite() {
            return Err(MapError::NonFiniteRotation(rotation_degrees.to_string()));
        }
        let size_a = f32::from(world.grid(grid_a)?.tile_size());
        let size_b = f32::from(world.grid(grid_b)?.tile_size());
        if world.transform(grid_a)?.map != world.transform(grid_b)?.map {
            return Err(MapError::MismatchedMaps { a: grid_a, b: grid_b });
        }

        let radians = rotation_degrees.to_radians();
        let shift = Vec2::new(offset.x as f32, offset.y as f32);
        // Tile space of B to tile space of A.
        let place = |point: Vec2| rotate(point, radians) + shift;

        let tiles: Vec<_> = world
            .grid(grid_b)?
            .all_tiles()
            .into_iter()
            .map(|(tile, value)| {
                let center = place(Vec2::new(tile.x as f32 + 0.5, tile.y as f32 + 0.5));
                (TileCoord::new(center.x.floor() as i32, center.y.floor() as i32), value)
            })
            .collect();

        // Nothing is touched until every anchored child has a filled tile to land on.
        let placed: AHashSet<TileCoord> = tiles.iter().map(|&(tile, _)| tile).collect();
        let target = world.grid(grid_a)?;
        let mut moves = Vec::new();
        for child in world.children(grid_b)? {
            let transform = world.transform(child)?;
            let position = place(transform.local_position / size_b) * size_a;
            if transform.anchored {
                let tile = target.local_to_tile(position);
                if !placed.contains(&tile) && target.get_tile(tile).is_empty() {
                    return Err(MapError::EmptyTile { grid: grid_a, tile });
                }
            }
            moves.push((child, position, transform.local_rotation + radians, transform.anchored));
        }

        let changes = world.set_tiles(grid_a, &tiles)?;
        let dirty = self.apply_changes(world, grid_a, &changes)?;

        for &(child, position, rotation, anchored) in &moves {
            world.set_coordinates(child, grid_a, position, rotation)?;
            if anchored {
                world.anchor(child)?;
            }
        }

        self.delete_grid(world, grid_b)?;
        info!(
            "Merged grid {grid_b} into {grid_a}: {} tiles, {} entities",
            tiles.len(),
            moves.len()
        );
        self.check_splits(world, grid_a, dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_map::Tile;

    #[test]
    fn test_merge_rejects_same_grid_and_other_map() {
        let mut world = MapWorld::new();
        let map = world.create_map();
        let other_map = world.create_map();
        let mut system = GridFixtureSystem::default();
        let a = system.create_grid(&mut world, map, 8, 1).expect("a");
        let b = system.create_grid(&mut world, other_map, 8, 1).expect("b");

        assert_eq!(
            system.merge_grids(&mut world, a, a, TileCoord::ZERO, 0.0),
            Err(MapError::SameGrid(a))
        );
        assert_eq!(
            system.merge_grids(&mut world, a, b, TileCoord::ZERO, 0.0),
            Err(MapError::MismatchedMaps { a, b })
        );
    }

    #[test]
    fn test_merge_quarter_turn_places_tiles() {
        let mut world = MapWorld::new();
        let map = world.create_map();
        let mut system = GridFixtureSystem::default();
        let a = system.create_grid(&mut world, map, 8, 1).expect("a");
        let b = system.create_grid(&mut world, map, 8, 1).expect("b");
        system
            .set_tile(&mut world, a, TileCoord::new(0, 0), Tile::new(1))
            .expect("a tile");
        system
            .set_tiles(
                &mut world,
                b,
                &[(TileCoord::new(0, 0), Tile::new(2)), (TileCoord::new(1, 0), Tile::new(3))],
            )
            .expect("b tiles");

        // (0,0) -> (-1,0) and (1,0) -> (-1,1) before the offset of (1,1).
        let outcome = system
            .merge_grids(&mut world, a, b, TileCoord::new(1, 1), 90.0)
            .expect("merge");

        let data = world.grid(a).expect("grid a");
        assert_eq!(data.get_tile(TileCoord::new(0, 1)), Tile::new(2));
        assert_eq!(data.get_tile(TileCoord::new(0, 2)), Tile::new(3));
        assert_eq!(outcome, SplitOutcome::Connected);
        assert!(!world.contains(b));
        assert!(!system.has_grid(b));
    }

    #[test]
    fn test_non_finite_rotation_leaves_grids_untouched() {
        let mut world = MapWorld::new();
        let map = world.create_map();
        let mut system = GridFixtureSystem::default();
        let a = system.create_grid(&mut world, map, 8, 1).expect("a");
        let b = system.create_grid(&mut world, map, 8, 1).expect("b");
        let row: Vec<_> = (0..4).map(|x| (TileCoord::new(x, 0), Tile::new(2))).collect();
        system.set_tiles(&mut world, b, &row).expect("b tiles");

        for angle in [f32::NAN, f32::INFINITY] {
            assert!(matches!(
                system.merge_grids(&mut world, a, b, TileCoord::new(10, 0), angle),
                Err(MapError::NonFiniteRotation(_))
            ));
        }
        assert_eq!(world.grid(a).expect("a").filled_tiles(), 0);
        assert_eq!(world.grid(b).expect("b").filled_tiles(), 4);
    }

    #[test]
    fn test_unplaceable_anchor_fails_before_moving_anything() {
        let mut world = MapWorld::new();
        let map = world.create_map();
        let mut system = GridFixtureSystem::default();
        let a = system.create_grid(&mut world, map, 8, 1).expect("a");
        let b = system.create_grid(&mut world, map, 8, 1).expect("b");
        system
            .set_tile(&mut world, a, TileCoord::new(0, 0), Tile::new(1))
            .expect("a tile");
        system
            .set_tile(&mut world, b, TileCoord::new(0, 0), Tile::new(2))
            .expect("b tile");
        let free = world.spawn("crate", b, Vec2::new(0.25, 0.25)).expect("free");
        let wall = world.spawn_anchored("wall", b, TileCoord::new(0, 0)).expect("wall");
        // Still flagged anchored, but positioned over a tile nothing fills.
        world
            .set_local_position_rotation(wall, Vec2::new(3.5, 3.5), 0.0)
            .expect("nudge");

        assert_eq!(
            system.merge_grids(&mut world, a, b, TileCoord::new(1, 0), 0.0),
            Err(MapError::EmptyTile {
                grid: a,
                tile: TileCoord::new(4, 3),
            })
        );
        assert_eq!(world.grid(a).expect("a").filled_tiles(), 1);
        assert_eq!(world.grid(b).expect("b").filled_tiles(), 1);
        assert_eq!(world.transform(free).expect("free").parent, Some(b));
        assert!(system.has_grid(b));
    }
}
