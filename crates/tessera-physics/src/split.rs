//! Moving disconnected pieces of a grid onto grids of their own.

use glam::Vec2;
use tessera_common::{EntityId, MapError, MapResult};
use tessera_map::{MapWorld, Tile};
use tracing::info;

use crate::connectivity::SplitComponent;
use crate::events::GridEvent;
use crate::system::GridFixtureSystem;

impl GridFixtureSystem {
    /// Moves every component except the last onto a new grid.
    ///
    /// `components` must be sorted by ascending tile count; the last one
    /// stays on `grid`. Returns the new grids in component order.
    pub(crate) fn split_grid(
        &mut self,
        world: &mut MapWorld,
        grid: EntityId,
        components: &[SplitComponent],
    ) -> MapResult<Vec<EntityId>> {
        let Some((_, moving)) = components.split_last() else {
            return Ok(Vec::new());
        };

        let map = world.transform(grid)?.map.ok_or(MapError::NotAGrid(grid))?;
        let (chunk_size, tile_size) = {
            let data = world.grid(grid)?;
            (data.chunk_size(), data.tile_size())
        };
        let (position, rotation) = world.world_position_rotation(grid)?;
        let (linear, angular) = world
            .body(grid)
            .map_or((Vec2::ZERO, 0.0), |body| (body.linear_velocity, body.angular_velocity));

        let mut new_grids = Vec::with_capacity(moving.len());
        for component in moving {
            let new_grid = self.create_grid(world, map, chunk_size, tile_size)?;
            world.set_world_position_rotation(new_grid, position, rotation)?;
            world.set_velocity(new_grid, linear, angular)?;

            let tiles: Vec<_> = {
                let data = world.grid(grid)?;
                component
                    .tiles()
                    .iter()
                    .map(|&tile| (tile, data.get_tile(tile)))
                    .collect()
            };
            self.set_tiles(world, new_grid, &tiles)?;

            for &tile in component.tiles() {
                for entity in world.anchored_entities(grid, tile)? {
                    world.move_anchored(entity, new_grid)?;
                    debug_assert!(
                        world.transform(entity).is_ok_and(|t| t.anchored && t.parent == Some(new_grid)),
                        "entity {entity} not anchored to {new_grid} after split"
                    );
                }
            }

            let filter = self.sundry_filter();
            for &tile in component.tiles() {
                for entity in world.entities_on_tile(grid, tile, filter)? {
                    world.set_parent(entity, new_grid)?;
                }
            }

            self.raise(world, GridEvent::PostGridSplit { old_grid: grid, new_grid });

            let cleared: Vec<_> = tiles.iter().map(|&(tile, _)| (tile, Tile::EMPTY)).collect();
            self.set_tiles(world, grid, &cleared)?;

            if let Some(index) = self.connectivity_mut(grid) {
                for &node in component.nodes() {
                    index.remove_node(node);
                }
            }

            info!(
                "Split {} tiles off grid {grid} onto new grid {new_grid}",
                component.tile_count()
            );
            new_grids.push(new_grid);
        }

        self.raise(
            world,
            GridEvent::GridSplit {
                old_grid: grid,
                new_grids: new_grids.clone(),
            },
        );
        Ok(new_grids)
    }
}
