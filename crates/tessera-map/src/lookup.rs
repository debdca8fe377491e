//! Spatial queries over a grid's entities.

use tessera_common::{Box2, EntityId, MapResult, TileCoord};

use crate::transform::BodyType;
use crate::world::{EntityRecord, MapWorld};

/// Decides whether a non-anchored entity is carried along when the tile under
/// it moves to another grid.
pub type EntityFilter = fn(&EntityRecord) -> bool;

/// Default "sundry" filter: anything that is not anchored, not a grid, and not
/// a static body.
#[must_use]
pub fn default_sundry_filter(record: &EntityRecord) -> bool {
    !record.transform.anchored
        && !record.is_grid()
        && record.body.map_or(true, |body| body.body_type != BodyType::Static)
}

impl MapWorld {
    /// Entities anchored to a grid tile.
    pub fn anchored_entities(&self, grid: EntityId, tile: TileCoord) -> MapResult<Vec<EntityId>> {
        Ok(self.grid(grid)?.anchored_at(tile).to_vec())
    }

    /// Non-anchored direct children of `grid` whose local position lies in
    /// `bounds` and that pass `filter`.
    pub fn local_entities_intersecting(
        &self,
        grid: EntityId,
        bounds: Box2,
        filter: EntityFilter,
    ) -> MapResult<Vec<EntityId>> {
        self.grid(grid)?;
        let mut found = Vec::new();
        for child in self.transform(grid)?.children() {
            let record = self.entity(child)?;
            if record.transform.anchored || !bounds.contains(record.transform.local_position) {
                continue;
            }
            if filter(record) {
                found.push(child);
            }
        }
        Ok(found)
    }

    /// Free entities standing on one tile of `grid`.
    pub fn entities_on_tile(
        &self,
        grid: EntityId,
        tile: TileCoord,
        filter: EntityFilter,
    ) -> MapResult<Vec<EntityId>> {
        let bounds = self.grid(grid)?.tile_local_bounds(tile);
        self.local_entities_intersecting(grid, bounds, filter)
    }
}
