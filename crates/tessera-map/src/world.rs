//! Entity storage for maps, grids, and everything parented to them.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use glam::Vec2;
use tessera_common::{rotate, EntityId, MapError, MapId, MapResult, TileCoord};
use tracing::{debug, info};

use crate::grid::{ChunkChangeSet, MapGrid};
use crate::tile::Tile;
use crate::transform::{BodyType, PhysicsBody, Transform};

/// Components attached to a single entity.
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    /// Debug name
    pub name: String,
    /// Position in the hierarchy
    pub transform: Transform,
    /// Physics body, if simulated
    pub body: Option<PhysicsBody>,
    /// Grid data, if this entity is a grid
    pub(crate) grid: Option<MapGrid>,
}

impl EntityRecord {
    /// Grid data if this entity is a grid.
    #[must_use]
    pub fn grid(&self) -> Option<&MapGrid> {
        self.grid.as_ref()
    }

    /// Whether this entity is a grid.
    #[must_use]
    pub fn is_grid(&self) -> bool {
        self.grid.is_some()
    }
}

/// Owns every entity of every map.
#[derive(Debug, Default)]
pub struct MapWorld {
    /// Last allocated entity id
    next_entity: u64,
    /// Last allocated map id
    next_map: u32,
    /// All live entities
    entities: AHashMap<EntityId, EntityRecord>,
    /// Root entity of each map
    maps: BTreeMap<MapId, EntityId>,
}

impl MapWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId::from_raw(self.next_entity)
    }

    /// Creates a new map and its root entity.
    pub fn create_map(&mut self) -> MapId {
        self.next_map += 1;
        let map = MapId::new(self.next_map);
        let root = self.alloc_id();
        self.entities.insert(
            root,
            EntityRecord {
                name: format!("map {map}"),
                transform: Transform {
                    map: Some(map),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        self.maps.insert(map, root);
        info!("Created map {map} (root entity {root})");
        map
    }

    /// Returns the root entity of a map.
    pub fn map_entity(&self, map: MapId) -> MapResult<EntityId> {
        self.maps.get(&map).copied().ok_or(MapError::MapNotFound(map))
    }

    /// All maps, sorted.
    pub fn maps(&self) -> impl Iterator<Item = MapId> + '_ {
        self.maps.keys().copied()
    }

    fn insert_child(
        &mut self,
        name: String,
        parent: EntityId,
        local_position: Vec2,
        local_rotation: f32,
    ) -> MapResult<EntityId> {
        let map = self.transform(parent)?.map;
        let id = self.alloc_id();
        self.entities.insert(
            id,
            EntityRecord {
                name,
                transform: Transform {
                    parent: Some(parent),
                    map,
                    local_position,
                    local_rotation,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        self.entity_mut(parent)?.transform.children.insert(id);
        Ok(id)
    }

    /// Spawns a free entity parented to `parent`.
    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        parent: EntityId,
        local_position: Vec2,
    ) -> MapResult<EntityId> {
        self.insert_child(name.into(), parent, local_position, 0.0)
    }

    /// Spawns an entity anchored to a filled tile of `grid`.
    pub fn spawn_anchored(
        &mut self,
        name: impl Into<String>,
        grid: EntityId,
        tile: TileCoord,
    ) -> MapResult<EntityId> {
        let center = {
            let data = self.grid(grid)?;
            if data.get_tile(tile).is_empty() {
                return Err(MapError::EmptyTile { grid, tile });
            }
            data.tile_center(tile)
        };
        let id = self.insert_child(name.into(), grid, center, 0.0)?;
        self.anchor(id)?;
        Ok(id)
    }

    /// Creates a grid entity on `map` with a dynamic body at rest.
    pub fn create_grid(&mut self, map: MapId, chunk_size: u16, tile_size: u16) -> MapResult<EntityId> {
        let root = self.map_entity(map)?;
        let id = self.insert_child(String::from("grid"), root, Vec2::ZERO, 0.0)?;
        let record = self.entity_mut(id)?;
        record.name = format!("grid {id}");
        record.grid = Some(MapGrid::new(chunk_size, tile_size));
        record.body = Some(PhysicsBody::new(BodyType::Dynamic));
        debug!("Created grid {id} on map {map}");
        Ok(id)
    }

    /// Deletes an entity and all of its descendants. Returns the deleted ids,
    /// children before parents.
    pub fn delete_entity(&mut self, entity: EntityId) -> MapResult<Vec<EntityId>> {
        let parent = self.transform(entity)?.parent;
        let mut order = Vec::new();
        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Ok(transform) = self.transform(current) {
                stack.extend(transform.children());
            }
        }
        order.reverse();

        // Only the top entity can be anchored to a grid that survives.
        if self.transform(entity)?.anchored {
            self.unanchor(entity)?;
        }
        if let Some(parent) = parent {
            if let Some(record) = self.entities.get_mut(&parent) {
                record.transform.children.remove(&entity);
            }
        }
        for id in &order {
            self.entities.remove(id);
        }
        if let Some(map) = self.maps.iter().find(|(_, root)| **root == entity).map(|(m, _)| *m) {
            self.maps.remove(&map);
        }
        Ok(order)
    }

    /// Whether an entity exists.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Number of live entities, including map roots.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Gets an entity's components.
    pub fn entity(&self, entity: EntityId) -> MapResult<&EntityRecord> {
        self.entities.get(&entity).ok_or(MapError::EntityNotFound(entity))
    }

    fn entity_mut(&mut self, entity: EntityId) -> MapResult<&mut EntityRecord> {
        self.entities.get_mut(&entity).ok_or(MapError::EntityNotFound(entity))
    }

    /// Gets an entity's transform.
    pub fn transform(&self, entity: EntityId) -> MapResult<&Transform> {
        self.entity(entity).map(|record| &record.transform)
    }

    /// Gets an entity's physics body.
    #[must_use]
    pub fn body(&self, entity: EntityId) -> Option<&PhysicsBody> {
        self.entities.get(&entity).and_then(|record| record.body.as_ref())
    }

    /// Replaces an entity's physics body.
    pub fn set_body(&mut self, entity: EntityId, body: PhysicsBody) -> MapResult<()> {
        self.entity_mut(entity)?.body = Some(body);
        Ok(())
    }

    /// Sets linear and angular velocity, adding a dynamic body if missing.
    pub fn set_velocity(&mut self, entity: EntityId, linear: Vec2, angular: f32) -> MapResult<()> {
        let body = self.entity_mut(entity)?.body.get_or_insert_with(PhysicsBody::default);
        body.linear_velocity = linear;
        body.angular_velocity = angular;
        Ok(())
    }

    /// Gets grid data for a grid entity.
    pub fn grid(&self, entity: EntityId) -> MapResult<&MapGrid> {
        self.entity(entity)?.grid.as_ref().ok_or(MapError::NotAGrid(entity))
    }

    /// Gets mutable grid metadata. Tiles can only be changed through [`MapWorld::set_tiles`].
    pub fn grid_mut(&mut self, entity: EntityId) -> MapResult<&mut MapGrid> {
        self.entity_mut(entity)?.grid.as_mut().ok_or(MapError::NotAGrid(entity))
    }

    /// Whether an entity is a grid.
    #[must_use]
    pub fn is_grid(&self, entity: EntityId) -> bool {
        self.entities.get(&entity).is_some_and(EntityRecord::is_grid)
    }

    /// All grid entities, sorted.
    #[must_use]
    pub fn grids(&self) -> Vec<EntityId> {
        let mut grids: Vec<_> = self
            .entities
            .iter()
            .filter(|(_, record)| record.is_grid())
            .map(|(id, _)| *id)
            .collect();
        grids.sort_unstable();
        grids
    }

    /// Grid entities on one map, sorted.
    #[must_use]
    pub fn grids_on_map(&self, map: MapId) -> Vec<EntityId> {
        self.grids()
            .into_iter()
            .filter(|id| self.transform(*id).is_ok_and(|t| t.map == Some(map)))
            .collect()
    }

    /// Direct children of an entity, sorted.
    pub fn children(&self, entity: EntityId) -> MapResult<Vec<EntityId>> {
        self.transform(entity).map(|t| t.children().collect())
    }

    /// World position and rotation, composed up the parent chain.
    pub fn world_position_rotation(&self, entity: EntityId) -> MapResult<(Vec2, f32)> {
        let transform = self.transform(entity)?;
        let mut position = transform.local_position;
        let mut rotation = transform.local_rotation;
        let mut current = transform.parent;
        while let Some(parent) = current {
            let parent_transform = self.transform(parent)?;
            position = parent_transform.local_position + rotate(position, parent_transform.local_rotation);
            rotation += parent_transform.local_rotation;
            current = parent_transform.parent;
        }
        Ok((position, rotation))
    }

    /// World position of an entity.
    pub fn world_position(&self, entity: EntityId) -> MapResult<Vec2> {
        self.world_position_rotation(entity).map(|(position, _)| position)
    }

    /// Moves an entity so its world transform matches the given values.
    pub fn set_world_position_rotation(
        &mut self,
        entity: EntityId,
        position: Vec2,
        rotation: f32,
    ) -> MapResult<()> {
        let parent = self.transform(entity)?.parent;
        let (parent_position, parent_rotation) = match parent {
            Some(parent) => self.world_position_rotation(parent)?,
            None => (Vec2::ZERO, 0.0),
        };
        let transform = &mut self.entity_mut(entity)?.transform;
        transform.local_position = rotate(position - parent_position, -parent_rotation);
        transform.local_rotation = rotation - parent_rotation;
        Ok(())
    }

    /// Sets the local position and rotation directly.
    pub fn set_local_position_rotation(
        &mut self,
        entity: EntityId,
        position: Vec2,
        rotation: f32,
    ) -> MapResult<()> {
        let transform = &mut self.entity_mut(entity)?.transform;
        transform.local_position = position;
        transform.local_rotation = rotation;
        Ok(())
    }

    fn attach(&mut self, entity: EntityId, new_parent: EntityId) -> MapResult<()> {
        let map = self.transform(new_parent)?.map;
        let old_parent = self.transform(entity)?.parent;
        if let Some(old) = old_parent {
            if let Some(record) = self.entities.get_mut(&old) {
                record.transform.children.remove(&entity);
            }
        }
        self.entity_mut(new_parent)?.transform.children.insert(entity);
        let transform = &mut self.entity_mut(entity)?.transform;
        transform.parent = Some(new_parent);
        transform.map = map;
        Ok(())
    }

    /// Reparents an entity, keeping its world position and rotation.
    /// Anchored entities are unanchored first.
    pub fn set_parent(&mut self, entity: EntityId, new_parent: EntityId) -> MapResult<()> {
        debug_assert_ne!(entity, new_parent, "entity cannot parent itself");
        if self.transform(entity)?.anchored {
            self.unanchor(entity)?;
        }
        let (position, rotation) = self.world_position_rotation(entity)?;
        self.attach(entity, new_parent)?;
        self.set_world_position_rotation(entity, position, rotation)
    }

    /// Reparents an entity and places it at the given local coordinates.
    /// Anchored entities are unanchored first.
    pub fn set_coordinates(
        &mut self,
        entity: EntityId,
        new_parent: EntityId,
        local_position: Vec2,
        local_rotation: f32,
    ) -> MapResult<()> {
        debug_assert_ne!(entity, new_parent, "entity cannot parent itself");
        self.unanchor(entity)?;
        self.attach(entity, new_parent)?;
        self.set_local_position_rotation(entity, local_position, local_rotation)
    }

    /// Moves an anchored entity to the same tile of another grid, keeping its
    /// local position and rotation numerically unchanged.
    pub fn move_anchored(&mut self, entity: EntityId, new_grid: EntityId) -> MapResult<()> {
        let transform = self.transform(entity)?;
        debug_assert!(transform.anchored, "entity {entity} is not anchored");
        let local_position = transform.local_position;
        let Some(old_grid) = transform.parent else {
            return Err(MapError::NotAGrid(entity));
        };

        let tile = self.grid(old_grid)?.local_to_tile(local_position);
        self.remove_from_snap_grid(old_grid, tile, entity)?;

        let target = self.grid(new_grid)?;
        if target.get_tile(tile).is_empty() {
            return Err(MapError::EmptyTile { grid: new_grid, tile });
        }
        self.attach(entity, new_grid)?;
        self.add_to_snap_grid(new_grid, tile, entity)
    }

    /// Anchors an entity to the tile of its parent grid under its local
    /// position, snapping it to the tile centre.
    pub fn anchor(&mut self, entity: EntityId) -> MapResult<TileCoord> {
        let transform = self.transform(entity)?;
        let Some(grid) = transform.parent else {
            return Err(MapError::NotAGrid(entity));
        };
        let local_position = transform.local_position;
        let data = self.grid(grid)?;
        let tile = data.local_to_tile(local_position);
        if data.get_tile(tile).is_empty() {
            return Err(MapError::EmptyTile { grid, tile });
        }
        let center = data.tile_center(tile);

        self.add_to_snap_grid(grid, tile, entity)?;
        let transform = &mut self.entity_mut(entity)?.transform;
        transform.local_position = center;
        transform.anchored = true;
        Ok(tile)
    }

    /// Removes an entity from its tile's snap grid. No-op if not anchored.
    pub fn unanchor(&mut self, entity: EntityId) -> MapResult<()> {
        let transform = self.transform(entity)?;
        if !transform.anchored {
            return Ok(());
        }
        if let Some(grid) = transform.parent {
            let tile = self.grid(grid)?.local_to_tile(transform.local_position);
            self.remove_from_snap_grid(grid, tile, entity)?;
        }
        self.entity_mut(entity)?.transform.anchored = false;
        Ok(())
    }

    fn add_to_snap_grid(&mut self, grid: EntityId, tile: TileCoord, entity: EntityId) -> MapResult<()> {
        let data = self.grid_mut(grid)?;
        let size = data.chunk_size();
        match data.chunk_mut(tile.to_chunk_coord(size)) {
            Some(chunk) => {
                chunk.add_anchored(tile.to_local_coord(size), entity);
                Ok(())
            },
            None => Err(MapError::EmptyTile { grid, tile }),
        }
    }

    fn remove_from_snap_grid(&mut self, grid: EntityId, tile: TileCoord, entity: EntityId) -> MapResult<()> {
        let data = self.grid_mut(grid)?;
        let size = data.chunk_size();
        if let Some(chunk) = data.chunk_mut(tile.to_chunk_coord(size)) {
            chunk.remove_anchored(tile.to_local_coord(size), entity);
        }
        Ok(())
    }

    /// Sets many tiles on a grid and regenerates collision once for every
    /// modified chunk. Entities anchored to tiles that become empty are
    /// unanchored.
    pub fn set_tiles(&mut self, grid: EntityId, tiles: &[(TileCoord, Tile)]) -> MapResult<ChunkChangeSet> {
        let mut modified = BTreeSet::new();
        let mut detached = Vec::new();
        {
            let data = self.grid_mut(grid)?;
            for &(tile, value) in tiles {
                if let Some(coord) = data.write_tile(tile, value) {
                    modified.insert(coord);
                    if value.is_empty() {
                        detached.extend_from_slice(data.anchored_at(tile));
                    }
                }
            }
        }
        for entity in detached {
            self.unanchor(entity)?;
        }

        let changes = self.grid_mut(grid)?.regenerate_collision(&modified);
        debug!(
            "Grid {grid}: {} tiles written, {} chunks changed, {} removed",
            tiles.len(),
            changes.changed.len(),
            changes.removed.len()
        );
        Ok(changes)
    }
}
