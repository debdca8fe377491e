//! Integration tests for grid connectivity and splitting.
//!
//! Every scenario drives the system the way a game would: tile writes go
//! through `GridFixtureSystem`, and the resulting world is inspected.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use glam::Vec2;
use proptest::prelude::*;
use tessera_common::{EntityId, MapId, SessionId, TileCoord};
use tessera_map::{BodyType, MapWorld, PhysicsBody, Tile};
use tessera_physics::{
    ChunkSplitDebugMessage, DirtyNodes, GridConnectivity, GridEvent, GridFixtureSystem, SplitConfig,
    SplitOutcome,
};

fn world_with_system(config: SplitConfig) -> (MapWorld, MapId, GridFixtureSystem) {
    let mut world = MapWorld::new();
    let map = world.create_map();
    (world, map, GridFixtureSystem::new(config))
}

fn row(from: i32, to: i32) -> Vec<(TileCoord, Tile)> {
    (from..to).map(|x| (TileCoord::new(x, 0), Tile::new(1))).collect()
}

fn tiles_of(world: &MapWorld, grid: EntityId) -> BTreeSet<TileCoord> {
    world
        .grid(grid)
        .expect("grid")
        .all_tiles()
        .into_iter()
        .map(|(tile, _)| tile)
        .collect()
}

fn set_of(tiles: &[(i32, i32)]) -> BTreeSet<TileCoord> {
    tiles.iter().map(|&(x, y)| TileCoord::new(x, y)).collect()
}

fn component_count(index: &GridConnectivity) -> usize {
    let all: DirtyNodes = index.nodes().map(|(id, _)| id).collect();
    index.find_components(all).len()
}

/// A single-row grid of five tiles, as used by most split scenarios.
fn five_tile_row() -> (MapWorld, GridFixtureSystem, EntityId) {
    let (mut world, map, mut system) = world_with_system(SplitConfig::default());
    let grid = system.create_grid(&mut world, map, 16, 1).expect("grid");
    let outcome = system.set_tiles(&mut world, grid, &row(0, 5)).expect("fill");
    assert_eq!(outcome, SplitOutcome::Connected);
    (world, system, grid)
}

mod connectivity_tests {
    use super::*;

    #[test]
    fn every_filled_tile_is_in_exactly_one_node() {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let grid = system.create_grid(&mut world, map, 4, 1).expect("grid");
        let pattern: Vec<_> = (0..10)
            .flat_map(|x| (0..3).map(move |y| (x, y)))
            .filter(|(x, y)| (x + y) % 3 != 0 || *y == 1)
            .map(|(x, y)| (TileCoord::new(x, y), Tile::new(1)))
            .collect();
        system.set_tiles(&mut world, grid, &pattern).expect("fill");

        let index = system.connectivity(grid).expect("index");
        for tile in tiles_of(&world, grid) {
            let holders = index
                .nodes()
                .filter(|(_, node)| node.tiles(4).any(|t| t == tile))
                .count();
            assert_eq!(holders, 1, "tile {tile} should be in exactly one node");
        }
        assert_eq!(index.tile_count(), world.grid(grid).expect("grid").filled_tiles() as usize);
        assert!(index.check_symmetry());
    }

    #[test]
    fn regenerating_unchanged_chunk_gives_same_partition() {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let grid = system.create_grid(&mut world, map, 4, 1).expect("grid");
        system
            .set_tiles(
                &mut world,
                grid,
                &[
                    (TileCoord::new(0, 0), Tile::new(1)),
                    (TileCoord::new(1, 0), Tile::new(1)),
                    (TileCoord::new(1, 1), Tile::new(1)),
                    (TileCoord::new(1, 2), Tile::new(1)),
                    (TileCoord::new(2, 2), Tile::new(1)),
                    (TileCoord::new(3, 2), Tile::new(1)),
                    (TileCoord::new(4, 2), Tile::new(1)),
                ],
            )
            .expect("fill");

        let partition = |system: &GridFixtureSystem| -> BTreeSet<(BTreeSet<TileCoord>, usize)> {
            let index = system.connectivity(grid).expect("index");
            index
                .nodes()
                .map(|(_, node)| (node.tiles(4).collect(), node.neighbors().len()))
                .collect()
        };
        let before = partition(&system);

        let chunk = world
            .grid(grid)
            .expect("grid")
            .chunk(tessera_common::ChunkCoord::new(0, 0))
            .expect("chunk")
            .clone();
        system.regenerate_chunk(grid, &chunk);
        system.regenerate_chunk(grid, &chunk);

        assert_eq!(partition(&system), before);
        assert!(system.connectivity(grid).expect("index").check_symmetry());
    }

    #[test]
    fn straight_cross_chunk_edges_join_and_diagonals_do_not() {
        let (mut world, map, mut system) = world_with_system(SplitConfig {
            split_allowed: false,
            ..SplitConfig::default()
        });
        let grid = system.create_grid(&mut world, map, 4, 1).expect("grid");
        system
            .set_tiles(
                &mut world,
                grid,
                &[
                    (TileCoord::new(3, 0), Tile::new(1)),
                    (TileCoord::new(4, 0), Tile::new(1)),
                    (TileCoord::new(5, 4), Tile::new(1)),
                    (TileCoord::new(4, 4), Tile::new(1)),
                    (TileCoord::new(3, 3), Tile::new(1)),
                ],
            )
            .expect("fill");

        let index = system.connectivity(grid).expect("index");
        let a = index.find_node_for_tile(TileCoord::new(3, 0)).expect("a");
        let b = index.find_node_for_tile(TileCoord::new(4, 0)).expect("b");
        let corner = index.find_node_for_tile(TileCoord::new(3, 3)).expect("corner");
        let diagonal = index.find_node_for_tile(TileCoord::new(4, 4)).expect("diagonal");

        assert!(index.neighbors_of(a).contains(&b), "east edge should link");
        assert!(index.neighbors_of(b).contains(&a), "links are mutual");
        assert!(
            !index.neighbors_of(corner).contains(&diagonal),
            "diagonal chunks never link"
        );
        assert_eq!(component_count(index), 3);
    }

    #[test]
    fn grid_initialize_indexes_existing_tiles() {
        let mut world = MapWorld::new();
        let map = world.create_map();
        let grid = world.create_grid(map, 8, 1).expect("grid");
        world.set_tiles(grid, &row(0, 12)).expect("tiles");

        let mut system = GridFixtureSystem::default();
        system.on_grid_initialize(&world, grid).expect("init");
        let index = system.connectivity(grid).expect("index");
        assert_eq!(index.tile_count(), 12);
        assert_eq!(component_count(index), 1);
    }
}

mod split_tests {
    use super::*;

    #[test]
    fn removing_middle_tile_splits_row() {
        let (mut world, mut system, grid) = five_tile_row();

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");

        let new_grids = outcome.new_grids().to_vec();
        assert_eq!(new_grids.len(), 1, "one piece should split off");
        assert_eq!(tiles_of(&world, grid), set_of(&[(3, 0), (4, 0)]));
        assert_eq!(tiles_of(&world, new_grids[0]), set_of(&[(0, 0), (1, 0)]));
        assert_eq!(world.grids().len(), 2);
        assert!(!system.is_splitting());
    }

    #[test]
    fn removing_end_tile_does_not_split() {
        let (mut world, mut system, grid) = five_tile_row();

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(4, 0), Tile::EMPTY)
            .expect("clear");

        assert_eq!(outcome, SplitOutcome::Connected);
        assert_eq!(world.grids(), vec![grid]);
        assert_eq!(tiles_of(&world, grid).len(), 4);
    }

    #[test]
    fn clearing_and_refilling_interior_tiles_never_splits() {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let grid = system.create_grid(&mut world, map, 4, 1).expect("grid");
        let block: Vec<_> = (0..6)
            .flat_map(|y| (0..6).map(move |x| (TileCoord::new(x, y), Tile::new(1))))
            .collect();
        system.set_tiles(&mut world, grid, &block).expect("fill");
        assert_eq!(world.grid(grid).expect("grid").chunk_count(), 4);

        // Chunk corner, the chunk diagonal to it, and a chunk's south edge.
        for (x, y) in [(3, 3), (4, 4), (1, 4)] {
            let tile = TileCoord::new(x, y);
            let cleared = system.set_tile(&mut world, grid, tile, Tile::EMPTY).expect("clear");
            assert_eq!(cleared, SplitOutcome::Connected, "clearing {tile}");
            let refilled = system.set_tile(&mut world, grid, tile, Tile::new(1)).expect("refill");
            assert_eq!(refilled, SplitOutcome::Connected, "refilling {tile}");
        }

        assert_eq!(world.grids(), vec![grid]);
        assert_eq!(tiles_of(&world, grid).len(), 36);
        let index = system.connectivity(grid).expect("index");
        assert!(index.check_symmetry());
        assert_eq!(component_count(index), 1);
    }

    #[test]
    fn split_conserves_tiles_and_keeps_largest() {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let grid = system.create_grid(&mut world, map, 16, 1).expect("grid");
        system.set_tiles(&mut world, grid, &row(0, 7)).expect("fill");

        let outcome = system
            .set_tiles(
                &mut world,
                grid,
                &[(TileCoord::new(2, 0), Tile::EMPTY), (TileCoord::new(4, 0), Tile::EMPTY)],
            )
            .expect("clear");

        // Pieces sized 2, 1, 2: the single tile goes first, then the earlier
        // of the two equal pieces. The later one stays.
        let new_grids = outcome.new_grids().to_vec();
        assert_eq!(new_grids.len(), 2);
        assert_eq!(tiles_of(&world, new_grids[0]), set_of(&[(3, 0)]));
        assert_eq!(tiles_of(&world, new_grids[1]), set_of(&[(0, 0), (1, 0)]));
        assert_eq!(tiles_of(&world, grid), set_of(&[(5, 0), (6, 0)]));

        let total: usize = world.grids().iter().map(|&g| tiles_of(&world, g).len()).sum();
        assert_eq!(total, 5);
        for g in world.grids() {
            assert_eq!(component_count(system.connectivity(g).expect("index")), 1);
        }
    }

    #[test]
    fn split_across_chunk_boundary() {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let grid = system.create_grid(&mut world, map, 4, 1).expect("grid");
        system.set_tiles(&mut world, grid, &row(0, 8)).expect("fill");

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(4, 0), Tile::EMPTY)
            .expect("clear");

        let new_grids = outcome.new_grids().to_vec();
        assert_eq!(new_grids.len(), 1);
        assert_eq!(tiles_of(&world, new_grids[0]), set_of(&[(5, 0), (6, 0), (7, 0)]));
        assert_eq!(tiles_of(&world, grid), set_of(&[(0, 0), (1, 0), (2, 0), (3, 0)]));
    }

    #[test]
    fn new_grid_keeps_transform_and_velocity() {
        let (mut world, mut system, grid) = five_tile_row();
        world
            .set_world_position_rotation(grid, Vec2::new(10.0, -3.0), 0.25)
            .expect("move");
        world.set_velocity(grid, Vec2::new(2.0, 0.0), 0.5).expect("velocity");

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");
        let new_grid = outcome.new_grids()[0];

        let body = world.body(new_grid).expect("body");
        assert_eq!(body.linear_velocity, Vec2::new(2.0, 0.0));
        assert_eq!(body.angular_velocity, 0.5);
        let (position, rotation) = world.world_position_rotation(new_grid).expect("transform");
        assert!(position.distance(Vec2::new(10.0, -3.0)) < 1e-5);
        assert!((rotation - 0.25).abs() < 1e-6);
    }

    #[test]
    fn anchored_entities_follow_their_tile() {
        let (mut world, mut system, grid) = five_tile_row();
        let wall = world.spawn_anchored("wall", grid, TileCoord::new(0, 0)).expect("wall");
        let door = world.spawn_anchored("door", grid, TileCoord::new(4, 0)).expect("door");

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");
        let new_grid = outcome.new_grids()[0];

        let transform = world.transform(wall).expect("wall transform");
        assert!(transform.anchored, "wall should stay anchored");
        assert_eq!(transform.parent, Some(new_grid));
        assert_eq!(transform.local_position, Vec2::new(0.5, 0.5));
        assert_eq!(world.grid(new_grid).expect("grid").anchored_at(TileCoord::new(0, 0)), &[wall]);
        assert!(world.grid(grid).expect("grid").anchored_at(TileCoord::new(0, 0)).is_empty());

        assert_eq!(world.transform(door).expect("door").parent, Some(grid));
    }

    #[test]
    fn free_entities_move_and_keep_world_position() {
        let (mut world, mut system, grid) = five_tile_row();
        world
            .set_world_position_rotation(grid, Vec2::new(3.0, 1.0), 0.0)
            .expect("move");
        let crate_ = world.spawn("crate", grid, Vec2::new(1.5, 0.4)).expect("crate");
        let statue = world.spawn("statue", grid, Vec2::new(0.5, 0.5)).expect("statue");
        world.set_body(statue, PhysicsBody::new(BodyType::Static)).expect("body");
        let before = world.world_position(crate_).expect("position");

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");
        let new_grid = outcome.new_grids()[0];

        assert_eq!(world.transform(crate_).expect("crate").parent, Some(new_grid));
        assert!(world.world_position(crate_).expect("position").distance(before) < 1e-5);
        assert_eq!(
            world.transform(statue).expect("statue").parent,
            Some(grid),
            "static bodies are not carried along"
        );
    }

    #[test]
    fn custom_sundry_filter_is_used() {
        let (mut world, mut system, grid) = five_tile_row();
        system.set_sundry_filter(|_| false);
        let crate_ = world.spawn("crate", grid, Vec2::new(0.5, 0.5)).expect("crate");

        system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");

        assert_eq!(world.transform(crate_).expect("crate").parent, Some(grid));
    }

    #[test]
    fn events_arrive_in_order_and_before_clearing() {
        let (mut world, mut system, grid) = five_tile_row();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        system.add_handler(Box::new(move |event: &GridEvent, world: &MapWorld| {
            let old_tile_filled = !world
                .grid(event.grid())
                .expect("old grid")
                .get_tile(TileCoord::new(0, 0))
                .is_empty();
            log.borrow_mut().push((event.clone(), old_tile_filled));
        }));

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");
        let new_grid = outcome.new_grids()[0];

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, GridEvent::PostGridSplit { old_grid: grid, new_grid });
        assert!(seen[0].1, "old tiles are still present during PostGridSplit");
        assert_eq!(
            seen[1].0,
            GridEvent::GridSplit {
                old_grid: grid,
                new_grids: vec![new_grid],
            }
        );
        assert!(!seen[1].1);
        assert_eq!(system.events().drain().len(), 2);
    }

    #[test]
    fn disabled_splitting_leaves_grid_whole() {
        let (mut world, mut system, grid) = five_tile_row();
        system.set_split_allowed(false);

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");

        assert_eq!(outcome, SplitOutcome::Disabled);
        assert_eq!(world.grids(), vec![grid]);
        assert_eq!(component_count(system.connectivity(grid).expect("index")), 2);
    }
}

mod debug_tests {
    use super::*;

    #[test]
    fn subscriber_gets_full_state_then_updates() {
        let (mut world, mut system, grid) = five_tile_row();
        let session = SessionId::new(4);

        assert!(system.subscribe_debug(&world, session));
        let initial = system.debug_mut().drain();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].0, session);
        assert_eq!(initial[0].1.grid, grid);

        let outcome = system
            .set_tile(&mut world, grid, TileCoord::new(2, 0), Tile::EMPTY)
            .expect("clear");
        let updates = system.debug_mut().drain();
        let grids: Vec<_> = updates.iter().map(|(_, message)| message.grid).collect();
        assert_eq!(grids, vec![grid, outcome.new_grids()[0]]);

        let json = serde_json::to_string(&updates[0].1).expect("serialize");
        let back: ChunkSplitDebugMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, updates[0].1);
    }

    #[test]
    fn disconnect_stops_updates() {
        let (mut world, mut system, grid) = five_tile_row();
        let session = SessionId::new(9);
        system.subscribe_debug(&world, session);
        system.on_session_disconnected(session);

        system
            .set_tile(&mut world, grid, TileCoord::new(4, 0), Tile::EMPTY)
            .expect("clear");
        assert!(system.debug_mut().drain().is_empty());
        assert!(!system.debug().is_subscribed(session));
    }
}

mod merge_tests {
    use super::*;

    #[test]
    fn merge_moves_anchored_and_free_entities() {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let a = system.create_grid(&mut world, map, 8, 1).expect("a");
        let b = system.create_grid(&mut world, map, 8, 1).expect("b");
        system.set_tiles(&mut world, a, &row(0, 2)).expect("a tiles");
        system.set_tiles(&mut world, b, &row(0, 2)).expect("b tiles");
        let light = world.spawn_anchored("light", b, TileCoord::new(1, 0)).expect("light");
        let mouse = world.spawn("mouse", b, Vec2::new(0.25, 0.75)).expect("mouse");

        let outcome = system
            .merge_grids(&mut world, a, b, TileCoord::new(2, 0), 0.0)
            .expect("merge");

        assert_eq!(outcome, SplitOutcome::Connected);
        assert_eq!(tiles_of(&world, a), set_of(&[(0, 0), (1, 0), (2, 0), (3, 0)]));
        let light_transform = world.transform(light).expect("light");
        assert_eq!(light_transform.parent, Some(a));
        assert!(light_transform.anchored);
        assert_eq!(world.grid(a).expect("a").anchored_at(TileCoord::new(3, 0)), &[light]);
        let mouse_transform = world.transform(mouse).expect("mouse");
        assert_eq!(mouse_transform.parent, Some(a));
        assert_eq!(mouse_transform.local_position, Vec2::new(2.25, 0.75));
        assert!(!world.contains(b));
    }

    #[test]
    fn disjoint_merge_is_split_back_apart() {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let a = system.create_grid(&mut world, map, 8, 1).expect("a");
        let b = system.create_grid(&mut world, map, 8, 1).expect("b");
        system.set_tiles(&mut world, a, &row(0, 3)).expect("a tiles");
        system.set_tiles(&mut world, b, &row(0, 2)).expect("b tiles");

        let outcome = system
            .merge_grids(&mut world, a, b, TileCoord::new(4, 0), 0.0)
            .expect("merge");

        let new_grids = outcome.new_grids().to_vec();
        assert_eq!(new_grids.len(), 1);
        assert_eq!(tiles_of(&world, new_grids[0]), set_of(&[(4, 0), (5, 0)]));
        assert_eq!(tiles_of(&world, a), set_of(&[(0, 0), (1, 0), (2, 0)]));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_edits_keep_index_consistent(
        edits in prop::collection::vec((0i32..12, 0i32..12, any::<bool>()), 1..80)
    ) {
        let (mut world, map, mut system) = world_with_system(SplitConfig {
            split_allowed: false,
            ..SplitConfig::default()
        });
        let grid = system.create_grid(&mut world, map, 4, 1).expect("grid");

        for (x, y, filled) in edits {
            let value = if filled { Tile::new(1) } else { Tile::EMPTY };
            system.set_tile(&mut world, grid, TileCoord::new(x, y), value).expect("edit");

            let index = system.connectivity(grid).expect("index");
            prop_assert!(index.check_symmetry());
            let filled_tiles = world.grid(grid).expect("grid").filled_tiles() as usize;
            prop_assert_eq!(index.tile_count(), filled_tiles);
        }
        for tile in tiles_of(&world, grid) {
            prop_assert!(system.connectivity(grid).expect("index").find_node_for_tile(tile).is_some());
        }
    }

    #[test]
    fn splitting_conserves_tiles_and_leaves_connected_grids(
        edits in prop::collection::vec((0i32..10, 0i32..10, any::<bool>()), 1..60)
    ) {
        let (mut world, map, mut system) = world_with_system(SplitConfig::default());
        let grid = system.create_grid(&mut world, map, 4, 1).expect("grid");
        let mut expected = 0_usize;

        for (x, y, filled) in edits {
            let tile = TileCoord::new(x, y);
            let was_filled = !world.grid(grid).expect("grid").get_tile(tile).is_empty();
            let value = if filled { Tile::new(1) } else { Tile::EMPTY };
            system.set_tile(&mut world, grid, tile, value).expect("edit");
            match (was_filled, filled) {
                (false, true) => expected += 1,
                (true, false) => expected -= 1,
                _ => {},
            }

            let total: usize = world.grids().iter().map(|&g| tiles_of(&world, g).len()).sum();
            prop_assert_eq!(total, expected);
            for g in world.grids() {
                let index = system.connectivity(g).expect("index");
                prop_assert!(index.check_symmetry());
            }
        }
    }
}
