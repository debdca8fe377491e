//! Per-grid connectivity index: chunk nodes, their cross-chunk links, and
//! the component search that decides whether a grid has come apart.

use std::collections::{BTreeSet, VecDeque};

use ahash::{AHashMap, AHashSet};
use tessera_common::{ChunkCoord, Direction, LocalCoord, TileCoord};
use tessera_map::MapChunk;
use tracing::trace;

use crate::node::{ChunkSplitNode, NodeArena, NodeId};

/// The nodes generated for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkNodeGroup {
    chunk: ChunkCoord,
    nodes: Vec<NodeId>,
}

impl ChunkNodeGroup {
    fn new(chunk: ChunkCoord) -> Self {
        Self {
            chunk,
            nodes: Vec::new(),
        }
    }

    /// Chunk this group describes.
    #[must_use]
    pub const fn chunk(&self) -> ChunkCoord {
        self.chunk
    }

    /// Nodes of the chunk, in generation order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

/// Nodes whose connectivity may have changed since the last check.
///
/// Keeps first-insertion order so component discovery is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DirtyNodes {
    order: Vec<NodeId>,
    members: AHashSet<NodeId>,
    cursor: usize,
}

impl DirtyNodes {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Returns false if it was already present.
    pub fn insert(&mut self, id: NodeId) -> bool {
        if self.members.insert(id) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    /// Removes a node. Returns false if it was absent.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.members.remove(&id)
    }

    /// Whether a node is present.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Keeps only the nodes for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        self.members.retain(|id| keep(*id));
        let members = &self.members;
        let mut position = 0;
        let cursor = self.cursor;
        self.order.retain(|id| {
            let seen = position < cursor;
            position += 1;
            !seen && members.contains(id)
        });
        self.cursor = 0;
    }

    /// Removes and returns the earliest inserted node.
    pub fn pop_first(&mut self) -> Option<NodeId> {
        while let Some(&id) = self.order.get(self.cursor) {
            self.cursor += 1;
            if self.members.remove(&id) {
                return Some(id);
            }
        }
        None
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut yielded = AHashSet::with_capacity(self.members.len());
        self.order[self.cursor..]
            .iter()
            .copied()
            .filter(move |id| self.members.contains(id) && yielded.insert(*id))
    }
}

impl Extend<NodeId> for DirtyNodes {
    fn extend<I: IntoIterator<Item = NodeId>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl FromIterator<NodeId> for DirtyNodes {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let mut dirty = Self::new();
        dirty.extend(iter);
        dirty
    }
}

/// One connected piece of a grid.
///
/// Tiles are captured when the component is found; node handles go stale as
/// soon as the grid's chunks are regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitComponent {
    nodes: Vec<NodeId>,
    tiles: Vec<TileCoord>,
}

impl SplitComponent {
    /// Nodes in discovery order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Tiles of the component, sorted.
    #[must_use]
    pub fn tiles(&self) -> &[TileCoord] {
        &self.tiles
    }

    /// Total tile count, used to order components by size.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

/// Connectivity index for one grid.
#[derive(Debug, Clone)]
pub struct GridConnectivity {
    chunk_size: u16,
    arena: NodeArena,
    groups: AHashMap<ChunkCoord, ChunkNodeGroup>,
}

impl GridConnectivity {
    /// Creates an empty index for a grid with the given chunk size.
    #[must_use]
    pub fn new(chunk_size: u16) -> Self {
        Self {
            chunk_size,
            arena: NodeArena::new(),
            groups: AHashMap::new(),
        }
    }

    /// Chunk size of the indexed grid.
    #[must_use]
    pub const fn chunk_size(&self) -> u16 {
        self.chunk_size
    }

    /// Node storage.
    #[must_use]
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Looks up a live node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ChunkSplitNode> {
        self.arena.get(id)
    }

    /// Whether a handle refers to a live node of this grid.
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    /// Iterates live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ChunkSplitNode)> + '_ {
        self.arena.iter()
    }

    /// Group for a chunk, if the chunk has nodes.
    #[must_use]
    pub fn group(&self, chunk: ChunkCoord) -> Option<&ChunkNodeGroup> {
        self.groups.get(&chunk)
    }

    /// Iterates all groups in arbitrary order.
    pub fn groups(&self) -> impl Iterator<Item = &ChunkNodeGroup> {
        self.groups.values()
    }

    /// Chunks with nodes, sorted.
    #[must_use]
    pub fn chunk_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<_> = self.groups.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Total tiles covered by all nodes.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.arena.iter().map(|(_, node)| node.tile_count()).sum()
    }

    /// Finds the node of `chunk` that contains `local`.
    #[must_use]
    pub fn find_node_containing(&self, chunk: ChunkCoord, local: LocalCoord) -> Option<NodeId> {
        let group = self.groups.get(&chunk)?;
        group.nodes.iter().copied().find(|&id| {
            self.arena
                .get(id)
                .is_some_and(|node| node.indices.contains(&local))
        })
    }

    /// Finds the node containing a grid tile.
    #[must_use]
    pub fn find_node_for_tile(&self, tile: TileCoord) -> Option<NodeId> {
        self.find_node_containing(
            tile.to_chunk_coord(self.chunk_size),
            tile.to_local_coord(self.chunk_size),
        )
    }

    /// Discards a chunk's nodes.
    ///
    /// Returns the surviving nodes in other chunks that lost a link.
    pub fn remove_chunk(&mut self, chunk: ChunkCoord) -> DirtyNodes {
        let mut dirty = DirtyNodes::new();
        let Some(group) = self.groups.remove(&chunk) else {
            return dirty;
        };
        for id in group.nodes {
            let Some(node) = self.arena.remove(id) else {
                continue;
            };
            for neighbor in node.neighbors {
                if let Some(other) = self.arena.get_mut(neighbor) {
                    other.neighbors.remove(&id);
                    if other.chunk != chunk {
                        dirty.insert(neighbor);
                    }
                }
            }
        }
        trace!("Removed nodes of chunk {chunk}");
        dirty
    }

    /// Removes a single node, unlinking it first. Stale handles are ignored.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.arena.remove(id) else {
            return false;
        };
        for neighbor in &node.neighbors {
            if let Some(other) = self.arena.get_mut(*neighbor) {
                other.neighbors.remove(&id);
            }
        }
        if let Some(group) = self.groups.get_mut(&node.chunk) {
            group.nodes.retain(|&other| other != id);
            if group.nodes.is_empty() {
                self.groups.remove(&node.chunk);
            }
        }
        true
    }

    /// Rebuilds the nodes of one chunk from its tiles and relinks them to the
    /// adjacent chunks.
    ///
    /// Returns every new node of the chunk plus the nodes elsewhere that lost
    /// a link when the old nodes were discarded.
    pub fn regenerate_chunk(&mut self, chunk: &MapChunk) -> DirtyNodes {
        debug_assert_eq!(chunk.chunk_size(), self.chunk_size);
        let coord = chunk.indices();
        let mut dirty = self.remove_chunk(coord);

        let size = self.chunk_size;
        let tile_count = usize::from(size) * usize::from(size);
        let mut remaining = vec![true; tile_count];
        let mut frontier = VecDeque::new();
        let mut group = ChunkNodeGroup::new(coord);
        let mut current = ChunkSplitNode::new(coord);

        for seed in 0..tile_count {
            if !remaining[seed] {
                continue;
            }
            remaining[seed] = false;
            frontier.push_back(LocalCoord::from_index(seed, size));

            while let Some(local) = frontier.pop_front() {
                if chunk.get_tile(local).is_empty() {
                    continue;
                }
                current.indices.insert(local);
                for direction in Direction::CARDINALS {
                    let Some(next) = local.step(direction, size) else {
                        continue;
                    };
                    let index = next.to_index(size);
                    if remaining[index] {
                        remaining[index] = false;
                        frontier.push_back(next);
                    }
                }
            }

            if !current.indices.is_empty() {
                let node = std::mem::replace(&mut current, ChunkSplitNode::new(coord));
                group.nodes.push(self.arena.insert(node));
            }
        }

        for &id in &group.nodes {
            for (other_chunk, other_local) in self.boundary_neighbors(id) {
                if let Some(other) = self.find_node_containing(other_chunk, other_local) {
                    self.link(id, other);
                }
            }
            dirty.insert(id);
        }

        trace!("Chunk {coord}: {} nodes", group.nodes.len());
        if !group.nodes.is_empty() {
            self.groups.insert(coord, group);
        }
        dirty
    }

    /// Tiles across the chunk border from each edge tile of a node.
    fn boundary_neighbors(&self, id: NodeId) -> Vec<(ChunkCoord, LocalCoord)> {
        let Some(node) = self.arena.get(id) else {
            return Vec::new();
        };
        let last = self.chunk_size - 1;
        let mut across = Vec::new();
        for local in &node.indices {
            if local.x == 0 {
                across.push((node.chunk.neighbor(Direction::West), LocalCoord::new(last, local.y)));
            }
            if local.y == 0 {
                across.push((node.chunk.neighbor(Direction::South), LocalCoord::new(local.x, last)));
            }
            if local.x == last {
                across.push((node.chunk.neighbor(Direction::East), LocalCoord::new(0, local.y)));
            }
            if local.y == last {
                across.push((node.chunk.neighbor(Direction::North), LocalCoord::new(local.x, 0)));
            }
        }
        across
    }

    fn link(&mut self, a: NodeId, b: NodeId) {
        if let Some(node) = self.arena.get_mut(a) {
            node.neighbors.insert(b);
        }
        if let Some(node) = self.arena.get_mut(b) {
            node.neighbors.insert(a);
        }
    }

    /// Partitions the graph reachable from `dirty` into connected components.
    ///
    /// Dead handles are dropped. Components come out in the order their first
    /// node appears in `dirty`.
    #[must_use]
    pub fn find_components(&self, mut dirty: DirtyNodes) -> Vec<SplitComponent> {
        dirty.retain(|id| self.arena.contains(id));
        let mut components = Vec::new();
        let mut visited = AHashSet::new();

        while let Some(seed) = dirty.pop_first() {
            if !visited.insert(seed) {
                continue;
            }
            let mut nodes = Vec::new();
            let mut frontier = VecDeque::from([seed]);
            while let Some(id) = frontier.pop_front() {
                dirty.remove(id);
                let Some(node) = self.arena.get(id) else {
                    continue;
                };
                nodes.push(id);
                for &neighbor in &node.neighbors {
                    if visited.insert(neighbor) {
                        frontier.push_back(neighbor);
                    }
                }
            }

            let mut tiles: Vec<TileCoord> = nodes
                .iter()
                .filter_map(|&id| self.arena.get(id))
                .flat_map(|node| node.tiles(self.chunk_size))
                .collect();
            tiles.sort_unstable();
            components.push(SplitComponent { nodes, tiles });
        }
        components
    }

    /// Checks that every link is mutual, between live nodes of side-adjacent
    /// chunks, and that every group lists only live nodes of its own chunk.
    #[must_use]
    pub fn check_symmetry(&self) -> bool {
        let links_ok = self.arena.iter().all(|(id, node)| {
            node.neighbors.iter().all(|&other| {
                self.arena.get(other).is_some_and(|peer| {
                    let dx = (peer.chunk.x - node.chunk.x).abs();
                    let dy = (peer.chunk.y - node.chunk.y).abs();
                    peer.neighbors.contains(&id) && dx + dy == 1
                })
            })
        });
        let groups_ok = self.groups.iter().all(|(coord, group)| {
            !group.nodes.is_empty()
                && group
                    .nodes
                    .iter()
                    .all(|&id| self.arena.get(id).is_some_and(|node| node.chunk == *coord))
        });
        let grouped: usize = self.groups.values().map(|group| group.nodes.len()).sum();
        links_ok && groups_ok && grouped == self.arena.len()
    }

    /// Neighbor nodes of a node, sorted.
    #[must_use]
    pub fn neighbors_of(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.arena
            .get(id)
            .map(|node| node.neighbors.clone())
            .unwrap_or_default()
    }
}
