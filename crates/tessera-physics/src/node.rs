//! Connectivity nodes and the per-grid arena that owns them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tessera_common::{ChunkCoord, LocalCoord, TileCoord};

/// Handle to a node in a [`NodeArena`].
///
/// The generation changes every time a slot is freed, so a handle kept after
/// its node was removed never resolves to the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Slot index inside the arena.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time the node was inserted.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// A maximal set of 4-connected filled tiles inside one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSplitNode {
    /// Chunk of the owning group
    pub(crate) chunk: ChunkCoord,
    /// Chunk-local tiles in this node
    pub(crate) indices: BTreeSet<LocalCoord>,
    /// Nodes in adjacent chunks sharing an edge with this one
    pub(crate) neighbors: BTreeSet<NodeId>,
}

impl ChunkSplitNode {
    pub(crate) fn new(chunk: ChunkCoord) -> Self {
        Self {
            chunk,
            indices: BTreeSet::new(),
            neighbors: BTreeSet::new(),
        }
    }

    /// Chunk this node belongs to.
    #[must_use]
    pub const fn chunk(&self) -> ChunkCoord {
        self.chunk
    }

    /// Chunk-local tiles of this node.
    #[must_use]
    pub fn indices(&self) -> &BTreeSet<LocalCoord> {
        &self.indices
    }

    /// Neighbor nodes in other chunks.
    #[must_use]
    pub fn neighbors(&self) -> &BTreeSet<NodeId> {
        &self.neighbors
    }

    /// Number of tiles in this node.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.indices.len()
    }

    /// Grid tile coordinates of this node.
    pub fn tiles(&self, chunk_size: u16) -> impl Iterator<Item = TileCoord> + '_ {
        self.indices
            .iter()
            .map(move |local| local.to_tile(self.chunk, chunk_size))
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<ChunkSplitNode>,
}

/// Slab of nodes addressed by generational [`NodeId`]s.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a node and returns its handle.
    pub fn insert(&mut self, node: ChunkSplitNode) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId { index, generation: 0 }
    }

    /// Removes a node, freeing its slot. Stale handles return `None`.
    ///
    /// Callers must unlink the node from its neighbors first.
    pub fn remove(&mut self, id: NodeId) -> Option<ChunkSplitNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }

    /// Gets a live node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&ChunkSplitNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Gets a live node mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ChunkSplitNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Whether a handle refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no live nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates live nodes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ChunkSplitNode)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }
}
