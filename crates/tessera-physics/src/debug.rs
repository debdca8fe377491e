//! Debug feed of the connectivity graph for subscribed sessions.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tessera_common::{ChunkCoord, EntityId, LocalCoord, SessionId};

use crate::connectivity::GridConnectivity;

/// Tiles of one node, chunk-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugNode {
    /// Node tiles, sorted
    pub tiles: Vec<LocalCoord>,
}

/// Nodes of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugChunk {
    /// Chunk indices
    pub chunk: ChunkCoord,
    /// Nodes in generation order
    pub nodes: Vec<DebugNode>,
}

/// Snapshot of one grid's connectivity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSplitDebugMessage {
    /// Grid described
    pub grid: EntityId,
    /// Chunks with nodes, sorted by coordinate
    pub chunks: Vec<DebugChunk>,
    /// Links between node centres, in grid-local space
    pub connections: Vec<(Vec2, Vec2)>,
}

impl ChunkSplitDebugMessage {
    /// Builds a snapshot from a grid's index.
    #[must_use]
    pub fn from_index(grid: EntityId, index: &GridConnectivity, tile_size: f32) -> Self {
        let size = index.chunk_size();
        let mut chunks = Vec::new();
        let mut links = BTreeSet::new();

        for coord in index.chunk_coords() {
            let Some(group) = index.group(coord) else {
                continue;
            };
            let mut nodes = Vec::with_capacity(group.nodes().len());
            for &id in group.nodes() {
                let Some(node) = index.node(id) else {
                    continue;
                };
                nodes.push(DebugNode {
                    tiles: node.indices().iter().copied().collect(),
                });
                for &neighbor in node.neighbors() {
                    links.insert((id.min(neighbor), id.max(neighbor)));
                }
            }
            chunks.push(DebugChunk { chunk: coord, nodes });
        }

        let center = |id| {
            index.node(id).map(|node| {
                let sum: Vec2 = node
                    .tiles(size)
                    .map(|tile| Vec2::new(tile.x as f32 + 0.5, tile.y as f32 + 0.5))
                    .sum();
                sum / node.tile_count().max(1) as f32 * tile_size
            })
        };
        let connections = links
            .into_iter()
            .filter_map(|(a, b)| Some((center(a)?, center(b)?)))
            .collect();

        Self {
            grid,
            chunks,
            connections,
        }
    }
}

/// Sessions watching the connectivity graph and the messages queued for
/// them.
#[derive(Debug, Clone, Default)]
pub struct SplitDebugBroadcast {
    subscribers: BTreeSet<SessionId>,
    outbox: Vec<(SessionId, ChunkSplitDebugMessage)>,
}

impl SplitDebugBroadcast {
    /// Creates a broadcast with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber. Returns false if already subscribed.
    pub fn subscribe(&mut self, session: SessionId) -> bool {
        self.subscribers.insert(session)
    }

    /// Removes a subscriber and any messages still queued for it.
    pub fn unsubscribe(&mut self, session: SessionId) -> bool {
        self.outbox.retain(|(target, _)| *target != session);
        self.subscribers.remove(&session)
    }

    /// Whether a session is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, session: SessionId) -> bool {
        self.subscribers.contains(&session)
    }

    /// Subscribed sessions, sorted.
    pub fn subscribers(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.subscribers.iter().copied()
    }

    /// Whether anyone is listening.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    /// Queues a message for one session.
    pub fn send_to(&mut self, session: SessionId, message: ChunkSplitDebugMessage) {
        self.outbox.push((session, message));
    }

    /// Queues a message for every subscriber.
    pub fn broadcast(&mut self, message: &ChunkSplitDebugMessage) {
        for &session in &self.subscribers {
            self.outbox.push((session, message.clone()));
        }
    }

    /// Number of queued messages.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.outbox.len()
    }

    /// Takes all queued messages in send order.
    pub fn drain(&mut self) -> Vec<(SessionId, ChunkSplitDebugMessage)> {
        std::mem::take(&mut self.outbox)
    }

    /// Takes the messages queued for one session, leaving the rest queued.
    pub fn drain_for(&mut self, session: SessionId) -> Vec<ChunkSplitDebugMessage> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.outbox)
            .into_iter()
            .partition(|(target, _)| *target == session);
        self.outbox = kept;
        taken.into_iter().map(|(_, message)| message).collect()
    }
}
