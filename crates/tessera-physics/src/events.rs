//! Grid lifecycle events.
//!
//! Events reach listeners two ways: registered [`GridEventHandler`]s run
//! synchronously while the world is still mid-split, and every event is also
//! queued on an [`EventBus`] for consumers that poll.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tessera_common::EntityId;
use tessera_map::MapWorld;
use tracing::warn;

/// Things that happen to grids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridEvent {
    /// A component was moved to `new_grid`, before its tiles were cleared
    /// from `old_grid`.
    PostGridSplit {
        /// Grid being split
        old_grid: EntityId,
        /// Newly created grid
        new_grid: EntityId,
    },
    /// A split finished.
    GridSplit {
        /// Grid that was split and kept the largest piece
        old_grid: EntityId,
        /// Created grids, smallest component first
        new_grids: Vec<EntityId>,
    },
    /// A grid lost its last chunk.
    EmptyGrid {
        /// The emptied grid
        grid: EntityId,
    },
}

impl GridEvent {
    /// Grid the event is about.
    #[must_use]
    pub const fn grid(&self) -> EntityId {
        match self {
            Self::PostGridSplit { old_grid, .. } | Self::GridSplit { old_grid, .. } => *old_grid,
            Self::EmptyGrid { grid } => *grid,
        }
    }
}

/// Bounded queue of grid events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Sender<GridEvent>,
    receiver: Receiver<GridEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. Dropped with a warning when the queue is full.
    pub fn publish(&self, event: GridEvent) {
        if let Err(TrySendError::Full(event)) = self.sender.try_send(event) {
            warn!("Event bus full ({}), dropping {event:?}", self.capacity);
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<GridEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Synchronous event listener.
///
/// Handlers see the world in the state the event describes; a
/// `PostGridSplit` handler can still read the migrated tiles on the old grid.
pub trait GridEventHandler {
    /// Handles an event.
    fn handle(&mut self, event: &GridEvent, world: &MapWorld);
}

impl<F> GridEventHandler for F
where
    F: FnMut(&GridEvent, &MapWorld),
{
    fn handle(&mut self, event: &GridEvent, world: &MapWorld) {
        self(event, world);
    }
}
