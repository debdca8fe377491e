//! Entity transform hierarchy and physics body components.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tessera_common::{EntityId, MapId};

/// Position of an entity relative to its parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transform {
    /// Parent entity (None only for map roots)
    pub parent: Option<EntityId>,
    /// Map this entity lives on
    pub map: Option<MapId>,
    /// Position in the parent's frame
    pub local_position: Vec2,
    /// Rotation in radians relative to the parent
    pub local_rotation: f32,
    /// Whether the entity is snapped to a grid tile
    pub anchored: bool,
    /// Direct children, sorted
    pub(crate) children: BTreeSet<EntityId>,
}

impl Transform {
    /// Direct children of this entity.
    pub fn children(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.children.iter().copied()
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// How a physics body is simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves
    Static,
    /// Moved by velocity only
    Kinematic,
    /// Fully simulated
    #[default]
    Dynamic,
}

/// Physics body state used by grids and free entities.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicsBody {
    /// Simulation mode
    pub body_type: BodyType,
    /// Linear velocity in world units per second
    pub linear_velocity: Vec2,
    /// Angular velocity in radians per second
    pub angular_velocity: f32,
}

impl PhysicsBody {
    /// Creates a body of the given type at rest.
    #[must_use]
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Default::default()
        }
    }
}
