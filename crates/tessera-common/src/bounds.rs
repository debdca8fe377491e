//! Axis-aligned boxes in float (local/world space) and integer (tile space) units.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned float box. `min` is inclusive, `max` is exclusive when testing points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Box2 {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Box2 {
    /// Creates a new box from its corners.
    #[must_use]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Checks if a point lies inside the half-open box.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    /// Checks if this box overlaps with another.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Returns the center of the box.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Returns the box size.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}

/// Axis-aligned integer box in tile units. `max` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Box2i {
    /// Minimum X (inclusive)
    pub min_x: i32,
    /// Minimum Y (inclusive)
    pub min_y: i32,
    /// Maximum X (exclusive)
    pub max_x: i32,
    /// Maximum Y (exclusive)
    pub max_y: i32,
}

impl Box2i {
    /// Creates a new integer box.
    #[must_use]
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    /// Number of tiles covered.
    #[must_use]
    pub const fn area(&self) -> i32 {
        self.width() * self.height()
    }

    /// Whether the box covers no tiles.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Returns the box translated by a tile offset.
    #[must_use]
    pub const fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.min_x + dx, self.min_y + dy, self.max_x + dx, self.max_y + dy)
    }

    /// Converts to a float box scaled by the tile size.
    #[must_use]
    pub fn to_box2(&self, tile_size: f32) -> Box2 {
        Box2::new(
            Vec2::new(self.min_x as f32, self.min_y as f32) * tile_size,
            Vec2::new(self.max_x as f32, self.max_y as f32) * tile_size,
        )
    }
}

/// Rotates a vector by an angle in radians.
#[must_use]
pub fn rotate(v: Vec2, radians: f32) -> Vec2 {
    Vec2::from_angle(radians).rotate(v)
}
