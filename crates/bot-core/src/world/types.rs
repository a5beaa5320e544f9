use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable id the gateway assigns to a tracked entity.
pub type EntityId = u64;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: f32, dy: f32, dz: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub fn distance_to(&self, other: &Vec3) -> f32 {
        dist_sq(self, other).sqrt()
    }

    /// Whole-block coordinates, as pathing goals expect.
    pub fn floor(&self) -> Self {
        Self {
            x: self.x.floor(),
            y: self.y.floor(),
            z: self.z.floor(),
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

fn dist_sq(a: &Vec3, b: &Vec3) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

fn default_height() -> f32 {
    1.8
}

fn default_true() -> bool {
    true
}

/// A live entity as enumerated by the gateway. The agent itself is never included.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    /// Entity type name, e.g. `zombie` or `player`.
    pub name: String,
    /// Set for player entities only.
    #[serde(default)]
    pub username: Option<String>,
    pub position: Vec3,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default)]
    pub health: Option<f32>,
    #[serde(default = "default_true")]
    pub valid: bool,
}

impl EntityInfo {
    pub fn is_alive(&self) -> bool {
        self.valid && self.health.map(|h| h > 0.0).unwrap_or(true)
    }

    /// Mid-body point used for aiming strikes.
    pub fn aim_point(&self) -> Vec3 {
        self.position.offset(0.0, self.height * 0.5, 0.0)
    }
}

/// A connected player. `entity` is `None` when the player is outside view range.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlayerInfo {
    pub username: String,
    #[serde(default)]
    pub entity: Option<EntityId>,
    #[serde(default)]
    pub position: Option<Vec3>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BlockInfo {
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Telemetry {
    pub position: Vec3,
    pub health: f32,
    pub food: f32,
    #[serde(default = "default_true")]
    pub on_ground: bool,
}

/// Navigation goal handed to the gateway's pathfinder.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavGoal {
    Block { position: Vec3 },
    Near { position: Vec3, range: f32 },
    Follow { entity: EntityId, range: f32 },
}

impl NavGoal {
    /// Follow goals track a moving entity and never report completion on their own.
    pub fn is_follow(&self) -> bool {
        matches!(self, NavGoal::Follow { .. })
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Substring,
    Exact,
}

/// Block search predicate, expressed as data so it can cross the gateway boundary.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BlockQuery {
    pub pattern: String,
    pub mode: MatchMode,
    pub max_distance: f32,
}

impl BlockQuery {
    pub fn containing(pattern: impl Into<String>, max_distance: f32) -> Self {
        Self {
            pattern: pattern.into().to_lowercase(),
            mode: MatchMode::Substring,
            max_distance,
        }
    }

    pub fn exact(pattern: impl Into<String>, max_distance: f32) -> Self {
        Self {
            pattern: pattern.into().to_lowercase(),
            mode: MatchMode::Exact,
            max_distance,
        }
    }

    pub fn matches(&self, block_name: &str) -> bool {
        let name = block_name.to_lowercase();
        match self.mode {
            MatchMode::Substring => name.contains(&self.pattern),
            MatchMode::Exact => name == self.pattern,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Hand,
    Head,
    Torso,
    Legs,
    Feet,
}
