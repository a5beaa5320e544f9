pub mod catalog;
pub mod events;
pub mod types;

pub use events::{PathStatus, WorldEvent};
pub use types::{
    BlockInfo, BlockQuery, EntityId, EntityInfo, EquipSlot, ItemStack, MatchMode, NavGoal,
    PlayerInfo, Telemetry, Vec3,
};
