use std::collections::BTreeMap;

use crate::world::catalog::{
    armor_slot, contains_any, is_hostile, FOOD_KEYWORDS, TOOL_KEYWORDS, WEAPON_KEYWORDS,
};
use crate::world::{EntityId, EntityInfo, ItemStack, NavGoal, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionKind {
    #[default]
    Idle,
    Navigating,
    Digging,
    Combat,
    Fleeing,
    Guarding,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Idle => "idle",
            ActionKind::Navigating => "navigating",
            ActionKind::Digging => "digging",
            ActionKind::Combat => "combat",
            ActionKind::Fleeing => "fleeing",
            ActionKind::Guarding => "guarding",
        }
    }
}

/// A world referent produced by the target resolver. Never cached across commands.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget {
    Entity {
        id: EntityId,
        name: String,
        position: Vec3,
        distance: f32,
    },
    Player {
        username: String,
        /// `None` when the player is connected but out of view.
        entity: Option<EntityId>,
        position: Option<Vec3>,
        distance: Option<f32>,
    },
    Block {
        name: String,
        position: Vec3,
        distance: f32,
    },
    Unknown,
}

impl ResolvedTarget {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ResolvedTarget::Unknown)
    }

    pub fn label(&self) -> &str {
        match self {
            ResolvedTarget::Entity { name, .. } => name,
            ResolvedTarget::Player { username, .. } => username,
            ResolvedTarget::Block { name, .. } => name,
            ResolvedTarget::Unknown => "unknown",
        }
    }

    pub fn position(&self) -> Option<Vec3> {
        match self {
            ResolvedTarget::Entity { position, .. } | ResolvedTarget::Block { position, .. } => {
                Some(*position)
            }
            ResolvedTarget::Player { position, .. } => *position,
            ResolvedTarget::Unknown => None,
        }
    }

    /// The live entity behind this target, if there is one to track.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            ResolvedTarget::Entity { id, .. } => Some(*id),
            ResolvedTarget::Player { entity, .. } => *entity,
            _ => None,
        }
    }

    /// Same referent with a refreshed position, used when re-reading live entities.
    pub(crate) fn with_position(&self, position: Vec3, me: Vec3) -> Self {
        let distance = me.distance_to(&position);
        match self.clone() {
            ResolvedTarget::Entity { id, name, .. } => ResolvedTarget::Entity {
                id,
                name,
                position,
                distance,
            },
            ResolvedTarget::Player {
                username, entity, ..
            } => ResolvedTarget::Player {
                username,
                entity,
                position: Some(position),
                distance: Some(distance),
            },
            other => other,
        }
    }
}

/// The one action the agent is running.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActiveAction {
    pub kind: ActionKind,
    pub target: Option<ResolvedTarget>,
    pub cancel_requested: bool,
    /// Navigation goal currently submitted on behalf of this action.
    pub(crate) goal: Option<NavGoal>,
    /// Combat gear has been equipped for this fight.
    pub(crate) prepared: bool,
    /// Combat was started by guard duty and returns to it when done.
    pub(crate) resume_guard: bool,
    /// Digging: the approach leg is finished and the next step breaks the block.
    pub(crate) in_reach: bool,
}

impl ActiveAction {
    pub fn idle() -> Self {
        Self::default()
    }

    pub(crate) fn new(kind: ActionKind, target: Option<ResolvedTarget>) -> Self {
        Self {
            kind,
            target,
            ..Self::default()
        }
    }

    pub fn has_goal(&self) -> bool {
        self.goal.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedThreat {
    pub name: String,
    pub position: Vec3,
}

/// Inventory split into the categories the prompt and commands care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    pub tools: Vec<ItemStack>,
    pub weapons: Vec<ItemStack>,
    pub armor: Vec<ItemStack>,
    pub materials: Vec<ItemStack>,
    pub food: Vec<ItemStack>,
}

impl InventorySnapshot {
    pub fn categorize(items: &[ItemStack]) -> Self {
        let mut snap = Self::default();
        for item in items {
            let name = item.name.as_str();
            let bucket = if contains_any(name, WEAPON_KEYWORDS) {
                &mut snap.weapons
            } else if contains_any(name, TOOL_KEYWORDS) {
                &mut snap.tools
            } else if armor_slot(name).is_some() {
                &mut snap.armor
            } else if contains_any(name, FOOD_KEYWORDS) {
                &mut snap.food
            } else {
                &mut snap.materials
            };
            bucket.push(item.clone());
        }
        snap
    }

    pub fn first_food(&self) -> Option<&ItemStack> {
        self.food.first()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
            && self.weapons.is_empty()
            && self.armor.is_empty()
            && self.materials.is_empty()
            && self.food.is_empty()
    }
}

/// Session-scoped agent state. Only `ActionExecutor` mutates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub current: ActiveAction,
    pub guard_target: Option<ResolvedTarget>,
    pub threats: BTreeMap<EntityId, TrackedThreat>,
    pub last_position: Option<Vec3>,
    pub safe_position: Option<Vec3>,
    pub inventory: InventorySnapshot,
}

impl AgentState {
    pub fn is_fighting(&self) -> bool {
        self.current.kind == ActionKind::Combat
    }

    pub fn is_guarding(&self) -> bool {
        self.guard_target.is_some()
    }

    /// Nearest tracked threat to `from`; ties go to the lowest id.
    pub fn nearest_threat(&self, from: Vec3) -> Option<(EntityId, &TrackedThreat)> {
        let mut best: Option<(EntityId, &TrackedThreat, f32)> = None;
        for (id, threat) in &self.threats {
            let d = from.distance_to(&threat.position);
            if best.map(|(_, _, bd)| d < bd).unwrap_or(true) {
                best = Some((*id, threat, d));
            }
        }
        best.map(|(id, t, _)| (id, t))
    }

    /// Folds an entity observation into the threat map.
    pub(crate) fn track_entity(&mut self, entity: &EntityInfo) {
        if !is_hostile(&entity.name) {
            return;
        }
        if entity.is_alive() {
            self.threats.insert(
                entity.id,
                TrackedThreat {
                    name: entity.name.clone(),
                    position: entity.position,
                },
            );
        } else {
            self.threats.remove(&entity.id);
        }
    }

    pub(crate) fn forget(&mut self, id: EntityId) {
        self.threats.remove(&id);
    }

    pub(crate) fn note_position(&mut self, position: Vec3) {
        self.last_position = Some(position);
    }

    pub(crate) fn note_spawn(&mut self, position: Vec3) {
        if self.safe_position.is_none() {
            self.safe_position = Some(position);
        }
        self.last_position = Some(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(name: &str, count: u32) -> ItemStack {
        ItemStack {
            name: name.to_string(),
            count,
        }
    }

    fn entity(id: EntityId, name: &str, x: f32) -> EntityInfo {
        EntityInfo {
            id,
            name: name.to_string(),
            username: None,
            position: Vec3::new(x, 64.0, 0.0),
            height: 1.8,
            health: Some(20.0),
            valid: true,
        }
    }

    #[test]
    fn categorize_splits_by_keyword() {
        let snap = InventorySnapshot::categorize(&[
            stack("iron_pickaxe", 1),
            stack("stone_sword", 1),
            stack("iron_helmet", 1),
            stack("bread", 5),
            stack("cobblestone", 64),
        ]);
        assert_eq!(snap.tools, vec![stack("iron_pickaxe", 1)]);
        assert_eq!(snap.weapons, vec![stack("stone_sword", 1)]);
        assert_eq!(snap.armor, vec![stack("iron_helmet", 1)]);
        assert_eq!(snap.food, vec![stack("bread", 5)]);
        assert_eq!(snap.materials, vec![stack("cobblestone", 64)]);
        assert_eq!(snap.first_food().map(|s| s.name.as_str()), Some("bread"));
    }

    #[test]
    fn threats_track_only_live_hostiles() {
        let mut state = AgentState::default();
        state.track_entity(&entity(1, "zombie", 4.0));
        state.track_entity(&entity(2, "cow", 2.0));
        assert_eq!(state.threats.len(), 1);

        let mut dead = entity(1, "zombie", 4.0);
        dead.health = Some(0.0);
        state.track_entity(&dead);
        assert!(state.threats.is_empty());

        state.track_entity(&entity(3, "skeleton", 9.0));
        state.forget(3);
        assert!(state.threats.is_empty());
    }

    #[test]
    fn fighting_and_guarding_are_derived() {
        let mut state = AgentState::default();
        assert!(!state.is_fighting());
        state.current = ActiveAction::new(ActionKind::Combat, None);
        assert!(state.is_fighting());
        state.guard_target = Some(ResolvedTarget::Unknown);
        assert!(state.is_guarding());
    }

    #[test]
    fn spawn_records_first_safe_position_only() {
        let mut state = AgentState::default();
        state.note_spawn(Vec3::new(1.0, 64.0, 1.0));
        state.note_spawn(Vec3::new(50.0, 64.0, 50.0));
        assert_eq!(state.safe_position, Some(Vec3::new(1.0, 64.0, 1.0)));
        assert_eq!(state.last_position, Some(Vec3::new(50.0, 64.0, 50.0)));
    }
}
