//! In-memory fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::agent::classifier::IntentClassifier;
use crate::agent::game_api::{ApiFuture, ChatSink, GameApi};
use crate::agent::prompt::StatusContext;
use crate::world::{
    BlockInfo, BlockQuery, EntityId, EntityInfo, EquipSlot, ItemStack, NavGoal, PlayerInfo,
    Telemetry, Vec3,
};

#[derive(Debug, Clone, PartialEq)]
pub enum GameCall {
    SetGoal(NavGoal),
    CancelGoal,
    LookAt(Vec3),
    Attack(EntityId),
    Dig(Vec3),
    Equip(String, EquipSlot),
    Consume,
    Toss(String, u32),
    SleepIn(Vec3),
}

#[derive(Debug, Clone)]
pub struct FakeWorld {
    pub telemetry: Telemetry,
    pub entities: Vec<EntityInfo>,
    pub players: Vec<PlayerInfo>,
    pub blocks: Vec<BlockInfo>,
    pub inventory: Vec<ItemStack>,
    pub dig_error: Option<String>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            telemetry: Telemetry {
                position: Vec3::new(0.0, 64.0, 0.0),
                health: 20.0,
                food: 20.0,
                on_ground: true,
            },
            entities: Vec::new(),
            players: Vec::new(),
            blocks: Vec::new(),
            inventory: Vec::new(),
            dig_error: None,
        }
    }
}

#[derive(Default)]
pub struct FakeGameApi {
    pub world: Mutex<FakeWorld>,
    calls: Mutex<Vec<GameCall>>,
    touches: AtomicUsize,
}

pub fn mob(id: EntityId, name: &str, x: f32, z: f32) -> EntityInfo {
    EntityInfo {
        id,
        name: name.to_string(),
        username: None,
        position: Vec3::new(x, 64.0, z),
        height: 1.8,
        health: Some(20.0),
        valid: true,
    }
}

pub fn player_entity(id: EntityId, username: &str, x: f32, z: f32) -> EntityInfo {
    EntityInfo {
        username: Some(username.to_string()),
        ..mob(id, "player", x, z)
    }
}

pub fn stack(name: &str, count: u32) -> ItemStack {
    ItemStack {
        name: name.to_string(),
        count,
    }
}

impl FakeGameApi {
    pub fn add_entity(&self, entity: EntityInfo) {
        self.world.lock().unwrap().entities.push(entity);
    }

    /// Adds a player entity and registers the player as connected.
    pub fn add_player(&self, id: EntityId, username: &str, x: f32, z: f32) {
        let entity = player_entity(id, username, x, z);
        let mut world = self.world.lock().unwrap();
        world.players.push(PlayerInfo {
            username: username.to_string(),
            entity: Some(id),
            position: Some(entity.position),
        });
        world.entities.push(entity);
    }

    pub fn add_block(&self, name: &str, x: f32, z: f32) {
        self.world.lock().unwrap().blocks.push(BlockInfo {
            name: name.to_string(),
            position: Vec3::new(x, 64.0, z),
        });
    }

    pub fn set_inventory(&self, items: Vec<ItemStack>) {
        self.world.lock().unwrap().inventory = items;
    }

    pub fn set_health(&self, health: f32) {
        self.world.lock().unwrap().telemetry.health = health;
    }

    pub fn move_entity(&self, id: EntityId, x: f32, z: f32) {
        let mut world = self.world.lock().unwrap();
        if let Some(e) = world.entities.iter_mut().find(|e| e.id == id) {
            e.position = Vec3::new(x, 64.0, z);
        }
    }

    pub fn kill_entity(&self, id: EntityId) {
        let mut world = self.world.lock().unwrap();
        if let Some(e) = world.entities.iter_mut().find(|e| e.id == id) {
            e.health = Some(0.0);
        }
    }

    pub fn calls(&self) -> Vec<GameCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn strikes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GameCall::Attack(_)))
            .count()
    }

    pub fn last_goal(&self) -> Option<NavGoal> {
        self.calls().into_iter().rev().find_map(|c| match c {
            GameCall::SetGoal(goal) => Some(goal),
            _ => None,
        })
    }

    /// Number of gateway calls of any kind, reads included.
    pub fn touches(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.touches.fetch_add(1, Ordering::SeqCst);
    }

    fn record(&self, call: GameCall) {
        self.touch();
        self.calls.lock().unwrap().push(call);
    }
}

impl GameApi for FakeGameApi {
    fn telemetry(&self) -> ApiFuture<'_, Telemetry> {
        Box::pin(async move {
            self.touch();
            Ok(self.world.lock().unwrap().telemetry)
        })
    }

    fn entities(&self) -> ApiFuture<'_, Vec<EntityInfo>> {
        Box::pin(async move {
            self.touch();
            Ok(self.world.lock().unwrap().entities.clone())
        })
    }

    fn entity(&self, id: EntityId) -> ApiFuture<'_, Option<EntityInfo>> {
        Box::pin(async move {
            self.touch();
            Ok(self
                .world
                .lock()
                .unwrap()
                .entities
                .iter()
                .find(|e| e.id == id)
                .cloned())
        })
    }

    fn players(&self) -> ApiFuture<'_, Vec<PlayerInfo>> {
        Box::pin(async move {
            self.touch();
            Ok(self.world.lock().unwrap().players.clone())
        })
    }

    fn find_block(&self, query: BlockQuery) -> ApiFuture<'_, Option<BlockInfo>> {
        Box::pin(async move {
            self.touch();
            let world = self.world.lock().unwrap();
            let me = world.telemetry.position;
            let mut best: Option<(&BlockInfo, f32)> = None;
            for block in &world.blocks {
                let d = me.distance_to(&block.position);
                if !query.matches(&block.name) || d > query.max_distance {
                    continue;
                }
                if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((block, d));
                }
            }
            Ok(best.map(|(b, _)| b.clone()))
        })
    }

    fn inventory(&self) -> ApiFuture<'_, Vec<ItemStack>> {
        Box::pin(async move {
            self.touch();
            Ok(self.world.lock().unwrap().inventory.clone())
        })
    }

    fn set_goal(&self, goal: NavGoal) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::SetGoal(goal));
            Ok(())
        })
    }

    fn cancel_goal(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::CancelGoal);
            Ok(())
        })
    }

    fn look_at(&self, point: Vec3) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::LookAt(point));
            Ok(())
        })
    }

    fn attack(&self, entity: EntityId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::Attack(entity));
            Ok(())
        })
    }

    fn dig(&self, block: Vec3) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::Dig(block));
            let mut world = self.world.lock().unwrap();
            if let Some(err) = world.dig_error.clone() {
                anyhow::bail!(err);
            }
            world.blocks.retain(|b| b.position != block);
            Ok(())
        })
    }

    fn equip(&self, item: String, slot: EquipSlot) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let held = self
                .world
                .lock()
                .unwrap()
                .inventory
                .iter()
                .any(|s| s.name == item);
            self.record(GameCall::Equip(item.clone(), slot));
            if !held {
                anyhow::bail!("no {item} in inventory");
            }
            Ok(())
        })
    }

    fn consume(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::Consume);
            Ok(())
        })
    }

    fn toss(&self, item: String, count: u32) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::Toss(item.clone(), count));
            let mut world = self.world.lock().unwrap();
            let mut left = count;
            for s in world.inventory.iter_mut().filter(|s| s.name == item) {
                let take = left.min(s.count);
                s.count -= take;
                left -= take;
            }
            world.inventory.retain(|s| s.count > 0);
            Ok(())
        })
    }

    fn sleep_in(&self, bed: Vec3) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(GameCall::SleepIn(bed));
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct FakeChat {
    said: Mutex<Vec<String>>,
}

impl FakeChat {
    pub fn said(&self) -> Vec<String> {
        self.said.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.said.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.said.lock().unwrap().clear();
    }
}

impl ChatSink for FakeChat {
    fn say(&self, text: String) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.said.lock().unwrap().push(text);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct FakeClassifier {
    responses: Mutex<VecDeque<anyhow::Result<String>>>,
    seen: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn push_response(&self, raw: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(raw.into()));
    }

    pub fn push_error(&self, msg: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(msg.to_string())));
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl IntentClassifier for FakeClassifier {
    fn classify<'a>(
        &'a self,
        _status: StatusContext,
        _issuer: &'a str,
        message: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(message.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| anyhow::bail!("no classifier response queued"))
        })
    }
}
