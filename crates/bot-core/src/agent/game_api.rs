use std::future::Future;
use std::pin::Pin;

use crate::world::{
    BlockInfo, BlockQuery, EntityId, EntityInfo, EquipSlot, ItemStack, NavGoal, PlayerInfo,
    Telemetry, Vec3,
};

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Boundary the agent uses to read world state and drive world primitives.
///
/// The pathfinder, entity tracking and combat primitives live behind this trait; the agent
/// never reimplements them. Every call suspends the controller until the gateway answers.
pub trait GameApi: Send + Sync {
    fn telemetry(&self) -> ApiFuture<'_, Telemetry>;

    /// Tracked entities in observation order, excluding the agent itself.
    fn entities(&self) -> ApiFuture<'_, Vec<EntityInfo>>;

    fn entity(&self, id: EntityId) -> ApiFuture<'_, Option<EntityInfo>>;

    /// Connected players, excluding the agent itself.
    fn players(&self) -> ApiFuture<'_, Vec<PlayerInfo>>;

    /// Nearest block matching `query` within `query.max_distance`.
    fn find_block(&self, query: BlockQuery) -> ApiFuture<'_, Option<BlockInfo>>;

    fn inventory(&self) -> ApiFuture<'_, Vec<ItemStack>>;

    /// Replaces the pathfinder goal. Completion arrives later as a world event.
    fn set_goal(&self, goal: NavGoal) -> ApiFuture<'_, ()>;

    fn cancel_goal(&self) -> ApiFuture<'_, ()>;

    fn look_at(&self, point: Vec3) -> ApiFuture<'_, ()>;

    fn attack(&self, entity: EntityId) -> ApiFuture<'_, ()>;

    /// Resolves once the block is broken.
    fn dig(&self, block: Vec3) -> ApiFuture<'_, ()>;

    fn equip(&self, item: String, slot: EquipSlot) -> ApiFuture<'_, ()>;

    /// Consumes whatever is held in hand.
    fn consume(&self) -> ApiFuture<'_, ()>;

    fn toss(&self, item: String, count: u32) -> ApiFuture<'_, ()>;

    fn sleep_in(&self, bed: Vec3) -> ApiFuture<'_, ()>;
}

/// The single outbound chat channel.
pub trait ChatSink: Send + Sync {
    fn say(&self, text: String) -> ApiFuture<'_, ()>;
}

/// Sends a reply; chat failures are logged and never interrupt the caller.
pub async fn say(chat: &dyn ChatSink, text: impl Into<String>) {
    let text = text.into();
    tracing::debug!(text = %text, "agent.chat.reply");
    if let Err(err) = chat.say(text).await {
        tracing::warn!(error = %format!("{err:#}"), "agent.chat.reply_failed");
    }
}
