use super::executor::ActionExecutor;
use super::game_api::{ChatSink, GameApi};
use crate::world::WorldEvent;

/// What a world event turned into after folding it into agent state.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Folded,
    /// Chat is handed back to the controller for owner gating and classification.
    Chat { username: String, text: String },
    Preempted,
    LoggedIn,
    SessionStarted,
    SessionEnded,
}

/// Folds one world event into agent state through the executor.
pub async fn ingest(
    executor: &mut ActionExecutor,
    event: WorldEvent,
    api: &dyn GameApi,
    chat: &dyn ChatSink,
) -> anyhow::Result<Ingested> {
    if event.ends_session() {
        tracing::warn!(event = ?event, "agent.session.ended");
        executor.request_cancel();
        return Ok(Ingested::SessionEnded);
    }

    match event {
        WorldEvent::Login => Ok(Ingested::LoggedIn),
        WorldEvent::Spawn { position } => {
            executor.spawned(position);
            tracing::info!(position = %position, "agent.session.spawn");
            Ok(Ingested::SessionStarted)
        }
        WorldEvent::Kicked { reason } => {
            tracing::warn!(reason = reason.as_deref().unwrap_or(""), "agent.session.kicked");
            Ok(Ingested::Folded)
        }
        WorldEvent::Error { message, code } => {
            tracing::warn!(message = %message, code = code.as_deref().unwrap_or(""), "agent.session.error");
            Ok(Ingested::Folded)
        }
        WorldEvent::Chat { username, text } => Ok(Ingested::Chat { username, text }),
        WorldEvent::EntityUpdate { entity } => {
            executor.observe_entity(&entity);
            Ok(Ingested::Folded)
        }
        WorldEvent::EntityGone { id } => {
            executor.entity_gone(id);
            Ok(Ingested::Folded)
        }
        WorldEvent::Move { position } => {
            executor.moved(position);
            Ok(Ingested::Folded)
        }
        WorldEvent::Health { health, .. } => {
            if executor.on_health(health, api, chat).await? {
                Ok(Ingested::Preempted)
            } else {
                Ok(Ingested::Folded)
            }
        }
        WorldEvent::GoalReached => {
            executor.on_goal_reached(api, chat).await?;
            Ok(Ingested::Folded)
        }
        WorldEvent::PathUpdate { status } => {
            if status.is_failure() {
                executor.on_path_failed(status, api, chat).await?;
            }
            Ok(Ingested::Folded)
        }
        WorldEvent::PathReset { reason } => {
            executor.on_path_reset(reason.as_deref(), api, chat).await?;
            Ok(Ingested::Folded)
        }
        WorldEvent::SessionEnded { .. } => Ok(Ingested::SessionEnded),
    }
}
