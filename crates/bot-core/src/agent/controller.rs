use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::classifier::IntentClassifier;
use super::dispatch::{DispatchOutcome, Dispatcher};
use super::executor::{ActionExecutor, StepOutcome, Transition};
use super::game_api::{say, ChatSink, GameApi};
use super::ingest::{ingest, Ingested};
use super::prompt::StatusContext;
use super::resolver::TargetResolver;
use super::session::Reconnector;
use super::state::AgentState;
use super::wire::{parse_intent, IntentParseError};
use crate::config::AgentConfig;
use crate::error::{REPLY_APOLOGY, REPLY_REPHRASE, REPLY_UNSURE};
use crate::world::WorldEvent;

/// Everything the controller task consumes besides its own ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlInput {
    Chat { username: String, text: String },
    World(WorldEvent),
    Shutdown,
}

/// Owns the executor and serialises chat, world events and ticks onto one task.
pub struct Controller {
    bot_name: String,
    dispatcher: Dispatcher,
    executor: ActionExecutor,
    resolver: TargetResolver,
    classifier: Arc<dyn IntentClassifier>,
    api: Arc<dyn GameApi>,
    chat: Arc<dyn ChatSink>,
    reconnector: Option<Reconnector>,
    tick_interval: Duration,
}

impl Controller {
    pub fn new(
        cfg: &AgentConfig,
        api: Arc<dyn GameApi>,
        chat: Arc<dyn ChatSink>,
        classifier: Arc<dyn IntentClassifier>,
    ) -> Self {
        Self {
            bot_name: cfg.bot_name.clone(),
            dispatcher: Dispatcher::with_default_layers(cfg.owner.clone()),
            executor: ActionExecutor::new(cfg.executor()),
            resolver: TargetResolver::new(cfg.block_radius),
            classifier,
            api,
            chat,
            reconnector: None,
            tick_interval: cfg.tick_interval(),
        }
    }

    pub fn with_reconnector(mut self, reconnector: Reconnector) -> Self {
        self.reconnector = Some(reconnector);
        self
    }

    /// Replaces the handler chain; the owner is taken from the new dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn state(&self) -> &AgentState {
        self.executor.state()
    }

    /// Runs until `Shutdown` arrives or every sender is dropped, then stops the agent.
    pub async fn run(&mut self, mut inputs: mpsc::Receiver<ControlInput>) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            owner = self.dispatcher.owner(),
            tick_ms = self.tick_interval.as_millis() as u64,
            "agent.controller.start"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                input = inputs.recv() => match input {
                    Some(ControlInput::Chat { username, text }) => {
                        self.on_chat(&username, &text).await;
                    }
                    Some(ControlInput::World(event)) => {
                        self.on_world_event(event).await;
                    }
                    Some(ControlInput::Shutdown) | None => break,
                },
            }
        }

        self.shutdown().await
    }

    /// Owner check, classification and dispatch for one chat line.
    pub async fn on_chat(&mut self, username: &str, text: &str) -> DispatchOutcome {
        if username == self.bot_name || !self.dispatcher.is_authorized(username) {
            tracing::debug!(username, "agent.chat.ignored");
            return DispatchOutcome::Ignored;
        }
        tracing::info!(username, text, "agent.chat.owner");

        let status = self.status_context().await;
        let raw = match self.classifier.classify(status, username, text).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "agent.classify.failed");
                say(self.chat.as_ref(), REPLY_APOLOGY).await;
                return DispatchOutcome::Replied;
            }
        };

        let intent = match parse_intent(&raw) {
            Ok(intent) => intent,
            Err(err) => {
                tracing::warn!(error = %err, raw = %raw, "agent.classify.invalid");
                let reply = match err {
                    IntentParseError::UnsupportedKind(_) => REPLY_UNSURE,
                    _ => REPLY_REPHRASE,
                };
                say(self.chat.as_ref(), reply).await;
                return DispatchOutcome::Replied;
            }
        };

        self.dispatcher
            .dispatch(
                intent,
                username,
                &mut self.executor,
                &self.resolver,
                self.api.as_ref(),
                self.chat.as_ref(),
            )
            .await
    }

    async fn status_context(&self) -> StatusContext {
        let mut status = StatusContext::default();
        match self.api.telemetry().await {
            Ok(t) => {
                status.health = t.health;
                status.food = t.food;
            }
            Err(err) => tracing::warn!(error = %format!("{err:#}"), "agent.status.telemetry_failed"),
        }
        match self.api.inventory().await {
            Ok(items) => {
                status.inventory = items
                    .into_iter()
                    .map(|s| format!("{} x{}", s.name, s.count))
                    .collect();
            }
            Err(err) => tracing::warn!(error = %format!("{err:#}"), "agent.status.inventory_failed"),
        }
        status
    }

    pub async fn on_world_event(&mut self, event: WorldEvent) -> Ingested {
        let ingested = match ingest(
            &mut self.executor,
            event,
            self.api.as_ref(),
            self.chat.as_ref(),
        )
        .await
        {
            Ok(ingested) => ingested,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "agent.ingest.failed");
                return Ingested::Folded;
            }
        };

        match &ingested {
            Ingested::LoggedIn => {
                let greeting = format!("Hello! I am {}, ready to assist you.", self.bot_name);
                say(self.chat.as_ref(), greeting).await;
            }
            Ingested::SessionStarted => {
                if let Some(r) = &self.reconnector {
                    r.reset();
                }
            }
            Ingested::SessionEnded => match &self.reconnector {
                Some(r) => {
                    r.schedule();
                }
                None => tracing::warn!("agent.session.no_reconnector"),
            },
            Ingested::Chat { username, text } => {
                let (username, text) = (username.clone(), text.clone());
                self.on_chat(&username, &text).await;
            }
            Ingested::Folded | Ingested::Preempted => {}
        }
        ingested
    }

    pub async fn tick(&mut self) -> Option<StepOutcome> {
        match self.executor.tick(self.api.as_ref(), self.chat.as_ref()).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::warn!(
                    action = self.executor.kind().label(),
                    error = %format!("{err:#}"),
                    "agent.tick.failed"
                );
                None
            }
        }
    }

    /// Cancels whatever is running and clears the navigation goal.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        tracing::info!(action = self.executor.kind().label(), "agent.controller.shutdown");
        self.executor
            .transition(Transition::Stop, self.api.as_ref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::agent::game_api::ApiFuture;
    use crate::agent::session::{ReconnectPolicy, SessionControl};
    use crate::agent::state::ActionKind;
    use crate::test_support::{mob, stack, FakeChat, FakeClassifier, FakeGameApi, GameCall};
    use crate::world::Vec3;

    const OWNER: &str = "alex";

    struct Rig {
        api: Arc<FakeGameApi>,
        chat: Arc<FakeChat>,
        classifier: Arc<FakeClassifier>,
        controller: Controller,
    }

    fn rig() -> Rig {
        let cfg = AgentConfig {
            owner: OWNER.into(),
            ..AgentConfig::default()
        };
        let api = Arc::new(FakeGameApi::default());
        let chat = Arc::new(FakeChat::default());
        let classifier = Arc::new(FakeClassifier::default());
        let controller = Controller::new(&cfg, api.clone(), chat.clone(), classifier.clone());
        Rig {
            api,
            chat,
            classifier,
            controller,
        }
    }

    #[derive(Default)]
    struct CountingSession {
        calls: AtomicU32,
    }

    impl SessionControl for CountingSession {
        fn reconnect(&self) -> ApiFuture<'_, ()> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn strangers_never_reach_the_classifier() {
        let mut r = rig();
        r.classifier
            .push_response("{\"type\":\"command\",\"command\":\"come\"}");

        let out = r.controller.on_chat("mallory", "come here").await;

        assert_eq!(out, DispatchOutcome::Ignored);
        assert_eq!(r.classifier.call_count(), 0);
        assert_eq!(r.api.touches(), 0);
        assert!(r.chat.said().is_empty());
        assert!(r.controller.executor.is_idle());
    }

    #[tokio::test]
    async fn unparseable_output_asks_for_a_rephrase() {
        let mut r = rig();
        r.classifier.push_response("I think they want you to dance");
        r.classifier.push_response("{\"type\":\"question\"}");

        assert_eq!(r.controller.on_chat(OWNER, "boogie").await, DispatchOutcome::Replied);
        assert_eq!(r.chat.last().as_deref(), Some(REPLY_REPHRASE));

        r.controller.on_chat(OWNER, "huh").await;
        assert_eq!(r.chat.last().as_deref(), Some(REPLY_UNSURE));
        assert!(r.controller.executor.is_idle());
    }

    #[tokio::test]
    async fn classifier_failure_apologises() {
        let mut r = rig();
        r.classifier.push_error("connection refused");

        r.controller.on_chat(OWNER, "come here").await;

        assert_eq!(r.chat.said(), vec![REPLY_APOLOGY.to_string()]);
    }

    #[tokio::test]
    async fn fenced_command_reaches_the_executor() {
        let mut r = rig();
        r.api.add_player(7, OWNER, 10.0, 0.0);
        r.api.set_inventory(vec![stack("bread", 2)]);
        r.classifier
            .push_response("```json\n{\"type\":\"command\",\"command\":\"come\"}\n```");

        let out = r.controller.on_chat(OWNER, "come here").await;

        assert!(matches!(out, DispatchOutcome::Handled { .. }));
        assert_eq!(r.controller.executor.kind(), ActionKind::Navigating);
        assert_eq!(r.classifier.call_count(), 1);
    }

    #[tokio::test]
    async fn conversation_replies_once_without_mutation() {
        let mut r = rig();
        r.classifier
            .push_response("{\"type\":\"conversation\",\"message\":\"Nice weather today.\"}");

        r.controller.on_chat(OWNER, "how's it going?").await;

        assert_eq!(r.chat.said(), vec!["Nice weather today.".to_string()]);
        assert!(r.controller.executor.is_idle());
        assert!(r.api.calls().is_empty());
    }

    #[tokio::test]
    async fn login_greets_and_chat_events_are_gated() {
        let mut r = rig();

        r.controller.on_world_event(WorldEvent::Login).await;
        assert_eq!(
            r.chat.last().as_deref(),
            Some("Hello! I am Altes, ready to assist you.")
        );

        r.controller
            .on_world_event(WorldEvent::Chat {
                username: "mallory".into(),
                text: "attack alex".into(),
            })
            .await;
        assert_eq!(r.classifier.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn session_end_schedules_a_single_reconnect() -> anyhow::Result<()> {
        let session = Arc::new(CountingSession::default());
        let reconnector = Reconnector::new(session.clone(), ReconnectPolicy::default());
        let mut r = rig();
        r.controller = r.controller.with_reconnector(reconnector.clone());

        r.controller
            .on_world_event(WorldEvent::Spawn {
                position: Vec3::new(0.0, 64.0, 0.0),
            })
            .await;
        let ended = WorldEvent::SessionEnded {
            reason: Some("socketClosed".into()),
        };
        assert_eq!(
            r.controller.on_world_event(ended.clone()).await,
            Ingested::SessionEnded
        );
        r.controller.on_world_event(ended).await;
        assert!(reconnector.is_pending());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(session.calls.load(Ordering::SeqCst), 1);
        assert!(!reconnector.is_pending());

        r.controller
            .on_world_event(WorldEvent::Spawn {
                position: Vec3::new(0.0, 64.0, 0.0),
            })
            .await;
        assert_eq!(reconnector.attempts(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn run_loop_serves_inputs_and_stops_on_shutdown() -> anyhow::Result<()> {
        let mut r = rig();
        r.api.add_entity(mob(3, "zombie", 2.0, 0.0));
        r.classifier.push_response(
            "{\"type\":\"command\",\"command\":\"attack\",\"parameters\":{\"targets\":[\"zombie\"]}}",
        );

        let (tx, rx) = mpsc::channel(8);
        tx.send(ControlInput::Chat {
            username: OWNER.into(),
            text: "kill that zombie".into(),
        })
        .await?;
        tx.send(ControlInput::Shutdown).await?;

        r.controller.run(rx).await?;

        assert!(r.controller.executor.is_idle());
        assert!(r.api.calls().contains(&GameCall::CancelGoal));
        Ok(())
    }
}
