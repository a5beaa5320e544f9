use anyhow::Context;

use super::combat::{best_armor, best_weapon, flee_point};
use super::game_api::{say, ChatSink, GameApi};
use super::state::{
    ActionKind, ActiveAction, AgentState, InventorySnapshot, ResolvedTarget,
};
use crate::error::AgentError;
use crate::world::{EntityId, EntityInfo, EquipSlot, NavGoal, PathStatus, Vec3};

pub const REPLY_HURT: &str = "I'm badly hurt, falling back!";
pub const REPLY_NO_PATH: &str = "I couldn't find a path there.";
pub const REPLY_RETREAT: &str = "Retreating to a safe distance!";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorConfig {
    /// Health below this forces a retreat while fighting or guarding.
    pub health_threshold: f32,
    pub melee_range: f32,
    pub follow_range: f32,
    pub guard_radius: f32,
    pub flee_distance: f32,
    pub dig_reach: f32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            health_threshold: 8.0,
            melee_range: 3.0,
            follow_range: 2.0,
            guard_radius: 16.0,
            flee_distance: 16.0,
            dig_reach: 4.5,
        }
    }
}

/// Requests that replace the active action.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Navigate {
        target: ResolvedTarget,
        goal: NavGoal,
    },
    Dig {
        target: ResolvedTarget,
    },
    Attack {
        target: ResolvedTarget,
    },
    Guard {
        target: ResolvedTarget,
    },
    Flee {
        danger: Option<Vec3>,
        source: Option<ResolvedTarget>,
    },
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Idle,
    /// Waiting on the gateway (pathing in flight).
    Waiting,
    Pursuing { target: EntityId },
    Struck { target: EntityId },
    /// In melee range but airborne; no strike this tick.
    Engaged { target: EntityId },
    Watching,
    Finished { kind: ActionKind },
    Preempted,
    Cancelled,
    Failed { kind: ActionKind },
}

/// Where a retreat is headed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FleePlan {
    Away { from: Vec3, to: Vec3 },
    ToSafety { to: Vec3 },
    Nowhere,
}

/// Owns `AgentState` and runs exactly one action at a time.
#[derive(Debug, Clone, Default)]
pub struct ActionExecutor {
    state: AgentState,
    pub cfg: ExecutorConfig,
    transitions: u64,
}

impl ActionExecutor {
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self {
            state: AgentState::default(),
            cfg,
            transitions: 0,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn kind(&self) -> ActionKind {
        self.state.current.kind
    }

    pub fn is_idle(&self) -> bool {
        self.kind() == ActionKind::Idle
    }

    /// Number of transition requests served so far, failed ones included.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Replaces the active action. On error the agent is left idle.
    pub async fn transition(
        &mut self,
        transition: Transition,
        api: &dyn GameApi,
    ) -> Result<ActionKind, AgentError> {
        tracing::debug!(from = self.kind().label(), request = ?transition, "agent.executor.transition");
        self.transitions += 1;
        if !matches!(transition, Transition::Guard { .. } | Transition::Stop) {
            self.state.guard_target = None;
        }

        match transition {
            Transition::Stop => {
                self.state.current = ActiveAction::idle();
                self.state.guard_target = None;
                api.cancel_goal()
                    .await
                    .map_err(|e| AgentError::world("stop", e))?;
            }
            Transition::Navigate { target, goal } => {
                self.enter(ActionKind::Navigating, Some(target), api).await?;
                self.submit_goal(goal, api)
                    .await
                    .map_err(|e| self.abort("move", e))?;
            }
            Transition::Dig { target } => {
                if !matches!(target, ResolvedTarget::Block { .. }) {
                    return Err(AgentError::target_not_found(
                        target.label(),
                        format!("I couldn't find any {} nearby.", target.label()),
                    ));
                }
                self.enter(ActionKind::Digging, Some(target), api).await?;
            }
            Transition::Attack { target } => {
                if target.entity_id().is_none() {
                    return Err(AgentError::target_not_found(
                        target.label(),
                        format!("I couldn't find any {} nearby.", target.label()),
                    ));
                }
                self.enter(ActionKind::Combat, Some(target), api).await?;
            }
            Transition::Guard { target } => {
                self.enter(ActionKind::Guarding, Some(target.clone()), api)
                    .await?;
                self.state.guard_target = Some(target);
            }
            Transition::Flee { danger, source } => {
                self.begin_flee(danger, source, api)
                    .await
                    .map_err(|e| self.abort("flee", e))?;
            }
        }
        Ok(self.kind())
    }

    async fn enter(
        &mut self,
        kind: ActionKind,
        target: Option<ResolvedTarget>,
        api: &dyn GameApi,
    ) -> Result<(), AgentError> {
        self.release_goal(api)
            .await
            .map_err(|e| AgentError::world("cancel the previous goal", e))?;
        self.state.current = ActiveAction::new(kind, target);
        Ok(())
    }

    fn abort(&mut self, action: &'static str, err: anyhow::Error) -> AgentError {
        self.state.current = ActiveAction::idle();
        AgentError::world(action, err)
    }

    async fn release_goal(&mut self, api: &dyn GameApi) -> anyhow::Result<()> {
        if self.state.current.goal.take().is_some() {
            api.cancel_goal().await.context("cancel goal")?;
        }
        Ok(())
    }

    async fn submit_goal(&mut self, goal: NavGoal, api: &dyn GameApi) -> anyhow::Result<()> {
        api.set_goal(goal.clone()).await.context("set goal")?;
        self.state.current.goal = Some(goal);
        Ok(())
    }

    async fn set_idle(&mut self, api: &dyn GameApi) -> anyhow::Result<()> {
        self.release_goal(api).await?;
        self.state.current = ActiveAction::idle();
        Ok(())
    }

    /// Starts a retreat, or settles idle when there is nowhere to run from or to.
    ///
    /// Danger comes from the explicit position, then the source's position, then the nearest
    /// tracked threat. Without any danger the agent heads back to its spawn point.
    pub async fn begin_flee(
        &mut self,
        danger: Option<Vec3>,
        source: Option<ResolvedTarget>,
        api: &dyn GameApi,
    ) -> anyhow::Result<FleePlan> {
        self.state.guard_target = None;
        let me = api.telemetry().await.context("flee telemetry")?.position;
        self.state.note_position(me);

        let danger = danger
            .or_else(|| source.as_ref().and_then(|s| s.position()))
            .or_else(|| self.state.nearest_threat(me).map(|(_, t)| t.position));

        let plan = match (danger, self.state.safe_position) {
            (Some(from), _) => FleePlan::Away {
                from,
                to: flee_point(me, from, self.cfg.flee_distance).floor(),
            },
            (None, Some(safe)) => FleePlan::ToSafety { to: safe.floor() },
            (None, None) => FleePlan::Nowhere,
        };

        self.release_goal(api).await?;
        match plan {
            FleePlan::Away { to, .. } | FleePlan::ToSafety { to } => {
                self.state.current = ActiveAction::new(ActionKind::Fleeing, source);
                self.submit_goal(NavGoal::Block { position: to }, api)
                    .await?;
            }
            FleePlan::Nowhere => {
                self.state.current = ActiveAction::idle();
            }
        }
        tracing::info!(plan = ?plan, "agent.flee.start");
        Ok(plan)
    }

    /// Marks the active action for wind-down on the next tick.
    pub fn request_cancel(&mut self) {
        self.state.current.cancel_requested = true;
    }

    pub async fn refresh_inventory(
        &mut self,
        api: &dyn GameApi,
    ) -> anyhow::Result<&InventorySnapshot> {
        let items = api.inventory().await.context("read inventory")?;
        self.state.inventory = InventorySnapshot::categorize(&items);
        Ok(&self.state.inventory)
    }

    /// Health change entry point. Returns true when the agent was forced into a retreat.
    pub async fn on_health(
        &mut self,
        health: f32,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<bool> {
        if health >= self.cfg.health_threshold {
            return Ok(false);
        }
        if self.kind() == ActionKind::Fleeing {
            return Ok(false);
        }
        if !(self.state.is_fighting() || self.state.is_guarding()) {
            return Ok(false);
        }
        self.preempt(health, api, chat).await?;
        Ok(true)
    }

    async fn preempt(
        &mut self,
        health: f32,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<()> {
        let source = if self.state.is_fighting() {
            self.state.current.target.clone()
        } else {
            None
        };
        tracing::warn!(
            health,
            action = self.kind().label(),
            danger = source.as_ref().map(|s| s.label()).unwrap_or("none"),
            "agent.combat.preempt"
        );
        say(chat, REPLY_HURT).await;
        let plan = self.begin_flee(None, source, api).await?;
        if plan == FleePlan::Nowhere {
            say(chat, REPLY_RETREAT).await;
        }
        Ok(())
    }

    pub async fn on_goal_reached(
        &mut self,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<()> {
        let follow = self
            .state
            .current
            .goal
            .as_ref()
            .map(|g| g.is_follow())
            .unwrap_or(false);
        match self.kind() {
            ActionKind::Navigating if !follow => {
                self.state.current.goal = None;
                self.set_idle(api).await?;
                say(chat, "I've arrived.").await;
            }
            ActionKind::Fleeing => {
                self.state.current.goal = None;
                self.set_idle(api).await?;
                tracing::info!("agent.flee.done");
            }
            ActionKind::Digging => {
                self.state.current.goal = None;
                self.state.current.in_reach = true;
            }
            _ => {}
        }
        Ok(())
    }

    pub async fn on_path_failed(
        &mut self,
        status: PathStatus,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<()> {
        tracing::info!(status = ?status, action = self.kind().label(), "agent.path.failed");
        match self.kind() {
            ActionKind::Navigating | ActionKind::Fleeing | ActionKind::Digging => {
                self.set_idle(api).await?;
                say(chat, REPLY_NO_PATH).await;
            }
            ActionKind::Combat | ActionKind::Guarding => {
                // Resubmitted on the next step.
                self.state.current.goal = None;
            }
            ActionKind::Idle => {}
        }
        Ok(())
    }

    /// The pathfinder dropped its plan. Only a stuck reset ends the action.
    pub async fn on_path_reset(
        &mut self,
        reason: Option<&str>,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<()> {
        if reason.is_some_and(|r| r.eq_ignore_ascii_case("stuck")) {
            return self.on_path_failed(PathStatus::NoPath, api, chat).await;
        }
        tracing::debug!(reason = reason.unwrap_or(""), "agent.path.reset");
        Ok(())
    }

    pub(crate) fn observe_entity(&mut self, entity: &EntityInfo) {
        self.state.track_entity(entity);
    }

    pub(crate) fn entity_gone(&mut self, id: EntityId) {
        self.state.forget(id);
    }

    pub(crate) fn moved(&mut self, position: Vec3) {
        self.state.note_position(position);
    }

    pub(crate) fn spawned(&mut self, position: Vec3) {
        self.state.note_spawn(position);
    }

    /// Advances the active action by one step.
    pub async fn tick(
        &mut self,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<StepOutcome> {
        if self.state.current.cancel_requested {
            let kind = self.kind();
            self.state.guard_target = None;
            self.set_idle(api).await?;
            tracing::info!(action = kind.label(), "agent.executor.cancelled");
            return Ok(StepOutcome::Cancelled);
        }

        match self.kind() {
            ActionKind::Idle => Ok(StepOutcome::Idle),
            ActionKind::Navigating | ActionKind::Fleeing => Ok(StepOutcome::Waiting),
            ActionKind::Digging => self.step_dig(api, chat).await,
            ActionKind::Combat => self.step_combat(api, chat).await,
            ActionKind::Guarding => self.step_guard(api).await,
        }
    }

    async fn step_combat(
        &mut self,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<StepOutcome> {
        let Some(id) = self
            .state
            .current
            .target
            .as_ref()
            .and_then(|t| t.entity_id())
        else {
            return self.finish_combat(api).await;
        };

        let me = api.telemetry().await.context("combat telemetry")?;
        if me.health < self.cfg.health_threshold {
            self.preempt(me.health, api, chat).await?;
            return Ok(StepOutcome::Preempted);
        }

        let live = api
            .entity(id)
            .await
            .context("combat target")?
            .filter(|e| e.is_alive());
        let Some(live) = live else {
            self.state.forget(id);
            tracing::info!(target = id, "agent.combat.target_down");
            let outcome = self.finish_combat(api).await?;
            if self.kind() == ActionKind::Idle {
                say(chat, "Target down.").await;
            }
            return Ok(outcome);
        };

        if self.state.current.resume_guard {
            if let Some(watch) = self.watch_position(api).await? {
                if watch.distance_to(&live.position) > self.cfg.guard_radius {
                    tracing::info!(target = id, "agent.guard.threat_left");
                    return self.finish_combat(api).await;
                }
            }
        }

        if !self.state.current.prepared {
            self.equip_for_combat(api).await;
            self.state.current.prepared = true;
        }

        if let Some(target) = self.state.current.target.as_ref() {
            self.state.current.target = Some(target.with_position(live.position, me.position));
        }

        let distance = me.position.distance_to(&live.position);
        if distance > self.cfg.melee_range {
            let following = matches!(
                self.state.current.goal,
                Some(NavGoal::Follow { entity, .. }) if entity == id
            );
            if !following {
                self.submit_goal(
                    NavGoal::Follow {
                        entity: id,
                        range: self.cfg.follow_range,
                    },
                    api,
                )
                .await?;
            }
            return Ok(StepOutcome::Pursuing { target: id });
        }

        api.look_at(live.aim_point()).await.context("look at target")?;
        if !me.on_ground {
            return Ok(StepOutcome::Engaged { target: id });
        }
        api.attack(id).await.context("attack")?;
        tracing::debug!(target = id, distance, "agent.combat.strike");

        let after = api.telemetry().await.context("combat telemetry")?;
        if after.health < self.cfg.health_threshold {
            self.preempt(after.health, api, chat).await?;
            return Ok(StepOutcome::Preempted);
        }
        Ok(StepOutcome::Struck { target: id })
    }

    async fn finish_combat(&mut self, api: &dyn GameApi) -> anyhow::Result<StepOutcome> {
        self.release_goal(api).await?;
        let resume = self.state.current.resume_guard;
        match self.state.guard_target.clone() {
            Some(watch) if resume => {
                self.state.current = ActiveAction::new(ActionKind::Guarding, Some(watch));
            }
            _ => self.state.current = ActiveAction::idle(),
        }
        Ok(StepOutcome::Finished {
            kind: ActionKind::Combat,
        })
    }

    async fn equip_for_combat(&mut self, api: &dyn GameApi) {
        let items = match api.inventory().await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "agent.combat.gear_failed");
                return;
            }
        };
        let mut picks: Vec<(EquipSlot, String)> = Vec::new();
        if let Some(weapon) = best_weapon(&items) {
            picks.push((EquipSlot::Hand, weapon.name.clone()));
        }
        for (slot, piece) in best_armor(&items) {
            picks.push((slot, piece.name.clone()));
        }
        for (slot, name) in picks {
            if let Err(err) = api.equip(name.clone(), slot).await {
                tracing::warn!(item = %name, error = %format!("{err:#}"), "agent.combat.gear_failed");
            }
        }
    }

    /// Live position of the guard watch target, falling back to its last known position.
    async fn watch_position(&mut self, api: &dyn GameApi) -> anyhow::Result<Option<Vec3>> {
        let Some(watch) = self.state.guard_target.clone() else {
            return Ok(None);
        };
        let live = match watch.entity_id() {
            Some(id) => api
                .entity(id)
                .await
                .context("guard target")?
                .filter(|e| e.valid)
                .map(|e| e.position),
            None => None,
        };
        match live {
            Some(pos) => {
                let me = self.state.last_position.unwrap_or(pos);
                self.state.guard_target = Some(watch.with_position(pos, me));
                Ok(Some(pos))
            }
            None => Ok(watch.position()),
        }
    }

    async fn step_guard(&mut self, api: &dyn GameApi) -> anyhow::Result<StepOutcome> {
        if self.state.guard_target.is_none() {
            self.set_idle(api).await?;
            return Ok(StepOutcome::Idle);
        }
        let me = api.telemetry().await.context("guard telemetry")?.position;
        self.state.note_position(me);
        let watch = self.watch_position(api).await?.unwrap_or(me);

        let mut nearest: Option<(EntityId, f32)> = None;
        for (id, threat) in &self.state.threats {
            let d = watch.distance_to(&threat.position);
            if d > self.cfg.guard_radius {
                continue;
            }
            if nearest.map(|(_, nd)| d < nd).unwrap_or(true) {
                nearest = Some((*id, d));
            }
        }

        if let Some((id, _)) = nearest {
            if let Some(threat) = self.state.threats.get(&id).cloned() {
                self.release_goal(api).await?;
                self.state.current = ActiveAction {
                    resume_guard: true,
                    ..ActiveAction::new(
                        ActionKind::Combat,
                        Some(ResolvedTarget::Entity {
                            id,
                            name: threat.name.clone(),
                            distance: me.distance_to(&threat.position),
                            position: threat.position,
                        }),
                    )
                };
                tracing::info!(target = id, name = %threat.name, "agent.guard.engage");
                return Ok(StepOutcome::Engaged { target: id });
            }
        }

        let watch_entity = self
            .state
            .guard_target
            .as_ref()
            .and_then(|t| t.entity_id());
        if let Some(entity) = watch_entity {
            if me.distance_to(&watch) > self.cfg.follow_range && !self.state.current.has_goal() {
                self.submit_goal(
                    NavGoal::Follow {
                        entity,
                        range: self.cfg.follow_range,
                    },
                    api,
                )
                .await?;
            }
        }
        Ok(StepOutcome::Watching)
    }

    async fn step_dig(
        &mut self,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> anyhow::Result<StepOutcome> {
        let Some(ResolvedTarget::Block { position, name, .. }) = self.state.current.target.clone()
        else {
            self.set_idle(api).await?;
            return Ok(StepOutcome::Failed {
                kind: ActionKind::Digging,
            });
        };

        if !self.state.current.in_reach {
            let me = api.telemetry().await.context("dig telemetry")?.position;
            if me.distance_to(&position) > self.cfg.dig_reach {
                if !self.state.current.has_goal() {
                    self.submit_goal(
                        NavGoal::Near {
                            position,
                            range: (self.cfg.dig_reach - 1.0).max(1.0),
                        },
                        api,
                    )
                    .await?;
                }
                return Ok(StepOutcome::Waiting);
            }
            self.state.current.in_reach = true;
        }

        let result = api.dig(position).await;
        self.set_idle(api).await?;
        match result {
            Ok(()) => {
                tracing::info!(block = %name, "agent.dig.done");
                say(chat, "Done digging!").await;
                Ok(StepOutcome::Finished {
                    kind: ActionKind::Digging,
                })
            }
            Err(err) => {
                tracing::warn!(block = %name, error = %format!("{err:#}"), "agent.dig.failed");
                if let Some(reply) = AgentError::world("dig", err).reply() {
                    say(chat, reply).await;
                }
                Ok(StepOutcome::Failed {
                    kind: ActionKind::Digging,
                })
            }
        }
    }
}
