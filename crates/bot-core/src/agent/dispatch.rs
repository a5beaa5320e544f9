use std::future::Future;
use std::pin::Pin;

use super::executor::{ActionExecutor, Transition};
use super::game_api::{say, ChatSink, GameApi};
use super::handlers::{BaseCommands, CombatCommands};
use super::resolver::TargetResolver;
use super::state::{ActionKind, ResolvedTarget};
use super::wire::{Command, CommandParameters, Intent};
use crate::error::{AgentError, REPLY_CONVERSATION_FALLBACK, REPLY_NEED_SPECIFICS};

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AgentError>> + Send + 'a>>;

/// Everything a handler may touch while serving one command.
pub struct CommandContext<'a> {
    pub issuer: &'a str,
    pub parameters: &'a CommandParameters,
    pub executor: &'a mut ActionExecutor,
    pub resolver: &'a TargetResolver,
    pub api: &'a dyn GameApi,
    pub chat: &'a dyn ChatSink,
}

impl CommandContext<'_> {
    pub async fn reply(&self, text: impl Into<String>) {
        say(self.chat, text).await;
    }

    pub async fn resolve(&self, reference: &str) -> Result<ResolvedTarget, AgentError> {
        Ok(self.resolver.resolve(reference, self.api).await?)
    }

    pub async fn transition(&mut self, transition: Transition) -> Result<ActionKind, AgentError> {
        self.executor.transition(transition, self.api).await
    }
}

/// One layer of command handling. Layers are consulted newest first.
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn intercepts(&self, command: Command) -> bool;

    fn handle<'a>(&'a self, command: Command, ctx: CommandContext<'a>) -> HandlerFuture<'a>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Not from the owner.
    Ignored,
    /// Conversation or clarification reply; no state change.
    Replied,
    Handled {
        layer: &'static str,
        command: Command,
    },
    Unhandled {
        command: Command,
    },
    Unrecognized {
        name: String,
    },
    Failed {
        command: Command,
    },
}

pub struct Dispatcher {
    owner: String,
    layers: Vec<Box<dyn CommandHandler>>,
}

impl Dispatcher {
    /// A dispatcher with no layers; every command falls through to the clarification reply.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            layers: Vec::new(),
        }
    }

    /// Base commands with the combat layer on top.
    pub fn with_default_layers(owner: impl Into<String>) -> Self {
        Self::new(owner)
            .layer(BaseCommands)
            .layer(CombatCommands)
    }

    /// Pushes a layer in front of the existing ones.
    pub fn layer(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.layers.insert(0, Box::new(handler));
        self
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Exact, case-sensitive username match.
    pub fn is_authorized(&self, issuer: &str) -> bool {
        issuer == self.owner
    }

    /// Routes one intent. Handler errors end here as a chat reply and never propagate.
    pub async fn dispatch(
        &self,
        intent: Intent,
        issuer: &str,
        executor: &mut ActionExecutor,
        resolver: &TargetResolver,
        api: &dyn GameApi,
        chat: &dyn ChatSink,
    ) -> DispatchOutcome {
        if !self.is_authorized(issuer) {
            tracing::debug!(issuer, "agent.dispatch.ignored");
            return DispatchOutcome::Ignored;
        }

        let (command, parameters) = match intent {
            Intent::Conversation { message } => {
                say(
                    chat,
                    message.unwrap_or_else(|| REPLY_CONVERSATION_FALLBACK.to_string()),
                )
                .await;
                return DispatchOutcome::Replied;
            }
            Intent::UnrecognizedCommand { name } => {
                tracing::info!(command = %name, "agent.dispatch.unrecognized");
                say(chat, REPLY_NEED_SPECIFICS).await;
                return DispatchOutcome::Unrecognized { name };
            }
            Intent::Command {
                command,
                parameters,
            } => (command, parameters),
        };

        if let Err(err) = executor.refresh_inventory(api).await {
            tracing::warn!(error = %format!("{err:#}"), "agent.dispatch.inventory_failed");
        }

        let Some(layer) = self.layers.iter().find(|l| l.intercepts(command)) else {
            tracing::info!(command = command.name(), "agent.dispatch.unhandled");
            say(chat, REPLY_NEED_SPECIFICS).await;
            return DispatchOutcome::Unhandled { command };
        };

        tracing::info!(
            command = command.name(),
            layer = layer.name(),
            targets = ?parameters.targets,
            items = ?parameters.items,
            "agent.dispatch.command"
        );
        let serial = executor.transitions();
        let ctx = CommandContext {
            issuer,
            parameters: &parameters,
            executor,
            resolver,
            api,
            chat,
        };
        match layer.handle(command, ctx).await {
            Ok(()) => {
                // A command that did not start its own action still supersedes the running one.
                if executor.transitions() == serial && !executor.is_idle() {
                    tracing::info!(
                        command = command.name(),
                        action = executor.kind().label(),
                        "agent.dispatch.superseded"
                    );
                    executor.request_cancel();
                }
                DispatchOutcome::Handled {
                    layer: layer.name(),
                    command,
                }
            }
            Err(err) => {
                tracing::warn!(
                    command = command.name(),
                    error = %err,
                    "agent.dispatch.failed"
                );
                if let Some(reply) = err.reply() {
                    say(chat, reply).await;
                }
                DispatchOutcome::Failed { command }
            }
        }
    }
}
