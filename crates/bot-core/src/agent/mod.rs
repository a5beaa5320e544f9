//! The owner-directed agent: intent parsing, command dispatch, target resolution and the
//! action state machine, wired together by [`Controller`].

pub mod classifier;
pub mod combat;
pub mod controller;
pub mod dispatch;
pub mod executor;
pub mod game_api;
pub mod handlers;
pub mod ingest;
pub mod prompt;
pub mod resolver;
pub mod session;
pub mod state;
pub mod wire;

pub use classifier::{IntentClassifier, LlmClient, LlmIntentClassifier};
pub use controller::{ControlInput, Controller};
pub use dispatch::{CommandContext, CommandHandler, DispatchOutcome, Dispatcher};
pub use executor::{ActionExecutor, ExecutorConfig, StepOutcome, Transition};
pub use game_api::{ChatSink, GameApi};
pub use resolver::TargetResolver;
pub use session::{ReconnectPolicy, Reconnector, SessionControl};
pub use state::{ActionKind, AgentState, ResolvedTarget};
pub use wire::{parse_intent, Command, CommandParameters, Intent, IntentParseError, Quantity};
