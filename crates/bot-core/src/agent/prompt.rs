use serde::{Deserialize, Serialize};
use serde_json::json;

use super::wire::Command;

/// Agent status handed to the classifier alongside each message.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StatusContext {
    pub health: f32,
    pub food: f32,
    pub inventory: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub persona: String,
    pub intent_contract: String,
    pub examples: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: "You are a Minecraft game assistant bot. You help players with in-game actions.\nClassify the message as either a game command or friendly chat.".to_string(),
            intent_contract: "Return exactly one JSON object and nothing else.\n\nGame action:\n{\"type\":\"command\",\"command\":\"<name>\",\"parameters\":{\"targets\":[\"game objects\"],\"items\":[\"inventory items\"],\"quantity\":\"number or all\"}}\n\nFriendly chat:\n{\"type\":\"conversation\",\"message\":\"friendly game-appropriate response\"}".to_string(),
            examples: "\"collect wood\" -> {\"type\":\"command\",\"command\":\"dig\",\"parameters\":{\"targets\":[\"oak_log\"]}}\n\"come here\" -> {\"type\":\"command\",\"command\":\"come\"}\n\"kill that zombie\" -> {\"type\":\"command\",\"command\":\"attack\",\"parameters\":{\"targets\":[\"zombie\"]}}\n\"hello\" -> {\"type\":\"conversation\",\"message\":\"Hi! How can I help with your adventure?\"}".to_string(),
        }
    }
}

fn command_list() -> String {
    Command::ALL
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds the classification prompt for one owner message.
pub fn build_classification_prompt(
    cfg: &PromptConfig,
    bot_name: &str,
    issuer: &str,
    status: &StatusContext,
    message: &str,
) -> String {
    let context = json!({
        "bot_name": bot_name,
        "player": issuer,
        "status": status,
    });
    let context_json =
        serde_json::to_string_pretty(&context).unwrap_or_else(|_| "{}".to_string());
    let message_json = serde_json::to_string(message).unwrap_or_else(|_| "\"\"".to_string());

    format!(
        "{}\nYour name is {bot_name}.\n\n[CONTEXT_JSON]\n{context_json}\n\n[MESSAGE]\n{message_json}\n\n[COMMANDS]\n{}\n\n[CONTRACT]\n{}\n\n[EXAMPLES]\n{}\n",
        cfg.persona,
        command_list(),
        cfg.intent_contract,
        cfg.examples
    )
}
