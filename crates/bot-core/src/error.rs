use crate::agent::wire::IntentParseError;

pub const REPLY_REPHRASE: &str = "I had trouble understanding that. Could you rephrase it?";
pub const REPLY_APOLOGY: &str = "Sorry, I encountered an error while processing your request.";
pub const REPLY_UNSURE: &str = "I'm not sure what you want me to do. Could you be more specific?";
pub const REPLY_NEED_SPECIFICS: &str =
    "I understand that command but I need more specific instructions.";
pub const REPLY_CONVERSATION_FALLBACK: &str = "I understand, but I'm not sure how to respond.";

/// Failures that surface through the dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("classification failed: {0}")]
    Classification(#[from] IntentParseError),

    /// The command was understood but the agent declines it in its current condition.
    #[error("refused: {0}")]
    Refused(String),

    #[error("target not found: {reference}")]
    TargetNotFound { reference: String, reply: String },

    #[error("{action} failed: {source:#}")]
    WorldAction {
        action: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("connection lost: {0}")]
    Connection(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl AgentError {
    pub fn target_not_found(reference: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::TargetNotFound {
            reference: reference.into(),
            reply: reply.into(),
        }
    }

    pub fn world(action: &'static str, source: anyhow::Error) -> Self {
        Self::WorldAction { action, source }
    }

    /// Chat text for the owner, or `None` when the failure stays internal.
    pub fn reply(&self) -> Option<String> {
        match self {
            AgentError::Classification(_) => Some(REPLY_REPHRASE.to_string()),
            AgentError::Refused(reply) | AgentError::TargetNotFound { reply, .. } => {
                Some(reply.clone())
            }
            AgentError::WorldAction { action, source } => {
                Some(format!("Failed to {action}: {source}"))
            }
            AgentError::Connection(_) => None,
            AgentError::Unexpected(_) => Some(REPLY_APOLOGY.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_follow_error_kind() {
        assert_eq!(
            AgentError::from(IntentParseError::InvalidJson).reply().as_deref(),
            Some(REPLY_REPHRASE)
        );
        assert_eq!(
            AgentError::target_not_found("bob", "I can't find player bob.")
                .reply()
                .as_deref(),
            Some("I can't find player bob.")
        );
        assert_eq!(
            AgentError::Refused("Not now.".into()).reply().as_deref(),
            Some("Not now.")
        );
        assert_eq!(
            AgentError::world("dig", anyhow::anyhow!("block is bedrock"))
                .reply()
                .as_deref(),
            Some("Failed to dig: block is bedrock")
        );
        assert!(AgentError::Connection("reset".into()).reply().is_none());
        assert_eq!(
            AgentError::from(anyhow::anyhow!("boom")).reply().as_deref(),
            Some(REPLY_APOLOGY)
        );
    }
}
