use serde::{Deserialize, Serialize};

pub const CODE_FENCE: &str = "```";

/// Raw classifier payload, before validation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IntentWire {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub parameters: Option<ParametersWire>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ParametersWire {
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    #[serde(default)]
    pub items: Option<Vec<String>>,
    #[serde(default)]
    pub locations: Option<Vec<String>>,
    #[serde(default)]
    pub quantity: Option<QuantityWire>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum QuantityWire {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentParseError {
    #[error("empty classifier response")]
    Empty,
    #[error("invalid intent json")]
    InvalidJson,
    #[error("unsupported intent type: {0}")]
    UnsupportedKind(String),
    #[error("command intent without a command name")]
    MissingCommand,
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Come,
    Goto,
    Dig,
    Attack,
    Stop,
    Drop,
    Equip,
    Store,
    Inventory,
    Craft,
    Smelt,
    Eat,
    Heal,
    Sleep,
    Guard,
    Flee,
}

impl Command {
    pub const ALL: [Command; 16] = [
        Command::Come,
        Command::Goto,
        Command::Dig,
        Command::Attack,
        Command::Stop,
        Command::Drop,
        Command::Equip,
        Command::Store,
        Command::Inventory,
        Command::Craft,
        Command::Smelt,
        Command::Eat,
        Command::Heal,
        Command::Sleep,
        Command::Guard,
        Command::Flee,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Come => "come",
            Command::Goto => "goto",
            Command::Dig => "dig",
            Command::Attack => "attack",
            Command::Stop => "stop",
            Command::Drop => "drop",
            Command::Equip => "equip",
            Command::Store => "store",
            Command::Inventory => "inventory",
            Command::Craft => "craft",
            Command::Smelt => "smelt",
            Command::Eat => "eat",
            Command::Heal => "heal",
            Command::Sleep => "sleep",
            Command::Guard => "guard",
            Command::Flee => "flee",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    All,
    Count(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandParameters {
    pub targets: Vec<String>,
    pub items: Vec<String>,
    pub quantity: Option<Quantity>,
}

fn first_non_empty(values: &[String]) -> Option<&str> {
    values.iter().map(|v| v.trim()).find(|v| !v.is_empty())
}

impl CommandParameters {
    pub fn first_target(&self) -> Option<&str> {
        first_non_empty(&self.targets)
    }

    pub fn first_item(&self) -> Option<&str> {
        first_non_empty(&self.items)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Conversation {
        message: Option<String>,
    },
    Command {
        command: Command,
        parameters: CommandParameters,
    },
    /// Well-formed command payload naming something outside the command set.
    UnrecognizedCommand {
        name: String,
    },
}

fn parse_quantity(wire: QuantityWire) -> Result<Option<Quantity>, IntentParseError> {
    match wire {
        QuantityWire::Number(n) => {
            if !n.is_finite() || n < 1.0 {
                return Err(IntentParseError::InvalidQuantity(n.to_string()));
            }
            Ok(Some(Quantity::Count(n.min(u32::MAX as f64) as u32)))
        }
        QuantityWire::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            if text.eq_ignore_ascii_case("all") {
                return Ok(Some(Quantity::All));
            }
            match text.parse::<u32>() {
                Ok(0) | Err(_) => Err(IntentParseError::InvalidQuantity(text.to_string())),
                Ok(n) => Ok(Some(Quantity::Count(n))),
            }
        }
    }
}

impl TryFrom<ParametersWire> for CommandParameters {
    type Error = IntentParseError;

    fn try_from(wire: ParametersWire) -> Result<Self, Self::Error> {
        // Older prompts put destinations under `locations`; treat them as targets.
        let mut targets = wire.targets.unwrap_or_default();
        targets.extend(wire.locations.unwrap_or_default());
        let quantity = match wire.quantity {
            Some(q) => parse_quantity(q)?,
            None => None,
        };
        Ok(Self {
            targets,
            items: wire.items.unwrap_or_default(),
            quantity,
        })
    }
}

impl TryFrom<IntentWire> for Intent {
    type Error = IntentParseError;

    fn try_from(wire: IntentWire) -> Result<Self, Self::Error> {
        let kind = wire.kind.trim().to_ascii_lowercase();
        match kind.as_str() {
            "conversation" => Ok(Intent::Conversation {
                message: wire
                    .message
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty()),
            }),
            "command" => {
                let name = wire
                    .command
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty())
                    .ok_or(IntentParseError::MissingCommand)?;
                let Some(command) = Command::from_name(&name) else {
                    return Ok(Intent::UnrecognizedCommand { name });
                };
                let parameters =
                    CommandParameters::try_from(wire.parameters.unwrap_or_default())?;
                Ok(Intent::Command {
                    command,
                    parameters,
                })
            }
            other => Err(IntentParseError::UnsupportedKind(other.to_string())),
        }
    }
}

/// Strips markdown code fences (```` ```json ```` or bare ```` ``` ````) around a payload.
pub fn strip_code_fences(raw: &str) -> String {
    let mut out = raw.trim();
    if let Some(rest) = out.strip_prefix(CODE_FENCE) {
        // Drop the optional language tag on the opening fence line.
        out = match rest.find('\n') {
            Some(nl) if !rest[..nl].contains('{') => &rest[nl + 1..],
            _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = out.trim_end().strip_suffix(CODE_FENCE) {
        out = rest;
    }
    out.trim().to_string()
}

/// Extracts the JSON object from a classifier response, tolerating fences and chatter.
pub fn extract_intent_json(raw: &str) -> Option<String> {
    let cleaned = strip_code_fences(raw);
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(cleaned[start..=end].to_string())
}

/// Parses a classifier response into a validated `Intent`.
///
/// Contract:
/// - The response holds one JSON object, optionally wrapped in code fences
/// - `type` is `command` (with `command` and optional `parameters`) or `conversation`
pub fn parse_intent(raw: &str) -> Result<Intent, IntentParseError> {
    if raw.trim().is_empty() {
        return Err(IntentParseError::Empty);
    }
    let json_str = extract_intent_json(raw).ok_or(IntentParseError::InvalidJson)?;
    let wire: IntentWire =
        serde_json::from_str(&json_str).map_err(|_| IntentParseError::InvalidJson)?;
    Intent::try_from(wire)
}
