use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::agent::executor::ExecutorConfig;
use crate::agent::session::ReconnectPolicy;
use crate::llm::OllamaConfig;

pub const CONFIG_DIR_ENV: &str = "ALTES_CONFIG_DIR";
pub const DEFAULT_CONFIG_FILE: &str = "altes.toml";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    /// Full endpoint URL, e.g. `http://127.0.0.1:11435/api/generate`.
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11435/api/generate".to_string(),
            model: "mock".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl LlmSettings {
    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// The only username whose chat is acted on. Compared exactly.
    pub owner: String,
    pub bot_name: String,
    pub tick_ms: u64,
    pub health_threshold: f32,
    pub melee_range: f32,
    pub follow_range: f32,
    pub guard_radius: f32,
    pub flee_distance: f32,
    pub block_radius: f32,
    pub dig_reach: f32,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub llm: LlmSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let exec = ExecutorConfig::default();
        Self {
            owner: String::new(),
            bot_name: "Altes".to_string(),
            tick_ms: 50,
            health_threshold: exec.health_threshold,
            melee_range: exec.melee_range,
            follow_range: exec.follow_range,
            guard_radius: exec.guard_radius,
            flee_distance: exec.flee_distance,
            block_radius: 32.0,
            dig_reach: exec.dig_reach,
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 5,
            llm: LlmSettings::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> anyhow::Result<Option<T>> {
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| anyhow::anyhow!("invalid value for {key}: {raw:?}"))
}

impl AgentConfig {
    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            health_threshold: self.health_threshold,
            melee_range: self.melee_range,
            follow_range: self.follow_range,
            guard_radius: self.guard_radius,
            flee_distance: self.flee_distance,
            dig_reach: self.dig_reach,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(self.reconnect_delay_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.owner.trim().is_empty() {
            anyhow::bail!("owner username is not configured (set `owner` or ALTES_OWNER)");
        }
        if self.bot_name.trim().is_empty() {
            anyhow::bail!("bot_name must not be empty");
        }
        let distances = [
            ("melee_range", self.melee_range),
            ("follow_range", self.follow_range),
            ("guard_radius", self.guard_radius),
            ("flee_distance", self.flee_distance),
            ("block_radius", self.block_radius),
            ("dig_reach", self.dig_reach),
        ];
        for (name, value) in distances {
            if !(value.is_finite() && value > 0.0) {
                anyhow::bail!("{name} must be positive, got {value}");
            }
        }
        Ok(())
    }

    /// Applies `ALTES_*` overrides. `lookup` is `std::env::var(..).ok()` outside tests.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(v) = parse_env::<String>(&lookup, "ALTES_OWNER")? {
            self.owner = v;
        }
        if let Some(v) = parse_env::<String>(&lookup, "ALTES_BOT_NAME")? {
            self.bot_name = v;
        }
        if let Some(v) = parse_env(&lookup, "ALTES_TICK_MS")? {
            self.tick_ms = v;
        }
        if let Some(v) = parse_env(&lookup, "ALTES_HEALTH_THRESHOLD")? {
            self.health_threshold = v;
        }
        if let Some(v) = parse_env(&lookup, "ALTES_GUARD_RADIUS")? {
            self.guard_radius = v;
        }
        if let Some(v) = parse_env(&lookup, "ALTES_BLOCK_RADIUS")? {
            self.block_radius = v;
        }
        if let Some(v) = parse_env(&lookup, "ALTES_RECONNECT_DELAY_MS")? {
            self.reconnect_delay_ms = v;
        }
        if let Some(v) = parse_env(&lookup, "ALTES_MAX_RECONNECT_ATTEMPTS")? {
            self.max_reconnect_attempts = v;
        }
        if let Some(v) = parse_env::<String>(&lookup, "ALTES_LLM_ENDPOINT")? {
            self.llm.endpoint = v;
        }
        if let Some(v) = parse_env::<String>(&lookup, "ALTES_LLM_MODEL")? {
            self.llm.model = v;
        }
        if let Some(v) = parse_env(&lookup, "ALTES_LLM_TIMEOUT_MS")? {
            self.llm.timeout_ms = v;
        }
        Ok(())
    }
}

/// Finds and parses the agent's TOML file.
///
/// Candidates, first existing file wins: `$ALTES_CONFIG_DIR/<name>`, `./<name>`, then the
/// workspace `config/<name>`.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn candidates(name: &str) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(3);
        if let Some(dir) = env::var_os(CONFIG_DIR_ENV) {
            out.push(PathBuf::from(dir).join(name));
        }
        if let Ok(cwd) = env::current_dir() {
            out.push(cwd.join(name));
        }
        // bot-core sits two levels below the workspace root.
        if let Some(root) = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2) {
            out.push(root.join("config").join(name));
        }
        out
    }

    pub fn locate(name: &str) -> Option<PathBuf> {
        Self::candidates(name).into_iter().find(|p| p.is_file())
    }

    pub fn parse_from_string<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).context("agent config is not valid TOML")
    }

    pub fn load<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read agent config {}", path.display()))?;
        Self::parse_from_string(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Parses `name` when some candidate exists; otherwise every setting keeps its default.
    pub fn load_or_default<T: DeserializeOwned + Default>(name: &str) -> anyhow::Result<T> {
        match Self::locate(name) {
            Some(path) => {
                tracing::info!(path = %path.display(), "config.loaded");
                Self::load(&path)
            }
            None => {
                tracing::info!(name, "config.defaults");
                Ok(T::default())
            }
        }
    }
}
