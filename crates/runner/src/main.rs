mod bridge;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use altes_bot_core::agent::{ControlInput, Controller, LlmIntentClassifier, Reconnector};
use altes_bot_core::config::{AgentConfig, ConfigLoader, DEFAULT_CONFIG_FILE};
use altes_bot_core::llm::OllamaClient;

use crate::bridge::{pump_events, RemoteGameApi};

const INPUT_QUEUE: usize = 256;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_file = env_or("ALTES_CONFIG_FILE", DEFAULT_CONFIG_FILE);
    let mut cfg: AgentConfig = ConfigLoader::load_or_default(&config_file)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
    cfg.validate().context("invalid agent config")?;

    let control_addr = env_or("ALTES_BRIDGE_CONTROL_ADDR", "127.0.0.1:7878");
    let events_addr = env_or("ALTES_BRIDGE_EVENTS_ADDR", "127.0.0.1:7879");

    let remote = Arc::new(RemoteGameApi::connect(&control_addr).await?);
    let llm = OllamaClient::new(cfg.llm.ollama())?;
    let classifier = Arc::new(LlmIntentClassifier::new(llm, cfg.bot_name.clone()));
    let reconnector = Reconnector::new(remote.clone(), cfg.reconnect_policy());

    let mut controller = Controller::new(&cfg, remote.clone(), remote.clone(), classifier)
        .with_reconnector(reconnector);

    let (tx, rx) = mpsc::channel(INPUT_QUEUE);
    tokio::spawn(pump_events(events_addr, tx.clone(), Duration::from_secs(1)));

    let shutdown_tx = tx;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("runner.ctrl_c");
            let _ = shutdown_tx.send(ControlInput::Shutdown).await;
        }
    });

    tracing::info!(
        owner = %cfg.owner,
        bot = %cfg.bot_name,
        control = %control_addr,
        model = %cfg.llm.model,
        "runner.start"
    );
    controller.run(rx).await
}
