//! Core of the Altes agent: world model, intent handling, the action executor and the LLM
//! client.
//!
//! Binaries (the headless runner, test harnesses) supply the world gateway, chat sink and
//! classifier; everything between an owner's chat line and a gateway call lives here.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod world;

#[cfg(test)]
mod test_support;
