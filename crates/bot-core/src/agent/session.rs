use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::game_api::ApiFuture;

/// Re-establishes the gateway session.
pub trait SessionControl: Send + Sync {
    fn reconnect(&self) -> ApiFuture<'_, ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Consecutive attempts allowed before giving up; reset on spawn.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// Schedules delayed reconnects, never more than one in flight.
#[derive(Clone)]
pub struct Reconnector {
    control: Arc<dyn SessionControl>,
    policy: ReconnectPolicy,
    in_flight: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
}

impl Reconnector {
    pub fn new(control: Arc<dyn SessionControl>, policy: ReconnectPolicy) -> Self {
        Self {
            control,
            policy,
            in_flight: Arc::new(AtomicBool::new(false)),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Schedules a single delayed attempt unless one is already pending or the attempt budget
    /// is spent. The task resolves to whether the session came back.
    pub fn schedule(&self) -> Option<JoinHandle<bool>> {
        if self.attempts.load(Ordering::SeqCst) >= self.policy.max_attempts {
            tracing::error!(
                max_attempts = self.policy.max_attempts,
                "agent.session.reconnect.exhausted"
            );
            return None;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("agent.session.reconnect.pending");
            return None;
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            attempt,
            delay_ms = self.policy.delay.as_millis() as u64,
            "agent.session.reconnect.scheduled"
        );

        let this = self.clone();
        Some(tokio::spawn(async move {
            let ok = this.attempt(attempt).await;
            this.in_flight.store(false, Ordering::SeqCst);
            ok
        }))
    }

    async fn attempt(&self, attempt: u32) -> bool {
        tokio::time::sleep(self.policy.delay).await;
        match self.control.reconnect().await {
            Ok(()) => {
                tracing::info!(attempt, "agent.session.reconnect.ok");
                true
            }
            Err(err) => {
                tracing::warn!(attempt, error = %format!("{err:#}"), "agent.session.reconnect.failed");
                false
            }
        }
    }

    /// Called once the agent spawns again.
    pub fn reset(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}
