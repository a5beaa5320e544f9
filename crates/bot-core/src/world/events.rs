use serde::{Deserialize, Serialize};

use super::types::{EntityId, EntityInfo, Vec3};

/// Error codes the gateway reports when the underlying session could not be reached.
const CONNECTION_ERROR_CODES: &[&str] = &["ETIMEDOUT", "ECONNREFUSED", "ECONNRESET"];

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    Success,
    Partial,
    Timeout,
    NoPath,
}

impl PathStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, PathStatus::Timeout | PathStatus::NoPath)
    }
}

/// Notifications pushed by the world-interaction gateway.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorldEvent {
    Login,
    Spawn {
        position: Vec3,
    },
    SessionEnded {
        #[serde(default)]
        reason: Option<String>,
    },
    Kicked {
        #[serde(default)]
        reason: Option<String>,
    },
    Error {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
    Chat {
        username: String,
        text: String,
    },
    EntityUpdate {
        entity: EntityInfo,
    },
    EntityGone {
        id: EntityId,
    },
    Move {
        position: Vec3,
    },
    Health {
        health: f32,
        #[serde(default)]
        food: f32,
    },
    GoalReached,
    PathUpdate {
        status: PathStatus,
    },
    PathReset {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl WorldEvent {
    /// True for events that mean the session is gone and a reconnect should be scheduled.
    pub fn ends_session(&self) -> bool {
        match self {
            WorldEvent::SessionEnded { .. } => true,
            WorldEvent::Error {
                code: Some(code), ..
            } => CONNECTION_ERROR_CODES
                .iter()
                .any(|c| c.eq_ignore_ascii_case(code)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_health_event() {
        let ev: WorldEvent =
            serde_json::from_str(r#"{"event":"health","health":6.5,"food":18}"#).unwrap();
        assert_eq!(
            ev,
            WorldEvent::Health {
                health: 6.5,
                food: 18.0
            }
        );
    }

    #[test]
    fn decodes_entity_update_with_defaults() {
        let ev: WorldEvent = serde_json::from_str(
            r#"{"event":"entity_update","entity":{"id":4,"name":"zombie","position":{"x":1,"y":64,"z":2}}}"#,
        )
        .unwrap();
        match ev {
            WorldEvent::EntityUpdate { entity } => {
                assert!(entity.valid);
                assert_eq!(entity.height, 1.8);
                assert_eq!(entity.username, None);
            }
            other => panic!("expected entity update, got {other:?}"),
        }
    }

    #[test]
    fn connection_errors_end_the_session() {
        let refused = WorldEvent::Error {
            message: "connect failed".to_string(),
            code: Some("ECONNREFUSED".to_string()),
        };
        let other = WorldEvent::Error {
            message: "bad packet".to_string(),
            code: None,
        };
        assert!(refused.ends_session());
        assert!(!other.ends_session());
        assert!(WorldEvent::SessionEnded { reason: None }.ends_session());
    }
}
