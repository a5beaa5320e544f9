use anyhow::Context;

use super::game_api::GameApi;
use super::state::ResolvedTarget;
use crate::world::catalog::{block_synonyms, category_members, CategoryMembers};
use crate::world::{BlockQuery, EntityInfo, PlayerInfo, Vec3};

pub const DEFAULT_BLOCK_RADIUS: f32 = 32.0;

/// Turns a free-text reference into a concrete world referent.
///
/// Resolution order, first success wins:
/// 1. category alias (`monster`, `animal`, `player`) -> nearest member
/// 2. exact, then substring, entity type name
/// 3. substring player username
/// 4. nearest block whose name contains the reference
/// 5. synonym expansion, each candidate through steps 2-4
#[derive(Debug, Clone, Copy)]
pub struct TargetResolver {
    pub block_radius: f32,
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self {
            block_radius: DEFAULT_BLOCK_RADIUS,
        }
    }
}

struct Snapshot {
    me: Vec3,
    entities: Vec<EntityInfo>,
    players: Vec<PlayerInfo>,
}

fn entity_target(me: Vec3, e: &EntityInfo) -> ResolvedTarget {
    ResolvedTarget::Entity {
        id: e.id,
        name: e.name.clone(),
        position: e.position,
        distance: me.distance_to(&e.position),
    }
}

fn player_target(me: Vec3, p: &PlayerInfo, entities: &[EntityInfo]) -> ResolvedTarget {
    // Prefer the live entity position over the player list's cached one.
    let position = p
        .entity
        .and_then(|id| entities.iter().find(|e| e.id == id))
        .map(|e| e.position)
        .or(p.position);
    ResolvedTarget::Player {
        username: p.username.clone(),
        entity: p.entity,
        position,
        distance: position.map(|pos| me.distance_to(&pos)),
    }
}

impl TargetResolver {
    pub fn new(block_radius: f32) -> Self {
        Self { block_radius }
    }

    pub async fn resolve(
        &self,
        reference: &str,
        api: &dyn GameApi,
    ) -> anyhow::Result<ResolvedTarget> {
        let needle = reference.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(ResolvedTarget::Unknown);
        }

        let snap = Snapshot {
            me: api.telemetry().await.context("resolve telemetry")?.position,
            entities: api.entities().await.context("resolve entities")?,
            players: api.players().await.context("resolve players")?,
        };

        if let Some(members) = category_members(&needle) {
            let found = self.nearest_in_category(&snap, members);
            tracing::debug!(reference = %needle, found = found.is_some(), "agent.resolve.category");
            if let Some(found) = found {
                return Ok(found);
            }
        }

        if let Some(found) = self.match_direct(&needle, &snap, api).await? {
            return Ok(found);
        }

        if let Some(candidates) = block_synonyms(&needle) {
            for candidate in candidates {
                if let Some(found) = self.match_direct(candidate, &snap, api).await? {
                    tracing::debug!(reference = %needle, candidate = %candidate, "agent.resolve.synonym");
                    return Ok(found);
                }
            }
        }

        tracing::debug!(reference = %needle, "agent.resolve.unknown");
        Ok(ResolvedTarget::Unknown)
    }

    fn nearest_in_category(
        &self,
        snap: &Snapshot,
        members: CategoryMembers,
    ) -> Option<ResolvedTarget> {
        let mut best: Option<(&EntityInfo, f32)> = None;
        for e in &snap.entities {
            let is_member = match members {
                CategoryMembers::Fixed(names) => {
                    let name = e.name.to_lowercase();
                    names.iter().any(|m| name.contains(m))
                }
                CategoryMembers::Players => e.username.as_deref().is_some_and(|u| {
                    snap.players
                        .iter()
                        .any(|p| p.username.eq_ignore_ascii_case(u))
                }),
            };
            if !is_member {
                continue;
            }
            let d = snap.me.distance_to(&e.position);
            // Strict comparison keeps the first-enumerated entity on ties.
            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((e, d));
            }
        }
        let (e, _) = best?;
        match members {
            CategoryMembers::Players => {
                let username = e.username.as_deref()?;
                let player = snap
                    .players
                    .iter()
                    .find(|p| p.username.eq_ignore_ascii_case(username))?;
                Some(player_target(snap.me, player, &snap.entities))
            }
            CategoryMembers::Fixed(_) => Some(entity_target(snap.me, e)),
        }
    }

    async fn match_direct(
        &self,
        needle: &str,
        snap: &Snapshot,
        api: &dyn GameApi,
    ) -> anyhow::Result<Option<ResolvedTarget>> {
        let needle = needle.to_lowercase();

        let exact = snap
            .entities
            .iter()
            .find(|e| e.name.to_lowercase() == needle);
        let partial = || {
            snap.entities
                .iter()
                .find(|e| e.name.to_lowercase().contains(&needle))
        };
        if let Some(e) = exact.or_else(partial) {
            return Ok(Some(entity_target(snap.me, e)));
        }

        if let Some(p) = snap
            .players
            .iter()
            .find(|p| p.username.to_lowercase().contains(&needle))
        {
            return Ok(Some(player_target(snap.me, p, &snap.entities)));
        }

        let block = api
            .find_block(BlockQuery::containing(needle.as_str(), self.block_radius))
            .await
            .context("resolve block search")?;
        Ok(block.map(|b| ResolvedTarget::Block {
            distance: snap.me.distance_to(&b.position),
            name: b.name,
            position: b.position,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mob, FakeGameApi};

    #[tokio::test]
    async fn monster_alias_picks_nearest() -> anyhow::Result<()> {
        let api = FakeGameApi::default();
        api.add_entity(mob(1, "zombie", 5.0, 0.0));
        api.add_entity(mob(2, "skeleton", 2.0, 0.0));
        api.add_entity(mob(3, "cow", 1.0, 0.0));

        let target = TargetResolver::default().resolve("monster", &api).await?;
        assert_eq!(target.entity_id(), Some(2));
        assert_eq!(target.label(), "skeleton");
        Ok(())
    }

    #[tokio::test]
    async fn category_ties_keep_enumeration_order() -> anyhow::Result<()> {
        let api = FakeGameApi::default();
        api.add_entity(mob(7, "pig", 3.0, 0.0));
        api.add_entity(mob(4, "cow", -3.0, 0.0));

        let target = TargetResolver::default().resolve("Animal", &api).await?;
        assert_eq!(target.entity_id(), Some(7));
        Ok(())
    }

    #[tokio::test]
    async fn wood_expands_to_first_log_in_radius() -> anyhow::Result<()> {
        let api = FakeGameApi::default();
        api.add_block("birch_log", 6.0, 0.0);
        api.add_block("oak_log", 40.0, 0.0);

        let target = TargetResolver::default().resolve("wood", &api).await?;
        match target {
            ResolvedTarget::Block { name, .. } => assert_eq!(name, "birch_log"),
            other => panic!("expected block, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn exact_entity_name_beats_substring() -> anyhow::Result<()> {
        let api = FakeGameApi::default();
        api.add_entity(mob(1, "zombie_villager", 1.0, 0.0));
        api.add_entity(mob(2, "zombie", 9.0, 0.0));

        let target = TargetResolver::default().resolve("zombie", &api).await?;
        assert_eq!(target.entity_id(), Some(2));

        let target = TargetResolver::default().resolve("villager", &api).await?;
        assert_eq!(target.entity_id(), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn player_username_substring_resolves_to_player() -> anyhow::Result<()> {
        let api = FakeGameApi::default();
        api.add_player(10, "SteveTheBuilder", 3.0, 4.0);

        let target = TargetResolver::default().resolve("steve", &api).await?;
        match target {
            ResolvedTarget::Player {
                username,
                entity,
                distance,
                ..
            } => {
                assert_eq!(username, "SteveTheBuilder");
                assert_eq!(entity, Some(10));
                assert_eq!(distance, Some(5.0));
            }
            other => panic!("expected player, got {other:?}"),
        }

        let nearest = TargetResolver::default().resolve("player", &api).await?;
        assert_eq!(nearest.label(), "SteveTheBuilder");
        Ok(())
    }

    #[tokio::test]
    async fn unmatched_reference_is_unknown() -> anyhow::Result<()> {
        let api = FakeGameApi::default();
        api.add_block("dirt", 2.0, 0.0);
        let resolver = TargetResolver::default();
        assert!(resolver.resolve("obsidian", &api).await?.is_unknown());
        assert!(resolver.resolve("   ", &api).await?.is_unknown());
        assert!(resolver.resolve("monster", &api).await?.is_unknown());
        Ok(())
    }

    #[tokio::test]
    async fn empty_category_falls_through_to_blocks() -> anyhow::Result<()> {
        let api = FakeGameApi::default();
        api.add_entity(mob(1, "cow", 2.0, 0.0));
        api.add_block("monster_egg", 3.0, 0.0);

        let target = TargetResolver::default().resolve("monster", &api).await?;
        match target {
            ResolvedTarget::Block { name, .. } => assert_eq!(name, "monster_egg"),
            other => panic!("expected block, got {other:?}"),
        }
        Ok(())
    }
}
