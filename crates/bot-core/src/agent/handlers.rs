//! Command layers: base behaviours and the combat layer that overrides `attack` and `flee`.

use anyhow::Context;

use super::dispatch::{CommandContext, CommandHandler, HandlerFuture};
use super::executor::{Transition, REPLY_RETREAT};
use super::state::{ActionKind, ResolvedTarget};
use super::wire::{Command, Quantity};
use crate::error::AgentError;
use crate::world::{BlockQuery, EquipSlot, ItemStack, NavGoal};

const FULL_HEALTH: f32 = 20.0;
const REPLY_TOO_HURT: &str = "I'm too injured to do that right now!";

/// Sums stacks by name, keeping first-seen order.
fn aggregate(items: &[ItemStack]) -> Vec<(String, u32)> {
    let mut totals: Vec<(String, u32)> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|(name, _)| *name == item.name) {
            Some((_, count)) => *count += item.count,
            None => totals.push((item.name.clone(), item.count)),
        }
    }
    totals
}

/// Exact inventory name first, then the first name containing the query.
fn find_item(items: &[(String, u32)], query: &str) -> Option<(String, u32)> {
    let query = query.trim().to_lowercase();
    items
        .iter()
        .find(|(name, _)| name.to_lowercase() == query)
        .or_else(|| items.iter().find(|(name, _)| name.to_lowercase().contains(&query)))
        .cloned()
}

fn is_everything(item: &str) -> bool {
    matches!(
        item.trim().to_lowercase().as_str(),
        "all" | "everything" | "items" | "all items"
    )
}

/// Handles every command except `flee`. `attack` here is a single strike.
pub struct BaseCommands;

impl CommandHandler for BaseCommands {
    fn name(&self) -> &'static str {
        "base"
    }

    fn intercepts(&self, command: Command) -> bool {
        command != Command::Flee
    }

    fn handle<'a>(&'a self, command: Command, ctx: CommandContext<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            match command {
                Command::Come => come(ctx).await,
                Command::Goto => goto(ctx).await,
                Command::Dig => dig(ctx).await,
                Command::Attack => strike_once(ctx).await,
                Command::Stop => stop(ctx).await,
                Command::Drop => drop_items(ctx).await,
                Command::Equip => equip(ctx).await,
                Command::Eat => eat(ctx).await,
                Command::Heal => heal(ctx).await,
                Command::Inventory => inventory(ctx).await,
                Command::Sleep => sleep(ctx).await,
                Command::Guard => guard(ctx).await,
                Command::Craft => craft(ctx).await,
                Command::Smelt => smelt(ctx).await,
                Command::Store => store(ctx).await,
                Command::Flee => Ok(()),
            }
        })
    }
}

/// Sustained combat: `attack` runs the combat loop and `flee` retreats.
pub struct CombatCommands;

impl CommandHandler for CombatCommands {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn intercepts(&self, command: Command) -> bool {
        matches!(command, Command::Attack | Command::Flee)
    }

    fn handle<'a>(&'a self, command: Command, ctx: CommandContext<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            match command {
                Command::Attack => engage(ctx).await,
                Command::Flee => flee(ctx).await,
                _ => Ok(()),
            }
        })
    }
}

async fn come(mut ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let name = ctx
        .parameters
        .first_target()
        .unwrap_or(ctx.issuer)
        .to_string();
    let target = ctx.resolve(&name).await?;
    let ResolvedTarget::Player {
        username,
        entity,
        position,
        ..
    } = target.clone()
    else {
        return Err(AgentError::target_not_found(
            &name,
            format!("I can't find player {name}."),
        ));
    };

    let follow_range = ctx.executor.cfg.follow_range;
    match (entity, position) {
        (Some(id), _) => {
            ctx.transition(Transition::Navigate {
                target,
                goal: NavGoal::Follow {
                    entity: id,
                    range: follow_range,
                },
            })
            .await?;
            ctx.reply(format!("Following {username}.")).await;
        }
        (None, Some(position)) => {
            ctx.transition(Transition::Navigate {
                target,
                goal: NavGoal::Near {
                    position,
                    range: follow_range,
                },
            })
            .await?;
            ctx.reply(format!(
                "I can't see {username}, but I'll try to move closer."
            ))
            .await;
        }
        (None, None) => {
            ctx.reply(format!(
                "I don't know where {username} is. Please come closer or give me coordinates."
            ))
            .await;
        }
    }
    Ok(())
}

async fn goto(mut ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let Some(name) = ctx.parameters.first_target().map(str::to_string) else {
        ctx.reply("I need to know where to go. Can you specify a location or target?")
            .await;
        return Ok(());
    };
    let target = ctx.resolve(&name).await?;
    let follow_range = ctx.executor.cfg.follow_range;
    let goal = match &target {
        ResolvedTarget::Block { position, .. } => NavGoal::Block {
            position: position.floor(),
        },
        ResolvedTarget::Entity { id, .. }
        | ResolvedTarget::Player {
            entity: Some(id), ..
        } => NavGoal::Follow {
            entity: *id,
            range: follow_range,
        },
        ResolvedTarget::Player {
            position: Some(position),
            ..
        } => NavGoal::Near {
            position: *position,
            range: follow_range,
        },
        _ => {
            return Err(AgentError::target_not_found(
                &name,
                format!("I couldn't find anything matching \"{name}\"."),
            ));
        }
    };
    let Some(position) = target.position() else {
        return Err(AgentError::target_not_found(
            &name,
            format!("I couldn't find anything matching \"{name}\"."),
        ));
    };
    ctx.transition(Transition::Navigate { target, goal }).await?;
    ctx.reply(format!("Found {name} at {position}. Heading there."))
        .await;
    Ok(())
}

async fn dig(mut ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let Some(name) = ctx.parameters.first_target().map(str::to_string) else {
        ctx.reply("What should I dig? Please specify a block type.")
            .await;
        return Ok(());
    };
    let target = ctx.resolve(&name).await?;
    let ResolvedTarget::Block {
        name: block_name, ..
    } = &target
    else {
        return Err(AgentError::target_not_found(
            &name,
            format!("I couldn't find any {name} nearby."),
        ));
    };
    let block_name = block_name.clone();
    ctx.transition(Transition::Dig { target }).await?;
    ctx.reply(format!("Starting to dig {block_name}.")).await;
    Ok(())
}

/// Resolves the attack reference to an entity or replies why not.
async fn attack_target(ctx: &CommandContext<'_>) -> Result<Option<ResolvedTarget>, AgentError> {
    let Some(name) = ctx.parameters.first_target().map(str::to_string) else {
        ctx.reply("What should I attack? Please specify a target.")
            .await;
        return Ok(None);
    };
    let target = ctx.resolve(&name).await?;
    if !matches!(target, ResolvedTarget::Entity { .. }) {
        return Err(AgentError::target_not_found(
            &name,
            format!("I couldn't find any {name} nearby."),
        ));
    }
    Ok(Some(target))
}

async fn strike_once(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let Some(target) = attack_target(&ctx).await? else {
        return Ok(());
    };
    let ResolvedTarget::Entity { id, name, .. } = &target else {
        return Ok(());
    };
    let live = ctx
        .api
        .entity(*id)
        .await
        .context("attack target")?
        .filter(|e| e.is_alive());
    let Some(live) = live else {
        return Err(AgentError::target_not_found(
            name,
            format!("I couldn't find any {name} nearby."),
        ));
    };
    ctx.reply(format!("Attacking {name}!")).await;
    ctx.api
        .look_at(live.aim_point())
        .await
        .map_err(|e| AgentError::world("attack", e))?;
    ctx.api
        .attack(*id)
        .await
        .map_err(|e| AgentError::world("attack", e))?;
    Ok(())
}

async fn engage(mut ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let health = ctx.api.telemetry().await.context("attack telemetry")?.health;
    if health < ctx.executor.cfg.health_threshold {
        return Err(AgentError::Refused(REPLY_TOO_HURT.to_string()));
    }
    let Some(target) = attack_target(&ctx).await? else {
        return Ok(());
    };
    let name = target.label().to_string();
    ctx.transition(Transition::Attack { target }).await?;
    ctx.reply(format!("Attacking {name}!")).await;
    Ok(())
}

async fn flee(mut ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let source = match ctx.parameters.first_target().map(str::to_string) {
        Some(name) => Some(ctx.resolve(&name).await?).filter(|t| !t.is_unknown()),
        None => None,
    };
    let label = source.as_ref().map(|s| s.label().to_string());
    let kind = ctx
        .transition(Transition::Flee {
            danger: None,
            source,
        })
        .await?;
    match (kind, label) {
        (ActionKind::Fleeing, Some(label)) => {
            ctx.reply(format!("Running away from {label}!")).await
        }
        _ => ctx.reply(REPLY_RETREAT).await,
    }
    Ok(())
}

async fn stop(mut ctx: CommandContext<'_>) -> Result<(), AgentError> {
    ctx.transition(Transition::Stop).await?;
    ctx.reply("Stopping all current actions.").await;
    Ok(())
}

async fn drop_items(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let items = ctx.api.inventory().await.context("read inventory")?;
    let totals = aggregate(&items);
    let quantity = ctx.parameters.quantity.unwrap_or(Quantity::All);

    let item = ctx.parameters.first_item().filter(|i| !is_everything(i));
    let Some(item) = item else {
        if totals.is_empty() {
            ctx.reply("I don't have any items to drop.").await;
            return Ok(());
        }
        ctx.reply("Dropping all my items...").await;
        for (name, count) in totals {
            if let Err(err) = ctx.api.toss(name.clone(), count).await {
                tracing::warn!(item = %name, error = %format!("{err:#}"), "agent.drop.failed");
            }
        }
        ctx.reply("Dropped all items.").await;
        return Ok(());
    };

    let Some((name, held)) = find_item(&totals, item) else {
        ctx.reply(format!("I don't have any {item} to drop.")).await;
        return Ok(());
    };
    let amount = match quantity {
        Quantity::All => held,
        Quantity::Count(n) => n.min(held),
    };
    ctx.api
        .toss(name.clone(), amount)
        .await
        .map_err(|e| AgentError::world("drop items", e))?;
    ctx.reply(format!("Dropped {amount} {name}.")).await;
    Ok(())
}

async fn equip(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let Some(query) = ctx
        .parameters
        .first_item()
        .or_else(|| ctx.parameters.first_target())
        .map(str::to_string)
    else {
        ctx.reply("What should I equip?").await;
        return Ok(());
    };
    let items = ctx.api.inventory().await.context("read inventory")?;
    let Some((name, _)) = find_item(&aggregate(&items), &query) else {
        ctx.reply(format!("I don't have {query} to equip.")).await;
        return Ok(());
    };
    ctx.api
        .equip(name.clone(), EquipSlot::Hand)
        .await
        .map_err(|e| AgentError::world("equip item", e))?;
    ctx.reply(format!("Equipped {name}.")).await;
    Ok(())
}

async fn consume_named(ctx: &CommandContext<'_>, name: String) -> Result<(), AgentError> {
    ctx.api
        .equip(name.clone(), EquipSlot::Hand)
        .await
        .map_err(|e| AgentError::world("eat", e))?;
    ctx.api
        .consume()
        .await
        .map_err(|e| AgentError::world("eat", e))?;
    ctx.reply(format!("Ate {name}.")).await;
    Ok(())
}

async fn eat(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let name = match ctx.parameters.first_item() {
        Some(query) => {
            let items = ctx.api.inventory().await.context("read inventory")?;
            match find_item(&aggregate(&items), query) {
                Some((name, _)) => name,
                None => {
                    ctx.reply(format!("I don't have any {query} to eat.")).await;
                    return Ok(());
                }
            }
        }
        None => match ctx.executor.state().inventory.first_food() {
            Some(food) => food.name.clone(),
            None => {
                ctx.reply("I don't have any food to eat.").await;
                return Ok(());
            }
        },
    };
    consume_named(&ctx, name).await
}

async fn heal(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let health = ctx.api.telemetry().await.context("heal telemetry")?.health;
    if health >= FULL_HEALTH {
        ctx.reply("I'm already at full health!").await;
        return Ok(());
    }
    let Some(food) = ctx.executor.state().inventory.first_food().cloned() else {
        ctx.reply("I don't have any food to heal with.").await;
        return Ok(());
    };
    consume_named(&ctx, food.name).await
}

async fn inventory(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let items = ctx.api.inventory().await.context("read inventory")?;
    let totals = aggregate(&items);
    if totals.is_empty() {
        ctx.reply("I don't have any items in my inventory.").await;
        return Ok(());
    }
    let listing = totals
        .iter()
        .map(|(name, count)| format!("{name}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    ctx.reply(format!("My inventory contains: {listing}")).await;
    Ok(())
}

async fn sleep(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let radius = ctx.resolver.block_radius;
    let bed = ctx
        .api
        .find_block(BlockQuery::containing("bed", radius))
        .await
        .context("bed search")?;
    let Some(bed) = bed else {
        ctx.reply("I can't find a bed nearby.").await;
        return Ok(());
    };
    match ctx.api.sleep_in(bed.position).await {
        Ok(()) => ctx.reply("Good night!").await,
        Err(err) => ctx.reply(format!("Cannot sleep: {err}")).await,
    }
    Ok(())
}

async fn guard(mut ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let name = ctx
        .parameters
        .first_target()
        .unwrap_or(ctx.issuer)
        .to_string();
    let health = ctx.api.telemetry().await.context("guard telemetry")?.health;
    if health < ctx.executor.cfg.health_threshold {
        return Err(AgentError::Refused(REPLY_TOO_HURT.to_string()));
    }
    let target = ctx.resolve(&name).await?;
    if target.is_unknown() {
        return Err(AgentError::target_not_found(
            &name,
            format!("I can't find {name} to guard."),
        ));
    }
    ctx.transition(Transition::Guard { target }).await?;
    ctx.reply(format!(
        "Guarding {name}. I'll protect against any threats."
    ))
    .await;
    Ok(())
}

fn quantity_label(quantity: Option<Quantity>) -> String {
    match quantity {
        Some(Quantity::All) => "all".to_string(),
        Some(Quantity::Count(n)) => n.to_string(),
        None => "1".to_string(),
    }
}

async fn craft(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let Some(item) = ctx
        .parameters
        .first_item()
        .or_else(|| ctx.parameters.first_target())
    else {
        ctx.reply("What should I craft?").await;
        return Ok(());
    };
    let n = quantity_label(ctx.parameters.quantity);
    ctx.reply(format!("I don't know how to craft {n} {item} yet."))
        .await;
    Ok(())
}

async fn smelt(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let furnace = ctx
        .api
        .find_block(BlockQuery::exact("furnace", ctx.resolver.block_radius))
        .await
        .context("furnace search")?;
    if furnace.is_none() {
        ctx.reply("I need a furnace to smelt items.").await;
        return Ok(());
    }
    let item = ctx.parameters.first_item().unwrap_or("that");
    ctx.reply(format!(
        "I found a furnace, but I don't know how to smelt {item} yet."
    ))
    .await;
    Ok(())
}

async fn store(ctx: CommandContext<'_>) -> Result<(), AgentError> {
    let chest = ctx
        .api
        .find_block(BlockQuery::containing("chest", ctx.resolver.block_radius))
        .await
        .context("chest search")?;
    if chest.is_none() {
        ctx.reply("I can't find a chest to store things in.").await;
        return Ok(());
    }
    ctx.reply("I found a chest, but I don't know how to store items yet.")
        .await;
    Ok(())
}
