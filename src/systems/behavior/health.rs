//! Health Sub-steps
//!
//! Passive decay, random sickness, rare critical events, outdoor accidents,
//! and the death check. Death is terminal: cause and tick are fixed once
//! and the agent is never mutated again.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::components::agent::{AgentMemory, AgentState, Lifespan, Movement, Vitals};
use crate::components::social::Speech;
use crate::components::world::{LocationRegistry, Position};
use crate::events::{EventLog, SimEventKind};

use super::{agent_id, agent_name, say, BehaviorCtx};

const ILLNESSES: [&str; 3] = ["Severe Infection", "Respiratory Flu", "Food Poisoning"];
const ACCIDENTS: [&str; 3] = ["Traffic Accident", "Industrial Mishap", "Struck by Lightning"];

/// Step 7a: chronic decay plus random sickness and cardiac events.
pub(crate) fn handle_health(
    world: &mut World,
    rng: &mut SmallRng,
    events: &mut EventLog,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let hazards = &ctx.config.hazards;

    {
        let mut vitals = world.get_mut::<Vitals>(entity).expect("agent vitals");
        if vitals.health < 100.0 {
            vitals.health = (vitals.health - ctx.config.vitals.passive_health_decay).max(0.0);
        }
    }

    let health = world.get::<Vitals>(entity).expect("agent vitals").health;

    // Only the perfectly healthy catch something new.
    if health >= 100.0 && rng.gen_bool((hazards.sickness_chance * ctx.levers.risk).min(1.0)) {
        let illness = ILLNESSES[rng.gen_range(0..ILLNESSES.len())];
        world.get_mut::<Vitals>(entity).expect("agent vitals").health = hazards.sickness_health;
        world
            .get_mut::<AgentMemory>(entity)
            .expect("agent memory")
            .last_diagnosis = Some(illness.to_string());
        say(world, entity, &format!("I think I have {illness}..."), 50);
        let id = agent_id(world, entity);
        events.record(ctx.tick, SimEventKind::Sickness, id, illness);
    }

    let health = world.get::<Vitals>(entity).expect("agent vitals").health;
    if health > 80.0 && rng.gen_bool((hazards.cardiac_chance * ctx.levers.risk).min(1.0)) {
        world.get_mut::<Vitals>(entity).expect("agent vitals").health = hazards.cardiac_health;
        world
            .get_mut::<AgentMemory>(entity)
            .expect("agent memory")
            .last_diagnosis = Some("Cardiac Event".to_string());
        say(world, entity, "My chest... it hurts!", 80);
        let id = agent_id(world, entity);
        events.record(ctx.tick, SimEventKind::Sickness, id, "Cardiac Event");
    }
}

/// Step 7b: fatal accidents only strike outdoors.
pub(crate) fn handle_accident(
    world: &mut World,
    locations: &mut LocationRegistry,
    rng: &mut SmallRng,
    events: &mut EventLog,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    let position = world.get::<Position>(entity).expect("agent position").0;
    if locations.location_at(position).is_some() {
        return;
    }
    if !rng.gen_bool((ctx.config.hazards.accident_chance * ctx.levers.risk).min(1.0)) {
        return;
    }

    let cause = ACCIDENTS[rng.gen_range(0..ACCIDENTS.len())];
    kill(world, events, ctx.tick, entity, cause, &format!("Tragedy: {cause}"));
}

/// Step 8: at zero health, a small per-tick chance of dying. Cause priority:
/// starvation, then the last diagnosis, then generic chronic illness.
pub(crate) fn handle_death(
    world: &mut World,
    rng: &mut SmallRng,
    events: &mut EventLog,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    {
        let mut vitals = world.get_mut::<Vitals>(entity).expect("agent vitals");
        if vitals.hunger >= 100.0 {
            vitals.health = (vitals.health - ctx.config.vitals.starvation_health_decay).max(0.0);
        }
    }

    let (health, hunger) = {
        let vitals = world.get::<Vitals>(entity).expect("agent vitals");
        (vitals.health, vitals.hunger)
    };
    if health > 0.0 {
        return;
    }
    if !rng.gen_bool(ctx.config.hazards.death_chance.min(1.0)) {
        return;
    }

    let cause = if hunger >= 99.9 {
        "Starvation".to_string()
    } else if let Some(diagnosis) = world
        .get::<AgentMemory>(entity)
        .expect("agent memory")
        .last_diagnosis
        .clone()
    {
        format!("Untreated {diagnosis}")
    } else {
        "Chronic Illness".to_string()
    };
    let epitaph = format!("RIP ({cause})");
    kill(world, events, ctx.tick, entity, &cause, &epitaph);
}

/// The one place an agent dies: terminal flags, a permanent epitaph, and a
/// cleared path.
pub(crate) fn kill(
    world: &mut World,
    events: &mut EventLog,
    tick: u64,
    entity: Entity,
    cause: &str,
    epitaph: &str,
) {
    *world.get_mut::<AgentState>(entity).expect("agent state") = AgentState::Dead;
    {
        let mut lifespan = world.get_mut::<Lifespan>(entity).expect("agent lifespan");
        lifespan.death_cause = Some(cause.to_string());
        lifespan.death_tick = Some(tick);
    }
    world
        .get_mut::<Movement>(entity)
        .expect("agent movement")
        .clear();
    world
        .get_mut::<Speech>(entity)
        .expect("agent speech")
        .say(epitaph, u32::MAX);

    let id = agent_id(world, entity);
    let name = agent_name(world, entity);
    tracing::info!("{} has passed away: {}", name, cause);
    events.record(tick, SimEventKind::Death, id, cause);
}
