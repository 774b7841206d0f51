//! Movement System
//!
//! Per-agent step execution with collision awareness. Agents are processed
//! in roster order each tick, so an earlier agent's completed step is
//! visible to later agents in the same tick; that ordering is part of the
//! simulation's semantics, not an accident.
//!
//! Obstruction escalates: wait, replan, sidestep, then give up. A separate
//! position-history check breaks movement cycles that the other heuristics
//! can produce in narrow corridors.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::agent::{AgentState, Movement};
use crate::components::world::{Coordinate, Position, Roster, TownMap, ORTHOGONAL};
use crate::config::{MovementConfig, SimConfig};
use crate::SimRng;

/// Another agent's situation, as seen by the mover this instant.
struct NeighborSnapshot {
    pos: Coordinate,
    next: Option<Coordinate>,
    moving: bool,
    dead: bool,
}

/// Exclusive system: advance every MOVING agent by at most one cell.
pub fn run_movement(world: &mut World) {
    let roster = world.resource::<Roster>().entities.clone();
    let config = world.resource::<SimConfig>().movement.clone();
    let map = world.resource::<TownMap>().clone();
    let mut rng = world
        .remove_resource::<SimRng>()
        .expect("SimRng resource missing");

    for entity in roster {
        step_agent(world, &map, &config, &mut rng.0, entity);
    }

    world.insert_resource(rng);
}

fn step_agent(
    world: &mut World,
    map: &TownMap,
    config: &MovementConfig,
    rng: &mut SmallRng,
    entity: Entity,
) {
    match world.get::<AgentState>(entity) {
        Some(state) if *state == AgentState::Moving => {}
        _ => return,
    }

    let (position, target, next_step, final_dest, blocked, wait) = {
        let pos = world.get::<Position>(entity).expect("agent position").0;
        let movement = world.get::<Movement>(entity).expect("agent movement");
        (
            pos,
            movement.target,
            movement.path.front().copied(),
            movement.path.back().copied(),
            movement.blocked_ticks,
            movement.wait_ticks,
        )
    };

    let Some(next) = next_step else {
        stop_agent(world, entity);
        return;
    };

    let neighbors = snapshot_others(world, entity);

    // Someone is standing on our next cell.
    if neighbors.iter().any(|n| !n.dead && n.pos == next) {
        handle_obstacle(
            world, map, config, entity, position, target, final_dest, blocked, &neighbors,
        );
        return;
    }

    // Symmetric conflict: a head-on swap, or another mover headed for the
    // same cell this tick.
    let conflict = neighbors.iter().any(|n| {
        n.moving
            && n.next
                .map_or(false, |nn| nn == next || (nn == position && next == n.pos))
    });
    if conflict {
        handle_conflict(
            world, map, config, entity, position, target, final_dest, wait, &neighbors,
        );
        return;
    }

    // Track where we have been; a revisit means we are circling.
    let cycling = {
        let mut movement = world.get_mut::<Movement>(entity).expect("agent movement");
        movement.record_position(position, config.position_history);
        movement.in_cycle(position, config.cycle_min_history)
    };
    if cycling {
        break_cycle(world, map, config, rng, entity, position, target, &neighbors);
        return;
    }

    advance(world, entity, next);
}

fn snapshot_others(world: &mut World, me: Entity) -> Vec<NeighborSnapshot> {
    let mut snapshot = Vec::new();
    let mut query = world.query::<(Entity, &Position, &AgentState, &Movement)>();
    for (entity, position, state, movement) in query.iter(world) {
        if entity == me {
            continue;
        }
        snapshot.push(NeighborSnapshot {
            pos: position.0,
            next: movement.path.front().copied(),
            moving: *state == AgentState::Moving,
            dead: state.is_dead(),
        });
    }
    snapshot
}

fn advance(world: &mut World, entity: Entity, next: Coordinate) {
    let mut movement = world.get_mut::<Movement>(entity).expect("agent movement");
    movement.path.pop_front();
    movement.blocked_ticks = 0;
    movement.wait_ticks = 0;
    drop(movement);
    world.get_mut::<Position>(entity).expect("agent position").0 = next;
}

fn stop_agent(world: &mut World, entity: Entity) {
    let mut movement = world.get_mut::<Movement>(entity).expect("agent movement");
    movement.clear();
    movement.blocked_ticks = 0;
    movement.wait_ticks = 0;
    drop(movement);
    *world.get_mut::<AgentState>(entity).expect("agent state") = AgentState::Idle;
}

fn say(world: &mut World, entity: Entity, text: &str, ttl: u32) {
    if let Some(mut speech) = world.get_mut::<crate::components::social::Speech>(entity) {
        speech.say(text, ttl);
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_obstacle(
    world: &mut World,
    map: &TownMap,
    config: &MovementConfig,
    entity: Entity,
    position: Coordinate,
    target: Option<Coordinate>,
    final_dest: Option<Coordinate>,
    blocked: u32,
    neighbors: &[NeighborSnapshot],
) {
    let blocked = blocked + 1;
    world
        .get_mut::<Movement>(entity)
        .expect("agent movement")
        .blocked_ticks = blocked;

    // Replanning keeps the obstruction counter: a fresh path through the
    // same jam must not restart the give-up clock.
    if blocked > config.blocked_replan_after {
        if let Some(goal) = target {
            if let Some(path) = map.find_path(position, goal) {
                if !path.is_empty() {
                    world
                        .get_mut::<Movement>(entity)
                        .expect("agent movement")
                        .path = path.into();
                }
            }
        }
    }

    if blocked > config.blocked_sidestep_after {
        attempt_sidestep(world, map, entity, position, final_dest, neighbors);
    }

    if blocked > config.blocked_give_up_after {
        stop_agent(world, entity);
        say(world, entity, "Too crowded here!", 30);
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_conflict(
    world: &mut World,
    map: &TownMap,
    config: &MovementConfig,
    entity: Entity,
    position: Coordinate,
    target: Option<Coordinate>,
    final_dest: Option<Coordinate>,
    wait: u32,
    neighbors: &[NeighborSnapshot],
) {
    let wait = wait + 1;
    world
        .get_mut::<Movement>(entity)
        .expect("agent movement")
        .wait_ticks = wait;

    // Short wait: let the other agent pass.
    if wait < config.conflict_wait_ticks {
        return;
    }

    if let Some(goal) = target {
        if let Some(path) = map.find_path(position, goal) {
            if !path.is_empty() {
                world
                    .get_mut::<Movement>(entity)
                    .expect("agent movement")
                    .path = path.into();
            }
        }
    }

    if wait > config.conflict_sidestep_after {
        attempt_sidestep(world, map, entity, position, final_dest, neighbors);
    }

    if wait > config.conflict_give_up_after {
        stop_agent(world, entity);
        say(world, entity, "Stuck! Can't get through.", 30);
    }
}

/// Try a one-cell detour, preferring directions perpendicular to the
/// destination heading. The detour and the way back are pushed onto the
/// front of the path so every executed step stays orthogonal.
fn attempt_sidestep(
    world: &mut World,
    map: &TownMap,
    entity: Entity,
    position: Coordinate,
    final_dest: Option<Coordinate>,
    neighbors: &[NeighborSnapshot],
) {
    let Some(dest) = final_dest else {
        return;
    };

    let dx = dest.x - position.x;
    let dy = dest.y - position.y;
    let mut directions: Vec<(i32, i32)> = if dx.abs() > dy.abs() {
        vec![(0, 1), (0, -1)]
    } else {
        vec![(1, 0), (-1, 0)]
    };
    for d in ORTHOGONAL {
        if !directions.contains(&d) {
            directions.push(d);
        }
    }

    for (sx, sy) in directions {
        let side = Coordinate::new(position.x + sx, position.y + sy);
        if !map.is_walkable(side.x, side.y) {
            continue;
        }
        if neighbors.iter().any(|n| !n.dead && n.pos == side) {
            continue;
        }
        let mut movement = world.get_mut::<Movement>(entity).expect("agent movement");
        movement.path.push_front(position);
        movement.path.push_front(side);
        return;
    }
}

/// Break a detected movement cycle: usually replan, occasionally take one
/// random uncontested step, otherwise stop.
#[allow(clippy::too_many_arguments)]
fn break_cycle(
    world: &mut World,
    map: &TownMap,
    config: &MovementConfig,
    rng: &mut SmallRng,
    entity: Entity,
    position: Coordinate,
    target: Option<Coordinate>,
    neighbors: &[NeighborSnapshot],
) {
    if rng.gen_bool(config.cycle_replan_chance) {
        if let Some(goal) = target {
            if let Some(path) = map.find_path(position, goal) {
                if !path.is_empty() {
                    world
                        .get_mut::<Movement>(entity)
                        .expect("agent movement")
                        .path = path.into();
                    return;
                }
            }
        }
        stop_agent(world, entity);
        return;
    }

    let mut directions = ORTHOGONAL;
    directions.shuffle(rng);
    for (sx, sy) in directions {
        let step = Coordinate::new(position.x + sx, position.y + sy);
        if !map.is_walkable(step.x, step.y) {
            continue;
        }
        if neighbors.iter().any(|n| !n.dead && n.pos == step) {
            continue;
        }
        let mut movement = world.get_mut::<Movement>(entity).expect("agent movement");
        movement.path.clear();
        movement.blocked_ticks = 0;
        movement.wait_ticks = 0;
        drop(movement);
        world.get_mut::<Position>(entity).expect("agent position").0 = step;
        return;
    }

    stop_agent(world, entity);
}
