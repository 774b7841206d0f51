//! Decision Cascade
//!
//! Step 10: the strict priority cascade evaluated for every living agent,
//! top to bottom with early returns: arrest handling, bank-hours bounce,
//! spontaneous crime, the starvation override, the health override,
//! charm-seeking, voluntary deposits, the do-not-interrupt guard, and
//! finally the daily schedule.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::HashSet;

use crate::components::agent::{AgentState, Finances, Movement, Role, Vitals};
use crate::components::world::{Coordinate, LocationRegistry, Position, Tile};
use crate::events::{EventLog, SimEventKind};

use super::{agent_id, say, set_state, BehaviorCtx};

const LEISURE_ROTATION: [&str; 4] = ["Park", "Library", "Bakery", "Restaurant"];

/// Work site per role. Roles without a dedicated building default to the
/// library.
pub(crate) fn work_site(role: Role) -> &'static str {
    match role {
        Role::Baker => "Bakery",
        Role::Librarian => "Library",
        Role::Police => "Police Station",
        Role::Doctor => "Hospital",
        Role::Gardener => "Park",
        Role::Mayor | Role::Resident => "Library",
    }
}

fn leisure_site(index: usize, wealthy: bool, rng: &mut SmallRng, mall_preference: f64) -> &'static str {
    if wealthy && rng.gen_bool(mall_preference.min(1.0)) {
        return "Mall";
    }
    LEISURE_ROTATION[index % LEISURE_ROTATION.len()]
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn decide_action(
    world: &mut World,
    locations: &mut LocationRegistry,
    events: &mut EventLog,
    rng: &mut SmallRng,
    ctx: &BehaviorCtx,
    index: usize,
    entity: Entity,
) {
    let behavior = &ctx.config.behavior;
    let economy = &ctx.config.economy;

    // (a) Arrested agents are marched to the jail; small chance of release.
    if state_of(world, entity) == AgentState::Arrested {
        ensure_at_location(
            world, locations, rng, ctx, index, entity, "Police Station",
            AgentState::Sleeping,
        );
        if rng.gen_bool(behavior.release_chance.min(1.0)) {
            set_state(world, entity, AgentState::Idle);
            say(world, entity, "I've served my time.", 50);
            let id = agent_id(world, entity);
            events.record(ctx.tick, SimEventKind::Release, id, "released from custody");
        }
        return;
    }

    let bank_open = ctx.is_bank_open();

    // (b) Banking outside opening hours bounces; inside them, keep routing.
    if state_of(world, entity) == AgentState::Banking {
        if bank_open {
            ensure_at_location(world, locations, rng, ctx, index, entity, "Bank", AgentState::Banking);
            return;
        }
        set_state(world, entity, AgentState::Idle);
        say(world, entity, "Bank's closed. I'll come back tomorrow.", 50);
    }

    // (c) Idle non-police occasionally turn to crime.
    if state_of(world, entity) == AgentState::Idle
        && *world.get::<Role>(entity).expect("agent role") != Role::Police
        && rng.gen_bool(behavior.crime_chance.min(1.0))
    {
        set_state(world, entity, AgentState::Criminal);
        say(world, entity, "Time for some mischief...", 50);
        let id = agent_id(world, entity);
        events.record(ctx.tick, SimEventKind::CrimeStarted, id, "turned to crime");
    }

    let wealth = world
        .get::<Finances>(entity)
        .expect("agent finances")
        .total_wealth();
    let (hunger, health, charm) = {
        let vitals = world.get::<Vitals>(entity).expect("agent vitals");
        (vitals.hunger, vitals.health, vitals.charm)
    };
    let price = ctx.levers.price;

    // (d) Starvation override. The wealthy panic early; the poor hold out.
    let starvation_threshold = if wealth >= price {
        behavior.starvation_threshold_wealthy
    } else {
        behavior.starvation_threshold_poor
    };
    if hunger > starvation_threshold && state_of(world, entity) != AgentState::Sleeping {
        let finances = world.get::<Finances>(entity).expect("agent finances").clone();
        if wealth >= economy.restaurant_meal_cost * price {
            ensure_at_location(world, locations, rng, ctx, index, entity, "Restaurant", AgentState::Eating);
            return;
        } else if wealth >= economy.bakery_meal_cost * price {
            ensure_at_location(world, locations, rng, ctx, index, entity, "Bakery", AgentState::Eating);
            return;
        } else if wealth >= economy.home_meal_cost * price {
            ensure_at_location(world, locations, rng, ctx, index, entity, "My House", AgentState::Eating);
            return;
        } else if bank_open
            && (finances.bank >= 5.0 * price || finances.loan < economy.loan_ceiling)
        {
            set_state(world, entity, AgentState::Banking);
            say(world, entity, "I'm hungry but broke. Need a loan!", 50);
            ensure_at_location(world, locations, rng, ctx, index, entity, "Bank", AgentState::Banking);
            return;
        }
    }

    // (e) Health override: hospital, then a restorative meal, then the bank.
    if health < behavior.health_seek_threshold && state_of(world, entity) != AgentState::Sleeping {
        let finances = world.get::<Finances>(entity).expect("agent finances").clone();
        if wealth >= economy.treatment_cost * price {
            ensure_at_location(world, locations, rng, ctx, index, entity, "Hospital", AgentState::Treating);
            return;
        }
        if wealth >= economy.restaurant_meal_cost * price {
            ensure_at_location(world, locations, rng, ctx, index, entity, "Restaurant", AgentState::Eating);
            return;
        }
        if bank_open
            && (finances.bank >= economy.health_withdrawal_amount
                || finances.loan < economy.loan_ceiling)
        {
            set_state(world, entity, AgentState::Banking);
            say(world, entity, "I need money for medical treatment. To the bank!", 50);
            ensure_at_location(world, locations, rng, ctx, index, entity, "Bank", AgentState::Banking);
            return;
        }
    }

    let wealthy = wealth >= behavior.wealthy_threshold * price;
    let busy = matches!(
        state_of(world, entity),
        AgentState::Working | AgentState::Sleeping | AgentState::Criminal
    );

    // (f) Charm-seeking: the rich shop their way up the social ladder.
    let needs_met = hunger < behavior.basic_needs_hunger && health > behavior.basic_needs_health;
    if wealthy
        && needs_met
        && charm < behavior.charm_goal
        && !busy
        && rng.gen_bool(behavior.shopping_trip_chance.min(1.0))
    {
        set_state(world, entity, AgentState::Shopping);
        say(world, entity, "Time to shop and increase my charm!", 50);
        ensure_at_location(world, locations, rng, ctx, index, entity, "Mall", AgentState::Shopping);
        return;
    }

    // (g) Voluntary deposit trip when flush with cash and well looked after.
    let cash = world.get::<Finances>(entity).expect("agent finances").cash;
    let deposit_chance = if wealthy {
        economy.deposit_trip_chance_wealthy
    } else {
        economy.deposit_trip_chance
    };
    let deposit_threshold = if wealthy {
        economy.deposit_threshold_wealthy
    } else {
        economy.deposit_threshold
    };
    if bank_open
        && cash >= deposit_threshold
        && hunger < economy.deposit_trip_hunger_limit
        && health > economy.deposit_trip_health_floor
        && !busy
        && rng.gen_bool(deposit_chance.min(1.0))
    {
        set_state(world, entity, AgentState::Banking);
        let line = if wealthy {
            "Need to manage my growing capital."
        } else {
            "Better deposit this extra cash."
        };
        say(world, entity, line, 50);
        ensure_at_location(world, locations, rng, ctx, index, entity, "Bank", AgentState::Banking);
        return;
    }

    // (h) A walk already underway is only interrupted by serious hunger.
    let interrupt_hunger = if wealth >= price {
        behavior.moving_interrupt_hunger_wealthy
    } else {
        behavior.moving_interrupt_hunger_poor
    };
    if state_of(world, entity) == AgentState::Moving && hunger < interrupt_hunger {
        return;
    }

    // Criminals lie low instead of keeping appointments; only the hunger
    // and health overrides above pull them back into ordinary life.
    if state_of(world, entity) == AgentState::Criminal {
        return;
    }

    // (i) The daily schedule.
    let hour = ctx.hour();
    let state = state_of(world, entity);
    if !(8..22).contains(&hour) {
        if state != AgentState::Sleeping {
            ensure_at_location(world, locations, rng, ctx, index, entity, "My House", AgentState::Sleeping);
        }
    } else if (8..12).contains(&hour) || (13..17).contains(&hour) {
        if state != AgentState::Working {
            let role = *world.get::<Role>(entity).expect("agent role");
            ensure_at_location(world, locations, rng, ctx, index, entity, work_site(role), AgentState::Working);
        }
    } else if (12..13).contains(&hour) {
        // Staggered lunch: offsets derived from the roster index spread the
        // rush over the first quarter hour.
        let offset = (index * behavior.lunch_stagger_step) % behavior.lunch_stagger_window;
        if ctx.minute() as usize >= offset && state != AgentState::Idle {
            let site = leisure_site(index, wealthy, rng, behavior.mall_preference);
            ensure_at_location(world, locations, rng, ctx, index, entity, site, AgentState::Idle);
        }
    } else if (17..21).contains(&hour) {
        if !matches!(state, AgentState::Idle | AgentState::Shopping) {
            let site = leisure_site(index, wealthy, rng, behavior.mall_preference);
            let desired = if site == "Mall" {
                AgentState::Shopping
            } else {
                AgentState::Idle
            };
            ensure_at_location(world, locations, rng, ctx, index, entity, site, desired);
        }
    } else {
        // Late-evening free time.
        if !matches!(
            state,
            AgentState::Idle | AgentState::Talking | AgentState::Eating | AgentState::Shopping
        ) {
            let site = leisure_site(index + 1, wealthy, rng, behavior.mall_preference);
            ensure_at_location(world, locations, rng, ctx, index, entity, site, AgentState::Idle);
        } else if state == AgentState::Idle && rng.gen_bool(behavior.wander_chance.min(1.0)) {
            wander(world, locations, rng, ctx, entity);
        }
    }
}

fn state_of(world: &World, entity: Entity) -> AgentState {
    *world.get::<AgentState>(entity).expect("agent state")
}

/// Resolve a location name to a concrete standing spot and either snap into
/// the desired state (already in the venue) or issue a path request. A trip
/// that is already underway toward the venue is left alone.
///
/// Building interiors are filled by sampling free floor tiles (never the
/// door, never an occupied cell), falling back to a deterministic
/// index-derived offset when sampling finds nothing.
#[allow(clippy::too_many_arguments)]
pub(crate) fn ensure_at_location(
    world: &mut World,
    locations: &mut LocationRegistry,
    rng: &mut SmallRng,
    ctx: &BehaviorCtx,
    index: usize,
    entity: Entity,
    location_name: &str,
    desired: AgentState,
) {
    let location = match locations.get(location_name).or_else(|| locations.by_index(0)) {
        Some(l) => l,
        None => return,
    };
    let entry = location.entry;
    let interior = location.interior;
    let footprint = location.footprint;

    let position = world.get::<Position>(entity).expect("agent position").0;

    // Already inside the venue (any interior cell but the door), or standing
    // on a point venue's gathering spot: no walking needed.
    let inside = match footprint {
        Some(rect) => rect.contains(position) && position != entry,
        None => position == entry,
    };
    if inside {
        set_state(world, entity, desired);
        return;
    }

    // Already walking there: let the trip finish instead of re-rolling the
    // interior spot every tick.
    let (en_route, current) = {
        let movement = world.get::<Movement>(entity).expect("agent movement");
        (!movement.path.is_empty(), movement.target)
    };
    if en_route {
        if let Some(t) = current {
            let heading_there = match footprint {
                Some(rect) => rect.contains(t),
                None => t == entry,
            };
            if heading_there {
                set_state(world, entity, AgentState::Moving);
                return;
            }
        }
    }

    let mut target = interior.unwrap_or(entry);

    if let (Some(_), Some(rect)) = (interior, footprint) {
        let inner_x = rect.x + 1;
        let inner_y = rect.y + 1;
        let inner_w = rect.width - 2;
        let inner_h = rect.height - 2;

        if inner_w > 0 && inner_h > 0 {
            let occupied = occupied_cells(world, entity);
            let mut found = false;
            for _ in 0..ctx.config.behavior.interior_placement_attempts {
                let tx = inner_x + rng.gen_range(0..inner_w);
                let ty = inner_y + rng.gen_range(0..inner_h);
                let candidate = Coordinate::new(tx, ty);
                if candidate == entry {
                    continue;
                }
                if ctx.map.tile(tx, ty) != Tile::Floor {
                    continue;
                }
                if occupied.contains(&candidate) {
                    continue;
                }
                target = candidate;
                found = true;
                break;
            }
            if !found {
                let offset_x = (index as i32) % inner_w;
                let offset_y = ((index as i32) / inner_w) % inner_h;
                target = Coordinate::new(inner_x + offset_x, inner_y + offset_y);
                if target == entry {
                    target.y = (target.y - 1).max(inner_y);
                }
            }
        }
    }

    if position == target {
        set_state(world, entity, desired);
    } else {
        move_to(world, ctx, entity, target);
    }
}

/// Request a path and enter MOVING, or fall back to IDLE when no route
/// exists.
pub(crate) fn move_to(world: &mut World, ctx: &BehaviorCtx, entity: Entity, target: Coordinate) {
    let position = world.get::<Position>(entity).expect("agent position").0;
    match ctx.map.find_path(position, target) {
        Some(path) if !path.is_empty() => {
            let mut movement = world.get_mut::<Movement>(entity).expect("agent movement");
            movement.target = Some(target);
            movement.path = path.into();
            movement.blocked_ticks = 0;
            movement.wait_ticks = 0;
            drop(movement);
            set_state(world, entity, AgentState::Moving);
        }
        Some(_) => {
            // Zero-length path: already standing on the target.
        }
        None => {
            tracing::warn!(
                "no path from ({}, {}) to ({}, {})",
                position.x,
                position.y,
                target.x,
                target.y
            );
            set_state(world, entity, AgentState::Idle);
        }
    }
}

fn wander(
    world: &mut World,
    locations: &mut LocationRegistry,
    rng: &mut SmallRng,
    ctx: &BehaviorCtx,
    entity: Entity,
) {
    if locations.is_empty() {
        return;
    }
    let pick = rng.gen_range(0..locations.len());
    if let Some(location) = locations.by_index(pick) {
        let entry = location.entry;
        move_to(world, ctx, entity, entry);
    }
}

fn occupied_cells(world: &mut World, me: Entity) -> HashSet<Coordinate> {
    let mut cells = HashSet::new();
    let mut query = world.query::<(Entity, &Position, &AgentState)>();
    for (entity, position, state) in query.iter(world) {
        if entity == me || state.is_dead() {
            continue;
        }
        cells.insert(position.0);
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::super::tests::{behavior_world, spawn_agent};
    use super::super::run_behavior;
    use super::*;
    use crate::components::world::WorldClock;
    use rand::SeedableRng;

    #[test]
    fn test_night_sends_agents_home() {
        let mut world = behavior_world();
        // 23:05.
        world.resource_mut::<WorldClock>().tick = 23 * 60 + 5;
        let agent = spawn_agent(&mut world, "a", Role::Baker, Coordinate::new(16, 10));

        run_behavior(&mut world);

        // Routed toward My House (or instantly asleep if already there).
        let state = *world.get::<AgentState>(agent).unwrap();
        assert!(matches!(state, AgentState::Moving | AgentState::Sleeping));
        if state == AgentState::Moving {
            let movement = world.get::<Movement>(agent).unwrap();
            let target = movement.target.unwrap();
            let locations = world.resource::<LocationRegistry>();
            assert_eq!(locations.name_at(target), Some("My House"));
        }
    }

    #[test]
    fn test_work_hours_route_to_work_site() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "a", Role::Baker, Coordinate::new(16, 10));

        run_behavior(&mut world);

        let movement = world.get::<Movement>(agent).unwrap();
        let target = movement.target.expect("a work route was issued");
        let locations = world.resource::<LocationRegistry>();
        assert_eq!(locations.name_at(target), Some("Bakery"));
    }

    #[test]
    fn test_starving_rich_agent_interrupts_walk() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "a", Role::Mayor, Coordinate::new(16, 10));
        world.get_mut::<Finances>(agent).unwrap().cash = 50.0;
        world.get_mut::<Vitals>(agent).unwrap().hunger = 45.0;

        run_behavior(&mut world);

        // Hunger 45 is past the wealthy threshold of 20: they are routed to
        // the restaurant even though the schedule says work.
        let movement = world.get::<Movement>(agent).unwrap();
        let target = movement.target.expect("a meal route was issued");
        let locations = world.resource::<LocationRegistry>();
        assert_eq!(locations.name_at(target), Some("Restaurant"));
    }

    #[test]
    fn test_poor_agent_tolerates_hunger() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "a", Role::Gardener, Coordinate::new(16, 10));
        // Broke: cash covers a home meal only.
        world.get_mut::<Finances>(agent).unwrap().cash = 0.02;
        world.get_mut::<Vitals>(agent).unwrap().hunger = 45.0;

        run_behavior(&mut world);

        // 45 < 70: no starvation override; the schedule routes them to the
        // park for gardening work instead.
        let movement = world.get::<Movement>(agent).unwrap();
        let target = movement.target.expect("work route");
        assert_eq!(target, Coordinate::new(37, 7));
    }

    #[test]
    fn test_broke_starving_agent_heads_to_bank() {
        let mut world = behavior_world();
        // 10:00: bank is open.
        world.resource_mut::<WorldClock>().tick = 10 * 60;
        let agent = spawn_agent(&mut world, "a", Role::Gardener, Coordinate::new(16, 10));
        world.get_mut::<Vitals>(agent).unwrap().hunger = 85.0;

        run_behavior(&mut world);

        assert_eq!(
            world
                .get::<Movement>(agent)
                .unwrap()
                .target
                .map(|t| {
                    let locations = world.resource::<LocationRegistry>();
                    locations.name_at(t).unwrap_or("").to_string()
                })
                .as_deref(),
            Some("Bank")
        );
    }

    #[test]
    fn test_sick_agent_with_money_seeks_hospital() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "a", Role::Baker, Coordinate::new(16, 10));
        world.get_mut::<Finances>(agent).unwrap().cash = 20.0;
        world.get_mut::<Vitals>(agent).unwrap().health = 40.0;

        run_behavior(&mut world);

        let movement = world.get::<Movement>(agent).unwrap();
        let target = movement.target.expect("hospital route");
        let locations = world.resource::<LocationRegistry>();
        assert_eq!(locations.name_at(target), Some("Hospital"));
    }

    #[test]
    fn test_arrested_agent_routed_to_jail() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "a", Role::Resident, Coordinate::new(16, 10));
        *world.get_mut::<AgentState>(agent).unwrap() = AgentState::Arrested;
        // Make release impossible so the routing is observable.
        world
            .resource_mut::<crate::config::SimConfig>()
            .behavior
            .release_chance = 0.0;

        run_behavior(&mut world);

        let movement = world.get::<Movement>(agent).unwrap();
        let target = movement.target.expect("jail route");
        let locations = world.resource::<LocationRegistry>();
        assert_eq!(locations.name_at(target), Some("Police Station"));
    }

    #[test]
    fn test_criminals_skip_the_daily_schedule() {
        let mut world = behavior_world();
        let crook = spawn_agent(&mut world, "crook", Role::Resident, Coordinate::new(16, 10));
        *world.get_mut::<AgentState>(crook).unwrap() = AgentState::Criminal;

        for _ in 0..5 {
            run_behavior(&mut world);
            world.resource_mut::<WorldClock>().advance();
        }

        // Well-fed and healthy, so nothing outranks lying low: still at
        // large, not marched off to work.
        assert_eq!(
            *world.get::<AgentState>(crook).unwrap(),
            AgentState::Criminal
        );
        assert!(world.get::<Movement>(crook).unwrap().target.is_none());
    }

    #[test]
    fn test_starving_criminal_goes_for_food() {
        let mut world = behavior_world();
        let crook = spawn_agent(&mut world, "crook", Role::Resident, Coordinate::new(16, 10));
        *world.get_mut::<AgentState>(crook).unwrap() = AgentState::Criminal;
        world.get_mut::<Finances>(crook).unwrap().cash = 10.0;
        world.get_mut::<Vitals>(crook).unwrap().hunger = 60.0;

        run_behavior(&mut world);

        // The starvation override outranks lying low.
        let movement = world.get::<Movement>(crook).unwrap();
        let target = movement.target.expect("meal route");
        let locations = world.resource::<LocationRegistry>();
        assert_eq!(locations.name_at(target), Some("Restaurant"));
    }

    #[test]
    fn test_interior_target_is_floor_not_door() {
        let mut world = behavior_world();
        let agent = spawn_agent(&mut world, "a", Role::Baker, Coordinate::new(16, 10));

        for seed_round in 0..20 {
            let config = world.resource::<crate::config::SimConfig>().clone();
            let levers = *world.resource::<crate::components::world::EconomicLevers>();
            let map = world.resource::<crate::components::world::TownMap>().clone();
            let mut rng = rand::rngs::SmallRng::seed_from_u64(seed_round);
            world.resource_scope(|world, mut locations: Mut<LocationRegistry>| {
                let ctx = BehaviorCtx {
                    config: &config,
                    levers,
                    map: &map,
                    tick: 481,
                };
                ensure_at_location(
                    world,
                    &mut locations,
                    &mut rng,
                    &ctx,
                    0,
                    agent,
                    "Bakery",
                    AgentState::Working,
                );
            });

            let movement = world.get::<Movement>(agent).unwrap();
            let target = movement.target.expect("bakery target");
            let map = world.resource::<crate::components::world::TownMap>();
            assert_eq!(map.tile(target.x, target.y), Tile::Floor);
            let locations = world.resource::<LocationRegistry>();
            let bakery = locations.get("Bakery").unwrap();
            assert_ne!(target, bakery.entry);
        }
    }
}
