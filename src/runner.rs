//! Simulation Runner
//!
//! Owns the ECS world and the per-tick schedule. One `step()` is one
//! simulated minute: behavior engine, upkeep decay, movement resolution,
//! then the social trigger.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::components::agent::{AgentName, AgentState, Vitals};
use crate::components::world::{EconomicLevers, LocationRegistry, Roster, TownMap, WorldClock};
use crate::components::agent::AgentId;
use crate::config::SimConfig;
use crate::dialogue::{DialogueGenerator, DialogueHub};
use crate::events::{EventLog, SimEvent};
use crate::setup;
use crate::systems;
use crate::SimRng;

/// The assembled simulation: world, schedule, and everything in between.
pub struct Simulation {
    pub world: World,
    schedule: Schedule,
}

impl Simulation {
    /// Build the default town with the default roster.
    pub fn new(config: SimConfig, seed: u64) -> Self {
        Self::with_roster(config, seed, setup::default_roster())
    }

    /// Build the default town with a custom roster.
    pub fn with_roster(config: SimConfig, seed: u64, roster: Vec<setup::ResidentSpec>) -> Self {
        let mut world = World::new();

        let (map, locations) = setup::default_town();
        world.insert_resource(map);
        world.insert_resource(locations);
        world.insert_resource(WorldClock::starting_at(config.clock.start_tick));
        world.insert_resource(EconomicLevers::default());
        world.insert_resource(EventLog::new());
        world.insert_resource(Roster::default());
        world.insert_resource(DialogueHub::scripted());
        world.insert_resource(SimRng(SmallRng::seed_from_u64(seed)));
        world.insert_resource(config);

        setup::spawn_roster(&mut world, roster);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                systems::run_behavior,
                systems::tick_agents,
                systems::run_movement,
                systems::run_social,
            )
                .chain(),
        );

        Self { world, schedule }
    }

    /// Swap the dialogue generator (e.g. for a live backend or a test stub).
    pub fn with_dialogue(mut self, generator: Box<dyn DialogueGenerator>) -> Self {
        self.world.insert_resource(DialogueHub::new(generator));
        self
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) {
        self.world.resource_mut::<WorldClock>().advance();
        self.schedule.run(&mut self.world);
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<WorldClock>().tick
    }

    pub fn clock_label(&self) -> String {
        self.world.resource::<WorldClock>().formatted()
    }

    /// Update the global economic levers, effective from the next tick.
    pub fn set_levers(&mut self, price: f64, wage: f64, risk: f64) {
        self.world
            .resource_mut::<EconomicLevers>()
            .set(price, wage, risk);
    }

    /// Take all events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        self.world.resource_mut::<EventLog>().drain()
    }

    /// True when every agent on the roster is dead: the town is over.
    pub fn all_dead(&mut self) -> bool {
        let mut any = false;
        let mut query = self.world.query::<&AgentState>();
        for state in query.iter(&self.world) {
            any = true;
            if !state.is_dead() {
                return false;
            }
        }
        any
    }

    /// The first agent to reach maximum charm, if any: the win condition.
    pub fn charm_winner(&mut self) -> Option<String> {
        let goal = self.world.resource::<SimConfig>().behavior.charm_goal;
        let mut query = self.world.query::<(&AgentName, &Vitals, &AgentState)>();
        for (name, vitals, state) in query.iter(&self.world) {
            if !state.is_dead() && vitals.charm >= goal {
                return Some(name.0.clone());
            }
        }
        None
    }

    /// Entity handle for an agent id, mostly for tests and inspection.
    pub fn find_agent(&mut self, id: &str) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &AgentId)>();
        query
            .iter(&self.world)
            .find(|(_, agent_id)| agent_id.0 == id)
            .map(|(entity, _)| entity)
    }

    /// Add a randomly generated resident.
    pub fn add_resident(&mut self) -> Entity {
        setup::spawn_random_resident(&mut self.world)
    }

    /// Remove the most recently added non-police resident, if allowed.
    pub fn remove_resident(&mut self) -> Option<Entity> {
        setup::remove_resident(&mut self.world)
    }

    pub fn locations(&self) -> &LocationRegistry {
        self.world.resource::<LocationRegistry>()
    }

    pub fn map(&self) -> &TownMap {
        self.world.resource::<TownMap>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_steps_without_panicking() {
        let mut sim = Simulation::new(SimConfig::default(), 42);
        for _ in 0..120 {
            sim.step();
        }
        assert_eq!(sim.tick(), 480 + 120);
        assert!(!sim.all_dead());
    }

    #[test]
    fn test_levers_apply_next_tick() {
        let mut sim = Simulation::new(SimConfig::default(), 42);
        sim.set_levers(2.0, 0.5, 0.0);
        let levers = *sim.world.resource::<EconomicLevers>();
        assert_eq!(levers.price, 2.0);
        assert_eq!(levers.wage, 0.5);
        assert_eq!(levers.risk, 0.0);
    }

    #[test]
    fn test_find_agent_by_id() {
        let mut sim = Simulation::new(SimConfig::default(), 42);
        assert!(sim.find_agent("1").is_some());
        assert!(sim.find_agent("99").is_none());
    }

    #[test]
    fn test_extinction_detected_by_roster_scan() {
        let mut sim = Simulation::new(SimConfig::default(), 42);
        let roster = sim.world.resource::<Roster>().entities.clone();
        for entity in roster {
            *sim.world.get_mut::<AgentState>(entity).unwrap() = AgentState::Dead;
        }
        assert!(sim.all_dead());
    }

    #[test]
    fn test_charm_winner_detected() {
        let mut sim = Simulation::new(SimConfig::default(), 42);
        let alice = sim.find_agent("1").unwrap();
        sim.world.get_mut::<Vitals>(alice).unwrap().charm = 100.0;
        assert_eq!(sim.charm_winner().as_deref(), Some("Alice"));
    }
}
