//! Snapshot Generation
//!
//! Serializes the public state of every resident and venue at a point in
//! time. The runner writes one file per snapshot plus an always-current
//! `current_state.json`.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::components::agent::{
    AgentId, AgentName, AgentState, Finances, Ledger, Lifespan, Role, Vitals,
};
use crate::components::world::{Coordinate, LocationExtra, LocationRegistry, Position, WorldClock};

/// Where snapshot files land.
pub const SNAPSHOT_DIR: &str = "output/snapshots";
pub const CURRENT_STATE_PATH: &str = "output/current_state.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: String,
    pub name: String,
    pub role: String,
    pub state: String,
    pub position: Coordinate,
    pub hunger: f64,
    pub health: f64,
    pub charm: f64,
    pub cash: f64,
    pub bank_balance: f64,
    pub loan_balance: f64,
    pub living_ticks: u64,
    pub death_cause: Option<String>,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub name: String,
    pub visits: u64,
    pub revenue: f64,
    pub transaction_count: usize,
    pub bank_deposits: Option<f64>,
    pub bank_withdrawals: Option<f64>,
    pub bank_loans: Option<f64>,
    pub arrests: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TownSnapshot {
    pub tick: u64,
    pub clock: String,
    pub agents: Vec<AgentSnapshot>,
    pub locations: Vec<LocationSnapshot>,
}

/// Capture the current town state.
pub fn generate_snapshot(world: &mut World) -> TownSnapshot {
    let (tick, clock) = {
        let clock = world.resource::<WorldClock>();
        (clock.tick, clock.formatted())
    };

    let mut agents = Vec::new();
    {
        let mut query = world.query::<(
            &AgentId,
            &AgentName,
            &Role,
            &AgentState,
            &Position,
            &Vitals,
            &Finances,
            &Ledger,
            &Lifespan,
        )>();
        for (id, name, role, state, position, vitals, finances, ledger, lifespan) in
            query.iter(world)
        {
            agents.push(AgentSnapshot {
                id: id.0.clone(),
                name: name.0.clone(),
                role: role.label().to_string(),
                state: format!("{state:?}").to_uppercase(),
                position: position.0,
                hunger: vitals.hunger,
                health: vitals.health,
                charm: vitals.charm,
                cash: finances.cash,
                bank_balance: finances.bank,
                loan_balance: finances.loan,
                living_ticks: lifespan.living_ticks,
                death_cause: lifespan.death_cause.clone(),
                transaction_count: ledger.entries.len(),
            });
        }
    }

    let mut locations = Vec::new();
    for location in world.resource::<LocationRegistry>().all() {
        let (deposits, withdrawals, loans, arrests) = match &location.stats.extra {
            Some(LocationExtra::Bank {
                deposits,
                withdrawals,
                loans,
            }) => (Some(*deposits), Some(*withdrawals), Some(*loans), None),
            Some(LocationExtra::Police { arrests }) => (None, None, None, Some(*arrests)),
            None => (None, None, None, None),
        };
        locations.push(LocationSnapshot {
            name: location.name.clone(),
            visits: location.stats.visits,
            revenue: location.stats.revenue,
            transaction_count: location.stats.transactions.len(),
            bank_deposits: deposits,
            bank_withdrawals: withdrawals,
            bank_loans: loans,
            arrests,
        });
    }

    TownSnapshot {
        tick,
        clock,
        agents,
        locations,
    }
}

/// Write a snapshot to its own tick-stamped file under [`SNAPSHOT_DIR`].
pub fn write_snapshot_to_dir(snapshot: &TownSnapshot) -> io::Result<()> {
    fs::create_dir_all(SNAPSHOT_DIR)?;
    let path = Path::new(SNAPSHOT_DIR).join(format!("tick_{:08}.json", snapshot.tick));
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    fs::write(path, json)
}

/// Overwrite the always-current state file.
pub fn write_current_state(snapshot: &TownSnapshot) -> io::Result<()> {
    if let Some(parent) = Path::new(CURRENT_STATE_PATH).parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    fs::write(CURRENT_STATE_PATH, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::agent::AgentBundle;
    use crate::components::world::Roster;

    #[test]
    fn test_snapshot_captures_agents_and_locations() {
        let mut world = World::new();
        let (map, registry) = crate::setup::default_town();
        world.insert_resource(map);
        world.insert_resource(registry);
        world.insert_resource(WorldClock::starting_at(480));
        world.insert_resource(Roster::default());
        world.spawn(AgentBundle::new(
            "1",
            "Alice",
            Role::Baker,
            Coordinate::new(10, 10),
            "baker",
        ));

        let snapshot = generate_snapshot(&mut world);

        assert_eq!(snapshot.tick, 480);
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.agents[0].name, "Alice");
        assert_eq!(snapshot.agents[0].state, "IDLE");
        assert_eq!(snapshot.locations.len(), 9);

        let bank = snapshot
            .locations
            .iter()
            .find(|l| l.name == "Bank")
            .unwrap();
        assert_eq!(bank.bank_deposits, Some(0.0));
        assert_eq!(bank.arrests, None);
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let mut world = World::new();
        let (map, registry) = crate::setup::default_town();
        world.insert_resource(map);
        world.insert_resource(registry);
        world.insert_resource(WorldClock::starting_at(0));
        world.insert_resource(Roster::default());

        let snapshot = generate_snapshot(&mut world);
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: TownSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.locations.len(), snapshot.locations.len());
    }
}
