//! Resident Spawning
//!
//! The initial roster, plus runtime add/remove of residents. Removal never
//! empties the town and takes police officers last.

use bevy_ecs::prelude::*;
use rand::Rng;
use uuid::Uuid;

use crate::components::agent::{AgentBundle, Role};
use crate::components::world::{Coordinate, Position, Roster, TownMap};
use crate::SimRng;

/// Construction input for one resident.
#[derive(Debug, Clone)]
pub struct ResidentSpec {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub start: Coordinate,
    pub persona: String,
}

impl ResidentSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        start: Coordinate,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            start: start.into(),
            persona: persona.into(),
        }
    }
}

/// Name pool for randomly generated residents.
const EXTRA_NAMES: [&str; 10] = [
    "Grace", "Hank", "Ivy", "Jack", "Kate", "Leo", "Mia", "Noah", "Olivia", "Paul",
];

/// The six founding residents, lined up along the main street.
pub fn default_roster() -> Vec<ResidentSpec> {
    vec![
        ResidentSpec::new(
            "1",
            "Alice",
            Role::Baker,
            Coordinate::new(10, 10),
            "Runs the bakery and knows everyone's favorite loaf.",
        ),
        ResidentSpec::new(
            "2",
            "Bob",
            Role::Librarian,
            Coordinate::new(15, 10),
            "Keeps the library quiet and the archives in order.",
        ),
        ResidentSpec::new(
            "3",
            "Charlie",
            Role::Mayor,
            Coordinate::new(20, 10),
            "Elected on a promise of wider roads and lower bread prices.",
        ),
        ResidentSpec::new(
            "4",
            "Diana",
            Role::Gardener,
            Coordinate::new(25, 10),
            "Tends the park and talks to the flowers.",
        ),
        ResidentSpec::new(
            "5",
            "Evan",
            Role::Police,
            Coordinate::new(12, 10),
            "Walks the beat and keeps an eye out for mischief.",
        ),
        ResidentSpec::new(
            "6",
            "Fiona",
            Role::Doctor,
            Coordinate::new(18, 10),
            "On call at the hospital at all hours.",
        ),
    ]
}

/// Spawn one resident from a spec and register it on the roster.
pub fn spawn_resident(world: &mut World, spec: ResidentSpec) -> Entity {
    let entity = world
        .spawn(AgentBundle::new(
            spec.id, spec.name, spec.role, spec.start, spec.persona,
        ))
        .id();
    world.resource_mut::<Roster>().entities.push(entity);
    entity
}

/// Spawn the whole initial roster.
pub fn spawn_roster(world: &mut World, specs: Vec<ResidentSpec>) {
    for spec in specs {
        spawn_resident(world, spec);
    }
}

/// Add a randomly generated resident at a walkable cell.
pub fn spawn_random_resident(world: &mut World) -> Entity {
    let (name, start) = {
        let map = world.resource::<TownMap>().clone();
        let mut rng = world.resource_mut::<SimRng>();
        let name = EXTRA_NAMES[rng.0.gen_range(0..EXTRA_NAMES.len())].to_string();
        let mut start = Coordinate::new(16, 10);
        for _ in 0..50 {
            let candidate = Coordinate::new(
                rng.0.gen_range(0..map.width()),
                rng.0.gen_range(0..map.height()),
            );
            if map.is_walkable(candidate.x, candidate.y) {
                start = candidate;
                break;
            }
        }
        (name, start)
    };

    let spec = ResidentSpec::new(
        Uuid::new_v4().to_string(),
        name.clone(),
        Role::Resident,
        start,
        format!("{name} is new in town, ready to contribute."),
    );
    spawn_resident(world, spec)
}

/// Remove the most recently added non-police resident. Refuses to drop the
/// roster below one agent; returns the despawned entity if any.
pub fn remove_resident(world: &mut World) -> Option<Entity> {
    let roster = world.resource::<Roster>().entities.clone();
    if roster.len() <= 1 {
        return None;
    }

    let victim_index = roster.iter().rposition(|&entity| {
        world
            .get::<Role>(entity)
            .map_or(false, |role| *role != Role::Police)
    })?;

    let entity = roster[victim_index];
    world.despawn(entity);
    world
        .resource_mut::<Roster>()
        .entities
        .remove(victim_index);
    Some(entity)
}
