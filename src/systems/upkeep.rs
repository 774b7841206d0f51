//! Upkeep System
//!
//! Per-tick decay that needs no cross-agent context: speech timers, hunger
//! growth, and the living-tick counter. Dead agents are untouched, which is
//! what keeps their epitaphs on screen and their counters frozen.

use bevy_ecs::prelude::*;

use crate::components::agent::{AgentState, Lifespan, Vitals};
use crate::components::social::{Relationships, Speech};
use crate::config::SimConfig;

/// System: advance per-agent timers and passive hunger.
pub fn tick_agents(
    config: Res<SimConfig>,
    mut query: Query<(
        &mut AgentState,
        &mut Speech,
        &mut Vitals,
        &mut Lifespan,
        &mut Relationships,
    )>,
) {
    for (mut state, mut speech, mut vitals, mut lifespan, mut relationships) in query.iter_mut() {
        if state.is_dead() {
            continue;
        }

        lifespan.living_ticks += 1;

        if speech.tick() {
            // The bubble expired; the lingering tone goes with it, and a
            // finished conversation ends here.
            relationships.last_sentiment = None;
            if *state == AgentState::Talking {
                *state = AgentState::Idle;
            }
        }

        if *state != AgentState::Eating {
            vitals.hunger = (vitals.hunger + config.vitals.hunger_growth).min(100.0);
        }
    }
}
