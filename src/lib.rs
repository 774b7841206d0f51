//! Town Life Simulation Engine Library
//!
//! A persistent small town of autonomous agents on a tile grid: they walk,
//! work, eat, bank, get sick, socialize, and die, one simulated minute per
//! tick.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod dialogue;
pub mod events;
pub mod output;
pub mod runner;
pub mod setup;
pub mod systems;

pub use components::*;
pub use config::SimConfig;
pub use runner::Simulation;

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
