//! ECS Systems
//!
//! The per-tick passes, in execution order: behavior engine, upkeep decay,
//! movement resolution, social trigger.

pub mod behavior;
pub mod movement;
pub mod social;
pub mod upkeep;

pub use behavior::run_behavior;
pub use movement::run_movement;
pub use social::run_social;
pub use upkeep::tick_agents;
