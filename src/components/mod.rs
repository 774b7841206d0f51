//! ECS components and world resources for the town simulation.

pub mod agent;
pub mod social;
pub mod world;

pub use agent::*;
pub use social::*;
pub use world::*;
