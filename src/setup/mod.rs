//! World Setup
//!
//! Town map construction and resident spawning.

pub mod agents;
pub mod world;

pub use agents::*;
pub use world::*;
