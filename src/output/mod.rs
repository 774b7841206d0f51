//! Output Generation
//!
//! JSON snapshots of the whole town, written periodically by the runner.

pub mod snapshot;

pub use snapshot::*;
