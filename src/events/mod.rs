//! Event System
//!
//! Notable simulation transitions, collected per tick for the runner to
//! report.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What kind of transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimEventKind {
    Arrest,
    Release,
    CrimeStarted,
    Sickness,
    Death,
    EmergencyLoan,
    Conversation,
}

/// A single notable transition, stamped with the tick it happened on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
    pub agent_id: String,
    pub detail: String,
}

/// Unread events are bounded so an undrained log cannot grow without limit.
const EVENT_LOG_CAP: usize = 1024;

/// Resource: events recorded since the last drain.
#[derive(Resource, Debug, Default)]
pub struct EventLog {
    events: VecDeque<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        tick: u64,
        kind: SimEventKind,
        agent_id: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.events.push_back(SimEvent {
            tick,
            kind,
            agent_id: agent_id.into(),
            detail: detail.into(),
        });
        while self.events.len() > EVENT_LOG_CAP {
            self.events.pop_front();
        }
    }

    /// Take all recorded events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
