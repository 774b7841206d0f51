//! Dialogue Boundary
//!
//! The external text-generation service, seen from the simulation's side: a
//! request/response trait, a deterministic scripted implementation, and the
//! hub resource that gates conversations to one in flight at a time.
//!
//! Failures never propagate into the simulation; the social trigger maps
//! them back to IDLE for both participants.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// A single generation request: model identifier plus a free-text prompt.
#[derive(Debug, Clone)]
pub struct DialogueRequest {
    pub model: String,
    pub prompt: String,
}

/// Why a generation attempt failed.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("dialogue service unavailable: {0}")]
    Unavailable(String),
    #[error("dialogue request timed out")]
    Timeout,
    #[error("dialogue service returned an empty response")]
    Empty,
}

/// The external generator. Implementations must not panic; all failure is
/// reported through the error type.
pub trait DialogueGenerator: Send + Sync {
    fn generate(&mut self, request: &DialogueRequest) -> Result<String, DialogueError>;
}

/// Deterministic stand-in for the external service: rotates through a pool
/// of canned lines. Keeps headless runs and tests free of network calls.
pub struct ScriptedDialogue {
    cursor: usize,
}

const SCRIPTED_LINES: &[&str] = &[
    "Lovely weather today, isn't it?",
    "Have you been to the bakery lately?",
    "Work has been so tiring this week.",
    "I heard the mall has something new in.",
    "Good to see a friend out here!",
    "The bank queue was terrible this morning.",
    "I'm happy the park is so quiet.",
    "Prices keep going up, it's awful.",
];

impl ScriptedDialogue {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }
}

impl Default for ScriptedDialogue {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueGenerator for ScriptedDialogue {
    fn generate(&mut self, _request: &DialogueRequest) -> Result<String, DialogueError> {
        let line = SCRIPTED_LINES[self.cursor % SCRIPTED_LINES.len()];
        self.cursor += 1;
        Ok(line.to_string())
    }
}

/// A completed exchange, kept for the chat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueRecord {
    pub speaker: String,
    pub listener: String,
    pub text: String,
    pub tick: u64,
}

const DIALOGUE_LOG_CAP: usize = 200;

/// Resource: the simulation's hook to the generator.
///
/// `in_flight` is the system's only concurrency-control primitive: while a
/// conversation is pending, no new one may start.
#[derive(Resource)]
pub struct DialogueHub {
    pub generator: Box<dyn DialogueGenerator>,
    pub in_flight: bool,
    pub log: VecDeque<DialogueRecord>,
}

impl DialogueHub {
    pub fn new(generator: Box<dyn DialogueGenerator>) -> Self {
        Self {
            generator,
            in_flight: false,
            log: VecDeque::new(),
        }
    }

    pub fn scripted() -> Self {
        Self::new(Box::new(ScriptedDialogue::new()))
    }

    pub fn record(&mut self, record: DialogueRecord) {
        self.log.push_back(record);
        while self.log.len() > DIALOGUE_LOG_CAP {
            self.log.pop_front();
        }
    }
}
