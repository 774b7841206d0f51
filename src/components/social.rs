//! Social Components
//!
//! Relationships between residents, speech bubbles, and conversation
//! sentiment.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Tone of the most recent exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Crude lexical classification of a generated line. The external
    /// generator returns plain text, so tone is derived here.
    pub fn classify(text: &str) -> Sentiment {
        const POSITIVE: [&str; 8] = [
            "great", "good", "love", "happy", "wonderful", "nice", "glad", "friend",
        ];
        const NEGATIVE: [&str; 8] = [
            "hate", "angry", "terrible", "awful", "leave", "annoying", "worst", "tired",
        ];

        let lower = text.to_lowercase();
        if POSITIVE.iter().any(|w| lower.contains(w)) {
            Sentiment::Positive
        } else if NEGATIVE.iter().any(|w| lower.contains(w)) {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}

/// How many dialogue lines are kept per conversation partner.
pub const CONVERSATION_HISTORY_CAP: usize = 5;

/// Relationship tier derived from an intimacy score, used to steer
/// conversation tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipTier {
    Strangers,
    Acquaintances,
    Friends,
    CloseFriends,
}

impl RelationshipTier {
    pub fn from_intimacy(intimacy: f64) -> Self {
        if intimacy >= 70.0 {
            RelationshipTier::CloseFriends
        } else if intimacy >= 50.0 {
            RelationshipTier::Friends
        } else if intimacy >= 20.0 {
            RelationshipTier::Acquaintances
        } else {
            RelationshipTier::Strangers
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationshipTier::Strangers => "strangers",
            RelationshipTier::Acquaintances => "acquaintances",
            RelationshipTier::Friends => "friends",
            RelationshipTier::CloseFriends => "close friends",
        }
    }
}

/// An agent's social state: intimacy per other agent, bounded conversation
/// history per pair, and the tone of the last exchange.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationships {
    /// other agent id -> intimacy in [0, 100].
    pub intimacy: HashMap<String, f64>,
    /// other agent id -> last few dialogue lines.
    pub history: HashMap<String, VecDeque<String>>,
    pub last_sentiment: Option<Sentiment>,
}

impl Relationships {
    pub fn intimacy_with(&self, other_id: &str) -> f64 {
        self.intimacy.get(other_id).copied().unwrap_or(0.0)
    }

    /// Adjust intimacy toward another agent, clamped to [0, 100].
    pub fn adjust_intimacy(&mut self, other_id: &str, delta: f64) {
        let entry = self.intimacy.entry(other_id.to_string()).or_insert(0.0);
        *entry = (*entry + delta).clamp(0.0, 100.0);
    }

    /// Append a line to the per-pair history, evicting the oldest beyond
    /// [`CONVERSATION_HISTORY_CAP`].
    pub fn remember_line(&mut self, other_id: &str, line: impl Into<String>) {
        let history = self.history.entry(other_id.to_string()).or_default();
        history.push_back(line.into());
        while history.len() > CONVERSATION_HISTORY_CAP {
            history.pop_front();
        }
    }

    pub fn history_with(&self, other_id: &str) -> impl Iterator<Item = &String> {
        self.history.get(other_id).into_iter().flatten()
    }

    /// Number of relationships at or above the friendship threshold.
    pub fn close_friend_count(&self) -> usize {
        self.intimacy.values().filter(|&&v| v >= 50.0).count()
    }
}

/// A timed message displayed above an agent.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Speech {
    pub text: Option<String>,
    pub ttl: u32,
}

impl Speech {
    pub fn say(&mut self, text: impl Into<String>, ttl: u32) {
        self.text = Some(text.into());
        self.ttl = ttl;
    }

    /// Decay the display timer; clears the text when it expires. Returns
    /// true if the message expired this tick.
    pub fn tick(&mut self) -> bool {
        if self.ttl == 0 {
            return false;
        }
        self.ttl -= 1;
        if self.ttl == 0 {
            self.text = None;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.text = None;
        self.ttl = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intimacy_clamped() {
        let mut rel = Relationships::default();
        rel.adjust_intimacy("bob", 150.0);
        assert_eq!(rel.intimacy_with("bob"), 100.0);
        rel.adjust_intimacy("bob", -500.0);
        assert_eq!(rel.intimacy_with("bob"), 0.0);
    }

    #[test]
    fn test_history_bounded() {
        let mut rel = Relationships::default();
        for i in 0..10 {
            rel.remember_line("bob", format!("line {i}"));
        }
        let lines: Vec<_> = rel.history_with("bob").collect();
        assert_eq!(lines.len(), CONVERSATION_HISTORY_CAP);
        assert_eq!(lines[0], "line 5");
        assert_eq!(lines[4], "line 9");
    }

    #[test]
    fn test_close_friend_count() {
        let mut rel = Relationships::default();
        rel.adjust_intimacy("a", 55.0);
        rel.adjust_intimacy("b", 49.0);
        rel.adjust_intimacy("c", 80.0);
        assert_eq!(rel.close_friend_count(), 2);
    }

    #[test]
    fn test_relationship_tiers() {
        assert_eq!(
            RelationshipTier::from_intimacy(0.0),
            RelationshipTier::Strangers
        );
        assert_eq!(
            RelationshipTier::from_intimacy(25.0),
            RelationshipTier::Acquaintances
        );
        assert_eq!(
            RelationshipTier::from_intimacy(50.0),
            RelationshipTier::Friends
        );
        assert_eq!(
            RelationshipTier::from_intimacy(90.0),
            RelationshipTier::CloseFriends
        );
    }

    #[test]
    fn test_sentiment_classification() {
        assert_eq!(
            Sentiment::classify("What a wonderful morning!"),
            Sentiment::Positive
        );
        assert_eq!(
            Sentiment::classify("I hate waiting in line."),
            Sentiment::Negative
        );
        assert_eq!(Sentiment::classify("The bank opens at nine."), Sentiment::Neutral);
    }

    #[test]
    fn test_speech_expiry() {
        let mut speech = Speech::default();
        speech.say("hello", 2);
        assert!(!speech.tick());
        assert!(speech.tick());
        assert_eq!(speech.text, None);
        assert!(!speech.tick());
    }
}
