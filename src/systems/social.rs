//! Social Trigger System
//!
//! Scans agent pairs once per tick; at most one conversation is initiated,
//! and only while no other request is in flight. The external generator
//! produces the lines; this system owns all state mutation around them, and
//! maps any generator failure straight back to IDLE for both participants.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;

use crate::components::agent::{AgentName, AgentState, Persona, Role, Vitals};
use crate::components::social::{Relationships, RelationshipTier, Sentiment, Speech};
use crate::components::world::{Position, Roster, WorldClock};
use crate::config::{SimConfig, SocialConfig};
use crate::dialogue::{DialogueHub, DialogueRecord, DialogueRequest};
use crate::events::{EventLog, SimEventKind};
use crate::SimRng;

/// Exclusive system: the per-tick conversation trigger.
pub fn run_social(world: &mut World) {
    let tick = world.resource::<WorldClock>().tick;
    let config = world.resource::<SimConfig>().social.clone();
    let roster = world.resource::<Roster>().entities.clone();
    let mut rng = world
        .remove_resource::<SimRng>()
        .expect("SimRng resource missing");

    world.resource_scope(|world, mut hub: Mut<DialogueHub>| {
        let hub = &mut *hub;
        world.resource_scope(|world, mut events: Mut<EventLog>| {
            trigger_conversation(world, hub, &mut events, &mut rng.0, &config, tick, &roster);
        });
    });

    world.insert_resource(rng);
}

fn eligible(state: AgentState) -> bool {
    !matches!(
        state,
        AgentState::Talking | AgentState::Sleeping | AgentState::Dead
    )
}

#[allow(clippy::too_many_arguments)]
fn trigger_conversation(
    world: &mut World,
    hub: &mut DialogueHub,
    events: &mut EventLog,
    rng: &mut SmallRng,
    config: &SocialConfig,
    tick: u64,
    roster: &[Entity],
) {
    if hub.in_flight {
        return;
    }

    for i in 0..roster.len() {
        for j in (i + 1)..roster.len() {
            let a = roster[i];
            let b = roster[j];
            let (Some(sa), Some(sb)) = (world.get::<AgentState>(a), world.get::<AgentState>(b))
            else {
                continue;
            };
            if !eligible(*sa) || !eligible(*sb) {
                continue;
            }
            let pa = world.get::<Position>(a).expect("agent position").0;
            let pb = world.get::<Position>(b).expect("agent position").0;
            if pa.distance(pb) > config.trigger_distance {
                continue;
            }
            if !rng.gen_bool(config.trigger_chance.min(1.0)) {
                continue;
            }

            start_conversation(world, hub, events, rng, config, tick, a, b);
            // One conversation per tick.
            return;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn start_conversation(
    world: &mut World,
    hub: &mut DialogueHub,
    events: &mut EventLog,
    rng: &mut SmallRng,
    config: &SocialConfig,
    tick: u64,
    a: Entity,
    b: Entity,
) {
    let name_a = world.get::<AgentName>(a).expect("agent name").0.clone();
    let name_b = world.get::<AgentName>(b).expect("agent name").0.clone();

    *world.get_mut::<AgentState>(a).expect("agent state") = AgentState::Talking;
    *world.get_mut::<AgentState>(b).expect("agent state") = AgentState::Talking;
    world
        .get_mut::<Speech>(a)
        .expect("agent speech")
        .say("...", config.pending_ttl);
    world
        .get_mut::<Speech>(b)
        .expect("agent speech")
        .say("...", config.pending_ttl);

    hub.in_flight = true;

    let prompt_a = build_opening_prompt(world, tick, a, b);
    let line_a = match hub.generator.generate(&DialogueRequest {
        model: config.model.clone(),
        prompt: prompt_a,
    }) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("dialogue generation failed: {}", e);
            abort_conversation(world, hub, a, b);
            return;
        }
    };

    let prompt_b = build_reply_prompt(world, b, &name_a, &line_a);
    let line_b = match hub.generator.generate(&DialogueRequest {
        model: config.model.clone(),
        prompt: prompt_b,
    }) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("dialogue generation failed: {}", e);
            abort_conversation(world, hub, a, b);
            return;
        }
    };

    // The exchange landed: bubbles, sentiment, intimacy, history, the log.
    let sentiment_a = Sentiment::classify(&line_a);
    let sentiment_b = Sentiment::classify(&line_b);

    world
        .get_mut::<Speech>(a)
        .expect("agent speech")
        .say(line_a.clone(), config.speech_ttl);
    world
        .get_mut::<Speech>(b)
        .expect("agent speech")
        .say(line_b.clone(), config.speech_ttl);

    let id_a = super::behavior::agent_id(world, a);
    let id_b = super::behavior::agent_id(world, b);

    // Each side warms (or cools) toward the other according to what they
    // were told, with a little noise.
    let delta_for = |s: Sentiment, rng: &mut SmallRng, config: &SocialConfig| {
        let base = match s {
            Sentiment::Positive => config.intimacy_positive,
            Sentiment::Negative => config.intimacy_negative,
            Sentiment::Neutral => config.intimacy_neutral,
        };
        base + rng.gen_range(-config.intimacy_noise..=config.intimacy_noise)
    };
    let delta_a = delta_for(sentiment_b, rng, config);
    let delta_b = delta_for(sentiment_a, rng, config);

    {
        let mut rel_a = world.get_mut::<Relationships>(a).expect("relationships");
        rel_a.adjust_intimacy(&id_b, delta_a);
        rel_a.remember_line(&id_b, format!("{name_a}: {line_a}"));
        rel_a.remember_line(&id_b, format!("{name_b}: {line_b}"));
        rel_a.last_sentiment = Some(sentiment_a);
    }
    {
        let mut rel_b = world.get_mut::<Relationships>(b).expect("relationships");
        rel_b.adjust_intimacy(&id_a, delta_b);
        rel_b.remember_line(&id_a, format!("{name_a}: {line_a}"));
        rel_b.remember_line(&id_a, format!("{name_b}: {line_b}"));
        rel_b.last_sentiment = Some(sentiment_b);
    }

    hub.record(DialogueRecord {
        speaker: name_a.clone(),
        listener: name_b.clone(),
        text: line_a,
        tick,
    });
    hub.record(DialogueRecord {
        speaker: name_b.clone(),
        listener: name_a.clone(),
        text: line_b,
        tick,
    });
    events.record(
        tick,
        SimEventKind::Conversation,
        id_a,
        format!("chatted with {name_b}"),
    );

    hub.in_flight = false;
}

/// Failure path: nothing sticks, both participants go back to IDLE.
fn abort_conversation(world: &mut World, hub: &mut DialogueHub, a: Entity, b: Entity) {
    for entity in [a, b] {
        *world.get_mut::<AgentState>(entity).expect("agent state") = AgentState::Idle;
        world.get_mut::<Speech>(entity).expect("agent speech").clear();
    }
    hub.in_flight = false;
}

fn mood_of(world: &World, entity: Entity) -> &'static str {
    let vitals = world.get::<Vitals>(entity).expect("agent vitals");
    if vitals.health < 50.0 {
        return "unwell";
    }
    if vitals.hunger > 70.0 {
        return "hungry";
    }
    match world
        .get::<Relationships>(entity)
        .expect("relationships")
        .last_sentiment
    {
        Some(Sentiment::Positive) => "cheerful",
        Some(Sentiment::Negative) => "grumpy",
        _ => "calm",
    }
}

fn time_phase(tick: u64) -> &'static str {
    match (tick / 60) % 24 {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=21 => "evening",
        _ => "night",
    }
}

fn build_opening_prompt(world: &World, tick: u64, a: Entity, b: Entity) -> String {
    let name_a = &world.get::<AgentName>(a).expect("agent name").0;
    let name_b = &world.get::<AgentName>(b).expect("agent name").0;
    let role_a = world.get::<Role>(a).expect("agent role").label();
    let role_b = world.get::<Role>(b).expect("agent role").label();
    let persona = &world.get::<Persona>(a).expect("agent persona").0;
    let id_b = &world.get::<crate::components::agent::AgentId>(b).expect("agent id").0;

    let relationships = world.get::<Relationships>(a).expect("relationships");
    let tier = RelationshipTier::from_intimacy(relationships.intimacy_with(id_b));
    let history: Vec<String> = relationships.history_with(id_b).cloned().collect();

    let mut prompt = format!(
        "You are {name_a}, a {role_a}. {persona} You meet {name_b}, a {role_b}. \
         You two are {tier_label}. You feel {mood}. It is {phase}.",
        tier_label = tier.label(),
        mood = mood_of(world, a),
        phase = time_phase(tick),
    );
    if !history.is_empty() {
        prompt.push_str(&format!(" You last talked about: {}.", history.join(" / ")));
    }
    prompt.push_str(" Say something short (max 10 words) to them.");
    prompt
}

fn build_reply_prompt(world: &World, b: Entity, speaker_name: &str, line: &str) -> String {
    let name_b = &world.get::<AgentName>(b).expect("agent name").0;
    let role_b = world.get::<Role>(b).expect("agent role").label();
    format!(
        "You are {name_b}, a {role_b}. {speaker_name} just said: \"{line}\". \
         Give a short meaningful reply (max 10 words)."
    )
}
